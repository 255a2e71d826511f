//! Token domain - fungible token standard

mod token_standard;

pub use token_standard::{Token, TokenStandard};
