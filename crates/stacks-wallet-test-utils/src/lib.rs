pub extern crate stacks_wallet_kit as kit;

pub mod mocks;
pub mod tokens;

pub use mocks::{services_with, MockServices};
pub use tokens::{unsecured_token, TestSigner};
