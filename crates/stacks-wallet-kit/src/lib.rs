#[macro_use]
extern crate serde_derive;

pub mod constants;
pub mod crypto;
pub mod services;
pub mod types;

pub extern crate crossbeam_channel as channel;
pub use futures;
pub use hex;
pub use libsecp256k1 as secp256k1;
pub use reqwest;
pub use serde;
pub use serde_json;
pub use sha2;
pub use url;
