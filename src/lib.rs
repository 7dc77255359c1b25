pub mod blocks;
pub mod circuits;
pub mod client;
pub mod config;
pub mod error;
pub mod proofs;
pub mod registry;

pub use error::{Error, Result};
