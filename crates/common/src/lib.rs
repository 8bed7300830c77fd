//! Types shared by the Karavan gateway crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
