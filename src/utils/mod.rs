//! Utility module

mod error;
mod position;

pub use error::{Error, Result, RuntimeError, DEFAULT_FILE_NAME};
pub use position::Position;
