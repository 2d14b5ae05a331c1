pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{ErrorKind, HaulageError, Result};
pub use types::*;
