pub mod config;
pub mod error;
pub mod types;

pub use config::{ApiEndpoints, EngineConfig, NetworkMode};
pub use error::{ClmmError, ClmmResult};
pub use types::{AnyResult, Side, TokenDescriptor};
