pub mod config;
pub mod error;
pub mod event;
pub mod fallback;
pub mod traits;
pub mod types;
pub mod wire;

pub use config::AppConfig;
pub use error::{FlowError, Result};
pub use event::EventBus;
pub use types::*;
