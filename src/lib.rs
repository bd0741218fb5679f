// Infrastructure layer (shared components)
pub mod config;
pub mod error;
pub mod telemetry;

// Domain layer (notification model and collaborator contracts)
pub mod channel;
pub mod notification;
pub mod preference;
pub mod store;
pub mod template;

// Engine layer
pub mod dispatch;
pub mod scheduler;

pub use error::{Error, Result};
