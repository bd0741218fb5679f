mod settings;

pub use settings::{DispatchConfig, SchedulerConfig, Settings};
