pub mod settings;

pub use settings::{OverflowPolicy, QueueConfig, Settings, ENV_PREFIX};
