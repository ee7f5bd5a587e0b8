//! Configuration: connection descriptors and platform settings.

pub mod connection;
pub mod settings;

pub use connection::{ConnectionConfig, ConnectionError};
pub use settings::{Settings, SettingsError};
