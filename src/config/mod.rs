//! Configuration document: typed model, default-merge, validation, and
//! atomic persistence.

mod bootstrap;
mod document;
mod store;

pub use bootstrap::Bootstrap;
pub use document::{
    Configuration, EmailConfig, LoggingConfig, MonitoringConfig, NotificationsConfig, RebootConfig,
    SystemConfig, WebConfig,
};
pub use store::{load, merge_defaults, reset, save, validate, ConfigError, FieldError};
