//! The persisted configuration document.
//!
//! A single versionless JSON document with seven sections. Every field has a
//! default, so a partially-specified document can always be merge-completed.
//! Serialization order is struct declaration order, which keeps saved files
//! byte-stable across load/save round trips.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Poll-cycle behavior of the monitor daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoringConfig {
    pub check_interval_minutes: i64,
    /// Minimum tracked-aircraft count before the daemon considers remediation.
    pub aircraft_threshold: i64,
    /// Minimum host uptime before any reboot is allowed. Fractional hours.
    pub minimum_uptime_hours: f64,
    pub endpoint_timeout_seconds: i64,
    pub retry_attempts: i64,
    pub retry_delay_seconds: i64,
    pub endpoint_url: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            check_interval_minutes: 10,
            aircraft_threshold: 30,
            minimum_uptime_hours: 2.0,
            endpoint_timeout_seconds: 10,
            retry_attempts: 3,
            retry_delay_seconds: 5,
            endpoint_url: "http://localhost:8754/monitor.json".to_string(),
        }
    }
}

/// Remediation policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RebootConfig {
    pub enabled: bool,
    /// Log the decision without executing the reboot.
    pub dry_run_mode: bool,
    pub reboot_delay_seconds: i64,
    pub send_email_alerts: bool,
}

impl Default for RebootConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dry_run_mode: false,
            reboot_delay_seconds: 300,
            send_email_alerts: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub log_level: String,
    pub max_log_size_mb: i64,
    pub keep_log_files: i64,
    /// Days of samples and events kept by the retention pruner.
    pub database_retention_days: i64,
    pub verbose_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            max_log_size_mb: 2,
            keep_log_files: 2,
            database_retention_days: 365,
            verbose_output: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebConfig {
    pub port: i64,
    pub auto_refresh_seconds: i64,
    /// Maximum remediation events returned to dashboards.
    pub max_reboot_history: i64,
    /// IANA zone name used to render every timestamp.
    pub timezone: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: 6869,
            auto_refresh_seconds: 60,
            max_reboot_history: 50,
            timezone: "Europe/London".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemConfig {
    /// Name of the feeder service unit the daemon watches and restarts.
    pub service_name: String,
    pub service_restart_enabled: bool,
    pub service_restart_delay_seconds: i64,
    pub check_disk_space: bool,
    pub min_disk_space_gb: i64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            service_name: "fr24feed".to_string(),
            service_restart_enabled: true,
            service_restart_delay_seconds: 30,
            check_disk_space: true,
            min_disk_space_gb: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationsConfig {
    pub email_enabled: bool,
    pub webhook_enabled: bool,
    pub webhook_url: String,
    /// Minimum minutes between two notifications on the same channel.
    pub notification_cooldown_minutes: i64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            email_enabled: false,
            webhook_enabled: false,
            webhook_url: String::new(),
            notification_cooldown_minutes: 60,
        }
    }
}

/// Email transport settings handed to the external delivery process.
///
/// `use_tls` and `use_starttls` are derived from `smtp_security` and are
/// recomputed on every load and save; the persisted values are never trusted
/// on their own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: i64,
    /// One of "tls", "ssl", "none".
    pub smtp_security: String,
    pub use_tls: bool,
    pub use_starttls: bool,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
    pub to_email: String,
    pub subject: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_security: "tls".to_string(),
            use_tls: true,
            use_starttls: true,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_email: String::new(),
            from_name: "Feederwatch".to_string(),
            to_email: String::new(),
            subject: "Feederwatch Alert: System Reboot Required".to_string(),
        }
    }
}

/// The full configuration document.
///
/// Fields deliberately carry no serde defaults: a direct deserialization of a
/// settings submission must spell out every field, so an omitted checkbox can
/// never silently flip a true-by-default boolean. Lenient completion of
/// partial documents happens only through [`merge_defaults`].
///
/// [`merge_defaults`]: super::merge_defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Configuration {
    pub monitoring: MonitoringConfig,
    pub reboot: RebootConfig,
    pub logging: LoggingConfig,
    pub web: WebConfig,
    pub system: SystemConfig,
    pub notifications: NotificationsConfig,
    pub email: EmailConfig,
    /// Unknown top-level keys, preserved verbatim across load/merge/save.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Configuration {
    /// Recompute the booleans derived from `email.smtp_security`.
    ///
    /// Both are true iff the mode is "tls"; keeping this mechanical avoids the
    /// flags drifting from the chosen mode.
    pub fn apply_security_mode(&mut self) {
        let tls = self.email.smtp_security == "tls";
        self.email.use_tls = tls;
        self.email.use_starttls = tls;
    }
}
