//! Loading, validating, and persisting the configuration document.
//!
//! Reads are fail-soft: a missing, malformed, or wrong-shaped file yields the
//! built-in defaults so the daemon always starts. Writes are fail-closed: a
//! document that does not validate is never written, and accepted documents
//! reach disk through a same-directory temp file and an atomic rename.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono_tz::Tz;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use super::Configuration;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration rejected on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),
    #[error("failed to persist configuration: {0}")]
    Persistence(#[from] io::Error),
}

/// One rejected field, addressed as "section.field".
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Read the document at `path`, completing it against the defaults.
///
/// Never fails: unreadable or malformed files degrade to the full defaults.
/// Degradations other than a simply absent file are logged, since they mean
/// an existing configuration is being ignored.
pub fn load(path: &Path) -> Configuration {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %err, "could not read configuration, using defaults");
            }
            return Configuration::default();
        }
    };
    let partial: Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "malformed configuration, using defaults");
            return Configuration::default();
        }
    };
    merge_defaults(partial)
}

/// Complete a partial JSON document against the defaults.
///
/// Objects merge recursively; any scalar or array present in `partial` wins
/// over the default at the same path. A value that ends up with the wrong
/// shape (say, a string where a section object belongs) fails typed decoding
/// and degrades the whole document to defaults rather than guessing.
pub fn merge_defaults(partial: Value) -> Configuration {
    let mut merged = match serde_json::to_value(Configuration::default()) {
        Ok(value) => value,
        Err(_) => return Configuration::default(),
    };
    merge_json(&mut merged, &partial);
    let mut config: Configuration = match serde_json::from_value(merged) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(error = %err, "configuration has the wrong shape, using defaults");
            Configuration::default()
        }
    };
    config.apply_security_mode();
    config
}

fn merge_json(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => merge_json(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value.clone(),
    }
}

/// Check every field against its allowed range. Empty result means valid.
pub fn validate(config: &Configuration) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let m = &config.monitoring;
    check_range(&mut errors, "monitoring.check_interval_minutes", m.check_interval_minutes, 1, 60);
    check_range(&mut errors, "monitoring.aircraft_threshold", m.aircraft_threshold, 0, 1000);
    check_range_f64(&mut errors, "monitoring.minimum_uptime_hours", m.minimum_uptime_hours, 0.0, 24.0);
    check_range(&mut errors, "monitoring.endpoint_timeout_seconds", m.endpoint_timeout_seconds, 1, 60);
    check_range(&mut errors, "monitoring.retry_attempts", m.retry_attempts, 1, 10);
    check_range(&mut errors, "monitoring.retry_delay_seconds", m.retry_delay_seconds, 1, 60);
    if m.endpoint_url.trim().is_empty() {
        errors.push(FieldError::new("monitoring.endpoint_url", "must not be empty"));
    }

    check_range(&mut errors, "reboot.reboot_delay_seconds", config.reboot.reboot_delay_seconds, 0, 3600);

    let l = &config.logging;
    check_member(&mut errors, "logging.log_level", &l.log_level, &["DEBUG", "INFO", "WARN", "ERROR"]);
    check_range(&mut errors, "logging.max_log_size_mb", l.max_log_size_mb, 1, 1000);
    check_range(&mut errors, "logging.keep_log_files", l.keep_log_files, 1, 30);
    check_range(&mut errors, "logging.database_retention_days", l.database_retention_days, 1, 3650);

    let w = &config.web;
    check_range(&mut errors, "web.port", w.port, 1024, 65535);
    check_range(&mut errors, "web.auto_refresh_seconds", w.auto_refresh_seconds, 10, 600);
    check_range(&mut errors, "web.max_reboot_history", w.max_reboot_history, 10, 500);
    if w.timezone.parse::<Tz>().is_err() {
        errors.push(FieldError::new("web.timezone", "must be an IANA zone name such as Europe/London"));
    }

    let s = &config.system;
    if s.service_name.trim().is_empty() {
        errors.push(FieldError::new("system.service_name", "must not be empty"));
    }
    check_range(&mut errors, "system.service_restart_delay_seconds", s.service_restart_delay_seconds, 0, 300);
    check_range(&mut errors, "system.min_disk_space_gb", s.min_disk_space_gb, 0, 100);

    let n = &config.notifications;
    check_range(&mut errors, "notifications.notification_cooldown_minutes", n.notification_cooldown_minutes, 1, 1440);
    if n.webhook_enabled
        && !n.webhook_url.starts_with("http://")
        && !n.webhook_url.starts_with("https://")
    {
        errors.push(FieldError::new("notifications.webhook_url", "must be an http(s) URL when the webhook channel is enabled"));
    }

    let e = &config.email;
    check_member(&mut errors, "email.smtp_security", &e.smtp_security, &["tls", "ssl", "none"]);
    check_range(&mut errors, "email.smtp_port", e.smtp_port, 1, 65535);
    if !e.from_email.is_empty() && !looks_like_email(&e.from_email) {
        errors.push(FieldError::new("email.from_email", "must look like an email address"));
    }
    if !e.to_email.is_empty() && !looks_like_email(&e.to_email) {
        errors.push(FieldError::new("email.to_email", "must look like an email address"));
    }

    errors
}

fn check_range(errors: &mut Vec<FieldError>, field: &str, value: i64, min: i64, max: i64) {
    if value < min || value > max {
        errors.push(FieldError::new(field, format!("must be between {} and {}", min, max)));
    }
}

fn check_range_f64(errors: &mut Vec<FieldError>, field: &str, value: f64, min: f64, max: f64) {
    if !value.is_finite() || value < min || value > max {
        errors.push(FieldError::new(field, format!("must be between {} and {}", min, max)));
    }
}

fn check_member(errors: &mut Vec<FieldError>, field: &str, value: &str, allowed: &[&str]) {
    if !allowed.contains(&value) {
        errors.push(FieldError::new(field, format!("must be one of {}", allowed.join(", "))));
    }
}

fn looks_like_email(address: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
    re.is_match(address)
}

/// Validate and persist the document.
///
/// The derived TLS booleans are recomputed before serialization, so a stored
/// document can never disagree with its own `smtp_security`. The write goes
/// to a uniquely-named temp file in the target directory, is flushed to disk,
/// and is renamed over `path`; a reader therefore sees either the old
/// document or the new one, never a torn write.
pub fn save(path: &Path, config: &Configuration) -> Result<(), ConfigError> {
    let errors = validate(config);
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors));
    }

    let mut canonical = config.clone();
    canonical.apply_security_mode();
    let mut body = serde_json::to_string_pretty(&canonical)
        .map_err(|e| ConfigError::Persistence(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    body.push('\n');

    write_atomic(path, body.as_bytes())?;
    Ok(())
}

/// Overwrite the document with the built-in defaults and return them.
pub fn reset(path: &Path) -> Result<Configuration, ConfigError> {
    let config = Configuration::default();
    save(path, &config)?;
    Ok(config)
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), io::Error> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config.json".to_string());
    let tmp = dir.join(format!(".{}.{:08x}.tmp", name, rand::random::<u32>()));

    let mut file = File::create(&tmp)?;
    if let Err(err) = file.write_all(contents).and_then(|_| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    drop(file);

    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use tempfile::TempDir;

    fn config_path(dir: &TempDir) -> PathBuf {
        dir.path().join("config.json")
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = load(&config_path(&dir));
        assert_eq!(cfg, Configuration::default());
    }

    #[test]
    fn load_malformed_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        fs::write(&path, "{not json").unwrap();
        assert_eq!(load(&path), Configuration::default());
    }

    #[test]
    fn load_wrong_shape_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        fs::write(&path, r#"{"monitoring": "not an object"}"#).unwrap();
        assert_eq!(load(&path), Configuration::default());
    }

    #[test]
    fn merge_completes_partial_documents() {
        let partial = serde_json::json!({
            "monitoring": { "aircraft_threshold": 50 },
            "web": { "port": 8080 }
        });
        let cfg = merge_defaults(partial);
        assert_eq!(cfg.monitoring.aircraft_threshold, 50);
        assert_eq!(cfg.web.port, 8080);
        // Untouched fields keep their defaults, notably true-by-default flags.
        assert_eq!(cfg.monitoring.check_interval_minutes, 10);
        assert!(cfg.reboot.enabled);
        assert_eq!(cfg.web.timezone, "Europe/London");
    }

    #[test]
    fn merge_is_idempotent() {
        let partial = serde_json::json!({
            "reboot": { "dry_run_mode": true },
            "email": { "smtp_security": "none" }
        });
        let once = merge_defaults(partial);
        let twice = merge_defaults(serde_json::to_value(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_recomputes_security_booleans() {
        let partial = serde_json::json!({
            "email": { "smtp_security": "ssl", "use_tls": true, "use_starttls": true }
        });
        let cfg = merge_defaults(partial);
        assert!(!cfg.email.use_tls);
        assert!(!cfg.email.use_starttls);
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(validate(&Configuration::default()).is_empty());
    }

    #[test]
    fn validation_flags_out_of_range_fields() {
        let mut cfg = Configuration::default();
        cfg.web.port = 80;
        cfg.monitoring.check_interval_minutes = 0;
        cfg.logging.log_level = "CHATTY".to_string();
        cfg.web.timezone = "Mars/Olympus_Mons".to_string();
        let errors = validate(&cfg);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"web.port"));
        assert!(fields.contains(&"monitoring.check_interval_minutes"));
        assert!(fields.contains(&"logging.log_level"));
        assert!(fields.contains(&"web.timezone"));
    }

    #[test]
    fn webhook_url_checked_only_when_enabled() {
        let mut cfg = Configuration::default();
        cfg.notifications.webhook_url = "not a url".to_string();
        assert!(validate(&cfg).is_empty());
        cfg.notifications.webhook_enabled = true;
        assert_eq!(validate(&cfg).len(), 1);
        cfg.notifications.webhook_url = "https://example.net/hook".to_string();
        assert!(validate(&cfg).is_empty());
    }

    #[test]
    fn email_addresses_checked_loosely_when_present() {
        let mut cfg = Configuration::default();
        assert!(validate(&cfg).is_empty(), "empty addresses are allowed");
        cfg.email.to_email = "not-an-address".to_string();
        assert_eq!(validate(&cfg).len(), 1);
        cfg.email.to_email = "alerts@example.net".to_string();
        assert!(validate(&cfg).is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        let mut cfg = Configuration::default();
        cfg.monitoring.aircraft_threshold = 42;
        cfg.web.timezone = "America/New_York".to_string();
        save(&path, &cfg).unwrap();
        assert_eq!(load(&path), cfg);
    }

    #[test]
    fn save_is_byte_stable() {
        let dir = TempDir::new().unwrap();
        let first = config_path(&dir);
        let second = dir.path().join("again.json");
        save(&first, &Configuration::default()).unwrap();
        let reloaded = load(&first);
        save(&second, &reloaded).unwrap();
        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[test]
    fn rejected_save_leaves_disk_untouched() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        save(&path, &Configuration::default()).unwrap();
        let before = fs::read(&path).unwrap();

        let mut bad = Configuration::default();
        bad.web.port = 80;
        match save(&path, &bad) {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors[0].field, "web.port");
            }
            other => panic!("expected validation error, got {:?}", other.err()),
        }
        assert_eq!(fs::read(&path).unwrap(), before);
        // No stray temp files either.
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn save_into_missing_directory_is_a_persistence_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no-such-dir").join("config.json");
        match save(&path, &Configuration::default()) {
            Err(ConfigError::Persistence(_)) => {}
            other => panic!("expected persistence error, got {:?}", other.err()),
        }
    }

    #[test]
    fn unknown_top_level_keys_survive_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        fs::write(
            &path,
            r#"{"web": {"port": 7000}, "experimental": {"shiny": true}}"#,
        )
        .unwrap();
        let cfg = load(&path);
        assert_eq!(cfg.web.port, 7000);
        assert!(cfg.extra.contains_key("experimental"));

        save(&path, &cfg).unwrap();
        let again = load(&path);
        assert_eq!(again.extra["experimental"]["shiny"], serde_json::json!(true));
    }

    #[test]
    fn reset_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        let mut cfg = Configuration::default();
        cfg.web.port = 9999;
        save(&path, &cfg).unwrap();

        let returned = reset(&path).unwrap();
        assert_eq!(returned, Configuration::default());
        assert_eq!(load(&path), Configuration::default());
    }
}
