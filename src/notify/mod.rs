//! Notification eligibility and payload construction.
//!
//! The monitor daemon asks this module whether an alert is due before it
//! touches any transport; delivery itself (SMTP dialog, webhook POST) stays
//! outside this crate. Cooldown windows are tracked per channel, so a noisy
//! webhook never starves email or vice versa.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::config::Configuration;
use crate::tz::{format_display, DisplayZone};

/// A delivery channel with its own enabled flag and cooldown clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Webhook,
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Webhook => "webhook",
        }
    }
}

/// The remediation decision the daemon wants to announce.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedAction {
    pub reason: String,
    pub tracked_aircraft: i64,
    /// The configured threshold in force when the decision was made.
    pub threshold: i64,
    pub dry_run: bool,
    pub uptime_hours: f64,
    pub endpoint: String,
}

/// What the daemon should do with the proposed alert.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The channel is switched off (or, for email, has no recipient).
    Disabled,
    /// Inside the cooldown window; try again after this much time.
    Suppressed { retry_after: Duration },
    Send(AlertPayload),
}

/// A fully-rendered alert, ready for whichever transport the channel uses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertPayload {
    pub subject: String,
    pub body: String,
    pub reason: String,
    pub tracked_aircraft: i64,
    pub threshold: i64,
    pub dry_run: bool,
    pub uptime_hours: f64,
    pub endpoint: String,
    pub timestamp: DateTime<Utc>,
}

impl AlertPayload {
    /// JSON body for the webhook POST.
    pub fn webhook_body(&self) -> serde_json::Value {
        serde_json::json!({
            "event": if self.dry_run { "reboot_simulated" } else { "reboot_required" },
            "reason": self.reason,
            "tracked_aircraft": self.tracked_aircraft,
            "threshold": self.threshold,
            "uptime_hours": self.uptime_hours,
            "endpoint": self.endpoint,
            "dry_run": self.dry_run,
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }
}

/// Decide whether an alert goes out on `channel`.
///
/// `last_sent` is the previous successful send on this channel, if any;
/// the caller keeps that clock. Eligibility first, then cooldown: a send is
/// due once `now - last_sent` reaches the configured cooldown.
pub fn evaluate(
    config: &Configuration,
    channel: Channel,
    action: &ProposedAction,
    now: DateTime<Utc>,
    last_sent: Option<DateTime<Utc>>,
) -> Outcome {
    let enabled = match channel {
        Channel::Email => {
            config.notifications.email_enabled && !config.email.to_email.trim().is_empty()
        }
        Channel::Webhook => config.notifications.webhook_enabled,
    };
    if !enabled {
        return Outcome::Disabled;
    }

    let cooldown = Duration::minutes(config.notifications.notification_cooldown_minutes);
    if let Some(prev) = last_sent {
        let elapsed = now - prev;
        if elapsed < cooldown {
            return Outcome::Suppressed {
                retry_after: cooldown - elapsed,
            };
        }
    }

    Outcome::Send(alert_payload(config, action, now))
}

fn alert_payload(config: &Configuration, action: &ProposedAction, now: DateTime<Utc>) -> AlertPayload {
    let zone = DisplayZone::resolve(&config.web.timezone);
    let mut body = format!(
        "Feederwatch detected sustained feed degradation and a reboot is required.\n\
         \n\
         Reason: {}\n\
         Tracked aircraft: {} (threshold: {})\n\
         Uptime: {:.1} hours\n\
         Endpoint: {}\n\
         Time: {} ({})\n",
        action.reason,
        action.tracked_aircraft,
        action.threshold,
        action.uptime_hours,
        action.endpoint,
        format_display(Some(now), zone.tz()),
        zone.name(),
    );
    if action.dry_run {
        body.push_str("\nDry-run mode is enabled: the reboot was logged but not executed.\n");
    }

    AlertPayload {
        subject: config.email.subject.clone(),
        body,
        reason: action.reason.clone(),
        tracked_aircraft: action.tracked_aircraft,
        threshold: action.threshold,
        dry_run: action.dry_run,
        uptime_hours: action.uptime_hours,
        endpoint: action.endpoint.clone(),
        timestamp: now,
    }
}

/// The configuration-verification message behind the "send test email" action.
///
/// Summarizes the transport settings so the operator can confirm what was
/// actually used when the message arrives.
pub fn test_payload(config: &Configuration, zone: Tz, now: DateTime<Utc>) -> AlertPayload {
    let email = &config.email;
    let body = format!(
        "This is a test email to verify your Feederwatch email configuration is working correctly.\n\
         \n\
         Timestamp: {}\n\
         Timezone: {}\n\
         \n\
         If you received this email, your Feederwatch alerts are configured properly and will be\n\
         sent when the system requires a reboot.\n\
         \n\
         Configuration tested:\n\
         - SMTP Server: {}:{}\n\
         - From: {} <{}>\n\
         - To: {}\n\
         - Security: {}\n",
        format_display(Some(now), zone),
        zone.name(),
        email.smtp_host,
        email.smtp_port,
        email.from_name,
        email.from_email,
        email.to_email,
        email.smtp_security.to_uppercase(),
    );

    AlertPayload {
        subject: "Feederwatch Test Email".to_string(),
        body,
        reason: "test".to_string(),
        tracked_aircraft: 0,
        threshold: 0,
        dry_run: false,
        uptime_hours: 0.0,
        endpoint: String::new(),
        timestamp: now,
    }
}
