//! Feederwatch - monitoring data aggregation and configuration lifecycle
//! for an FR24 feeder watchdog.
//!
//! The monitor daemon writes samples and remediation events and consults the
//! notification policy; the `feederwatch` binary serves the aggregated
//! dashboard and the settings lifecycle over a JSON API.

pub mod config;
pub mod db;
pub mod notify;
pub mod retention;
pub mod stats;
pub mod tz;
pub mod web;
