//! HTTP request handlers.

use super::AppState;
use crate::config::{self, ConfigError, Configuration};
use crate::db::{MonitoringSample, RemediationEvent};
use crate::stats::{self, DashboardStats, TREND_WINDOW_HOURS};
use crate::tz::{format_display, DisplayZone};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events shown on the dashboard itself; the events endpoint serves more.
const DASHBOARD_RECENT_EVENTS: i64 = 10;

// ============================================================================
// Views
// ============================================================================

/// A remediation event with its timestamp rendered for display.
#[derive(Debug, Serialize)]
pub struct EventView {
    pub id: i64,
    pub time: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub tracked_aircraft: i64,
    pub threshold: i64,
    pub reason: String,
    pub dry_run: bool,
    pub uptime_hours: f64,
    pub endpoint: String,
}

impl EventView {
    fn render(event: RemediationEvent, zone: &DisplayZone) -> Self {
        Self {
            id: event.id,
            time: format_display(event.timestamp, zone.tz()),
            timestamp: event.timestamp,
            tracked_aircraft: event.tracked_aircraft,
            threshold: event.threshold,
            reason: event.reason,
            dry_run: event.dry_run,
            uptime_hours: event.uptime_hours,
            endpoint: event.endpoint,
        }
    }
}

/// A monitoring sample with its timestamp rendered for display.
#[derive(Debug, Serialize)]
pub struct SampleView {
    pub time: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub tracked_aircraft: i64,
    pub uploaded_aircraft: Option<i64>,
    pub feed_status: Option<String>,
}

impl SampleView {
    fn render(sample: MonitoringSample, zone: &DisplayZone) -> Self {
        Self {
            time: format_display(sample.timestamp, zone.tz()),
            timestamp: sample.timestamp,
            tracked_aircraft: sample.tracked_aircraft,
            uploaded_aircraft: sample.uploaded_aircraft,
            feed_status: sample.feed_status,
        }
    }
}

// ============================================================================
// Dashboard
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub timezone: String,
    pub generated_at: String,
    pub stats: DashboardStats,
    pub latest_sample_time: String,
    pub latest_event_time: String,
    pub recent_events: Vec<EventView>,
    pub auto_refresh_seconds: i64,
}

pub async fn handle_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let config = config::load(&state.config_path);
    let zone = DisplayZone::resolve(&config.web.timezone);
    let now = Utc::now();

    let stats = match stats::collect(&state.store, zone.tz(), now) {
        Ok(stats) => stats,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };
    let recent = match stats::recent_events(
        &state.store,
        DASHBOARD_RECENT_EVENTS,
        config.web.max_reboot_history,
    ) {
        Ok(events) => events,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let latest_sample_time =
        format_display(stats.latest_sample.as_ref().and_then(|s| s.timestamp), zone.tz());
    let latest_event_time =
        format_display(stats.latest_event.as_ref().and_then(|e| e.timestamp), zone.tz());

    Json(DashboardResponse {
        timezone: zone.name().to_string(),
        generated_at: format_display(Some(now), zone.tz()),
        stats,
        latest_sample_time,
        latest_event_time,
        recent_events: recent.into_iter().map(|e| EventView::render(e, &zone)).collect(),
        auto_refresh_seconds: config.web.auto_refresh_seconds,
    })
    .into_response()
}

// ============================================================================
// API: Events
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn handle_get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let config = config::load(&state.config_path);
    let zone = DisplayZone::resolve(&config.web.timezone);
    let cap = config.web.max_reboot_history;

    match stats::recent_events(&state.store, query.limit.unwrap_or(cap), cap) {
        Ok(events) => Json(
            events
                .into_iter()
                .map(|e| EventView::render(e, &zone))
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_delete_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.delete_event(id) {
        // Deleting an id that is already gone is still a 200; the caller
        // learns what happened from the flag.
        Ok(deleted) => Json(serde_json::json!({ "deleted": deleted })).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// API: Trend
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    #[serde(default)]
    pub hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TrendResponse {
    pub timezone: String,
    pub window_hours: i64,
    pub samples: Vec<SampleView>,
}

pub async fn handle_get_trend(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> impl IntoResponse {
    let config = config::load(&state.config_path);
    let zone = DisplayZone::resolve(&config.web.timezone);
    let window_hours = query.hours.unwrap_or(TREND_WINDOW_HOURS).clamp(1, 24 * 7);

    match stats::trend(&state.store, Utc::now(), window_hours) {
        Ok(samples) => Json(TrendResponse {
            timezone: zone.name().to_string(),
            window_hours,
            samples: samples
                .into_iter()
                .map(|s| SampleView::render(s, &zone))
                .collect(),
        })
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// API: Settings
// ============================================================================

pub async fn handle_get_settings(State(state): State<AppState>) -> impl IntoResponse {
    Json(config::load(&state.config_path))
}

/// Wholesale replacement of the configuration document.
///
/// The body must be the complete typed document; a submission missing any
/// field is rejected by deserialization before it gets here, so an absent
/// boolean can never silently flip a default.
pub async fn handle_put_settings(
    State(state): State<AppState>,
    Json(submitted): Json<Configuration>,
) -> impl IntoResponse {
    match config::save(&state.config_path, &submitted) {
        Ok(()) => {
            let mut canonical = submitted;
            canonical.apply_security_mode();
            Json(canonical).into_response()
        }
        Err(ConfigError::Validation(errors)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "errors": errors })),
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_reset_settings(State(state): State<AppState>) -> impl IntoResponse {
    match config::reset(&state.config_path) {
        Ok(config) => Json(config).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
