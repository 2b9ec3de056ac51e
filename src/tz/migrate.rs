//! One-time rewrite of legacy naive timestamps to canonical UTC.

use chrono_tz::Tz;

use crate::db::{encode_time, Store, StoreError, Table};

use super::{canonicalize, TimestampEncoding};

/// Per-table outcome of a migration pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    pub samples_rewritten: usize,
    pub events_rewritten: usize,
}

impl MigrationReport {
    pub fn total(&self) -> usize {
        self.samples_rewritten + self.events_rewritten
    }
}

/// Rewrite every legacy naive timestamp in both tables as RFC 3339 UTC.
///
/// Naive text is reinterpreted as wall-clock time in `zone`, the same zone
/// the legacy writers ran under. Runs at startup before anything is served;
/// a second pass finds nothing left to rewrite. Rows whose text parses as
/// neither encoding are left in place (they already render as "N/A") and
/// counted in a warning.
pub fn migrate(store: &Store, zone: Tz) -> Result<MigrationReport, StoreError> {
    Ok(MigrationReport {
        samples_rewritten: rewrite_table(store, Table::Samples, zone)?,
        events_rewritten: rewrite_table(store, Table::Events, zone)?,
    })
}

fn rewrite_table(store: &Store, table: Table, zone: Tz) -> Result<usize, StoreError> {
    let legacy = store.legacy_timestamps(table)?;
    let mut rewrites = Vec::with_capacity(legacy.len());
    let mut skipped = 0usize;

    for (rowid, raw) in legacy {
        match TimestampEncoding::classify(&raw) {
            // The store query already excludes canonical rows; anything
            // slipping through is left alone.
            TimestampEncoding::Utc => continue,
            TimestampEncoding::NaiveLocal => {
                match canonicalize(&raw, TimestampEncoding::NaiveLocal, zone) {
                    Some(utc) => rewrites.push((rowid, encode_time(utc))),
                    None => skipped += 1,
                }
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(
            table = table.name(),
            skipped,
            "unparsable legacy timestamps left in place"
        );
    }
    if !rewrites.is_empty() {
        store.rewrite_timestamps(table, &rewrites)?;
        tracing::info!(
            table = table.name(),
            rewritten = rewrites.len(),
            zone = zone.name(),
            "canonicalized legacy timestamps"
        );
    }
    Ok(rewrites.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewEvent, NewSample};
    use chrono::{TimeZone, Utc};
    use tempfile::NamedTempFile;

    fn test_store() -> (Store, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        let store = Store::new(file.path()).unwrap();
        (store, file)
    }

    fn sample() -> NewSample {
        NewSample {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            tracked_aircraft: 10,
            uploaded_aircraft: Some(9),
            endpoint: "http://localhost:8754/monitor.json".to_string(),
            feed_status: Some("connected".to_string()),
            feed_server: None,
        }
    }

    fn event() -> NewEvent {
        NewEvent {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            tracked_aircraft: 3,
            threshold: 30,
            reason: "tracked aircraft below threshold".to_string(),
            dry_run: false,
            uptime_hours: 5.0,
            endpoint: "http://localhost:8754/monitor.json".to_string(),
        }
    }

    #[test]
    fn naive_rows_are_rewritten_to_utc() {
        let (store, _file) = test_store();
        let id = store.record_event(&event()).unwrap();
        // Plant the legacy encoding: summer wall-clock time in London.
        store
            .rewrite_timestamps(Table::Events, &[(id, "2024-06-01 10:00:00".to_string())])
            .unwrap();

        let report = migrate(&store, chrono_tz::Europe::London).unwrap();
        assert_eq!(report.events_rewritten, 1);
        assert_eq!(report.samples_rewritten, 0);

        let got = store.latest_event().unwrap().unwrap();
        assert_eq!(
            got.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn canonical_rows_are_untouched_and_reruns_find_nothing() {
        let (store, _file) = test_store();
        store.record_sample(&sample()).unwrap();
        let id = store.record_event(&event()).unwrap();
        store
            .rewrite_timestamps(Table::Events, &[(id, "2024-06-01 10:00:00".to_string())])
            .unwrap();

        let first = migrate(&store, chrono_tz::Europe::London).unwrap();
        assert_eq!(first.total(), 1);

        let second = migrate(&store, chrono_tz::Europe::London).unwrap();
        assert_eq!(second.total(), 0);
    }

    #[test]
    fn legacy_and_canonical_forms_converge() {
        // A naive local row and an explicit-UTC row naming the same instant
        // must be identical once migrated.
        let (store, _file) = test_store();
        let naive_id = store.record_event(&event()).unwrap();
        let mut explicit = event();
        explicit.timestamp = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        store.record_event(&explicit).unwrap();
        store
            .rewrite_timestamps(
                Table::Events,
                &[(naive_id, "2024-06-01 10:00:00".to_string())],
            )
            .unwrap();

        migrate(&store, chrono_tz::Europe::London).unwrap();

        let events = store.recent_events(10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].timestamp, events[1].timestamp);
    }

    #[test]
    fn unparsable_rows_are_left_in_place() {
        let (store, _file) = test_store();
        let id = store.record_event(&event()).unwrap();
        store
            .rewrite_timestamps(Table::Events, &[(id, "not a timestamp".to_string())])
            .unwrap();

        let report = migrate(&store, chrono_tz::UTC).unwrap();
        assert_eq!(report.total(), 0);
        // The row survives and reads back with no timestamp.
        let got = store.latest_event().unwrap().unwrap();
        assert_eq!(got.timestamp, None);
    }

    #[test]
    fn samples_table_is_migrated_too() {
        let (store, _file) = test_store();
        store.record_sample(&sample()).unwrap();
        // A fresh table's first row has rowid 1.
        store
            .rewrite_timestamps(Table::Samples, &[(1, "2024-06-01 10:00:00".to_string())])
            .unwrap();

        let report = migrate(&store, chrono_tz::Europe::London).unwrap();
        assert_eq!(report.samples_rewritten, 1);

        let got = store.latest_sample().unwrap().unwrap();
        assert_eq!(
            got.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap())
        );
    }
}
