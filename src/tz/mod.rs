//! Timestamp canonicalization and display-zone handling.
//!
//! Deployed databases hold two timestamp encodings: the legacy naive
//! local-clock form ("2024-06-01 10:00:00") and the canonical explicit-UTC
//! form ("2024-06-01T09:00:00Z"). Everything here converts between those and
//! the single configured display zone. The zone is passed explicitly through
//! every call; nothing consults process-global timezone state.

mod migrate;

pub use migrate::{migrate, MigrationReport};

use std::env;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

/// Format of the legacy naive encoding.
const NAIVE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How a stored timestamp string is to be interpreted.
///
/// Callers state the encoding; it is never guessed from context. The two
/// forms have disjoint syntax (only the canonical one contains a `T`), which
/// is how [`classify`](TimestampEncoding::classify) tells stored rows apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampEncoding {
    /// "YYYY-MM-DD HH:MM:SS" — wall-clock time in some local zone, written by
    /// the legacy schema with no offset recorded.
    NaiveLocal,
    /// RFC 3339 with an explicit offset, normally "...T...Z".
    Utc,
}

impl TimestampEncoding {
    /// Classify stored text by its syntax.
    pub fn classify(raw: &str) -> Self {
        if raw.contains('T') {
            Self::Utc
        } else {
            Self::NaiveLocal
        }
    }
}

/// Parse `raw` under the stated encoding into a UTC instant.
///
/// `NaiveLocal` text is interpreted as wall-clock time in `zone`. A time that
/// occurs twice there (clocks falling back) resolves to the earlier instant; a
/// time skipped over (clocks springing forward) takes the post-transition
/// offset, which is what the legacy writers' runtime did. Unparsable input is
/// `None`, never an error.
pub fn canonicalize(raw: &str, encoding: TimestampEncoding, zone: Tz) -> Option<DateTime<Utc>> {
    match encoding {
        TimestampEncoding::Utc => DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        TimestampEncoding::NaiveLocal => {
            let naive = NaiveDateTime::parse_from_str(raw.trim(), NAIVE_FORMAT).ok()?;
            match zone.from_local_datetime(&naive) {
                LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
                LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
                LocalResult::None => {
                    // Inside a DST gap. Borrow the offset in force once the
                    // gap is over and apply it as a fixed offset.
                    let after_gap = zone
                        .from_local_datetime(&(naive + Duration::hours(3)))
                        .earliest()?;
                    after_gap
                        .offset()
                        .fix()
                        .from_local_datetime(&naive)
                        .single()
                        .map(|dt| dt.with_timezone(&Utc))
                }
            }
        }
    }
}

/// Render an instant as `dd/mm/yyyy HH:mm:ss` in the display zone.
///
/// The format is fixed, not locale-sensitive. Absent or unparsable
/// timestamps render as "N/A".
pub fn format_display(instant: Option<DateTime<Utc>>, zone: Tz) -> String {
    match instant {
        Some(utc) => utc.with_timezone(&zone).format("%d/%m/%Y %H:%M:%S").to_string(),
        None => "N/A".to_string(),
    }
}

/// The zone timestamps are rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayZone(pub Tz);

impl DisplayZone {
    /// Resolve the display zone from the configured name.
    ///
    /// Order: the configured `web.timezone` if it names a real IANA zone,
    /// then the host's declared zone (`TZ`, `/etc/timezone`, or the
    /// `/etc/localtime` symlink — plain reads only), then Europe/London.
    pub fn resolve(configured: &str) -> Self {
        if let Ok(tz) = configured.trim().parse::<Tz>() {
            return Self(tz);
        }
        if let Some(tz) = system_zone() {
            tracing::warn!(
                configured,
                zone = tz.name(),
                "configured timezone is not a valid IANA name, using the system zone"
            );
            return Self(tz);
        }
        tracing::warn!(
            configured,
            "configured timezone is not a valid IANA name and no system zone was found, using Europe/London"
        );
        Self(chrono_tz::Europe::London)
    }

    pub fn tz(&self) -> Tz {
        self.0
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }
}

fn system_zone() -> Option<Tz> {
    if let Ok(name) = env::var("TZ") {
        if let Ok(tz) = name.trim().parse() {
            return Some(tz);
        }
    }
    if let Ok(contents) = fs::read_to_string("/etc/timezone") {
        if let Ok(tz) = contents.trim().parse() {
            return Some(tz);
        }
    }
    if let Ok(target) = fs::read_link("/etc/localtime") {
        if let Some(name) = zone_name_from_localtime(&target) {
            if let Ok(tz) = name.parse() {
                return Some(tz);
            }
        }
    }
    None
}

/// Extract "Europe/London" from ".../zoneinfo/Europe/London".
fn zone_name_from_localtime(target: &Path) -> Option<String> {
    let text = target.to_str()?;
    let start = text.find("zoneinfo/")? + "zoneinfo/".len();
    Some(text[start..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn encodings_have_disjoint_syntax() {
        assert_eq!(
            TimestampEncoding::classify("2024-06-01 10:00:00"),
            TimestampEncoding::NaiveLocal
        );
        assert_eq!(
            TimestampEncoding::classify("2024-06-01T09:00:00Z"),
            TimestampEncoding::Utc
        );
    }

    #[test]
    fn naive_summer_time_converts_to_utc() {
        // London is UTC+1 in June; 10:00 on the wall is 09:00 UTC.
        let got = canonicalize(
            "2024-06-01 10:00:00",
            TimestampEncoding::NaiveLocal,
            chrono_tz::Europe::London,
        );
        assert_eq!(got, Some(utc(2024, 6, 1, 9, 0, 0)));
    }

    #[test]
    fn naive_winter_time_converts_to_utc() {
        let got = canonicalize(
            "2024-01-15 10:00:00",
            TimestampEncoding::NaiveLocal,
            chrono_tz::Europe::London,
        );
        assert_eq!(got, Some(utc(2024, 1, 15, 10, 0, 0)));
    }

    #[test]
    fn explicit_offset_converts_to_utc() {
        let got = canonicalize(
            "2024-06-01T10:00:00+01:00",
            TimestampEncoding::Utc,
            chrono_tz::Europe::London,
        );
        assert_eq!(got, Some(utc(2024, 6, 1, 9, 0, 0)));
    }

    #[test]
    fn ambiguous_local_time_takes_the_earlier_instant() {
        // 2024-10-27 01:30 happens twice in London: 00:30 UTC (still BST)
        // and 01:30 UTC (back on GMT).
        let got = canonicalize(
            "2024-10-27 01:30:00",
            TimestampEncoding::NaiveLocal,
            chrono_tz::Europe::London,
        );
        assert_eq!(got, Some(utc(2024, 10, 27, 0, 30, 0)));
    }

    #[test]
    fn skipped_local_time_takes_the_later_offset() {
        // 2024-03-31 01:30 never happens in London; with the post-gap BST
        // offset applied it reads as 00:30 UTC.
        let got = canonicalize(
            "2024-03-31 01:30:00",
            TimestampEncoding::NaiveLocal,
            chrono_tz::Europe::London,
        );
        assert_eq!(got, Some(utc(2024, 3, 31, 0, 30, 0)));
    }

    #[test]
    fn unparsable_input_is_none() {
        for raw in ["", "garbage", "2024-13-40 99:00:00", "not-a-dateTat-all"] {
            let encoding = TimestampEncoding::classify(raw);
            assert_eq!(
                canonicalize(raw, encoding, chrono_tz::UTC),
                None,
                "raw {:?}",
                raw
            );
        }
    }

    #[test]
    fn display_format_is_day_first_in_zone() {
        let instant = Some(utc(2024, 6, 1, 9, 0, 0));
        assert_eq!(
            format_display(instant, chrono_tz::Europe::London),
            "01/06/2024 10:00:00"
        );
        assert_eq!(format_display(instant, chrono_tz::UTC), "01/06/2024 09:00:00");
    }

    #[test]
    fn missing_instant_displays_na() {
        assert_eq!(format_display(None, chrono_tz::UTC), "N/A");
    }

    #[test]
    fn resolve_prefers_the_configured_zone() {
        let zone = DisplayZone::resolve("Europe/Paris");
        assert_eq!(zone.tz(), chrono_tz::Europe::Paris);
        assert_eq!(zone.name(), "Europe/Paris");
    }

    #[test]
    fn resolve_of_an_invalid_name_still_yields_a_zone() {
        // The exact fallback depends on the host; it must resolve to
        // something usable either way.
        let zone = DisplayZone::resolve("Mars/Olympus_Mons");
        assert!(!zone.name().is_empty());
    }

    #[test]
    fn localtime_symlink_targets_parse() {
        assert_eq!(
            zone_name_from_localtime(Path::new("/usr/share/zoneinfo/Europe/London")),
            Some("Europe/London".to_string())
        );
        assert_eq!(
            zone_name_from_localtime(Path::new("../usr/share/zoneinfo/America/New_York")),
            Some("America/New_York".to_string())
        );
        assert_eq!(zone_name_from_localtime(Path::new("/somewhere/else")), None);
    }
}
