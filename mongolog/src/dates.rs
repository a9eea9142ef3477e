/// Timestamp handling for log lines.
///
/// Two families of date prefix appear in server logs: ISO-8601 (2.6 and
/// later, with or without milliseconds, with `Z`, `±hh:mm`, `±hhmm`, or no
/// zone at all) and the ctime style `Day Mon DD HH:MM:SS[.mmm]` that 2.4
/// wrote.  The ctime form carries no year; we assume the current one, which
/// is what the server's own tooling does.
use anyhow::{bail, Result};
use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};

pub type Timestamp = DateTime<Utc>;

#[derive(Clone, Copy, Debug, Default)]
pub struct DateParser {}

impl DateParser {
    pub fn new() -> DateParser {
        DateParser {}
    }

    pub fn parse(&self, raw: &str, c_string: bool) -> Result<Timestamp> {
        if c_string {
            parse_ctime(raw)
        } else {
            match parse_iso8601(raw) {
                Some(t) => Ok(t),
                None => bail!("unrecognized date format '{}'", raw),
            }
        }
    }
}

pub fn parse_iso8601(raw: &str) -> Option<Timestamp> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    // 2.6 wrote offsets without the colon, e.g. 2014-02-13T18:00:04.709-0500.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(t) = DateTime::parse_from_str(raw, fmt) {
            return Some(t.with_timezone(&Utc));
        }
    }
    // Local format without any zone; read as UTC.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&t));
        }
    }
    None
}

pub fn from_millis(ms: i64) -> Option<Timestamp> {
    Utc.timestamp_millis_opt(ms).single()
}

fn parse_ctime(raw: &str) -> Result<Timestamp> {
    // The weekday is dropped rather than parsed: with the year assumed to
    // be the current one it would rarely agree with the date, and chrono
    // rejects inconsistent weekdays.
    let rest = match raw.split_once(' ') {
        Some((_, rest)) => rest,
        None => bail!("unrecognized date format '{}'", raw),
    };
    let year = Utc::now().year();
    let with_year = format!("{} {}", year, rest);
    for fmt in ["%Y %b %d %H:%M:%S%.f", "%Y %b %d %H:%M:%S"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(&with_year, fmt) {
            return Ok(Utc.from_utc_datetime(&t));
        }
    }
    bail!("unrecognized date format '{}'", raw)
}

#[test]
fn test_parse_iso8601() {
    let cases = [
        "2018-06-25T18:09:33.522Z",
        "2018-06-25T18:09:33Z",
        "2018-06-25T19:09:33.522+01:00",
        "2014-02-13T18:00:04.709-0500",
        "2018-06-25T18:09:33.522",
    ];
    for raw in cases {
        assert!(parse_iso8601(raw).is_some(), "failed: {}", raw);
    }
    assert!(parse_iso8601("Wed Feb 13 18:00:04").is_none());
    assert!(parse_iso8601("2018-06-25").is_none());

    let t = parse_iso8601("2018-06-25T19:09:33.522+01:00").unwrap();
    assert!(t == parse_iso8601("2018-06-25T18:09:33.522Z").unwrap());
}

#[test]
fn test_parse_ctime() {
    let parser = DateParser::new();
    let t = parser.parse("Wed Feb 13 18:00:04", true).unwrap();
    assert!(t.month() == 2 && t.day() == 13);
    assert!(parser.parse("Wed Xyz 13 18:00:04", true).is_err());
}
