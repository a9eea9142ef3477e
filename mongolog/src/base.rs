/// Splits a raw log line into its prefix fields: date, severity, component,
/// and the bracketed context, leaving the rest as the raw message for the
/// version parsers.
///
/// Two prefix shapes exist.  Older servers (2.4/2.6) put the context right
/// after the date:
///
///   Wed Feb 13 18:00:04 [conn123] query test.foo ...
///   2014-02-13T18:00:04.709-0500 [conn123] query test.foo ...
///
/// 3.0 and later insert severity and component first:
///
///   2018-06-25T18:09:33.522+0200 I COMMAND [conn4] command test.foo ...
///
/// The scanner fills severity/component/context from up to four tokens and
/// rewinds at the first token that fits none of the slots, so that token
/// stays part of the message.
use crate::record::{is_component, Base, Severity};
use crate::rune::RuneReader;

use anyhow::{bail, Result};
use regex::Regex;

const DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn is_day(tok: &str) -> bool {
    DAYS.contains(&tok)
}

fn is_month(tok: &str) -> bool {
    MONTHS.contains(&tok)
}

fn is_numeric(tok: &str) -> bool {
    !tok.is_empty() && tok.chars().all(|c| c.is_ascii_digit())
}

// HH:MM:SS with an optional fractional part.
fn is_time(tok: &str) -> bool {
    let parts: Vec<&str> = tok.split(':').collect();
    if parts.len() != 3 {
        return false;
    }
    is_numeric(parts[0])
        && is_numeric(parts[1])
        && match parts[2].split_once('.') {
            Some((sec, frac)) => is_numeric(sec) && is_numeric(frac),
            None => is_numeric(parts[2]),
        }
}

pub struct BaseParser {
    iso8601: Regex,
}

impl BaseParser {
    pub fn new() -> BaseParser {
        // Compiled once; the per-line path must not recompile.
        BaseParser {
            iso8601: Regex::new(
                r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?$",
            )
            .unwrap(),
        }
    }

    pub fn parse(&self, line_number: u64, raw: &str) -> Result<Base> {
        let mut r = RuneReader::new(raw);
        let mut base = Base {
            line_number,
            ..Base::default()
        };

        // A leading weekday means a ctime date (2.4); otherwise the first
        // word must be ISO-8601.
        match r.preview_word(1) {
            Some(w) if is_day(&w) => {
                base.raw_date = ctime_date(&mut r);
                base.c_string = true;
            }
            Some(w) if self.iso8601.is_match(&w) => {
                base.raw_date = r.slurp_word().unwrap();
                base.c_string = false;
            }
            _ => {}
        }
        if base.raw_date.is_empty() || r.eol() {
            bail!("unrecognized date format");
        }

        r.chomp_ws();
        if r.peek_rune() == Some('[') {
            // Context-first line; the remainder is all message.
            if let Ok(ctx) = r.enclosed_string(']', false) {
                base.raw_context = ctx;
            }
            r.chomp_ws();
        } else {
            for _ in 0..4 {
                let part = match r.slurp_word() {
                    Some(p) => p,
                    None => break,
                };
                if base.severity == Severity::None
                    && base.raw_component.is_empty()
                    && base.raw_context.is_empty()
                {
                    if let Some(severity) = Severity::from_token(&part) {
                        base.severity = severity;
                        continue;
                    }
                }
                if base.raw_component.is_empty() && is_component(&part) {
                    base.raw_component = part;
                    continue;
                }
                if base.raw_context.is_empty() && part.starts_with('[') {
                    r.rewind_slurp_word();
                    r.chomp_ws();
                    if let Ok(ctx) = r.enclosed_string(']', false) {
                        base.raw_context = ctx;
                        continue;
                    }
                }
                r.rewind_slurp_word();
                break;
            }
            r.chomp_ws();
        }

        // Every supported version prints a context.
        if base.raw_context.is_empty() {
            bail!("missing context");
        }

        base.raw_message = r.remainder();
        Ok(base)
    }
}

// Four tokens, "Wed Feb 13 18:00:04", joined with single spaces.  Returns
// empty on a malformed prefix (the caller turns that into a date error).
fn ctime_date(r: &mut RuneReader) -> String {
    let start = r.pos();
    let mut parts = vec![];
    for _ in 0..4 {
        match r.slurp_word() {
            Some(w) => parts.push(w),
            None => {
                r.seek(start);
                return String::new();
            }
        }
    }
    if !is_day(&parts[0]) || !is_month(&parts[1]) || !is_numeric(&parts[2]) || !is_time(&parts[3]) {
        r.seek(start);
        return String::new();
    }
    parts.join(" ")
}

#[test]
fn test_base_modern_prefix() {
    let p = BaseParser::new();
    let base = p
        .parse(
            7,
            "2018-06-25T18:09:33.522+0200 I COMMAND [conn4] command test.foo command: find { find: \"foo\" }",
        )
        .unwrap();
    assert!(base.line_number == 7);
    assert!(base.raw_date == "2018-06-25T18:09:33.522+0200");
    assert!(!base.c_string);
    assert!(base.severity == Severity::Info);
    assert!(base.raw_component == "COMMAND");
    assert!(base.raw_context == "conn4");
    assert!(base.raw_message.starts_with("command test.foo"));
}

#[test]
fn test_base_context_first() {
    let p = BaseParser::new();
    let base = p
        .parse(1, "2014-02-13T18:00:04.709-0500 [conn123] query test.foo query: { a: 1.0 }")
        .unwrap();
    assert!(!base.c_string);
    assert!(base.severity == Severity::None);
    assert!(base.raw_component.is_empty());
    assert!(base.raw_context == "conn123");
    assert!(base.raw_message.starts_with("query test.foo"));
}

#[test]
fn test_base_ctime() {
    let p = BaseParser::new();
    let base = p
        .parse(1, "Wed Feb 13 18:00:04 [conn1] query test.foo query: { a: 1.0 }")
        .unwrap();
    assert!(base.c_string);
    assert!(base.raw_date == "Wed Feb 13 18:00:04");
    assert!(base.raw_context == "conn1");
    assert!(base.raw_message.starts_with("query test.foo"));
}

#[test]
fn test_base_unrecognized_date() {
    let p = BaseParser::new();
    assert!(p.parse(1, "nonsense all the way down").is_err());
    assert!(p.parse(1, "2018-06-25 18:09:33 I COMMAND [conn4] x").is_err());
    assert!(p.parse(1, "Wed Foo 13 18:00:04 [conn1] x").is_err());
    assert!(p.parse(1, "").is_err());
}

#[test]
fn test_base_missing_context() {
    let p = BaseParser::new();
    assert!(p
        .parse(1, "2018-06-25T18:09:33.522+0200 I COMMAND no context here")
        .is_err());
    // Date alone on the line is a date error, not a context error.
    assert!(p.parse(1, "2018-06-25T18:09:33.522+0200").is_err());
}

#[test]
fn test_base_rewinds_unmatched_token() {
    let p = BaseParser::new();
    // "serverStatus" fits no prefix slot, so the message must keep it even
    // though the context follows later in the line.
    let base = p
        .parse(1, "2018-06-25T18:09:33.522Z I COMMAND [conn4] serverStatus was very slow")
        .unwrap();
    assert!(base.raw_message == "serverStatus was very slow");
}
