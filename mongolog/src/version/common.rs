/// Grammar helpers shared by the version parsers.
///
/// The 3.4+ COMMAND/WRITE body is a fixed sequence: preamble, optional
/// originating command, optional plan summary, the counter loop, the lock
/// document, (4.0) the storage document, the protocol tag, and the trailing
/// duration.  The pre-3.4 "legacy" grammar interleaves counters, micros
/// locks, and the duration more loosely, so it gets its own single-loop
/// decoder.  Either way, any mismatch is an ordinary error the dispatcher
/// treats as "try the next version".
use crate::json::parse_json_runes;
use crate::record::{
    Counters, Message, MsgCommand, MsgCommandLegacy, MsgControl, MsgOperation,
    MsgOperationLegacy, PlanStage,
};
use crate::rune::RuneReader;
use crate::value::{Document, Value};

use anyhow::{bail, Result};
use std::collections::HashMap;

/// Raw counter name as printed -> canonical name.  Carried per version.
pub type CounterTable = HashMap<&'static str, &'static str>;

// Operation words the modern WRITE grammar accepts.  Sorted.
const OPERATIONS: &[&str] = &[
    "command",
    "commandReply",
    "compressed",
    "getmore",
    "insert",
    "killcursors",
    "msg",
    "none",
    "query",
    "remove",
    "reply",
    "update",
];

// Operation words of the old grammar.  Sorted.
const LEGACY_OPERATIONS: &[&str] =
    &["command", "getmore", "insert", "killcursors", "query", "remove", "update"];

pub fn modern_counters() -> CounterTable {
    HashMap::from([
        ("cursorid", "cursorid"),
        ("notoreturn", "ntoreturn"),
        ("ntoreturn", "ntoreturn"),
        ("ntoskip", "ntoskip"),
        ("exhaust", "exhaust"),
        ("keysExamined", "keysExamined"),
        ("docsExamined", "docsExamined"),
        ("hasSortStage", "hasSortStage"),
        ("fromMultiPlanner", "fromMultiPlanner"),
        ("replanned", "replanned"),
        ("nMatched", "nmatched"),
        ("nModified", "nmodified"),
        ("ninserted", "ninserted"),
        ("ndeleted", "ndeleted"),
        ("nreturned", "nreturned"),
        ("fastmodinsert", "fastmodinsert"),
        ("upsert", "upsert"),
        ("cursorExhausted", "cursorExhausted"),
        ("nmoved", "nmoved"),
        ("keysInserted", "keysInserted"),
        ("keysDeleted", "keysDeleted"),
        ("writeConflicts", "writeConflicts"),
        ("numYields", "numYields"),
        ("reslen", "reslen"),
    ])
}

pub fn legacy_counters() -> CounterTable {
    HashMap::from([
        ("cursorid", "cursorid"),
        ("ntoreturn", "ntoreturn"),
        ("ntoskip", "ntoskip"),
        ("exhaust", "exhaust"),
        ("nscanned", "keysExamined"),
        ("nscannedObjects", "docsExamined"),
        ("keysExamined", "keysExamined"),
        ("docsExamined", "docsExamined"),
        ("idhack", "idhack"),
        ("scanAndOrder", "scanAndOrder"),
        ("hasSortStage", "hasSortStage"),
        ("nmoved", "nmoved"),
        ("nMatched", "nmatched"),
        ("nModified", "nmodified"),
        ("ninserted", "ninserted"),
        ("ndeleted", "ndeleted"),
        ("nreturned", "nreturned"),
        ("fastmod", "fastmod"),
        ("fastmodinsert", "fastmodinsert"),
        ("upsert", "upsert"),
        ("cursorExhausted", "cursorExhausted"),
        ("keyUpdates", "keyUpdates"),
        ("writeConflicts", "writeConflicts"),
        ("numYields", "numYields"),
        ("reslen", "reslen"),
    ])
}

/// `name:integer`, canonicalized through the rename table.  False when the
/// word is not a recognized counter.
pub fn integer_key_value(word: &str, counters: &mut Counters, table: &CounterTable) -> bool {
    if let Some((name, value)) = word.split_once(':') {
        if let Some(canonical) = table.get(name) {
            if let Ok(n) = value.parse::<i64>() {
                counters.insert(canonical.to_string(), n);
                return true;
            }
        }
    }
    false
}

fn is_counter_word(word: &str, table: &CounterTable) -> bool {
    match word.split_once(':') {
        Some((name, value)) => table.contains_key(name) && value.parse::<i64>().is_ok(),
        None => false,
    }
}

/// Free-form exception text following `exception:`.  Runs to the next
/// recognized counter or the lock document; empty text is a format error.
pub fn exception(r: &mut RuneReader, table: &CounterTable) -> Result<String> {
    let mut words: Vec<String> = vec![];
    loop {
        match r.preview_word(1) {
            None => break,
            Some(w) if w.starts_with("locks") => break,
            Some(w) if is_counter_word(&w, table) => break,
            Some(_) => words.push(r.slurp_word().unwrap()),
        }
    }
    if words.is_empty() {
        bail!("unexpected exception format");
    }
    Ok(words.join(" "))
}

/// `command <ns> [appName: "..."] command: <name> [<payload>]`.
pub fn command_preamble(r: &mut RuneReader) -> Result<(String, String, Document)> {
    match r.slurp_word() {
        None => bail!("premature end of line"),
        Some(w) if w == "command" => {}
        Some(w) => bail!("unexpected leading word '{}'", w),
    }
    let namespace = match r.slurp_word() {
        Some(ns) => ns,
        None => bail!("premature end of line"),
    };
    r.chomp_ws();
    if r.expect_string("appName:") {
        r.chomp_ws();
        if r.peek_rune() == Some('"') {
            r.enclosed_string('"', true)?;
        } else {
            r.slurp_word();
        }
        r.chomp_ws();
    }
    if !r.expect_string("command:") {
        bail!("unexpected command structure");
    }
    let name = match r.slurp_word() {
        Some(w) if !w.starts_with('{') => w,
        _ => bail!("unexpected command structure"),
    };
    r.chomp_ws();
    let payload = if r.peek_rune() == Some('{') {
        parse_json_runes(r, false)?
    } else {
        Document::new()
    };
    Ok((namespace, name, payload))
}

/// `planSummary:` has already been consumed; reads one or more stages,
/// each optionally carrying its index document.
pub fn plan_summary(r: &mut RuneReader) -> Result<Vec<PlanStage>> {
    let mut stages = vec![];
    loop {
        let word = match r.slurp_word() {
            Some(w) => w,
            None => break,
        };
        let mut more = word.ends_with(',');
        let stage = word.trim_end_matches(',').to_string();
        // Stage names are all-caps; anything else belongs to the counters.
        if stage.is_empty() || !stage.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
            r.rewind_slurp_word();
            break;
        }
        r.chomp_ws();
        let mut index = None;
        if r.peek_rune() == Some('{') {
            index = Some(parse_json_runes(r, false)?);
            r.chomp_ws();
            if r.expect_rune(',') {
                more = true;
            }
        }
        stages.push(PlanStage { stage, index });
        if !more {
            break;
        }
    }
    if stages.is_empty() {
        bail!("empty plan summary");
    }
    Ok(stages)
}

pub fn locks(r: &mut RuneReader) -> Result<Document> {
    r.chomp_ws();
    if !r.expect_string("locks:") {
        bail!("expected lock document");
    }
    parse_json_runes(r, false)
}

/// 4.0 prints storage accounting between locks and protocol; absent
/// elsewhere, so a missing document is an empty one.
pub fn storage(r: &mut RuneReader) -> Result<Document> {
    r.chomp_ws();
    if r.expect_string("storage:") {
        parse_json_runes(r, false)
    } else {
        Ok(Document::new())
    }
}

pub fn protocol(r: &mut RuneReader) -> Result<String> {
    match r.slurp_word() {
        None => bail!("premature end of line"),
        Some(w) => match w.strip_prefix("protocol:") {
            Some(p) => Ok(p.to_string()),
            None => bail!("expected protocol, found '{}'", w),
        },
    }
}

/// The trailing `<integer>ms`.
pub fn duration(r: &mut RuneReader) -> Result<i64> {
    match r.slurp_word() {
        None => bail!("premature end of line"),
        Some(w) => match w.strip_suffix("ms").map(str::parse::<i64>) {
            Some(Ok(n)) if n >= 0 => Ok(n),
            _ => bail!("expected duration, found '{}'", w),
        },
    }
}

/// The full 3.4+ COMMAND body.
pub fn command(r: &mut RuneReader, table: &CounterTable, with_storage: bool) -> Result<MsgCommand> {
    let (namespace, name, payload) = command_preamble(r)?;
    let mut msg = MsgCommand {
        namespace,
        command: name,
        payload,
        ..MsgCommand::default()
    };

    r.chomp_ws();
    if r.expect_string("originatingCommand:") {
        r.chomp_ws();
        msg.originating_command = Some(parse_json_runes(r, false)?);
        r.chomp_ws();
    }
    if r.expect_string("planSummary:") {
        r.chomp_ws();
        msg.plan_summary = plan_summary(r)?;
    }

    loop {
        let word = match r.slurp_word() {
            Some(w) => w,
            None => break,
        };
        if word == "exception:" {
            msg.exception = exception(r, table)?;
        } else if word.starts_with("locks:") {
            r.rewind_slurp_word();
            break;
        } else if !integer_key_value(&word, &mut msg.counters, table) {
            bail!("unrecognized counter '{}'", word);
        }
    }

    msg.locks = locks(r)?;
    if with_storage {
        msg.storage = storage(r)?;
    }
    msg.protocol = protocol(r)?;
    if !matches!(msg.protocol.as_str(), "op_msg" | "op_query" | "op_command") {
        bail!("unexpected protocol '{}'", msg.protocol);
    }
    msg.duration_ms = duration(r)?;
    Ok(msg)
}

/// The full 3.4+ WRITE body.
pub fn operation(
    r: &mut RuneReader,
    table: &CounterTable,
    with_storage: bool,
) -> Result<MsgOperation> {
    let operation = match r.slurp_word() {
        Some(w) => w,
        None => bail!("premature end of line"),
    };
    if OPERATIONS.binary_search(&operation.as_str()).is_err() {
        bail!("unexpected operation '{}'", operation);
    }
    let namespace = match r.slurp_word() {
        Some(ns) => ns,
        None => bail!("premature end of line"),
    };

    // The payload always follows a literal "command:" word, as a document.
    match r.slurp_word() {
        None => bail!("premature end of line"),
        Some(w) if w == "command:" => {}
        Some(w) => bail!("unexpected word '{}'", w),
    }
    r.chomp_ws();
    if r.peek_rune() != Some('{') {
        bail!("unexpected operation structure");
    }
    let mut msg = MsgOperation {
        namespace,
        operation,
        payload: parse_json_runes(r, false)?,
        ..MsgOperation::default()
    };

    r.chomp_ws();
    if r.expect_string("originatingCommand:") {
        r.chomp_ws();
        msg.originating_command = Some(parse_json_runes(r, false)?);
        r.chomp_ws();
    }
    if r.expect_string("planSummary:") {
        r.chomp_ws();
        msg.plan_summary = plan_summary(r)?;
    }

    loop {
        let word = match r.slurp_word() {
            Some(w) => w,
            None => break,
        };
        if word == "exception:" {
            msg.exception = exception(r, table)?;
        } else if word.starts_with("locks:") {
            r.rewind_slurp_word();
            break;
        } else if !integer_key_value(&word, &mut msg.counters, table) {
            bail!("unrecognized counter '{}'", word);
        }
    }

    msg.locks = locks(r)?;
    if with_storage {
        msg.storage = storage(r)?;
    }
    msg.duration_ms = duration(r)?;
    Ok(msg)
}

/// The pre-3.4 COMMAND body: `command <ns> command: <name|{payload}> ...`.
/// 2.x names the command only by the first payload key.
pub fn command_legacy(r: &mut RuneReader, table: &CounterTable) -> Result<MsgCommandLegacy> {
    match r.slurp_word() {
        None => bail!("premature end of line"),
        Some(w) if w == "command" => {}
        Some(w) => bail!("unexpected leading word '{}'", w),
    }
    let namespace = match r.slurp_word() {
        Some(ns) => ns,
        None => bail!("premature end of line"),
    };
    r.chomp_ws();
    if !r.expect_string("command:") {
        bail!("unexpected command structure");
    }
    r.chomp_ws();
    let (command, payload) = if r.peek_rune() == Some('{') {
        let payload = parse_json_runes(r, false)?;
        let name = match payload.first_key() {
            Some(k) => k.to_string(),
            None => bail!("empty command payload"),
        };
        (name, payload)
    } else {
        let name = match r.slurp_word() {
            Some(w) => w,
            None => bail!("premature end of line"),
        };
        r.chomp_ws();
        let payload = if r.peek_rune() == Some('{') {
            parse_json_runes(r, false)?
        } else {
            Document::new()
        };
        (name, payload)
    };

    let mut msg = MsgCommandLegacy {
        namespace,
        command,
        payload,
        ..MsgCommandLegacy::default()
    };
    r.chomp_ws();
    if r.expect_string("planSummary:") {
        r.chomp_ws();
        msg.plan_summary = plan_summary(r)?;
    }
    msg.duration_ms = legacy_tail(r, table, &mut msg.counters, &mut msg.locks, &mut msg.exception)?;
    Ok(msg)
}

/// The pre-3.4 operation body: `<op> <ns> [tag: {doc}]... ...`.  Tagged
/// documents (`query:`, `update:`, `getMore:`) collect into the payload
/// under their tag names.
pub fn operation_legacy(r: &mut RuneReader, table: &CounterTable) -> Result<MsgOperationLegacy> {
    let operation = match r.slurp_word() {
        Some(w) => w,
        None => bail!("premature end of line"),
    };
    if LEGACY_OPERATIONS.binary_search(&operation.as_str()).is_err() {
        bail!("unexpected operation '{}'", operation);
    }
    let namespace = match r.slurp_word() {
        Some(ns) => ns,
        None => bail!("premature end of line"),
    };

    let mut msg = MsgOperationLegacy {
        namespace,
        operation,
        ..MsgOperationLegacy::default()
    };

    loop {
        let tag = match r.preview_word(1) {
            Some(w) if w.ends_with(':') && !w.starts_with("locks") => w,
            _ => break,
        };
        let save = r.pos();
        r.slurp_word();
        r.chomp_ws();
        if r.peek_rune() != Some('{') {
            r.seek(save);
            break;
        }
        let doc = parse_json_runes(r, false)?;
        msg.payload
            .insert(tag.trim_end_matches(':').to_string(), Value::Object(doc));
    }

    r.chomp_ws();
    if r.expect_string("planSummary:") {
        r.chomp_ws();
        msg.plan_summary = plan_summary(r)?;
    }
    msg.duration_ms = legacy_tail(r, table, &mut msg.counters, &mut msg.locks, &mut msg.exception)?;
    Ok(msg)
}

// Counters, locks (either `locks(micros) w:290` or the 3.0 JSON form), an
// optional exception, and the closing duration, in whatever order the old
// servers printed them.  The duration terminates the line.
fn legacy_tail(
    r: &mut RuneReader,
    table: &CounterTable,
    counters: &mut Counters,
    locks: &mut Document,
    exception_text: &mut String,
) -> Result<i64> {
    loop {
        let word = match r.slurp_word() {
            Some(w) => w,
            None => bail!("premature end of line"),
        };
        if word == "exception:" {
            *exception_text = exception(r, table)?;
            continue;
        }
        if word == "locks(micros)" {
            while let Some(next) = r.preview_word(1) {
                match next.split_once(':') {
                    Some((name, value))
                        if name.len() <= 2
                            && name.chars().all(|c| "rwRW".contains(c)) =>
                    {
                        match value.parse::<i64>() {
                            Ok(n) => {
                                r.slurp_word();
                                locks.insert(name.to_string(), Value::Int64(n));
                            }
                            Err(_) => break,
                        }
                    }
                    _ => break,
                }
            }
            continue;
        }
        if word.starts_with("locks:") {
            r.rewind_slurp_word();
            r.chomp_ws();
            r.expect_string("locks:");
            *locks = parse_json_runes(r, false)?;
            continue;
        }
        if let Some(Ok(n)) = word.strip_suffix("ms").map(str::parse::<i64>) {
            if n >= 0 {
                return Ok(n);
            }
            bail!("unexpected duration '{}'", word);
        }
        if !integer_key_value(&word, counters, table) {
            bail!("unrecognized counter '{}'", word);
        }
    }
}

/// CONTROL component lines; the summary wants the version announcements.
pub fn control(r: &mut RuneReader) -> Result<Message> {
    let raw = r.remainder();
    if r.expect_string("db version v") {
        return Ok(Message::Control(parse_version_announcement(r, false)?));
    }
    if r.expect_string("mongos version v") || r.expect_string("MongoS version v") {
        return Ok(Message::Control(parse_version_announcement(r, true)?));
    }
    if r.expect_string("MongoDB starting") {
        return Ok(Message::Control(MsgControl::Startup(raw)));
    }
    Ok(Message::Control(MsgControl::Other(raw)))
}

fn parse_version_announcement(r: &mut RuneReader, mongos: bool) -> Result<MsgControl> {
    let word = match r.slurp_word() {
        Some(w) => w,
        None => bail!("premature end of line"),
    };
    let mut parts = word.trim_end_matches(',').splitn(3, '.');
    let major = parse_version_part(parts.next())?;
    let minor = parse_version_part(parts.next())?;
    let patch = parse_version_part(parts.next()).unwrap_or(0);
    Ok(MsgControl::Version { major, minor, patch, mongos })
}

fn parse_version_part(part: Option<&str>) -> Result<u32> {
    // Trailing qualifiers like "3-rc0" reduce to their leading digits.
    let digits: String = part
        .unwrap_or("")
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<u32>() {
        Ok(n) => Ok(n),
        Err(_) => bail!("malformed version string"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_body() {
        let mut r = RuneReader::new(
            "command test.foo appName: \"MongoDB Shell\" command: find \
             { find: \"foo\", filter: { a: 1.0 } } planSummary: COLLSCAN keysExamined:0 \
             docsExamined:3 cursorExhausted:1 numYields:0 nreturned:2 reslen:245 \
             locks:{ Global: { acquireCount: { r: 2 } } } protocol:op_msg 12ms",
        );
        let msg = command(&mut r, &modern_counters(), false).unwrap();
        assert!(msg.namespace == "test.foo");
        assert!(msg.command == "find");
        assert!(msg.payload.contains_key("filter"));
        assert!(msg.plan_summary == vec![PlanStage { stage: "COLLSCAN".to_string(), index: None }]);
        assert!(msg.counters["docsExamined"] == 3);
        assert!(msg.counters["nreturned"] == 2);
        assert!(msg.locks.contains_key("Global"));
        assert!(msg.protocol == "op_msg");
        assert!(msg.duration_ms == 12);
    }

    #[test]
    fn test_command_body_with_storage() {
        let mut r = RuneReader::new(
            "command test.foo command: find { find: \"foo\", filter: { a: 1.0 } } \
             planSummary: IXSCAN { a: 1 } keysExamined:1 docsExamined:1 numYields:0 \
             nreturned:1 reslen:300 locks:{ Global: { acquireCount: { r: 1 } } } \
             storage:{ data: { bytesRead: 12345 } } protocol:op_msg 5ms",
        );
        let msg = command(&mut r, &modern_counters(), true).unwrap();
        assert!(msg.plan_summary[0].stage == "IXSCAN");
        assert!(msg.plan_summary[0].index.as_ref().unwrap().contains_key("a"));
        assert!(msg.storage.contains_key("data"));
        assert!(msg.duration_ms == 5);
    }

    #[test]
    fn test_command_counter_rename() {
        let mut r = RuneReader::new(
            "command test.foo command: find { find: \"foo\" } notoreturn:5 nMatched:1 \
             locks:{} protocol:op_query 0ms",
        );
        let msg = command(&mut r, &modern_counters(), false).unwrap();
        assert!(msg.counters["ntoreturn"] == 5);
        assert!(msg.counters["nmatched"] == 1);
        assert!(!msg.counters.contains_key("nMatched"));
    }

    #[test]
    fn test_command_rejects_unknown_counter() {
        let mut r = RuneReader::new(
            "command test.foo command: find { find: \"foo\" } shinyNewCounter:1 locks:{} \
             protocol:op_msg 0ms",
        );
        assert!(command(&mut r, &modern_counters(), false).is_err());
    }

    #[test]
    fn test_command_rejects_unknown_protocol() {
        let mut r = RuneReader::new(
            "command test.foo command: find { find: \"foo\" } locks:{} protocol:op_future 0ms",
        );
        assert!(command(&mut r, &modern_counters(), false).is_err());
    }

    #[test]
    fn test_command_exception() {
        let mut r = RuneReader::new(
            "command test.foo command: insert { insert: \"foo\" } exception: E11000 duplicate \
             key error collection: test.foo numYields:0 reslen:60 locks:{} protocol:op_msg 1ms",
        );
        let msg = command(&mut r, &modern_counters(), false).unwrap();
        assert!(msg.exception.starts_with("E11000 duplicate key error"));
        assert!(msg.counters["numYields"] == 0);
        assert!(msg.duration_ms == 1);
    }

    #[test]
    fn test_operation_body() {
        let mut r = RuneReader::new(
            "update test.foo command: { q: { a: 1.0 }, u: { $set: { b: 2.0 } } } \
             planSummary: IXSCAN { a: 1 } keysExamined:1 docsExamined:1 nMatched:1 nModified:1 \
             numYields:0 locks:{ Global: { acquireCount: { r: 1, w: 1 } } } 3ms",
        );
        let msg = operation(&mut r, &modern_counters(), false).unwrap();
        assert!(msg.operation == "update");
        assert!(msg.namespace == "test.foo");
        assert!(msg.payload.contains_key("q"));
        assert!(msg.counters["nmodified"] == 1);
        assert!(msg.duration_ms == 3);
    }

    #[test]
    fn test_operation_originating_command() {
        let mut r = RuneReader::new(
            "getmore test.foo command: { getMore: 123456, collection: \"foo\" } \
             originatingCommand: { find: \"foo\", filter: { x: 5 } } \
             planSummary: COLLSCAN cursorid:123456 nreturned:100 reslen:4096 \
             numYields:1 locks:{ Global: { acquireCount: { r: 2 } } } 7ms",
        );
        let msg = operation(&mut r, &modern_counters(), false).unwrap();
        assert!(msg.operation == "getmore");
        let orig = msg.originating_command.unwrap();
        assert!(orig.contains_key("filter"));
        assert!(msg.counters["cursorid"] == 123456);
    }

    #[test]
    fn test_plan_summary_multiple_stages() {
        let mut r = RuneReader::new("IXSCAN { a: 1 }, IXSCAN { b: 1 } keysExamined:2");
        let stages = plan_summary(&mut r).unwrap();
        assert!(stages.len() == 2);
        assert!(stages[0].index.as_ref().unwrap().contains_key("a"));
        assert!(stages[1].index.as_ref().unwrap().contains_key("b"));
        assert!(r.slurp_word().unwrap() == "keysExamined:2");
    }

    #[test]
    fn test_command_legacy_named_payload() {
        let mut r = RuneReader::new(
            "command test.$cmd command: count { count: \"foo\", query: { a: 1.0 } } \
             planSummary: COLLSCAN keyUpdates:0 writeConflicts:0 numYields:0 reslen:62 \
             locks:{ Global: { acquireCount: { r: 2 } } } 42ms",
        );
        let msg = command_legacy(&mut r, &legacy_counters()).unwrap();
        assert!(msg.command == "count");
        assert!(msg.locks.contains_key("Global"));
        assert!(msg.duration_ms == 42);
    }

    #[test]
    fn test_command_legacy_anonymous_payload() {
        let mut r = RuneReader::new(
            "command admin.$cmd command: { isMaster: 1.0 } ntoreturn:1 keyUpdates:0 \
             locks(micros) r:73 reslen:178 0ms",
        );
        let msg = command_legacy(&mut r, &legacy_counters()).unwrap();
        assert!(msg.command == "isMaster");
        assert!(*msg.locks.get("r").unwrap() == Value::Int64(73));
        assert!(msg.duration_ms == 0);
    }

    #[test]
    fn test_operation_legacy() {
        let mut r = RuneReader::new(
            "query test.foo query: { a: 1.0 } planSummary: COLLSCAN ntoreturn:0 ntoskip:0 \
             nscanned:10 keyUpdates:0 numYields:0 locks(micros) r:103 nreturned:10 reslen:459 103ms",
        );
        let msg = operation_legacy(&mut r, &legacy_counters()).unwrap();
        assert!(msg.operation == "query");
        assert!(msg.counters["keysExamined"] == 10);
        assert!(msg.counters["nreturned"] == 10);
        assert!(*msg.locks.get("r").unwrap() == Value::Int64(103));
        assert!(msg.duration_ms == 103);
    }

    #[test]
    fn test_operation_legacy_update() {
        let mut r = RuneReader::new(
            "update test.foo query: { a: 1.0 } update: { $set: { b: 2.0 } } nscanned:1 \
             nMatched:1 nModified:1 keyUpdates:0 numYields:0 locks(micros) w:150 0ms",
        );
        let msg = operation_legacy(&mut r, &legacy_counters()).unwrap();
        assert!(msg.payload.contains_key("query"));
        assert!(msg.payload.contains_key("update"));
        assert!(msg.counters["nmatched"] == 1);
    }

    #[test]
    fn test_control_version() {
        let mut r = RuneReader::new("db version v3.6.3");
        match control(&mut r).unwrap() {
            Message::Control(MsgControl::Version { major, minor, patch, mongos }) => {
                assert!((major, minor, patch) == (3, 6, 3));
                assert!(!mongos);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
