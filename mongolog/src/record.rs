/// Structured records at the three stages of line decoding: the Base line
/// (prefix split off, body untouched), the Entry (timestamp resolved, body
/// decoded), and the Message variants the version parsers produce.
use crate::dates::Timestamp;
use crate::value::Document;

use std::collections::HashMap;
use std::fmt;

/// Single-letter severity codes as printed by 3.0 and later.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Severity {
    #[default]
    None,
    Fatal,
    Error,
    Warning,
    Info,
    Debug,
}

impl Severity {
    /// A severity token is exactly one of the five letters.
    pub fn from_token(tok: &str) -> Option<Severity> {
        match tok {
            "F" => Some(Severity::Fatal),
            "E" => Some(Severity::Error),
            "W" => Some(Severity::Warning),
            "I" => Some(Severity::Info),
            "D" => Some(Severity::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let c = match self {
            Severity::None => '-',
            Severity::Fatal => 'F',
            Severity::Error => 'E',
            Severity::Warning => 'W',
            Severity::Info => 'I',
            Severity::Debug => 'D',
        };
        write!(f, "{}", c)
    }
}

// Union of the component names any supported version prints.  Individual
// version parsers carry their own tighter lists; this one only decides
// whether a prefix token can be a component at all.  Sorted for binary
// search.
const COMPONENTS: &[&str] = &[
    "-",
    "ACCESS",
    "ACCESSCONTROL",
    "ASIO",
    "BRIDGE",
    "COMMAND",
    "CONNPOOL",
    "CONTROL",
    "DEFAULT",
    "EXECUTOR",
    "FTDC",
    "GEO",
    "HEARTBEATS",
    "INDEX",
    "JOURNAL",
    "NETWORK",
    "QUERY",
    "REPL",
    "REPLICATION",
    "REPL_HB",
    "ROLLBACK",
    "SHARDING",
    "STORAGE",
    "TOTAL",
    "TRACKING",
    "WRITE",
];

pub fn is_component(tok: &str) -> bool {
    COMPONENTS.binary_search(&tok).is_ok()
}

/// A raw line split into its prefix fields, with the body left untouched.
/// Version parsers open a fresh rune-cursor over `raw_message`.
#[derive(Clone, Debug, Default)]
pub struct Base {
    pub line_number: u64,
    /// The unparsed date prefix.
    pub raw_date: String,
    /// True when the date was ctime-style (2.4), false for ISO-8601.
    pub c_string: bool,
    pub severity: Severity,
    pub raw_component: String,
    /// The bracketed thread name, without the brackets.
    pub raw_context: String,
    pub raw_message: String,
}

/// A fully decoded line.
#[derive(Clone, Debug)]
pub struct Entry {
    pub line_number: u64,
    pub timestamp: Timestamp,
    pub message: Message,
}

#[derive(Clone, Debug)]
pub enum Message {
    Command(MsgCommand),
    CommandLegacy(MsgCommandLegacy),
    Operation(MsgOperation),
    OperationLegacy(MsgOperationLegacy),
    Control(MsgControl),
    Network(String),
    Storage(String),
    /// Accepted by a version parser but carrying nothing we model.
    Unparsed(String),
}

/// One stage of a plan summary, e.g. `IXSCAN { a: 1 }`.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanStage {
    pub stage: String,
    pub index: Option<Document>,
}

pub type Counters = HashMap<String, i64>;

/// A 3.2+ COMMAND line: `command <ns> command: <name> <payload> ...`.
#[derive(Clone, Debug, Default)]
pub struct MsgCommand {
    pub namespace: String,
    pub command: String,
    pub payload: Document,
    pub originating_command: Option<Document>,
    pub plan_summary: Vec<PlanStage>,
    pub exception: String,
    pub counters: Counters,
    pub locks: Document,
    pub storage: Document,
    pub protocol: String,
    pub duration_ms: i64,
}

/// A pre-protocol COMMAND line (3.0/3.2 and the 2.x command grammar).
#[derive(Clone, Debug, Default)]
pub struct MsgCommandLegacy {
    pub namespace: String,
    pub command: String,
    pub payload: Document,
    pub plan_summary: Vec<PlanStage>,
    pub exception: String,
    pub counters: Counters,
    pub locks: Document,
    pub duration_ms: i64,
}

/// A 3.6+ WRITE line: `<op> <ns> command: <payload> ...`.
#[derive(Clone, Debug, Default)]
pub struct MsgOperation {
    pub namespace: String,
    pub operation: String,
    pub payload: Document,
    pub originating_command: Option<Document>,
    pub plan_summary: Vec<PlanStage>,
    pub exception: String,
    pub counters: Counters,
    pub locks: Document,
    pub storage: Document,
    pub protocol: String,
    pub duration_ms: i64,
}

/// An operation line in the old grammar: `<op> <ns> query: <payload> ...`.
/// 2.x lock micros (`locks(micros) w:290`) land in `locks` keyed by the
/// lock letter; 3.0/3.2 put their JSON lock document there.
#[derive(Clone, Debug, Default)]
pub struct MsgOperationLegacy {
    pub namespace: String,
    pub operation: String,
    pub payload: Document,
    pub plan_summary: Vec<PlanStage>,
    pub exception: String,
    pub counters: Counters,
    pub locks: Document,
    pub duration_ms: i64,
}

/// The slice of CONTROL traffic the summary cares about.
#[derive(Clone, Debug)]
pub enum MsgControl {
    /// `db version v3.6.3` or `mongos version v3.6.3`.
    Version { major: u32, minor: u32, patch: u32, mongos: bool },
    /// `MongoDB starting : pid=... port=... dbpath=...`.
    Startup(String),
    Other(String),
}

impl Message {
    /// The namespace, operation name, and duration of a CRUD-bearing
    /// message; None for everything else.
    pub fn crud_summary(&self) -> Option<(&str, &str, i64)> {
        match self {
            Message::Command(m) => Some((&m.namespace, &m.command, m.duration_ms)),
            Message::CommandLegacy(m) => Some((&m.namespace, &m.command, m.duration_ms)),
            Message::Operation(m) => Some((&m.namespace, &m.operation, m.duration_ms)),
            Message::OperationLegacy(m) => Some((&m.namespace, &m.operation, m.duration_ms)),
            _ => None,
        }
    }

    pub fn counters(&self) -> Option<&Counters> {
        match self {
            Message::Command(m) => Some(&m.counters),
            Message::CommandLegacy(m) => Some(&m.counters),
            Message::Operation(m) => Some(&m.counters),
            Message::OperationLegacy(m) => Some(&m.counters),
            _ => None,
        }
    }
}

#[test]
fn test_severity_tokens() {
    assert!(Severity::from_token("I") == Some(Severity::Info));
    assert!(Severity::from_token("D") == Some(Severity::Debug));
    assert!(Severity::from_token("X").is_none());
    assert!(Severity::from_token("II").is_none());
}

#[test]
fn test_component_set_is_sorted() {
    for w in COMPONENTS.windows(2) {
        assert!(w[0] < w[1], "{} >= {}", w[0], w[1]);
    }
    assert!(is_component("COMMAND"));
    assert!(is_component("-"));
    assert!(!is_component("command"));
    assert!(!is_component("[conn1]"));
}
