/// mongod 3.4.  The body grammar matches 3.6; the component set is the
/// tell (3.4 has no HEARTBEATS, REPL_HB, or ROLLBACK).
use super::common::{self, CounterTable};
use super::{Binary, VersionDefinition, VersionParser};
use crate::record::{Base, Message, Severity};
use crate::rune::RuneReader;

use anyhow::{bail, Result};

pub struct Version34Parser {
    counters: CounterTable,
}

impl Version34Parser {
    pub fn new() -> Version34Parser {
        Version34Parser {
            counters: common::modern_counters(),
        }
    }

    fn expected_component(c: &str) -> bool {
        matches!(
            c,
            "ACCESS"
                | "ACCESSCONTROL"
                | "ASIO"
                | "BRIDGE"
                | "COMMAND"
                | "CONTROL"
                | "DEFAULT"
                | "EXECUTOR"
                | "FTDC"
                | "GEO"
                | "INDEX"
                | "JOURNAL"
                | "NETWORK"
                | "QUERY"
                | "REPL"
                | "REPLICATION"
                | "SHARDING"
                | "STORAGE"
                | "TOTAL"
                | "TRACKING"
                | "WRITE"
                | "-"
        )
    }
}

impl VersionParser for Version34Parser {
    fn check(&self, base: &Base) -> bool {
        !base.c_string
            && base.severity != Severity::None
            && Self::expected_component(&base.raw_component)
    }

    fn new_log_message(&self, base: &Base) -> Result<Message> {
        let mut r = RuneReader::new(&base.raw_message);
        match base.raw_component.as_str() {
            "COMMAND" => Ok(Message::Command(common::command(&mut r, &self.counters, false)?)),
            "WRITE" => Ok(Message::Operation(common::operation(&mut r, &self.counters, false)?)),
            "CONTROL" => common::control(&mut r),
            "NETWORK" => Ok(Message::Network(base.raw_message.clone())),
            "STORAGE" => Ok(Message::Storage(base.raw_message.clone())),
            c if Self::expected_component(c) => Ok(Message::Unparsed(base.raw_message.clone())),
            _ => bail!("version 3.4 unmatched"),
        }
    }

    fn version(&self) -> VersionDefinition {
        VersionDefinition { major: 3, minor: 4, binary: Binary::Mongod }
    }
}
