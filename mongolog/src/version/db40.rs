/// mongod 4.0.  Same grammar as 3.6 except that storage accounting may
/// appear after the lock document.
use super::common::{self, CounterTable};
use super::{Binary, VersionDefinition, VersionParser};
use crate::record::{Base, Message, Severity};
use crate::rune::RuneReader;

use anyhow::{bail, Result};

pub struct Version40Parser {
    counters: CounterTable,
}

impl Version40Parser {
    pub fn new() -> Version40Parser {
        Version40Parser {
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
                | "CONNPOOL"
                | "CONTROL"
                | "DEFAULT"
                | "EXECUTOR"
                | "FTDC"
                | "GEO"
                | "HEARTBEATS"
                | "INDEX"
                | "JOURNAL"
                | "NETWORK"
                | "QUERY"
                | "REPL"
                | "REPL_HB"
                | "REPLICATION"
                | "ROLLBACK"
                | "SHARDING"
                | "STORAGE"
                | "TOTAL"
                | "TRACKING"
                | "WRITE"
                | "-"
        )
    }
}

impl VersionParser for Version40Parser {
    fn check(&self, base: &Base) -> bool {
        !base.c_string
            && base.severity != Severity::None
            && Self::expected_component(&base.raw_component)
    }

    fn new_log_message(&self, base: &Base) -> Result<Message> {
        let mut r = RuneReader::new(&base.raw_message);
        match base.raw_component.as_str() {
            "COMMAND" => Ok(Message::Command(common::command(&mut r, &self.counters, true)?)),
            "WRITE" => Ok(Message::Operation(common::operation(&mut r, &self.counters, true)?)),
            "CONTROL" => common::control(&mut r),
            "NETWORK" => Ok(Message::Network(base.raw_message.clone())),
            "STORAGE" => Ok(Message::Storage(base.raw_message.clone())),
            c if Self::expected_component(c) => Ok(Message::Unparsed(base.raw_message.clone())),
            _ => bail!("version 4.0 unmatched"),
        }
    }

    fn version(&self) -> VersionDefinition {
        VersionDefinition { major: 4, minor: 0, binary: Binary::Mongod }
    }
}
