/// mongod 3.6.
use super::common::{self, CounterTable};
use super::{Binary, VersionDefinition, VersionParser};
use crate::record::{Base, Message, Severity};
use crate::rune::RuneReader;

use anyhow::{bail, Result};

pub struct Version36Parser {
    counters: CounterTable,
}

impl Version36Parser {
    pub fn new() -> Version36Parser {
        Version36Parser {
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

impl VersionParser for Version36Parser {
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
            _ => bail!("version 3.6 unmatched"),
        }
    }

    fn version(&self) -> VersionDefinition {
        VersionDefinition { major: 3, minor: 6, binary: Binary::Mongod }
    }
}
