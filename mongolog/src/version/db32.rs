/// mongod 3.2.  Shares the 3.0 legacy grammar.
use super::common::{self, CounterTable};
use super::{Binary, VersionDefinition, VersionParser};
use crate::record::{Base, Message, Severity};
use crate::rune::RuneReader;

use anyhow::{bail, Result};

pub struct Version32Parser {
    counters: CounterTable,
}

impl Version32Parser {
    pub fn new() -> Version32Parser {
        Version32Parser {
            counters: common::legacy_counters(),
        }
    }
}

impl VersionParser for Version32Parser {
    fn check(&self, base: &Base) -> bool {
        !base.c_string && base.severity != Severity::None && !base.raw_component.is_empty()
    }

    fn new_log_message(&self, base: &Base) -> Result<Message> {
        let mut r = RuneReader::new(&base.raw_message);
        match base.raw_component.as_str() {
            "COMMAND" => {
                let mut attempt = r.clone();
                match common::command_legacy(&mut attempt, &self.counters) {
                    Ok(cmd) => Ok(Message::CommandLegacy(cmd)),
                    Err(_) => Ok(Message::OperationLegacy(common::operation_legacy(
                        &mut r,
                        &self.counters,
                    )?)),
                }
            }
            "QUERY" | "WRITE" => Ok(Message::OperationLegacy(common::operation_legacy(
                &mut r,
                &self.counters,
            )?)),
            "CONTROL" => common::control(&mut r),
            "NETWORK" => Ok(Message::Network(base.raw_message.clone())),
            "STORAGE" => Ok(Message::Storage(base.raw_message.clone())),
            c if crate::record::is_component(c) => {
                Ok(Message::Unparsed(base.raw_message.clone()))
            }
            _ => bail!("version 3.2 unmatched"),
        }
    }

    fn version(&self) -> VersionDefinition {
        VersionDefinition { major: 3, minor: 2, binary: Binary::Mongod }
    }
}
