/// mongod 3.0.  Severity and component are present but the body still uses
/// the legacy grammar: no protocol tag, reads logged under QUERY (or even
/// COMMAND), and a JSON lock document.
use super::common::{self, CounterTable};
use super::{Binary, VersionDefinition, VersionParser};
use crate::record::{Base, Message, Severity};
use crate::rune::RuneReader;

use anyhow::{bail, Result};

pub struct Version30Parser {
    counters: CounterTable,
}

impl Version30Parser {
    pub fn new() -> Version30Parser {
        Version30Parser {
            counters: common::legacy_counters(),
        }
    }
}

impl VersionParser for Version30Parser {
    fn check(&self, base: &Base) -> bool {
        !base.c_string && base.severity != Severity::None && !base.raw_component.is_empty()
    }

    fn new_log_message(&self, base: &Base) -> Result<Message> {
        let mut r = RuneReader::new(&base.raw_message);
        match base.raw_component.as_str() {
            "COMMAND" => {
                // 3.0 sometimes logs plain query operations under COMMAND.
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
            _ => bail!("version 3.0 unmatched"),
        }
    }

    fn version(&self) -> VersionDefinition {
        VersionDefinition { major: 3, minor: 0, binary: Binary::Mongod }
    }
}
