/// mongos 3.0 and later.  Router logs carry the modern prefix but never
/// the protocol tag or a lock document worth modeling; commands decode
/// through the legacy grammar.
use super::common::{self, CounterTable};
use super::{Binary, VersionDefinition, VersionParser};
use crate::record::{Base, Message, Severity};
use crate::rune::RuneReader;

use anyhow::{bail, Result};

pub struct Version30SParser {
    counters: CounterTable,
}

impl Version30SParser {
    pub fn new() -> Version30SParser {
        Version30SParser {
            counters: common::legacy_counters(),
        }
    }
}

impl VersionParser for Version30SParser {
    fn check(&self, base: &Base) -> bool {
        !base.c_string && base.severity != Severity::None && !base.raw_component.is_empty()
    }

    fn new_log_message(&self, base: &Base) -> Result<Message> {
        let mut r = RuneReader::new(&base.raw_message);
        match base.raw_component.as_str() {
            "COMMAND" => Ok(Message::CommandLegacy(common::command_legacy(
                &mut r,
                &self.counters,
            )?)),
            "CONTROL" => common::control(&mut r),
            "NETWORK" | "SHARDING" => Ok(Message::Network(base.raw_message.clone())),
            _ => bail!("mongos 3.0 unmatched"),
        }
    }

    fn version(&self) -> VersionDefinition {
        VersionDefinition { major: 3, minor: 0, binary: Binary::Mongos }
    }
}
