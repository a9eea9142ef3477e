/// mongod 2.4, the last release with ctime date prefixes.
use super::common::{self, CounterTable};
use super::db26;
use super::{Binary, VersionDefinition, VersionParser};
use crate::record::{Base, Message};
use crate::rune::RuneReader;

use anyhow::Result;

pub struct Version24Parser {
    counters: CounterTable,
}

impl Version24Parser {
    pub fn new() -> Version24Parser {
        Version24Parser {
            counters: common::legacy_counters(),
        }
    }
}

impl VersionParser for Version24Parser {
    fn check(&self, base: &Base) -> bool {
        base.c_string && base.raw_component.is_empty()
    }

    fn new_log_message(&self, base: &Base) -> Result<Message> {
        let mut r = RuneReader::new(&base.raw_message);
        db26::prefixless_message(&mut r, &base.raw_message, &self.counters)
    }

    fn version(&self) -> VersionDefinition {
        VersionDefinition { major: 2, minor: 4, binary: Binary::Mongod }
    }
}
