/// mongod 2.6.  ISO dates but no severity or component; the context comes
/// right after the date and the body opens with the operation word.
use super::common::{self, CounterTable};
use super::{Binary, VersionDefinition, VersionParser};
use crate::record::{Base, Message, Severity};
use crate::rune::RuneReader;

use anyhow::{bail, Result};

pub struct Version26Parser {
    counters: CounterTable,
}

impl Version26Parser {
    pub fn new() -> Version26Parser {
        Version26Parser {
            counters: common::legacy_counters(),
        }
    }
}

pub(super) fn prefixless_message(
    r: &mut RuneReader,
    raw: &str,
    counters: &CounterTable,
) -> Result<Message> {
    match r.preview_word(1).as_deref() {
        Some("command") => Ok(Message::CommandLegacy(common::command_legacy(r, counters)?)),
        Some("query") | Some("getmore") | Some("insert") | Some("update") | Some("remove")
        | Some("killcursors") => {
            Ok(Message::OperationLegacy(common::operation_legacy(r, counters)?))
        }
        Some("db") | Some("MongoDB") | Some("mongos") | Some("MongoS") => common::control(r),
        Some(_) => Ok(Message::Unparsed(raw.to_string())),
        None => bail!("empty message"),
    }
}

impl VersionParser for Version26Parser {
    fn check(&self, base: &Base) -> bool {
        !base.c_string
            && base.severity == Severity::None
            && base.raw_component.is_empty()
            && !base.raw_context.is_empty()
    }

    fn new_log_message(&self, base: &Base) -> Result<Message> {
        let mut r = RuneReader::new(&base.raw_message);
        prefixless_message(&mut r, &base.raw_message, &self.counters)
    }

    fn version(&self) -> VersionDefinition {
        VersionDefinition { major: 2, minor: 6, binary: Binary::Mongod }
    }
}
