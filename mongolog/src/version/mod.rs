/// Version-specific log parsers and the dispatcher that drives them.
///
/// Every supported server release gets a parser carrying its own component
/// whitelist and counter-rename table.  Parsers are stateless; a cheap
/// `check` filters lines that cannot belong to the version (wrong date
/// style, missing severity) before the full body decode runs.
///
/// The dispatcher tries the parser that accepted the previous line first,
/// then falls back through the candidate list in declaration order, and
/// sticks to whichever parser succeeds.  On a homogeneous log this reduces
/// dispatch to a single attempt per line.
///
/// There is no global registry; `default_parsers()` builds the candidate
/// list and each worker owns its own `Context`.
mod common;
mod db24;
mod db26;
mod db30;
mod db32;
mod db34;
mod db36;
mod db40;
mod s30;

use crate::dates::DateParser;
use crate::record::{Base, Entry, Message};

use anyhow::{bail, Result};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binary {
    Mongod,
    Mongos,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionDefinition {
    pub major: u32,
    pub minor: u32,
    pub binary: Binary,
}

impl fmt::Display for VersionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let binary = match self.binary {
            Binary::Mongod => "mongod",
            Binary::Mongos => "mongos",
        };
        write!(f, "{}.{} ({})", self.major, self.minor, binary)
    }
}

pub trait VersionParser {
    /// Cheap guard rejecting lines that cannot belong to this version.
    fn check(&self, base: &Base) -> bool;

    /// Decode the message body.  Any error means "not this version" to the
    /// dispatcher.
    fn new_log_message(&self, base: &Base) -> Result<Message>;

    fn version(&self) -> VersionDefinition;
}

/// All supported parsers, oldest first.
pub fn default_parsers() -> Vec<Box<dyn VersionParser>> {
    vec![
        Box::new(db24::Version24Parser::new()),
        Box::new(db26::Version26Parser::new()),
        Box::new(db30::Version30Parser::new()),
        Box::new(db32::Version32Parser::new()),
        Box::new(db34::Version34Parser::new()),
        Box::new(db36::Version36Parser::new()),
        Box::new(db40::Version40Parser::new()),
        Box::new(s30::Version30SParser::new()),
    ]
}

/// Per-worker dispatch state: the candidate list, the sticky index, the
/// injected date parser, and the set of versions that have accepted lines
/// (used to guess the server version when the log never announces it).
pub struct Context {
    parsers: Vec<Box<dyn VersionParser>>,
    current: Option<usize>,
    date_parser: DateParser,
    seen: Vec<VersionDefinition>,
}

impl Context {
    pub fn new(parsers: Vec<Box<dyn VersionParser>>, date_parser: DateParser) -> Context {
        Context {
            parsers,
            current: None,
            date_parser,
            seen: vec![],
        }
    }

    pub fn with_defaults() -> Context {
        Context::new(default_parsers(), DateParser::new())
    }

    /// Decode one base line into an entry, remembering which parser
    /// succeeded so the next line tries it first.
    pub fn new_entry(&mut self, base: &Base) -> Result<Entry> {
        let timestamp = self.date_parser.parse(&base.raw_date, base.c_string)?;

        if let Some(ix) = self.current {
            if let Some(message) = self.attempt(ix, base) {
                return Ok(Entry { line_number: base.line_number, timestamp, message });
            }
        }
        for ix in 0..self.parsers.len() {
            if Some(ix) == self.current {
                continue;
            }
            if let Some(message) = self.attempt(ix, base) {
                self.current = Some(ix);
                return Ok(Entry { line_number: base.line_number, timestamp, message });
            }
        }
        bail!("no version parser matched line {}", base.line_number)
    }

    fn attempt(&mut self, ix: usize, base: &Base) -> Option<Message> {
        let parser = &self.parsers[ix];
        if !parser.check(base) {
            return None;
        }
        match parser.new_log_message(base) {
            Ok(message) => {
                let version = parser.version();
                if !self.seen.contains(&version) {
                    self.seen.push(version);
                }
                Some(message)
            }
            Err(_) => None,
        }
    }

    /// Versions that have accepted at least one line, in first-seen order.
    pub fn versions(&self) -> &[VersionDefinition] {
        &self.seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::BaseParser;

    #[test]
    fn test_dispatch_modern_command() {
        let bp = BaseParser::new();
        let mut ctx = Context::with_defaults();
        let base = bp
            .parse(
                1,
                "2018-06-25T18:09:33.522+0200 I COMMAND [conn4] command test.foo command: find \
                 { find: \"foo\", filter: { a: 1.0 } } planSummary: COLLSCAN keysExamined:0 \
                 docsExamined:3 numYields:0 nreturned:2 reslen:245 \
                 locks:{ Global: { acquireCount: { r: 2 } } } protocol:op_msg 12ms",
            )
            .unwrap();
        let entry = ctx.new_entry(&base).unwrap();
        match entry.message {
            Message::Command(ref m) => {
                assert!(m.command == "find");
                assert!(m.duration_ms == 12);
            }
            ref other => panic!("unexpected {:?}", other),
        }
        assert!(!ctx.versions().is_empty());
    }

    #[test]
    fn test_dispatch_is_sticky() {
        let bp = BaseParser::new();
        let mut ctx = Context::with_defaults();
        let line = "2018-07-19T10:12:01.404Z I COMMAND [conn8] command test.bar command: find \
                    { find: \"bar\", filter: { b: 2 } } locks:{} protocol:op_msg 2ms";
        let base = bp.parse(1, line).unwrap();
        ctx.new_entry(&base).unwrap();
        let sticky = ctx.current;
        assert!(sticky.is_some());

        let base = bp.parse(2, line).unwrap();
        ctx.new_entry(&base).unwrap();
        assert!(ctx.current == sticky);
        assert!(ctx.versions().len() == 1);
    }

    #[test]
    fn test_dispatch_falls_back_on_format_change() {
        let bp = BaseParser::new();
        let mut ctx = Context::with_defaults();

        // A legacy 2.6-style line first, then a modern one: the context must
        // move from the old parser to the new without erroring.
        let base = bp
            .parse(
                1,
                "2014-02-13T18:00:04.709-0500 [conn123] query test.foo query: { a: 1.0 } \
                 ntoreturn:0 ntoskip:0 nscanned:10 keyUpdates:0 numYields:0 \
                 locks(micros) r:103 nreturned:10 reslen:459 103ms",
            )
            .unwrap();
        let entry = ctx.new_entry(&base).unwrap();
        assert!(matches!(entry.message, Message::OperationLegacy(_)));

        let base = bp
            .parse(
                2,
                "2018-06-25T18:09:33.522Z I COMMAND [conn4] command test.foo command: find \
                 { find: \"foo\" } locks:{} protocol:op_msg 0ms",
            )
            .unwrap();
        let entry = ctx.new_entry(&base).unwrap();
        assert!(matches!(entry.message, Message::Command(_)));
        assert!(ctx.versions().len() == 2);
    }

    #[test]
    fn test_dispatch_rejects_garbage() {
        let bp = BaseParser::new();
        let mut ctx = Context::with_defaults();
        let base = bp
            .parse(1, "2018-06-25T18:09:33.522Z I COMMAND [conn4] command test.foo gibberish")
            .unwrap();
        assert!(ctx.new_entry(&base).is_err());
    }
}
