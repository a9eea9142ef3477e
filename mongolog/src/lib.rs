/// A MongoDB server log is a structured log only by courtesy: every line
/// starts with a recognizable prefix (date, severity, component, context)
/// but the body is free text interleaved with JSON-ish documents whose
/// grammar drifted from release to release.  This library decodes those
/// lines into structured records and canonicalizes query filters into
/// stable shapes ("patterns") for aggregation.
///
/// Decoding runs leaves-first:
///
/// - The base tokenizer splits off the prefix without touching the body
///   and fails fast on lines with no recognizable date or context.
///
/// - A dispatcher tries version-specific parsers (2.4 through 4.0, mongod
///   and mongos) against the body.  Parsers are cheap to reject: each has
///   a guard over the prefix shape, and any grammar mismatch in the body
///   just moves the dispatcher to the next candidate.  The parser that
///   accepted the previous line is tried first, which makes dispatch on a
///   homogeneous log effectively free.
///
/// - The version parsers share a permissive JSON parser that accepts the
///   server's extended, non-strict syntax: unquoted keys, single-quoted
///   strings, bare regex literals, constructors, and extended-JSON type
///   wrappers.  A strict mode is available for callers that want plain
///   JSON validation.
///
/// - Filter documents reduce to patterns: literal leaves collapse to a
///   sentinel while structural operators survive, so that all point reads
///   on a field aggregate under one shape.
///
/// No line error is fatal; the worst outcome for a line is that the caller
/// counts it as an error and moves on.
mod base;
mod crud;
mod dates;
mod json;
mod pattern;
mod record;
mod rune;
mod value;
mod version;

// Timestamps are chrono instants in UTC; raw date text is parsed by the
// injected DateParser so the rest of the core treats dates as opaque.

pub use dates::DateParser;
pub use dates::Timestamp;

// The value model: a tagged Value and an insertion-ordered Document.

pub use value::Document;
pub use value::Value;

// The permissive JSON-ish parser, over a string or an existing cursor.

pub use json::parse_json;
pub use json::parse_json_runes;

// The rune cursor the parsers share.

pub use rune::RuneReader;

// Prefix tokenization: a compiled BaseParser turns one raw line into a
// Base or fails with an unrecognized-date / missing-context error.

pub use base::BaseParser;

// Records at the successive decoding stages.

pub use record::Base;
pub use record::Counters;
pub use record::Entry;
pub use record::Message;
pub use record::MsgCommand;
pub use record::MsgCommandLegacy;
pub use record::MsgControl;
pub use record::MsgOperation;
pub use record::MsgOperationLegacy;
pub use record::PlanStage;
pub use record::Severity;

// Version dispatch: build the parser list once, thread a Context through
// each worker, and let it stay sticky on the accepting parser.

pub use version::default_parsers;
pub use version::Binary;
pub use version::Context;
pub use version::VersionDefinition;
pub use version::VersionParser;

// Query shapes.

pub use pattern::Pattern;

// Locate the filter document inside a decoded message.

pub use crud::filter_document;
