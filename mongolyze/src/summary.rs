/// Per-file summary: what was read, which server versions wrote it, and
/// how many lines could not be decoded.
use mongolog::{Binary, Entry, Message, MsgControl, VersionDefinition};

use std::io;

pub struct Summary {
    pub source: String,
    pub versions: Vec<VersionDefinition>,
    pub line_count: u64,
    pub error_count: u64,
}

impl Summary {
    pub fn new(source: &str) -> Summary {
        Summary {
            source: source.to_string(),
            versions: vec![],
            line_count: 0,
            error_count: 0,
        }
    }

    /// Harvest whatever the entry reveals about the server.  Version
    /// announcements on CONTROL lines are authoritative.
    pub fn update(&mut self, entry: &Entry) {
        if let Message::Control(MsgControl::Version { major, minor, mongos, .. }) = entry.message {
            let version = VersionDefinition {
                major,
                minor,
                binary: if mongos { Binary::Mongos } else { Binary::Mongod },
            };
            if !self.versions.contains(&version) {
                self.versions.push(version);
            }
        }
    }

    /// If the log never announced its version, fall back to the versions
    /// whose parsers accepted lines.
    pub fn guess(&mut self, candidates: &[VersionDefinition]) {
        if self.versions.is_empty() {
            self.versions.extend_from_slice(candidates);
        }
    }

    pub fn print(&self, output: &mut dyn io::Write) {
        let versions = if self.versions.is_empty() {
            "unknown".to_string()
        } else {
            self.versions
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<String>>()
                .join(", ")
        };
        // Ignore write errors here, they are common for broken pipelines
        let _ = writeln!(output, "# source: {}", self.source);
        let _ = writeln!(output, "# versions: {}", versions);
        let _ = writeln!(
            output,
            "# lines: {}, errors: {}",
            self.line_count, self.error_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongolog::{BaseParser, Context};

    #[test]
    fn test_version_announcement_wins_over_guess() {
        let bp = BaseParser::new();
        let mut ctx = Context::with_defaults();
        let mut summary = Summary::new("test.log");

        let base = bp
            .parse(1, "2018-06-25T18:09:33.522Z I CONTROL [initandlisten] db version v3.6.3")
            .unwrap();
        let entry = ctx.new_entry(&base).unwrap();
        summary.update(&entry);
        summary.guess(ctx.versions());

        assert!(summary.versions.len() == 1);
        assert!(summary.versions[0].major == 3 && summary.versions[0].minor == 6);
    }

    #[test]
    fn test_guess_fills_in_when_nothing_announced() {
        let mut summary = Summary::new("test.log");
        summary.guess(&[VersionDefinition { major: 3, minor: 4, binary: Binary::Mongod }]);
        assert!(summary.versions.len() == 1);

        let mut out = vec![];
        summary.print(&mut out);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("3.4 (mongod)"));
        assert!(text.contains("errors: 0"));
    }
}
