/// Pull-style line source over a log file.
///
/// Yields `(line_number, raw_text)` until EOF.  Files starting with the
/// gzip magic bytes are decompressed transparently, so day-old rotated
/// logs can be analyzed in place.  I/O errors after open surface through
/// the iterator; the caller decides whether to abandon the file.
use anyhow::Result;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};

pub struct LineSource {
    reader: Box<dyn BufRead>,
    line: u64,
}

impl LineSource {
    pub fn open(file_name: &str) -> Result<LineSource> {
        let file = File::open(file_name)?;
        Ok(LineSource::from_reader(Box::new(file)))
    }

    pub fn from_reader(reader: Box<dyn Read>) -> LineSource {
        let mut buffered = BufReader::new(reader);
        let gzipped = matches!(buffered.fill_buf(), Ok(buf) if buf.starts_with(&[0x1f, 0x8b]));
        let reader: Box<dyn BufRead> = if gzipped {
            Box::new(BufReader::new(GzDecoder::new(buffered)))
        } else {
            Box::new(buffered)
        };
        LineSource { reader, line: 0 }
    }
}

impl Iterator for LineSource {
    type Item = Result<(u64, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut raw = String::new();
        match self.reader.read_line(&mut raw) {
            Ok(0) => None,
            Ok(_) => {
                self.line += 1;
                while raw.ends_with('\n') || raw.ends_with('\r') {
                    raw.pop();
                }
                Some(Ok((self.line, raw)))
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    #[test]
    fn test_plain_lines() {
        let text = "first line\nsecond line\nunterminated";
        let lines: Vec<(u64, String)> = LineSource::from_reader(Box::new(Cursor::new(
            text.as_bytes().to_vec(),
        )))
        .map(|r| r.unwrap())
        .collect();
        assert!(
            lines
                == vec![
                    (1, "first line".to_string()),
                    (2, "second line".to_string()),
                    (3, "unterminated".to_string()),
                ]
        );
    }

    #[test]
    fn test_gzip_detection() {
        let mut encoder = GzEncoder::new(vec![], Compression::default());
        encoder.write_all(b"compressed line\nanother\n").unwrap();
        let bytes = encoder.finish().unwrap();

        let lines: Vec<(u64, String)> = LineSource::from_reader(Box::new(Cursor::new(bytes)))
            .map(|r| r.unwrap())
            .collect();
        assert!(lines == vec![(1, "compressed line".to_string()), (2, "another".to_string())]);
    }

    #[test]
    fn test_empty_input() {
        let mut source = LineSource::from_reader(Box::new(Cursor::new(vec![])));
        assert!(source.next().is_none());
    }
}
