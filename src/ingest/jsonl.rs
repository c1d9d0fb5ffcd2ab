use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// Streaming reader over a gzip-compressed line-delimited JSON file.
/// Blank lines and invalid JSON lines are skipped (logged at debug).
pub struct JsonlGzReader {
    lines: std::io::Lines<BufReader<GzDecoder<File>>>,
    line_no: u64,
}

impl JsonlGzReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(GzDecoder::new(file));
        Ok(JsonlGzReader {
            lines: reader.lines(),
            line_no: 0,
        })
    }
}

impl Iterator for JsonlGzReader {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => return Some(Ok(value)),
                Err(e) => {
                    debug!(line = self.line_no, error = %e, "skipping invalid JSON line");
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_gz(path: &Path, lines: &[&str]) {
        let file = File::create(path).unwrap();
        let mut enc = GzEncoder::new(file, Compression::default());
        for line in lines {
            writeln!(enc, "{line}").unwrap();
        }
        enc.finish().unwrap();
    }

    #[test]
    fn skips_blank_and_invalid_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.jsonl.gz");
        write_gz(
            &path,
            &[
                r#"{"mp3url": "a"}"#,
                "",
                "not json at all",
                r#"{"mp3url": "b"}"#,
            ],
        );
        let values: Vec<Value> = JsonlGzReader::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1]["mp3url"], "b");
    }
}
