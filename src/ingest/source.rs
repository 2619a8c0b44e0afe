//! JSON-lines event source
//!
//! One `EventRecord` per line, in chain order.

use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::domain::{DomainError, EventRecord};

/// Line-numbered record; parse failures are kept as malformed entries
pub type SourceItem = (usize, Result<EventRecord, DomainError>);

pub struct JsonLinesSource<R = BufReader<File>> {
    lines: Lines<R>,
    line_number: usize,
}

impl JsonLinesSource {
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin> JsonLinesSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }

    /// Next non-blank line, numbered from 1
    pub async fn next_record(&mut self) -> std::io::Result<Option<SourceItem>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some((self.line_number, parse_line(&line))));
        }
        Ok(None)
    }
}

fn parse_line(line: &str) -> Result<EventRecord, DomainError> {
    serde_json::from_str(line).map_err(|e| DomainError::invalid_field("record", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_numbered_records() {
        let input = concat!(
            r#"{"kind":"Paused","tx_hash":"0x01","log_index":0,"block_number":1,"block_timestamp":1,"params":{"account":"0xAA"}}"#,
            "\n\n",
            "not json\n",
            r#"{"kind":"Unpaused","tx_hash":"0x02","log_index":0,"block_number":2,"block_timestamp":2,"params":{"account":"0xAA"}}"#,
            "\n",
        );

        let mut source = JsonLinesSource::from_reader(input.as_bytes());
        let mut items = Vec::new();
        while let Some(item) = source.next_record().await.unwrap() {
            items.push(item);
        }

        let numbers: Vec<usize> = items.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![1, 3, 4]);
        assert_eq!(items[0].1.as_ref().unwrap().kind.as_deref(), Some("Paused"));
        assert!(matches!(
            items[1].1,
            Err(DomainError::InvalidField { field: "record", .. })
        ));
        assert_eq!(items[2].1.as_ref().unwrap().block_number, Some(2));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let result = JsonLinesSource::open("/nonexistent/events.jsonl").await;
        assert!(result.is_err());
    }
}
