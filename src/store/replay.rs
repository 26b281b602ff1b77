//!
//! The lazy merged read: every record across every replica log from a
//! baseline offset map on, ordered by the timestamp embedded in each
//! record's IV, ties broken by replica id. A k-way merge holds one
//! buffered head line per file and closes files as they drain.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};

use crate::crypto;
use crate::error::StoreError;
use crate::types::{offset_of, OffsetMap};

use super::Store;

/// One undecrypted line of the merged read, with the position its
/// authenticated data must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub line: String,
    pub app_id: String,
    pub offset: u64,
}

struct Head {
    time_ms: u64,
    record: RawRecord,
    reader: BufReader<File>,
    next_offset: u64,
}

/// Iterator over merged records; finite, smallest embedded time first.
pub struct Replay {
    heads: Vec<Head>,
    failed: Option<StoreError>,
}

impl Store {
    /// Merged read of everything at or past `start` per replica.
    pub fn replay(&self, start: &OffsetMap) -> Result<Replay, StoreError> {
        let mut heads = Vec::new();
        for app_id in self.offsets()?.into_keys() {
            let offset = offset_of(start, &app_id);
            let file = File::open(self.log_path(&app_id))?;
            let mut reader = BufReader::new(file);
            reader.seek(SeekFrom::Start(offset))?;
            if let Some(head) = read_head(reader, app_id, offset)? {
                heads.push(head);
            }
        }
        Ok(Replay { heads, failed: None })
    }
}

fn read_head(
    mut reader: BufReader<File>,
    app_id: String,
    offset: u64,
) -> Result<Option<Head>, StoreError> {
    let mut line = String::new();
    let read = reader.read_line(&mut line)?;
    if read == 0 {
        return Ok(None);
    }
    if !line.ends_with('\n') {
        // a partial trailing line means a writer died mid-record
        return Err(StoreError::Corrupt {
            app_id,
            offset,
            reason: "truncated record",
        });
    }
    let time_ms = match crypto::extract_time_ms(&line) {
        Ok(time_ms) => time_ms,
        Err(_) => {
            return Err(StoreError::Corrupt {
                app_id,
                offset,
                reason: "unreadable record time",
            })
        }
    };

    let next_offset = offset + read as u64;
    Ok(Some(Head {
        time_ms,
        record: RawRecord {
            line,
            app_id,
            offset,
        },
        reader,
        next_offset,
    }))
}

impl Iterator for Replay {
    type Item = Result<RawRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.failed.take() {
            self.heads.clear();
            return Some(Err(err));
        }
        if self.heads.is_empty() {
            return None;
        }

        let mut smallest = 0;
        for i in 1..self.heads.len() {
            let (a, b) = (&self.heads[i], &self.heads[smallest]);
            if (a.time_ms, a.record.app_id.as_str()) < (b.time_ms, b.record.app_id.as_str()) {
                smallest = i;
            }
        }
        let Head {
            record,
            reader,
            next_offset,
            ..
        } = self.heads.swap_remove(smallest);

        match read_head(reader, record.app_id.clone(), next_offset) {
            Ok(Some(head)) => self.heads.push(head),
            Ok(None) => {}
            // surface the current record first, the failure on the next pull
            Err(err) => self.failed = Some(err),
        }

        Some(Ok(record))
    }
}
