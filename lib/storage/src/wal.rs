use anyhow::{Context, Result};
use findora_core::{Match, MatchStatus, PairKey};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// One change to the match store, as recorded in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WalEntry {
    Upsert { record: Match },
    Remove { key: PairKey },
    Status { key: PairKey, status: MatchStatus },
}

/// Append-only log of match store changes, one JSON entry per line.
///
/// Replayed on top of the latest snapshot at startup and truncated once a
/// new snapshot has been written.
pub struct WriteAheadLog {
    file: Mutex<File>,
    path: PathBuf,
}

impl WriteAheadLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log {}", path.display()))?;

        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a group of entries in one write.
    ///
    /// On failure the log is cut back to where it was, so a partial group is
    /// never followed by later entries.
    pub fn append(&self, entries: &[WalEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut buf = Vec::with_capacity(256 * entries.len());
        for entry in entries {
            serde_json::to_writer(&mut buf, entry)?;
            buf.push(b'\n');
        }

        let mut file = self.file.lock();
        let start = file.metadata()?.len();
        if let Err(e) = file.write_all(&buf) {
            if let Err(undo) = file.set_len(start) {
                tracing::warn!(path = %self.path.display(), error = %undo, "cannot undo partial log write");
            }
            return Err(e).with_context(|| format!("appending to log {}", self.path.display()));
        }
        Ok(())
    }

    /// fdatasync
    pub fn sync(&self) -> Result<()> {
        self.file.lock().sync_data()?;
        Ok(())
    }

    /// Drop every entry; called after a snapshot covers them
    pub fn truncate(&self) -> Result<()> {
        let file = self.file.lock();
        file.set_len(0)?;
        file.sync_all()?;
        Ok(())
    }

    /// Read back every complete entry in the log.
    ///
    /// A torn final line (crash mid-append) ends the replay with a warning
    /// instead of failing it.
    pub fn read_entries<P: AsRef<Path>>(path: P) -> Result<Vec<WalEntry>> {
        Ok(scan(path.as_ref())?.entries)
    }

    /// Read back the log and cut it back to its last complete entry, so
    /// entries appended afterwards are not stranded behind a torn line.
    pub fn recover<P: AsRef<Path>>(path: P) -> Result<Vec<WalEntry>> {
        let path = path.as_ref();
        let scanned = scan(path)?;
        if scanned.file_len > scanned.valid_len || !scanned.terminated {
            let mut file = OpenOptions::new()
                .write(true)
                .open(path)
                .with_context(|| format!("repairing log {}", path.display()))?;
            if scanned.file_len > scanned.valid_len {
                tracing::warn!(
                    path = %path.display(),
                    dropped_bytes = scanned.file_len - scanned.valid_len,
                    "truncating torn log tail"
                );
                file.set_len(scanned.valid_len)?;
            }
            if !scanned.terminated {
                file.seek(SeekFrom::End(0))?;
                file.write_all(b"\n")?;
            }
            file.sync_all()?;
        }
        Ok(scanned.entries)
    }
}

struct Scan {
    entries: Vec<WalEntry>,
    /// Bytes up to the end of the last readable entry
    valid_len: u64,
    file_len: u64,
    /// The last readable entry ends with a newline
    terminated: bool,
}

fn scan(path: &Path) -> Result<Scan> {
    let mut scan = Scan { entries: Vec::new(), valid_len: 0, file_len: 0, terminated: true };
    if !path.exists() {
        return Ok(scan);
    }

    let mut reader = BufReader::new(File::open(path)?);
    let mut line = Vec::new();
    let mut offset = 0u64;
    let mut line_no = 0usize;
    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        offset += read as u64;
        line_no += 1;

        let body = line.strip_suffix(b"\n").unwrap_or(&line[..]);
        if body.iter().all(u8::is_ascii_whitespace) {
            scan.valid_len = offset;
            continue;
        }
        match serde_json::from_slice::<WalEntry>(body) {
            Ok(entry) => {
                scan.entries.push(entry);
                scan.valid_len = offset;
                scan.terminated = line.ends_with(b"\n");
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = line_no,
                    error = %e,
                    "stopping log replay at unreadable entry"
                );
                break;
            }
        }
    }
    scan.file_len = std::fs::metadata(path)?.len();
    Ok(scan)
}
