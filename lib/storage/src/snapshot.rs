// Point-in-time snapshots of the match store
use anyhow::{anyhow, Context, Result};
use atomicwrites::{AllowOverwrite, AtomicFile};
use chrono::{DateTime, Utc};
use findora_core::Match;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_FILE: &str = "matches.snapshot";

const FORMAT_VERSION: u32 = 1;

/// Summary of a written snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDescription {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub records: usize,
    pub size: u64,
    pub checksum: String,
}

/// On-disk envelope. The checksum covers the bincode-encoded records.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope {
    version: u32,
    created_at: DateTime<Utc>,
    checksum: String,
    records: Vec<u8>,
}

pub struct SnapshotManager {
    snapshot_dir: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_dir: P) -> Result<Self> {
        let snapshot_dir = snapshot_dir.as_ref().to_path_buf();
        fs::create_dir_all(&snapshot_dir)?;
        Ok(Self { snapshot_dir })
    }

    pub fn path(&self) -> PathBuf {
        self.snapshot_dir.join(SNAPSHOT_FILE)
    }

    /// Write all records as gzip(bincode(envelope)), replacing the previous
    /// snapshot atomically
    pub fn write(&self, records: &[Match]) -> Result<SnapshotDescription> {
        let encoded = bincode::serialize(records)
            .map_err(|e| anyhow!("serializing match records: {}", e))?;
        let checksum = format!("{:x}", Sha256::digest(&encoded));
        let created_at = Utc::now();

        let envelope = SnapshotEnvelope {
            version: FORMAT_VERSION,
            created_at,
            checksum: checksum.clone(),
            records: encoded,
        };
        let body = bincode::serialize(&envelope)
            .map_err(|e| anyhow!("serializing snapshot envelope: {}", e))?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&body)?;
        let compressed = encoder.finish()?;

        let path = self.path();
        AtomicFile::new(&path, AllowOverwrite)
            .write(|f| f.write_all(&compressed))
            .map_err(|e| anyhow!("writing snapshot {}: {}", path.display(), e))?;

        Ok(SnapshotDescription {
            name: SNAPSHOT_FILE.to_string(),
            created_at,
            records: records.len(),
            size: compressed.len() as u64,
            checksum,
        })
    }

    /// Load the current snapshot, or `None` if none has been written yet
    pub fn load(&self) -> Result<Option<Vec<Match>>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        let mut decoder = GzDecoder::new(BufReader::new(file));
        let mut body = Vec::new();
        decoder.read_to_end(&mut body)?;

        let envelope: SnapshotEnvelope = bincode::deserialize(&body)
            .map_err(|e| anyhow!("decoding snapshot {}: {}", path.display(), e))?;
        if envelope.version != FORMAT_VERSION {
            return Err(anyhow!("unsupported snapshot version {}", envelope.version));
        }

        let actual = format!("{:x}", Sha256::digest(&envelope.records));
        if actual != envelope.checksum {
            return Err(anyhow!(
                "snapshot checksum mismatch: expected {}, got {}",
                envelope.checksum,
                actual
            ));
        }

        let records: Vec<Match> = bincode::deserialize(&envelope.records)
            .map_err(|e| anyhow!("decoding match records: {}", e))?;
        tracing::debug!(
            records = records.len(),
            created_at = %envelope.created_at,
            "loaded match snapshot"
        );
        Ok(Some(records))
    }
}
