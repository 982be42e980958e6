//! JSON report files
//!
//! A catalog is a JSON array of reports; an inbox is a directory holding one
//! report per `*.json` file. Each report may name an image file, resolved
//! against a base directory.

use findora_core::{Error, ItemId, ItemReport, Result};
use findora_engine::MatchEngine;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const PROCESSED_DIR: &str = "processed";
pub const REJECTED_DIR: &str = "rejected";

/// A report plus the bits the engine does not store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub id: Option<ItemId>,
    /// Image path, relative to the image directory
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(flatten)]
    pub report: ItemReport,
}

impl CatalogEntry {
    /// Read the referenced image. A missing file is logged and treated like
    /// an unusable image rather than failing the report.
    pub fn read_image(&self, image_dir: &Path) -> Option<Vec<u8>> {
        let path = image_dir.join(self.image.as_ref()?);
        match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read image");
                None
            }
        }
    }
}

pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<Vec<CatalogEntry>> {
    let raw = fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&raw)?)
}

/// Submit every catalog entry, returning the ids in catalog order.
///
/// Entries without an id are numbered by position (`item-1`, `item-2`, ...).
pub fn submit_catalog(
    engine: &MatchEngine,
    entries: Vec<CatalogEntry>,
    image_dir: &Path,
) -> Result<Vec<ItemId>> {
    let mut ids = Vec::with_capacity(entries.len());
    for (position, entry) in entries.into_iter().enumerate() {
        let image = entry.read_image(image_dir);
        let id = entry
            .id
            .unwrap_or_else(|| ItemId::from(format!("item-{}", position + 1)));
        ids.push(engine.submit_with_id(id, entry.report, image)?);
    }
    Ok(ids)
}

/// Counts from one inbox pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboxPass {
    pub submitted: usize,
    pub rejected: usize,
}

/// Submit every new report in `inbox`.
///
/// Accepted reports are written to `processed/` as submitted, with the id
/// and creation time filled in, so a later replay rebuilds identical items.
/// Unreadable or invalid files move to `rejected/`. Each file is handled
/// once, in name order. Reports without an id use the file stem.
pub fn drain_inbox(engine: &MatchEngine, inbox: &Path) -> Result<InboxPass> {
    let processed = inbox.join(PROCESSED_DIR);
    let rejected = inbox.join(REJECTED_DIR);
    fs::create_dir_all(&processed)?;
    fs::create_dir_all(&rejected)?;

    let mut pass = InboxPass::default();
    for path in report_files(inbox)? {
        match submit_file(engine, &path, inbox) {
            Ok(resolved) => {
                if let Some(id) = &resolved.id {
                    tracing::info!(item_id = %id, file = %path.display(), "report accepted");
                }
                write_resolved(&path, &processed, &resolved)?;
                pass.submitted += 1;
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "report rejected");
                move_into(&path, &rejected)?;
                pass.rejected += 1;
            }
        }
    }
    Ok(pass)
}

/// Re-submit reports accepted by earlier runs, rebuilding the in-memory
/// catalog after a restart. Stored matches for those pairs are unchanged.
pub fn replay_processed(engine: &MatchEngine, inbox: &Path) -> Result<usize> {
    let processed = inbox.join(PROCESSED_DIR);
    if !processed.is_dir() {
        return Ok(0);
    }
    let mut replayed = 0;
    for path in report_files(&processed)? {
        match submit_file(engine, &path, inbox) {
            Ok(_) => replayed += 1,
            Err(e) => tracing::warn!(file = %path.display(), error = %e, "cannot replay report"),
        }
    }
    Ok(replayed)
}

/// Submit one report file, returning the entry as accepted
fn submit_file(engine: &MatchEngine, path: &Path, image_dir: &Path) -> Result<CatalogEntry> {
    let raw = fs::read_to_string(path)?;
    let entry: CatalogEntry = serde_json::from_str(&raw)?;
    let image = entry.read_image(image_dir);
    let id = match entry.id {
        Some(ref id) => id.clone(),
        None => file_stem_id(path)?,
    };
    let id = engine.submit_with_id(id, entry.report.clone(), image)?;
    Ok(CatalogEntry { id: Some(id), ..entry })
}

fn write_resolved(path: &Path, dir: &Path, entry: &CatalogEntry) -> Result<()> {
    if let Some(name) = path.file_name() {
        fs::write(dir.join(name), serde_json::to_vec_pretty(entry)?)?;
        fs::remove_file(path)?;
    }
    Ok(())
}

fn file_stem_id(path: &Path) -> Result<ItemId> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(ItemId::from)
        .ok_or_else(|| Error::InvalidItem(format!("no usable file name: {}", path.display())))
}

fn report_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();
    Ok(files)
}

fn move_into(path: &Path, dir: &Path) -> Result<()> {
    if let Some(name) = path.file_name() {
        fs::rename(path, dir.join(name))?;
    }
    Ok(())
}
