//! Workspace bundles: a zip holding a manifest, the SQLite database and a
//! small metadata record. Import also accepts a bare database file.

use crate::db::{now_ts, DB_FILE};
use anyhow::{anyhow, bail, Context};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const BUNDLE_FORMAT: &str = "school-workspace-v1";
pub const LEGACY_SQLITE_FORMAT: &str = "legacy-sqlite3";

const MANIFEST_VERSION: u32 = 1;
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";
const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

mod entry {
    pub const MANIFEST: &str = "manifest.json";
    pub const DATABASE: &str = "db/school.sqlite3";
    pub const WORKSPACE_META: &str = "meta/workspace.json";
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    format: String,
    version: u32,
    #[serde(default)]
    app_version: String,
    #[serde(default)]
    exported_at: String,
    #[serde(default)]
    db_sha256: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    /// Export time and app version recorded in the manifest; absent for raw files.
    pub exported_at: Option<String>,
    pub app_version: Option<String>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn put_entry<W: Write + Seek>(zip: &mut ZipWriter<W>, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(name, opts)
        .with_context(|| format!("failed to start bundle entry {name}"))?;
    zip.write_all(bytes)
        .with_context(|| format!("failed to write bundle entry {name}"))
}

fn take_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> anyhow::Result<Vec<u8>> {
    let mut file = archive
        .by_name(name)
        .with_context(|| format!("bundle missing {name}"))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .with_context(|| format!("failed to read bundle entry {name}"))?;
    Ok(bytes)
}

/// Snapshot the workspace database into a zip bundle at `out_path`.
pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE);
    if !db_path.is_file() {
        bail!("workspace database not found: {}", db_path.display());
    }
    let db_bytes = std::fs::read(&db_path)
        .with_context(|| format!("failed to read database {}", db_path.display()))?;
    let digest = sha256_hex(&db_bytes);

    if let Some(dir) = out_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    let file = File::create(out_path)
        .with_context(|| format!("failed to create bundle {}", out_path.display()))?;
    let mut zip = ZipWriter::new(file);

    let manifest = Manifest {
        format: BUNDLE_FORMAT.to_string(),
        version: MANIFEST_VERSION,
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        exported_at: now_ts(),
        db_sha256: Some(digest.clone()),
    };
    let meta = serde_json::json!({ "sourceWorkspace": workspace_path.to_string_lossy() });
    put_entry(&mut zip, entry::MANIFEST, &serde_json::to_vec_pretty(&manifest)?)?;
    put_entry(&mut zip, entry::DATABASE, &db_bytes)?;
    put_entry(&mut zip, entry::WORKSPACE_META, &serde_json::to_vec_pretty(&meta)?)?;
    zip.finish().context("failed to finalize bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT.to_string(),
        entry_count: 3,
        db_sha256: digest,
    })
}

/// Restore a bundle (or a bare sqlite file) as the workspace database.
/// The caller must close any open connection to the workspace first.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    if !looks_like_zip(in_path)? {
        let raw = std::fs::read(in_path)
            .with_context(|| format!("failed to read sqlite backup {}", in_path.display()))?;
        install_db(workspace_path, &raw)?;
        return Ok(ImportSummary {
            bundle_format_detected: LEGACY_SQLITE_FORMAT.to_string(),
            exported_at: None,
            app_version: None,
        });
    }

    let (manifest, db_bytes) = read_bundle(in_path)?;
    install_db(workspace_path, &db_bytes)?;
    Ok(ImportSummary {
        bundle_format_detected: manifest.format,
        exported_at: Some(manifest.exported_at).filter(|s| !s.is_empty()),
        app_version: Some(manifest.app_version).filter(|s| !s.is_empty()),
    })
}

fn read_bundle(path: &Path) -> anyhow::Result<(Manifest, Vec<u8>)> {
    let file = File::open(path).with_context(|| format!("failed to open bundle {}", path.display()))?;
    let mut archive = ZipArchive::new(file).context("invalid zip archive")?;

    let manifest: Manifest = serde_json::from_slice(&take_entry(&mut archive, entry::MANIFEST)?)
        .context("manifest.json is invalid")?;
    if manifest.format != BUNDLE_FORMAT {
        bail!("unsupported bundle format: {}", manifest.format);
    }
    if manifest.version > MANIFEST_VERSION {
        bail!("bundle version {} is newer than this build", manifest.version);
    }

    let db_bytes = take_entry(&mut archive, entry::DATABASE)?;
    match manifest.db_sha256.as_deref() {
        Some(expected) if expected != sha256_hex(&db_bytes) => {
            Err(anyhow!("database checksum mismatch"))
        }
        _ => Ok((manifest, db_bytes)),
    }
}

/// Open the staged copy read-only and run SQLite's quick integrity check.
fn check_sqlite(path: &Path) -> anyhow::Result<()> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .context("restored file cannot be opened as sqlite")?;
    let verdict: String = conn
        .query_row("PRAGMA quick_check", [], |r| r.get(0))
        .context("restored file is not a sqlite database")?;
    if verdict != "ok" {
        bail!("restored database failed integrity check: {verdict}");
    }
    Ok(())
}

/// Write to a sibling temp file, verify it, then rename over the live
/// database. The live file is untouched unless the copy checks out.
fn install_db(workspace_path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if !bytes.starts_with(SQLITE_MAGIC) {
        bail!("input is not a sqlite database");
    }
    std::fs::create_dir_all(workspace_path)
        .with_context(|| format!("failed to create workspace {}", workspace_path.display()))?;
    let dst = workspace_path.join(DB_FILE);
    let staging = workspace_path.join(format!("{DB_FILE}.importing"));

    let mut out = File::create(&staging)
        .with_context(|| format!("failed to create {}", staging.display()))?;
    out.write_all(bytes)
        .and_then(|_| out.sync_all())
        .context("failed to write restored database")?;
    drop(out);

    if let Err(e) = check_sqlite(&staging) {
        let _ = std::fs::remove_file(&staging);
        return Err(e);
    }
    if dst.exists() {
        std::fs::remove_file(&dst)
            .with_context(|| format!("failed to remove existing database {}", dst.display()))?;
    }
    std::fs::rename(&staging, &dst)
        .with_context(|| format!("failed to move restored database to {}", dst.display()))
}

fn looks_like_zip(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut sig = [0u8; 4];
    match f.read_exact(&mut sig) {
        Ok(()) => Ok(sig == ZIP_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e).context("failed to read file signature"),
    }
}
