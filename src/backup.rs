use anyhow::{anyhow, bail, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::slot::{self, SLOT_SIZE};

const MANIFEST_ENTRY: &str = "manifest.json";
const DATA_ENTRY: &str = "data/records.dat";
pub const BUNDLE_FORMAT_V1: &str = "recordbook-bundle-v1";
pub const RAW_RECORDS_FORMAT: &str = "raw-records";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub record_count: usize,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub record_count: usize,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Writes `records_path` into a zip bundle. A missing records file exports
/// as an empty dataset; a trailing partial slot is left out.
pub fn export_records_bundle(records_path: &Path, out_path: &Path) -> anyhow::Result<ExportSummary> {
    let mut data = match std::fs::read(records_path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            return Err(e).with_context(|| {
                format!(
                    "failed to read records file {}",
                    records_path.to_string_lossy()
                )
            })
        }
    };
    let record_count = data.len() / SLOT_SIZE;
    data.truncate(record_count * SLOT_SIZE);
    let digest = sha256_hex(&data);

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "bundleId": Uuid::new_v4().to_string(),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "slotSize": SLOT_SIZE,
        "recordCount": record_count,
        "sha256": digest,
        "sourcePath": records_path.to_string_lossy(),
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DATA_ENTRY, opts)
        .context("failed to start records entry")?;
    zip.write_all(&data)
        .context("failed to write records entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 2,
        record_count,
        sha256: digest,
    })
}

/// Replaces `records_path` with the records held in `in_path`: either a zip
/// bundle or a bare records file. Nothing is replaced unless the payload
/// checks out.
pub fn import_records_bundle(in_path: &Path, records_path: &Path) -> anyhow::Result<ImportSummary> {
    if !is_zip_file(in_path)? {
        let data = std::fs::read(in_path)
            .with_context(|| format!("failed to read {}", in_path.to_string_lossy()))?;
        let record_count = check_records(&data)?;
        install(records_path, &data)?;
        return Ok(ImportSummary {
            bundle_format_detected: RAW_RECORDS_FORMAT.to_string(),
            record_count,
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let slot_size = manifest.get("slotSize").and_then(|v| v.as_u64());
    if slot_size != Some(SLOT_SIZE as u64) {
        bail!(
            "bundle slot size {:?} does not match this build ({})",
            slot_size,
            SLOT_SIZE
        );
    }

    let mut data = Vec::new();
    archive
        .by_name(DATA_ENTRY)
        .context("bundle missing data/records.dat")?
        .read_to_end(&mut data)
        .context("failed to extract records entry")?;
    check_whole_slots(&data)?;

    if let Some(expected) = manifest.get("sha256").and_then(|v| v.as_str()) {
        let actual = sha256_hex(&data);
        if actual != expected {
            bail!("records checksum mismatch: manifest {}, payload {}", expected, actual);
        }
    }
    let record_count = check_records(&data)?;
    if let Some(expected) = manifest.get("recordCount").and_then(|v| v.as_u64()) {
        if expected != record_count as u64 {
            bail!(
                "bundle declares {} records but carries {}",
                expected,
                record_count
            );
        }
    }

    install(records_path, &data)?;

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        record_count,
    })
}

fn check_whole_slots(data: &[u8]) -> anyhow::Result<()> {
    if data.len() % SLOT_SIZE != 0 {
        bail!(
            "records payload is {} bytes, not a multiple of the {}-byte slot",
            data.len(),
            SLOT_SIZE
        );
    }
    Ok(())
}

/// Decodes every slot and refuses payloads holding records this store would
/// never write: bad marks or names, stale derived fields, repeated rolls.
fn check_records(data: &[u8]) -> anyhow::Result<usize> {
    check_whole_slots(data)?;
    let mut seen = HashSet::new();
    for (i, chunk) in data.chunks_exact(SLOT_SIZE).enumerate() {
        let record = slot::decode(chunk);
        record
            .validate()
            .with_context(|| format!("slot {} (roll {}) is invalid", i, record.roll))?;
        if !record.is_derived_consistent() {
            bail!(
                "slot {} (roll {}) has total, percentage or grade out of step with its marks",
                i,
                record.roll
            );
        }
        if !seen.insert(record.roll) {
            bail!("slot {} repeats roll {}", i, record.roll);
        }
    }
    Ok(seen.len())
}

fn install(records_path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let mut tmp = records_path.as_os_str().to_owned();
    tmp.push(".importing");
    let tmp = PathBuf::from(tmp);
    if tmp.exists() {
        let _ = std::fs::remove_file(&tmp);
    }
    if let Some(parent) = records_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory {}", parent.to_string_lossy())
            })?;
        }
    }

    {
        let mut out = File::create(&tmp)
            .with_context(|| format!("failed to create {}", tmp.to_string_lossy()))?;
        out.write_all(data)
            .context("failed to write imported records")?;
        out.sync_all()
            .context("failed to flush imported records")?;
    }

    if let Err(e) = std::fs::rename(&tmp, records_path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e).with_context(|| {
            format!(
                "failed to move imported records to {}",
                records_path.to_string_lossy()
            )
        });
    }
    Ok(())
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}
