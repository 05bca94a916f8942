//! Extraction of retrieved metadata bundles.
//!
//! A metadata retrieve hands back one base64 zip. It is written to
//! `metadata/sobjects.zip` under the workspace, unpacked next to it, and the
//! zip is removed afterwards. Entry names may arrive percent-encoded and may
//! contain slashes inside a decoded component; decoded slashes become `&` so
//! they cannot act as separators.

use anyhow::{Context, Result};
use base64::Engine;
use percent_encoding::percent_decode_str;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Resolve one zip entry name to a path under `root`. Each `/`-separated
/// component is percent-decoded; decoded slashes and parent references are
/// neutralized so extraction stays inside the tree.
fn entry_path(root: &Path, name: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in name.split('/') {
        let decoded = percent_decode_str(part)
            .decode_utf8_lossy()
            .replace('/', "&");
        if decoded.is_empty() || decoded == "." || decoded == ".." {
            continue;
        }
        path.push(&decoded);
    }
    path
}

/// Decode and unpack a retrieve bundle under `<workspace>/metadata`.
/// Returns the output directory.
pub fn extract_retrieve_bundle(workspace: &Path, zip_base64: &str) -> Result<PathBuf> {
    let output_dir = workspace.join("metadata");
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(zip_base64.trim())
        .context("retrieve payload is not valid base64")?;

    let zip_path = output_dir.join("sobjects.zip");
    fs::write(&zip_path, &bytes)
        .with_context(|| format!("Failed to write {}", zip_path.display()))?;

    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("retrieve payload is not a zip archive")?;
    let mut extracted = 0usize;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let dest = entry_path(&output_dir, entry.name());
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut out = fs::File::create(&dest)
            .with_context(|| format!("Failed to create {}", dest.display()))?;
        std::io::copy(&mut entry, &mut out)?;
        extracted += 1;
    }

    fs::remove_file(&zip_path)?;
    tracing::info!(
        "Extracted {} files to {}",
        extracted,
        output_dir.display()
    );
    Ok(output_dir)
}
