//! Artifact bundling: turn a source path into uploadable bytes.
//!
//! A plain file is read as-is; a directory is packed into a zip archive
//! in memory. Traversal is sorted so the same tree always produces the
//! same archive layout.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use anyhow::Context;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Uploadable artifact bytes plus their content digest.
#[derive(Debug)]
pub struct Bundle {
    pub bytes: Vec<u8>,
    pub digest: String,
}

/// Read or pack the artifact at `path` into a bundle.
pub fn bundle_artifact(path: &Path) -> anyhow::Result<Bundle> {
    let bytes = if path.is_dir() {
        zip_directory(path)?
    } else {
        fs::read(path).with_context(|| format!("failed to read artifact: {}", path.display()))?
    };
    let digest = blake3::hash(&bytes).to_hex().to_string();
    Ok(Bundle { bytes, digest })
}

/// Pack a directory tree into an in-memory zip archive.
fn zip_directory(root: &Path) -> anyhow::Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    // Fixed timestamp keeps the archive byte-identical for identical trees
    let options = SimpleFileOptions::default().last_modified_time(zip::DateTime::default());
    zip_dir_recursive(&mut writer, options, root, "")?;
    let cursor = writer.finish().context("failed to finalize zip archive")?;
    Ok(cursor.into_inner())
}

fn zip_dir_recursive(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    dir: &Path,
    base: &str,
) -> anyhow::Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?;

    // Sort entries for a deterministic archive layout
    let mut sorted_entries: Vec<_> = entries
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to read directory entries: {}", dir.display()))?;
    sorted_entries.sort_by_key(|e| e.file_name());

    for entry in sorted_entries {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        let rel_path = if base.is_empty() {
            name_str.to_string()
        } else {
            format!("{}/{}", base, name_str)
        };

        let ty = entry
            .file_type()
            .with_context(|| format!("failed to stat entry: {}", entry.path().display()))?;

        if ty.is_dir() {
            writer
                .add_directory(format!("{}/", rel_path), options)
                .with_context(|| format!("failed to add directory entry: {}", rel_path))?;
            zip_dir_recursive(writer, options, &entry.path(), &rel_path)?;
        } else if ty.is_file() {
            writer
                .start_file(rel_path.clone(), options)
                .with_context(|| format!("failed to start archive entry: {}", rel_path))?;
            let content = fs::read(entry.path())
                .with_context(|| format!("failed to read file: {}", entry.path().display()))?;
            writer.write_all(&content)?;
        } else {
            anyhow::bail!("unsupported filesystem entry: {}", entry.path().display());
        }
    }
    Ok(())
}
