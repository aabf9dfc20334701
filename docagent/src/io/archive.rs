//! Zip export of the documentation tree.

use std::fs;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::tree::DocNode;

/// Download name used by the browser surface.
pub const ARCHIVE_NAME: &str = "mon_super_projet_docs.zip";

/// Serialize `root` into an in-memory zip archive.
///
/// Depth-first: one directory entry per folder (the root folder included) and
/// one deflated entry per file with its content written verbatim.
pub fn archive_bytes(root: &DocNode) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    add_node(&mut writer, root, "", options)?;
    let cursor = writer.finish().context("finish zip archive")?;
    Ok(cursor.into_inner())
}

/// Write the archive for `root` to `path`.
pub fn write_archive(root: &DocNode, path: &Path) -> Result<()> {
    let bytes = archive_bytes(root)?;
    fs::write(path, &bytes).with_context(|| format!("write archive {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "archive written");
    Ok(())
}

fn add_node<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    node: &DocNode,
    prefix: &str,
    options: SimpleFileOptions,
) -> Result<()> {
    let path = format!("{}{}", prefix, node.name());
    match node {
        DocNode::File { content, .. } => {
            writer
                .start_file(path.as_str(), options)
                .with_context(|| format!("start zip entry {}", path))?;
            writer
                .write_all(content.as_bytes())
                .with_context(|| format!("write zip entry {}", path))?;
        }
        DocNode::Folder { children, .. } => {
            writer
                .add_directory(path.as_str(), options)
                .with_context(|| format!("add zip directory {}", path))?;
            let prefix = format!("{}/", path);
            for child in children {
                add_node(writer, child, &prefix, options)?;
            }
        }
    }
    Ok(())
}
