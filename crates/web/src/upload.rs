//! Upload handling
//!
//! Streams the multipart `file` field to a per-request directory under the
//! upload root. The file is flushed and closed before anything hashes it, and
//! the directory is removed when the [`UploadForm`] is dropped.

use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use epubseal_common::{Error, Result};

/// A fully written upload plus the requested action
#[derive(Debug)]
pub struct UploadForm {
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
    pub action: Option<String>,
    _dir: TempDir,
}

/// Reduce a client-supplied name to a safe single path component.
///
/// Keeps ASCII alphanumerics, `.`, `-` and `_`; whitespace becomes `_`;
/// leading dots are dropped. Returns `None` when nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Read the multipart form, saving the `file` field under `upload_root`.
///
/// Returns `Ok(None)` when the form carries no file.
pub async fn receive(upload_root: &Path, mut multipart: Multipart) -> Result<Option<UploadForm>> {
    let mut action = None;
    let mut saved: Option<(String, PathBuf, u64, TempDir)> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidUpload(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("action") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| Error::InvalidUpload(e.to_string()))?;
                action = Some(text);
            }
            Some("file") => {
                let Some(raw_name) = field.file_name().map(str::to_string) else {
                    continue;
                };
                if raw_name.is_empty() {
                    continue;
                }
                let file_name = sanitize_filename(&raw_name)
                    .ok_or_else(|| Error::InvalidUpload(format!("unusable file name: {}", raw_name)))?;

                tokio::fs::create_dir_all(upload_root).await?;
                let dir = tempfile::Builder::new()
                    .prefix("upload-")
                    .tempdir_in(upload_root)?;
                let path = dir.path().join(&file_name);

                let mut file = tokio::fs::File::create(&path).await?;
                let mut size = 0u64;
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| Error::InvalidUpload(e.to_string()))?
                {
                    size += chunk.len() as u64;
                    file.write_all(&chunk).await?;
                }
                file.flush().await?;
                file.sync_all().await?;
                drop(file);

                debug!("Saved upload {} ({} bytes)", path.display(), size);
                saved = Some((file_name, path, size, dir));
            }
            _ => {}
        }
    }

    Ok(saved.map(|(file_name, path, size, dir)| UploadForm {
        file_name,
        path,
        size,
        action,
        _dir: dir,
    }))
}
