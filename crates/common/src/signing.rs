//! Signing workflow
//!
//! Builds the manifest payload from the original archive, hands it to the
//! engine, then reads the signed output back so the caller can show the
//! manifest that was actually embedded.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::assertion::ManifestPayload;
use crate::engine::{ManifestEngine, SignRequest, ValidationSummary};
use crate::{Error, Result};

/// Result of a successful signing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignOutcome {
    pub output: PathBuf,
    pub payload: ManifestPayload,
    pub active_manifest: Value,
    pub validation: ValidationSummary,
}

/// Name of the signed copy of `file_name`
pub fn output_file_name(file_name: &str) -> String {
    format!("output_{}", file_name)
}

/// Build the payload for `path` on the blocking pool.
pub async fn build_payload(path: &Path, generator_id: &str) -> Result<ManifestPayload> {
    let path = path.to_path_buf();
    let generator_id = generator_id.to_string();
    tokio::task::spawn_blocking(move || ManifestPayload::build(&path, &generator_id))
        .await
        .map_err(|e| Error::Internal(format!("hashing task failed: {}", e)))?
}

/// Sign `source` into `output_dir`, returning the embedded active manifest.
pub async fn sign_epub(
    engine: &dyn ManifestEngine,
    source: &Path,
    output_dir: &Path,
    file_name: &str,
    generator_id: &str,
) -> Result<SignOutcome> {
    tokio::fs::create_dir_all(output_dir).await?;
    let output = output_dir.join(output_file_name(file_name));
    sign_to(engine, source, &output, generator_id).await
}

/// Sign `source` into the exact `output` path.
pub async fn sign_to(
    engine: &dyn ManifestEngine,
    source: &Path,
    output: &Path,
    generator_id: &str,
) -> Result<SignOutcome> {
    if same_file(source, output) {
        return Err(Error::InvalidUpload(format!(
            "output would overwrite the source: {}",
            source.display()
        )));
    }

    // Hash the original bytes, never the output.
    let payload = build_payload(source, generator_id).await?;

    let request = SignRequest {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        payload,
    };
    engine.sign(&request).await?;

    let store = engine.read(output).await?;
    info!(
        "Signed {} (active manifest: {})",
        output.display(),
        store.active_label().unwrap_or("none")
    );

    Ok(SignOutcome {
        output: request.output,
        payload: request.payload,
        active_manifest: store.active_manifest(),
        validation: store.validation(),
    })
}

/// Whether `output` resolves to the existing file at `source`.
fn same_file(source: &Path, output: &Path) -> bool {
    let Ok(source) = std::fs::canonicalize(source) else {
        return false;
    };
    if let Ok(output) = std::fs::canonicalize(output) {
        return output == source;
    }

    // Output does not exist yet; resolve its directory instead.
    let Some(name) = output.file_name() else {
        return false;
    };
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::canonicalize(parent)
        .map(|dir| dir.join(name) == source)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ManifestStore;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::Mutex;

    /// Copies the source and remembers the payload it was given
    #[derive(Default)]
    struct RecordingEngine {
        signed: Mutex<Vec<SignRequest>>,
    }

    #[async_trait]
    impl ManifestEngine for RecordingEngine {
        async fn sign(&self, request: &SignRequest) -> Result<()> {
            std::fs::copy(&request.source, &request.output)?;
            self.signed.lock().unwrap().push(request.clone());
            Ok(())
        }

        async fn read(&self, _path: &Path) -> Result<ManifestStore> {
            Ok(ManifestStore::from_value(serde_json::json!({
                "active_manifest": "m1",
                "manifests": {"m1": {"claim_generator": "test"}}
            })))
        }
    }

    #[tokio::test]
    async fn test_sign_epub_hashes_original() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("book.epub");
        {
            let file = std::fs::File::create(&source).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            writer
                .start_file("mimetype", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"application/epub+zip").unwrap();
            writer.finish().unwrap();
        }

        let engine = RecordingEngine::default();
        let out_dir = temp_dir.path().join("outputs");
        let outcome = sign_epub(&engine, &source, &out_dir, "book.epub", "test/1")
            .await
            .unwrap();

        assert_eq!(outcome.output, out_dir.join("output_book.epub"));
        assert!(outcome.output.exists());
        assert_eq!(outcome.active_manifest["claim_generator"], "test");

        let expected = crate::assertion::build_whole_file_assertion(&source).unwrap();
        assert_eq!(outcome.payload.whole_file(), Some(&expected));
        assert_eq!(engine.signed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_epub_rejects_non_zip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("notes.epub");
        std::fs::write(&source, b"plain text").unwrap();

        let engine = RecordingEngine::default();
        let err = sign_epub(&engine, &source, temp_dir.path(), "notes.epub", "test/1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ArchiveRead { .. }));
        assert!(engine.signed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sign_to_refuses_to_overwrite_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("book.epub");
        std::fs::write(&source, b"PK").unwrap();

        let engine = RecordingEngine::default();
        let err = sign_to(&engine, &source, &source, "test/1").await.unwrap_err();
        assert!(matches!(err, Error::InvalidUpload(_)));
        assert!(engine.signed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sign_to_resolves_equivalent_source_paths() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp_dir.path().join("sub")).unwrap();
        let source = temp_dir.path().join("book.epub");
        std::fs::write(&source, b"PK").unwrap();

        let engine = RecordingEngine::default();
        for alias in [
            temp_dir.path().join(".").join("book.epub"),
            temp_dir.path().join("sub").join("..").join("book.epub"),
        ] {
            let err = sign_to(&engine, &source, &alias, "test/1").await.unwrap_err();
            assert!(matches!(err, Error::InvalidUpload(_)), "{}", alias.display());
        }
        assert!(engine.signed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_same_file_distinguishes_new_outputs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("book.epub");
        std::fs::write(&source, b"PK").unwrap();

        assert!(same_file(&source, &source));
        assert!(!same_file(&source, &temp_dir.path().join("output_book.epub")));
        assert!(!same_file(&source, &temp_dir.path().join("missing").join("book.epub")));
    }
}
