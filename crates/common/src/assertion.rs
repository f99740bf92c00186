//! Content-hash assertions for ZIP-based containers
//!
//! Builds the two hash assertions embedded in an EPUB provenance manifest:
//! - a collection assertion with one SHA-256 record per archive entry
//! - a whole-file assertion over the raw container bytes
//!
//! Entry records keep the central-directory order of the archive. That order
//! is part of the signed payload, so nothing here sorts or deduplicates.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{Error, Result};

/// Algorithm identifier carried by every assertion
pub const HASH_ALGORITHM: &str = "sha256";

/// Reserved slot in the whole-file assertion. Emitted verbatim.
pub const PAD_PLACEHOLDER: &str = "0000";

/// MIME type used when the entry extension is not recognised
pub const FALLBACK_FORMAT: &str = "application/octet-stream";

/// Label of the per-entry collection assertion
pub const COLLECTION_LABEL: &str = "c2pa.hash.collection.data";

/// Label of the whole-file assertion
pub const FILE_LABEL: &str = "c2pa.hash.data";

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// One non-directory entry of the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub uri: String,
    #[serde(with = "base64_bytes")]
    pub hash: Vec<u8>,
    #[serde(rename = "dc:format")]
    pub format: String,
    pub size: u64,
}

/// Per-entry digest table for an archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionAssertion {
    #[serde(rename = "alg")]
    pub algorithm: String,
    #[serde(rename = "uris")]
    pub entries: Vec<EntryRecord>,
}

/// Digest of the raw archive bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WholeFileAssertion {
    #[serde(rename = "alg")]
    pub algorithm: String,
    #[serde(rename = "pad")]
    pub padding: String,
    #[serde(with = "base64_bytes")]
    pub hash: Vec<u8>,
}

/// A labelled assertion inside the manifest payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssertionData {
    Collection(CollectionAssertion),
    WholeFile(WholeFileAssertion),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledAssertion {
    pub label: String,
    pub data: AssertionData,
}

/// Manifest definition handed to the external signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestPayload {
    #[serde(rename = "claim_generator")]
    pub generator_id: String,
    pub assertions: Vec<LabeledAssertion>,
}

impl ManifestPayload {
    /// Build both assertions for the archive at `path`.
    pub fn build(path: impl AsRef<Path>, generator_id: &str) -> Result<Self> {
        let path = path.as_ref();
        let collection = build_collection_assertion(path)?;
        let whole_file = build_whole_file_assertion(path)?;

        Ok(Self {
            generator_id: generator_id.to_string(),
            assertions: vec![
                LabeledAssertion {
                    label: COLLECTION_LABEL.to_string(),
                    data: AssertionData::Collection(collection),
                },
                LabeledAssertion {
                    label: FILE_LABEL.to_string(),
                    data: AssertionData::WholeFile(whole_file),
                },
            ],
        })
    }

    /// Compact JSON in declaration key order
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn collection(&self) -> Option<&CollectionAssertion> {
        self.assertions.iter().find_map(|a| match &a.data {
            AssertionData::Collection(c) => Some(c),
            AssertionData::WholeFile(_) => None,
        })
    }

    pub fn whole_file(&self) -> Option<&WholeFileAssertion> {
        self.assertions.iter().find_map(|a| match &a.data {
            AssertionData::WholeFile(w) => Some(w),
            AssertionData::Collection(_) => None,
        })
    }
}

/// Hash every non-directory entry of the archive, in directory order.
pub fn build_collection_assertion(path: impl AsRef<Path>) -> Result<CollectionAssertion> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::archive(path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::archive(path, e))?;

    debug!("Hashing {} archive entries in {}", archive.len(), path.display());

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::entry(format!("#{}", i), e))?;
        if entry.is_dir() {
            continue;
        }

        let uri = entry.name().to_string();
        let size = entry.size();
        let hash = sha256_reader(&mut entry).map_err(|e| Error::entry(&uri, e))?;
        let format = guess_format(&uri);

        entries.push(EntryRecord {
            uri,
            hash,
            format,
            size,
        });
    }

    Ok(CollectionAssertion {
        algorithm: HASH_ALGORITHM.to_string(),
        entries,
    })
}

/// Hash the raw container bytes of the file at `path`.
pub fn build_whole_file_assertion(path: impl AsRef<Path>) -> Result<WholeFileAssertion> {
    let path = path.as_ref();
    let read_err = |source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(read_err)?;
    let hash = sha256_reader(&mut file).map_err(read_err)?;

    Ok(WholeFileAssertion {
        algorithm: HASH_ALGORITHM.to_string(),
        padding: PAD_PLACEHOLDER.to_string(),
        hash,
    })
}

/// Build and serialize the manifest payload for the archive at `path`.
pub fn build_manifest_payload(path: impl AsRef<Path>, generator_id: &str) -> Result<String> {
    ManifestPayload::build(path, generator_id)?.to_json()
}

/// EPUB extensions whose `dc:format` is fixed rather than looked up.
/// `None` means the fallback format.
const PINNED_FORMATS: &[(&str, Option<&str>)] = &[
    ("otf", Some("font/otf")),
    ("ttf", Some("font/ttf")),
    ("woff", Some("font/woff")),
    ("woff2", Some("font/woff2")),
    ("opf", None),
    ("ncx", None),
];

/// MIME type for an archive entry name
pub fn guess_format(name: &str) -> String {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    if let Some(ext) = extension.as_deref() {
        if let Some((_, pinned)) = PINNED_FORMATS.iter().find(|(e, _)| *e == ext) {
            return pinned.unwrap_or(FALLBACK_FORMAT).to_string();
        }
    }

    mime_guess::from_path(name)
        .first_raw()
        .unwrap_or(FALLBACK_FORMAT)
        .to_string()
}

fn sha256_reader<R: Read>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_vec())
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> std::path::PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (entry, data) in entries {
            if entry.ends_with('/') {
                writer.add_directory(*entry, options).unwrap();
            } else {
                writer.start_file(*entry, options).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_guess_format_known_extensions() {
        assert_eq!(guess_format("OEBPS/chapter1.html"), "text/html");
        assert_eq!(guess_format("OEBPS/images/cover.jpg"), "image/jpeg");
        assert_eq!(guess_format("OEBPS/style.css"), "text/css");
    }

    #[test]
    fn test_guess_format_pinned_epub_extensions() {
        assert_eq!(guess_format("OEBPS/fonts/Serif.otf"), "font/otf");
        assert_eq!(guess_format("OEBPS/fonts/Serif.WOFF2"), "font/woff2");
        assert_eq!(guess_format("OEBPS/content.opf"), FALLBACK_FORMAT);
        assert_eq!(guess_format("OEBPS/toc.ncx"), FALLBACK_FORMAT);
        assert_eq!(guess_format("OEBPS/nav.xhtml"), "application/xhtml+xml");
    }

    #[test]
    fn test_guess_format_fallback() {
        assert_eq!(guess_format("data/blob.xyz123"), FALLBACK_FORMAT);
        assert_eq!(guess_format("mimetype"), FALLBACK_FORMAT);
    }

    #[test]
    fn test_collection_skips_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_zip(
            temp_dir.path(),
            "book.epub",
            &[
                ("mimetype", b"application/epub+zip"),
                ("OEBPS/", b""),
                ("OEBPS/chapter1.html", b"<html></html>"),
            ],
        );

        let collection = build_collection_assertion(&path).unwrap();
        assert_eq!(collection.algorithm, "sha256");
        let uris: Vec<_> = collection.entries.iter().map(|e| e.uri.as_str()).collect();
        assert_eq!(uris, vec!["mimetype", "OEBPS/chapter1.html"]);
        assert_eq!(collection.entries[1].size, 13);
        assert_eq!(collection.entries[1].hash, Sha256::digest(b"<html></html>").to_vec());
    }

    #[test]
    fn test_whole_file_padding_is_literal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_zip(temp_dir.path(), "a.epub", &[("a.txt", b"a")]);

        let assertion = build_whole_file_assertion(&path).unwrap();
        assert_eq!(assertion.padding, "0000");
        assert_eq!(assertion.hash.len(), 32);
    }

    #[test]
    fn test_payload_wire_format() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_zip(temp_dir.path(), "a.epub", &[("text.html", b"hi")]);

        let json = build_manifest_payload(&path, "epubseal/test").unwrap();
        let collection_hash = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            Sha256::digest(b"hi"),
        );

        assert!(json.starts_with(
            r#"{"claim_generator":"epubseal/test","assertions":[{"label":"c2pa.hash.collection.data","data":{"alg":"sha256","uris":[{"uri":"text.html","hash":""#
        ));
        assert!(json.contains(&format!(
            r#""hash":"{}","dc:format":"text/html","size":2}}]}}}}"#,
            collection_hash
        )));
        assert!(json.contains(r#"{"label":"c2pa.hash.data","data":{"alg":"sha256","pad":"0000","hash":""#));
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_payload_deserializes_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_zip(temp_dir.path(), "a.epub", &[("a.css", b"body{}")]);

        let payload = ManifestPayload::build(&path, "gen").unwrap();
        let parsed: ManifestPayload = serde_json::from_str(&payload.to_json().unwrap()).unwrap();
        assert_eq!(parsed, payload);
        assert_eq!(parsed.collection().unwrap().entries.len(), 1);
        assert_eq!(parsed.whole_file().unwrap().padding, PAD_PLACEHOLDER);
    }

    #[test]
    fn test_missing_file_errors() {
        let missing = Path::new("/nonexistent/book.epub");
        assert!(matches!(
            build_collection_assertion(missing),
            Err(Error::ArchiveRead { .. })
        ));
        assert!(matches!(
            build_whole_file_assertion(missing),
            Err(Error::FileRead { .. })
        ));
    }
}
