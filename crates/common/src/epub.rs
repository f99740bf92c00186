//! EPUB package inspection
//!
//! Read-only summary of an EPUB container: mimetype placement, the OPF
//! rootfile declared in `META-INF/container.xml`, Dublin Core metadata and
//! whether a content credential is already embedded.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

pub const EPUB_MIMETYPE: &str = "application/epub+zip";
pub const CONTAINER_PATH: &str = "META-INF/container.xml";
pub const CONTENT_CREDENTIAL_PATH: &str = "META-INF/content_credential.c2pa";

/// Upper bound on the decompressed size of mimetype, container and OPF entries
pub const MAX_METADATA_ENTRY_BYTES: u64 = 4 * 1024 * 1024;

/// Dublin Core fields from the OPF package document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub title: Option<String>,
    pub creators: Vec<String>,
    pub language: Option<String>,
    pub identifier: Option<String>,
    pub publisher: Option<String>,
    pub date: Option<String>,
}

/// Structural summary of an EPUB archive
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpubPackageInfo {
    pub mimetype_first: bool,
    pub mimetype: Option<String>,
    pub mimetype_ok: bool,
    pub rootfile: Option<String>,
    pub metadata: PackageMetadata,
    pub entry_count: usize,
    pub directory_count: usize,
    pub total_uncompressed_size: u64,
    pub has_c2pa_manifest: bool,
    pub issues: Vec<String>,
}

/// Inspect the EPUB at `path`.
pub fn inspect_package(path: impl AsRef<Path>) -> Result<EpubPackageInfo> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::archive(path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::archive(path, e))?;

    let mut info = EpubPackageInfo::default();
    let mut names = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let entry = archive
            .by_index_raw(i)
            .map_err(|e| Error::entry(format!("#{}", i), e))?;
        if entry.is_dir() {
            info.directory_count += 1;
            continue;
        }
        info.entry_count += 1;
        info.total_uncompressed_size += entry.size();
        names.push(entry.name().to_string());
    }

    debug!(
        "EPUB {} has {} entries ({} directories)",
        path.display(),
        info.entry_count,
        info.directory_count
    );

    info.mimetype_first = names.first().map(|n| n == "mimetype").unwrap_or(false);
    info.has_c2pa_manifest = names
        .iter()
        .any(|n| n == CONTENT_CREDENTIAL_PATH || n.ends_with(".c2pa"));

    if names.iter().any(|n| n == "mimetype") {
        let content = read_entry_string(&mut archive, "mimetype")?;
        let trimmed = content.trim().to_string();
        info.mimetype_ok = trimmed == EPUB_MIMETYPE;
        if !info.mimetype_ok {
            info.issues.push(format!("Unexpected mimetype: {}", trimmed));
        }
        info.mimetype = Some(trimmed);
    } else {
        info.issues.push("Missing mimetype entry".to_string());
    }
    if info.mimetype.is_some() && !info.mimetype_first {
        info.issues.push("mimetype is not the first entry".to_string());
    }

    if !names.iter().any(|n| n == CONTAINER_PATH) {
        info.issues.push(format!("Missing {}", CONTAINER_PATH));
        return Ok(info);
    }

    let container = read_entry_string(&mut archive, CONTAINER_PATH)?;
    info.rootfile = parse_rootfile(&container);

    let Some(rootfile) = info.rootfile.clone() else {
        info.issues.push("container.xml declares no rootfile".to_string());
        return Ok(info);
    };

    if !names.iter().any(|n| *n == rootfile) {
        warn!("Rootfile {} not present in {}", rootfile, path.display());
        info.issues.push(format!("Rootfile not found: {}", rootfile));
        return Ok(info);
    }

    let opf = read_entry_string(&mut archive, &rootfile)?;
    info.metadata = parse_package_metadata(&opf);
    if info.metadata.title.is_none() {
        info.issues.push("Package has no dc:title".to_string());
    }

    Ok(info)
}

fn read_entry_string<R: Read + Seek>(archive: &mut zip::ZipArchive<R>, name: &str) -> Result<String> {
    read_entry_limited(archive, name, MAX_METADATA_ENTRY_BYTES)
}

/// Read at most `limit` decompressed bytes; larger entries are rejected.
fn read_entry_limited<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
    limit: u64,
) -> Result<String> {
    let entry = archive.by_name(name).map_err(|e| Error::entry(name, e))?;
    let mut bytes = Vec::new();
    entry
        .take(limit + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| Error::entry(name, e))?;
    if bytes.len() as u64 > limit {
        return Err(Error::entry(
            name,
            format!("decompressed size exceeds {} bytes", limit),
        ));
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// `full-path` of the first `<rootfile>` in container.xml
pub fn parse_rootfile(container_xml: &str) -> Option<String> {
    let re = Regex::new(r#"<(?:\w+:)?rootfile\b[^>]*\bfull-path\s*=\s*["']([^"']+)["']"#).ok()?;
    re.captures(container_xml)
        .and_then(|c| c.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
}

/// Dublin Core elements from an OPF package document
pub fn parse_package_metadata(opf: &str) -> PackageMetadata {
    let mut creators = dc_values(opf, "creator");
    creators.retain(|c| !c.is_empty());

    PackageMetadata {
        title: dc_values(opf, "title").into_iter().next(),
        creators,
        language: dc_values(opf, "language").into_iter().next(),
        identifier: dc_values(opf, "identifier").into_iter().next(),
        publisher: dc_values(opf, "publisher").into_iter().next(),
        date: dc_values(opf, "date").into_iter().next(),
    }
}

fn dc_values(opf: &str, element: &str) -> Vec<String> {
    let pattern = format!(r"(?s)<dc:{0}\b[^>]*>(.*?)</dc:{0}>", element);
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };
    re.captures_iter(opf)
        .filter_map(|c| c.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
        .collect()
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
