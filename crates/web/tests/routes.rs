//! Router tests
//!
//! Drives the upload form through the axum router with a fake manifest
//! engine, so no external signer is needed.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use epubseal_common::engine::{ManifestStore, SignRequest};
use epubseal_common::{Config, Error, ManifestEngine, Result};
use epubseal_web::WebServer;

const BOUNDARY: &str = "epubsealtestboundary";

#[derive(Default)]
struct FakeEngine {
    fail_reads: bool,
    signed: Mutex<Vec<SignRequest>>,
}

#[async_trait]
impl ManifestEngine for FakeEngine {
    async fn sign(&self, request: &SignRequest) -> Result<()> {
        std::fs::copy(&request.source, &request.output)?;
        self.signed.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn read(&self, _path: &Path) -> Result<ManifestStore> {
        if self.fail_reads {
            return Err(Error::Engine("no claim found".to_string()));
        }
        Ok(ManifestStore::from_value(serde_json::json!({
            "active_manifest": "urn:uuid:test",
            "manifests": {
                "urn:uuid:test": {"claim_generator": "epubseal/test", "title": "book.epub"}
            },
            "validation_results": {
                "activeManifest": {
                    "success": [{"code": "claimSignature.validated", "explanation": "signature valid"}],
                    "informational": [],
                    "failure": [{"code": "signingCredential.untrusted", "explanation": "not on trust list"}]
                }
            }
        })))
    }
}

struct Harness {
    _temp: TempDir,
    config: Config,
    engine: Arc<FakeEngine>,
    router: Router,
}

fn harness(engine: FakeEngine) -> Harness {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.upload_dir = temp.path().join("uploads");
    config.storage.output_dir = temp.path().join("outputs");
    config.manifest.claim_generator = "epubseal/test".to_string();

    let engine = Arc::new(engine);
    let router = WebServer::new(config.clone(), engine.clone()).router();
    Harness {
        _temp: temp,
        config,
        engine,
        router,
    }
}

fn epub_bytes() -> Vec<u8> {
    epub_with_chapter(b"<html>hello</html>")
}

fn epub_with_chapter(chapter: &[u8]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("mimetype", options).unwrap();
        writer.write_all(b"application/epub+zip").unwrap();
        writer.start_file("OEBPS/chapter1.html", options).unwrap();
        writer.write_all(chapter).unwrap();
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

fn multipart_request(action: &str, file_name: Option<&str>, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"action\"\r\n\r\n{action}\r\n"
        )
        .as_bytes(),
    );
    if let Some(name) = file_name {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/epub+zip\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send_bytes(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    let (status, bytes) = send_bytes(router, request).await;
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

fn report_id(html: &str) -> String {
    let start = html.find("/report/").expect("export link") + "/report/".len();
    html[start..start + 36].to_string()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn index_serves_upload_form() {
    let h = harness(FakeEngine::default());
    let (status, html) = send(&h.router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains(r#"enctype="multipart/form-data""#));
    assert!(html.contains(r#"value="sign""#));
}

#[tokio::test]
async fn verify_groups_validation_statuses() {
    let h = harness(FakeEngine::default());
    let (status, html) = send(&h.router, multipart_request("verify", Some("book.epub"), &epub_bytes())).await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("✅ Status success:"));
    assert!(html.contains("1. <b>claimSignature.validated</b>: signature valid<br>"));
    assert!(html.contains("❌ Status failure:"));
    assert!(html.contains("signingCredential.untrusted"));
}

#[tokio::test]
async fn verify_engine_failure_is_reported() {
    let h = harness(FakeEngine {
        fail_reads: true,
        ..Default::default()
    });
    let (status, html) = send(&h.router, multipart_request("verify", Some("book.epub"), &epub_bytes())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Error reading manifest: Manifest engine error: no claim found"));
}

#[tokio::test]
async fn sign_hashes_upload_and_writes_output() {
    let h = harness(FakeEngine::default());
    let epub = epub_bytes();
    let (status, html) = send(&h.router, multipart_request("sign", Some("my book.epub"), &epub)).await;

    assert_eq!(status, StatusCode::OK);
    let id = report_id(&html);
    assert!(html.contains(&format!(r#"<a href="/outputs/{id}/output_my_book.epub">"#)));

    let signed = h.engine.signed.lock().unwrap();
    assert_eq!(signed.len(), 1);
    let request = &signed[0];
    assert_eq!(request.payload.generator_id, "epubseal/test");
    let uris: Vec<_> = request
        .payload
        .collection()
        .unwrap()
        .entries
        .iter()
        .map(|e| e.uri.clone())
        .collect();
    assert_eq!(uris, vec!["mimetype", "OEBPS/chapter1.html"]);
    assert!(request.source.starts_with(&h.config.storage.upload_dir));

    let output: PathBuf = h
        .config
        .storage
        .output_dir
        .join(&id)
        .join("output_my_book.epub");
    assert_eq!(std::fs::read(output).unwrap(), epub);
}

#[tokio::test]
async fn same_named_uploads_keep_separate_outputs() {
    let h = harness(FakeEngine::default());
    let alice = epub_with_chapter(b"<html>alice</html>");
    let bob = epub_with_chapter(b"<html>bob</html>");

    let (_, alice_page) = send(&h.router, multipart_request("sign", Some("book.epub"), &alice)).await;
    let (_, bob_page) = send(&h.router, multipart_request("sign", Some("book.epub"), &bob)).await;
    let alice_id = report_id(&alice_page);
    let bob_id = report_id(&bob_page);
    assert_ne!(alice_id, bob_id);

    let (status, body) = send_bytes(&h.router, get(&format!("/outputs/{alice_id}/output_book.epub"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, alice);

    let (status, body) = send_bytes(&h.router, get(&format!("/outputs/{bob_id}/output_book.epub"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, bob);
}

#[tokio::test]
async fn upload_directories_are_removed_after_each_request() {
    let h = harness(FakeEngine::default());
    send(&h.router, multipart_request("inspect", Some("a.epub"), &epub_bytes())).await;
    send(&h.router, multipart_request("sign", Some("b.epub"), &epub_bytes())).await;
    send(&h.router, multipart_request("delete", Some("c.epub"), &epub_bytes())).await;

    let left = std::fs::read_dir(&h.config.storage.upload_dir).unwrap().count();
    assert_eq!(left, 0);
}

#[tokio::test]
async fn sign_failure_on_non_zip_upload() {
    let h = harness(FakeEngine::default());
    let (_, html) = send(&h.router, multipart_request("sign", Some("notes.epub"), b"not a zip")).await;
    assert!(html.contains("Failed to sign manifest store: Cannot read archive"));
    assert!(h.engine.signed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn manifest_action_shows_active_manifest() {
    let h = harness(FakeEngine::default());
    let (_, html) = send(&h.router, multipart_request("manifest", Some("book.epub"), &epub_bytes())).await;
    assert!(html.contains("Active manifest"));
    assert!(html.contains("&quot;claim_generator&quot;: &quot;epubseal/test&quot;"));
}

#[tokio::test]
async fn unknown_action_is_reported() {
    let h = harness(FakeEngine::default());
    let (status, html) = send(&h.router, multipart_request("delete", Some("book.epub"), &epub_bytes())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Unknown action"));
}

#[tokio::test]
async fn missing_file_is_rejected() {
    let h = harness(FakeEngine::default());
    let (status, html) = send(&h.router, multipart_request("verify", None, b"")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(html.contains("No file uploaded"));
}

#[tokio::test]
async fn reports_are_exported_per_request() {
    let h = harness(FakeEngine::default());
    let (_, first) = send(&h.router, multipart_request("inspect", Some("first.epub"), &epub_bytes())).await;
    let (_, second) = send(&h.router, multipart_request("verify", Some("second.epub"), &epub_bytes())).await;
    let first_id = report_id(&first);
    let second_id = report_id(&second);
    assert_ne!(first_id, second_id);

    let (status, json) = send(&h.router, get(&format!("/report/{first_id}?format=json"))).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(json["file_name"], "first.epub");
    assert_eq!(json["action"], "inspect");
    assert_eq!(json["payload"]["assertions"][1]["data"]["pad"], "0000");

    let (status, text) = send(&h.router, get(&format!("/report/{second_id}?format=text"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("File:    second.epub"));
    assert!(text.contains("1. claimSignature.validated: signature valid"));
}

#[tokio::test]
async fn unknown_report_is_not_found() {
    let h = harness(FakeEngine::default());
    let (status, _) = send(&h.router, get(&format!("/report/{}", uuid_like()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&h.router, get("/report/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn output_download_rejects_traversal() {
    let h = harness(FakeEngine::default());
    let (_, page) = send(&h.router, multipart_request("sign", Some("book.epub"), &epub_bytes())).await;
    let id = report_id(&page);

    let (status, _) = send(&h.router, get(&format!("/outputs/{id}/..%2Fsecret"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&h.router, get("/outputs/not-a-uuid/output_book.epub")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&h.router, get(&format!("/outputs/{id}/missing.epub"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&h.router, get(&format!("/outputs/{}/output_book.epub", uuid_like()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_version() {
    let h = harness(FakeEngine::default());
    let (status, body) = send(&h.router, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""status":"ok""#));
}

fn uuid_like() -> &'static str {
    "00000000-0000-4000-8000-000000000000"
}
