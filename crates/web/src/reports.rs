//! Per-request report storage
//!
//! Every form submission creates its own [`Report`] with a fresh id. The
//! export handler looks reports up by that id only, so concurrent users never
//! see each other's findings. Entries expire after a TTL and the store is
//! bounded; the oldest report is evicted first.
//!
//! Files produced for a report live under `<artifact root>/<report id>/` and
//! are deleted together with the report.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use epubseal_common::Report;

const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

pub struct ReportStore {
    reports: RwLock<HashMap<Uuid, Report>>,
    capacity: usize,
    ttl: Duration,
    artifact_root: Option<PathBuf>,
}

impl ReportStore {
    pub fn new(capacity: usize, ttl_secs: u64) -> Self {
        Self {
            reports: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl: Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64),
            artifact_root: None,
        }
    }

    /// Delete `root/<report id>` whenever a report leaves the store.
    pub fn with_artifact_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.artifact_root = Some(root.into());
        self
    }

    /// Directory holding the files of report `id`, if artifacts are tracked
    pub fn artifact_dir(&self, id: &Uuid) -> Option<PathBuf> {
        self.artifact_root
            .as_ref()
            .map(|root| root.join(id.to_string()))
    }

    fn expired(&self, report: &Report, now: DateTime<Utc>) -> bool {
        now - report.created_at > self.ttl
    }

    pub async fn insert(&self, report: Report) -> Uuid {
        let id = report.id;
        let now = Utc::now();

        let removed = {
            let mut reports = self.reports.write().await;
            let mut removed = self.drain_expired(&mut reports, now);

            while reports.len() >= self.capacity {
                let Some(oldest) = reports
                    .values()
                    .min_by_key(|r| r.created_at)
                    .map(|r| r.id)
                else {
                    break;
                };
                debug!("Evicting report {}", oldest);
                reports.remove(&oldest);
                removed.push(oldest);
            }

            reports.insert(id, report);
            removed
        };

        self.remove_artifacts(&removed).await;
        id
    }

    /// Drop expired reports and their files. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let removed = {
            let mut reports = self.reports.write().await;
            self.drain_expired(&mut reports, Utc::now())
        };
        self.remove_artifacts(&removed).await;
        removed.len()
    }

    fn drain_expired(&self, reports: &mut HashMap<Uuid, Report>, now: DateTime<Utc>) -> Vec<Uuid> {
        let expired: Vec<Uuid> = reports
            .values()
            .filter(|r| self.expired(r, now))
            .map(|r| r.id)
            .collect();
        for id in &expired {
            reports.remove(id);
        }
        expired
    }

    async fn remove_artifacts(&self, ids: &[Uuid]) {
        for id in ids {
            let Some(dir) = self.artifact_dir(id) else {
                return;
            };
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => debug!("Removed {}", dir.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", dir.display(), e),
            }
        }
    }

    pub async fn get(&self, id: &Uuid) -> Option<Report> {
        let reports = self.reports.read().await;
        reports
            .get(id)
            .filter(|r| !self.expired(r, Utc::now()))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ReportStore {
    fn default() -> Self {
        Self::new(256, 60 * 60)
    }
}
