use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Outcome of the most recent completed cycle, as exposed on `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStatus {
    pub ok: bool,
    pub last_success_timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "filter_markets")]
    pub filter_config: Vec<String>,
}

/// Shared handle over the current [`CycleStatus`].
///
/// The poll loop is the only writer; the status endpoint only reads. Each
/// update swaps in a fresh snapshot, so readers never observe a half-written
/// value.
#[derive(Clone)]
pub struct HealthChecker {
    status: Arc<RwLock<Arc<CycleStatus>>>,
}

impl HealthChecker {
    pub fn new(filter_config: Vec<String>) -> Self {
        Self {
            status: Arc::new(RwLock::new(Arc::new(CycleStatus {
                ok: true,
                last_success_timestamp: None,
                filter_config,
            }))),
        }
    }

    pub async fn get_status(&self) -> Arc<CycleStatus> {
        self.status.read().await.clone()
    }

    pub async fn mark_ok(&self) {
        self.mark_ok_at(Utc::now()).await;
    }

    pub async fn mark_ok_at(&self, at: DateTime<Utc>) {
        let mut status = self.status.write().await;
        *status = Arc::new(CycleStatus {
            ok: true,
            last_success_timestamp: Some(at),
            filter_config: status.filter_config.clone(),
        });
    }

    /// Keeps the previous success timestamp so callers can see how stale it is.
    pub async fn mark_fail(&self) {
        let mut status = self.status.write().await;
        *status = Arc::new(CycleStatus {
            ok: false,
            last_success_timestamp: status.last_success_timestamp,
            filter_config: status.filter_config.clone(),
        });
    }
}
