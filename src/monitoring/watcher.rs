use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;

use super::baseline::{BaselineKey, BaselineStore, KnownMarkets, KnownNoticeIds, StoreError};
use super::notifier::ListingNotifier;
use crate::api::{FetchError, MarketSource, NoticeItem, NoticeSource};
use crate::core::HealthChecker;
use crate::scanner::{detect_new_markets, fresh_notices};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a single poll cycle observed and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub markets_ok: bool,
    /// New codes before prefix filtering.
    pub new_markets: Vec<String>,
    /// The subset that was sent to the notifier.
    pub alerted_markets: Vec<String>,
    pub fresh_notices: Vec<NoticeItem>,
    pub notices_ok: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub markets_seeded: Option<usize>,
    pub notices_seeded: Option<usize>,
}

#[derive(Debug, Default)]
struct MarketStep {
    new_markets: Vec<String>,
    alerted: Vec<String>,
}

/// Drives the fetch → diff → notify → persist cycle.
///
/// A baseline that is `None` has never been seeded; the next successful
/// fetch of that source seeds it without alerting.
pub struct ListingWatcher {
    markets: Arc<dyn MarketSource>,
    notices: Arc<dyn NoticeSource>,
    store: BaselineStore,
    notifier: ListingNotifier,
    health: HealthChecker,
    poll_interval: Duration,
    known_markets: Option<BTreeSet<String>>,
    known_notice_ids: Option<BTreeSet<String>>,
}

impl ListingWatcher {
    pub fn new(
        markets: Arc<dyn MarketSource>,
        notices: Arc<dyn NoticeSource>,
        store: BaselineStore,
        notifier: ListingNotifier,
        health: HealthChecker,
        poll_interval: Duration,
    ) -> Self {
        Self {
            markets,
            notices,
            store,
            notifier,
            health,
            poll_interval,
            known_markets: None,
            known_notice_ids: None,
        }
    }

    pub fn known_markets(&self) -> Option<&BTreeSet<String>> {
        self.known_markets.as_ref()
    }

    pub fn known_notice_ids(&self) -> Option<&BTreeSet<String>> {
        self.known_notice_ids.as_ref()
    }

    pub fn health(&self) -> &HealthChecker {
        &self.health
    }

    /// Loads whichever baselines exist on disk, then bootstraps the rest.
    pub async fn initialize(&mut self) -> BootstrapReport {
        if self.store.exists(BaselineKey::Markets).await {
            let doc = self
                .store
                .load(BaselineKey::Markets, KnownMarkets::default())
                .await;
            tracing::info!("Loaded {} known markets", doc.markets.len());
            self.known_markets = Some(doc.markets);
        }

        if self.store.exists(BaselineKey::Notices).await {
            let doc = self
                .store
                .load(BaselineKey::Notices, KnownNoticeIds::default())
                .await;
            tracing::info!("Loaded {} known notice ids", doc.ids.len());
            self.known_notice_ids = Some(doc.ids);
        }

        if self.known_markets.is_none() || self.known_notice_ids.is_none() {
            tracing::info!("Cache not found, creating baseline...");
            self.bootstrap().await
        } else {
            BootstrapReport::default()
        }
    }

    /// Seeds every missing baseline from the current source state without
    /// notifying. Baselines that already exist are left untouched.
    pub async fn bootstrap(&mut self) -> BootstrapReport {
        let mut report = BootstrapReport::default();

        if self.known_markets.is_none() {
            match self.markets.fetch_markets().await {
                Ok(records) => {
                    let current: BTreeSet<String> = records.into_iter().map(|m| m.code).collect();
                    report.markets_seeded = Some(current.len());
                    if let Err(e) = self.persist_markets(&current).await {
                        tracing::error!("Bootstrap markets failed to persist: {}", e);
                    }
                    tracing::info!("Baseline markets saved: {}", current.len());
                    self.known_markets = Some(current);
                }
                Err(e) => tracing::error!("Bootstrap markets failed: {}", e),
            }
        }

        if self.known_notice_ids.is_none() {
            match self.notices.fetch_listing_notices().await {
                Ok(items) => {
                    let ids: BTreeSet<String> = items.into_iter().map(|n| n.id).collect();
                    report.notices_seeded = Some(ids.len());
                    if let Err(e) = self.persist_notices(&ids).await {
                        tracing::error!("Bootstrap notices failed to persist: {}", e);
                    }
                    tracing::info!("Baseline notices saved: {}", ids.len());
                    self.known_notice_ids = Some(ids);
                }
                Err(e) => tracing::warn!("Bootstrap notices failed: {}", e),
            }
        }

        report
    }

    /// One full cycle. Liveness follows the market step only.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        match self.check_markets().await {
            Ok(step) => {
                report.markets_ok = true;
                report.new_markets = step.new_markets;
                report.alerted_markets = step.alerted;
            }
            Err(e) => {
                tracing::error!("Markets step failed: {}", e);
            }
        }

        match self.check_notices().await {
            Ok(fresh) => {
                report.notices_ok = true;
                report.fresh_notices = fresh;
            }
            Err(e) => {
                tracing::warn!("Notices step failed: {}", e);
            }
        }

        if report.markets_ok {
            self.health.mark_ok().await;
        } else {
            self.health.mark_fail().await;
        }

        report
    }

    async fn check_markets(&mut self) -> Result<MarketStep, CycleError> {
        let records = self.markets.fetch_markets().await?;

        let Some(known) = self.known_markets.as_mut() else {
            let current: BTreeSet<String> = records.iter().map(|m| m.code.clone()).collect();
            tracing::info!("Seeding market baseline with {} markets", current.len());
            self.known_markets = Some(current.clone());
            self.persist_markets(&current).await?;
            return Ok(MarketStep::default());
        };

        let diff = detect_new_markets(known, &records);
        if !diff.has_new() {
            return Ok(MarketStep::default());
        }

        tracing::info!("🆕 New markets found (before filter): {:?}", diff.new_markets);
        let alerted = self.notifier.filter().apply(&diff.new_markets);
        self.notifier.notify_new_markets(&alerted, &records).await;

        // Unfiltered: a market seen once is never re-flagged, even if the
        // filter changes later.
        known.extend(diff.current);
        let snapshot = known.clone();
        self.persist_markets(&snapshot).await?;

        Ok(MarketStep {
            new_markets: diff.new_markets,
            alerted,
        })
    }

    async fn check_notices(&mut self) -> Result<Vec<NoticeItem>, CycleError> {
        let items = self.notices.fetch_listing_notices().await?;

        let Some(known) = self.known_notice_ids.as_mut() else {
            let ids: BTreeSet<String> = items.into_iter().map(|n| n.id).collect();
            tracing::info!("Seeding notice baseline with {} ids", ids.len());
            self.known_notice_ids = Some(ids.clone());
            self.persist_notices(&ids).await?;
            return Ok(Vec::new());
        };

        let fresh = fresh_notices(known, &items);
        if fresh.is_empty() {
            return Ok(fresh);
        }

        tracing::info!("📢 New listing notices found: {}", fresh.len());
        self.notifier.notify_new_notices(&fresh).await;

        known.extend(fresh.iter().map(|n| n.id.clone()));
        let snapshot = known.clone();
        self.persist_notices(&snapshot).await?;

        Ok(fresh)
    }

    async fn persist_markets(&self, markets: &BTreeSet<String>) -> Result<(), StoreError> {
        let doc = KnownMarkets {
            markets: markets.clone(),
        };
        self.store.save(BaselineKey::Markets, &doc).await
    }

    async fn persist_notices(&self, ids: &BTreeSet<String>) -> Result<(), StoreError> {
        let doc = KnownNoticeIds { ids: ids.clone() };
        self.store.save(BaselineKey::Notices, &doc).await
    }

    /// Bootstraps, announces startup, then polls forever on a fixed interval.
    pub async fn start(mut self) {
        self.initialize().await;
        self.notifier.notify_started().await;
        tracing::info!("Market filter: {}", self.notifier.filter().label());
        self.run().await;
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let report = self.run_cycle().await;
            tracing::debug!(
                "Cycle done: markets_ok={} new={} alerted={} notices={}",
                report.markets_ok,
                report.new_markets.len(),
                report.alerted_markets.len(),
                report.fresh_notices.len()
            );
        }
    }
}
