//! Deny-list snapshots backed by the `ip_denylist` table
//!
//! Readers take an `Arc` clone of the current snapshot and never wait on a
//! reload. A stale snapshot triggers one background refresh; the new set is
//! published with a single pointer store once fully built.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use relief_common::net::{IpNetwork, IpPatternSet};
use sqlx::PgPool;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DenylistError {
    #[error("Failed to load deny-list: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Deny-list load timed out after {0:?}")]
    Timeout(Duration),
}

/// One `ip_denylist` row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DenyRow {
    pub pattern: String,
    pub reason: Option<String>,
}

/// Where deny-list rows come from
#[async_trait]
pub trait DenylistSource: Send + Sync + 'static {
    async fn load(&self) -> Result<Vec<DenyRow>, DenylistError>;
}

/// Loads rows from PostgreSQL
#[derive(Clone)]
pub struct PgDenylistSource {
    pool: PgPool,
}

impl PgDenylistSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DenylistSource for PgDenylistSource {
    async fn load(&self) -> Result<Vec<DenyRow>, DenylistError> {
        let rows = sqlx::query_as::<_, DenyRow>("SELECT pattern, reason FROM ip_denylist")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

/// Immutable deny-set as of `loaded_at`
#[derive(Debug, Clone)]
pub struct DenySnapshot {
    patterns: IpPatternSet,
    loaded_at: Instant,
}

impl DenySnapshot {
    pub fn empty() -> Self {
        Self {
            patterns: IpPatternSet::new(),
            loaded_at: Instant::now(),
        }
    }

    /// Build from table rows; malformed patterns are skipped
    pub fn from_rows(rows: Vec<DenyRow>) -> Self {
        let mut patterns = IpPatternSet::new();
        for row in rows {
            match row.pattern.parse::<IpNetwork>() {
                Ok(pattern) => patterns.insert(pattern),
                Err(e) => warn!(
                    pattern = %row.pattern,
                    reason = ?row.reason,
                    error = %e,
                    "Skipping malformed deny-list row"
                ),
            }
        }
        Self {
            patterns,
            loaded_at: Instant::now(),
        }
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.patterns.contains(ip)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_stale(&self, interval: Duration) -> bool {
        self.loaded_at.elapsed() >= interval
    }

    /// Same patterns, clock restarted; used to push back the next retry
    fn renewed(&self) -> Self {
        Self {
            patterns: self.patterns.clone(),
            loaded_at: Instant::now(),
        }
    }
}

/// Shared deny-list with lazy background refresh
pub struct Denylist {
    source: Arc<dyn DenylistSource>,
    current: RwLock<Arc<DenySnapshot>>,
    refreshing: AtomicBool,
    refresh_interval: Duration,
    load_timeout: Duration,
}

impl Denylist {
    pub fn new(
        source: Arc<dyn DenylistSource>,
        refresh_interval: Duration,
        load_timeout: Duration,
    ) -> Self {
        Self {
            source,
            current: RwLock::new(Arc::new(DenySnapshot::empty())),
            refreshing: AtomicBool::new(false),
            refresh_interval,
            load_timeout,
        }
    }

    /// Current snapshot without triggering a refresh
    pub fn current(&self) -> Arc<DenySnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    fn publish(&self, snapshot: DenySnapshot) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(snapshot);
    }

    /// Current snapshot; spawns a refresh when it has gone stale
    ///
    /// The caller always gets the snapshot that was current on entry.
    pub fn snapshot(self: &Arc<Self>) -> Arc<DenySnapshot> {
        let snapshot = self.current();
        if snapshot.is_stale(self.refresh_interval) {
            self.spawn_refresh();
        }
        snapshot
    }

    fn spawn_refresh(self: &Arc<Self>) {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            // Errors are already logged inside refresh.
            let _ = this.refresh().await;
            this.refreshing.store(false, Ordering::Release);
        });
    }

    /// Reload from the source and publish the result
    ///
    /// On failure the previous patterns stay in effect and the next attempt
    /// waits one more refresh interval.
    pub async fn refresh(&self) -> Result<usize, DenylistError> {
        let loaded = match tokio::time::timeout(self.load_timeout, self.source.load()).await {
            Ok(result) => result,
            Err(_) => Err(DenylistError::Timeout(self.load_timeout)),
        };

        match loaded {
            Ok(rows) => {
                let snapshot = DenySnapshot::from_rows(rows);
                let count = snapshot.len();
                self.publish(snapshot);
                debug!(patterns = count, "Deny-list refreshed");
                Ok(count)
            },
            Err(e) => {
                warn!(error = %e, "Deny-list refresh failed, keeping previous snapshot");
                let renewed = self.current().renewed();
                self.publish(renewed);
                Err(e)
            },
        }
    }

    /// Initial load at startup; a failure leaves an empty deny-set
    pub async fn preload(&self) {
        match self.refresh().await {
            Ok(count) => info!(patterns = count, "Deny-list loaded"),
            Err(e) => warn!(error = %e, "Starting with an empty deny-list"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// In-memory source that counts loads and can be switched to fail
    #[derive(Default)]
    struct StaticSource {
        rows: Mutex<Vec<String>>,
        fail: AtomicBool,
        loads: AtomicUsize,
    }

    impl StaticSource {
        fn with(patterns: &[&str]) -> Arc<Self> {
            let source = Self::default();
            source.set(patterns);
            Arc::new(source)
        }

        fn set(&self, patterns: &[&str]) {
            *self.rows.lock().unwrap() = patterns.iter().map(|p| p.to_string()).collect();
        }
    }

    #[async_trait]
    impl DenylistSource for StaticSource {
        async fn load(&self) -> Result<Vec<DenyRow>, DenylistError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(DenylistError::Timeout(Duration::from_millis(1)));
            }
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .map(|p| DenyRow {
                    pattern: p.clone(),
                    reason: Some("test".to_string()),
                })
                .collect())
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let snapshot = DenySnapshot::from_rows(vec![
            DenyRow {
                pattern: "198.51.100.0/24".into(),
                reason: None,
            },
            DenyRow {
                pattern: "not a network".into(),
                reason: Some("typo".into()),
            },
            DenyRow {
                pattern: " 203.0.113.9 ".into(),
                reason: None,
            },
        ]);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains(ip("198.51.100.77")));
        assert!(snapshot.contains(ip("203.0.113.9")));
    }

    #[tokio::test]
    async fn test_preload_publishes_snapshot() {
        let source = StaticSource::with(&["192.0.2.1"]);
        let denylist = Denylist::new(source.clone(), Duration::from_secs(60), Duration::from_secs(1));

        assert!(denylist.current().is_empty());
        denylist.preload().await;
        assert!(denylist.current().contains(ip("192.0.2.1")));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_snapshot_refreshes_in_background() {
        let source = StaticSource::with(&["192.0.2.1"]);
        let denylist = Arc::new(Denylist::new(
            source.clone(),
            Duration::from_secs(60),
            Duration::from_secs(1),
        ));
        denylist.preload().await;

        source.set(&["192.0.2.2"]);
        let fresh = denylist.snapshot();
        assert!(fresh.contains(ip("192.0.2.1")));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        let stale = denylist.snapshot();
        // The caller still sees the snapshot that was current on entry
        assert!(stale.contains(ip("192.0.2.1")));

        tokio::time::sleep(Duration::from_millis(10)).await;
        let refreshed = denylist.current();
        assert!(refreshed.contains(ip("192.0.2.2")));
        assert!(!refreshed.contains(ip("192.0.2.1")));
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_snapshot_and_backs_off() {
        let source = StaticSource::with(&["192.0.2.1"]);
        let denylist = Arc::new(Denylist::new(
            source.clone(),
            Duration::from_secs(60),
            Duration::from_secs(1),
        ));
        denylist.preload().await;

        source.fail.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(61)).await;
        denylist.snapshot();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
        assert!(denylist.current().contains(ip("192.0.2.1")));

        // Within the next interval no further attempt is made
        denylist.snapshot();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_refresh_in_flight() {
        struct SlowSource {
            loads: AtomicUsize,
        }

        #[async_trait]
        impl DenylistSource for SlowSource {
            async fn load(&self) -> Result<Vec<DenyRow>, DenylistError> {
                self.loads.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(Vec::new())
            }
        }

        let source = Arc::new(SlowSource {
            loads: AtomicUsize::new(0),
        });
        let denylist = Arc::new(Denylist::new(
            source.clone(),
            Duration::from_secs(60),
            Duration::from_secs(1),
        ));

        tokio::time::advance(Duration::from_secs(61)).await;
        for _ in 0..10 {
            denylist.snapshot();
        }
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_timeout() {
        struct HangingSource;

        #[async_trait]
        impl DenylistSource for HangingSource {
            async fn load(&self) -> Result<Vec<DenyRow>, DenylistError> {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
        }

        let denylist = Denylist::new(
            Arc::new(HangingSource),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        assert!(matches!(denylist.refresh().await, Err(DenylistError::Timeout(_))));
    }
}
