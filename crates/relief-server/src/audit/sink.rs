//! Detached, bounded persistence of request log records

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::models::NewRequestLog;
use super::queries::insert_request_log;

#[derive(Debug, Error)]
pub enum AuditPersistenceError {
    #[error("request log insert failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("request log insert timed out after {0:?}")]
    Timeout(Duration),

    #[error("request log write pool is full")]
    PoolFull,

    #[error("no async runtime to run the write on")]
    NoRuntime,
}

/// Fire-and-forget writer for `request_logs`
///
/// Every record gets its own task and timeout. When `max_concurrent` writes
/// are already in flight the record is dropped.
#[derive(Clone)]
pub struct AuditSink {
    pool: PgPool,
    permits: Arc<Semaphore>,
    capacity: usize,
    write_timeout: Duration,
}

impl AuditSink {
    pub fn new(pool: PgPool, max_concurrent: usize, write_timeout: Duration) -> Self {
        let capacity = max_concurrent.max(1);
        Self {
            pool,
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            write_timeout,
        }
    }

    /// Writes currently in flight
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.permits.available_permits())
    }

    /// Queue `record` for insertion without waiting for it
    pub fn dispatch(&self, record: NewRequestLog) {
        if let Err(e) = self.try_dispatch(record) {
            warn!(error = %e, "Dropping request log record");
        }
    }

    fn try_dispatch(&self, record: NewRequestLog) -> Result<(), AuditPersistenceError> {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| AuditPersistenceError::PoolFull)?;
        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| AuditPersistenceError::NoRuntime)?;

        let pool = self.pool.clone();
        let write_timeout = self.write_timeout;
        handle.spawn(async move {
            let _permit = permit;
            let method = record.method.clone();
            let path = record.path.clone();
            match write(&pool, &record, write_timeout).await {
                Ok(id) => debug!(id, method = %method, path = %path, "Request log written"),
                Err(e) => warn!(error = %e, method = %method, path = %path, "Request log write failed"),
            }
        });
        Ok(())
    }
}

async fn write(
    pool: &PgPool,
    record: &NewRequestLog,
    write_timeout: Duration,
) -> Result<i64, AuditPersistenceError> {
    match tokio::time::timeout(write_timeout, insert_request_log(pool, record)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(AuditPersistenceError::Timeout(write_timeout)),
    }
}
