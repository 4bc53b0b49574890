//! Access gate for mutating requests
//!
//! POST and PATCH requests are admitted or refused based on the resolved
//! client address and the CDN country header:
//!
//! 1. address in the deny-list (`ip_denylist` table) → `ip denied`
//! 2. `ALLOWED_IPS` set and address outside it → `ip not allowed`
//! 3. `ALLOWED_COUNTRIES` set and header missing → `missing country`
//!    (unless `ALLOW_NO_COUNTRY`), or not listed → `disallowed country`
//!
//! Refusals are answered with `403` and recorded on the response so the
//! request log carries `blocked: <reason>`.
//!
//! # Usage
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//! use axum::{routing::post, Router};
//! use relief_server::access::{AccessGate, AccessGateLayer, AccessPolicy, Denylist, PgDenylistSource};
//! use relief_server::config::AccessConfig;
//!
//! # async fn example(pool: sqlx::PgPool) {
//! let denylist = Arc::new(Denylist::new(
//!     Arc::new(PgDenylistSource::new(pool)),
//!     Duration::from_secs(60),
//!     Duration::from_secs(1),
//! ));
//! denylist.preload().await;
//!
//! let gate = AccessGate::new(AccessPolicy::from_config(&AccessConfig::default()), denylist);
//! let app: Router = Router::new()
//!     .route("/supplies/:id", post(|| async { "ok" }))
//!     .layer(AccessGateLayer::new(gate));
//! # }
//! ```

mod denylist;
mod middleware;
mod policy;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use sqlx::PgPool;

pub use denylist::{DenyRow, DenySnapshot, Denylist, DenylistError, DenylistSource, PgDenylistSource};
pub use middleware::{blocked_response, AccessGateLayer, AccessGateMiddleware, COUNTRY_HEADER};
pub use policy::{AccessPolicy, AdmissionError, Decision};

use crate::config::AccessConfig;

/// Static policy plus the shared deny-list
#[derive(Clone)]
pub struct AccessGate {
    policy: Arc<AccessPolicy>,
    denylist: Arc<Denylist>,
}

impl AccessGate {
    pub fn new(policy: AccessPolicy, denylist: Arc<Denylist>) -> Self {
        Self {
            policy: Arc::new(policy),
            denylist,
        }
    }

    /// Build from configuration and preload the deny-list from `pool`
    pub async fn connect(config: &AccessConfig, pool: PgPool) -> Self {
        let denylist = Arc::new(Denylist::new(
            Arc::new(PgDenylistSource::new(pool)),
            Duration::from_secs(config.denylist_refresh_secs),
            Duration::from_millis(config.denylist_load_timeout_ms),
        ));
        denylist.preload().await;
        Self::new(AccessPolicy::from_config(config), denylist)
    }

    pub fn denylist(&self) -> &Arc<Denylist> {
        &self.denylist
    }

    /// Evaluate against the current deny-list snapshot
    pub fn evaluate(&self, method: &Method, ip: Option<IpAddr>, country: Option<&str>) -> Decision {
        let snapshot = self.denylist.snapshot();
        self.policy.evaluate(method, ip, country, &snapshot)
    }
}
