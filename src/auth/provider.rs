//! Credential Provider with single-flight token acquisition.
//!
//! Keeps at most one live UAA token per process:
//! - Returns the cached token while it is outside the refresh margin
//! - Serializes acquisition so concurrent callers share one exchange
//! - Drops the cached token only when the upstream rejects the credential

use arc_swap::ArcSwapOption;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::credential::{BearerToken, Token};
use super::exchange::TokenExchange;
use crate::clock::Clock;
use crate::error::ExporterError;
use crate::observability::ExporterMetrics;

/// Type alias for the inflight exchange future.
type InflightExchange = Shared<BoxFuture<'static, Result<Token, ExporterError>>>;

/// Inflight exchange tagged with the generation that started it.
type InflightSlot = Arc<Mutex<Option<(u64, InflightExchange)>>>;

/// Credential Provider producing bearer tokens on demand.
pub struct CredentialProvider {
    /// Token exchange for the configured credential
    exchange: Arc<dyn TokenExchange>,
    /// Cached token
    cached: Arc<ArcSwapOption<Token>>,
    /// Single-flight coordinator
    inflight: InflightSlot,
    /// Generation of the most recently started exchange
    generation: AtomicU64,
    /// Tokens expiring within this margin are renewed
    refresh_margin: Duration,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<ExporterMetrics>>,
}

impl CredentialProvider {
    /// Creates a provider with no cached token.
    pub fn new(
        exchange: Arc<dyn TokenExchange>,
        refresh_margin: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            exchange,
            cached: Arc::new(ArcSwapOption::empty()),
            inflight: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
            refresh_margin,
            clock,
            metrics: None,
        }
    }

    /// Records exchange outcomes in the exporter self-metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<ExporterMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns a bearer token, acquiring a new one when needed.
    ///
    /// # Errors
    ///
    /// Returns [`ExporterError::Auth`] when the exchange fails for any reason.
    pub async fn get_token(&self) -> Result<BearerToken, ExporterError> {
        if let Some(token) = self.fresh_token() {
            return Ok(token.bearer());
        }
        self.acquire_single_flight().await.map(|token| token.bearer())
    }

    /// Discards the cached token so the next call re-authenticates.
    pub fn invalidate(&self) {
        if self.cached.swap(None).is_some() {
            info!("Cached UAA token invalidated");
        }
    }

    /// Whether a token is cached, fresh or not.
    #[must_use]
    pub fn has_cached_token(&self) -> bool {
        self.cached.load().is_some()
    }

    fn fresh_token(&self) -> Option<Arc<Token>> {
        let cached = self.cached.load_full()?;
        cached
            .is_fresh(self.clock.now(), self.refresh_margin)
            .then_some(cached)
    }

    /// Runs the exchange using the single-flight pattern.
    ///
    /// Only one exchange is made even if multiple concurrent callers need a
    /// token; late joiners await the same shared future. The shared future
    /// clears its own slot before resolving, so a caller that finds an entry
    /// always receives that exchange's result.
    async fn acquire_single_flight(&self) -> Result<Token, ExporterError> {
        let mut inflight_guard = self.inflight.lock().await;

        let pending = inflight_guard.as_ref().map(|(_, fut)| fut.clone());
        if let Some(fut) = pending {
            drop(inflight_guard);
            return fut.await;
        }

        // Another caller may have finished an exchange while we waited.
        if let Some(token) = self.fresh_token() {
            return Ok((*token).clone());
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let exchange = Arc::clone(&self.exchange);
        let cached = Arc::clone(&self.cached);
        let inflight = Arc::clone(&self.inflight);
        let clock = Arc::clone(&self.clock);
        let metrics = self.metrics.clone();

        let fut: BoxFuture<'static, Result<Token, ExporterError>> = Box::pin(async move {
            debug!(generation, "Acquiring UAA token");
            let result = exchange.exchange(clock.now()).await.map_err(as_auth_failure);

            match &result {
                Ok(token) => {
                    cached.store(Some(Arc::new(token.clone())));
                    info!(expires_at = %token.expires_at(), "UAA token acquired");
                }
                Err(err) if err.invalidates_token() => {
                    cached.store(None);
                    warn!(error = %err, "UAA rejected credentials, cached token discarded");
                }
                Err(err) => {
                    warn!(error = %err, "UAA token acquisition failed, keeping cached token");
                }
            }
            if let Some(metrics) = metrics {
                metrics.record_token_exchange(result.is_ok());
            }

            let mut slot = inflight.lock().await;
            if slot.as_ref().is_some_and(|(g, _)| *g == generation) {
                slot.take();
            }
            result
        });

        let shared_fut = fut.shared();
        *inflight_guard = Some((generation, shared_fut.clone()));
        drop(inflight_guard);

        shared_fut.await
    }
}

/// Any failure while acquiring a token surfaces as an authentication error.
fn as_auth_failure(err: ExporterError) -> ExporterError {
    match err {
        ExporterError::Auth { .. } => err,
        other => ExporterError::auth_unavailable(format!("token acquisition failed: {other}")),
    }
}
