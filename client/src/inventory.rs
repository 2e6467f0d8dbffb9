//! Availability snapshots with a last-good fallback.
//!
//! Each train has at most one cached snapshot. A successful read replaces it
//! wholesale; a failed read leaves it in place and serves it flagged stale.
//! Refreshes are triggered by events ([`RefreshReason`]), never by a timer.

use crate::error::ServiceError;
use crate::metrics;
use crate::observed::Observed;
use crate::retry::{RetryPolicy, retry_with_predicate};
use crate::service::RailwayService;
use rail_tikit_core::{BookingError, Clock, InventorySnapshot, RefreshReason, TrainId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;

/// Per-train snapshot cache in front of [`RailwayService::availability`]
pub struct InventoryCache {
    service: Arc<dyn RailwayService>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    refresh_timeout: Duration,
    snapshots: RwLock<HashMap<TrainId, Arc<InventorySnapshot>>>,
}

impl InventoryCache {
    /// Creates an empty cache
    #[must_use]
    pub fn new(
        service: Arc<dyn RailwayService>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            service,
            clock,
            retry,
            refresh_timeout,
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Last good snapshot for a train, without contacting the service
    pub async fn cached(&self, train_id: TrainId) -> Option<Arc<InventorySnapshot>> {
        self.snapshots.read().await.get(&train_id).cloned()
    }

    /// Initial load: reads availability, retrying transient failures. The
    /// retries together are bounded by the refresh timeout.
    ///
    /// # Errors
    ///
    /// [`BookingError::Unauthorized`] always propagates. Other failures
    /// propagate only when there is no earlier snapshot to fall back to.
    pub async fn load(&self, train_id: TrainId) -> Result<Observed<Arc<InventorySnapshot>>, BookingError> {
        let result = self
            .bounded(retry_with_predicate(
                &self.retry,
                "availability",
                || self.fetch(train_id),
                ServiceError::is_transient,
            ))
            .await;
        self.settle(train_id, result).await
    }

    /// Re-reads availability once, bounded by the refresh timeout.
    ///
    /// # Errors
    ///
    /// Same as [`InventoryCache::load`].
    pub async fn refresh(&self, train_id: TrainId) -> Result<Observed<Arc<InventorySnapshot>>, BookingError> {
        let result = self.bounded(self.fetch(train_id)).await;
        self.settle(train_id, result).await
    }

    /// Refresh triggered by an event such as a completed purchase or the
    /// shopper returning to the coach selection view.
    ///
    /// # Errors
    ///
    /// Same as [`InventoryCache::load`].
    pub async fn request_refresh(
        &self,
        train_id: TrainId,
        reason: RefreshReason,
    ) -> Result<Observed<Arc<InventorySnapshot>>, BookingError> {
        tracing::debug!(%train_id, reason = reason.as_str(), "Refreshing availability");
        let result = self.refresh(train_id).await;
        let fresh = matches!(&result, Ok(observed) if !observed.is_stale());
        metrics::record_inventory_refresh(reason, fresh);
        result
    }

    async fn bounded(
        &self,
        read: impl Future<Output = Result<InventorySnapshot, ServiceError>>,
    ) -> Result<InventorySnapshot, ServiceError> {
        timeout(self.refresh_timeout, read)
            .await
            .unwrap_or(Err(ServiceError::Timeout {
                operation: "availability",
            }))
    }

    /// Stamped with the time the read was issued, so overlapping reads
    /// can be ordered
    async fn fetch(&self, train_id: TrainId) -> Result<InventorySnapshot, ServiceError> {
        let requested_at = self.clock.now();
        let rows = self.service.availability(train_id).await?;
        InventorySnapshot::new(train_id, requested_at, rows)
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }

    async fn settle(
        &self,
        train_id: TrainId,
        result: Result<InventorySnapshot, ServiceError>,
    ) -> Result<Observed<Arc<InventorySnapshot>>, BookingError> {
        match result {
            Ok(snapshot) => {
                let mut snapshots = self.snapshots.write().await;
                if let Some(current) = snapshots.get(&train_id).filter(|c| c.taken_at() > snapshot.taken_at()) {
                    // An overlapping read issued later has already landed.
                    tracing::debug!(%train_id, "Discarding availability read older than the cached one");
                    return Ok(Observed::fresh(Arc::clone(current)));
                }
                let snapshot = Arc::new(snapshot);
                snapshots.insert(train_id, Arc::clone(&snapshot));
                tracing::debug!(
                    %train_id,
                    available = snapshot.total_available(),
                    "Availability snapshot replaced"
                );
                Ok(Observed::fresh(snapshot))
            }
            Err(ServiceError::Unauthorized) => Err(BookingError::Unauthorized),
            Err(error) => match self.cached(train_id).await {
                Some(previous) => {
                    tracing::warn!(
                        %train_id,
                        error = %error,
                        taken_at = %previous.taken_at(),
                        "Availability read failed, serving last snapshot"
                    );
                    metrics::record_stale_read("availability");
                    let since = previous.taken_at();
                    Ok(Observed::stale(previous, since, error.to_string()))
                }
                None => Err(error.into()),
            },
        }
    }
}
