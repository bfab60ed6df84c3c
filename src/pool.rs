//! Bounded worker pool gate.
//!
//! The pool admits at most `processes × threads` requests at once. Requests
//! beyond that wait in FIFO order on the semaphore until a slot frees, the
//! same queuing a pre-forked server gives its accept backlog. Health routes
//! are mounted outside the gate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
    queued: Arc<AtomicUsize>,
}

/// A claimed pool slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct PoolSlot {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for PoolSlot {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Counts a request as queued until dropped, including when the waiting
/// future is cancelled because the client went away.
struct QueuedGuard(Arc<AtomicUsize>);

impl QueuedGuard {
    fn enter(queued: &Arc<AtomicUsize>) -> Self {
        queued.fetch_add(1, Ordering::SeqCst);
        Self(queued.clone())
    }
}

impl Drop for QueuedGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Requests currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Requests waiting for a slot
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<PoolSlot, AppError> {
        let waiting = QueuedGuard::enter(&self.queued);
        let permit = self.permits.clone().acquire_owned().await;
        drop(waiting);

        let permit = permit.map_err(|_| AppError::Internal("worker pool closed".to_string()))?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        Ok(PoolSlot {
            _permit: permit,
            in_flight: self.in_flight.clone(),
        })
    }
}

/// Middleware holding a pool slot for the whole request.
pub async fn worker_pool_layer(
    State(pool): State<WorkerPool>,
    request: Request,
    next: Next,
) -> Response {
    let slot = match pool.acquire().await {
        Ok(slot) => slot,
        Err(e) => return e.into_response(),
    };

    if pool.queued() > 0 {
        tracing::debug!(
            in_flight = pool.in_flight(),
            queued = pool.queued(),
            capacity = pool.capacity(),
            "Worker pool saturated"
        );
    }

    let response = next.run(request).await;
    drop(slot);
    response
}
