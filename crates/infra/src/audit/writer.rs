//! Best-effort audit writer.
//!
//! `record*` never block and never fail: events go onto a bounded queue that a
//! background task drains into the store. A full queue drops the event; a
//! store write that keeps failing after the retry budget is discarded. Both
//! cases are logged and counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::AuditConfig;
use crate::document_store::DocumentStore;

use super::event::{AuditEvent, ChangeSet, NewAuditEvent};

enum Command {
    Write(AuditEvent),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

#[derive(Debug, Default)]
struct Counters {
    recorded: AtomicU64,
    written: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of the writer's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditStats {
    /// Events handed to `record*`.
    pub recorded: u64,
    /// Events durably written.
    pub written: u64,
    /// Events rejected because the queue was full or closed.
    pub dropped: u64,
    /// Events discarded after the store kept failing.
    pub failed: u64,
}

/// Cheap, cloneable handle to the audit side channel.
#[derive(Debug, Clone)]
pub struct AuditLog {
    tx: mpsc::Sender<Command>,
    counters: Arc<Counters>,
}

/// Owner of the background writer task.
#[derive(Debug)]
pub struct AuditWorker {
    tx: mpsc::Sender<Command>,
    join: JoinHandle<()>,
}

impl AuditWorker {
    /// Drain everything already queued, then stop the writer.
    pub async fn shutdown(self) {
        let _ = self.tx.send(Command::Shutdown).await;
        if let Err(e) = self.join.await {
            error!(error = %e, "audit writer task ended abnormally");
        }
    }
}

impl AuditLog {
    /// Start the writer on the current tokio runtime.
    pub fn spawn(store: Arc<dyn DocumentStore>, config: AuditConfig) -> (Self, AuditWorker) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let counters = Arc::new(Counters::default());

        let join = tokio::spawn(run(rx, store, config, counters.clone()));

        let log = Self {
            tx: tx.clone(),
            counters,
        };
        (log, AuditWorker { tx, join })
    }

    /// Queue an event; the timestamp is assigned here.
    pub fn record(&self, event: NewAuditEvent) {
        let event = event.stamp(Utc::now());
        self.counters.recorded.fetch_add(1, Ordering::Relaxed);

        if let Err(err) = self.tx.try_send(Command::Write(event)) {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            let reason = match err {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "writer stopped",
            };
            warn!(reason, "audit event dropped");
        }
    }

    pub fn record_denial(&self, actor: &str, attempted_action: &str, resource: &str) {
        self.record(NewAuditEvent::denial(actor, attempted_action, resource));
    }

    pub fn record_success(
        &self,
        actor: &str,
        verb: &str,
        resource_type: &str,
        resource_id: &str,
        changes: Option<ChangeSet>,
    ) {
        self.record(NewAuditEvent::success(actor, verb, resource_type, resource_id, changes));
    }

    pub fn record_error(&self, actor: &str, resource_type: &str, resource_id: &str, message: &str) {
        self.record(NewAuditEvent::error(actor, resource_type, resource_id, message));
    }

    /// Wait until every event recorded before this call is written or discarded.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(ack_tx)).await.is_err() {
            return;
        }
        let _ = ack_rx.await;
    }

    pub fn stats(&self) -> AuditStats {
        AuditStats {
            recorded: self.counters.recorded.load(Ordering::Relaxed),
            written: self.counters.written.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

async fn run(
    mut rx: mpsc::Receiver<Command>,
    store: Arc<dyn DocumentStore>,
    config: AuditConfig,
    counters: Arc<Counters>,
) {
    info!(
        collection = %config.collection,
        capacity = config.queue_capacity,
        "audit writer started"
    );

    while let Some(command) = rx.recv().await {
        match command {
            Command::Write(event) => {
                write_with_retry(store.as_ref(), &config, &counters, event).await
            }
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
            // Already-buffered commands are still delivered after close().
            Command::Shutdown => rx.close(),
        }
    }

    info!(collection = %config.collection, "audit writer stopped");
}

async fn write_with_retry(
    store: &dyn DocumentStore,
    config: &AuditConfig,
    counters: &Counters,
    event: AuditEvent,
) {
    let data = match serde_json::to_value(&event) {
        Ok(data) => data,
        Err(e) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, action = %event.action, "audit event not serializable; discarded");
            return;
        }
    };

    let mut retry = 0;
    loop {
        match store.insert(&config.collection, data.clone()).await {
            Ok(id) => {
                counters.written.fetch_add(1, Ordering::Relaxed);
                debug!(%id, action = %event.action, kind = %event.kind, "audit event written");
                return;
            }
            Err(e) if e.is_transient() && retry < config.retry.max_retries => {
                retry += 1;
                let delay = config.retry.delay_for(retry);
                warn!(error = %e, retry, ?delay, "audit write failed; retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    error = %e,
                    action = %event.action,
                    actor = %event.actor,
                    attempts = retry + 1,
                    "audit write failed; event discarded"
                );
                return;
            }
        }
    }
}
