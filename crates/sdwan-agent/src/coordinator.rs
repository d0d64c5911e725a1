//! Agent Coordinator: runs the probe and sync loops concurrently and owns
//! the fallback state machine.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sdwan_common::models::{Metric, TelemetryReport};
use tokio::sync::{watch, Mutex};

use crate::client::ControllerClient;
use crate::prober::ProbeEngine;
use crate::reconciler::Reconciler;

struct SharedState {
    latest_metrics: Option<Vec<Metric>>,
    in_fallback: bool,
}

/// Drives the probe and sync loops for one agent until told to stop.
pub struct Coordinator {
    agent_id: String,
    sync_interval: Duration,
    probe_interval: Duration,
    probe_engine: Mutex<ProbeEngine>,
    client: Arc<ControllerClient>,
    reconciler: Arc<Reconciler>,
    state: Arc<Mutex<SharedState>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Coordinator {
    pub fn new(
        agent_id: String,
        probe_interval: Duration,
        sync_interval: Duration,
        probe_engine: ProbeEngine,
        client: Arc<ControllerClient>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            agent_id,
            sync_interval,
            probe_interval,
            probe_engine: Mutex::new(probe_engine),
            client,
            reconciler,
            state: Arc::new(Mutex::new(SharedState {
                latest_metrics: None,
                in_fallback: false,
            })),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    async fn enter_fallback(&self) {
        let mut state = self.state.lock().await;
        if state.in_fallback {
            return;
        }
        state.in_fallback = true;
        drop(state);
        tracing::warn!(agent_id = %self.agent_id, "entering fallback mode");
        self.reconciler.flush_all().await;
    }

    async fn exit_fallback(&self) {
        let mut state = self.state.lock().await;
        if !state.in_fallback {
            return;
        }
        state.in_fallback = false;
        tracing::info!(agent_id = %self.agent_id, "exiting fallback mode");
    }

    async fn probe_loop(&self) {
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            if *shutdown.borrow() {
                return;
            }
            let metrics = {
                let mut engine = self.probe_engine.lock().await;
                engine.run_once().await
            };
            {
                let mut state = self.state.lock().await;
                state.latest_metrics = Some(metrics);
            }
            tokio::select! {
                _ = tokio::time::sleep(self.probe_interval) => {}
                _ = shutdown.changed() => return,
            }
        }
    }

    async fn sync_loop(&self) {
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            if *shutdown.borrow() {
                return;
            }
            let metrics = {
                let state = self.state.lock().await;
                state.latest_metrics.clone()
            };
            let Some(metrics) = metrics else {
                tokio::select! {
                    _ = tokio::time::sleep(self.sync_interval) => continue,
                    _ = shutdown.changed() => return,
                }
            };

            let timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs() as i64;
            let report = TelemetryReport {
                agent_id: self.agent_id.clone(),
                timestamp,
                metrics,
            };

            if !self.client.send_telemetry_with_retry(&report).await {
                self.enter_fallback().await;
                tokio::select! {
                    _ = tokio::time::sleep(self.sync_interval) => continue,
                    _ = shutdown.changed() => return,
                }
            }
            self.exit_fallback().await;

            match self.client.fetch_routes_with_retry(&self.agent_id).await {
                Some(response) => {
                    self.reconciler.sync(&response.routes).await;
                }
                None => {
                    self.enter_fallback().await;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.sync_interval) => {}
                _ = shutdown.changed() => return,
            }
        }
    }

    /// Runs both loops to completion (i.e. until shutdown is signaled).
    pub async fn run(self: Arc<Self>) {
        let probe_handle = {
            let this = self.clone();
            tokio::spawn(async move { this.probe_loop().await })
        };
        let sync_handle = {
            let this = self.clone();
            tokio::spawn(async move { this.sync_loop().await })
        };
        let _ = tokio::join!(probe_handle, sync_handle);
    }

    #[cfg(test)]
    pub async fn is_in_fallback(&self) -> bool {
        self.state.lock().await.in_fallback
    }
}
