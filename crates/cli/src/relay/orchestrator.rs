//! Relay orchestrator - wires listener, dispatcher and worker pool together
//! and runs the governance loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{live_buffers, ControlFlags, ControlState, RelayConfig};
use dispatcher::{Destination, DestinationSettings, Dispatcher, WorkerPool};
use ingestion::{Listener, ListenerConfig, ListenerHandle};
use tracing::{debug, error, info, instrument, warn};

use super::RelayStats;

/// A running relay
pub struct Relay {
    config: RelayConfig,
    flags: Arc<ControlFlags>,
    pool: Arc<WorkerPool>,
    dispatcher: Dispatcher,
    listener: ListenerHandle,
    started: Instant,
    reloads: u64,
    failed_reloads: u64,
}

impl Relay {
    /// Bind the listener, start one worker per destination, start receiving
    ///
    /// Nothing is left running when this fails.
    #[instrument(
        name = "relay_start",
        skip(config, flags),
        fields(listen = %config.listen, destinations = config.destinations.len())
    )]
    pub async fn start(config: RelayConfig, flags: Arc<ControlFlags>) -> Result<Self> {
        let listener = Listener::bind(config.listen, &ListenerConfig::from(&config.tuning))
            .await
            .with_context(|| format!("Failed to bind {}", config.listen))?;

        let pool = Arc::new(WorkerPool::initialize(
            &config.destinations,
            DestinationSettings::from(&config.tuning),
            Arc::clone(&flags),
        ));
        let dispatcher = Dispatcher::new(Arc::clone(&pool));
        let listener = listener.spawn(Arc::new(dispatcher.clone()), Arc::clone(&flags));

        info!(
            local_addr = %listener.local_addr(),
            protocol = %listener.protocol(),
            destinations = config.destinations.len(),
            "Relay started"
        );

        Ok(Self {
            config,
            flags,
            pool,
            dispatcher,
            listener,
            started: Instant::now(),
            reloads: 0,
            failed_reloads: 0,
        })
    }

    /// Actual listening address
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn flags(&self) -> &Arc<ControlFlags> {
        &self.flags
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Run the governance loop until `SHUTDOWN`, then tear everything down
    pub async fn run(mut self) -> RelayStats {
        self.govern().await;
        self.shutdown().await
    }

    /// Poll the control flags once per tick
    ///
    /// Shutdown wins over reload. `RELOAD` is cleared only after the reload
    /// attempt, so a signal arriving meanwhile is folded into it.
    async fn govern(&mut self) {
        let poll_interval = self.config.tuning.poll_interval();
        let stats_every = u64::from(self.config.tuning.stats_interval_ticks);
        let mut ticks: u64 = 0;

        info!(poll_ms = poll_interval.as_millis() as u64, "Governance loop running");
        loop {
            tokio::time::sleep(poll_interval).await;
            ticks += 1;

            match self.flags.state() {
                ControlState::ShutdownRequested => {
                    info!(ticks, "Shutdown requested");
                    break;
                }
                ControlState::ReloadRequested => {
                    self.reload().await;
                    self.flags.clear(ControlFlags::RELOAD);
                }
                ControlState::Running => {}
            }

            if stats_every > 0 && ticks % stats_every == 0 {
                self.log_stats();
            }
        }
    }

    /// Re-read the configuration and reconfigure the pool
    ///
    /// Any failure keeps the current generation.
    #[instrument(name = "relay_reload", skip(self))]
    async fn reload(&mut self) {
        info!(source = ?self.config.source, "Reloading configuration");

        let current = self.config.clone();
        let reloaded = match tokio::task::spawn_blocking(move || ConfigLoader::reload(&current))
            .await
        {
            Ok(Ok(config)) => config,
            Ok(Err(e)) => {
                self.failed_reloads += 1;
                warn!(error = %e, "Reload failed, keeping current destinations");
                return;
            }
            Err(e) => {
                self.failed_reloads += 1;
                error!(error = %e, "Reload task failed, keeping current destinations");
                return;
            }
        };

        if reloaded.listen != self.config.listen {
            warn!(
                current = %self.config.listen,
                configured = %reloaded.listen,
                "Listen address change needs a restart, ignored"
            );
        }

        match self.pool.reconfigure(&reloaded.destinations).await {
            Ok(summary) => {
                self.reloads += 1;
                self.config.destinations = reloaded.destinations;
                for spec in &summary.added {
                    info!(destination = %spec, "Destination added");
                }
                for spec in &summary.removed {
                    info!(destination = %spec, "Destination removed");
                }
            }
            Err(e) => {
                self.failed_reloads += 1;
                warn!(error = %e, "Reconfigure failed, keeping current destinations");
            }
        }
    }

    fn log_stats(&self) {
        let listener = self.listener.metrics().snapshot();
        let dispatch = self.dispatcher.stats();
        let live = live_buffers();
        observability::record_live_buffers(live);

        debug!(
            units = listener.units_received,
            bytes = listener.bytes_received,
            rejected = listener.frames_rejected,
            connections = listener.active_connections(),
            dispatched = dispatch.units,
            dropped = dispatch.dropped,
            live_buffers = live,
            generation = self.pool.generation(),
            "Relay stats"
        );
        for (name, snap) in self.pool.metrics() {
            observability::record_queue_depth(&name, snap.queue_len);
            debug!(
                destination = %name,
                queue_len = snap.queue_len,
                sent = snap.sent_count,
                failed = snap.failure_count,
                dropped = snap.dropped_count,
                reconnect_failures = snap.reconnect_failures,
                connection = ?snap.connection,
                "Destination stats"
            );
        }
    }

    /// Terminal cleanup: close the listener, then drain and join every worker
    #[instrument(name = "relay_shutdown", skip(self))]
    async fn shutdown(self) -> RelayStats {
        let destinations: Vec<Arc<Destination>> = self.pool.load().destinations().to_vec();
        let listener_metrics = Arc::clone(self.listener.metrics());

        info!("Stopping listener");
        let listener_error = match self.listener.shutdown().await {
            Ok(()) => None,
            Err(e) => {
                error!(error = %e, "Listener ended with an error");
                Some(e.to_string())
            }
        };

        info!(workers = destinations.len(), "Stopping destination workers");
        self.pool.shutdown().await;

        let live = live_buffers();
        observability::record_live_buffers(live);
        if live > 0 {
            warn!(live_buffers = live, "Shared buffers still allocated after teardown");
        }

        let stats = RelayStats {
            duration: self.started.elapsed(),
            listener: listener_metrics.snapshot(),
            dispatch: self.dispatcher.stats(),
            destinations: destinations
                .iter()
                .map(|d| (d.name().to_string(), d.metrics().snapshot()))
                .collect(),
            generation: self.pool.generation(),
            reloads: self.reloads,
            failed_reloads: self.failed_reloads,
            live_buffers: live,
            listener_error,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            units = stats.listener.units_received,
            dropped = stats.dispatch.dropped,
            "Relay shutdown complete"
        );
        stats
    }
}
