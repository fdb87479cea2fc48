//! # Session Middleware
//!
//! This module contains the event loop that owns one verification session and
//! coordinates every asynchronous activity around the state machine.
//!
//! ## Responsibilities
//!
//! The [`SessionMiddleware`] struct manages:
//! - **Channel lifecycle**: Opens the verifier channel, tracks which channel
//!   generation is current, and ignores events from replaced channels
//! - **Reconnection**: Delegates retry timing to the
//!   [`ReconnectSupervisor`](super::supervisor::ReconnectSupervisor)
//! - **Frame sampling**: Drives the [`FrameSampler`](super::sampler::FrameSampler)
//!   on a fixed interval
//! - **Caller commands**: Restart, capture retry and shutdown
//! - **Publishing**: Pushes a fresh snapshot to subscribers after every change
//!
//! ## Concurrency
//!
//! Everything runs on one task. Inbound channel events, sampler ticks, the
//! reconnect deadline and caller commands are multiplexed with
//! `tokio::select!`, so the state is never touched concurrently and inbound
//! updates are applied strictly in arrival order. No branch awaits I/O.
//!
//! ## Teardown
//!
//! 1. Stop the sampler interval
//! 2. Release the capture source
//! 3. Flag the close as intentional and close the channel
//!
//! ## Usage
//!
//! ```rust,ignore
//! let (mut handle, task) = spawn_session(
//!     SessionConfig::default(),
//!     Box::new(WebSocketConnector::default()),
//!     Box::new(SyntheticSource::new(640, 480)),
//! );
//!
//! while let Some(state) = handle.changed().await {
//!     println!("{:.0}%", state.progress_percent());
//!     if state.is_complete {
//!         break;
//!     }
//! }
//!
//! handle.shutdown();
//! let metrics = task.await?;
//! ```

use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use super::metrics::SessionMetrics;
use super::sampler::{FrameSampler, TickContext};
use super::state::{SessionState, SessionStateMachine, UpdateOutcome};
use super::supervisor::ReconnectSupervisor;
use crate::capture::CaptureSource;
use crate::common::config::SessionConfig;
use crate::common::connection::{ChannelEvent, ChannelHandle, Connector, SendStatus, TransportEvent};
use crate::common::messages::{ClientMessage, ServerUpdate};

/// Requests from presentation to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Reset progress and ask the verifier to start over
    Restart,
    /// Try to acquire the capture source again after a failure
    RetryCapture,
    /// Tear the session down
    Shutdown,
}

/// Event loop owning one verification session.
pub struct SessionMiddleware {
    config: SessionConfig,
    connector: Box<dyn Connector>,
    sampler: FrameSampler,
    machine: SessionStateMachine,
    supervisor: ReconnectSupervisor,
    metrics: SessionMetrics,
    /// Handle to the current channel, open or still connecting
    channel: Option<ChannelHandle>,
    channel_open: bool,
    /// Generation of the current channel; events from older ones are stale
    generation: u64,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    events_rx: mpsc::UnboundedReceiver<ChannelEvent>,
    /// A restart the verifier has not been told about yet
    restart_pending: bool,
    sampling: bool,
    state_tx: watch::Sender<SessionState>,
}

impl SessionMiddleware {
    pub fn new(
        config: SessionConfig,
        connector: Box<dyn Connector>,
        source: Box<dyn CaptureSource>,
    ) -> Self {
        let session_id = Uuid::new_v4();
        let machine = SessionStateMachine::new(session_id);
        let (state_tx, _) = watch::channel(machine.snapshot());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            sampler: FrameSampler::new(source, config.sampler.clone()),
            supervisor: ReconnectSupervisor::new(config.reconnect.delay()),
            metrics: SessionMetrics::new(session_id.to_string()),
            config,
            connector,
            machine,
            channel: None,
            channel_open: false,
            generation: 0,
            events_tx,
            events_rx,
            restart_pending: false,
            sampling: false,
            state_tx,
        }
    }

    /// Subscribe to state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> &SessionState {
        self.machine.state()
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_channel_open(&self) -> bool {
        self.channel_open
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling
    }

    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.supervisor.deadline()
    }

    /// Idle -> Connecting: acquire the camera and open the first channel.
    pub fn start(&mut self) {
        info!(
            "🔵 Session {} starting against {}",
            self.machine.state().session_id,
            self.config.session.endpoint
        );
        self.machine.begin();
        self.sampling = true;
        self.acquire_capture();
        self.open_channel();
        self.publish();
    }

    fn acquire_capture(&mut self) {
        match self.sampler.acquire() {
            Ok(()) => self.machine.camera_acquired(),
            Err(e) => self.machine.camera_failed(&e),
        }
    }

    fn open_channel(&mut self) {
        self.generation += 1;
        self.channel_open = false;
        debug!("Opening channel #{}", self.generation);
        let handle = self.connector.open(
            &self.config.session.endpoint,
            self.generation,
            self.config.sampler.max_pending_frames,
            self.events_tx.clone(),
        );
        self.channel = Some(handle);
    }

    /// Apply one event from a channel task.
    pub fn handle_channel_event(&mut self, event: ChannelEvent) {
        if event.generation != self.generation {
            debug!(
                "Ignoring event from stale channel #{} (current #{})",
                event.generation, self.generation
            );
            return;
        }

        match event.event {
            TransportEvent::Opened => {
                info!("✅ Connected to verifier (channel #{})", self.generation);
                self.channel_open = true;
                self.machine.connection_opened();
                self.metrics.record_connected();
                if self.restart_pending {
                    info!("Sending restart deferred while disconnected");
                    self.send_restart();
                }
            }
            TransportEvent::Message(text) => self.handle_message(&text),
            TransportEvent::Closed { error } => {
                self.channel_open = false;
                self.channel = None;
                match &error {
                    Some(e) => warn!("❌ Verifier channel #{} failed: {}", self.generation, e),
                    None => info!("Verifier channel #{} closed", self.generation),
                }
                self.machine.connection_lost(error.is_some());
                self.metrics.record_disconnect(error.is_some());
                self.supervisor.on_closed(Instant::now());
            }
        }
    }

    fn handle_message(&mut self, text: &str) {
        let update = match ServerUpdate::from_text(text) {
            Ok(update) => update,
            Err(e) => {
                warn!("Dropping malformed verifier message: {}", e);
                self.metrics.record_message(false);
                return;
            }
        };

        self.metrics.record_message(true);
        if self.machine.apply_update(&update) == UpdateOutcome::CompletionEdge {
            self.metrics
                .record_completion(self.machine.state().completion_time);
        }
    }

    /// Run one sampler tick against the current channel and state.
    pub fn sample_tick(&mut self) {
        if !self.sampling {
            return;
        }

        if self.restart_pending && self.channel_open {
            self.send_restart();
        }

        let channel = if self.channel_open {
            self.channel.as_ref()
        } else {
            None
        };
        let outcome = self.sampler.tick(TickContext {
            channel,
            is_complete: self.machine.is_complete(),
        });
        self.metrics.record_tick(outcome);

        if self.sampler.is_ready() && self.machine.camera_frame_seen() {
            info!("📷 Camera ready, first frame captured");
        }
    }

    /// Open a new channel if the reconnect deadline has passed.
    pub fn poll_reconnect(&mut self, now: Instant) {
        if self.supervisor.take_due(now) {
            self.metrics.record_reconnect_attempt();
            info!(
                "🔄 Reconnect attempt {} to {}",
                self.supervisor.attempts(),
                self.config.session.endpoint
            );
            self.open_channel();
        }
    }

    /// Reset progress locally and tell the verifier, now or once reconnected.
    pub fn restart(&mut self) {
        info!("🔄 Restarting verification");
        self.machine.restart();
        self.metrics.record_restart();

        if self.channel_open {
            self.send_restart();
        } else {
            // Local reset applies now; the verifier hears about it on the next open.
            self.restart_pending = true;
            info!("Not connected; restart will be sent once the channel reopens");
        }
    }

    fn send_restart(&mut self) {
        let Some(channel) = self.channel.as_ref() else {
            self.restart_pending = true;
            return;
        };
        let text = match ClientMessage::Restart.to_text() {
            Ok(text) => text,
            Err(e) => {
                warn!("Restart serialization failed: {}", e);
                return;
            }
        };
        self.restart_pending = match channel.try_send(text) {
            SendStatus::Queued => false,
            SendStatus::Full | SendStatus::Closed => {
                warn!("Restart not queued; will retry");
                true
            }
        };
    }

    /// Retry capture acquisition after a failure. No-op when already acquired.
    pub fn retry_capture(&mut self) {
        if self.sampler.is_acquired() {
            return;
        }
        info!("Retrying capture source");
        self.acquire_capture();
    }

    /// Stop sampling, release the camera, then close the channel without retry.
    pub fn teardown(&mut self) {
        self.sampling = false;
        self.sampler.release();
        self.machine.camera_released();

        self.supervisor.mark_intentional();
        if let Some(channel) = self.channel.take() {
            info!("Closing verifier channel #{}", self.generation);
            channel.close();
        }
        self.channel_open = false;
        self.machine.connection_lost(false);
        info!("🛑 Session {} stopped", self.machine.state().session_id);
    }

    /// Push the current state to subscribers if it changed.
    pub fn publish(&self) {
        let snapshot = self.machine.snapshot();
        self.state_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Run the session until a `Shutdown` command arrives or every command
    /// sender is dropped. Returns the session metrics.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) -> SessionMetrics {
        self.start();

        let mut ticker = tokio::time::interval(self.config.sampler.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let reconnect_at = self.supervisor.deadline();
            tokio::select! {
                Some(event) = self.events_rx.recv() => self.handle_channel_event(event),
                _ = ticker.tick(), if self.sampler.is_acquired() => self.sample_tick(),
                _ = sleep_until_deadline(reconnect_at) => self.poll_reconnect(Instant::now()),
                command = commands.recv() => match command {
                    Some(SessionCommand::Restart) => self.restart(),
                    Some(SessionCommand::RetryCapture) => self.retry_capture(),
                    Some(SessionCommand::Shutdown) | None => break,
                },
            }
            self.publish();
        }

        drop(ticker);
        self.teardown();
        self.publish();
        self.metrics
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// Presentation-side handle to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// The latest state snapshot.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Wait for the next state change. Returns `None` once the session has ended.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.state.changed().await.ok()?;
        Some(self.state.borrow_and_update().clone())
    }

    /// Returns false if the session has already ended.
    pub fn restart(&self) -> bool {
        self.commands.send(SessionCommand::Restart).is_ok()
    }

    pub fn retry_capture(&self) -> bool {
        self.commands.send(SessionCommand::RetryCapture).is_ok()
    }

    pub fn shutdown(&self) -> bool {
        self.commands.send(SessionCommand::Shutdown).is_ok()
    }
}

/// Start a session on the current tokio runtime.
pub fn spawn_session(
    config: SessionConfig,
    connector: Box<dyn Connector>,
    source: Box<dyn CaptureSource>,
) -> (SessionHandle, JoinHandle<SessionMetrics>) {
    let middleware = SessionMiddleware::new(config, connector, source);
    let state = middleware.subscribe();
    let (commands, commands_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(middleware.run(commands_rx));
    (SessionHandle { commands, state }, task)
}
