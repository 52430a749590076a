//! Polling & resilience loop.
//!
//! One cycle (fetch → resolve → build → push) runs to completion before the
//! next begins. The loop is a four-state machine:
//!
//! - `Disconnected`: retry `connect` every few seconds, forever.
//! - `ConnectedIdle` / `ConnectedLive`: poll, push, sleep the idle or live
//!   interval. Transient failures (and panics) wait a short retry delay and
//!   repeat the cycle; a closed channel drops back to `Disconnected`.
//! - `ShuttingDown`: clear the channel best-effort and return.
//!
//! Cancellation is only observed while sleeping.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::errors::ApiError;
use crate::api::source::DataSource;
use crate::presence::builder::PresenceBuilder;
use crate::presence::channel::{ChannelError, PresenceChannel};

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub live_interval: Duration,
    pub idle_interval: Duration,
    /// Wait after a failed cycle.
    pub retry_delay: Duration,
    /// Wait between connection attempts.
    pub connect_retry: Duration,
    /// Only show live games; clear the channel otherwise.
    pub live_only: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            live_interval: Duration::from_secs(15),
            idle_interval: Duration::from_secs(90),
            retry_delay: Duration::from_secs(5),
            connect_retry: Duration::from_secs(5),
            live_only: false,
        }
    }
}

// =============================================================================
// State machine
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Disconnected,
    ConnectedIdle,
    ConnectedLive,
    ShuttingDown,
}

/// What one successful cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Pushed { live: bool },
    Cleared,
}

#[derive(Error, Debug)]
pub enum CycleError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Drives the presence channel from the data source.
pub struct Poller<D, C> {
    source: D,
    channel: C,
    builder: PresenceBuilder,
    config: PollerConfig,
    state: LoopState,
}

impl<D: DataSource, C: PresenceChannel> Poller<D, C> {
    pub fn new(source: D, channel: C, builder: PresenceBuilder, config: PollerConfig) -> Self {
        Self {
            source,
            channel,
            builder,
            config,
            state: LoopState::Disconnected,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Run until `cancel` fires, then clear the channel and return.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            team = %self.builder.team().abbreviation,
            live_interval_s = self.config.live_interval.as_secs(),
            idle_interval_s = self.config.idle_interval.as_secs(),
            live_only = self.config.live_only,
            "Presence loop starting"
        );

        loop {
            let next = match self.state {
                LoopState::Disconnected => self.connect(&cancel).await,
                LoopState::ConnectedIdle | LoopState::ConnectedLive => self.cycle(&cancel).await,
                LoopState::ShuttingDown => break,
            };
            if next != self.state {
                debug!(from = ?self.state, to = ?next, "Loop state change");
            }
            self.state = next;
        }

        self.shutdown().await;
    }

    async fn connect(&mut self, cancel: &CancellationToken) -> LoopState {
        loop {
            if cancel.is_cancelled() {
                return LoopState::ShuttingDown;
            }
            match self.channel.connect().await {
                Ok(()) => {
                    info!("Presence channel connected");
                    return LoopState::ConnectedIdle;
                }
                Err(e) => {
                    info!(
                        error = %e,
                        retry_s = self.config.connect_retry.as_secs(),
                        "Waiting for presence channel"
                    );
                    if !sleep_or_cancel(self.config.connect_retry, cancel).await {
                        return LoopState::ShuttingDown;
                    }
                }
            }
        }
    }

    async fn cycle(&mut self, cancel: &CancellationToken) -> LoopState {
        let outcome = AssertUnwindSafe(self.poll_once(Utc::now()))
            .catch_unwind()
            .await;

        let (next, delay) = match outcome {
            Ok(Ok(CycleOutcome::Pushed { live: true })) => {
                (LoopState::ConnectedLive, self.config.live_interval)
            }
            Ok(Ok(_)) => (LoopState::ConnectedIdle, self.config.idle_interval),
            Ok(Err(CycleError::Channel(e))) if e.is_closed() => {
                warn!(error = %e, "Lost presence channel connection, reconnecting");
                return LoopState::Disconnected;
            }
            Ok(Err(e)) => {
                warn!(
                    error = %e,
                    retry_s = self.config.retry_delay.as_secs(),
                    "Poll cycle failed"
                );
                (self.state, self.config.retry_delay)
            }
            Err(panic) => {
                error!(
                    panic = %panic_message(panic.as_ref()),
                    retry_s = self.config.retry_delay.as_secs(),
                    "Poll cycle panicked"
                );
                (self.state, self.config.retry_delay)
            }
        };

        debug!(next = ?next, sleep_s = delay.as_secs(), "Cycle complete");
        if sleep_or_cancel(delay, cancel).await {
            next
        } else {
            LoopState::ShuttingDown
        }
    }

    /// One fetch → build → push pass for the snapshot fetched now.
    pub async fn poll_once(&mut self, now: DateTime<Utc>) -> Result<CycleOutcome, CycleError> {
        let team_id = self.builder.team().id;
        let game = self.source.fetch_live_game(team_id).await?;

        let payload = match game {
            Some(game) => {
                if self.config.live_only && !game.is_live() {
                    debug!(state = %game.abstract_state(), "Game not live, clearing presence");
                    self.channel.clear().await?;
                    return Ok(CycleOutcome::Cleared);
                }
                let live = game.is_live();
                let payload = self.builder.build(&self.source, &game, now).await;
                self.channel.push(&payload).await?;
                debug!(details = %payload.details, state = %payload.state, live, "Presence updated");
                return Ok(CycleOutcome::Pushed { live });
            }
            None if self.config.live_only => {
                debug!("No game today, clearing presence");
                self.channel.clear().await?;
                return Ok(CycleOutcome::Cleared);
            }
            None => self.builder.build_preview(&self.source, now).await,
        };

        self.channel.push(&payload).await?;
        debug!(details = %payload.details, state = %payload.state, "Preview presence updated");
        Ok(CycleOutcome::Pushed { live: false })
    }

    async fn shutdown(&mut self) {
        info!("Shutting down, clearing presence");
        if let Err(e) = self.channel.clear().await {
            debug!(error = %e, "Clear on shutdown failed");
        }
        info!("Stopped cleanly");
    }
}

/// Sleep unless cancelled first. Returns `false` on cancellation.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
