use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::GatewayConfig;
use crate::error::GatewayError;
use crate::presence::PresenceBroadcaster;
use crate::registry::{ChannelId, ConnectionRegistry, Outbound, OutboundSender};

/// Heartbeat state of one channel.
///
/// ```text
/// ALIVE --tick/ping--> PROBING --pong--> ALIVE
///                      PROBING --deadline--> DEAD
/// any   --close------> DEAD
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessState {
    Alive,
    Probing,
    Dead,
}

/// Per-channel heartbeat. Pings every `heartbeat_interval`; a ping left
/// unanswered for `heartbeat_timeout` kills the channel.
///
/// Reaching `Dead` is the teardown guard: whichever path wins that
/// transition (deadline or close) performs the close, the eviction and the
/// presence refresh, and every later attempt is a no-op.
pub struct LivenessMonitor {
    channel: ChannelId,
    state: watch::Sender<LivenessState>,
    cancel: CancellationToken,
    tx: OutboundSender,
    registry: ConnectionRegistry,
    presence: PresenceBroadcaster,
}

impl LivenessMonitor {
    /// Create the monitor in `Alive` and spawn its heartbeat task.
    pub fn start(
        channel: ChannelId,
        tx: OutboundSender,
        registry: ConnectionRegistry,
        presence: PresenceBroadcaster,
        config: &GatewayConfig,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(LivenessState::Alive);
        let monitor = Arc::new(Self {
            channel,
            state,
            cancel: CancellationToken::new(),
            tx,
            registry,
            presence,
        });

        let heartbeat = monitor.clone();
        let period = config.heartbeat_interval;
        let deadline = config.heartbeat_timeout;
        tokio::spawn(async move {
            if let Err(e) = heartbeat.run(period, deadline).await {
                warn!("Channel {} terminated: {}", heartbeat.channel, e);
            }
        });

        monitor
    }

    pub fn state(&self) -> LivenessState {
        *self.state.borrow()
    }

    /// Record a pong. Only meaningful while probing; returns whether it was.
    pub fn on_pong(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == LivenessState::Probing {
                *state = LivenessState::Alive;
                true
            } else {
                false
            }
        })
    }

    /// The channel closed for a reason other than the deadline (client close,
    /// write failure). Returns `false` if it was already torn down.
    pub async fn on_closed(&self) -> bool {
        let killed = self.state.send_if_modified(|state| {
            if *state == LivenessState::Dead {
                false
            } else {
                *state = LivenessState::Dead;
                true
            }
        });
        if killed {
            self.teardown().await;
        }
        killed
    }

    fn begin_probe(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == LivenessState::Alive {
                *state = LivenessState::Probing;
                true
            } else {
                false
            }
        })
    }

    fn expire(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == LivenessState::Probing {
                *state = LivenessState::Dead;
                true
            } else {
                false
            }
        })
    }

    async fn run(&self, period: Duration, deadline: Duration) -> Result<(), GatewayError> {
        let mut state_rx = self.state.subscribe();
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = heartbeat.tick() => {}
            }

            if !self.begin_probe() {
                break;
            }

            trace!("Ping {}", self.channel);
            if self.tx.send(Outbound::Ping).is_err() {
                // writer already gone
                self.on_closed().await;
                break;
            }

            let answered = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = tokio::time::timeout(
                    deadline,
                    state_rx.wait_for(|state| *state != LivenessState::Probing),
                ) => result.is_ok(),
            };

            // A pong racing the deadline wins if it flipped the state first.
            if !answered && self.expire() {
                self.teardown().await;
                return Err(GatewayError::LivenessTimeout);
            }
        }

        debug!("Heartbeat loop ended for channel {}", self.channel);
        Ok(())
    }

    async fn teardown(&self) {
        self.cancel.cancel();
        let _ = self.tx.send(Outbound::Close);

        if self.registry.evict(self.channel).await {
            info!("Channel {} evicted", self.channel);
            self.presence.announce().await;
        }
    }
}
