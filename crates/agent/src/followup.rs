//! Background sweep that nudges idle callers and closes abandoned conversations.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use aquabot_core::config::IdleConfig;
use aquabot_core::domain::session::{IdleAction, IdleActionKind, IdlePolicy};
use aquabot_core::ports::OutboundSender;
use aquabot_store::SessionStore;

/// Counters for one pass over the session store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IdleSweep {
    pub followups: usize,
    pub finals: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct IdleScheduler {
    store: Arc<SessionStore>,
    sender: Arc<dyn OutboundSender>,
    policy: IdlePolicy,
    check_interval: Duration,
    followup_message: String,
    final_message: String,
}

impl IdleScheduler {
    pub fn new(
        config: &IdleConfig,
        store: Arc<SessionStore>,
        sender: Arc<dyn OutboundSender>,
    ) -> Self {
        Self {
            store,
            sender,
            policy: config.policy(),
            check_interval: config.check_interval(),
            followup_message: config.followup_message.trim().to_string(),
            final_message: config.final_message.trim().to_string(),
        }
    }

    pub fn policy(&self) -> IdlePolicy {
        self.policy
    }

    fn message_for(&self, kind: IdleActionKind) -> &str {
        match kind {
            IdleActionKind::Followup => &self.followup_message,
            IdleActionKind::Final => &self.final_message,
        }
    }

    /// Sends every due follow-up and final message once.
    pub async fn run_once(&self) -> IdleSweep {
        let mut sweep = IdleSweep::default();
        for action in self.store.idle_actions(&self.policy).await {
            self.apply(&action, &mut sweep).await;
        }
        if sweep != IdleSweep::default() {
            debug!(
                event_name = "idle.sweep",
                followups = sweep.followups,
                finals = sweep.finals,
                skipped = sweep.skipped,
                failed = sweep.failed,
                "idle sweep finished"
            );
        }
        sweep
    }

    async fn apply(&self, action: &IdleAction, sweep: &mut IdleSweep) {
        let message = self.message_for(action.kind);
        if message.is_empty() {
            sweep.skipped += 1;
            return;
        }

        if let Err(error) = self.sender.send(action.channel, &action.phone, message).await {
            sweep.failed += 1;
            warn!(
                event_name = "idle.send_failed",
                phone = %action.phone,
                channel = %action.channel,
                kind = ?action.kind,
                error = %error,
                "idle message send failed"
            );
            return;
        }

        match action.kind {
            IdleActionKind::Followup => {
                self.store.mark_followup_sent(&action.phone).await;
                sweep.followups += 1;
            }
            IdleActionKind::Final => {
                self.store.close_session(&action.phone).await;
                sweep.finals += 1;
            }
        }
    }

    /// Sweeps on every tick until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            event_name = "idle.started",
            interval_secs = self.check_interval.as_secs(),
            followup_after_secs = self.policy.followup_after.num_seconds(),
            final_after_secs = self.policy.final_after.num_seconds(),
            max_followups = self.policy.max_followups,
            "idle follow-up loop started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(event_name = "idle.stopped", "idle follow-up loop stopped");
    }

    /// Starts the loop when idle follow-ups are enabled.
    pub fn spawn(
        config: &IdleConfig,
        store: Arc<SessionStore>,
        sender: Arc<dyn OutboundSender>,
        shutdown: watch::Receiver<bool>,
    ) -> Option<JoinHandle<()>> {
        if !config.enabled {
            info!(event_name = "idle.disabled", "idle follow-up disabled");
            return None;
        }
        let scheduler = Arc::new(Self::new(config, store, sender));
        Some(tokio::spawn(scheduler.run(shutdown)))
    }
}
