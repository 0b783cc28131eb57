use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use aquabot_core::clock::Clock;
use aquabot_core::domain::line::LineKey;
use aquabot_core::domain::product::ProductSummary;
use aquabot_core::domain::session::{
    Channel, IdleAction, IdlePolicy, PendingMode, SessionState, MAX_PENDING_CANDIDATES,
    MAX_SEARCH_POOL,
};

const SWEEP_INTERVAL_SECS: i64 = 60;

struct Slot {
    state: SessionState,
    /// Set once the sweep has dropped the slot from the map.
    detached: bool,
}

type SharedSlot = Arc<Mutex<Slot>>;

/// In-memory conversation memory keyed by caller phone.
///
/// Each caller owns its own lock; the map itself is only touched long enough to find or
/// insert a slot, so different callers never wait on each other. Expired sessions are
/// dropped on access and by a sweep that runs at most once a minute. Missing or expired
/// sessions read as empty defaults; no operation fails.
pub struct SessionStore {
    sessions: DashMap<String, SharedSlot>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    greeting_window: Duration,
    last_sweep_at: AtomicI64,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration, greeting_window: Duration) -> Self {
        let last_sweep_at = AtomicI64::new(clock.now().timestamp());
        Self { sessions: DashMap::new(), clock, ttl, greeting_window, last_sweep_at }
    }

    /// Locks the caller's session, creating it (or replacing an expired one) first.
    async fn lock_or_create(&self, phone: &str, now: DateTime<Utc>) -> OwnedMutexGuard<Slot> {
        loop {
            let slot = Arc::clone(&*self.sessions.entry(phone.to_string()).or_insert_with(|| {
                Arc::new(Mutex::new(Slot { state: SessionState::new(now), detached: false }))
            }));
            let mut guard = slot.lock_owned().await;
            if guard.detached {
                continue;
            }
            if guard.state.is_expired(now, self.ttl) {
                guard.state = SessionState::new(now);
            }
            return guard;
        }
    }

    /// Locks the caller's live session; expired sessions are removed and read as absent.
    async fn lock_existing(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Option<OwnedMutexGuard<Slot>> {
        let slot = self.sessions.get(phone).map(|slot| Arc::clone(&*slot))?;
        let mut guard = Arc::clone(&slot).lock_owned().await;
        if guard.detached {
            return None;
        }
        if guard.state.is_expired(now, self.ttl) {
            guard.detached = true;
            self.sessions.remove_if(phone, |_, current| Arc::ptr_eq(current, &slot));
            debug!(event_name = "session.expired", phone = %phone, "session expired on access");
            return None;
        }
        Some(guard)
    }

    async fn update<R>(&self, phone: &str, apply: impl FnOnce(&mut SessionState) -> R) -> R {
        let now = self.clock.now();
        self.sweep_if_due(now);
        let mut slot = self.lock_or_create(phone, now).await;
        let result = apply(&mut slot.state);
        slot.state.updated_at = now;
        result
    }

    /// Like `update`, but leaves absent sessions absent.
    async fn update_existing(&self, phone: &str, apply: impl FnOnce(&mut SessionState)) {
        let now = self.clock.now();
        self.sweep_if_due(now);
        if let Some(mut slot) = self.lock_existing(phone, now).await {
            apply(&mut slot.state);
            slot.state.updated_at = now;
        }
    }

    async fn read<R>(&self, phone: &str, view: impl FnOnce(Option<&SessionState>) -> R) -> R {
        let now = self.clock.now();
        let slot = self.lock_existing(phone, now).await;
        view(slot.as_ref().map(|slot| &slot.state))
    }

    fn sweep_if_due(&self, now: DateTime<Utc>) {
        let last = self.last_sweep_at.load(Ordering::Relaxed);
        if now.timestamp() - last < SWEEP_INTERVAL_SECS {
            return;
        }
        let claimed = self
            .last_sweep_at
            .compare_exchange(last, now.timestamp(), Ordering::AcqRel, Ordering::Relaxed)
            .is_ok();
        if claimed {
            self.purge_expired(now);
        }
    }

    /// Drops expired sessions shard by shard; sessions locked by a caller are in use and kept.
    fn purge_expired(&self, now: DateTime<Utc>) {
        let before = self.sessions.len();
        self.sessions.retain(|_, slot| match slot.try_lock() {
            Ok(mut guard) if guard.state.is_expired(now, self.ttl) => {
                guard.detached = true;
                false
            }
            _ => true,
        });
        let purged = before.saturating_sub(self.sessions.len());
        if purged > 0 {
            debug!(event_name = "session.expired", purged, "purged expired sessions");
        }
    }

    pub async fn set_line_hint(&self, phone: &str, hint: LineKey) {
        self.update(phone, |state| {
            if state.line_hint.is_some_and(|previous| previous != hint) {
                state.consult_questions_asked.clear();
            }
            state.line_hint = Some(hint);
        })
        .await;
    }

    pub async fn line_hint(&self, phone: &str) -> Option<LineKey> {
        self.read(phone, |state| state.and_then(|state| state.line_hint)).await
    }

    pub async fn set_last_candidates(&self, phone: &str, mut products: Vec<ProductSummary>) {
        products.truncate(MAX_PENDING_CANDIDATES);
        self.update(phone, |state| {
            state.pending_candidates = products;
            state.pending_mode = Some(PendingMode::Products);
        })
        .await;
    }

    pub async fn clear_last_candidates(&self, phone: &str) {
        self.update_existing(phone, |state| {
            state.pending_candidates.clear();
            state.pending_mode = None;
        })
        .await;
    }

    /// The `choice`-th (1-based) product of the last list shown, if a list is pending.
    pub async fn candidate_by_choice(&self, phone: &str, choice: usize) -> Option<ProductSummary> {
        self.read(phone, |state| {
            let state = state?;
            if state.pending_mode != Some(PendingMode::Products) {
                return None;
            }
            let index = choice.checked_sub(1)?;
            state.pending_candidates.get(index).cloned()
        })
        .await
    }

    /// Stores the ranked pool behind "show more"; each later page holds `batch_size` products.
    pub async fn set_search_pool(
        &self,
        phone: &str,
        query: &str,
        mut products: Vec<ProductSummary>,
        batch_size: usize,
    ) {
        products.truncate(MAX_SEARCH_POOL);
        self.update(phone, |state| {
            state.search_query = query.to_string();
            state.search_pool = products;
            state.search_offset = 0;
            state.search_batch_size = batch_size.max(1);
        })
        .await;
    }

    /// Next slice of the pool; empty once the pool is exhausted.
    pub async fn next_search_results(&self, phone: &str) -> Vec<ProductSummary> {
        let now = self.clock.now();
        self.sweep_if_due(now);
        let Some(mut slot) = self.lock_existing(phone, now).await else {
            return Vec::new();
        };
        let state = &mut slot.state;
        if state.search_offset >= state.search_pool.len() {
            return Vec::new();
        }

        let end = (state.search_offset + state.search_batch_size).min(state.search_pool.len());
        let batch = state.search_pool[state.search_offset..end].to_vec();
        state.search_offset = end;
        state.updated_at = now;
        batch
    }

    pub async fn clear_search_pool(&self, phone: &str) {
        self.update_existing(phone, |state| {
            state.search_pool.clear();
            state.search_offset = 0;
            state.search_query.clear();
        })
        .await;
    }

    pub async fn consult_questions(&self, phone: &str) -> Vec<String> {
        self.read(phone, |state| {
            state.map(|state| state.consult_questions_asked.clone()).unwrap_or_default()
        })
        .await
    }

    pub async fn add_consult_question(&self, phone: &str, key: &str) {
        if key.is_empty() {
            return;
        }
        self.update(phone, |state| {
            if !state.consult_questions_asked.iter().any(|asked| asked == key) {
                state.consult_questions_asked.push(key.to_string());
            }
        })
        .await;
    }

    pub async fn set_customer_name(&self, phone: &str, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        self.update(phone, |state| state.customer_name = Some(name.to_string())).await;
    }

    pub async fn customer_name(&self, phone: &str) -> Option<String> {
        self.read(phone, |state| state.and_then(|state| state.customer_name.clone())).await
    }

    pub async fn should_greet(&self, phone: &str) -> bool {
        let now = self.clock.now();
        let window = self.greeting_window;
        self.read(phone, |state| match state.and_then(|state| state.greeted_at) {
            None => true,
            Some(greeted_at) => now - greeted_at > window,
        })
        .await
    }

    pub async fn mark_greeted(&self, phone: &str) {
        let now = self.clock.now();
        self.update(phone, |state| state.greeted_at = Some(now)).await;
    }

    /// Records an inbound message and resets the idle follow-up cycle.
    pub async fn mark_user_activity(&self, phone: &str, channel: Channel) {
        let now = self.clock.now();
        self.update(phone, |state| {
            state.last_user_activity_at = Some(now);
            state.channel = channel;
            state.followup_count = 0;
            state.followup_sent_at = None;
            state.final_sent_at = None;
            state.closed_at = None;
        })
        .await;
    }

    pub async fn idle_actions(&self, policy: &IdlePolicy) -> Vec<IdleAction> {
        let now = self.clock.now();
        self.purge_expired(now);

        let slots: Vec<(String, SharedSlot)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        let mut actions = Vec::new();
        for (phone, slot) in slots {
            let guard = slot.lock().await;
            if guard.detached {
                continue;
            }
            if let Some(kind) = policy.evaluate(&guard.state, now) {
                actions.push(IdleAction { phone, channel: guard.state.channel, kind });
            }
        }
        actions.sort_by(|left, right| left.phone.cmp(&right.phone));
        actions
    }

    pub async fn mark_followup_sent(&self, phone: &str) {
        let now = self.clock.now();
        self.update_existing(phone, |state| {
            state.followup_count += 1;
            state.followup_sent_at = Some(now);
        })
        .await;
    }

    /// Marks the final message as sent; the session stays closed until the caller writes again.
    pub async fn close_session(&self, phone: &str) {
        let now = self.clock.now();
        self.update_existing(phone, |state| {
            state.final_sent_at = Some(now);
            state.closed_at = Some(now);
        })
        .await;
    }

    pub async fn snapshot(&self, phone: &str) -> Option<SessionState> {
        self.read(phone, |state| state.cloned()).await
    }

    pub async fn len(&self) -> usize {
        self.purge_expired(self.clock.now());
        self.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
