use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::line::LineKey;
use super::product::ProductSummary;

pub const MAX_PENDING_CANDIDATES: usize = 5;
pub const MAX_SEARCH_POOL: usize = 15;
pub const DEFAULT_SEARCH_BATCH: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingMode {
    Products,
}

/// Transport a conversation arrived on; replies and follow-ups go back the same way.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[default]
    Meta,
    Twilio,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Twilio => "twilio",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "meta" | "whatsapp" => Ok(Self::Meta),
            "twilio" => Ok(Self::Twilio),
            other => Err(format!("unsupported channel `{other}` (expected meta|twilio)")),
        }
    }
}

/// Short-term memory of one conversation, keyed by the caller's digits-only phone number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub line_hint: Option<LineKey>,
    pub pending_candidates: Vec<ProductSummary>,
    pub pending_mode: Option<PendingMode>,
    pub search_pool: Vec<ProductSummary>,
    pub search_offset: usize,
    pub search_batch_size: usize,
    pub search_query: String,
    pub consult_questions_asked: Vec<String>,
    pub customer_name: Option<String>,
    pub greeted_at: Option<DateTime<Utc>>,
    pub last_user_activity_at: Option<DateTime<Utc>>,
    pub followup_count: u32,
    pub followup_sent_at: Option<DateTime<Utc>>,
    pub final_sent_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub channel: Channel,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            line_hint: None,
            pending_candidates: Vec::new(),
            pending_mode: None,
            search_pool: Vec::new(),
            search_offset: 0,
            search_batch_size: DEFAULT_SEARCH_BATCH,
            search_query: String::new(),
            consult_questions_asked: Vec::new(),
            customer_name: None,
            greeted_at: None,
            last_user_activity_at: None,
            followup_count: 0,
            followup_sent_at: None,
            final_sent_at: None,
            closed_at: None,
            channel: Channel::default(),
            updated_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.updated_at > ttl
    }

    pub fn has_more_results(&self) -> bool {
        self.search_offset < self.search_pool.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleActionKind {
    Followup,
    Final,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdleAction {
    pub phone: String,
    pub channel: Channel,
    pub kind: IdleActionKind,
}

/// Thresholds for nudging and closing idle conversations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdlePolicy {
    pub followup_after: Duration,
    pub final_after: Duration,
    pub max_followups: u32,
}

impl IdlePolicy {
    pub const MIN_FOLLOWUP_AFTER_SECS: i64 = 60;
    pub const FINAL_GAP_SECS: i64 = 60;

    /// Applies the floors: follow-up no sooner than a minute, final at least a minute after it.
    pub fn new(followup_after: Duration, final_after: Duration, max_followups: u32) -> Self {
        let followup_after = followup_after.max(Duration::seconds(Self::MIN_FOLLOWUP_AFTER_SECS));
        let final_after = final_after.max(followup_after + Duration::seconds(Self::FINAL_GAP_SECS));
        Self { followup_after, final_after, max_followups }
    }

    pub fn evaluate(&self, state: &SessionState, now: DateTime<Utc>) -> Option<IdleActionKind> {
        let last_activity = state.last_user_activity_at?;
        if state.closed_at.is_some() {
            return None;
        }

        let elapsed = now - last_activity;
        if elapsed >= self.final_after && state.final_sent_at.is_none() {
            return Some(IdleActionKind::Final);
        }

        let spaced = match state.followup_sent_at {
            None => true,
            Some(sent_at) => now - sent_at >= self.followup_after,
        };
        if elapsed >= self.followup_after && state.followup_count < self.max_followups && spaced {
            return Some(IdleActionKind::Followup);
        }

        None
    }
}
