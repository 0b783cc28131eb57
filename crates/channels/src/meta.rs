//! WhatsApp Cloud (Meta) webhook payloads.
//!
//! Meta posts a nested `entry[].changes[].value` envelope. Only the first message of the first
//! change is read; status callbacks (deliveries, reads) carry no message and are ignored.

use serde::Deserialize;
use serde_json::Value;

use aquabot_core::text::normalize_phone;

use crate::error::ChannelError;

const CHANNEL: &str = "whatsapp";

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    entry: Vec<Entry>,
    #[serde(default)]
    phone: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Default, Deserialize)]
struct Change {
    #[serde(default)]
    value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    contacts: Vec<ContactRef>,
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct ContactRef {
    wa_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: Option<String>,
    from: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<TextBody>,
}

#[derive(Debug, Deserialize)]
struct TextBody {
    body: Option<String>,
}

/// A caller message extracted from a webhook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub phone: String,
    /// `None` for non-text messages (images, audio, stickers).
    pub text: Option<String>,
    pub message_id: Option<String>,
}

/// Caller message in a Meta webhook, or `None` for status-only callbacks.
pub fn parse_meta_webhook(payload: &Value) -> Result<Option<InboundMessage>, ChannelError> {
    let envelope = Envelope::deserialize(payload)
        .map_err(|error| ChannelError::malformed(CHANNEL, error.to_string()))?;

    let value = envelope
        .entry
        .first()
        .and_then(|entry| entry.changes.first())
        .map(|change| &change.value);
    let message = value.and_then(|value| value.messages.first());

    let phone = value
        .and_then(|value| value.contacts.first())
        .and_then(|contact| contact.wa_id.clone())
        .or_else(|| message.and_then(|message| message.from.clone()))
        .or_else(|| envelope.phone.as_ref().map(scalar_text))
        .map(|raw| normalize_phone(&raw))
        .filter(|phone| !phone.is_empty());

    let Some(phone) = phone else {
        if value.is_some_and(|value| value.messages.is_empty()) {
            return Ok(None);
        }
        return Err(ChannelError::malformed(CHANNEL, "phone not found in webhook payload"));
    };

    let text = message
        .filter(|message| message.kind.as_deref().map_or(true, |kind| kind == "text"))
        .and_then(|message| message.text.as_ref())
        .and_then(|text| text.body.clone());

    Ok(Some(InboundMessage {
        phone,
        text,
        message_id: message.and_then(|message| message.id.clone()),
    }))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Subscription handshake: echoes `hub.challenge` when mode and token match.
pub fn verify_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    expected_token: Option<&str>,
) -> Result<String, ChannelError> {
    let Some(expected) = expected_token.filter(|token| !token.is_empty()) else {
        return Err(ChannelError::VerificationRejected("verify token not configured".to_string()));
    };
    if mode != Some("subscribe") {
        return Err(ChannelError::VerificationRejected("hub.mode must be subscribe".to_string()));
    }
    if token != Some(expected) {
        return Err(ChannelError::VerificationRejected("verify token mismatch".to_string()));
    }
    challenge
        .map(str::to_string)
        .ok_or_else(|| ChannelError::VerificationRejected("missing hub.challenge".to_string()))
}
