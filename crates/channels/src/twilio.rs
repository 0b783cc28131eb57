//! Twilio WhatsApp webhook form and TwiML replies.

use serde::Deserialize;

use aquabot_core::text::normalize_phone;

use crate::error::ChannelError;

const CHANNEL: &str = "twilio";
pub const TWIML_CONTENT_TYPE: &str = "application/xml";

/// Fields of the form-urlencoded webhook the bot reads.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TwilioWebhookForm {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub message_sid: Option<String>,
    #[serde(default)]
    pub profile_name: Option<String>,
}

impl TwilioWebhookForm {
    /// Digits of the caller number: `whatsapp:+573001112233` becomes `573001112233`.
    pub fn caller_phone(&self) -> Result<String, ChannelError> {
        let address = self.from.trim();
        let number = address.strip_prefix("whatsapp:").unwrap_or(address);
        let phone = normalize_phone(number);
        if phone.is_empty() {
            return Err(ChannelError::malformed(CHANNEL, "missing From"));
        }
        Ok(phone)
    }

    pub fn text(&self) -> Option<&str> {
        let body = self.body.trim();
        (!body.is_empty()).then_some(body)
    }
}

/// `whatsapp:+{digits}` address for outbound sends.
pub fn whatsapp_address(phone: &str) -> String {
    let trimmed = phone.trim();
    if trimmed.starts_with("whatsapp:") {
        return trimmed.to_string();
    }
    format!("whatsapp:+{}", normalize_phone(trimmed))
}

/// TwiML document that makes Twilio deliver `body` as the reply.
pub fn render_twiml(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        escape_xml(body)
    )
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
