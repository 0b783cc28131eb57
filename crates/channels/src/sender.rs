//! Outbound text delivery over WhatsApp Cloud and Twilio.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, warn};

use aquabot_core::config::{AppConfig, TwilioConfig, WhatsAppConfig};
use aquabot_core::domain::session::Channel;
use aquabot_core::ports::{CollaboratorResult, OutboundSender};
use aquabot_core::text::normalize_phone;

use crate::error::ChannelError;
use crate::twilio::whatsapp_address;

const META: &str = "whatsapp";
const TWILIO: &str = "twilio";

fn http_client(channel: &'static str, timeout_secs: u64) -> Result<Client, ChannelError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|error| ChannelError::Client { channel, message: error.to_string() })
}

async fn deliver(channel: &'static str, request: RequestBuilder) -> Result<(), ChannelError> {
    let response =
        request.send().await.map_err(|error| ChannelError::send_failed(channel, error))?;
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChannelError::Rejected { channel, status: status.as_u16(), body })
}

fn secret(value: &Option<SecretString>) -> Option<SecretString> {
    value.clone().filter(|secret| !secret.expose_secret().trim().is_empty())
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}

/// WhatsApp Cloud API `/{phone_number_id}/messages` sender.
pub struct WhatsAppCloudSender {
    client: Client,
    endpoint: String,
    token: SecretString,
}

impl WhatsAppCloudSender {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, ChannelError> {
        let (Some(phone_number_id), Some(token)) =
            (present(&config.phone_number_id), secret(&config.token))
        else {
            return Err(ChannelError::NotConfigured(META));
        };
        Ok(Self {
            client: http_client(META, config.timeout_secs)?,
            endpoint: format!("{}/{phone_number_id}/messages", config.base_url.trim_end_matches('/')),
            token,
        })
    }

    fn request(&self, phone: &str, text: &str) -> RequestBuilder {
        self.client.post(&self.endpoint).bearer_auth(self.token.expose_secret()).json(&json!({
            "messaging_product": "whatsapp",
            "to": normalize_phone(phone),
            "type": "text",
            "text": {"preview_url": false, "body": text},
        }))
    }

    pub async fn send_text(&self, phone: &str, text: &str) -> Result<(), ChannelError> {
        deliver(META, self.request(phone, text)).await
    }
}

/// Twilio Messages API sender for WhatsApp numbers.
pub struct TwilioSender {
    client: Client,
    endpoint: String,
    account_sid: String,
    auth_token: SecretString,
    from: String,
}

impl TwilioSender {
    pub fn new(config: &TwilioConfig) -> Result<Self, ChannelError> {
        let (Some(account_sid), Some(auth_token), Some(from)) = (
            present(&config.account_sid),
            secret(&config.auth_token),
            present(&config.whatsapp_from),
        ) else {
            return Err(ChannelError::NotConfigured(TWILIO));
        };
        Ok(Self {
            client: http_client(TWILIO, config.timeout_secs)?,
            endpoint: format!(
                "{}/2010-04-01/Accounts/{account_sid}/Messages.json",
                config.base_url.trim_end_matches('/')
            ),
            account_sid,
            auth_token,
            from: whatsapp_address(&from),
        })
    }

    fn request(&self, phone: &str, text: &str) -> RequestBuilder {
        let to = whatsapp_address(phone);
        self.client
            .post(&self.endpoint)
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&[("From", self.from.as_str()), ("To", to.as_str()), ("Body", text)])
    }

    pub async fn send_text(&self, phone: &str, text: &str) -> Result<(), ChannelError> {
        deliver(TWILIO, self.request(phone, text)).await
    }
}

/// Routes each message to the transport the caller wrote from.
#[derive(Default)]
pub struct ChannelSender {
    meta: Option<WhatsAppCloudSender>,
    twilio: Option<TwilioSender>,
}

impl ChannelSender {
    /// Builds whichever senders are configured; an unconfigured transport is skipped.
    pub fn from_config(config: &AppConfig) -> Result<Self, ChannelError> {
        Ok(Self {
            meta: optional(WhatsAppCloudSender::new(&config.whatsapp))?,
            twilio: optional(TwilioSender::new(&config.twilio))?,
        })
    }

    pub fn with_meta(mut self, sender: WhatsAppCloudSender) -> Self {
        self.meta = Some(sender);
        self
    }

    pub fn with_twilio(mut self, sender: TwilioSender) -> Self {
        self.twilio = Some(sender);
        self
    }

    pub fn has_meta(&self) -> bool {
        self.meta.is_some()
    }

    pub fn has_twilio(&self) -> bool {
        self.twilio.is_some()
    }

    pub async fn send_text(
        &self,
        channel: Channel,
        phone: &str,
        text: &str,
    ) -> Result<(), ChannelError> {
        let result = match channel {
            Channel::Meta => match self.meta.as_ref() {
                Some(sender) => sender.send_text(phone, text).await,
                None => Err(ChannelError::NotConfigured(META)),
            },
            Channel::Twilio => match self.twilio.as_ref() {
                Some(sender) => sender.send_text(phone, text).await,
                None => Err(ChannelError::NotConfigured(TWILIO)),
            },
        };
        match &result {
            Ok(()) => debug!(event_name = "channel.sent", channel = %channel, phone = %phone, "message sent"),
            Err(error) => warn!(
                event_name = "channel.send_failed",
                channel = %channel,
                phone = %phone,
                error = %error,
                "message send failed"
            ),
        }
        result
    }
}

fn optional<T>(result: Result<T, ChannelError>) -> Result<Option<T>, ChannelError> {
    match result {
        Ok(sender) => Ok(Some(sender)),
        Err(ChannelError::NotConfigured(_)) => Ok(None),
        Err(error) => Err(error),
    }
}

#[async_trait]
impl OutboundSender for ChannelSender {
    async fn send(&self, channel: Channel, phone: &str, text: &str) -> CollaboratorResult<()> {
        self.send_text(channel, phone, text).await.map_err(Into::into)
    }
}
