//! Inbound WhatsApp webhooks: Meta Cloud (JSON, reply sent out of band) and Twilio (form, reply
//! returned as TwiML).

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use aquabot_agent::MessageRouter;
use aquabot_channels::meta::{parse_meta_webhook, verify_subscription};
use aquabot_channels::twilio::{render_twiml, TwilioWebhookForm, TWIML_CONTENT_TYPE};
use aquabot_core::domain::session::Channel;
use aquabot_core::errors::ApplicationError;
use aquabot_core::ports::OutboundSender;

use crate::errors::{correlation_id, ApiError};

#[derive(Clone)]
pub struct WebhookState {
    pub router: Arc<MessageRouter>,
    pub sender: Arc<dyn OutboundSender>,
    pub verify_token: Option<SecretString>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook/whatsapp", get(verify_whatsapp).post(whatsapp_inbound))
        .route("/webhook/twilio", post(twilio_inbound))
        .with_state(state)
}

pub async fn verify_whatsapp(
    State(state): State<WebhookState>,
    Query(query): Query<VerifyQuery>,
) -> Result<String, ApiError> {
    let expected = state.verify_token.as_ref().map(|token| token.expose_secret());
    verify_subscription(
        query.mode.as_deref(),
        query.verify_token.as_deref(),
        query.challenge.as_deref(),
        expected,
    )
    .map_err(|error| {
        let error = ApplicationError::Verification(error.to_string());
        ApiError::from_application(error, &correlation_id())
    })
}

fn invalid_input(error: impl ToString, correlation_id: &str) -> ApiError {
    ApiError::from_application(ApplicationError::InvalidInput(error.to_string()), correlation_id)
}

pub async fn whatsapp_inbound(
    State(state): State<WebhookState>,
    Json(payload): Json<Value>,
) -> Result<Json<WebhookAck>, ApiError> {
    let correlation_id = correlation_id();
    let inbound =
        parse_meta_webhook(&payload).map_err(|error| invalid_input(error, &correlation_id))?;

    let Some(inbound) = inbound else {
        debug!(
            event_name = "webhook.meta.status_ignored",
            correlation_id = %correlation_id,
            "status callback"
        );
        return Ok(Json(WebhookAck { status: "ignored" }));
    };
    let Some(text) = inbound.text.as_deref().map(str::trim).filter(|text| !text.is_empty()) else {
        info!(
            event_name = "webhook.meta.non_text",
            correlation_id = %correlation_id,
            phone = %inbound.phone,
            "ignoring message without text"
        );
        return Ok(Json(WebhookAck { status: "ignored" }));
    };

    info!(
        event_name = "webhook.meta.received",
        correlation_id = %correlation_id,
        phone = %inbound.phone,
        "inbound whatsapp message"
    );
    let reply = state.router.handle_incoming_message_on(&inbound.phone, text, Channel::Meta).await;
    if reply.is_empty() {
        return Ok(Json(WebhookAck { status: "ok" }));
    }

    if let Err(error) = state.sender.send(Channel::Meta, &inbound.phone, &reply).await {
        warn!(
            event_name = "webhook.meta.reply_failed",
            correlation_id = %correlation_id,
            phone = %inbound.phone,
            error = %error,
            "reply could not be delivered"
        );
        return Err(ApiError::from_application(error.into(), &correlation_id));
    }
    Ok(Json(WebhookAck { status: "ok" }))
}

pub async fn twilio_inbound(
    State(state): State<WebhookState>,
    Form(form): Form<TwilioWebhookForm>,
) -> Result<impl IntoResponse, ApiError> {
    let correlation_id = correlation_id();
    let phone = form.caller_phone().map_err(|error| invalid_input(error, &correlation_id))?;

    let reply = match form.text() {
        Some(text) => {
            info!(
                event_name = "webhook.twilio.received",
                correlation_id = %correlation_id,
                phone = %phone,
                "inbound twilio message"
            );
            state.router.handle_incoming_message_on(&phone, text, Channel::Twilio).await
        }
        None => String::new(),
    };

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, TWIML_CONTENT_TYPE)], render_twiml(&reply)))
}
