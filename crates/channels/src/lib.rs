//! WhatsApp transports: inbound webhook parsing and outbound senders for the WhatsApp Cloud API
//! (Meta) and Twilio.

pub mod error;
pub mod meta;
pub mod sender;
pub mod twilio;

pub use error::ChannelError;
pub use meta::{parse_meta_webhook, verify_subscription, InboundMessage};
pub use sender::{ChannelSender, TwilioSender, WhatsAppCloudSender};
pub use twilio::{render_twiml, TwilioWebhookForm, TWIML_CONTENT_TYPE};
