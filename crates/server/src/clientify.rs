//! Clientify CRM client: contacts by phone, notes and deals.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use aquabot_core::config::CrmConfig;
use aquabot_core::domain::contact::{Contact, ContactId};
use aquabot_core::errors::CollaboratorError;
use aquabot_core::ports::{CollaboratorResult, Crm};

const COLLABORATOR: &str = "clientify";
const CONTACT_SOURCE: &str = "whatsapp-bot";
const CONTACT_TAGS: [&str; 2] = ["aquaintegral", "whatsapp"];

pub struct ClientifyCrm {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Debug, Default, Deserialize)]
struct ContactPage {
    #[serde(default)]
    results: Vec<ClientifyContact>,
}

#[derive(Debug, Deserialize)]
struct ClientifyContact {
    id: Value,
    #[serde(default)]
    phone: Option<String>,
}

impl ClientifyCrm {
    pub fn new(config: &CrmConfig) -> CollaboratorResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| config.enabled && !key.expose_secret().trim().is_empty())
            .ok_or_else(|| CollaboratorError::Disabled("crm".to_string()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| CollaboratorError::unavailable(COLLABORATOR, error))?;
        Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_string(), api_key })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("Token {}", self.api_key.expose_secret()))
    }

    fn find_contact_request(&self, phone: &str) -> RequestBuilder {
        self.authorized(self.client.get(format!("{}/contacts/", self.base_url)))
            .query(&[("phone", phone)])
    }

    fn create_contact_request(&self, phone: &str) -> RequestBuilder {
        self.authorized(self.client.post(format!("{}/contacts/", self.base_url))).json(&json!({
            "phone": phone,
            "contact_source": CONTACT_SOURCE,
            "tags": CONTACT_TAGS,
        }))
    }

    fn note_request(&self, contact_id: &ContactId, text: &str) -> RequestBuilder {
        self.authorized(
            self.client.post(format!("{}/contacts/{}/notes/", self.base_url, contact_id)),
        )
        .json(&json!({ "text": text }))
    }

    fn deal_request(&self, contact_id: &ContactId, name: &str) -> RequestBuilder {
        let contact =
            contact_id.0.parse::<i64>().map_or_else(|_| json!(contact_id.0), |id| json!(id));
        self.authorized(self.client.post(format!("{}/deals/", self.base_url))).json(&json!({
            "name": name,
            "contact": contact,
            "source": CONTACT_SOURCE,
        }))
    }
}

async fn execute(request: RequestBuilder) -> CollaboratorResult<Response> {
    let response =
        request.send().await.map_err(|error| CollaboratorError::unavailable(COLLABORATOR, error))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CollaboratorError::unavailable(COLLABORATOR, format!("status {status}: {body}")))
}

fn into_contact(raw: ClientifyContact, requested_phone: &str) -> CollaboratorResult<Contact> {
    let id = match raw.id {
        Value::Number(number) => number.to_string(),
        Value::String(text) if !text.trim().is_empty() => text.trim().to_string(),
        other => {
            return Err(CollaboratorError::malformed(
                COLLABORATOR,
                format!("contact id `{other}` is not usable"),
            ))
        }
    };
    let phone = raw
        .phone
        .filter(|phone| !phone.trim().is_empty())
        .unwrap_or_else(|| requested_phone.to_string());
    Ok(Contact { id: ContactId(id), phone })
}

#[async_trait]
impl Crm for ClientifyCrm {
    async fn get_or_create_contact_by_phone(&self, phone: &str) -> CollaboratorResult<Contact> {
        let phone = phone.trim();
        let page: ContactPage = execute(self.find_contact_request(phone))
            .await?
            .json()
            .await
            .map_err(|error| CollaboratorError::malformed(COLLABORATOR, error))?;
        if let Some(existing) = page.results.into_iter().next() {
            return into_contact(existing, phone);
        }

        let created: ClientifyContact = execute(self.create_contact_request(phone))
            .await?
            .json()
            .await
            .map_err(|error| CollaboratorError::malformed(COLLABORATOR, error))?;
        into_contact(created, phone)
    }

    async fn add_note(&self, contact_id: &ContactId, text: &str) -> CollaboratorResult<()> {
        execute(self.note_request(contact_id, text)).await.map(|_| ())
    }

    async fn create_deal(&self, contact_id: &ContactId, name: &str) -> CollaboratorResult<()> {
        execute(self.deal_request(contact_id, name)).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use aquabot_core::config::AppConfig;
    use aquabot_core::domain::contact::ContactId;
    use aquabot_core::errors::CollaboratorError;

    use super::{into_contact, ClientifyContact, ClientifyCrm};

    fn crm() -> ClientifyCrm {
        let mut config = AppConfig::default().crm;
        config.enabled = true;
        config.api_key = Some("clientify-key".to_string().into());
        ClientifyCrm::new(&config).expect("configured")
    }

    fn json_body(request: &reqwest::Request) -> Value {
        let bytes = request.body().and_then(|body| body.as_bytes()).expect("buffered body");
        serde_json::from_slice(bytes).expect("json body")
    }

    #[test]
    fn disabled_crm_is_not_built() {
        let mut config = AppConfig::default().crm;
        config.api_key = Some("clientify-key".to_string().into());
        assert!(matches!(ClientifyCrm::new(&config), Err(CollaboratorError::Disabled(_))));
    }

    #[test]
    fn lookup_uses_token_auth_and_phone_filter() {
        let request = crm().find_contact_request("573001112233").build().expect("request");

        assert_eq!(
            request.url().as_str(),
            "https://api.clientify.net/v1/contacts/?phone=573001112233"
        );
        assert_eq!(
            request.headers().get("authorization").and_then(|value| value.to_str().ok()),
            Some("Token clientify-key")
        );
    }

    #[test]
    fn created_contacts_are_tagged_with_the_bot_source() {
        let request = crm().create_contact_request("573001112233").build().expect("request");
        let body = json_body(&request);

        assert_eq!(body["contact_source"], "whatsapp-bot");
        assert_eq!(body["tags"], json!(["aquaintegral", "whatsapp"]));
    }

    #[test]
    fn deals_reference_numeric_contact_ids() {
        let crm = crm();
        let request = crm
            .deal_request(&ContactId("77".to_string()), "Interés vía WhatsApp (bot)")
            .build()
            .expect("request");
        assert_eq!(request.url().path(), "/v1/deals/");
        assert_eq!(json_body(&request)["contact"], json!(77));

        let note = crm.note_request(&ContactId("77".to_string()), "Mensaje WhatsApp: hola");
        let note = note.build().expect("request");
        assert_eq!(note.url().path(), "/v1/contacts/77/notes/");
        assert_eq!(json_body(&note)["text"], "Mensaje WhatsApp: hola");
    }

    #[test]
    fn contact_ids_accept_numbers_and_strings() {
        let numeric = ClientifyContact { id: json!(15), phone: None };
        let contact = into_contact(numeric, "573001112233").expect("contact");
        assert_eq!(contact.id, ContactId("15".to_string()));
        assert_eq!(contact.phone, "573001112233");

        let missing = ClientifyContact { id: Value::Null, phone: None };
        assert!(matches!(
            into_contact(missing, "573001112233"),
            Err(CollaboratorError::MalformedPayload { .. })
        ));
    }
}
