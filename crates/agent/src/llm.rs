//! Language-model helpers behind the core collaborator ports.
//!
//! Every helper sends one structured-output request and validates the answer against what the
//! bot actually offered (known intents, listed product ids, unasked question keys). The model
//! never invents data that reaches the caller.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use aquabot_core::config::LlmConfig;
use aquabot_core::domain::assist::{
    InfoIntent, IntentResult, QuestionChoice, RerankCandidate, RerankOutcome, SearchPlan,
};
use aquabot_core::domain::line::LineKey;
use aquabot_core::errors::CollaboratorError;
use aquabot_core::ports::{CollaboratorResult, Consultant, IntentClassifier, QueryPlanner, Reranker};
use aquabot_core::profile::COMPANY_NAME;
use aquabot_core::questions::remaining_questions;

const MAX_PLANNED_QUERIES: usize = 5;
const MAX_RERANK_CANDIDATES: usize = 30;
const FALLBACK_PLAN_QUESTION: &str =
    "¿Puedes darme un poco más de detalle del producto (tipo/uso) para buscarlo mejor?";

/// One structured-output request: instructions, payload and the JSON schema the answer must fit.
#[derive(Clone, Debug)]
pub struct StructuredPrompt {
    pub name: &'static str,
    pub system: String,
    pub user: String,
    pub schema: Value,
    pub max_output_tokens: u32,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Raw JSON text produced for `prompt`.
    async fn complete(&self, prompt: &StructuredPrompt) -> Result<String>;
}

/// Client for the OpenAI Responses API.
pub struct ResponsesClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl ResponsesClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or_else(|| anyhow!("llm.api_key is not configured"))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("failed to build llm http client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    fn request_body(&self, prompt: &StructuredPrompt) -> Value {
        let mut body = json!({
            "model": self.model,
            "input": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
            "text": {
                "format": {
                    "type": "json_schema",
                    "name": prompt.name,
                    "strict": true,
                    "schema": prompt.schema,
                }
            },
            "store": false,
            "max_output_tokens": prompt.max_output_tokens,
        });
        if supports_temperature(&self.model) {
            body["temperature"] = json!(0);
        }
        body
    }
}

/// Reasoning model families reject an explicit temperature.
fn supports_temperature(model: &str) -> bool {
    !model.trim().to_ascii_lowercase().starts_with("gpt-5")
}

#[async_trait]
impl LlmClient for ResponsesClient {
    async fn complete(&self, prompt: &StructuredPrompt) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request_body(prompt))
            .send()
            .await
            .with_context(|| format!("{} request failed", prompt.name))?;

        if !response.status().is_success() {
            return Err(anyhow!("{} request returned {}", prompt.name, response.status()));
        }

        let payload: Value = response
            .json()
            .await
            .with_context(|| format!("failed to decode {} response", prompt.name))?;
        extract_output_text(&payload)
            .ok_or_else(|| anyhow!("{} response carried no output text", prompt.name))
    }
}

/// First non-empty text in a Responses API payload.
pub fn extract_output_text(payload: &Value) -> Option<String> {
    if let Some(text) = payload.get("output_text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            return Some(text.to_string());
        }
    }

    payload
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .find_map(|content| {
            ["text", "output_text"]
                .iter()
                .filter_map(|field| content.get(*field).and_then(Value::as_str))
                .find(|text| !text.trim().is_empty())
                .map(str::to_string)
        })
}

async fn structured<T: DeserializeOwned>(
    client: &dyn LlmClient,
    collaborator: &'static str,
    prompt: &StructuredPrompt,
) -> CollaboratorResult<T> {
    let text = client
        .complete(prompt)
        .await
        .map_err(|error| CollaboratorError::unavailable(collaborator, format!("{error:#}")))?;
    serde_json::from_str(&text).map_err(|error| CollaboratorError::malformed(collaborator, error))
}

fn line_keys() -> Vec<&'static str> {
    LineKey::ALL.iter().map(|line| line.question_key()).collect()
}

#[derive(Debug, Deserialize)]
struct IntentAnswer {
    intent: String,
    line: String,
    confidence: f64,
}

pub struct LlmIntentClassifier {
    client: Arc<dyn LlmClient>,
}

impl LlmIntentClassifier {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    fn prompt(text: &str, line_hint: Option<LineKey>) -> StructuredPrompt {
        let mut lines = line_keys();
        lines.push("unknown");
        let intents: Vec<&str> = InfoIntent::ALL.iter().map(|intent| intent.as_str()).collect();
        StructuredPrompt {
            name: "intent_classifier",
            system: format!(
                "Eres un clasificador de intentos para el bot de {COMPANY_NAME}. \
                 Elige SOLO 1 intent segun el mensaje del cliente.\n\
                 - company_info: preguntas sobre la empresa o informacion general.\n\
                 - services: asesoria, instalacion, soporte.\n\
                 - line_info: preguntas sobre una linea (agua potable, residual, bombeo, analisis, piscinas).\n\
                 - catalog: pide link, pagina, tienda o portafolio.\n\
                 - faq: horario, ubicacion, pagos, envios.\n\
                 - product_search: quiere producto, precio, cotizacion o stock.\n\
                 - other: saludo o no aplica.\n\
                 Devuelve JSON segun el schema y no inventes datos."
            ),
            user: json!({
                "message": text,
                "line_hint": line_hint.map(LineKey::question_key).unwrap_or_default(),
                "line_keys": line_keys(),
            })
            .to_string(),
            schema: json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "intent": {"type": "string", "enum": intents},
                    "line": {"type": "string", "enum": lines},
                    "confidence": {"type": "number"},
                    "reason": {"type": "string"},
                },
                "required": ["intent", "line", "confidence", "reason"],
            }),
            max_output_tokens: 200,
        }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(
        &self,
        text: &str,
        line_hint: Option<LineKey>,
    ) -> CollaboratorResult<Option<IntentResult>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let answer: IntentAnswer =
            structured(self.client.as_ref(), "intent", &Self::prompt(text, line_hint)).await?;
        let intent = InfoIntent::from_str(&answer.intent)
            .map_err(|error| CollaboratorError::malformed("intent", error))?;
        let confidence = if answer.confidence.is_finite() {
            answer.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let line_key =
            LineKey::from_str(&answer.line).ok().or(line_hint).or_else(|| LineKey::detect(text));

        debug!(
            event_name = "llm.intent",
            intent = intent.as_str(),
            confidence,
            "intent classified"
        );
        Ok(Some(IntentResult { intent, line_key, confidence }))
    }
}

#[derive(Debug, Deserialize)]
struct PlanAnswer {
    queries: Vec<String>,
    should_ask: bool,
    #[serde(default)]
    question: String,
}

pub struct LlmQueryPlanner {
    client: Arc<dyn LlmClient>,
}

impl LlmQueryPlanner {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    fn prompt(text: &str) -> StructuredPrompt {
        StructuredPrompt {
            name: "product_search_plan",
            system: format!(
                "Eres un asistente de ventas de {COMPANY_NAME}. Transforma el mensaje del cliente \
                 en consultas cortas para buscar productos en la tienda.\n\
                 - queries: 1 a {MAX_PLANNED_QUERIES} frases muy cortas y especificas \
                 (ej: 'calentador de agua', 'turbidimetro TB350').\n\
                 - Si el mensaje es ambiguo, marca should_ask=true y haz 1 pregunta clave.\n\
                 - No inventes SKUs ni marcas.\n\
                 - Idioma: espanol."
            ),
            user: text.to_string(),
            schema: json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "queries": {
                        "type": "array",
                        "minItems": 1,
                        "maxItems": MAX_PLANNED_QUERIES,
                        "items": {"type": "string"},
                    },
                    "should_ask": {"type": "boolean"},
                    "question": {"type": "string"},
                },
                "required": ["queries", "should_ask", "question"],
            }),
            max_output_tokens: 250,
        }
    }
}

#[async_trait]
impl QueryPlanner for LlmQueryPlanner {
    async fn plan(&self, text: &str) -> CollaboratorResult<SearchPlan> {
        let answer: PlanAnswer =
            structured(self.client.as_ref(), "planner", &Self::prompt(text)).await?;

        let queries: Vec<String> = answer
            .queries
            .iter()
            .map(|query| query.trim().to_string())
            .filter(|query| !query.is_empty())
            .take(MAX_PLANNED_QUERIES)
            .collect();
        if queries.is_empty() {
            return Err(CollaboratorError::malformed("planner", "plan carried no queries"));
        }

        let question = answer.question.trim();
        let question = match (answer.should_ask, question.is_empty()) {
            (true, true) => Some(FALLBACK_PLAN_QUESTION.to_string()),
            (_, false) => Some(question.to_string()),
            (false, true) => None,
        };
        Ok(SearchPlan { queries, should_ask: answer.should_ask, question })
    }
}

#[derive(Debug, Deserialize)]
struct RerankAnswer {
    #[serde(default)]
    selected_ids: Vec<i64>,
    #[serde(default)]
    clarifying_question: String,
}

pub struct LlmReranker {
    client: Arc<dyn LlmClient>,
}

impl LlmReranker {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    fn prompt(query: &str, candidates: &[RerankCandidate], top_k: usize) -> StructuredPrompt {
        let allowed: Vec<i64> = candidates.iter().map(|candidate| candidate.id.0).collect();
        StructuredPrompt {
            name: "product_rerank",
            system: "Eres un asistente de e-commerce. Selecciona productos reales de una lista. \
                     NO inventes productos. Solo puedes elegir IDs presentes en la lista."
                .to_string(),
            user: json!({
                "query": query,
                "top_k": top_k,
                "allowed_ids": allowed,
                "products": candidates,
                "instructions": "Selecciona hasta top_k productos relevantes para la consulta. \
                     Si no hay match claro, devuelve selected_ids=[] y una pregunta corta pidiendo \
                     el dato minimo que falta (capacidad HP, voltaje, tipo de equipo, uso).",
            })
            .to_string(),
            schema: json!({
                "type": "object",
                "additionalProperties": false,
                "required": ["selected_ids", "clarifying_question"],
                "properties": {
                    "selected_ids": {
                        "type": "array",
                        "items": {"type": "integer"},
                        "minItems": 0,
                        "maxItems": top_k,
                    },
                    "clarifying_question": {"type": "string"},
                },
            }),
            max_output_tokens: 300,
        }
    }
}

#[async_trait]
impl Reranker for LlmReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[RerankCandidate],
        top_k: usize,
    ) -> CollaboratorResult<RerankOutcome> {
        let candidates = &candidates[..candidates.len().min(MAX_RERANK_CANDIDATES)];
        if candidates.is_empty() || top_k == 0 {
            return Ok(RerankOutcome::default());
        }

        let answer: RerankAnswer =
            structured(self.client.as_ref(), "rerank", &Self::prompt(query, candidates, top_k))
                .await?;

        let mut selected_ids = Vec::new();
        for id in answer.selected_ids {
            let Some(candidate) = candidates.iter().find(|candidate| candidate.id.0 == id) else {
                continue;
            };
            if !selected_ids.contains(&candidate.id) {
                selected_ids.push(candidate.id);
            }
            if selected_ids.len() >= top_k {
                break;
            }
        }

        let question = answer.clarifying_question.trim();
        Ok(RerankOutcome {
            selected_ids,
            clarifying_question: (!question.is_empty()).then(|| question.to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ConsultAnswer {
    should_ask: bool,
    #[serde(default)]
    question_key: String,
}

pub struct LlmConsultant {
    client: Arc<dyn LlmClient>,
}

impl LlmConsultant {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Consultant for LlmConsultant {
    async fn select_question(
        &self,
        text: &str,
        line_hint: Option<LineKey>,
        asked_keys: &[String],
    ) -> CollaboratorResult<Option<QuestionChoice>> {
        let available = remaining_questions(line_hint, asked_keys);
        if available.is_empty() {
            return Ok(None);
        }

        let offered: Vec<Value> = available
            .iter()
            .map(|question| json!({"key": question.key, "question": question.question}))
            .collect();
        let prompt = StructuredPrompt {
            name: "consultant_question",
            system: format!(
                "Eres un asesor de {COMPANY_NAME}. Decide si hace falta UNA pregunta corta para \
                 precisar la solicitud antes de buscar productos.\n\
                 - Si el cliente ya dio suficiente informacion tecnica, no preguntes.\n\
                 - Si el mensaje es muy general, elige una pregunta de la lista disponible.\n\
                 - No inventes preguntas fuera de la lista."
            ),
            user: json!({
                "message": text,
                "line_hint": line_hint.map(LineKey::question_key).unwrap_or_default(),
                "asked_keys": asked_keys,
                "available_questions": offered,
            })
            .to_string(),
            schema: json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "should_ask": {"type": "boolean"},
                    "question_key": {"type": "string"},
                    "reason": {"type": "string"},
                },
                "required": ["should_ask", "question_key", "reason"],
            }),
            max_output_tokens: 200,
        };

        let answer: ConsultAnswer =
            structured(self.client.as_ref(), "consultant", &prompt).await?;
        if !answer.should_ask {
            return Ok(None);
        }
        let key = answer.question_key.trim();
        Ok(available.iter().find(|question| question.key == key).map(|question| QuestionChoice {
            key: question.key.to_string(),
            question: question.question.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use serde_json::json;

    use aquabot_core::domain::assist::{InfoIntent, RerankCandidate};
    use aquabot_core::domain::line::LineKey;
    use aquabot_core::domain::product::ProductId;
    use aquabot_core::errors::CollaboratorError;
    use aquabot_core::ports::{Consultant, IntentClassifier, QueryPlanner, Reranker};

    use super::{
        extract_output_text, supports_temperature, LlmClient, LlmConsultant, LlmIntentClassifier,
        LlmQueryPlanner, LlmReranker, StructuredPrompt,
    };

    struct CannedClient {
        answer: Result<String, String>,
        prompts: Mutex<Vec<StructuredPrompt>>,
    }

    impl CannedClient {
        fn answering(answer: &str) -> Arc<Self> {
            Arc::new(Self { answer: Ok(answer.to_string()), prompts: Mutex::new(Vec::new()) })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { answer: Err("timeout".to_string()), prompts: Mutex::new(Vec::new()) })
        }

        fn last_user_payload(&self) -> serde_json::Value {
            let prompts = self.prompts.lock().expect("prompts lock");
            let prompt = prompts.last().expect("one prompt sent");
            serde_json::from_str(&prompt.user).expect("user payload is json")
        }
    }

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn complete(&self, prompt: &StructuredPrompt) -> Result<String> {
            self.prompts.lock().expect("prompts lock").push(prompt.clone());
            self.answer.clone().map_err(|error| anyhow!(error))
        }
    }

    fn candidate(id: i64) -> RerankCandidate {
        RerankCandidate {
            id: ProductId(id),
            name: format!("Producto {id}"),
            sku: format!("SKU{id}"),
            price: "100000".to_string(),
            stock: "disponible".to_string(),
            categories: Vec::new(),
        }
    }

    #[test]
    fn output_text_prefers_top_level_then_content() {
        assert_eq!(
            extract_output_text(&json!({"output_text": "{\"a\":1}"})).as_deref(),
            Some("{\"a\":1}")
        );
        let nested = json!({
            "output": [
                {"type": "reasoning", "content": []},
                {"type": "message", "content": [{"type": "output_text", "text": "{\"b\":2}"}]}
            ]
        });
        assert_eq!(extract_output_text(&nested).as_deref(), Some("{\"b\":2}"));
        assert_eq!(extract_output_text(&json!({"output": []})), None);
    }

    #[test]
    fn temperature_is_omitted_for_reasoning_models() {
        assert!(!supports_temperature("gpt-5-nano"));
        assert!(supports_temperature("gpt-4o-mini"));
    }

    #[tokio::test]
    async fn intent_is_parsed_and_clamped() {
        let client = CannedClient::answering(
            r#"{"intent": "line_info", "line": "piscinas", "confidence": 1.4, "reason": "x"}"#,
        );
        let classifier = LlmIntentClassifier::new(client.clone());

        let result = classifier
            .classify("que manejan para piscinas", None)
            .await
            .expect("classified")
            .expect("some intent");
        assert_eq!(result.intent, InfoIntent::LineInfo);
        assert_eq!(result.line_key, Some(LineKey::Piscinas));
        assert!((result.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(client.last_user_payload()["line_hint"], "");
    }

    #[tokio::test]
    async fn unknown_line_falls_back_to_hint() {
        let client = CannedClient::answering(
            r#"{"intent": "catalog", "line": "unknown", "confidence": 0.9, "reason": "x"}"#,
        );
        let classifier = LlmIntentClassifier::new(client);
        let result = classifier
            .classify("pasame el link", Some(LineKey::Bombeo))
            .await
            .expect("classified")
            .expect("some intent");
        assert_eq!(result.line_key, Some(LineKey::Bombeo));
    }

    #[tokio::test]
    async fn unknown_intent_is_malformed() {
        let client = CannedClient::answering(
            r#"{"intent": "weather", "line": "unknown", "confidence": 0.9, "reason": "x"}"#,
        );
        let error = LlmIntentClassifier::new(client)
            .classify("va a llover?", None)
            .await
            .expect_err("rejected");
        assert!(matches!(error, CollaboratorError::MalformedPayload { .. }));
    }

    #[tokio::test]
    async fn transport_failure_is_unavailable() {
        let error = LlmQueryPlanner::new(CannedClient::failing())
            .plan("bomba")
            .await
            .expect_err("failed");
        assert_eq!(error.collaborator(), "planner");
        assert!(matches!(error, CollaboratorError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn planner_trims_queries_and_fills_missing_question() {
        let client = CannedClient::answering(
            r#"{"queries": [" calentador piscina ", "", "bomba de calor"], "should_ask": true, "question": ""}"#,
        );
        let plan = LlmQueryPlanner::new(client).plan("quiero un calentador").await.expect("plan");
        assert_eq!(plan.queries, vec!["calentador piscina", "bomba de calor"]);
        assert!(plan.should_ask);
        assert!(plan.question.is_some());
    }

    #[tokio::test]
    async fn reranker_keeps_only_offered_unique_ids() {
        let client = CannedClient::answering(
            r#"{"selected_ids": [99, 2, 2, 1, 3], "clarifying_question": "  "}"#,
        );
        let candidates = vec![candidate(1), candidate(2), candidate(3)];
        let outcome =
            LlmReranker::new(client).rerank("bomba", &candidates, 2).await.expect("outcome");
        assert_eq!(outcome.selected_ids, vec![ProductId(2), ProductId(1)]);
        assert_eq!(outcome.clarifying_question, None);
    }

    #[tokio::test]
    async fn consultant_maps_key_to_bank_question() {
        let client = CannedClient::answering(
            r#"{"should_ask": true, "question_key": "flow_rate", "reason": "x"}"#,
        );
        let consultant = LlmConsultant::new(client.clone());
        let choice = consultant
            .select_question("necesito una bomba", Some(LineKey::Bombeo), &["application".to_string()])
            .await
            .expect("selected")
            .expect("a question");
        assert_eq!(choice.key, "flow_rate");
        assert_eq!(choice.question, "¿Qué caudal necesitas (m3/h o L/min)?");

        let offered = client.last_user_payload();
        let keys: Vec<&str> = offered["available_questions"]
            .as_array()
            .expect("question list")
            .iter()
            .filter_map(|question| question["key"].as_str())
            .collect();
        assert!(!keys.contains(&"application"));
    }

    #[tokio::test]
    async fn consultant_ignores_invented_keys() {
        let client = CannedClient::answering(
            r#"{"should_ask": true, "question_key": "budget", "reason": "x"}"#,
        );
        let choice = LlmConsultant::new(client)
            .select_question("necesito una bomba", Some(LineKey::Bombeo), &[])
            .await
            .expect("selected");
        assert_eq!(choice, None);
    }

    #[tokio::test]
    async fn consultant_skips_the_call_when_bank_is_exhausted() {
        let client = CannedClient::failing();
        let choice = LlmConsultant::new(client.clone())
            .select_question("hola", None, &["need".to_string()])
            .await
            .expect("no call made");
        assert_eq!(choice, None);
        assert!(client.prompts.lock().expect("prompts lock").is_empty());
    }
}
