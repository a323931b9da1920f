//! Gemini `generateContent` client

use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{
    COMPLETION_CONTEXT, EXTRACTION_CONTEXT, History, LanguageModel, Speaker, StructuredAction,
};
use crate::{Error, Result};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const SYSTEM_INSTRUCTION: &str = "\
You are CRAB (Cosmic Responsive AI Base), an advanced and helpful AI assistant.

CORE BEHAVIORS:
1. PROFESSIONALISM: Your responses must be grammatically perfect, well-structured, and helpful.
2. CLARITY: Explain concepts clearly. Use paragraphs where necessary.
3. TONE: Be friendly, intelligent, and precise.
4. FORMATTING: If the user asks for code, provide it. If they ask for a list, use a list.
5. CONCISENESS: Avoid unnecessary fluff. Get straight to the answer.";

const ACTION_PARSER_INSTRUCTION: &str = r#"Extract structured data from user input.
Current Time: {now}

Rules:
1. DETECT actions: SCHEDULE, REMINDER, WEATHER, NEWS, STOCK, WEB_SEARCH.
2. OUTPUT JSON ONLY.

Schema:
{
  "hasAction": boolean,
  "actionType": "SCHEDULE" | "REMINDER_BATCH" | "FETCH_WEATHER" | "FETCH_NEWS" | "FETCH_STOCK" | "FETCH_WEB_SEARCH" | "NONE",
  "missingInfo": string | null,
  "reply": string,
  "data": { "title": string, "date": "YYYY-MM-DD", "startTime": "HH:MM", "endTime": "HH:MM", "reminders": [{"text":string,"time":"HH:MM","date":"YYYY-MM-DD"}], "location":string, "query":string, "symbol":string }
}"#;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    Text(&'a str),
    #[serde(rename_all = "camelCase")]
    InlineData { mime_type: &'static str, data: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Client for Google's Gemini models
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl GeminiClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Result<Self> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(Error::Config("Gemini API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
        })
    }

    /// Model identifier in use
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        system: &str,
        parts: Vec<Part<'_>>,
        config: GenerationConfig,
    ) -> Result<String> {
        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text(system)],
            },
            contents: [Content {
                role: Some("user"),
                parts,
            }],
            generation_config: config,
        };

        let response = self
            .client
            .post(format!("{API_BASE}/{}:generateContent", self.model))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("Gemini error {status}: {body}")));
        }

        let body: GenerateResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        tracing::debug!(model = %self.model, chars = text.len(), "gemini response");
        Ok(text)
    }
}

fn transcript_prompt(history: &History, text: &str) -> String {
    let mut prompt = String::new();
    for entry in history.recent(COMPLETION_CONTEXT) {
        let who = match entry.speaker {
            Speaker::User => "User",
            Speaker::Assistant => "CRAB",
        };
        prompt.push_str(who);
        prompt.push_str(": ");
        prompt.push_str(&entry.text);
        prompt.push('\n');
    }
    prompt.push_str("User: ");
    prompt.push_str(text);
    prompt.push_str("\nCRAB:");
    prompt
}

fn extraction_prompt(history: &History, text: &str) -> String {
    let context = history
        .recent(EXTRACTION_CONTEXT)
        .map(|e| {
            let who = match e.speaker {
                Speaker::User => "user",
                Speaker::Assistant => "bot",
            };
            format!("{who}: {}", e.text)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("Context:\n{context}\nInput: \"{text}\"\nJSON:")
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn complete(
        &self,
        history: &History,
        text: &str,
        image: Option<&[u8]>,
    ) -> Result<String> {
        let prompt = transcript_prompt(history, text);

        let mut parts = Vec::with_capacity(2);
        if let Some(image) = image {
            parts.push(Part::InlineData {
                mime_type: "image/jpeg",
                data: base64::engine::general_purpose::STANDARD.encode(image),
            });
        }
        parts.push(Part::Text(&prompt));

        let config = GenerationConfig {
            temperature: 0.7,
            top_k: Some(40),
            top_p: Some(0.95),
            response_mime_type: None,
        };

        self.generate(SYSTEM_INSTRUCTION, parts, config).await
    }

    async fn extract(&self, history: &History, text: &str) -> Result<Option<StructuredAction>> {
        let system = ACTION_PARSER_INSTRUCTION.replace(
            "{now}",
            &chrono::Local::now().format("%Y-%m-%d %H:%M").to_string(),
        );
        let prompt = extraction_prompt(history, text);

        let config = GenerationConfig {
            temperature: 0.1,
            top_k: None,
            top_p: None,
            response_mime_type: Some("application/json"),
        };

        let raw = self
            .generate(&system, vec![Part::Text(&prompt)], config)
            .await?;
        if raw.trim().is_empty() {
            return Ok(None);
        }

        StructuredAction::from_json(&raw).map(Some)
    }
}
