use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::metadata::CaptionAnalysis;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Caption analyzer over the Gemini API: extracts specific place names
/// from a post caption using JSON-schema constrained output.
pub struct CaptionAnalyzer {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl CaptionAnalyzer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow!("GEMINI_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// Analyze one caption. Never fails outward: API and parse errors are
    /// captured in the returned record's `error` field so the enrichment
    /// pass keeps moving.
    pub async fn analyze(&self, caption: &str) -> CaptionAnalysis {
        if caption.is_empty() {
            return CaptionAnalysis {
                location_found: false,
                locations: None,
                error: Some("Empty caption provided".to_string()),
            };
        }

        match self.generate(caption).await {
            Ok(text) => parse_analysis(&text),
            Err(e) => CaptionAnalysis {
                location_found: false,
                locations: None,
                error: Some(format!("Gemini API call failed: {e}")),
            },
        }
    }

    async fn generate(&self, caption: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = json!({
            "contents": [{"parts": [{"text": build_prompt(caption)}]}],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "location_found": {"type": "BOOLEAN"},
                        "locations": {
                            "type": "ARRAY",
                            "items": {"type": "STRING"},
                            "nullable": true
                        }
                    },
                    "required": ["location_found"]
                }
            }
        });

        debug!(model = %self.model, "gemini generate request");

        let response = self.http.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API error ({}): {}", status, error_text));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .context("no candidates in Gemini response")
    }
}

fn build_prompt(caption: &str) -> String {
    format!(
        "Analyze the following Instagram post caption to identify specific locations mentioned.\n\
         Focus on precise places like restaurants, landmarks, points of interest, shops, parks, specific addresses, etc.\n\
         For each specific location found, also include any mentioned city, state, region, or country that provides context for that location.\n\
         If only a general area (like a city or country) is mentioned without a specific point of interest, include that as well only if there is not a specific location mentioned.\n\
         Do not include general areas as individual items in the list, include them as part of the context for specific locations.\n\
         \n\
         Caption:\n\
         \"{caption}\""
    )
}

/// Parse the model's JSON text into an analysis record. Malformed output
/// is captured as an error record, not a failure.
fn parse_analysis(text: &str) -> CaptionAnalysis {
    #[derive(Deserialize)]
    struct Wire {
        location_found: bool,
        #[serde(default)]
        locations: Option<Vec<String>>,
    }

    match serde_json::from_str::<Wire>(text) {
        Ok(wire) => CaptionAnalysis {
            location_found: wire.location_found,
            locations: wire.locations,
            error: None,
        },
        Err(e) => CaptionAnalysis {
            location_found: false,
            locations: None,
            error: Some(format!("Failed to decode JSON response from AI: {e}")),
        },
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}
