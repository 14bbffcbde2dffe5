use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::NarratorError;
use crate::types::{word_count, Tier, Tone};

#[derive(Debug, Clone)]
pub struct NarrationRequest {
    pub text: String,
    pub memory_date: NaiveDate,
    pub tier: Tier,
    pub tone: Tone,
    /// Lower-tier narrative appended to the prompt for monthly/yearly runs
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Narration {
    pub narrative: String,
    pub word_count: u32,
    pub prompt_used: String,
}

/// Turns a memory into a reframed narrative.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn generate(&self, request: &NarrationRequest) -> Result<Narration, NarratorError>;

    /// Cheap round trip that proves the credentials and endpoint work,
    /// without generating anything.
    async fn check_connection(&self) -> Result<(), NarratorError>;
}

const THERAPEUTIC_INSTRUCTIONS: &str = "\
Reframe this memory therapeutically. Help me see it in a light that supports healing, \
understanding and growth. Touch on:
- what the experience may have taught me
- how it added to my resilience
- any lesson hidden inside the difficulty
- a compassionate view that honours my feelings and still offers hope";

const INSPIRATIONAL_INSTRUCTIONS: &str = "\
Turn this memory into an inspirational narrative that motivates and empowers me. Touch on:
- the courage and strength I showed
- how the moment fits my larger journey
- the good it may bring to my future
- an uplifting view that celebrates my resilience";

const SYSTEM_GUIDELINES: &str = "\
Guidelines:
- Keep a warm, supportive, non-judgmental tone
- Treat the person's feelings and experiences as valid
- Focus on growth, resilience and positive reframing
- Speak directly to the person as \"you\"
- Avoid clinical language; write like a wise, caring friend
- Never minimise or dismiss difficult experiences
- Look for genuine meaning rather than shallow positivity
- Close with hope and encouragement";

fn length_instruction(tier: Tier) -> &'static str {
    match tier {
        Tier::Weekly => "Keep the response between 200 and 400 words.",
        Tier::Monthly => "Keep the response between 400 and 600 words, with deeper insight.",
        Tier::Yearly => {
            "Keep the response between 600 and 800 words, reflecting on the wider arc of life."
        }
    }
}

pub fn system_prompt(tone: Tone) -> String {
    format!(
        "You are a compassionate assistant who writes {} stories for personal growth and healing. \
         You help people reframe their memories in positive, empowering ways.\n{}",
        tone.as_str(),
        SYSTEM_GUIDELINES
    )
}

/// The user prompt sent to the model. Stored verbatim on the reflection.
pub fn build_prompt(request: &NarrationRequest) -> String {
    let instructions = match request.tone {
        Tone::Therapeutic => THERAPEUTIC_INSTRUCTIONS,
        Tone::Inspirational => INSPIRATIONAL_INSTRUCTIONS,
    };

    let mut prompt = format!(
        "Here is a memory from {}:\n\n\"{}\"\n\n{}\n\n{}",
        request.memory_date.format("%Y-%m-%d"),
        request.text,
        instructions,
        length_instruction(request.tier),
    );
    if let Some(context) = request.context.as_deref().filter(|c| !c.trim().is_empty()) {
        prompt.push_str("\n\n");
        prompt.push_str(context);
    }
    prompt.push_str("\n\nWrite in a warm, supportive tone, as if speaking to a dear friend.");
    prompt
}

/// Map a non-success HTTP status onto the narrator error classes
pub fn classify_status(status: u16, body: &str) -> NarratorError {
    let detail = format!("status {}: {}", status, body);
    match status {
        401 | 403 => NarratorError::Auth(detail),
        // 529 is Anthropic's "overloaded"
        429 | 529 => NarratorError::RateLimited(detail),
        500..=599 => NarratorError::Network(detail),
        _ => NarratorError::MalformedResponse(detail),
    }
}

/// Pull the narrative text out of a Messages API response body
pub fn extract_narrative(data: &serde_json::Value) -> Result<String, NarratorError> {
    let text = data["content"][0]["text"]
        .as_str()
        .map(str::trim)
        .unwrap_or_default();
    if text.is_empty() {
        return Err(NarratorError::MalformedResponse(
            "no text content in response".into(),
        ));
    }
    Ok(text.to_string())
}

pub struct AnthropicNarrator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl AnthropicNarrator {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            timeout,
        }
    }

    pub fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[async_trait]
impl Narrator for AnthropicNarrator {
    async fn generate(&self, request: &NarrationRequest) -> Result<Narration, NarratorError> {
        if !self.has_key() {
            return Err(NarratorError::Auth("ANTHROPIC_API_KEY not set".into()));
        }

        let prompt = build_prompt(request);
        tracing::debug!(
            tier = request.tier.as_str(),
            tone = request.tone.as_str(),
            prompt_chars = prompt.len(),
            has_context = request.context.is_some(),
            "requesting narration"
        );

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.tier.max_tokens(),
            "temperature": 0.7,
            "system": system_prompt(request.tone),
            "messages": [{
                "role": "user",
                "content": prompt,
            }]
        });

        let resp = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| NarratorError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| NarratorError::MalformedResponse(e.to_string()))?;
        let narrative = extract_narrative(&data)?;
        let words = word_count(&narrative);
        tracing::info!(tier = request.tier.as_str(), words, "narration generated");

        Ok(Narration {
            narrative,
            word_count: words,
            prompt_used: prompt,
        })
    }

    async fn check_connection(&self) -> Result<(), NarratorError> {
        if !self.has_key() {
            return Err(NarratorError::Auth("ANTHROPIC_API_KEY not set".into()));
        }

        let resp = self
            .client
            .get("https://api.anthropic.com/v1/models")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| NarratorError::Network(e.to_string()))?;

        let status = resp.status();
        tracing::debug!(status = status.as_u16(), "narrator connection check");
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &text));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(tier: Tier, tone: Tone, context: Option<&str>) -> NarrationRequest {
        NarrationRequest {
            text: "Walked to the lake after a hard day".into(),
            memory_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            tier,
            tone,
            context: context.map(String::from),
        }
    }

    #[test]
    fn prompt_carries_memory_tone_and_length() {
        let prompt = build_prompt(&request(Tier::Weekly, Tone::Therapeutic, None));
        assert!(prompt.starts_with("Here is a memory from 2024-03-04:"));
        assert!(prompt.contains("\"Walked to the lake after a hard day\""));
        assert!(prompt.contains("therapeutically"));
        assert!(prompt.contains("200 and 400 words"));
    }

    #[test]
    fn prompt_appends_lower_tier_context() {
        let prompt = build_prompt(&request(
            Tier::Monthly,
            Tone::Inspirational,
            Some("Previous weekly reflection: you kept going."),
        ));
        assert!(prompt.contains("inspirational narrative"));
        assert!(prompt.contains("400 and 600 words"));
        assert!(prompt.contains("Previous weekly reflection: you kept going."));
    }

    #[test]
    fn blank_context_is_ignored() {
        let with_blank = build_prompt(&request(Tier::Yearly, Tone::Therapeutic, Some("   ")));
        let without = build_prompt(&request(Tier::Yearly, Tone::Therapeutic, None));
        assert_eq!(with_blank, without);
    }

    #[test]
    fn status_codes_are_classified() {
        assert!(matches!(classify_status(401, ""), NarratorError::Auth(_)));
        assert!(matches!(classify_status(403, ""), NarratorError::Auth(_)));
        assert!(matches!(classify_status(429, ""), NarratorError::RateLimited(_)));
        assert!(matches!(classify_status(529, ""), NarratorError::RateLimited(_)));
        assert!(matches!(classify_status(502, ""), NarratorError::Network(_)));
        assert!(matches!(classify_status(400, ""), NarratorError::MalformedResponse(_)));
    }

    #[test]
    fn narrative_extraction_rejects_empty_content() {
        let ok = serde_json::json!({"content": [{"type": "text", "text": "  You grew.  "}]});
        assert_eq!(extract_narrative(&ok).unwrap(), "You grew.");

        let empty = serde_json::json!({"content": [{"type": "text", "text": "   "}]});
        assert!(matches!(extract_narrative(&empty), Err(NarratorError::MalformedResponse(_))));

        let missing = serde_json::json!({"id": "msg_1"});
        assert!(matches!(extract_narrative(&missing), Err(NarratorError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn missing_key_fails_as_auth_without_network() {
        let narrator =
            AnthropicNarrator::new(String::new(), "model".into(), Duration::from_secs(1));
        assert!(!narrator.has_key());
        let err = narrator
            .generate(&request(Tier::Weekly, Tone::Therapeutic, None))
            .await
            .unwrap_err();
        assert!(matches!(err, NarratorError::Auth(_)));
        let err = narrator.check_connection().await.unwrap_err();
        assert!(matches!(err, NarratorError::Auth(_)));
    }
}
