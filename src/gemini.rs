//! Gemini-backed translation oracle.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::english::is_failed_answer;
use crate::oracle::{
    OracleError, TranslationContext, TranslationOracle, TranslationResult, TranslationTask,
};
use crate::retry::{with_retry_if, RetryPolicy};

/// Gemini `generateContent` request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Clone)]
pub struct GeminiOracle {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    retry: RetryPolicy,
}

impl GeminiOracle {
    pub fn new(
        api_key: &str,
        model: &str,
        api_url: &str,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            endpoint: format!("{}/{}:generateContent", api_url.trim_end_matches('/'), model),
            retry: RetryPolicy::oracle_call(),
        })
    }

    /// Build the oracle from config; `None` when no API key is configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>, OracleError> {
        config
            .gemini_api_key
            .as_deref()
            .map(|key| {
                Self::new(
                    key,
                    &config.gemini_model,
                    &config.gemini_api_url,
                    config.oracle_timeout(),
                )
            })
            .transpose()
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, OracleError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(OracleError::Status { status, body });
        }

        let body = response.text().await?;
        let parsed: GenerateResponse = serde_json::from_str(&body)?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().map(|part| part.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(OracleError::Schema("response contained no candidate text".to_string()));
        }
        Ok(text)
    }
}

impl TranslationOracle for GeminiOracle {
    async fn translate(
        &self,
        tasks: &[TranslationTask],
        context: &TranslationContext,
    ) -> Result<Vec<TranslationResult>, OracleError> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(tasks, context)?,
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                temperature: 0.2,
            },
        };

        let text = with_retry_if(
            &self.retry,
            &format!("Gemini translation for {}", context.territory),
            || self.generate(&request),
            OracleError::is_retryable,
        )
        .await?;

        parse_answer(&text)
    }
}

/// Build the translation prompt for one batch.
fn build_prompt(
    tasks: &[TranslationTask],
    context: &TranslationContext,
) -> Result<String, OracleError> {
    let language = match &context.source_language {
        Some(language) => format!("(in {})", language),
        None => "(likely in the local language)".to_string(),
    };
    let data = serde_json::to_string(tasks)?;

    Ok(format!(
        r#"You are an expert academic translator. Below is a list of universities in {territory}.
Each entry has a 'chinese_name' and an 'original_name' {language}.

For each entry give the official, most commonly used international English name.
Base it primarily on 'original_name'; use 'chinese_name' only as secondary context.

## Rules
- The answer MUST be in English.
- Translate academic terms: 'Universidad' -> 'University', 'Ecole'/'École' -> 'School',
  'Institut' -> 'Institute', 'Hochschule' -> 'University of Applied Sciences',
  'Facultad' -> 'Faculty'.
- Translate even when the institution is known by its native name
  (e.g. 'Université libre de Bruxelles' -> 'Free University of Brussels').
- Never return the input unchanged if it contains non-English academic terms.

## Output
A JSON array of objects, each with the original 'chinese_name' and the new 'english_name'.

Data: {data}"#,
        territory = context.territory,
        language = language,
        data = data,
    ))
}

/// Parse the model's answer into results, dropping malformed entries and
/// placeholder answers.
fn parse_answer(text: &str) -> Result<Vec<TranslationResult>, OracleError> {
    let value: Value = serde_json::from_str(strip_code_fence(text))?;
    let Value::Array(items) = value else {
        return Err(OracleError::Schema("expected a JSON array of translations".to_string()));
    };

    let mut results = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<TranslationResult>(item) {
            Ok(result) if result.english_name.trim().is_empty() => {}
            Ok(result) if is_failed_answer(&result.english_name) => {
                debug!(
                    "Dropping placeholder answer for {}: {}",
                    result.native_name, result.english_name
                );
            }
            Ok(result) => results.push(result),
            Err(e) => debug!("Dropping malformed translation entry: {}", e),
        }
    }
    Ok(results)
}

/// Models sometimes wrap JSON in a markdown fence despite the MIME type.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_string_contains, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    // ==================== Helper Functions ====================

    fn task(native: &str, hint: &str) -> TranslationTask {
        TranslationTask {
            native_name: native.to_string(),
            hint_name: hint.to_string(),
        }
    }

    fn poland() -> TranslationContext {
        TranslationContext::new("Poland", Some("Polish"))
    }

    fn test_oracle(server: &MockServer) -> GeminiOracle {
        GeminiOracle::new(
            "test-gemini-key",
            "gemini-test",
            &format!("{}/v1beta/models/", server.uri()),
            Duration::from_secs(5),
        )
        .expect("Should build client")
        .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(10)))
    }

    /// Wrap answer text in a Gemini response envelope
    fn gemini_response(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [
                {
                    "content": {"role": "model", "parts": [{"text": text}]},
                    "finishReason": "STOP"
                }
            ],
            "usageMetadata": {"promptTokenCount": 100, "candidatesTokenCount": 50}
        })
    }

    // ==================== Prompt Tests ====================

    #[test]
    fn test_prompt_contains_context_and_data() {
        let prompt = build_prompt(&[task("华沙大学", "Uniwersytet Warszawski")], &poland())
            .expect("Should build");

        assert!(prompt.contains("universities in Poland"));
        assert!(prompt.contains("(in Polish)"));
        assert!(prompt.contains(r#""chinese_name":"华沙大学""#));
        assert!(prompt.contains(r#""original_name":"Uniwersytet Warszawski""#));
        assert!(prompt.contains("JSON array"));
    }

    #[test]
    fn test_prompt_without_language_hint() {
        let prompt = build_prompt(&[task("甲", "")], &TranslationContext::new("Fiji", None))
            .expect("Should build");
        assert!(prompt.contains("(likely in the local language)"));
    }

    // ==================== Answer Parsing Tests ====================

    #[test]
    fn test_parse_answer_array() {
        let results =
            parse_answer(r#"[{"chinese_name": "甲", "english_name": "Alpha University"}]"#)
                .expect("Should parse");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].native_name, "甲");
        assert_eq!(results[0].english_name, "Alpha University");
    }

    #[test]
    fn test_parse_answer_drops_placeholders_and_malformed() {
        let results = parse_answer(
            r#"[
                {"chinese_name": "甲", "english_name": "Alpha University"},
                {"chinese_name": "乙", "english_name": "Unknown"},
                {"chinese_name": "丙", "english_name": "N/A"},
                {"chinese_name": "丁", "english_name": "Error: cannot translate"},
                {"chinese_name": "戊", "english_name": ""},
                {"chinese_name": "己"},
                {"chinese_name": "庚", "english_name": 12},
                "garbage"
            ]"#,
        )
        .expect("Should parse");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].native_name, "甲");
    }

    #[test]
    fn test_parse_answer_rejects_non_array() {
        let err = parse_answer(r#"{"list": []}"#).expect_err("Should fail");
        assert!(matches!(err, OracleError::Schema(_)));
    }

    #[test]
    fn test_parse_answer_rejects_invalid_json() {
        let err = parse_answer("Sure! Here are the names").expect_err("Should fail");
        assert!(matches!(err, OracleError::Parse(_)));
    }

    #[test]
    fn test_parse_answer_strips_code_fence() {
        let answer = "```json\n[{\"chinese_name\": \"甲\", \"english_name\": \"Alpha\"}]\n```";
        let results = parse_answer(answer).expect("Should parse");
        assert_eq!(results.len(), 1);
    }

    // ==================== HTTP Tests with Wiremock ====================

    #[tokio::test]
    async fn test_translate_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "test-gemini-key"))
            .and(body_string_contains("application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_response(
                r#"[{"chinese_name": "华沙大学", "english_name": "University of Warsaw"}]"#,
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let oracle = test_oracle(&mock_server);
        let results = oracle
            .translate(&[task("华沙大学", "Uniwersytet Warszawski")], &poland())
            .await
            .expect("Should succeed");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].english_name, "University of Warsaw");
    }

    #[tokio::test]
    async fn test_translate_empty_batch_makes_no_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&mock_server)
            .await;

        let oracle = test_oracle(&mock_server);
        let results = oracle.translate(&[], &poland()).await.expect("Should succeed");
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_translate_retries_server_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let oracle = test_oracle(&mock_server);
        let err = oracle
            .translate(&[task("甲", "")], &poland())
            .await
            .expect_err("Should fail");

        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_translate_does_not_retry_client_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("API key not valid"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let oracle = test_oracle(&mock_server);
        let err = oracle
            .translate(&[task("甲", "")], &poland())
            .await
            .expect_err("Should fail");

        assert!(matches!(err, OracleError::Status { .. }));
        assert!(err.to_string().contains("API key not valid"));
    }

    #[tokio::test]
    async fn test_translate_empty_candidates_is_schema_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})),
            )
            .mount(&mock_server)
            .await;

        let oracle = test_oracle(&mock_server);
        let err = oracle
            .translate(&[task("甲", "")], &poland())
            .await
            .expect_err("Should fail");

        assert!(matches!(err, OracleError::Schema(_)));
    }

    #[test]
    fn test_from_config_without_key_is_none() {
        let config = Config::from_lookup(|_| None).expect("Should build");
        assert!(GeminiOracle::from_config(&config).expect("Should build").is_none());
    }
}
