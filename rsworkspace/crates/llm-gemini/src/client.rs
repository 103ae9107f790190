use futures::StreamExt;
use llm_types::PromptRequest;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};

use crate::config::GeminiConfig;
use crate::error::GeminiError;

/// Header carrying the Gemini API key. Keeps the key out of URLs, and so out
/// of `reqwest` error text.
pub(crate) const API_KEY_HEADER: &str = "x-goog-api-key";

/// Thin Gemini REST client. Cheap to clone.
#[derive(Clone)]
pub struct GeminiClient {
    pub(crate) http: HttpClient,
    pub(crate) config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GeminiError> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Ask `model` to answer `request` and return the full text.
    ///
    /// Streams `streamGenerateContent` and accumulates every text part of the
    /// first candidate. A blocked prompt or candidate yields
    /// [`GeminiError::SafetyBlocked`]; a stream that ends without text yields
    /// [`GeminiError::EmptyResponse`].
    pub async fn generate(
        &self,
        api_key: &str,
        model: &str,
        request: &PromptRequest,
    ) -> Result<String, GeminiError> {
        let url = format!(
            "{}/models/{}:streamGenerateContent",
            self.config.api_base, model
        );
        let body = build_body(request);

        tracing::debug!(
            model,
            turns = request.turns.len(),
            "Sending streaming request to Gemini"
        );

        let resp = self
            .http
            .post(&url)
            .query(&[("alt", "sse")])
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message: error_message(&body_text),
            });
        }

        // Gemini SSE format (each event):
        //   data: {"candidates":[{"content":{"role":"model","parts":[{"text":"..."}]},...}],...}
        //
        // There is no "[DONE]" sentinel; the stream ends when the HTTP response ends.
        let mut stream = resp.bytes_stream();
        let mut line_buf: Vec<u8> = Vec::new();
        let mut accumulated = String::new();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| GeminiError::Stream(e.without_url().to_string()))?;
            line_buf.extend_from_slice(&bytes);

            for line in drain_lines(&mut line_buf) {
                apply_sse_line(&line, &mut accumulated)?;
            }
        }
        // Trailing event without a final newline.
        let rest = String::from_utf8_lossy(&line_buf);
        apply_sse_line(rest.trim_end_matches('\r'), &mut accumulated)?;

        if accumulated.trim().is_empty() {
            return Err(GeminiError::EmptyResponse);
        }

        tracing::debug!(chars = accumulated.len(), "Gemini stream complete");
        Ok(accumulated)
    }
}

/// Remove every complete line from `buf` and decode it.
///
/// Only whole lines are decoded, so a UTF-8 sequence split across network
/// chunks stays in `buf` until its remaining bytes arrive.
fn drain_lines(buf: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buf.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&line[..pos]);
        lines.push(text.trim_end_matches('\r').to_string());
    }
    lines
}

fn apply_sse_line(line: &str, accumulated: &mut String) -> Result<(), GeminiError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(());
    };
    match serde_json::from_str::<Value>(data.trim_start()) {
        Ok(event) => apply_stream_event(&event, accumulated),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping undecodable Gemini SSE event");
            Ok(())
        }
    }
}

/// Fold one decoded SSE event into `accumulated`.
pub fn apply_stream_event(event: &Value, accumulated: &mut String) -> Result<(), GeminiError> {
    if let Some(message) = event["error"]["message"].as_str() {
        let status = event["error"]["code"]
            .as_u64()
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(500);
        return Err(GeminiError::Api {
            status,
            message: message.to_string(),
        });
    }

    if event["promptFeedback"]["blockReason"].is_string() {
        return Err(GeminiError::SafetyBlocked);
    }

    let candidate = &event["candidates"][0];
    if candidate["finishReason"].as_str() == Some("SAFETY") {
        return Err(GeminiError::SafetyBlocked);
    }

    if let Some(parts) = candidate["content"]["parts"].as_array() {
        for text in parts.iter().filter_map(|p| p["text"].as_str()) {
            accumulated.push_str(text);
        }
    }
    Ok(())
}

/// Build the `streamGenerateContent` JSON body.
pub fn build_body(request: &PromptRequest) -> Value {
    let contents: Vec<Value> = request
        .turns
        .iter()
        .map(|turn| {
            json!({
                "role": turn.role.as_str(),
                "parts": [{"text": turn.text}],
            })
        })
        .collect();

    let mut body = json!({
        "contents": contents,
        "safetySettings": request.safety_settings,
        "generationConfig": {
            "maxOutputTokens": request.max_output_tokens,
        },
    });
    if let Some(system) = &request.system_instruction {
        body["systemInstruction"] = json!({
            "parts": [{"text": system}],
        });
    }
    body
}

/// Pull `error.message` out of a Gemini error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_types::{ConversationThread, Turn};

    #[test]
    fn body_carries_history_safety_and_token_cap() {
        let history = ConversationThread::from(vec![Turn::user("hi"), Turn::model("hello!")]);
        let req = PromptRequest::new(history, "and now?")
            .with_system_instruction("Be Taurus")
            .with_safety(false);
        let body = build_body(&req);

        assert_eq!(body["contents"].as_array().unwrap().len(), 3);
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "and now?");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be Taurus");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 750);
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
        assert_eq!(body["safetySettings"][0]["threshold"], "BLOCK_NONE");
    }

    #[test]
    fn body_without_system_instruction() {
        let body = build_body(&PromptRequest::new(ConversationThread::new(), "q"));
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn stream_event_accumulates_all_parts() {
        let mut acc = String::new();
        let ev = json!({"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]}}]});
        apply_stream_event(&ev, &mut acc).unwrap();
        let ev = json!({"candidates":[{"content":{"parts":[{"text":" world"}]},"finishReason":"STOP"}]});
        apply_stream_event(&ev, &mut acc).unwrap();
        assert_eq!(acc, "Hello world");
    }

    #[test]
    fn stream_event_safety_finish_reason() {
        let mut acc = String::new();
        let ev = json!({"candidates":[{"finishReason":"SAFETY"}]});
        assert!(matches!(
            apply_stream_event(&ev, &mut acc),
            Err(GeminiError::SafetyBlocked)
        ));
    }

    #[test]
    fn stream_event_blocked_prompt() {
        let mut acc = String::new();
        let ev = json!({"promptFeedback":{"blockReason":"SAFETY"}});
        assert!(matches!(
            apply_stream_event(&ev, &mut acc),
            Err(GeminiError::SafetyBlocked)
        ));
    }

    #[test]
    fn stream_event_error_object() {
        let mut acc = String::new();
        let ev = json!({"error":{"code":500,"message":"internal"}});
        match apply_stream_event(&ev, &mut acc) {
            Err(GeminiError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "internal");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn split_multibyte_char_survives_chunking() {
        let event = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"café\"}]}}]}\r\n";
        let bytes = event.as_bytes();
        let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut buf = Vec::new();
        buf.extend_from_slice(&bytes[..split]);
        assert!(drain_lines(&mut buf).is_empty());
        buf.extend_from_slice(&bytes[split..]);
        let lines = drain_lines(&mut buf);
        assert!(buf.is_empty());

        let mut acc = String::new();
        for line in &lines {
            apply_sse_line(line, &mut acc).unwrap();
        }
        assert_eq!(acc, "café");
    }

    #[test]
    fn drain_keeps_partial_line() {
        let mut buf = b"data: a\ndata: b\r\ndata: c".to_vec();
        assert_eq!(drain_lines(&mut buf), vec!["data: a", "data: b"]);
        assert_eq!(buf, b"data: c");
    }

    #[test]
    fn sse_line_ignores_non_data_lines() {
        let mut acc = String::new();
        apply_sse_line("", &mut acc).unwrap();
        apply_sse_line(": keep-alive", &mut acc).unwrap();
        apply_sse_line("data: not json", &mut acc).unwrap();
        assert!(acc.is_empty());
    }

    #[test]
    fn error_message_prefers_json_message() {
        assert_eq!(
            error_message(r#"{"error":{"code":400,"message":"User location is not supported"}}"#),
            "User location is not supported"
        );
        assert_eq!(error_message("plain text"), "plain text");
    }
}
