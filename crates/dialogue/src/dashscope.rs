//! Client for the DashScope multimodal generation API.

use crate::{
    ContentItem, EndpointError, EndpointReply, ReasoningEndpoint, ReasoningModel, Role, Sampling,
    Turn,
};
use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DashScopeConfig {
    pub url: String,
    pub api_key: String,
    pub model: ReasoningModel,
    pub sampling: Sampling,
    pub timeout: Duration,
}

pub struct DashScopeEndpoint {
    config: DashScopeConfig,
    client: reqwest::Client,
}

impl DashScopeEndpoint {
    pub fn new(config: DashScopeConfig) -> Result<Self, EndpointError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EndpointError::Request(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn request_body(&self, turns: &[Turn]) -> Result<Value, EndpointError> {
        let mut messages = Vec::with_capacity(turns.len());
        for turn in turns {
            let content = turn
                .content
                .iter()
                .map(|item| match item {
                    ContentItem::Image { image } => {
                        inline_image(image).map(|uri| json!({ "image": uri }))
                    }
                    ContentItem::Text { text } => Ok(json!({ "text": text })),
                })
                .collect::<Result<Vec<_>, _>>()?;
            messages.push(json!({ "role": turn.role, "content": content }));
        }
        Ok(json!({
            "model": self.config.model.as_str(),
            "input": { "messages": messages },
            "parameters": self.config.sampling,
        }))
    }
}

#[async_trait]
impl ReasoningEndpoint for DashScopeEndpoint {
    async fn complete(&self, turns: &[Turn]) -> Result<EndpointReply, EndpointError> {
        let body = self.request_body(turns)?;
        let start = std::time::Instant::now();
        let resp = self
            .client
            .post(&self.config.url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EndpointError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| EndpointError::Transport(e.to_string()))?;
        tracing::debug!(
            status,
            model = %self.config.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "reasoning endpoint answered"
        );
        parse_response(status, &text)
    }
}

/// Remote and data references pass through; local files are inlined as data URIs.
pub(crate) fn inline_image(reference: &str) -> Result<String, EndpointError> {
    if reference.starts_with("http://")
        || reference.starts_with("https://")
        || reference.starts_with("data:")
    {
        return Ok(reference.to_string());
    }
    let path = Path::new(reference.strip_prefix("file://").unwrap_or(reference));
    let bytes = std::fs::read(path)
        .map_err(|e| EndpointError::Request(format!("reading {}: {e}", path.display())))?;
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "image/png",
    };
    Ok(format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    ))
}

/// Success: `output.choices[0].message` with string or item-list content.
/// Failure: `{code, message}` next to the HTTP status.
pub(crate) fn parse_response(status: u16, body: &str) -> Result<EndpointReply, EndpointError> {
    let value: Option<Value> = serde_json::from_str(body).ok();

    if !(200..300).contains(&status) {
        let field = |k: &str| {
            value
                .as_ref()
                .and_then(|v| v.get(k))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        return Err(EndpointError::Provider {
            status,
            code: field("code").unwrap_or_else(|| format!("HTTP{status}")),
            message: field("message").unwrap_or_else(|| body.trim().to_string()),
        });
    }

    let value = value.ok_or_else(|| EndpointError::Payload("body is not JSON".to_string()))?;
    let message = value
        .pointer("/output/choices/0/message")
        .ok_or_else(|| EndpointError::Payload("missing output.choices[0].message".to_string()))?;
    let role = match message.get("role").and_then(Value::as_str) {
        Some("user") => Role::User,
        Some("system") => Role::System,
        _ => Role::Assistant,
    };
    let text = match message.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|i| i.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return Err(EndpointError::Payload("message has no content".to_string())),
    };
    Ok(EndpointReply { role, text })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_DASHSCOPE_URL;
    use std::io::Write;

    #[test]
    fn list_content_is_joined() {
        let body = r#"{"output":{"choices":[{"message":{"role":"assistant","content":[{"text":"{\"robot_response\": \"hi\"}"}]}}]}}"#;
        let reply = parse_response(200, body).unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.text, r#"{"robot_response": "hi"}"#);
    }

    #[test]
    fn string_content_is_taken_verbatim() {
        let body = r#"{"output":{"choices":[{"message":{"role":"assistant","content":"plain"}}]}}"#;
        assert_eq!(parse_response(200, body).unwrap().text, "plain");
        assert!(matches!(
            parse_response(200, r#"{"output":{}}"#),
            Err(EndpointError::Payload(_))
        ));
    }

    #[test]
    fn provider_error_carries_code_and_message() {
        let body = r#"{"code":"InvalidApiKey","message":"Invalid API-key provided.","request_id":"x"}"#;
        assert_eq!(
            parse_response(401, body).unwrap_err(),
            EndpointError::Provider {
                status: 401,
                code: "InvalidApiKey".to_string(),
                message: "Invalid API-key provided.".to_string(),
            }
        );
        assert!(matches!(
            parse_response(502, "bad gateway"),
            Err(EndpointError::Provider { status: 502, .. })
        ));
    }

    #[test]
    fn local_images_become_data_uris() {
        let mut f = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        f.write_all(&[0xff, 0xd8, 0xff]).unwrap();
        let uri = inline_image(f.path().to_str().unwrap()).unwrap();
        assert_eq!(uri, "data:image/jpeg;base64,/9j/");
        assert_eq!(inline_image("https://x/y.png").unwrap(), "https://x/y.png");
        assert!(matches!(
            inline_image("/definitely/not/here.png"),
            Err(EndpointError::Request(_))
        ));
    }

    #[test]
    fn body_follows_model_sampling() {
        let ep = DashScopeEndpoint::new(DashScopeConfig {
            url: DEFAULT_DASHSCOPE_URL.to_string(),
            api_key: "k".to_string(),
            model: ReasoningModel::QwenVlChatV1,
            sampling: ReasoningModel::QwenVlChatV1.default_sampling(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        let body = ep
            .request_body(&[Turn::system("s"), Turn::assistant("a")])
            .unwrap();
        assert_eq!(body["model"], "qwen-vl-chat-v1");
        assert_eq!(body["parameters"]["top_k"], 100);
        assert_eq!(body["input"]["messages"][0]["role"], "system");
        assert_eq!(body["input"]["messages"][1]["content"][0]["text"], "a");
    }
}
