use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_DASHSCOPE_URL: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/multimodal-generation/generation";

/// Vision-language models the endpoint is known to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReasoningModel {
    #[default]
    QwenVlMax,
    QwenVlPlus,
    QwenVlChatV1,
}

/// Nucleus / top-k sampling sent with each request.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sampling {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

impl ReasoningModel {
    pub const ALL: [ReasoningModel; 3] = [
        ReasoningModel::QwenVlMax,
        ReasoningModel::QwenVlPlus,
        ReasoningModel::QwenVlChatV1,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningModel::QwenVlMax => "qwen-vl-max",
            ReasoningModel::QwenVlPlus => "qwen-vl-plus",
            ReasoningModel::QwenVlChatV1 => "qwen-vl-chat-v1",
        }
    }

    pub fn default_sampling(self) -> Sampling {
        match self {
            ReasoningModel::QwenVlMax => Sampling::default(),
            ReasoningModel::QwenVlPlus => Sampling {
                top_p: Some(0.1),
                top_k: Some(10),
            },
            ReasoningModel::QwenVlChatV1 => Sampling {
                top_p: Some(0.9),
                top_k: Some(100),
            },
        }
    }
}

impl fmt::Display for ReasoningModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported model `{0}` (expected one of qwen-vl-max, qwen-vl-plus, qwen-vl-chat-v1)")]
pub struct UnknownModel(pub String);

impl FromStr for ReasoningModel {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReasoningModel::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| UnknownModel(s.to_string()))
    }
}

impl TryFrom<String> for ReasoningModel {
    type Error = UnknownModel;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReasoningModel> for String {
    fn from(m: ReasoningModel) -> Self {
        m.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_models_parse() {
        assert_eq!("qwen-vl-max".parse::<ReasoningModel>(), Ok(ReasoningModel::QwenVlMax));
        assert_eq!("qwen-vl-chat-v1".parse::<ReasoningModel>(), Ok(ReasoningModel::QwenVlChatV1));
        assert_eq!(
            "gpt-4o".parse::<ReasoningModel>(),
            Err(UnknownModel("gpt-4o".to_string()))
        );
    }

    #[test]
    fn serde_rejects_unknown() {
        let m: ReasoningModel = serde_json::from_str("\"qwen-vl-plus\"").unwrap();
        assert_eq!(m, ReasoningModel::QwenVlPlus);
        assert!(serde_json::from_str::<ReasoningModel>("\"llava\"").is_err());
        assert_eq!(ReasoningModel::QwenVlChatV1.default_sampling().top_k, Some(100));
    }
}
