use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One item of a multimodal message: `{"image": ref}` or `{"text": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentItem {
    Image { image: String },
    Text { text: String },
}

impl ContentItem {
    pub fn image(reference: impl Into<String>) -> Self {
        ContentItem::Image {
            image: reference.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: Vec<ContentItem>,
}

impl Turn {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentItem::text(text)],
        }
    }

    /// User turn: the image goes first, then the instruction.
    pub fn user(image_ref: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentItem::image(image_ref), ContentItem::text(instruction)],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentItem::text(text)],
        }
    }

    /// All text items joined by newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ContentItem::Text { text } => Some(text.as_str()),
                ContentItem::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|c| match c {
            ContentItem::Image { image } => Some(image.as_str()),
            ContentItem::Text { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_turn_wire_shape() {
        let t = Turn::user("file:///tmp/rgb.png", "Can you give me the soda can?");
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "role": "user",
                "content": [
                    {"image": "file:///tmp/rgb.png"},
                    {"text": "Can you give me the soda can?"}
                ]
            })
        );
        let back: Turn = serde_json::from_value(v).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.images().collect::<Vec<_>>(), ["file:///tmp/rgb.png"]);
    }

    #[test]
    fn text_skips_images() {
        let t = Turn {
            role: Role::Assistant,
            content: vec![
                ContentItem::text("a"),
                ContentItem::image("x.png"),
                ContentItem::text("b"),
            ],
        };
        assert_eq!(t.text(), "a\nb");
    }
}
