use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of a text body or image caption, in characters.
pub const MAX_TEXT_LEN: usize = 4000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    #[serde(flatten)]
    pub content: MessageContent,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Message payload, tagged by `type` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Voice {
        audio_storage_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u32>,
    },
    Image {
        image_storage_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Voice,
    Image,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Voice => "voice",
            MessageKind::Image => "image",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(MessageKind::Text),
            "voice" => Some(MessageKind::Voice),
            "image" => Some(MessageKind::Image),
            _ => None,
        }
    }
}

impl MessageContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageContent::Text { .. } => MessageKind::Text,
            MessageContent::Voice { .. } => MessageKind::Voice,
            MessageContent::Image { .. } => MessageKind::Image,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            MessageContent::Text { text } => Some(text),
            MessageContent::Image { text, .. } => text.as_deref(),
            MessageContent::Voice { .. } => None,
        }
    }

    /// Checks the shape rules a payload must satisfy before it is stored.
    pub fn validate(&self) -> Result<(), String> {
        let text_ok = |t: &str| {
            let len = t.chars().count();
            !t.trim().is_empty() && len <= MAX_TEXT_LEN
        };
        match self {
            MessageContent::Text { text } if !text_ok(text) => {
                Err(format!("text must be 1..={MAX_TEXT_LEN} characters"))
            }
            MessageContent::Voice { audio_storage_id, .. } if audio_storage_id.trim().is_empty() => {
                Err("audio_storage_id is required for voice messages".to_string())
            }
            MessageContent::Image { image_storage_id, .. } if image_storage_id.trim().is_empty() => {
                Err("image_storage_id is required for image messages".to_string())
            }
            MessageContent::Image { text: Some(caption), .. } if !text_ok(caption) => {
                Err(format!("caption must be 1..={MAX_TEXT_LEN} characters"))
            }
            _ => Ok(()),
        }
    }
}

/// A message as submitted, before an id and timestamp are assigned.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub content: MessageContent,
}

impl Message {
    pub fn from_new(new: NewMessage, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id: new.conversation_id,
            from_user_id: new.from_user_id,
            to_user_id: new.to_user_id,
            content: new.content,
            created_at,
            read_at: None,
        }
    }
}

/// Result of marking a conversation read for one reader.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MarkReadOutcome {
    pub updated: usize,
    pub read_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub message_ids: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_is_tagged_by_type() {
        let msg = Message::from_new(
            NewMessage {
                conversation_id: Uuid::new_v4(),
                from_user_id: Uuid::new_v4(),
                to_user_id: Uuid::new_v4(),
                content: MessageContent::Voice {
                    audio_storage_id: "blob-1".into(),
                    duration_ms: Some(3200),
                },
            },
            Utc::now(),
        );
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], json!("voice"));
        assert_eq!(value["audio_storage_id"], json!("blob-1"));
        assert_eq!(value["read_at"], json!(null));

        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn validation_rejects_empty_and_oversized_text() {
        assert!(MessageContent::Text { text: "   ".into() }.validate().is_err());
        assert!(MessageContent::Text {
            text: "x".repeat(MAX_TEXT_LEN + 1)
        }
        .validate()
        .is_err());
        assert!(MessageContent::Text { text: "hi".into() }.validate().is_ok());
        assert!(MessageContent::Image {
            image_storage_id: "img".into(),
            text: None
        }
        .validate()
        .is_ok());
        assert!(MessageContent::Voice {
            audio_storage_id: "".into(),
            duration_ms: None
        }
        .validate()
        .is_err());
    }
}
