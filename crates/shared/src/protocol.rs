use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// One decoded push frame from the feed stream.
///
/// `message` is markup rendered and escaped by the server. It is carried
/// verbatim and only ever inserted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub sender: String,
    pub message: String,
    pub preview: String,
    pub notify: bool,
}

impl StreamEvent {
    pub fn decode(data: &str) -> Result<Self, DecodeError> {
        if data.trim().is_empty() {
            return Err(DecodeError::Empty);
        }
        serde_json::from_str(data).map_err(DecodeError::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetNameForm {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageForm {
    pub contents: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_server_payload() {
        let data = r#"{"sender":"ana","message":"<p>hi</p>","preview":"hi","notify":true}"#;
        let event = StreamEvent::decode(data).expect("decode");
        assert_eq!(event.sender, "ana");
        assert_eq!(event.message, "<p>hi</p>");
        assert!(event.notify);
    }

    #[test]
    fn rejects_missing_fields_and_blank_frames() {
        assert!(matches!(
            StreamEvent::decode(r#"{"sender":"ana"}"#),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(StreamEvent::decode("\n"), Err(DecodeError::Empty)));
        assert!(StreamEvent::decode("keep-alive-text").is_err());
    }
}
