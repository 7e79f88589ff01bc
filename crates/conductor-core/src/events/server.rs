//! Events reported by the worker process.

use serde::{Deserialize, Serialize};

/// An activity record read from the worker's event stream.
///
/// The worker serializes these as JSON objects tagged by `type`. Types this
/// client does not know deserialize to [`ServerEvent::Unknown`] and are
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// The agent was given a task.
    Task { content: String },

    /// A model call started.
    ModelRequest,

    /// A model call finished.
    ModelResponse {
        thought: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
    },

    /// A tool finished and returned output.
    ToolResponse { content: String },

    /// The agent asked the user something and waits for an answer.
    UserRequest { content: String },

    /// The user answered.
    UserResponse { content: String },

    /// The user interrupted the agent.
    Interrupt { content: String },

    Error { content: String },

    RateLimit,

    /// The agent stopped working on the task.
    Stop,

    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_tagged_objects() {
        let events: Vec<ServerEvent> = serde_json::from_value(json!([
            {"type": "Task", "content": "add tests"},
            {"type": "ModelRequest"},
            {"type": "ModelResponse", "thought": "start with parser"},
            {"type": "ModelResponse", "thought": "run it", "action": "cargo test"},
            {"type": "RateLimit"},
        ]))
        .unwrap();

        assert_eq!(
            events,
            vec![
                ServerEvent::Task {
                    content: "add tests".to_string()
                },
                ServerEvent::ModelRequest,
                ServerEvent::ModelResponse {
                    thought: "start with parser".to_string(),
                    action: None,
                },
                ServerEvent::ModelResponse {
                    thought: "run it".to_string(),
                    action: Some("cargo test".to_string()),
                },
                ServerEvent::RateLimit,
            ]
        );
    }

    #[test]
    fn unknown_types_are_tolerated() {
        let event: ServerEvent =
            serde_json::from_value(json!({"type": "GitEvent", "content": "commit"})).unwrap();
        assert_eq!(event, ServerEvent::Unknown);
    }

    #[test]
    fn missing_tag_is_an_error() {
        let result = serde_json::from_value::<ServerEvent>(json!({"content": "x"}));
        assert!(result.is_err());
    }
}
