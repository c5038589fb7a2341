//! Action payload carried by a schedule. Opaque to the scheduler, parsed by the
//! executor when the schedule fires.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::{Platform, PostId};

/// Stored as a JSON string in the `schedules.action_data` column.
///
/// Written at schedule-creation time by the caller; parsed by the studio
/// executor when the dispatch loop fires the schedule. Generation actions use
/// the prompt fields; publish actions use `post_id` and `caption`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionData {
    /// Base generation prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Persona description prepended to the effective prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_context: Option<String>,
    /// Pool of alternative prompts; one is chosen uniformly at random when
    /// `use_custom_prompt` is set and the pool is non-empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_prompts: Vec<String>,
    #[serde(default)]
    pub use_custom_prompt: bool,
    /// Apply a mutation template to the resolved prompt before generation.
    #[serde(default)]
    pub mutate_prompt: bool,
    /// Generation model identifier, backend-specific.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Target platforms for publishing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<Platform>,
    /// Publish the generated post as soon as generation succeeds.
    #[serde(default)]
    pub auto_publish: bool,
    /// Mature-content flag; drives platform filtering at publish time.
    #[serde(default)]
    pub nsfw: bool,
    /// Existing post to publish. Required for publish actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<PostId>,
    /// Caption for the published post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl ActionData {
    /// Parse the raw JSON document stored on a schedule.
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_generation_payload() {
        let value = json!({
            "prompt": "sunset over the bay",
            "model_id": "flux-dev",
            "platforms": ["instagram", "x"],
            "auto_publish": true
        });
        let action = ActionData::from_value(&value).expect("parse failed");
        assert_eq!(action.prompt.as_deref(), Some("sunset over the bay"));
        assert_eq!(action.platforms, vec![Platform::Instagram, Platform::X]);
        assert!(action.auto_publish);
        assert!(!action.nsfw);
        assert!(action.post_id.is_none());
    }

    #[test]
    fn parse_publish_payload() {
        let value = json!({ "post_id": "p-1", "caption": "hello" });
        let action = ActionData::from_value(&value).expect("parse failed");
        assert_eq!(action.post_id, Some(PostId::from("p-1")));
        assert_eq!(action.caption.as_deref(), Some("hello"));
    }

    #[test]
    fn parse_empty_object_defaults() {
        let action = ActionData::from_value(&json!({})).expect("parse failed");
        assert!(action.prompt.is_none());
        assert!(action.custom_prompts.is_empty());
        assert!(!action.use_custom_prompt);
    }

    #[test]
    fn parse_unknown_platform_returns_err() {
        let value = json!({ "platforms": ["myspace"] });
        assert!(ActionData::from_value(&value).is_err());
    }
}
