//! Maps a finished turn onto the external chat response shape.

use serde::{Deserialize, Serialize};

use crate::inference::types::Usage;

use super::orchestrator::TurnOutcome;
use super::types::ToolUsage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub usage: Usage,
    /// Empty when the model answered without tools.
    pub tools_used: Vec<ToolUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ChatResponse {
    pub fn compose(outcome: &TurnOutcome, session_id: Option<String>) -> Self {
        Self {
            content: outcome.content.clone(),
            model: outcome.model.clone(),
            usage: outcome.usage,
            tools_used: outcome.tool_results.iter().map(ToolUsage::from).collect(),
            session_id,
        }
    }
}
