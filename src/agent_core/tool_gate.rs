//! Decides whether the tool catalog is offered on the first model call.

use serde::Deserialize;

use super::conversation::Conversation;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOffering {
    /// Every request gets the catalog.
    #[default]
    Always,
    /// Only requests whose latest user message mentions a keyword.
    Keywords,
}

#[derive(Debug, Clone)]
pub struct ToolGate {
    offering: ToolOffering,
    keywords: Vec<String>,
}

impl ToolGate {
    pub fn new(offering: ToolOffering, keywords: &[String]) -> Self {
        Self {
            offering,
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn always() -> Self {
        Self::new(ToolOffering::Always, &[])
    }

    pub fn should_offer(&self, conversation: &Conversation) -> bool {
        match self.offering {
            ToolOffering::Always => true,
            ToolOffering::Keywords => {
                let Some(text) = conversation.last_user_text() else {
                    return false;
                };
                let text = text.to_lowercase();
                self.keywords.iter().any(|k| text.contains(k.as_str()))
            }
        }
    }
}
