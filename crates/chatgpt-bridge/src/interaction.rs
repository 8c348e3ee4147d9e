//! Request and result types for one prompt/answer round trip.

use serde::{Deserialize, Serialize};

/// Phrase that marks a prompt as a web-search request.
pub const SEARCH_PHRASE: &str = "search the web";

/// Returned instead of an answer when nothing could be scraped at all.
pub const NO_RESPONSE_MESSAGE: &str =
    "No response text found. ChatGPT may still be processing or encountered an error.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRequest {
    pub prompt: String,
    pub conversation_id: Option<String>,
    pub start_new_chat: Option<bool>,
}

impl InteractionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            conversation_id: None,
            start_new_chat: None,
        }
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_new_chat(mut self, start_new_chat: bool) -> Self {
        self.start_new_chat = Some(start_new_chat);
        self
    }

    /// Wraps a bare query in the prompt used for web-search requests.
    pub fn search(query: &str) -> Self {
        Self::new(search_prompt(query))
    }

    pub fn kind(&self) -> RequestKind {
        RequestKind::classify(&self.prompt)
    }

    /// Conversation id, ignoring empty strings.
    pub fn conversation(&self) -> Option<&str> {
        self.conversation_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }

    /// Explicit choice wins; otherwise search-like prompts outside a named
    /// conversation get a fresh chat.
    pub fn should_start_new_chat(&self) -> bool {
        self.start_new_chat
            .unwrap_or_else(|| self.kind().is_search() && self.conversation().is_none())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    Standard,
    Search,
}

impl RequestKind {
    /// Purely textual: any prompt mentioning the search phrase, in any case.
    pub fn classify(prompt: &str) -> Self {
        if prompt.to_lowercase().contains(SEARCH_PHRASE) {
            RequestKind::Search
        } else {
            RequestKind::Standard
        }
    }

    pub fn is_search(self) -> bool {
        matches!(self, RequestKind::Search)
    }

    pub fn label(self) -> &'static str {
        match self {
            RequestKind::Standard => "Standard Ask",
            RequestKind::Search => "Web Search",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionResult {
    pub text: String,
    /// False when polling ran out of time and `text` is a best-effort partial answer.
    pub complete: bool,
}

impl InteractionResult {
    pub fn no_content() -> Self {
        Self {
            text: NO_RESPONSE_MESSAGE.to_string(),
            complete: false,
        }
    }
}

pub fn search_prompt(query: &str) -> String {
    format!(
        "Please search the web for information about: {query}\n\n\
         Use your web browsing capability to find the most up-to-date and relevant information. \
         I need comprehensive results from searching the internet."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_phrase_is_case_insensitive() {
        assert_eq!(
            RequestKind::classify("Please SEARCH THE WEB for rust news"),
            RequestKind::Search
        );
        assert_eq!(RequestKind::classify("What is 2+2?"), RequestKind::Standard);
    }

    #[test]
    fn test_search_like_prompt_defaults_to_new_chat() {
        let request = InteractionRequest::new("search the web for today's weather");
        assert!(request.should_start_new_chat());
    }

    #[test]
    fn test_conversation_id_suppresses_implicit_new_chat() {
        let request =
            InteractionRequest::new("search the web for tides").with_conversation("Trip planning");
        assert!(!request.should_start_new_chat());
    }

    #[test]
    fn test_explicit_new_chat_wins() {
        let request = InteractionRequest::new("search the web for tides").with_new_chat(false);
        assert!(!request.should_start_new_chat());
        let request = InteractionRequest::new("hello").with_new_chat(true);
        assert!(request.should_start_new_chat());
    }

    #[test]
    fn test_blank_conversation_id_is_ignored() {
        let request = InteractionRequest::new("hello").with_conversation("  ");
        assert_eq!(request.conversation(), None);
    }

    #[test]
    fn test_search_wrapper_is_search_like() {
        let request = InteractionRequest::search("rust 2024 edition");
        assert!(request.kind().is_search());
        assert!(request.prompt.contains("rust 2024 edition"));
        assert!(request.prompt.contains("\n\nUse your web browsing capability"));
    }
}
