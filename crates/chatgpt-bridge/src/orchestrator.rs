//! Per-request lifecycle: access check, conversation setup, prompt injection,
//! polling and extraction.
//!
//! One [`Orchestrator::ask`] call drives the desktop from start to finish.
//! The clipboard and the frontmost window are process-wide, so callers must
//! not run two interactions against the same desktop at once.

use crate::classifier::{CompletionPolicy, PollState, StabilityClassifier, Verdict};
use crate::config::BridgeConfig;
use crate::errors::{truncate_prompt, BridgeError};
use crate::extractor::{extract_response, ExtractionInput};
use crate::interaction::{InteractionRequest, InteractionResult, RequestKind};
use crate::node::{NodeRole, NodeScope, UiNode, WindowHandle};
use crate::platforms::{ChatDesktop, ClickTarget, Keystroke};
use crate::reading_order;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Label of the affordance that starts a fresh conversation.
pub const NEW_CHAT_LABEL: &str = "New chat";

const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Lifecycle stages, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AccessCheck,
    SelectConversation,
    NewChat,
    InjectPrompt,
    PollLoop,
    Extract,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::AccessCheck => "ACCESS_CHECK",
            Stage::SelectConversation => "SELECT_CONVERSATION",
            Stage::NewChat => "NEW_CHAT",
            Stage::InjectPrompt => "INJECT_PROMPT",
            Stage::PollLoop => "POLL_LOOP",
            Stage::Extract => "EXTRACT",
            Stage::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Result of a single conversation-list scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationList {
    AppNotRunning,
    NoWindow,
    /// Titles in sidebar order; empty when the app shows no conversations.
    Found(Vec<String>),
}

pub struct Orchestrator {
    desktop: Arc<dyn ChatDesktop>,
    policy: Arc<dyn CompletionPolicy>,
    config: BridgeConfig,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Uses the default stability policy with `config.stable_checks`.
    pub fn new(desktop: Arc<dyn ChatDesktop>, config: BridgeConfig) -> Self {
        let policy = Arc::new(StabilityClassifier::new(config.stable_checks));
        Self {
            desktop,
            policy,
            config,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn CompletionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Sends `request.prompt` and waits for the answer.
    ///
    /// A timeout is not an error: the best partial answer comes back with
    /// `complete == false`. Access and injection failures are returned as
    /// errors wrapped with the operation name.
    pub async fn ask(&self, request: &InteractionRequest) -> Result<InteractionResult, BridgeError> {
        self.run(request)
            .await
            .map_err(|e| e.in_operation("ask", &request.prompt))
    }

    /// Wraps `query` in the web-search prompt and runs it. A new chat is
    /// started unless a conversation is named or the caller says otherwise.
    pub async fn search(
        &self,
        query: &str,
        conversation_id: Option<String>,
        start_new_chat: Option<bool>,
    ) -> Result<InteractionResult, BridgeError> {
        // Left unset, `should_start_new_chat` opens a fresh chat unless a
        // non-blank conversation id was given.
        let mut request = InteractionRequest::search(query);
        request.conversation_id = conversation_id;
        request.start_new_chat = start_new_chat;

        info!(
            "[orchestrator] Starting web search for {:?}, this may take several minutes",
            truncate_prompt(query)
        );
        let result = self
            .run(&request)
            .await
            .map_err(|e| e.in_operation("search", query))?;

        if result.text.contains("still searching") || result.text.contains("still in progress") {
            warn!("[orchestrator] Search may not have finished; returning what was available");
        } else {
            info!(
                "[orchestrator] Search finished ({} chars)",
                result.text.chars().count()
            );
        }
        Ok(result)
    }

    /// Single best-effort scrape of the conversation titles. Never polls.
    pub async fn list_conversations(&self) -> Result<ConversationList, BridgeError> {
        self.scrape_conversations()
            .await
            .map_err(|e| e.in_operation("get_conversations", ""))
    }

    async fn scrape_conversations(&self) -> Result<ConversationList, BridgeError> {
        if !self.desktop.is_running().await? {
            info!("[orchestrator] {} is not running", self.config.app_name);
            return Ok(ConversationList::AppNotRunning);
        }
        self.desktop.activate().await?;
        sleep(self.config.initial_delay).await;

        let Some(window) = self.desktop.front_window().await? else {
            return Ok(ConversationList::NoWindow);
        };

        let sidebar = self.desktop.snapshot(&window, NodeScope::Sidebar).await?;
        let mut titles = conversation_titles(&sidebar, true);
        if titles.is_empty() {
            debug!("[orchestrator] No sidebar buttons, falling back to top-level elements");
            let top_level = self.desktop.snapshot(&window, NodeScope::TopLevel).await?;
            titles = conversation_titles(&top_level, false);
        }
        info!("[orchestrator] Found {} conversation(s)", titles.len());
        Ok(ConversationList::Found(titles))
    }

    async fn run(&self, request: &InteractionRequest) -> Result<InteractionResult, BridgeError> {
        let kind = request.kind();
        info!(
            "[orchestrator] {} request: {:?}",
            kind.label(),
            truncate_prompt(&request.prompt)
        );

        enter(Stage::AccessCheck);
        let window = self.ensure_access().await?;

        if let Some(conversation_id) = request.conversation() {
            enter(Stage::SelectConversation);
            self.select_conversation(&window, conversation_id).await;
        }

        if request.should_start_new_chat() {
            enter(Stage::NewChat);
            self.start_new_chat(&window).await;
        }

        enter(Stage::InjectPrompt);
        let saved_clipboard = self.desktop.read_clipboard().await.map_err(as_injection)?;
        let outcome = self.inject_and_wait(&window, request, kind).await;
        if let Err(e) = self.desktop.write_clipboard(&saved_clipboard).await {
            warn!("[orchestrator] Failed to restore clipboard: {e}");
        }
        let (state, verdict) = outcome?;

        enter(Stage::Extract);
        let result = match verdict {
            Verdict::NoContent => InteractionResult::no_content(),
            verdict => {
                let extraction = extract_response(ExtractionInput {
                    transcript: &state.previous_text,
                    prompt: &request.prompt,
                    search_like: kind.is_search(),
                    still_processing: state.still_processing,
                });
                if !extraction.anchored {
                    debug!("[orchestrator] Prompt not found in transcript, returning full text");
                }
                InteractionResult {
                    text: extraction.text,
                    complete: verdict == Verdict::Complete,
                }
            }
        };
        enter(Stage::Done);
        Ok(result)
    }

    async fn ensure_access(&self) -> Result<WindowHandle, BridgeError> {
        let app = &self.config.app_name;
        let running = self.desktop.is_running().await.map_err(as_access)?;
        if !running {
            info!("[orchestrator] {app} is not running, launching");
            self.desktop.activate().await.map_err(as_access)?;
            sleep(self.config.launch_settle_delay).await;
        }

        self.desktop.activate().await.map_err(as_access)?;
        sleep(self.config.initial_delay).await;

        self.desktop
            .front_window()
            .await
            .map_err(as_access)?
            .ok_or_else(|| BridgeError::Access(format!("{app}: no window found")))
    }

    async fn select_conversation(&self, window: &WindowHandle, conversation_id: &str) {
        let target = ClickTarget::SidebarButton(conversation_id.to_string());
        match self.desktop.click(window, &target).await {
            Ok(true) => sleep(self.config.conversation_select_delay).await,
            Ok(false) => warn!("[orchestrator] Conversation {conversation_id:?} not found, staying in the current one"),
            Err(e) => warn!("[orchestrator] Could not select conversation {conversation_id:?}: {e}"),
        }
    }

    async fn start_new_chat(&self, window: &WindowHandle) {
        let targets = [
            ClickTarget::ButtonNamed(NEW_CHAT_LABEL.to_string()),
            ClickTarget::Described(NEW_CHAT_LABEL.to_string()),
        ];
        for target in &targets {
            match self.desktop.click(window, target).await {
                Ok(true) => {
                    sleep(self.config.new_chat_delay).await;
                    return;
                }
                Ok(false) => {}
                Err(e) => debug!("[orchestrator] New chat click {target:?} failed: {e}"),
            }
        }
        warn!("[orchestrator] Could not find a new chat button, continuing in the current chat");
    }

    async fn inject_and_wait(
        &self,
        window: &WindowHandle,
        request: &InteractionRequest,
        kind: RequestKind,
    ) -> Result<(PollState, Verdict), BridgeError> {
        self.inject(&request.prompt).await.map_err(as_injection)?;
        enter(Stage::PollLoop);
        Ok(self.poll(window, &request.prompt, kind).await)
    }

    async fn inject(&self, prompt: &str) -> Result<(), BridgeError> {
        self.desktop.write_clipboard(prompt).await?;
        self.desktop.send_keystroke(Keystroke::SelectAll).await?;
        self.desktop.send_keystroke(Keystroke::Delete).await?;
        sleep(self.config.clear_delay).await;
        self.desktop.send_keystroke(Keystroke::Paste).await?;
        sleep(self.config.typing_delay).await;
        self.desktop.send_keystroke(Keystroke::Submit).await
    }

    /// Polls until the policy reports completion or the kind's timeout runs out.
    async fn poll(
        &self,
        window: &WindowHandle,
        prompt: &str,
        kind: RequestKind,
    ) -> (PollState, Verdict) {
        let timeout = self.config.timeout_for(kind);
        let interval = self.config.check_interval.max(MIN_CHECK_INTERVAL);
        let mut state = PollState::default();
        let mut verdict = Verdict::Continue;
        let mut notice_logged = false;

        if kind.is_search() {
            sleep(self.config.search_grace_delay).await;
            state.total_wait += self.config.search_grace_delay;
        }

        while state.total_wait < timeout {
            sleep(interval).await;
            state.total_wait += interval;

            let nodes = match self.desktop.snapshot(window, NodeScope::Conversation).await {
                Ok(nodes) => nodes,
                Err(e) => {
                    warn!("[orchestrator] Snapshot failed, skipping tick: {e}");
                    continue;
                }
            };
            let transcript = reading_order::transcript(&nodes);
            verdict = self
                .policy
                .observe_reply(&mut state, &transcript, prompt, &nodes);
            if verdict == Verdict::Complete {
                debug!(
                    "[orchestrator] Response stable after {}s",
                    state.total_wait.as_secs()
                );
                break;
            }

            if kind.is_search()
                && state.still_processing
                && !notice_logged
                && state.total_wait >= self.config.search_progress_notice_after
            {
                info!(
                    "[orchestrator] Still searching after {}s; thinking models can take several minutes",
                    state.total_wait.as_secs()
                );
                notice_logged = true;
            }
        }

        if verdict != Verdict::Complete {
            warn!(
                "[orchestrator] Timed out after {}s, returning partial response",
                state.total_wait.as_secs()
            );
        }
        let verdict = self.policy.conclude(&state, verdict);
        (state, verdict)
    }
}

fn enter(stage: Stage) {
    debug!("[orchestrator] -> {stage}");
}

fn as_access(err: BridgeError) -> BridgeError {
    match err {
        BridgeError::Access(_) => err,
        other => BridgeError::Access(other.to_string()),
    }
}

fn as_injection(err: BridgeError) -> BridgeError {
    match err {
        BridgeError::Injection(_) => err,
        other => BridgeError::Injection(other.to_string()),
    }
}

/// Conversation titles from a scrape, skipping the new-chat affordance.
/// With `buttons_only`, only button nodes count.
fn conversation_titles(nodes: &[UiNode], buttons_only: bool) -> Vec<String> {
    nodes
        .iter()
        .filter(|node| !buttons_only || node.role == NodeRole::Button)
        .map(|node| node.text.trim())
        .filter(|title| !title.is_empty() && *title != NEW_CHAT_LABEL)
        .map(str::to_string)
        .collect()
}
