//! Stability and progress classification over successive transcripts.
//!
//! The target app never says "done". Completion is inferred from a sustained
//! absence of change, while a set of marker scans keeps visually stable but
//! still-active states (a steady "Thinking" banner, a spinner) from counting.

use crate::extractor::flatten_prompt;
use crate::node::UiNode;
use std::time::Duration;
use tracing::debug;

/// Streaming cursor glyph rendered at the end of text still being generated.
pub const STREAMING_CURSOR: char = '\u{258D}';

/// Transcript substrings that mean generation is still running.
pub const IN_PROGRESS_MARKERS: &[&str] = &["\u{258D}", "Thinking", "Searching", "browsing"];

/// Transcript substrings that suggest the app has finished and offers follow-ups.
pub const COMPLETION_MARKERS: &[&str] = &["Regenerate", "Continue generating"];

/// Node description substrings that mean a spinner or progress banner is visible.
pub const ACTIVITY_DESCRIPTIONS: &[&str] = &["loading", "thinking", "searching"];

/// Default number of consecutive stable ticks required before completing.
pub const DEFAULT_STABLE_CHECKS: u32 = 3;

/// Mutable per-interaction polling state. Dropped when the poll loop exits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollState {
    pub previous_text: String,
    pub stable_count: u32,
    pub total_wait: Duration,
    pub still_processing: bool,
}

/// Outcome of one tick, or of the whole loop once it has ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Complete,
    NoContent,
}

/// Decides when a generation has finished.
///
/// Implementations are stateless; everything they learn lives in `PollState`.
pub trait CompletionPolicy: Send + Sync {
    /// Feeds one tick's transcript and raw nodes into the state.
    fn observe(&self, state: &mut PollState, transcript: &str, nodes: &[UiNode]) -> Verdict;

    /// Like [`observe`](Self::observe), with the submitted prompt at hand.
    /// The orchestrator calls this one; policies that care about the echoed
    /// prompt override it.
    fn observe_reply(
        &self,
        state: &mut PollState,
        transcript: &str,
        _prompt: &str,
        nodes: &[UiNode],
    ) -> Verdict {
        self.observe(state, transcript, nodes)
    }

    /// Final verdict once polling stops, given the verdict of the last tick.
    fn conclude(&self, state: &PollState, last: Verdict) -> Verdict {
        if state.previous_text.is_empty() {
            Verdict::NoContent
        } else {
            last
        }
    }
}

/// Default heuristic: N identical ticks with no activity markers.
#[derive(Debug, Clone)]
pub struct StabilityClassifier {
    stable_checks: u32,
}

impl Default for StabilityClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_STABLE_CHECKS)
    }
}

impl StabilityClassifier {
    pub fn new(stable_checks: u32) -> Self {
        Self {
            stable_checks: stable_checks.max(1),
        }
    }

    pub fn stable_checks(&self) -> u32 {
        self.stable_checks
    }
}

impl CompletionPolicy for StabilityClassifier {
    fn observe(&self, state: &mut PollState, transcript: &str, nodes: &[UiNode]) -> Verdict {
        self.step(state, transcript, transcript, find_activity_node(nodes))
    }
}

impl StabilityClassifier {
    /// One tick. Stability is tracked on `transcript`; markers are looked up in
    /// `marker_text`.
    fn step(
        &self,
        state: &mut PollState,
        transcript: &str,
        marker_text: &str,
        active_node: Option<&UiNode>,
    ) -> Verdict {
        if transcript == state.previous_text {
            state.stable_count += 1;
        } else {
            state.stable_count = 0;
            state.previous_text = transcript.to_string();
        }

        let text_marker = has_in_progress_marker(marker_text);
        state.still_processing = text_marker || active_node.is_some();

        if text_marker {
            state.stable_count = 0;
            debug!(
                "[classifier] Still processing (text indicators): {}s",
                state.total_wait.as_secs()
            );
        }
        if let Some(node) = active_node {
            state.stable_count = 0;
            debug!(
                "[classifier] Processing indicator found: role={} desc={:?}",
                node.role, node.text
            );
        }

        // Marker-bearing ticks may count twice on top of an unchanged transcript.
        if !state.still_processing && has_completion_marker(marker_text) {
            state.stable_count += 1;
            debug!(
                "[classifier] Completion indicator found, stable count: {}",
                state.stable_count
            );
        }

        if state.stable_count >= self.stable_checks {
            Verdict::Complete
        } else {
            Verdict::Continue
        }
    }
}

pub fn has_in_progress_marker(transcript: &str) -> bool {
    IN_PROGRESS_MARKERS.iter().any(|m| transcript.contains(m))
}

pub fn has_completion_marker(transcript: &str) -> bool {
    COMPLETION_MARKERS.iter().any(|m| transcript.contains(m))
}

/// First node whose role or description signals ongoing activity.
pub fn find_activity_node(nodes: &[UiNode]) -> Option<&UiNode> {
    nodes.iter().find(|node| is_activity_node(node))
}

fn is_activity_node(node: &UiNode) -> bool {
    let role_active = node
        .role
        .as_platform_str()
        .to_lowercase()
        .contains("progress");
    let description = node.text.to_lowercase();
    role_active || ACTIVITY_DESCRIPTIONS.iter().any(|d| description.contains(d))
}

/// Stability policy that only looks for markers in what follows the prompt.
///
/// The web-search prompt itself mentions browsing and searching, so once it is
/// echoed into the conversation [`StabilityClassifier`] reads it as activity on
/// every tick. This policy skips the echoed prompt, both in the transcript and
/// among the raw nodes. Without a prompt it behaves like the plain classifier.
#[derive(Debug, Clone, Default)]
pub struct ReplyScopedClassifier {
    inner: StabilityClassifier,
}

impl ReplyScopedClassifier {
    pub fn new(stable_checks: u32) -> Self {
        Self {
            inner: StabilityClassifier::new(stable_checks),
        }
    }
}

impl CompletionPolicy for ReplyScopedClassifier {
    fn observe(&self, state: &mut PollState, transcript: &str, nodes: &[UiNode]) -> Verdict {
        self.inner.observe(state, transcript, nodes)
    }

    fn observe_reply(
        &self,
        state: &mut PollState,
        transcript: &str,
        prompt: &str,
        nodes: &[UiNode],
    ) -> Verdict {
        let flattened = flatten_prompt(prompt);
        let reply = reply_region(transcript, prompt, &flattened);
        let active_node = nodes.iter().find(|node| {
            !is_prompt_echo(node, prompt, &flattened) && is_activity_node(node)
        });
        self.inner.step(state, transcript, reply, active_node)
    }
}

/// Text after the echoed prompt, or the whole transcript when it is not there.
fn reply_region<'a>(transcript: &'a str, prompt: &str, flattened: &str) -> &'a str {
    [prompt, flattened]
        .into_iter()
        .filter(|anchor| !anchor.trim().is_empty())
        .find_map(|anchor| {
            transcript
                .find(anchor)
                .map(|start| &transcript[start + anchor.len()..])
        })
        .unwrap_or(transcript)
}

fn is_prompt_echo(node: &UiNode, prompt: &str, flattened: &str) -> bool {
    let text = node.text.trim();
    node.role.is_text() && !text.is_empty() && (prompt.contains(text) || flattened.contains(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeRole;

    fn tick(classifier: &StabilityClassifier, state: &mut PollState, text: &str) -> Verdict {
        classifier.observe(state, text, &[])
    }

    #[test]
    fn test_completes_after_exactly_stable_checks_identical_ticks() {
        let classifier = StabilityClassifier::new(3);
        let mut state = PollState::default();

        // First observation of the text is a change, not a stable tick.
        assert_eq!(tick(&classifier, &mut state, "hello"), Verdict::Continue);
        assert_eq!(tick(&classifier, &mut state, "hello"), Verdict::Continue);
        assert_eq!(tick(&classifier, &mut state, "hello"), Verdict::Continue);
        assert_eq!(state.stable_count, 2);
        assert_eq!(tick(&classifier, &mut state, "hello"), Verdict::Complete);
        assert_eq!(state.stable_count, 3);
    }

    #[test]
    fn test_text_change_resets_stable_count() {
        let classifier = StabilityClassifier::new(3);
        let mut state = PollState::default();
        tick(&classifier, &mut state, "par");
        tick(&classifier, &mut state, "par");
        assert_eq!(state.stable_count, 1);
        tick(&classifier, &mut state, "partial answer");
        assert_eq!(state.stable_count, 0);
        assert_eq!(state.previous_text, "partial answer");
    }

    #[test]
    fn test_streaming_cursor_resets_regardless_of_prior_state() {
        let classifier = StabilityClassifier::new(3);
        let mut state = PollState {
            previous_text: "answer\u{258D}".to_string(),
            stable_count: 2,
            ..Default::default()
        };
        assert_eq!(
            tick(&classifier, &mut state, "answer\u{258D}"),
            Verdict::Continue
        );
        assert_eq!(state.stable_count, 0);
        assert!(state.still_processing);
    }

    #[test]
    fn test_steady_thinking_banner_never_completes() {
        let classifier = StabilityClassifier::new(3);
        let mut state = PollState::default();
        for _ in 0..20 {
            assert_eq!(
                tick(&classifier, &mut state, "Question\nThinking"),
                Verdict::Continue
            );
        }
        assert_eq!(state.stable_count, 0);
    }

    #[test]
    fn test_progress_node_blocks_completion() {
        let classifier = StabilityClassifier::new(2);
        let mut state = PollState::default();
        let spinner = vec![UiNode::new(NodeRole::ProgressIndicator, "")];
        for _ in 0..5 {
            assert_eq!(
                classifier.observe(&mut state, "stable text", &spinner),
                Verdict::Continue
            );
        }
        assert!(state.still_processing);
    }

    #[test]
    fn test_loading_description_counts_as_activity() {
        let nodes = vec![UiNode::new(NodeRole::Group, "loading results")];
        assert!(find_activity_node(&nodes).is_some());
        let idle = vec![UiNode::new(NodeRole::Group, "Conversation")];
        assert!(find_activity_node(&idle).is_none());
    }

    #[test]
    fn test_other_progress_roles_are_detected() {
        let nodes = vec![UiNode::new(
            NodeRole::Other("AXLevelIndicatorprogress".to_string()),
            "",
        )];
        assert!(find_activity_node(&nodes).is_some());
    }

    #[test]
    fn test_completion_marker_double_counts_within_one_tick() {
        let classifier = StabilityClassifier::new(3);
        let mut state = PollState::default();
        tick(&classifier, &mut state, "Answer\nRegenerate");
        assert_eq!(state.stable_count, 1);
        // Unchanged text plus marker: +1 for stability, +1 for the marker.
        assert_eq!(
            tick(&classifier, &mut state, "Answer\nRegenerate"),
            Verdict::Complete
        );
        assert_eq!(state.stable_count, 3);
    }

    #[test]
    fn test_completion_marker_ignored_while_processing() {
        let classifier = StabilityClassifier::new(3);
        let mut state = PollState::default();
        tick(&classifier, &mut state, "Searching\nRegenerate");
        assert_eq!(state.stable_count, 0);
    }

    #[test]
    fn test_conclude_reports_no_content_for_empty_transcript() {
        let classifier = StabilityClassifier::default();
        let mut state = PollState::default();
        let last = tick(&classifier, &mut state, "");
        assert_eq!(classifier.conclude(&state, last), Verdict::NoContent);

        let mut state = PollState::default();
        let last = tick(&classifier, &mut state, "something");
        assert_eq!(classifier.conclude(&state, last), Verdict::Continue);
    }

    #[test]
    fn test_echoed_search_prompt_keeps_plain_classifier_busy() {
        let prompt = crate::interaction::search_prompt("rust news");
        let transcript = format!("{}\nRust 1.80 shipped LazyLock.", flatten_prompt(&prompt));
        let classifier = StabilityClassifier::new(2);
        let mut state = PollState::default();
        for _ in 0..10 {
            assert_eq!(
                classifier.observe_reply(&mut state, &transcript, &prompt, &[]),
                Verdict::Continue
            );
        }
        assert!(state.still_processing);
    }

    #[test]
    fn test_reply_scoped_ignores_markers_in_echoed_prompt() {
        let prompt = crate::interaction::search_prompt("rust news");
        let flat = flatten_prompt(&prompt);
        let transcript = format!("{flat}\nRust 1.80 shipped LazyLock.");
        let nodes = vec![UiNode::text(flat.clone())];
        let classifier = ReplyScopedClassifier::new(2);
        let mut state = PollState::default();

        assert_eq!(
            classifier.observe_reply(&mut state, &transcript, &prompt, &nodes),
            Verdict::Continue
        );
        assert_eq!(
            classifier.observe_reply(&mut state, &transcript, &prompt, &nodes),
            Verdict::Continue
        );
        assert_eq!(
            classifier.observe_reply(&mut state, &transcript, &prompt, &nodes),
            Verdict::Complete
        );
        assert!(!state.still_processing);
    }

    #[test]
    fn test_reply_scoped_still_sees_markers_after_prompt() {
        let prompt = crate::interaction::search_prompt("rust news");
        let transcript = format!("{}\nSearching the web", flatten_prompt(&prompt));
        let spinner = vec![UiNode::new(NodeRole::ProgressIndicator, "")];
        let classifier = ReplyScopedClassifier::new(2);
        let mut state = PollState::default();
        for _ in 0..5 {
            assert_eq!(
                classifier.observe_reply(&mut state, &transcript, &prompt, &[]),
                Verdict::Continue
            );
        }
        assert!(state.still_processing);

        let mut state = PollState::default();
        for _ in 0..5 {
            assert_eq!(
                classifier.observe_reply(&mut state, "Rust 1.80", &prompt, &spinner),
                Verdict::Continue
            );
        }
    }

    #[test]
    fn test_reply_scoped_without_visible_prompt_scans_everything() {
        let classifier = ReplyScopedClassifier::default();
        let mut state = PollState::default();
        for _ in 0..5 {
            assert_eq!(
                classifier.observe_reply(&mut state, "Thinking", "hello", &[]),
                Verdict::Continue
            );
        }
        assert_eq!(state.stable_count, 0);
    }

    #[test]
    fn test_zero_stable_checks_is_clamped() {
        assert_eq!(StabilityClassifier::new(0).stable_checks(), 1);
    }
}
