//! In-memory desktop that replays scripted snapshots and records every action.

use super::{AppControl, ClickTarget, Keystroke, SnapshotSource};
use crate::errors::BridgeError;
use crate::node::{NodeScope, UiNode, WindowHandle};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopAction {
    Activate,
    ReadClipboard,
    WriteClipboard(String),
    Keystroke(Keystroke),
    Click(ClickTarget),
    Snapshot(NodeScope),
}

#[derive(Debug, Default)]
struct ScriptState {
    running: bool,
    launchable: bool,
    has_window: bool,
    clipboard: String,
    frames: VecDeque<Vec<UiNode>>,
    last_frame: Vec<UiNode>,
    sidebar: Vec<UiNode>,
    top_level: Vec<UiNode>,
    clickable: Vec<ClickTarget>,
    fail_keystroke: Option<Keystroke>,
    fail_snapshot: bool,
    actions: Vec<DesktopAction>,
}

/// Replay desktop. Each conversation snapshot pops the next queued frame; once
/// the queue is empty the last frame repeats forever.
#[derive(Debug)]
pub struct ScriptedDesktop {
    state: Mutex<ScriptState>,
}

impl Default for ScriptedDesktop {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDesktop {
    /// A running app with one window and an empty clipboard.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptState {
                running: true,
                launchable: true,
                has_window: true,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn not_running(self) -> Self {
        self.lock().running = false;
        self
    }

    /// Activation fails while the app is not running.
    pub fn unlaunchable(self) -> Self {
        self.lock().launchable = false;
        self
    }

    pub fn without_window(self) -> Self {
        self.lock().has_window = false;
        self
    }

    pub fn with_clipboard(self, text: &str) -> Self {
        self.lock().clipboard = text.to_string();
        self
    }

    pub fn with_frames<I>(self, frames: I) -> Self
    where
        I: IntoIterator<Item = Vec<UiNode>>,
    {
        self.lock().frames.extend(frames);
        self
    }

    pub fn with_sidebar(self, nodes: Vec<UiNode>) -> Self {
        self.lock().sidebar = nodes;
        self
    }

    pub fn with_top_level(self, nodes: Vec<UiNode>) -> Self {
        self.lock().top_level = nodes;
        self
    }

    /// Makes `target` clickable; clicks on anything else report "not found".
    pub fn with_clickable(self, target: ClickTarget) -> Self {
        self.lock().clickable.push(target);
        self
    }

    pub fn failing_keystroke(self, keystroke: Keystroke) -> Self {
        self.lock().fail_keystroke = Some(keystroke);
        self
    }

    pub fn failing_snapshots(self) -> Self {
        self.lock().fail_snapshot = true;
        self
    }

    pub fn clipboard(&self) -> String {
        self.lock().clipboard.clone()
    }

    pub fn actions(&self) -> Vec<DesktopAction> {
        self.lock().actions.clone()
    }

    pub fn conversation_snapshots(&self) -> usize {
        self.lock()
            .actions
            .iter()
            .filter(|a| **a == DesktopAction::Snapshot(NodeScope::Conversation))
            .count()
    }

    pub fn clicked(&self) -> Vec<ClickTarget> {
        self.lock()
            .actions
            .iter()
            .filter_map(|a| match a {
                DesktopAction::Click(target) => Some(target.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SnapshotSource for ScriptedDesktop {
    async fn snapshot(
        &self,
        _window: &WindowHandle,
        scope: NodeScope,
    ) -> Result<Vec<UiNode>, BridgeError> {
        let mut state = self.lock();
        state.actions.push(DesktopAction::Snapshot(scope));
        if state.fail_snapshot {
            return Err(BridgeError::Scrape("scripted snapshot failure".into()));
        }
        let nodes = match scope {
            NodeScope::Conversation => {
                if let Some(frame) = state.frames.pop_front() {
                    state.last_frame = frame;
                }
                state.last_frame.clone()
            }
            NodeScope::Sidebar => state.sidebar.clone(),
            NodeScope::TopLevel => state.top_level.clone(),
        };
        Ok(nodes)
    }
}

#[async_trait]
impl AppControl for ScriptedDesktop {
    async fn is_running(&self) -> Result<bool, BridgeError> {
        Ok(self.lock().running)
    }

    async fn activate(&self) -> Result<(), BridgeError> {
        let mut state = self.lock();
        state.actions.push(DesktopAction::Activate);
        if state.running || state.launchable {
            state.running = true;
            Ok(())
        } else {
            Err(BridgeError::Access("scripted app cannot be launched".into()))
        }
    }

    async fn front_window(&self) -> Result<Option<WindowHandle>, BridgeError> {
        Ok(self.lock().has_window.then(|| WindowHandle::front("ChatGPT")))
    }

    async fn read_clipboard(&self) -> Result<String, BridgeError> {
        let mut state = self.lock();
        state.actions.push(DesktopAction::ReadClipboard);
        Ok(state.clipboard.clone())
    }

    async fn write_clipboard(&self, text: &str) -> Result<(), BridgeError> {
        let mut state = self.lock();
        state
            .actions
            .push(DesktopAction::WriteClipboard(text.to_string()));
        state.clipboard = text.to_string();
        Ok(())
    }

    async fn send_keystroke(&self, keystroke: Keystroke) -> Result<(), BridgeError> {
        let mut state = self.lock();
        state.actions.push(DesktopAction::Keystroke(keystroke));
        if state.fail_keystroke == Some(keystroke) {
            return Err(BridgeError::Injection(format!(
                "scripted {keystroke:?} failure"
            )));
        }
        Ok(())
    }

    async fn click(
        &self,
        _window: &WindowHandle,
        target: &ClickTarget,
    ) -> Result<bool, BridgeError> {
        let mut state = self.lock();
        state.actions.push(DesktopAction::Click(target.clone()));
        Ok(state.clickable.contains(target))
    }
}
