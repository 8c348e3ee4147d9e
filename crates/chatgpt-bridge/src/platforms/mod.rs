//! Platform capabilities the engine needs from the desktop.
//!
//! The rest of the crate only sees these traits. How a snapshot is taken or a
//! keystroke is sent stays behind them.

use crate::errors::BridgeError;
use crate::node::{NodeScope, UiNode, WindowHandle};
use async_trait::async_trait;

pub mod applescript;
#[cfg(any(test, feature = "test-support"))]
pub mod scripted;

pub use applescript::AppleScriptDesktop;
#[cfg(any(test, feature = "test-support"))]
pub use scripted::{DesktopAction, ScriptedDesktop};

/// Keyboard actions used while injecting a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keystroke {
    /// Select everything in the focused input (cmd+a).
    SelectAll,
    /// Delete the selection.
    Delete,
    /// Paste the clipboard (cmd+v).
    Paste,
    /// Submit the input (return).
    Submit,
}

/// Element to click, located inside a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickTarget {
    /// Button in the conversation sidebar whose name is exactly this label.
    SidebarButton(String),
    /// Button anywhere in the window whose name is exactly this label.
    ButtonNamed(String),
    /// Any element whose accessible description is exactly this label.
    Described(String),
}

/// Read-only view of the accessibility tree.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Flat node list for `scope` of `window`. Missing attributes come back as
    /// `None`; they never fail the whole call.
    async fn snapshot(
        &self,
        window: &WindowHandle,
        scope: NodeScope,
    ) -> Result<Vec<UiNode>, BridgeError>;
}

/// Process, clipboard and input control of the target application.
#[async_trait]
pub trait AppControl: Send + Sync {
    async fn is_running(&self) -> Result<bool, BridgeError>;

    /// Brings the app to the front, launching it when needed.
    async fn activate(&self) -> Result<(), BridgeError>;

    /// The frontmost window of the app, if it has one.
    async fn front_window(&self) -> Result<Option<WindowHandle>, BridgeError>;

    async fn read_clipboard(&self) -> Result<String, BridgeError>;

    async fn write_clipboard(&self, text: &str) -> Result<(), BridgeError>;

    async fn send_keystroke(&self, keystroke: Keystroke) -> Result<(), BridgeError>;

    /// Clicks the first element matching `target`. `Ok(false)` when none matched.
    async fn click(&self, window: &WindowHandle, target: &ClickTarget)
        -> Result<bool, BridgeError>;
}

/// Everything the orchestrator drives.
pub trait ChatDesktop: SnapshotSource + AppControl {}

impl<T: SnapshotSource + AppControl> ChatDesktop for T {}
