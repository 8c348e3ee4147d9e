//! Remote control of the ChatGPT desktop app through its accessibility tree
//!
//! The engine injects a prompt, polls the rendered conversation until the
//! answer stops changing, and extracts only the newly generated text. The
//! desktop itself sits behind the [`ChatDesktop`] capability so the
//! reading-order, classification and extraction logic never depend on how
//! snapshots are taken.

pub mod classifier;
pub mod config;
pub mod errors;
pub mod extractor;
pub mod interaction;
pub mod node;
pub mod orchestrator;
pub mod platforms;
pub mod reading_order;

pub use classifier::{
    CompletionPolicy, PollState, ReplyScopedClassifier, StabilityClassifier, Verdict,
};
pub use config::BridgeConfig;
pub use errors::BridgeError;
pub use extractor::{extract_response, Extraction, ExtractionInput};
pub use interaction::{
    search_prompt, InteractionRequest, InteractionResult, RequestKind, NO_RESPONSE_MESSAGE,
};
pub use node::{NodeRole, NodeScope, Point, Size, UiNode, WindowHandle};
pub use orchestrator::{ConversationList, Orchestrator};
pub use platforms::{AppControl, AppleScriptDesktop, ChatDesktop, ClickTarget, Keystroke, SnapshotSource};
#[cfg(any(test, feature = "test-support"))]
pub use platforms::{DesktopAction, ScriptedDesktop};
pub use reading_order::{reading_order, transcript};
