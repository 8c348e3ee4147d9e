//! Accessibility node types shared by every platform backend.
//!
//! Nodes are produced fresh on every poll and carry no identity across polls;
//! the engine only ever compares the text they render.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Accessibility role of a node, normalised from the platform's role string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    StaticText,
    Button,
    Group,
    TextArea,
    ProgressIndicator,
    BusyIndicator,
    /// Any role the engine does not need to distinguish, kept verbatim.
    Other(String),
}

impl NodeRole {
    /// Maps a raw platform role (`AXStaticText`, `AXButton`, ...) onto a `NodeRole`.
    pub fn from_platform(raw: &str) -> Self {
        let trimmed = raw.trim();
        let bare = trimmed.strip_prefix("AX").unwrap_or(trimmed);
        match bare {
            "StaticText" => NodeRole::StaticText,
            "Button" => NodeRole::Button,
            "Group" => NodeRole::Group,
            "TextArea" | "TextField" => NodeRole::TextArea,
            "ProgressIndicator" => NodeRole::ProgressIndicator,
            "BusyIndicator" => NodeRole::BusyIndicator,
            _ => NodeRole::Other(trimmed.to_string()),
        }
    }

    /// Role name as the platform reports it.
    pub fn as_platform_str(&self) -> &str {
        match self {
            NodeRole::StaticText => "AXStaticText",
            NodeRole::Button => "AXButton",
            NodeRole::Group => "AXGroup",
            NodeRole::TextArea => "AXTextArea",
            NodeRole::ProgressIndicator => "AXProgressIndicator",
            NodeRole::BusyIndicator => "AXBusyIndicator",
            NodeRole::Other(raw) => raw,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, NodeRole::StaticText)
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_platform_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// One accessibility element as seen in a single snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiNode {
    pub role: NodeRole,
    /// Accessible description (falls back to the element name when empty).
    pub text: String,
    pub position: Option<Point>,
    pub size: Option<Size>,
}

impl UiNode {
    pub fn new(role: NodeRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            position: None,
            size: None,
        }
    }

    /// Static text node without geometry.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(NodeRole::StaticText, text)
    }

    /// Static text node at the given screen position.
    pub fn text_at(text: impl Into<String>, x: f64, y: f64) -> Self {
        Self::text(text).with_position(x, y)
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Point { x, y });
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.size = Some(Size { width, height });
        self
    }

    /// Position usable for reading order: both coordinates strictly positive.
    pub fn layout_position(&self) -> Option<Point> {
        self.position.filter(|p| p.x > 0.0 && p.y > 0.0)
    }
}

/// Which part of the front window a snapshot should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeScope {
    /// Every descendant of the conversation container, or of the whole window
    /// when no container can be identified.
    Conversation,
    /// Descendants of the conversation sidebar.
    Sidebar,
    /// Direct children of the window only.
    TopLevel,
}

/// Opaque reference to an application window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowHandle {
    pub app: String,
    /// 1-based window index as the platform counts it (1 = front window).
    pub index: u32,
}

impl WindowHandle {
    pub fn front(app: &str) -> Self {
        Self {
            app: app.to_string(),
            index: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_platform_strips_ax_prefix() {
        assert_eq!(NodeRole::from_platform("AXStaticText"), NodeRole::StaticText);
        assert_eq!(NodeRole::from_platform("AXButton"), NodeRole::Button);
        assert_eq!(
            NodeRole::from_platform("AXProgressIndicator"),
            NodeRole::ProgressIndicator
        );
        assert_eq!(
            NodeRole::from_platform("AXSplitter"),
            NodeRole::Other("AXSplitter".to_string())
        );
    }

    #[test]
    fn test_role_round_trips_platform_name() {
        let role = NodeRole::from_platform("AXBusyIndicator");
        assert_eq!(role.as_platform_str(), "AXBusyIndicator");
        assert_eq!(role.to_string(), "AXBusyIndicator");
    }

    #[test]
    fn test_layout_position_requires_positive_coordinates() {
        assert!(UiNode::text_at("a", 10.0, 20.0).layout_position().is_some());
        assert!(UiNode::text_at("a", 0.0, 20.0).layout_position().is_none());
        assert!(UiNode::text_at("a", 10.0, -1.0).layout_position().is_none());
        assert!(UiNode::text("a").layout_position().is_none());
    }
}
