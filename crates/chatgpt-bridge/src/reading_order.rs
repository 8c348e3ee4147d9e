//! Rebuilds top-to-bottom, left-to-right reading order from an unordered snapshot.

use crate::node::{Point, UiNode};

/// Labels of buttons and banners that render as text but are not conversation content.
pub const CHROME_LABELS: &[&str] = &[
    "New chat",
    "Regenerate",
    "Regenerate response",
    "Continue generating",
];

/// Returns true when `text` is exactly one of the known chrome labels.
pub fn is_chrome_label(text: &str) -> bool {
    let trimmed = text.trim();
    CHROME_LABELS.iter().any(|label| *label == trimmed)
}

/// Orders the text fragments of a snapshot.
///
/// Only static text contributes. Empty fragments and chrome labels are dropped.
/// Fragments with a usable position come first, sorted by `y` then `x`;
/// fragments without one follow in source order.
pub fn reading_order(nodes: &[UiNode]) -> Vec<String> {
    let mut positioned: Vec<(Point, &str)> = Vec::new();
    let mut unpositioned: Vec<&str> = Vec::new();

    for node in nodes {
        if !node.role.is_text() || node.text.is_empty() || is_chrome_label(&node.text) {
            continue;
        }
        match node.layout_position() {
            Some(point) => insert_sorted(&mut positioned, point, &node.text),
            None => unpositioned.push(&node.text),
        }
    }

    positioned
        .into_iter()
        .map(|(_, text)| text)
        .chain(unpositioned)
        .map(str::to_string)
        .collect()
}

/// Joins the ordered fragments into the working transcript.
pub fn transcript(nodes: &[UiNode]) -> String {
    reading_order(nodes).join("\n")
}

/// Insertion sort step: places the fragment after every entry it does not precede.
fn insert_sorted<'a>(sorted: &mut Vec<(Point, &'a str)>, point: Point, text: &'a str) {
    let index = sorted
        .iter()
        .position(|(existing, _)| precedes(point, *existing))
        .unwrap_or(sorted.len());
    sorted.insert(index, (point, text));
}

fn precedes(a: Point, b: Point) -> bool {
    a.y < b.y || (a.y == b.y && a.x < b.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeRole;

    fn scattered() -> Vec<UiNode> {
        vec![
            UiNode::text_at("second line right", 300.0, 200.0),
            UiNode::text("footnote"),
            UiNode::text_at("first line", 40.0, 100.0),
            UiNode::text_at("second line left", 40.0, 200.0),
            UiNode::text_at("Regenerate", 40.0, 400.0),
            UiNode::text_at("", 40.0, 500.0),
            UiNode::text_at("third line", 40.0, 300.0),
            UiNode::text("trailer"),
        ]
    }

    #[test]
    fn test_orders_by_vertical_then_horizontal() {
        let ordered = reading_order(&scattered());
        assert_eq!(
            ordered,
            vec![
                "first line",
                "second line left",
                "second line right",
                "third line",
                "footnote",
                "trailer",
            ]
        );
    }

    #[test]
    fn test_reconstruction_is_deterministic() {
        let nodes = scattered();
        let first = reading_order(&nodes);
        for _ in 0..5 {
            assert_eq!(reading_order(&nodes), first);
        }
    }

    #[test]
    fn test_positioned_pairs_respect_ordering_key() {
        let nodes: Vec<UiNode> = (0..40)
            .map(|i| {
                let x = ((i * 37) % 11 + 1) as f64 * 10.0;
                let y = ((i * 53) % 7 + 1) as f64 * 25.0;
                UiNode::text_at(format!("{x}:{y}:{i}"), x, y)
            })
            .collect();
        let ordered = reading_order(&nodes);
        let coords: Vec<(f64, f64)> = ordered
            .iter()
            .map(|t| {
                let mut parts = t.split(':');
                let x: f64 = parts.next().unwrap().parse().unwrap();
                let y: f64 = parts.next().unwrap().parse().unwrap();
                (x, y)
            })
            .collect();
        for pair in coords.windows(2) {
            let (ax, ay) = pair[0];
            let (bx, by) = pair[1];
            assert!(ay < by || (ay == by && ax <= bx), "{pair:?} out of order");
        }
    }

    #[test]
    fn test_chrome_labels_never_survive_as_fragments() {
        let mut nodes: Vec<UiNode> = CHROME_LABELS
            .iter()
            .enumerate()
            .map(|(i, label)| UiNode::text_at(*label, 10.0, 10.0 + i as f64))
            .collect();
        nodes.push(UiNode::text(" New chat "));
        nodes.push(UiNode::text_at("Real answer", 10.0, 50.0));

        let ordered = reading_order(&nodes);
        assert_eq!(ordered, vec!["Real answer"]);
    }

    #[test]
    fn test_non_positive_positions_are_treated_as_unpositioned() {
        let nodes = vec![
            UiNode::text_at("offscreen", 0.0, 0.0),
            UiNode::text_at("visible", 20.0, 20.0),
        ];
        assert_eq!(reading_order(&nodes), vec!["visible", "offscreen"]);
    }

    #[test]
    fn test_only_static_text_contributes() {
        let nodes = vec![
            UiNode::new(NodeRole::Button, "Send").with_position(5.0, 5.0),
            UiNode::text_at("hello", 5.0, 10.0),
        ];
        assert_eq!(transcript(&nodes), "hello");
    }

    #[test]
    fn test_transcript_joins_with_single_newline() {
        let nodes = vec![
            UiNode::text_at("What is 2+2?", 10.0, 10.0),
            UiNode::text_at("4.", 10.0, 40.0),
        ];
        assert_eq!(transcript(&nodes), "What is 2+2?\n4.");
    }

    #[test]
    fn test_empty_snapshot_gives_empty_transcript() {
        assert_eq!(transcript(&[]), "");
    }
}
