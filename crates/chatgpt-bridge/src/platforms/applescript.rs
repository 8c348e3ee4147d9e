//! macOS backend: System Events through `osascript`, clipboard through `arboard`.
//!
//! Snapshots are dumped by an AppleScript that prints one node per line as
//! `role\tx\ty\tw\th\ttext`, with backslash, tab and newline escaped inside
//! fields. Attributes the element does not expose are printed empty.

use super::{AppControl, ClickTarget, Keystroke, SnapshotSource};
use crate::errors::BridgeError;
use crate::node::{NodeRole, NodeScope, Point, Size, UiNode, WindowHandle};
use async_trait::async_trait;
use std::ffi::OsStr;
use sysinfo::{ProcessesToUpdate, System};
use tokio::process::Command;
use tracing::{debug, warn};

/// Escapes backslash, tab and line breaks so every node fits on one line.
const ESCAPE_HANDLER: &str = r#"on esc(t)
    set t to t as text
    set oldDelims to AppleScript's text item delimiters
    set AppleScript's text item delimiters to "\\"
    set parts to text items of t
    set AppleScript's text item delimiters to "\\\\"
    set t to parts as text
    set AppleScript's text item delimiters to tab
    set parts to text items of t
    set AppleScript's text item delimiters to "\\t"
    set t to parts as text
    set AppleScript's text item delimiters to linefeed
    set parts to text items of t
    set AppleScript's text item delimiters to "\\n"
    set t to parts as text
    set AppleScript's text item delimiters to return
    set parts to text items of t
    set AppleScript's text item delimiters to "\\n"
    set t to parts as text
    set AppleScript's text item delimiters to oldDelims
    return t
end esc"#;

pub struct AppleScriptDesktop {
    app_name: String,
}

impl AppleScriptDesktop {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    async fn run(&self, script: &str) -> Result<String, BridgeError> {
        let mut command = Command::new("osascript");
        for line in script.lines() {
            command.arg("-e").arg(line);
        }
        let output = command
            .output()
            .await
            .map_err(|e| BridgeError::Platform(format!("failed to spawn osascript: {e}")))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout)
                .trim_end_matches(['\n', '\r'])
                .to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(BridgeError::Platform(format!(
                "osascript exited with {}: {stderr}",
                output.status
            )))
        }
    }

    async fn system_events(&self, body: &str) -> Result<String, BridgeError> {
        let script = format!(
            "tell application \"System Events\"\ntell process \"{}\"\n{body}\nend tell\nend tell",
            escape_applescript(&self.app_name)
        );
        self.run(&script).await
    }
}

#[async_trait]
impl SnapshotSource for AppleScriptDesktop {
    async fn snapshot(
        &self,
        window: &WindowHandle,
        scope: NodeScope,
    ) -> Result<Vec<UiNode>, BridgeError> {
        let script = snapshot_script(&self.app_name, window.index, scope);
        let dump = self
            .run(&script)
            .await
            .map_err(|e| BridgeError::Scrape(e.to_string()))?;
        let nodes = parse_node_dump(&dump);
        debug!(
            "[applescript] {:?} snapshot returned {} nodes",
            scope,
            nodes.len()
        );
        Ok(nodes)
    }
}

#[async_trait]
impl AppControl for AppleScriptDesktop {
    async fn is_running(&self) -> Result<bool, BridgeError> {
        let name = self.app_name.clone();
        tokio::task::spawn_blocking(move || {
            let mut system = System::new();
            system.refresh_processes(ProcessesToUpdate::All, true);
            system
                .processes()
                .values()
                .any(|process| process.name() == OsStr::new(&name))
        })
        .await
        .map_err(|e| BridgeError::Platform(format!("process lookup task failed: {e}")))
    }

    async fn activate(&self) -> Result<(), BridgeError> {
        let script = format!(
            "tell application \"{}\" to activate",
            escape_applescript(&self.app_name)
        );
        self.run(&script)
            .await
            .map(|_| ())
            .map_err(|e| BridgeError::Access(format!("could not activate {}: {e}", self.app_name)))
    }

    async fn front_window(&self) -> Result<Option<WindowHandle>, BridgeError> {
        let count = self.system_events("return (count of windows) as text").await?;
        let count: u32 = count.trim().parse().unwrap_or(0);
        Ok((count > 0).then(|| WindowHandle::front(&self.app_name)))
    }

    async fn read_clipboard(&self) -> Result<String, BridgeError> {
        tokio::task::spawn_blocking(|| {
            let mut clipboard = arboard::Clipboard::new()
                .map_err(|e| BridgeError::Injection(format!("clipboard unavailable: {e}")))?;
            clipboard_text(clipboard.get_text())
        })
        .await
        .map_err(|e| BridgeError::Platform(format!("clipboard task failed: {e}")))?
    }

    async fn write_clipboard(&self, text: &str) -> Result<(), BridgeError> {
        let text = text.to_string();
        tokio::task::spawn_blocking(move || {
            let mut clipboard = arboard::Clipboard::new()
                .map_err(|e| BridgeError::Injection(format!("clipboard unavailable: {e}")))?;
            clipboard
                .set_text(text)
                .map_err(|e| BridgeError::Injection(format!("clipboard write failed: {e}")))
        })
        .await
        .map_err(|e| BridgeError::Platform(format!("clipboard task failed: {e}")))?
    }

    async fn send_keystroke(&self, keystroke: Keystroke) -> Result<(), BridgeError> {
        self.system_events(keystroke_script(keystroke))
            .await
            .map(|_| ())
            .map_err(|e| BridgeError::Injection(format!("{keystroke:?} keystroke failed: {e}")))
    }

    async fn click(
        &self,
        window: &WindowHandle,
        target: &ClickTarget,
    ) -> Result<bool, BridgeError> {
        let result = self.system_events(&click_script(window.index, target)).await?;
        Ok(result.trim() == "true")
    }
}

/// Escapes a value for use inside an AppleScript string literal.
pub fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn keystroke_script(keystroke: Keystroke) -> &'static str {
    match keystroke {
        Keystroke::SelectAll => "keystroke \"a\" using {command down}",
        Keystroke::Delete => "key code 51",
        Keystroke::Paste => "keystroke \"v\" using {command down}",
        Keystroke::Submit => "keystroke return",
    }
}

fn click_script(window_index: u32, target: &ClickTarget) -> String {
    match target {
        ClickTarget::SidebarButton(label) => format!(
            "try\nclick button \"{}\" of group 1 of group 1 of window {window_index}\nreturn \"true\"\non error\nreturn \"false\"\nend try",
            escape_applescript(label)
        ),
        ClickTarget::ButtonNamed(label) => format!(
            "repeat with btn in (buttons of window {window_index})\ntry\nif name of btn is \"{}\" then\nclick btn\nreturn \"true\"\nend if\nend try\nend repeat\nreturn \"false\"",
            escape_applescript(label)
        ),
        ClickTarget::Described(label) => format!(
            "repeat with elem in (entire contents of window {window_index})\ntry\nif description of elem is \"{}\" then\nclick elem\nreturn \"true\"\nend if\nend try\nend repeat\nreturn \"false\"",
            escape_applescript(label)
        ),
    }
}

/// AppleScript expression selecting the elements of `scope`.
fn scope_elements(window_index: u32, scope: NodeScope) -> String {
    match scope {
        NodeScope::Conversation => format!(
            "set frontWin to window {window_index}\n\
             set targetElements to missing value\n\
             try\n\
             repeat with g in (groups of frontWin)\n\
             try\n\
             if (count of (UI elements of g whose role is \"AXStaticText\")) > 3 then\n\
             set targetElements to entire contents of g\n\
             exit repeat\n\
             end if\n\
             end try\n\
             end repeat\n\
             end try\n\
             if targetElements is missing value then set targetElements to entire contents of frontWin"
        ),
        NodeScope::Sidebar => format!(
            "set targetElements to UI elements of group 1 of group 1 of window {window_index}"
        ),
        NodeScope::TopLevel => {
            format!("set targetElements to UI elements of window {window_index}")
        }
    }
}

fn snapshot_script(app_name: &str, window_index: u32, scope: NodeScope) -> String {
    format!(
        "{ESCAPE_HANDLER}\n\
         tell application \"System Events\"\n\
         tell process \"{app}\"\n\
         {elements}\n\
         set output to {{}}\n\
         repeat with e in targetElements\n\
         set r to \"\"\n\
         set d to \"\"\n\
         set px to \"\"\n\
         set py to \"\"\n\
         set sw to \"\"\n\
         set sh to \"\"\n\
         try\n\
         set r to role of e\n\
         end try\n\
         try\n\
         set d to description of e\n\
         end try\n\
         if d is missing value then set d to \"\"\n\
         if d is \"\" then\n\
         try\n\
         set d to name of e\n\
         end try\n\
         if d is missing value then set d to \"\"\n\
         end if\n\
         try\n\
         set p to position of e\n\
         set px to (item 1 of p) as text\n\
         set py to (item 2 of p) as text\n\
         end try\n\
         try\n\
         set s to size of e\n\
         set sw to (item 1 of s) as text\n\
         set sh to (item 2 of s) as text\n\
         end try\n\
         set end of output to (my esc(r)) & tab & px & tab & py & tab & sw & tab & sh & tab & (my esc(d))\n\
         end repeat\n\
         set AppleScript's text item delimiters to linefeed\n\
         return output as text\n\
         end tell\n\
         end tell",
        app = escape_applescript(app_name),
        elements = scope_elements(window_index, scope),
    )
}

/// Parses the snapshot dump. Malformed lines are skipped.
pub fn parse_node_dump(dump: &str) -> Vec<UiNode> {
    dump.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let node = parse_node_line(line);
            if node.is_none() {
                warn!("[applescript] Skipping malformed node line: {:?}", line);
            }
            node
        })
        .collect()
}

fn parse_node_line(line: &str) -> Option<UiNode> {
    let fields: Vec<&str> = line.splitn(6, '\t').collect();
    if fields.len() != 6 {
        return None;
    }
    let role = NodeRole::from_platform(&unescape_field(fields[0]));
    let position = match (parse_coord(fields[1]), parse_coord(fields[2])) {
        (Some(x), Some(y)) => Some(Point { x, y }),
        _ => None,
    };
    let size = match (parse_coord(fields[3]), parse_coord(fields[4])) {
        (Some(width), Some(height)) => Some(Size { width, height }),
        _ => None,
    };
    Some(UiNode {
        role,
        text: unescape_field(fields[5]),
        position,
        size,
    })
}

/// AppleScript prints reals with the locale's decimal separator.
fn parse_coord(field: &str) -> Option<f64> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    field.replace(',', ".").parse().ok()
}

fn unescape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Maps a clipboard read. Non-text content can only be restored as empty text.
fn clipboard_text(read: Result<String, arboard::Error>) -> Result<String, BridgeError> {
    match read {
        Ok(text) => Ok(text),
        Err(arboard::Error::ContentNotAvailable) => {
            warn!("[applescript] Clipboard holds no text; it will be restored as empty");
            Ok(String::new())
        }
        Err(e) => Err(BridgeError::Injection(format!("clipboard read failed: {e}"))),
    }
}
