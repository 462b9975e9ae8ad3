use clipwright_core::text::preview_text;
use clipwright_core::types::{Command, SessionId, SessionState, SpeedMultiplier};
use serde::{Deserialize, Serialize};

use crate::emitter::{EmissionOutcome, TypingStatus};

const ITEM_PREVIEW_CHARS: usize = 80;
const RESPONSE_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accepted {
    pub command: Command,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{command} rejected: {reason}")]
pub struct Rejected {
    pub command: Command,
    pub reason: String,
}

pub type CommandOutcome = Result<Accepted, Rejected>;

pub(crate) fn accepted(command: Command, message: impl Into<String>) -> CommandOutcome {
    let message = message.into();
    log::info!("{command}: {message}");
    Ok(Accepted { command, message })
}

pub(crate) fn rejected(command: Command, reason: impl Into<String>) -> CommandOutcome {
    let reason = reason.into();
    log::warn!("{command} rejected: {reason}");
    Err(Rejected { command, reason })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStatus {
    pub active: bool,
    pub accumulated_chars: usize,
}

/// Read-only view of the session for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub state_label: String,
    /// Set while a collection session is open; cleared by `clear_buffer`.
    pub session_id: Option<SessionId>,
    pub running: bool,
    pub items: Vec<String>,
    pub response_available: bool,
    pub response_preview: Option<String>,
    pub capture: CaptureStatus,
    pub typing: TypingStatus,
    pub speed: SpeedMultiplier,
    pub chars_per_second: f64,
    pub last_error: Option<String>,
    pub available_commands: Vec<Command>,
}

impl SessionStatus {
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn preview_response(text: &str) -> String {
        preview_text(text, RESPONSE_PREVIEW_CHARS)
    }

    /// Multi-line human-readable report.
    pub fn render(&self) -> String {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        let mut out = Vec::new();

        out.push(format!("state: {}", self.state_label));
        if let Some(id) = &self.session_id {
            out.push(format!("session: {id}"));
        }
        if !self.running {
            out.push("session has exited".into());
        }
        out.push(format!("buffer items: {}", self.items.len()));
        out.push(format!("response ready: {}", yes_no(self.response_available)));
        out.push(format!("typing mode: {}", yes_no(self.capture.active)));
        if self.capture.active {
            out.push(format!("  captured so far: {} chars", self.capture.accumulated_chars));
        }

        let t = &self.typing;
        out.push(format!("typing in progress: {}", yes_no(t.active)));
        if t.active {
            out.push(format!(
                "  progress: {:.1}% ({}/{} chars)",
                t.progress_percent.unwrap_or(0.0),
                t.cursor,
                t.total
            ));
            out.push(format!("  paused: {}", yes_no(t.paused)));
        }
        match t.last_outcome {
            Some(EmissionOutcome::Completed { total }) if !t.active => {
                out.push(format!("last typing: completed ({total} chars)"));
            }
            Some(EmissionOutcome::Stopped { cursor, total }) if !t.active => {
                out.push(format!("last typing: stopped at {cursor}/{total}"));
            }
            _ => {}
        }
        out.push(format!(
            "speed: {} ({:.0} chars/sec)",
            self.speed, self.chars_per_second
        ));

        if let Some(err) = &self.last_error {
            out.push(format!("last error: {err}"));
        }

        if !self.items.is_empty() {
            out.push(String::new());
            out.push("buffer contents:".into());
            for (i, item) in self.items.iter().enumerate() {
                out.push(format!("  {}. {}", i + 1, preview_text(item, ITEM_PREVIEW_CHARS)));
            }
        }

        if let Some(preview) = &self.response_preview {
            out.push(String::new());
            out.push(format!("response: {preview}"));
        }

        out.push(String::new());
        let names: Vec<&str> = self.available_commands.iter().map(|c| c.as_str()).collect();
        out.push(format!("available: {}", names.join(", ")));

        out.join("\n")
    }
}
