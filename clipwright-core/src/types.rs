use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One collected unit of text. Always trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferItem(String);

impl BufferItem {
    /// Trims `raw` and returns `None` when nothing is left.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for BufferItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Collecting,
    AwaitingResponse,
    ResponseReady,
}

impl SessionState {
    pub fn label(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Collecting => "collecting",
            SessionState::AwaitingResponse => "awaiting response",
            SessionState::ResponseReady => "response ready",
        }
    }
}

/// Emission speed relative to the base interval.
///
/// Always within `[MIN, MAX]`; doubling/halving past a bound clamps.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SpeedMultiplier(f64);

impl SpeedMultiplier {
    pub const MIN: f64 = 0.125;
    pub const MAX: f64 = 64.0;
    pub const NORMAL: SpeedMultiplier = SpeedMultiplier(1.0);

    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::NORMAL;
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn doubled(self) -> Self {
        Self::new(self.0 * 2.0)
    }

    pub fn halved(self) -> Self {
        Self::new(self.0 / 2.0)
    }

    pub fn is_max(self) -> bool {
        self.0 >= Self::MAX
    }

    pub fn is_min(self) -> bool {
        self.0 <= Self::MIN
    }
}

impl Default for SpeedMultiplier {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for SpeedMultiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

/// Named, argument-less actions accepted by the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    StartCollecting,
    AddToBuffer,
    FinishCollecting,
    ClearBuffer,
    StartTypingMode,
    StopTypingMode,
    PasteResponse,
    TypeResponse,
    PauseTyping,
    StopTyping,
    IncreaseSpeed,
    DecreaseSpeed,
    ResetSpeed,
    ShowStatus,
    Exit,
}

impl Command {
    pub const ALL: [Command; 15] = [
        Command::StartCollecting,
        Command::AddToBuffer,
        Command::FinishCollecting,
        Command::ClearBuffer,
        Command::StartTypingMode,
        Command::StopTypingMode,
        Command::PasteResponse,
        Command::TypeResponse,
        Command::PauseTyping,
        Command::StopTyping,
        Command::IncreaseSpeed,
        Command::DecreaseSpeed,
        Command::ResetSpeed,
        Command::ShowStatus,
        Command::Exit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Command::StartCollecting => "start_collecting",
            Command::AddToBuffer => "add_to_buffer",
            Command::FinishCollecting => "finish_collecting",
            Command::ClearBuffer => "clear_buffer",
            Command::StartTypingMode => "start_typing_mode",
            Command::StopTypingMode => "stop_typing_mode",
            Command::PasteResponse => "paste_response",
            Command::TypeResponse => "type_response",
            Command::PauseTyping => "pause_typing",
            Command::StopTyping => "stop_typing",
            Command::IncreaseSpeed => "increase_speed",
            Command::DecreaseSpeed => "decrease_speed",
            Command::ResetSpeed => "reset_speed",
            Command::ShowStatus => "show_status",
            Command::Exit => "exit",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        Command::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| UnknownCommand(s.trim().to_string()))
    }
}
