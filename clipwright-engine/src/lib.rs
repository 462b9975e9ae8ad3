pub mod buffer;
pub mod capture;
pub mod controller;
pub mod emitter;
pub mod monitor;
pub mod session;
pub mod traits;

mod sync;

#[cfg(test)]
mod testing;

pub use buffer::{AppendOutcome, BufferStore};
pub use capture::{CaptureCommit, CaptureError, InputCapture};
pub use controller::{ControllerConfig, SessionController};
pub use emitter::{EmissionOutcome, EmitterError, StopStatus, TypingEmitter, TypingStatus};
pub use monitor::ClipboardMonitor;
pub use session::{Accepted, CaptureStatus, CommandOutcome, Rejected, SessionStatus};
