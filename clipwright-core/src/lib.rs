pub mod config;
pub mod keymap;
pub mod text;
pub mod types;

// Keep the public surface small and intentional.
pub use config::*;
pub use keymap::*;
pub use text::*;
pub use types::*;
