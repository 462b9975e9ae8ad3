pub mod notify;

// The desktop backend needs a display server and input permissions, so it is
// opt-in and the workspace builds headless by default.
#[cfg(feature = "desktop")]
pub mod desktop;

pub use notify::StdoutNotifier;

#[cfg(feature = "desktop")]
pub use desktop::DesktopDriver;
