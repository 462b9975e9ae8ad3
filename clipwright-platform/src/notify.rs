use clipwright_engine::traits::NotificationSink;

/// Prints notifications on stdout, next to the command replies.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutNotifier;

impl NotificationSink for StdoutNotifier {
    fn notify(&self, title: &str, message: &str) {
        println!("[{title}] {message}");
    }
}
