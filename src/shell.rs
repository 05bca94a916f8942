//! Editor-facing output surface.
//!
//! Completion actions never talk to a concrete host; they go through
//! [`EditorShell`] so the same operations run under an editor plugin host,
//! the CLI, or a test harness.

use std::sync::Mutex;

/// The host surface an operation can touch when it completes: scratch views,
/// dialogs, and the status line.
pub trait EditorShell: Send + Sync {
    /// Open a new scratch view holding the given content.
    fn show_view(&self, title: &str, content: &str);

    /// Modal confirmation dialog.
    fn message_dialog(&self, message: &str);

    /// Modal error dialog.
    fn error_message(&self, message: &str);

    /// Transient status-line message.
    fn status_message(&self, message: &str);

    /// Close the view the user is currently editing.
    fn close_active_view(&self);
}

/// Shell for the CLI host: views go to stdout, everything else to tracing.
#[derive(Default)]
pub struct ConsoleShell;

impl EditorShell for ConsoleShell {
    fn show_view(&self, title: &str, content: &str) {
        println!("===== {} =====", title);
        println!("{}", content);
    }

    fn message_dialog(&self, message: &str) {
        tracing::info!("{}", message);
        println!("{}", message);
    }

    fn error_message(&self, message: &str) {
        tracing::error!("{}", message);
        eprintln!("Error: {}", message);
    }

    fn status_message(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn close_active_view(&self) {
        // Nothing to close outside an editor host.
    }
}

/// Recording shell for tests: every call is captured in order.
#[derive(Default)]
pub struct RecordingShell {
    pub events: Mutex<Vec<ShellEvent>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    View { title: String, content: String },
    Dialog(String),
    Error(String),
    Status(String),
    ViewClosed,
}

impl RecordingShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ShellEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ShellEvent::Error(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: ShellEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl EditorShell for RecordingShell {
    fn show_view(&self, title: &str, content: &str) {
        self.record(ShellEvent::View {
            title: title.to_string(),
            content: content.to_string(),
        });
    }

    fn message_dialog(&self, message: &str) {
        self.record(ShellEvent::Dialog(message.to_string()));
    }

    fn error_message(&self, message: &str) {
        self.record(ShellEvent::Error(message.to_string()));
    }

    fn status_message(&self, message: &str) {
        self.record(ShellEvent::Status(message.to_string()));
    }

    fn close_active_view(&self) {
        self.record(ShellEvent::ViewClosed);
    }
}
