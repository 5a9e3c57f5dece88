/// Text-editing widget seam.
///
/// The widget itself lives outside the crate; the controller only reads
/// and replaces its contents. Change notifications are delivered by the
/// host calling [`SessionController::on_editor_change`](super::SessionController::on_editor_change).
pub trait CodeEditor: Send {
    /// Current text
    fn text(&self) -> String;

    /// Replace the whole text
    fn set_text(&mut self, text: &str);
}

/// In-memory editor for headless sessions and tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferEditor {
    text: String,
}

impl BufferEditor {
    /// Editor holding `text`
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl CodeEditor for BufferEditor {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: &str) {
        text.clone_into(&mut self.text);
    }
}
