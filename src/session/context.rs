/// Per-session attempt state: the open concept and whether help was used.
///
/// Owned and mutated only by the session controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    current: Option<String>,
    assistance_used: bool,
}

impl SessionContext {
    /// Empty context: nothing open, no assistance
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the open concept
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Whether help was used since the concept was loaded or reset
    #[must_use]
    pub const fn assistance_used(&self) -> bool {
        self.assistance_used
    }

    /// Open a concept. Assistance starts cleared.
    pub fn open(&mut self, concept_id: &str) {
        self.current = Some(concept_id.to_string());
        self.assistance_used = false;
    }

    /// Close the open concept.
    pub fn close(&mut self) {
        self.current = None;
        self.assistance_used = false;
    }

    /// Note that help was requested.
    ///
    /// Help on a concept that is already learned is not counted. Returns
    /// whether the flag is now set.
    pub fn flag_assistance(&mut self, already_learned: bool) -> bool {
        if !already_learned {
            self.assistance_used = true;
        }
        self.assistance_used
    }

    /// Clear the flag (reset code, unlearn).
    pub fn reset_assistance(&mut self) {
        self.assistance_used = false;
    }

    /// Read and clear the flag.
    pub fn take_assistance(&mut self) -> bool {
        std::mem::take(&mut self.assistance_used)
    }
}
