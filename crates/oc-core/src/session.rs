//! Per-process session context.
//!
//! Owned by the shell or the benchmark runner and passed to the lifecycle
//! manager and preset selector. Nothing here is persisted except through the
//! config store.

use crate::lifecycle::LoadState;

#[derive(Debug, Clone, Default)]
pub struct Session {
    load_state: LoadState,
    preset_override: Option<String>,
    active_preset: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub(crate) fn set_load_state(&mut self, state: LoadState) {
        self.load_state = state;
    }

    /// Model this session believes is resident.
    pub fn loaded_model(&self) -> Option<&str> {
        self.load_state.loaded_model()
    }

    pub fn preset_override(&self) -> Option<&str> {
        self.preset_override.as_deref()
    }

    pub fn set_preset_override(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.active_preset = Some(name.clone());
        self.preset_override = Some(name);
    }

    /// Return to per-request auto detection.
    pub fn clear_preset_override(&mut self) {
        self.preset_override = None;
    }

    pub fn active_preset(&self) -> Option<&str> {
        self.active_preset.as_deref()
    }

    pub fn set_active_preset(&mut self, name: impl Into<String>) {
        self.active_preset = Some(name.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_lifecycle() {
        let mut session = Session::new();
        assert_eq!(session.preset_override(), None);

        session.set_preset_override("coding");
        assert_eq!(session.preset_override(), Some("coding"));
        assert_eq!(session.active_preset(), Some("coding"));

        session.clear_preset_override();
        assert_eq!(session.preset_override(), None);
        // the last applied preset is still what the config holds
        assert_eq!(session.active_preset(), Some("coding"));
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut a = Session::new();
        let b = Session::new();
        a.set_load_state(LoadState::Loaded("llama3:8b".into()));
        assert_eq!(a.loaded_model(), Some("llama3:8b"));
        assert_eq!(b.loaded_model(), None);
        assert_eq!(b.load_state(), &LoadState::Unknown);
    }
}
