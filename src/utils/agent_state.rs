/// Mutable per-agent bookkeeping shared between the handle and its processor
#[derive(Debug, Default)]
pub struct AgentState {
    stop_requested: bool,
    last_error: Option<String>,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn set_last_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
