use crate::history::History;
use crate::reaper::Reaper;

/// Mutable state that lives for one interactive session.
///
/// Built-ins and the pipeline engine borrow what they need from here; nothing
/// is kept in process-wide globals.
#[derive(Debug, Default)]
pub struct Session {
    /// Lines entered so far, bounded by the configured capacity.
    pub history: History,
    /// Children started by this session and not collected yet.
    pub reaper: Reaper,
}

impl Session {
    pub fn new(history_size: usize) -> Self {
        Self {
            history: History::with_capacity(history_size),
            reaper: Reaper::new(),
        }
    }
}
