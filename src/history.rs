use std::fmt;

/// Default number of lines a [`History`] keeps.
pub const DEFAULT_CAPACITY: usize = 100;

/// Ordered, bounded log of the command lines entered in a session.
///
/// Once full, further lines are silently not recorded; existing entries are
/// never evicted.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<String>,
    capacity: usize,
}

impl History {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    /// Appends `line` unless the log is full. Returns whether it was stored.
    pub fn record(&mut self, line: &str) -> bool {
        if self.entries.len() >= self.capacity {
            return false;
        }
        self.entries.push(line.to_string());
        true
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

/// One numbered line per entry, starting at 1.
impl fmt::Display for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.entries.iter().enumerate() {
            writeln!(f, "{}  {}", i + 1, line)?;
        }
        Ok(())
    }
}
