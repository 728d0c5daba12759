//! In-memory indicator

use super::Indicator;

/// Records every `set` call in order
///
/// Used where no hardware exists and as a test double for the poll loop.
#[derive(Debug, Default, Clone)]
pub struct RecordingIndicator {
    calls: Vec<bool>,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[bool] {
        &self.calls
    }

    /// Current output, off until first set
    pub fn is_on(&self) -> bool {
        self.calls.last().copied().unwrap_or(false)
    }

    /// Number of completed on/off pulses
    pub fn pulses(&self) -> usize {
        self.calls.windows(2).filter(|w| w[0] && !w[1]).count()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl Indicator for RecordingIndicator {
    fn set(&mut self, on: bool) {
        self.calls.push(on);
    }
}
