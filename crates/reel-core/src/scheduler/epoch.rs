use std::fmt;

/// Generation number of one polling run.
///
/// Every `start` hands out a strictly larger epoch; results tagged with an
/// older epoch belong to a run that was stopped or superseded and are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PollEpoch(u64);

impl PollEpoch {
    pub(super) fn after(prev: Option<PollEpoch>) -> Self {
        PollEpoch(prev.map_or(1, |p| p.0 + 1))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PollEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch#{}", self.0)
    }
}
