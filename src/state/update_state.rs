/// Per-extension update state definitions
///
/// One update walks `New | Existing -> Fetching -> Archiving -> Done`.
/// There are no retries and no backward edges.
use std::fmt;

/// Represents where a single extension update currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateState {
    // ===== Initial States =====
    /// No archive exists yet for this id
    New,

    /// A current archive exists and will be extended
    Existing,

    // ===== Active States =====
    /// Network retrievals are in progress
    Fetching,

    /// The extract-append-repack lifecycle is in progress
    Archiving,

    // ===== Terminal State =====
    /// The update finished, successfully or with recorded failures
    Done,
}

impl UpdateState {
    /// Picks the initial state from archive presence
    pub fn initial(archive_exists: bool) -> Self {
        if archive_exists {
            Self::Existing
        } else {
            Self::New
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if moving from `self` to `next` is a legal step
    pub fn can_transition_to(&self, next: UpdateState) -> bool {
        matches!(
            (self, next),
            (Self::New | Self::Existing, Self::Fetching)
                | (Self::Fetching, Self::Archiving)
                | (Self::Archiving, Self::Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Existing => "existing",
            Self::Fetching => "fetching",
            Self::Archiving => "archiving",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
