//! Pool readiness state.

use std::fmt;

/// Readiness of the single logical pool.
///
/// Only the lifecycle module changes this value. Valid transitions are
/// `Initializing -> Available`, `Initializing -> Unavailable`, and
/// `Available | Unavailable -> Initializing` on restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolReadiness {
    /// The primitive is being (re)initialized; the pool must not be touched.
    Initializing,
    /// The pool accepts acquisitions.
    Available,
    /// The last initialization failed; acquisitions skip the pool.
    Unavailable,
}

impl PoolReadiness {
    /// Lowercase name used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Available => "available",
            Self::Unavailable => "unavailable",
        }
    }

    /// Whether acquisitions may be issued against the pool primitive.
    #[must_use]
    pub fn accepts_acquisitions(self) -> bool {
        self == Self::Available
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Initializing, Self::Available)
                | (Self::Initializing, Self::Unavailable)
                | (_, Self::Initializing)
        )
    }
}

impl fmt::Display for PoolReadiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_available_accepts_acquisitions() {
        assert!(PoolReadiness::Available.accepts_acquisitions());
        assert!(!PoolReadiness::Initializing.accepts_acquisitions());
        assert!(!PoolReadiness::Unavailable.accepts_acquisitions());
    }

    #[test]
    fn test_transitions() {
        use PoolReadiness::*;

        assert!(Initializing.can_transition_to(Available));
        assert!(Initializing.can_transition_to(Unavailable));
        assert!(Available.can_transition_to(Initializing));
        assert!(Unavailable.can_transition_to(Initializing));

        // Settling always goes through Initializing.
        assert!(!Available.can_transition_to(Unavailable));
        assert!(!Unavailable.can_transition_to(Available));
    }

    #[test]
    fn test_display() {
        assert_eq!(PoolReadiness::Unavailable.to_string(), "unavailable");
    }
}
