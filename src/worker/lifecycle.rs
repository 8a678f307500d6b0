use std::fmt;

/// Where a worker generation is in its life.
///
/// ```text
/// Parsed ─▶ Installing ─▶ Installed ─▶ Activating ─▶ Activated
///              │              │             │             │
///              └──────────────┴─────────────┴─────────────┴──▶ Redundant
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Parsed,
    Installing,
    /// Installed and waiting to activate.
    Installed,
    Activating,
    Activated,
    /// Failed to install, or superseded by a newer generation. Terminal.
    Redundant,
}

impl LifecycleState {
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Parsed, Installing)
                | (Installing, Installed)
                | (Installed, Activating)
                | (Activating, Activated)
                | (Installing | Installed | Activating | Activated, Redundant)
        )
    }

    /// `true` once nothing further can happen to the worker.
    pub fn is_terminal(self) -> bool {
        self == LifecycleState::Redundant
    }

    /// `true` while the worker is between a successful install and the end
    /// of activation. Functional events wait this out.
    pub fn is_pending_activation(self) -> bool {
        matches!(self, LifecycleState::Installed | LifecycleState::Activating)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::LifecycleState::*;

    #[test]
    fn happy_path_is_allowed() {
        let path = [Parsed, Installing, Installed, Activating, Activated, Redundant];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn no_skipping_or_going_back() {
        assert!(!Parsed.can_transition_to(Activated));
        assert!(!Installing.can_transition_to(Activating));
        assert!(!Activated.can_transition_to(Installing));
        assert!(!Parsed.can_transition_to(Redundant));
    }

    #[test]
    fn redundant_is_terminal() {
        assert!(Redundant.is_terminal());
        for next in [Parsed, Installing, Installed, Activating, Activated, Redundant] {
            assert!(!Redundant.can_transition_to(next));
        }
    }
}
