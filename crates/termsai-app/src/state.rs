use std::fmt;

use termsai_core::error::TermsError;
use termsai_core::types::Operation;

/// Lifecycle of the single generation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationState {
    #[default]
    Idle,
    Generating(Operation),
    Completed,
    Aborted,
    Filtered,
    Failed,
}

impl GenerationState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Generating(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Aborted | Self::Filtered | Self::Failed
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: GenerationState) -> bool {
        match (self, next) {
            (Self::Idle, Self::Generating(_)) => true,
            (Self::Generating(_), n) => n.is_terminal(),
            (s, Self::Idle) => s.is_terminal(),
            _ => false,
        }
    }

    /// Terminal state a session ends in when it fails with `err`.
    pub fn from_error(err: &TermsError) -> Self {
        match err {
            TermsError::Aborted => Self::Aborted,
            TermsError::ContentFiltered => Self::Filtered,
            _ => Self::Failed,
        }
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Generating(op) => write!(f, "generating({op})"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
            Self::Filtered => write!(f, "filtered"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TERMINALS: [GenerationState; 4] = [
        GenerationState::Completed,
        GenerationState::Aborted,
        GenerationState::Filtered,
        GenerationState::Failed,
    ];

    #[test]
    fn idle_only_starts_sessions() {
        let idle = GenerationState::Idle;
        assert!(idle.can_transition_to(GenerationState::Generating(Operation::Search)));
        for t in TERMINALS {
            assert!(!idle.can_transition_to(t));
        }
        assert!(!idle.can_transition_to(GenerationState::Idle));
    }

    #[test]
    fn generating_ends_in_a_terminal_state() {
        let g = GenerationState::Generating(Operation::Generate);
        for t in TERMINALS {
            assert!(g.can_transition_to(t));
        }
        assert!(!g.can_transition_to(GenerationState::Idle));
        assert!(!g.can_transition_to(GenerationState::Generating(Operation::Like)));
    }

    #[test]
    fn terminal_states_return_to_idle() {
        for t in TERMINALS {
            assert!(t.is_terminal());
            assert!(t.can_transition_to(GenerationState::Idle));
            assert!(!t.can_transition_to(GenerationState::Generating(Operation::Generate)));
        }
    }

    #[test]
    fn error_classification() {
        assert_eq!(GenerationState::from_error(&TermsError::Aborted), GenerationState::Aborted);
        assert_eq!(
            GenerationState::from_error(&TermsError::ContentFiltered),
            GenerationState::Filtered
        );
        assert_eq!(
            GenerationState::from_error(&TermsError::MalformedFrame("x".into())),
            GenerationState::Failed
        );
    }

    #[test]
    fn display() {
        assert_eq!(
            GenerationState::Generating(Operation::AddConcept).to_string(),
            "generating(add_concept)"
        );
        assert_eq!(GenerationState::Filtered.to_string(), "filtered");
    }
}
