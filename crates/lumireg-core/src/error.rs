//! Domain error taxonomy.
//!
//! Every failure that can abort a change operation is enumerated here with a
//! stable machine-readable code. All failures inside a transactional
//! operation roll back the entire transaction; only
//! [`Error::TransactionConflict`] is transient and worth retrying from a
//! fresh read.

use crate::model::RunNumber;

/// Domain failures surfaced by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Mutations must be attributable; the request carried no actor.
    #[error("every change must be attributable: supply a non-empty actor")]
    MissingActor,

    /// Differential update received sequences of different lengths.
    #[error("slice sequence length mismatch: previous has {previous}, observed has {observed}")]
    LengthMismatch {
        /// Length of the previously reconstructed sequence.
        previous: usize,
        /// Length of the newly observed sequence.
        observed: usize,
    },

    /// A concurrent writer won the transaction race.
    #[error("write conflict on run {run} dataset '{dataset}' (attempted version {version})")]
    TransactionConflict {
        /// Run the losing transaction targeted.
        run: RunNumber,
        /// Dataset the losing transaction targeted.
        dataset: String,
        /// The version the losing transaction had allocated.
        version: i64,
    },

    /// Interning a document failed even after retrying against the winner.
    #[error("document intern failed for {content_hash}")]
    DocumentInternFailed {
        /// Content hash of the document that could not be interned.
        content_hash: String,
    },

    /// Creating a run that is already stored.
    #[error("run {run} already exists")]
    RunExists {
        /// The duplicate run number.
        run: RunNumber,
    },

    /// Addressing a run that is not stored.
    #[error("run {run} not found")]
    RunNotFound {
        /// The missing run number.
        run: RunNumber,
    },

    /// A lifecycle operation requires the run to be OPEN.
    #[error("run {run} must be OPEN, current state is {state}")]
    RunNotOpen {
        /// The run addressed.
        run: RunNumber,
        /// Its current lifecycle state.
        state: String,
    },

    /// The requested lifecycle transition is not allowed.
    #[error("invalid state transition for run {run}: '{from}' -> '{to}'")]
    InvalidStateTransition {
        /// The run addressed.
        run: RunNumber,
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },

    /// Marking a run significant twice.
    #[error("run {run} is already marked significant")]
    AlreadySignificant {
        /// The run addressed.
        run: RunNumber,
    },

    /// Sign-off requires every component verdict to be filled in.
    #[error("cannot sign off run {run}: '{attribute}' has no recorded value")]
    IncompleteSignoff {
        /// The run addressed.
        run: RunNumber,
        /// The component attribute missing a verdict.
        attribute: String,
    },
}

impl Error {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingActor => "E1001",
            Self::LengthMismatch { .. } => "E1002",
            Self::TransactionConflict { .. } => "E2001",
            Self::DocumentInternFailed { .. } => "E2002",
            Self::RunExists { .. } => "E3001",
            Self::RunNotFound { .. } => "E3002",
            Self::RunNotOpen { .. } => "E3003",
            Self::InvalidStateTransition { .. } => "E3004",
            Self::AlreadySignificant { .. } => "E3005",
            Self::IncompleteSignoff { .. } => "E3006",
        }
    }

    /// `true` for failures that a caller may retry from a fresh read.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransactionConflict { .. })
    }

    /// Optional remediation hint surfaced to operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingActor => Some("Resupply the request with a non-empty actor."),
            Self::TransactionConflict { .. } => {
                Some("Retry the whole operation from a fresh reconstruction.")
            }
            Self::RunNotOpen { .. } => Some("Only runs in state OPEN accept edits."),
            Self::InvalidStateTransition { .. } => {
                Some("Valid target states: OPEN, SIGNOFF, COMPLETED.")
            }
            Self::IncompleteSignoff { .. } => {
                Some("Fill in every component verdict before signing off.")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use std::collections::HashSet;

    fn all() -> Vec<Error> {
        vec![
            Error::MissingActor,
            Error::LengthMismatch {
                previous: 1,
                observed: 2,
            },
            Error::TransactionConflict {
                run: 1,
                dataset: "online".into(),
                version: 7,
            },
            Error::DocumentInternFailed {
                content_hash: "blake3:00".into(),
            },
            Error::RunExists { run: 1 },
            Error::RunNotFound { run: 1 },
            Error::RunNotOpen {
                run: 1,
                state: "SIGNOFF".into(),
            },
            Error::InvalidStateTransition {
                run: 1,
                from: "OPEN".into(),
                to: "CLOSED".into(),
            },
            Error::AlreadySignificant { run: 1 },
            Error::IncompleteSignoff {
                run: 1,
                attribute: "dt_status".into(),
            },
        ]
    }

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for err in all() {
            assert!(seen.insert(err.code()), "duplicate code {}", err.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for err in all() {
            let code = err.code();
            assert_eq!(code.len(), 5);
            assert!(code.starts_with('E'));
            assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn only_conflicts_are_transient() {
        for err in all() {
            assert_eq!(
                err.is_transient(),
                matches!(err, Error::TransactionConflict { .. })
            );
        }
    }

    #[test]
    fn messages_carry_context() {
        let err = Error::TransactionConflict {
            run: 323_471,
            dataset: "online".into(),
            version: 42,
        };
        let msg = err.to_string();
        assert!(msg.contains("323471"));
        assert!(msg.contains("online"));
        assert!(msg.contains("42"));
    }
}
