//! Transaction state machine: a pure decision layer (`decide`) plus the
//! effect-runner that drives one claimed row through it (`handlers`).
//! Everything else in this crate is a supporting concern the state machine
//! needs but doesn't own: vote tallying, the native-transfer fast path, and
//! the two external collaborators (`AccountLedger`, `ValidatorRegistry`)
//! consensus depends on without persisting itself.

pub mod decide;
pub mod effect;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod tally;
pub mod transfer;

pub use decide::{
    decide_accepted, decide_committing, decide_finalizing, decide_pending, decide_proposing, decide_revealing,
    decide_terminal, AcceptedDecision, FinalizingDecision, PendingDecision, ProposingDecision, ProposingOutcome,
    RevealingDecision, RevealingOutcome, TerminalDecision,
};
pub use effect::{BusChannel, Effect};
pub use error::ConsensusError;
pub use handlers::ConsensusEngine;
pub use registry::ValidatorRegistry;
pub use tally::{tally_votes, TallyResult};
pub use transfer::{execute_native_transfer, AccountLedger, LedgerError};
