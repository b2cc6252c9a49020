//! Transactional order matching.
//!
//! The store is the single source of truth: every submit or cancel runs as
//! one database transaction that reserves funds, walks the opposite side of
//! the book under row locks in price-time priority, settles each fill
//! against the ledger, appends trades and commits — or rolls the whole thing
//! back. There is no in-process book state to drift.

mod engine;

pub use engine::{MatchingEngine, SubmitOutcome};
