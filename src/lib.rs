//! # ledger-engine
//!
//! Deterministic, invariant-enforcing double-entry ledger and settlement
//! engine for multi-agent financial simulation.
//!
//! Economic agents hold and issue instruments — cash, bank deposits,
//! central-bank reserves, payables, deliverable goods — and a two-phase
//! pipeline resolves obligations day by day: Phase B settles everything due
//! today through each debtor's policy-ranked payment waterfall, Phase C nets
//! the day's cross-bank client payments and settles them in reserves (or
//! defers them overnight).
//!
//! ## Architecture
//!
//! - **core** — Foundational types: agents, instruments, denominations,
//!   events, the error taxonomy
//! - **ledger** — The state owner: registries, atomic transactions,
//!   fungibility primitives, the policy table, balance queries
//! - **settlement** — Phase B (due obligations), Phase C (interbank
//!   clearing), and the day driver
//!
//! ## Guarantees
//!
//! Every mutating operation is all-or-nothing: a failure restores the exact
//! pre-call state, event log included. Conservation (outstanding cash and
//! reserves equal the live instrument sums), cross-reference integrity, and
//! no-duplicate-ownership hold after every operation and are re-verified in
//! debug builds.

pub mod core;
pub mod ledger;
pub mod settlement;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::agent::{Agent, AgentId, AgentKind};
    pub use crate::core::denom::Denomination;
    pub use crate::core::error::LedgerError;
    pub use crate::core::event::{Event, EventLog};
    pub use crate::core::instrument::{Instrument, InstrumentId, InstrumentKind, Sku, Terms};
    pub use crate::ledger::balance::{BalanceSheet, TrialBalance};
    pub use crate::ledger::fungible::{fungible_key, FungibleKey};
    pub use crate::ledger::policy::{PolicyTable, SettlementMethod};
    pub use crate::ledger::Ledger;
    pub use crate::settlement::clearing::{compute_intraday_nets, settle_intraday_nets};
    pub use crate::settlement::day::run_day;
    pub use crate::settlement::due::settle_due;
    pub use crate::settlement::{ClearingReport, DayReport, SettlementReport};
}
