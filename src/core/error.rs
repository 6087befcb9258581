use crate::core::agent::AgentId;
use crate::core::instrument::{InstrumentId, InstrumentKind, Sku};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which side of a capability check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyAction {
    Hold,
    Issue,
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyAction::Hold => write!(f, "hold"),
            PolicyAction::Issue => write!(f, "issue"),
        }
    }
}

/// Errors raised by ledger operations.
///
/// Every mutating operation is all-or-nothing: when one of these propagates
/// out of a public operation, state is exactly as it was before the call.
///
/// Settlement defaults ([`DefaultedPayable`](LedgerError::DefaultedPayable),
/// [`DefaultedDelivery`](LedgerError::DefaultedDelivery)) are domain outcomes
/// rather than caller bugs; [`is_default`](LedgerError::is_default) lets the
/// orchestration layer separate them from the rest of the taxonomy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("{agent} may not {action} {kind} instruments")]
    PolicyViolation {
        agent: AgentId,
        action: PolicyAction,
        kind: InstrumentKind,
    },

    #[error("invalid amount {amount}")]
    InvalidAmount { amount: Decimal },

    #[error("invalid unit price {price}")]
    InvalidPrice { price: Decimal },

    #[error("{agent} may not be both holder and issuer of a {kind} instrument")]
    SelfIssued { agent: AgentId, kind: InstrumentKind },

    #[error("transfer from {agent} to itself")]
    NoOpTransfer { agent: AgentId },

    #[error("instrument {id} is not divisible")]
    Indivisible { id: InstrumentId },

    #[error("{agent} has insufficient {kind}: required {required}, available {available}")]
    InsufficientFunds {
        agent: AgentId,
        kind: InstrumentKind,
        required: Decimal,
        available: Decimal,
    },

    #[error("instruments {a} and {b} are not fungible")]
    NotFungible { a: InstrumentId, b: InstrumentId },

    #[error("instrument {id} is held by {holder}, not {claimed}")]
    HolderMismatch {
        id: InstrumentId,
        holder: AgentId,
        claimed: AgentId,
    },

    #[error("instrument {id} not found")]
    NotFound { id: InstrumentId },

    #[error("instrument {id} is not a deliverable")]
    NotDeliverable { id: InstrumentId },

    #[error("unknown agent {id}")]
    UnknownAgent { id: AgentId },

    #[error("agent {id} already registered")]
    DuplicateAgent { id: AgentId },

    #[error("agent {id} is not a central bank")]
    NotCentralBank { id: AgentId },

    #[error("ledger inconsistency at instrument {id}: {detail}")]
    Inconsistent { id: InstrumentId, detail: String },

    #[error("payable {id} defaulted: {still_owed} still owed by {debtor}")]
    DefaultedPayable {
        id: InstrumentId,
        debtor: AgentId,
        still_owed: Decimal,
    },

    #[error("deliverable {id} defaulted: {debtor} is {shortfall} short of {sku}")]
    DefaultedDelivery {
        id: InstrumentId,
        debtor: AgentId,
        sku: Sku,
        shortfall: Decimal,
    },
}

impl LedgerError {
    /// True for settlement defaults — domain outcomes a day driver may choose
    /// to tolerate, as opposed to caller errors it should not.
    pub fn is_default(&self) -> bool {
        matches!(
            self,
            LedgerError::DefaultedPayable { .. } | LedgerError::DefaultedDelivery { .. }
        )
    }
}
