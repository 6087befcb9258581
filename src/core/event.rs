//! Event logging for replay, auditing, and the clearing engine.
//!
//! Every state-changing ledger operation appends exactly one (sometimes a
//! few) immutable events. The log is the sole channel downstream consumers
//! have for reconstructing history without re-running a simulation, and it is
//! the input the intraday clearing engine nets over.
//!
//! Serialized through serde the log is a sequence of `{"kind": ..., "day":
//! ..., ...}` records — the `kind` tag comes from the variant name.

use crate::core::agent::AgentId;
use crate::core::instrument::{InstrumentId, Sku};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A state change, stamped with the day it occurred on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Event {
    CashMinted {
        day: u32,
        to: AgentId,
        amount: Decimal,
    },
    CashRetired {
        day: u32,
        from: AgentId,
        amount: Decimal,
    },
    CashTransferred {
        day: u32,
        from: AgentId,
        to: AgentId,
        amount: Decimal,
    },
    ReservesMinted {
        day: u32,
        to: AgentId,
        amount: Decimal,
    },
    ReservesTransferred {
        day: u32,
        from: AgentId,
        to: AgentId,
        amount: Decimal,
    },
    ReservesToCash {
        day: u32,
        bank: AgentId,
        amount: Decimal,
    },
    CashToReserves {
        day: u32,
        bank: AgentId,
        amount: Decimal,
    },
    CashDeposited {
        day: u32,
        customer: AgentId,
        bank: AgentId,
        amount: Decimal,
    },
    CashWithdrawn {
        day: u32,
        customer: AgentId,
        bank: AgentId,
        amount: Decimal,
    },
    /// A deposit-funded client payment. `from_bank` loses the deposit
    /// liability, `to_bank` gains one; when the two differ the clearing
    /// engine nets the implied interbank exposure at end of day.
    ClientPayment {
        day: u32,
        from: AgentId,
        to: AgentId,
        from_bank: AgentId,
        to_bank: AgentId,
        amount: Decimal,
    },
    DeliverableCreated {
        day: u32,
        id: InstrumentId,
        issuer: AgentId,
        holder: AgentId,
        sku: Sku,
        quantity: Decimal,
    },
    DeliverablePriceUpdated {
        day: u32,
        id: InstrumentId,
        old_price: Decimal,
        new_price: Decimal,
    },
    DeliverableTransferred {
        day: u32,
        id: InstrumentId,
        from: AgentId,
        to: AgentId,
        quantity: Decimal,
    },
    ObligationSettled {
        day: u32,
        id: InstrumentId,
    },
    PayableSettled {
        day: u32,
        id: InstrumentId,
        debtor: AgentId,
        creditor: AgentId,
        amount: Decimal,
    },
    DeliverableSettled {
        day: u32,
        id: InstrumentId,
        debtor: AgentId,
        creditor: AgentId,
        sku: Sku,
        quantity: Decimal,
    },
    InstrumentMerged {
        day: u32,
        into: InstrumentId,
        absorbed: InstrumentId,
    },
    InterbankCleared {
        day: u32,
        debtor: AgentId,
        creditor: AgentId,
        amount: Decimal,
    },
    InterbankOvernightCreated {
        day: u32,
        debtor: AgentId,
        creditor: AgentId,
        amount: Decimal,
        due_day: u32,
    },
    /// Phase marker logged by the day driver before settlement begins.
    PhaseA {
        day: u32,
    },
}

impl Event {
    /// The day this event was logged on.
    pub fn day(&self) -> u32 {
        match self {
            Event::CashMinted { day, .. }
            | Event::CashRetired { day, .. }
            | Event::CashTransferred { day, .. }
            | Event::ReservesMinted { day, .. }
            | Event::ReservesTransferred { day, .. }
            | Event::ReservesToCash { day, .. }
            | Event::CashToReserves { day, .. }
            | Event::CashDeposited { day, .. }
            | Event::CashWithdrawn { day, .. }
            | Event::ClientPayment { day, .. }
            | Event::DeliverableCreated { day, .. }
            | Event::DeliverablePriceUpdated { day, .. }
            | Event::DeliverableTransferred { day, .. }
            | Event::ObligationSettled { day, .. }
            | Event::PayableSettled { day, .. }
            | Event::DeliverableSettled { day, .. }
            | Event::InstrumentMerged { day, .. }
            | Event::InterbankCleared { day, .. }
            | Event::InterbankOvernightCreated { day, .. }
            | Event::PhaseA { day } => *day,
        }
    }
}

/// Append-only event log.
///
/// Only the ledger appends; everyone else reads. The log participates in the
/// atomic-transaction snapshot, so events from a rolled-back operation never
/// survive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }

    /// Events logged on a specific day, in log order.
    pub fn on_day(&self, day: u32) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.day() == day)
    }

    /// Serialize the whole log as a JSON array.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.events)
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
