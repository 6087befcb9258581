//! Settlement (Phase B), clearing (Phase C), and the day driver.

pub mod clearing;
pub mod day;
pub mod due;

use crate::core::agent::AgentId;
use crate::core::instrument::InstrumentId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What Phase B discharged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub day: u32,
    pub payables_settled: Vec<InstrumentId>,
    pub deliverables_settled: Vec<InstrumentId>,
    /// Total value of payables discharged (money terms).
    pub value_settled: Decimal,
}

impl SettlementReport {
    pub fn settled_count(&self) -> usize {
        self.payables_settled.len() + self.deliverables_settled.len()
    }
}

impl fmt::Display for SettlementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Settlement (day {}) ===", self.day)?;
        writeln!(f, "Payables settled:     {}", self.payables_settled.len())?;
        writeln!(f, "Deliverables settled: {}", self.deliverables_settled.len())?;
        writeln!(f, "Value settled:        {}", self.value_settled)?;
        Ok(())
    }
}

/// One interbank leg resolved by Phase C.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterbankLeg {
    pub debtor: AgentId,
    pub creditor: AgentId,
    pub amount: Decimal,
}

/// What Phase C did with the day's nets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearingReport {
    pub day: u32,
    /// Nets settled in reserves.
    pub cleared: Vec<InterbankLeg>,
    /// Nets deferred to overnight payables.
    pub deferred: Vec<InterbankLeg>,
}

impl fmt::Display for ClearingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Clearing (day {}) ===", self.day)?;
        for leg in &self.cleared {
            writeln!(f, "  cleared:  {} -> {} {}", leg.debtor, leg.creditor, leg.amount)?;
        }
        for leg in &self.deferred {
            writeln!(f, "  deferred: {} -> {} {}", leg.debtor, leg.creditor, leg.amount)?;
        }
        Ok(())
    }
}

/// Combined outcome of one simulated day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayReport {
    pub day: u32,
    pub settlement: SettlementReport,
    pub clearing: ClearingReport,
}

impl fmt::Display for DayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.settlement, self.clearing)
    }
}
