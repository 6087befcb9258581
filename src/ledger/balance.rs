//! Read-only balance aggregation over the ledger registries.
//!
//! This is the query surface downstream analytics consume; nothing here
//! mutates state.

use crate::core::agent::AgentId;
use crate::core::error::LedgerError;
use crate::core::instrument::InstrumentKind;
use crate::ledger::Ledger;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Per-kind asset and liability totals for one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub assets: BTreeMap<InstrumentKind, Decimal>,
    pub liabilities: BTreeMap<InstrumentKind, Decimal>,
}

impl BalanceSheet {
    pub fn asset(&self, kind: InstrumentKind) -> Decimal {
        self.assets.get(&kind).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn liability(&self, kind: InstrumentKind) -> Decimal {
        self.liabilities.get(&kind).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn total_assets(&self) -> Decimal {
        self.assets.values().sum()
    }

    pub fn total_liabilities(&self) -> Decimal {
        self.liabilities.values().sum()
    }

    /// Assets in financial claims (everything but deliverables).
    pub fn financial_assets(&self) -> Decimal {
        self.assets
            .iter()
            .filter(|(kind, _)| kind.is_financial())
            .map(|(_, amount)| *amount)
            .sum()
    }

    /// Assets in goods.
    pub fn nonfinancial_assets(&self) -> Decimal {
        self.assets
            .iter()
            .filter(|(kind, _)| !kind.is_financial())
            .map(|(_, amount)| *amount)
            .sum()
    }

    pub fn financial_liabilities(&self) -> Decimal {
        self.liabilities
            .iter()
            .filter(|(kind, _)| kind.is_financial())
            .map(|(_, amount)| *amount)
            .sum()
    }
}

impl fmt::Display for BalanceSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Assets:")?;
        for (kind, amount) in &self.assets {
            writeln!(f, "  {}: {}", kind, amount)?;
        }
        writeln!(f, "Liabilities:")?;
        for (kind, amount) in &self.liabilities {
            writeln!(f, "  {}: {}", kind, amount)?;
        }
        Ok(())
    }
}

/// System-wide totals. Assets equal liabilities by construction — every
/// instrument is simultaneously one agent's asset and another's liability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub by_kind: BTreeMap<InstrumentKind, Decimal>,
    pub assets: Decimal,
    pub liabilities: Decimal,
}

impl fmt::Display for TrialBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Trial Balance ===")?;
        for (kind, amount) in &self.by_kind {
            writeln!(f, "  {}: {}", kind, amount)?;
        }
        writeln!(f, "Assets:      {}", self.assets)?;
        writeln!(f, "Liabilities: {}", self.liabilities)?;
        Ok(())
    }
}

impl Ledger {
    /// Per-kind balances of one agent, assets and liabilities separately.
    pub fn agent_balance(&self, id: &AgentId) -> Result<BalanceSheet, LedgerError> {
        let agent = self.agent(id)?;
        let mut sheet = BalanceSheet::default();
        for iid in agent.assets() {
            let instr = self.instrument(*iid)?;
            *sheet.assets.entry(instr.kind()).or_insert(Decimal::ZERO) += instr.amount();
        }
        for iid in agent.liabilities() {
            let instr = self.instrument(*iid)?;
            *sheet
                .liabilities
                .entry(instr.kind())
                .or_insert(Decimal::ZERO) += instr.amount();
        }
        Ok(sheet)
    }

    /// System-wide totals per instrument kind.
    pub fn trial_balance(&self) -> TrialBalance {
        let mut by_kind: BTreeMap<InstrumentKind, Decimal> = BTreeMap::new();
        let mut total = Decimal::ZERO;
        for instr in self.instruments() {
            *by_kind.entry(instr.kind()).or_insert(Decimal::ZERO) += instr.amount();
            total += instr.amount();
        }
        TrialBalance {
            by_kind,
            assets: total,
            liabilities: total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::agent::{Agent, AgentKind};
    use crate::core::denom::Denomination;
    use crate::ledger::policy::PolicyTable;
    use rust_decimal_macros::dec;

    fn id(s: &str) -> AgentId {
        AgentId::new(s)
    }

    #[test]
    fn test_balance_splits_financial_and_goods() {
        let cb = Agent::new("CB", "Central Bank", AgentKind::CentralBank);
        let mut ledger =
            Ledger::new(cb, Denomination::new("USD"), PolicyTable::default()).unwrap();
        ledger
            .add_agent(Agent::new("F1", "Firm 1", AgentKind::Firm))
            .unwrap();

        ledger.mint_cash(&id("F1"), dec!(250)).unwrap();
        ledger
            .create_deliverable(&id("F1"), &id("F1"), "WIDGET", dec!(10), dec!(5), true, None)
            .unwrap();

        let sheet = ledger.agent_balance(&id("F1")).unwrap();
        assert_eq!(sheet.financial_assets(), dec!(250));
        assert_eq!(sheet.nonfinancial_assets(), dec!(10));
        assert_eq!(sheet.asset(InstrumentKind::Cash), dec!(250));
        // Self-held inventory also shows on the liability side.
        assert_eq!(sheet.liability(InstrumentKind::Deliverable), dec!(10));
    }

    #[test]
    fn test_trial_balance_always_balances() {
        let cb = Agent::new("CB", "Central Bank", AgentKind::CentralBank);
        let mut ledger =
            Ledger::new(cb, Denomination::new("USD"), PolicyTable::default()).unwrap();
        ledger
            .add_agent(Agent::new("B1", "Bank One", AgentKind::Bank))
            .unwrap();
        ledger
            .add_agent(Agent::new("H1", "Household 1", AgentKind::Household))
            .unwrap();

        ledger.mint_cash(&id("H1"), dec!(1000)).unwrap();
        ledger.deposit_cash(&id("H1"), &id("B1"), dec!(600)).unwrap();

        let tb = ledger.trial_balance();
        assert_eq!(tb.assets, tb.liabilities);
        assert_eq!(tb.assets, dec!(1600));
        assert_eq!(tb.by_kind[&InstrumentKind::Cash], dec!(1000));
        assert_eq!(tb.by_kind[&InstrumentKind::Deposit], dec!(600));
    }
}
