//! Static capability table gating who may hold or issue what, and how each
//! agent kind prefers to settle.

use crate::core::agent::AgentKind;
use crate::core::instrument::InstrumentKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A means of payment the settlement waterfall can draw on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementMethod {
    Deposit,
    Cash,
    Reserves,
}

impl SettlementMethod {
    /// The instrument kind this method spends.
    pub fn kind(&self) -> InstrumentKind {
        match self {
            SettlementMethod::Deposit => InstrumentKind::Deposit,
            SettlementMethod::Cash => InstrumentKind::Cash,
            SettlementMethod::Reserves => InstrumentKind::Reserves,
        }
    }
}

/// Capability table consulted by the ledger on every registration and
/// ownership change, and by the settlement engine for payment ordering.
///
/// This is configuration, not a state machine: the table is supplied at
/// ledger construction and never mutated afterwards. [`PolicyTable::default`]
/// wires the real-world constraints — only the central bank issues cash and
/// reserves, only commercial banks issue deposits, anyone may issue a payable
/// or a deliverable obligation.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    issuers: HashMap<InstrumentKind, Vec<AgentKind>>,
    holders: HashMap<InstrumentKind, Vec<AgentKind>>,
    settlement_order: HashMap<AgentKind, Vec<SettlementMethod>>,
}

impl PolicyTable {
    /// An empty table: nothing may be issued or held. Build up with the
    /// `allow_*` methods when the default wiring does not fit.
    pub fn empty() -> Self {
        Self {
            issuers: HashMap::new(),
            holders: HashMap::new(),
            settlement_order: HashMap::new(),
        }
    }

    pub fn allow_issue(&mut self, instrument: InstrumentKind, agents: &[AgentKind]) -> &mut Self {
        self.issuers
            .entry(instrument)
            .or_default()
            .extend_from_slice(agents);
        self
    }

    pub fn allow_hold(&mut self, instrument: InstrumentKind, agents: &[AgentKind]) -> &mut Self {
        self.holders
            .entry(instrument)
            .or_default()
            .extend_from_slice(agents);
        self
    }

    pub fn set_settlement_order(
        &mut self,
        agent: AgentKind,
        order: &[SettlementMethod],
    ) -> &mut Self {
        self.settlement_order.insert(agent, order.to_vec());
        self
    }

    /// True iff `agent` kind is in the issue allow-list for `instrument`.
    pub fn can_issue(&self, agent: AgentKind, instrument: InstrumentKind) -> bool {
        self.issuers
            .get(&instrument)
            .map(|kinds| kinds.contains(&agent))
            .unwrap_or(false)
    }

    /// True iff `agent` kind is in the hold allow-list for `instrument`.
    pub fn can_hold(&self, agent: AgentKind, instrument: InstrumentKind) -> bool {
        self.holders
            .get(&instrument)
            .map(|kinds| kinds.contains(&agent))
            .unwrap_or(false)
    }

    /// Ranked settlement means for an agent kind. The settlement engine walks
    /// this list in order and stops once an obligation is fully discharged.
    pub fn settlement_order(&self, agent: AgentKind) -> &[SettlementMethod] {
        self.settlement_order
            .get(&agent)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        use AgentKind::*;
        use InstrumentKind::*;

        let mut table = Self::empty();
        table
            .allow_issue(Cash, &[CentralBank])
            .allow_issue(Reserves, &[CentralBank])
            .allow_issue(Deposit, &[Bank])
            .allow_issue(Payable, &[CentralBank, Bank, Household, Firm, Treasury])
            .allow_issue(Deliverable, &[CentralBank, Bank, Household, Firm, Treasury]);

        table
            .allow_hold(Cash, &[Bank, Household, Firm, Treasury])
            .allow_hold(Deposit, &[Bank, Household, Firm, Treasury])
            .allow_hold(Reserves, &[Bank, Treasury])
            .allow_hold(Payable, &[CentralBank, Bank, Household, Firm, Treasury])
            .allow_hold(Deliverable, &[Bank, Household, Firm, Treasury]);

        table
            .set_settlement_order(
                Household,
                &[SettlementMethod::Deposit, SettlementMethod::Cash],
            )
            .set_settlement_order(Firm, &[SettlementMethod::Deposit, SettlementMethod::Cash])
            .set_settlement_order(
                Treasury,
                &[SettlementMethod::Deposit, SettlementMethod::Cash],
            )
            .set_settlement_order(Bank, &[SettlementMethod::Reserves]);
        // The central bank settles by issuance, not from holdings: no order.

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_central_bank_issues_money() {
        let policy = PolicyTable::default();
        assert!(policy.can_issue(AgentKind::CentralBank, InstrumentKind::Cash));
        assert!(policy.can_issue(AgentKind::CentralBank, InstrumentKind::Reserves));
        assert!(!policy.can_issue(AgentKind::Bank, InstrumentKind::Cash));
        assert!(!policy.can_issue(AgentKind::Household, InstrumentKind::Reserves));
    }

    #[test]
    fn test_only_banks_issue_deposits() {
        let policy = PolicyTable::default();
        assert!(policy.can_issue(AgentKind::Bank, InstrumentKind::Deposit));
        assert!(!policy.can_issue(AgentKind::Firm, InstrumentKind::Deposit));
    }

    #[test]
    fn test_anyone_issues_payables() {
        let policy = PolicyTable::default();
        for kind in [
            AgentKind::CentralBank,
            AgentKind::Bank,
            AgentKind::Household,
            AgentKind::Firm,
            AgentKind::Treasury,
        ] {
            assert!(policy.can_issue(kind, InstrumentKind::Payable));
        }
    }

    #[test]
    fn test_households_cannot_hold_reserves() {
        let policy = PolicyTable::default();
        assert!(!policy.can_hold(AgentKind::Household, InstrumentKind::Reserves));
        assert!(policy.can_hold(AgentKind::Bank, InstrumentKind::Reserves));
    }

    #[test]
    fn test_settlement_order_ranking() {
        let policy = PolicyTable::default();
        assert_eq!(
            policy.settlement_order(AgentKind::Household),
            &[SettlementMethod::Deposit, SettlementMethod::Cash]
        );
        assert_eq!(
            policy.settlement_order(AgentKind::Bank),
            &[SettlementMethod::Reserves]
        );
        assert!(policy.settlement_order(AgentKind::CentralBank).is_empty());
    }

    #[test]
    fn test_empty_table_denies_everything() {
        let policy = PolicyTable::empty();
        assert!(!policy.can_issue(AgentKind::CentralBank, InstrumentKind::Cash));
        assert!(!policy.can_hold(AgentKind::Bank, InstrumentKind::Cash));
    }
}
