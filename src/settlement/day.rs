//! The day driver: sequence the phases, then advance the clock.

use crate::core::error::LedgerError;
use crate::core::event::Event;
use crate::ledger::Ledger;
use crate::settlement::clearing::settle_intraday_nets;
use crate::settlement::due::settle_due;
use crate::settlement::DayReport;

/// Run one simulated day: log the `PhaseA` marker, settle obligations due
/// today (Phase B), clear interbank nets (Phase C), advance the day counter.
///
/// A default raised by Phase B propagates out with the day counter
/// unchanged; how to proceed (abort the run, skip, retry tomorrow) is the
/// caller's policy, not the engine's.
pub fn run_day(ledger: &mut Ledger) -> Result<DayReport, LedgerError> {
    let day = ledger.day();
    ledger.log_event(Event::PhaseA { day });
    let settlement = settle_due(ledger, day)?;
    let clearing = settle_intraday_nets(ledger, day)?;
    ledger.advance_day();
    Ok(DayReport {
        day,
        settlement,
        clearing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::agent::{Agent, AgentId, AgentKind};
    use crate::core::denom::Denomination;
    use crate::core::instrument::InstrumentKind;
    use crate::ledger::policy::PolicyTable;
    use rust_decimal_macros::dec;

    fn id(s: &str) -> AgentId {
        AgentId::new(s)
    }

    #[test]
    fn test_run_day_sequences_phases_and_advances() {
        let cb = Agent::new("CB", "Central Bank", AgentKind::CentralBank);
        let mut ledger =
            Ledger::new(cb, Denomination::new("USD"), PolicyTable::default()).unwrap();
        ledger
            .add_agent(Agent::new("H1", "Household 1", AgentKind::Household))
            .unwrap();
        ledger
            .add_agent(Agent::new("H2", "Household 2", AgentKind::Household))
            .unwrap();
        ledger.mint_cash(&id("H1"), dec!(100)).unwrap();
        ledger
            .create_payable(&id("H1"), &id("H2"), dec!(40), Some(0))
            .unwrap();

        let report = run_day(&mut ledger).unwrap();
        assert_eq!(report.day, 0);
        assert_eq!(report.settlement.payables_settled.len(), 1);
        assert_eq!(ledger.day(), 1);
        assert!(matches!(
            ledger.events().iter().next(),
            Some(Event::PhaseA { day: 0 })
        ));
    }

    #[test]
    fn test_default_leaves_day_unchanged() {
        let cb = Agent::new("CB", "Central Bank", AgentKind::CentralBank);
        let mut ledger =
            Ledger::new(cb, Denomination::new("USD"), PolicyTable::default()).unwrap();
        ledger
            .add_agent(Agent::new("H1", "Household 1", AgentKind::Household))
            .unwrap();
        ledger
            .add_agent(Agent::new("H2", "Household 2", AgentKind::Household))
            .unwrap();
        ledger
            .create_payable(&id("H1"), &id("H2"), dec!(40), Some(0))
            .unwrap();

        let err = run_day(&mut ledger).unwrap_err();
        assert!(err.is_default());
        assert_eq!(ledger.day(), 0);
    }

    #[test]
    fn test_overnight_payable_settles_next_day() {
        let cb = Agent::new("CB", "Central Bank", AgentKind::CentralBank);
        let mut ledger =
            Ledger::new(cb, Denomination::new("USD"), PolicyTable::default()).unwrap();
        for (aid, name, kind) in [
            ("B1", "Bank One", AgentKind::Bank),
            ("B2", "Bank Two", AgentKind::Bank),
            ("H1", "Household 1", AgentKind::Household),
            ("H2", "Household 2", AgentKind::Household),
        ] {
            ledger.add_agent(Agent::new(aid, name, kind)).unwrap();
        }
        ledger.mint_cash(&id("H1"), dec!(100)).unwrap();
        ledger.mint_cash(&id("H2"), dec!(100)).unwrap();
        ledger.deposit_cash(&id("H1"), &id("B1"), dec!(100)).unwrap();
        ledger.deposit_cash(&id("H2"), &id("B2"), dec!(100)).unwrap();
        ledger.pay_by_deposit(&id("H1"), &id("H2"), dec!(70)).unwrap();

        // Day 0: B1 has no reserves, so the net defers overnight.
        let day0 = run_day(&mut ledger).unwrap();
        assert_eq!(day0.clearing.deferred.len(), 1);

        // Reserves arrive; day 1's Phase B settles the overnight payable.
        ledger.mint_reserves(&id("B1"), dec!(100)).unwrap();
        let day1 = run_day(&mut ledger).unwrap();
        assert_eq!(day1.settlement.payables_settled.len(), 1);
        assert_eq!(
            ledger.total_of(&id("B2"), InstrumentKind::Reserves),
            dec!(70)
        );
        assert!(!ledger
            .instruments()
            .any(|i| i.kind() == InstrumentKind::Payable));
        ledger.assert_invariants();
    }
}
