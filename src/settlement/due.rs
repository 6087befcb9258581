//! Phase B: discharge every obligation whose due day is today.
//!
//! Each obligation is a tiny state machine: due, then either fully settled
//! or defaulted. Payables walk the debtor's policy-ranked settlement
//! waterfall, paying as much per method as available funds allow; if a
//! remainder survives every method the whole obligation fails and the
//! partial payments unwind. Deliverables match the debtor's free stock of
//! the claimed SKU, all-or-nothing.
//!
//! The engine is fail-fast: the first default propagates to the day driver.
//! Obligations settled earlier in the same call stay settled — atomicity is
//! per obligation, not per day.

use crate::core::error::LedgerError;
use crate::core::event::Event;
use crate::core::instrument::{InstrumentId, InstrumentKind};
use crate::ledger::policy::SettlementMethod;
use crate::ledger::Ledger;
use crate::settlement::SettlementReport;
use log::debug;
use rust_decimal::Decimal;

/// Settle all payables and deliverables due on `day`.
///
/// Obligations with no due day are never touched, whatever the day.
pub fn settle_due(ledger: &mut Ledger, day: u32) -> Result<SettlementReport, LedgerError> {
    let mut report = SettlementReport {
        day,
        ..Default::default()
    };

    let due_payables: Vec<InstrumentId> = ledger
        .instruments()
        .filter(|i| i.kind() == InstrumentKind::Payable && i.due_day() == Some(day))
        .map(|i| i.id())
        .collect();
    for id in due_payables {
        let value = settle_payable(ledger, id, day)?;
        report.payables_settled.push(id);
        report.value_settled += value;
    }

    let due_deliverables: Vec<InstrumentId> = ledger
        .instruments()
        .filter(|i| i.kind() == InstrumentKind::Deliverable && i.due_day() == Some(day))
        .map(|i| i.id())
        .collect();
    for id in due_deliverables {
        settle_deliverable(ledger, id, day)?;
        report.deliverables_settled.push(id);
    }

    Ok(report)
}

/// Discharge one payable through the debtor's settlement waterfall.
///
/// Atomic: on default every partial payment made along the way — including
/// any `ClientPayment` events a deposit leg logged — is rolled back and the
/// payable is left intact at its full amount.
fn settle_payable(
    ledger: &mut Ledger,
    id: InstrumentId,
    day: u32,
) -> Result<Decimal, LedgerError> {
    ledger.transact(|l| {
        let instr = l.instrument(id)?;
        let debtor = instr.issuer().clone();
        let creditor = instr.holder().clone();
        let amount = instr.amount();
        let debtor_kind = l.agent(&debtor)?.kind();
        let order = l.policy().settlement_order(debtor_kind).to_vec();

        let mut remaining = amount;
        for method in order {
            if remaining.is_zero() {
                break;
            }
            let paid = match method {
                SettlementMethod::Deposit => l.pay_by_deposit(&debtor, &creditor, remaining)?,
                SettlementMethod::Cash => l.pay_by_cash(&debtor, &creditor, remaining)?,
                SettlementMethod::Reserves => l.pay_by_reserves(&debtor, &creditor, remaining)?,
            };
            if !paid.is_zero() {
                debug!(
                    "payable {}: {} paid {} via {:?}",
                    id, debtor, paid, method
                );
            }
            remaining -= paid;
        }

        if remaining > Decimal::ZERO {
            return Err(LedgerError::DefaultedPayable {
                id,
                debtor,
                still_owed: remaining,
            });
        }

        l.remove_instrument(id);
        l.log_event(Event::PayableSettled {
            day,
            id,
            debtor,
            creditor,
            amount,
        });
        Ok(amount)
    })
}

/// Discharge one deliverable claim from the debtor's free stock.
///
/// Free stock is any deliverable the debtor holds with the claimed SKU and
/// no due day of its own — claims on third parties are not inventory.
/// Delivery is all-or-nothing: a shortfall leaves claim and stock untouched.
fn settle_deliverable(
    ledger: &mut Ledger,
    id: InstrumentId,
    day: u32,
) -> Result<Decimal, LedgerError> {
    ledger.transact(|l| {
        let claim = l.instrument(id)?;
        let debtor = claim.issuer().clone();
        let creditor = claim.holder().clone();
        let sku = claim
            .sku()
            .cloned()
            .ok_or(LedgerError::NotDeliverable { id })?;
        let required = claim.amount();

        if debtor == creditor {
            // A self-held obligation: the goods are already where they belong.
            l.remove_instrument(id);
            l.log_event(Event::DeliverableSettled {
                day,
                id,
                debtor,
                creditor,
                sku,
                quantity: required,
            });
            return Ok(required);
        }

        let stock: Vec<(InstrumentId, Decimal, bool)> = l
            .holdings(&debtor, InstrumentKind::Deliverable)
            .into_iter()
            .filter(|sid| *sid != id)
            .filter_map(|sid| {
                let piece = l.instrument(sid).ok()?;
                if piece.sku() == Some(&sku) && piece.due_day().is_none() {
                    Some((sid, piece.amount(), piece.divisible()))
                } else {
                    None
                }
            })
            .collect();

        let available: Decimal = stock.iter().map(|(_, amount, _)| *amount).sum();
        if available < required {
            return Err(LedgerError::DefaultedDelivery {
                id,
                debtor,
                sku,
                shortfall: required - available,
            });
        }

        let mut remaining = required;
        for (sid, amount, divisible) in stock {
            if remaining.is_zero() {
                break;
            }
            if amount <= remaining {
                l.transfer_deliverable(sid, &debtor, &creditor, None)?;
                remaining -= amount;
            } else if divisible {
                l.transfer_deliverable(sid, &debtor, &creditor, Some(remaining))?;
                remaining = Decimal::ZERO;
            }
            // An indivisible piece larger than the remainder is skipped.
        }
        if remaining > Decimal::ZERO {
            return Err(LedgerError::DefaultedDelivery {
                id,
                debtor,
                sku,
                shortfall: remaining,
            });
        }

        debug!("deliverable {}: {} delivered {} {}", id, debtor, required, sku);
        l.remove_instrument(id);
        l.log_event(Event::DeliverableSettled {
            day,
            id,
            debtor,
            creditor,
            sku,
            quantity: required,
        });
        Ok(required)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::agent::{Agent, AgentId, AgentKind};
    use crate::core::denom::Denomination;
    use crate::ledger::policy::PolicyTable;
    use rust_decimal_macros::dec;

    fn id(s: &str) -> AgentId {
        AgentId::new(s)
    }

    fn test_ledger() -> Ledger {
        let cb = Agent::new("CB", "Central Bank", AgentKind::CentralBank);
        let mut ledger =
            Ledger::new(cb, Denomination::new("USD"), PolicyTable::default()).unwrap();
        for (aid, name, kind) in [
            ("B1", "Bank One", AgentKind::Bank),
            ("B2", "Bank Two", AgentKind::Bank),
            ("H1", "Household 1", AgentKind::Household),
            ("H2", "Household 2", AgentKind::Household),
            ("F1", "Firm 1", AgentKind::Firm),
        ] {
            ledger.add_agent(Agent::new(aid, name, kind)).unwrap();
        }
        ledger
    }

    #[test]
    fn test_payable_settles_deposit_then_cash() {
        let mut ledger = test_ledger();
        ledger.mint_cash(&id("H1"), dec!(100)).unwrap();
        ledger.deposit_cash(&id("H1"), &id("B1"), dec!(60)).unwrap();
        // H1 now has 60 deposit + 40 cash; owes H2 90.
        let payable = ledger
            .create_payable(&id("H1"), &id("H2"), dec!(90), Some(5))
            .unwrap();

        let report = settle_due(&mut ledger, 5).unwrap();
        assert_eq!(report.payables_settled, vec![payable]);
        assert!(!ledger.has_instrument(payable));

        // Deposit leg exhausted first (60), cash covered the rest (30).
        assert_eq!(ledger.total_of(&id("H1"), InstrumentKind::Deposit), dec!(0));
        assert_eq!(ledger.total_of(&id("H1"), InstrumentKind::Cash), dec!(10));
        assert_eq!(ledger.total_of(&id("H2"), InstrumentKind::Deposit), dec!(60));
        assert_eq!(ledger.total_of(&id("H2"), InstrumentKind::Cash), dec!(30));
        ledger.assert_invariants();
    }

    #[test]
    fn test_default_rolls_back_partial_payments() {
        let mut ledger = test_ledger();
        ledger.mint_cash(&id("H1"), dec!(100)).unwrap();
        ledger.deposit_cash(&id("H1"), &id("B1"), dec!(60)).unwrap();
        let payable = ledger
            .create_payable(&id("H1"), &id("H2"), dec!(150), Some(5))
            .unwrap();
        let events_before = ledger.events().len();

        let err = settle_due(&mut ledger, 5).unwrap_err();
        assert!(err.to_string().contains("50 still owed"));
        assert!(err.is_default());

        // The payable survives at full amount and no partial payment stuck.
        assert_eq!(ledger.instrument(payable).unwrap().amount(), dec!(150));
        assert_eq!(ledger.total_of(&id("H1"), InstrumentKind::Deposit), dec!(60));
        assert_eq!(ledger.total_of(&id("H1"), InstrumentKind::Cash), dec!(40));
        assert_eq!(ledger.total_of(&id("H2"), InstrumentKind::Deposit), dec!(0));
        assert_eq!(ledger.total_of(&id("H2"), InstrumentKind::Cash), dec!(0));
        assert_eq!(ledger.events().len(), events_before);
        ledger.assert_invariants();
    }

    #[test]
    fn test_undated_obligations_never_touched() {
        let mut ledger = test_ledger();
        let open_ended = ledger
            .create_payable(&id("H1"), &id("H2"), dec!(10), None)
            .unwrap();
        let report = settle_due(&mut ledger, 5).unwrap();
        assert_eq!(report.settled_count(), 0);
        assert!(ledger.has_instrument(open_ended));
    }

    #[test]
    fn test_bank_settles_in_reserves_only() {
        let mut ledger = test_ledger();
        ledger.mint_reserves(&id("B1"), dec!(200)).unwrap();
        ledger.mint_reserves(&id("B2"), dec!(10)).unwrap();
        let payable = ledger
            .create_payable(&id("B1"), &id("B2"), dec!(70), Some(3))
            .unwrap();

        settle_due(&mut ledger, 3).unwrap();
        assert!(!ledger.has_instrument(payable));
        assert_eq!(
            ledger.total_of(&id("B1"), InstrumentKind::Reserves),
            dec!(130)
        );
        assert_eq!(
            ledger.total_of(&id("B2"), InstrumentKind::Reserves),
            dec!(80)
        );
    }

    #[test]
    fn test_deliverable_settles_from_free_stock() {
        let mut ledger = test_ledger();
        // F1 owes H1 eight widgets on day 2, holds ten in inventory.
        let claim = ledger
            .create_deliverable(&id("F1"), &id("H1"), "WIDGET", dec!(8), dec!(5), true, Some(2))
            .unwrap();
        ledger
            .create_deliverable(&id("F1"), &id("F1"), "WIDGET", dec!(10), dec!(5), true, None)
            .unwrap();

        let report = settle_due(&mut ledger, 2).unwrap();
        assert_eq!(report.deliverables_settled, vec![claim]);
        assert!(!ledger.has_instrument(claim));
        assert_eq!(
            ledger.total_of(&id("H1"), InstrumentKind::Deliverable),
            dec!(8)
        );
        assert_eq!(
            ledger.total_of(&id("F1"), InstrumentKind::Deliverable),
            dec!(2)
        );
        ledger.assert_invariants();
    }

    #[test]
    fn test_deliverable_shortfall_defaults_and_leaves_claim() {
        let mut ledger = test_ledger();
        let claim = ledger
            .create_deliverable(&id("F1"), &id("H1"), "WIDGET", dec!(8), dec!(5), true, Some(2))
            .unwrap();
        ledger
            .create_deliverable(&id("F1"), &id("F1"), "WIDGET", dec!(5), dec!(5), true, None)
            .unwrap();

        let err = settle_due(&mut ledger, 2).unwrap_err();
        match &err {
            LedgerError::DefaultedDelivery { sku, shortfall, .. } => {
                assert_eq!(sku.as_str(), "WIDGET");
                assert_eq!(*shortfall, dec!(3));
            }
            other => panic!("expected delivery default, got {other:?}"),
        }
        // Claim and stock untouched.
        assert_eq!(ledger.instrument(claim).unwrap().amount(), dec!(8));
        assert_eq!(
            ledger.total_of(&id("F1"), InstrumentKind::Deliverable),
            dec!(5)
        );
    }

    #[test]
    fn test_wrong_sku_stock_does_not_count() {
        let mut ledger = test_ledger();
        ledger
            .create_deliverable(&id("F1"), &id("H1"), "WIDGET", dec!(4), dec!(5), true, Some(2))
            .unwrap();
        ledger
            .create_deliverable(&id("F1"), &id("F1"), "GADGET", dec!(10), dec!(5), true, None)
            .unwrap();

        let err = settle_due(&mut ledger, 2).unwrap_err();
        assert!(matches!(err, LedgerError::DefaultedDelivery { .. }));
    }

    #[test]
    fn test_indivisible_oversized_stock_is_skipped() {
        let mut ledger = test_ledger();
        // Claim for 1 machine; stock is a single indivisible piece of 3.
        let claim = ledger
            .create_deliverable(&id("F1"), &id("H1"), "MACHINE", dec!(1), dec!(900), true, Some(4))
            .unwrap();
        ledger
            .create_deliverable(&id("F1"), &id("F1"), "MACHINE", dec!(3), dec!(900), false, None)
            .unwrap();

        let err = settle_due(&mut ledger, 4).unwrap_err();
        match err {
            LedgerError::DefaultedDelivery { shortfall, .. } => {
                assert_eq!(shortfall, dec!(1))
            }
            other => panic!("expected delivery default, got {other:?}"),
        }
        assert!(ledger.has_instrument(claim));
    }
}
