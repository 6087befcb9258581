//! Phase C: net the day's cross-bank client payments and settle the nets.
//!
//! Every deposit-funded payment that crossed a bank boundary left a
//! `ClientPayment` event behind. This module folds those events into one
//! net position per ordered bank pair and settles each net in reserves,
//! falling back to an overnight payable when the debtor bank's reserves are
//! short. The overnight payable is due the following day, so the next Phase
//! B picks it up — closing the loop.

use crate::core::agent::AgentId;
use crate::core::error::LedgerError;
use crate::core::event::Event;
use crate::ledger::Ledger;
use crate::settlement::{ClearingReport, InterbankLeg};
use log::debug;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Net interbank positions for one day.
///
/// Keys are ordered bank pairs — always the lexicographically smaller id
/// first, which fixes one canonical sign convention per pair and rules out
/// double counting. A positive net means the smaller-id bank owes the
/// larger-id bank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntradayNets {
    nets: BTreeMap<(AgentId, AgentId), Decimal>,
}

impl IntradayNets {
    /// The signed net from `x`'s perspective: positive means `x` owes `y`.
    /// Antisymmetric by construction: `between(x, y) == -between(y, x)`.
    pub fn between(&self, x: &AgentId, y: &AgentId) -> Decimal {
        if x == y {
            return Decimal::ZERO;
        }
        let (key, sign) = if x < y {
            ((x.clone(), y.clone()), Decimal::ONE)
        } else {
            ((y.clone(), x.clone()), -Decimal::ONE)
        };
        self.nets.get(&key).copied().unwrap_or(Decimal::ZERO) * sign
    }

    /// Ordered pairs with their nets, including zeros, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&(AgentId, AgentId), Decimal)> {
        self.nets.iter().map(|(pair, net)| (pair, *net))
    }

    /// Pairs whose net is non-zero.
    pub fn nonzero(&self) -> impl Iterator<Item = (&(AgentId, AgentId), Decimal)> {
        self.iter().filter(|(_, net)| !net.is_zero())
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }
}

/// Fold the day's cross-bank `ClientPayment` events into per-pair nets.
///
/// A pure function of the event log: running it twice over the same log
/// yields identical results.
pub fn compute_intraday_nets(ledger: &Ledger, day: u32) -> IntradayNets {
    let mut nets: BTreeMap<(AgentId, AgentId), Decimal> = BTreeMap::new();
    for event in ledger.events().on_day(day) {
        let (from_bank, to_bank, amount) = match event {
            Event::ClientPayment {
                from_bank,
                to_bank,
                amount,
                ..
            } if from_bank != to_bank => (from_bank, to_bank, *amount),
            _ => continue,
        };
        let (pair, signed) = if from_bank < to_bank {
            ((from_bank.clone(), to_bank.clone()), amount)
        } else {
            ((to_bank.clone(), from_bank.clone()), -amount)
        };
        *nets.entry(pair).or_insert(Decimal::ZERO) += signed;
    }
    IntradayNets { nets }
}

/// Settle every non-zero net: reserves if the debtor bank has them, an
/// overnight payable due tomorrow otherwise.
pub fn settle_intraday_nets(
    ledger: &mut Ledger,
    day: u32,
) -> Result<ClearingReport, LedgerError> {
    let nets = compute_intraday_nets(ledger, day);
    let mut report = ClearingReport {
        day,
        ..Default::default()
    };

    for ((a, b), net) in nets.iter() {
        if net.is_zero() {
            continue;
        }
        let (debtor, creditor, amount) = if net > Decimal::ZERO {
            (a.clone(), b.clone(), net)
        } else {
            (b.clone(), a.clone(), -net)
        };
        match ledger.transfer_reserves(&debtor, &creditor, amount) {
            Ok(()) => {
                ledger.log_event(Event::InterbankCleared {
                    day,
                    debtor: debtor.clone(),
                    creditor: creditor.clone(),
                    amount,
                });
                debug!("cleared {} -> {} {} in reserves", debtor, creditor, amount);
                report.cleared.push(InterbankLeg {
                    debtor,
                    creditor,
                    amount,
                });
            }
            Err(err) => {
                debug!(
                    "net {} -> {} {} deferred overnight: {}",
                    debtor, creditor, amount, err
                );
                let due_day = day + 1;
                ledger.create_payable(&debtor, &creditor, amount, Some(due_day))?;
                ledger.log_event(Event::InterbankOvernightCreated {
                    day,
                    debtor: debtor.clone(),
                    creditor: creditor.clone(),
                    amount,
                    due_day,
                });
                report.deferred.push(InterbankLeg {
                    debtor,
                    creditor,
                    amount,
                });
            }
        }
    }
    Ok(report)
}
