//! Fungibility primitives: split, merge, consume, coalesce.
//!
//! These are generic over every instrument kind and are built only on the
//! ledger core's primitive register/remove/resize operations. The critical
//! correctness detail is the [`FungibleKey`]: merging is allowed exactly when
//! the keys match, and for deliverables the key includes the SKU and unit
//! price — merging different goods, or the same goods at different prices,
//! would silently corrupt valuation. Money-like kinds carry no such detail.

use crate::core::agent::AgentId;
use crate::core::denom::Denomination;
use crate::core::error::LedgerError;
use crate::core::event::Event;
use crate::core::instrument::{Instrument, InstrumentId, InstrumentKind, Sku};
use crate::ledger::Ledger;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// The attributes two instrument pieces must share to be merged into one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FungibleKey {
    pub kind: InstrumentKind,
    pub denomination: Denomination,
    pub issuer: AgentId,
    pub holder: AgentId,
    /// SKU and unit price, present for deliverables only.
    pub goods: Option<(Sku, Decimal)>,
}

/// Compute the fungible key of an instrument.
pub fn fungible_key(instrument: &Instrument) -> FungibleKey {
    let goods = instrument
        .sku()
        .cloned()
        .zip(instrument.unit_price());
    FungibleKey {
        kind: instrument.kind(),
        denomination: instrument.denomination().clone(),
        issuer: instrument.issuer().clone(),
        holder: instrument.holder().clone(),
        goods,
    }
}

impl Ledger {
    /// Fungible key of a live instrument.
    pub fn fungible_key_of(&self, id: InstrumentId) -> Result<FungibleKey, LedgerError> {
        Ok(fungible_key(self.instrument(id)?))
    }

    /// Split `amount` off an instrument into a twin piece with identical
    /// type-specific fields. Fails if the amount is non-positive or exceeds
    /// the source, or if the instrument is not divisible.
    pub fn split(&mut self, id: InstrumentId, amount: Decimal) -> Result<InstrumentId, LedgerError> {
        self.transact(|l| {
            let source = l.instrument(id)?;
            if amount <= Decimal::ZERO || amount > source.amount() {
                return Err(LedgerError::InvalidAmount { amount });
            }
            if !source.divisible() {
                return Err(LedgerError::Indivisible { id });
            }
            Ok(l.split_piece(id, amount))
        })
    }

    /// Merge `b` into `a`: `a` absorbs `b`'s amount, `b` is detached and
    /// deleted. Requires equal fungible keys.
    pub fn merge(&mut self, a: InstrumentId, b: InstrumentId) -> Result<(), LedgerError> {
        self.transact(|l| {
            if a == b {
                return Err(LedgerError::NotFungible { a, b });
            }
            let key_a = fungible_key(l.instrument(a)?);
            let key_b = fungible_key(l.instrument(b)?);
            if key_a != key_b {
                return Err(LedgerError::NotFungible { a, b });
            }
            let absorbed = l.remove_instrument(b);
            let new_total = l.instrument(a)?.amount() + absorbed.amount();
            l.resize_piece(a, new_total);
            let day = l.day();
            l.log_event(Event::InstrumentMerged {
                day,
                into: a,
                absorbed: b,
            });
            Ok(())
        })
    }

    /// Spend `amount` down from an instrument, deleting it entirely when it
    /// reaches zero. The atomic "spend" primitive behind retire, withdraw,
    /// and the conversions.
    pub fn consume(&mut self, id: InstrumentId, amount: Decimal) -> Result<(), LedgerError> {
        self.transact(|l| l.consume_piece(id, amount))
    }

    /// Merge all of a customer's deposit pieces at one bank into a single
    /// instrument, creating a zero-balance one when none exist. Bounds the
    /// fragmentation that repeated small transfers would otherwise cause.
    pub fn coalesce_deposits(
        &mut self,
        customer: &AgentId,
        bank: &AgentId,
    ) -> Result<InstrumentId, LedgerError> {
        self.transact(|l| {
            l.agent(customer)?;
            l.agent(bank)?;
            let pieces: Vec<InstrumentId> = l
                .holdings(customer, InstrumentKind::Deposit)
                .into_iter()
                .filter(|id| {
                    l.instrument(*id)
                        .map(|i| i.issuer() == bank)
                        .unwrap_or(false)
                })
                .collect();
            match pieces.split_first() {
                None => {
                    let draft = Instrument::deposit(
                        customer.clone(),
                        bank.clone(),
                        Decimal::ZERO,
                        l.denomination().clone(),
                    );
                    l.add_contract(draft)
                }
                Some((first, rest)) => {
                    for id in rest {
                        l.merge(*first, *id)?;
                    }
                    Ok(*first)
                }
            }
        })
    }

    /// Coalesce one agent's money-like pieces of `kind`, grouped by
    /// `(denomination, issuer)`. For a single holder and kind this matches
    /// full fungible-key equality; the looser key mirrors the behavior money
    /// transfers have always had.
    pub(crate) fn coalesce_money(&mut self, holder: &AgentId, kind: InstrumentKind) {
        let mut groups: BTreeMap<(Denomination, AgentId), Vec<InstrumentId>> = BTreeMap::new();
        for id in self.holdings(holder, kind) {
            let instr = match self.instrument(id) {
                Ok(i) => i,
                Err(_) => continue,
            };
            groups
                .entry((instr.denomination().clone(), instr.issuer().clone()))
                .or_default()
                .push(id);
        }
        for ids in groups.into_values() {
            if let Some((first, rest)) = ids.split_first() {
                for id in rest {
                    let absorbed = self.remove_instrument(*id);
                    let new_total = self.state.instruments[first].amount() + absorbed.amount();
                    self.resize_piece(*first, new_total);
                    let day = self.day();
                    self.log_event(Event::InstrumentMerged {
                        day,
                        into: *first,
                        absorbed: *id,
                    });
                }
            }
        }
    }

    /// After a piece lands with a new holder, fold it into an older piece of
    /// the receiver with the same fungible key, if one exists. Returns the
    /// surviving id.
    pub(crate) fn absorb_into_existing(
        &mut self,
        moved: InstrumentId,
    ) -> Result<InstrumentId, LedgerError> {
        let key = fungible_key(self.instrument(moved)?);
        let holder = key.holder.clone();
        let kind = key.kind;
        let existing = self
            .holdings(&holder, kind)
            .into_iter()
            .filter(|id| *id != moved)
            .find(|id| {
                self.instrument(*id)
                    .map(|i| fungible_key(i) == key)
                    .unwrap_or(false)
            });
        match existing {
            Some(survivor) => {
                self.merge(survivor, moved)?;
                Ok(survivor)
            }
            None => Ok(moved),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::agent::{Agent, AgentKind};
    use crate::ledger::policy::PolicyTable;
    use rust_decimal_macros::dec;

    fn test_ledger() -> Ledger {
        let cb = Agent::new("CB", "Central Bank", AgentKind::CentralBank);
        let mut ledger =
            Ledger::new(cb, Denomination::new("USD"), PolicyTable::default()).unwrap();
        ledger
            .add_agent(Agent::new("B1", "Bank One", AgentKind::Bank))
            .unwrap();
        ledger
            .add_agent(Agent::new("H1", "Household 1", AgentKind::Household))
            .unwrap();
        ledger
            .add_agent(Agent::new("F1", "Firm 1", AgentKind::Firm))
            .unwrap();
        ledger
    }

    fn id(s: &str) -> AgentId {
        AgentId::new(s)
    }

    #[test]
    fn test_split_merge_round_trip() {
        let mut ledger = test_ledger();
        let original = ledger.mint_cash(&id("H1"), dec!(100)).unwrap();
        let key_before = ledger.fungible_key_of(original).unwrap();

        let twin = ledger.split(original, dec!(30)).unwrap();
        assert_eq!(ledger.instrument(original).unwrap().amount(), dec!(70));
        assert_eq!(ledger.instrument(twin).unwrap().amount(), dec!(30));

        ledger.merge(original, twin).unwrap();
        assert_eq!(ledger.instrument(original).unwrap().amount(), dec!(100));
        assert!(!ledger.has_instrument(twin));
        assert_eq!(ledger.fungible_key_of(original).unwrap(), key_before);
        ledger.assert_invariants();
    }

    #[test]
    fn test_split_rejects_bad_amounts() {
        let mut ledger = test_ledger();
        let piece = ledger.mint_cash(&id("H1"), dec!(100)).unwrap();
        assert!(matches!(
            ledger.split(piece, dec!(0)),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(matches!(
            ledger.split(piece, dec!(101)),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_split_indivisible_rejected() {
        let mut ledger = test_ledger();
        let machine = ledger
            .create_deliverable(&id("F1"), &id("F1"), "MACHINE", dec!(2), dec!(1000), false, None)
            .unwrap();
        assert!(matches!(
            ledger.split(machine, dec!(1)),
            Err(LedgerError::Indivisible { .. })
        ));
    }

    #[test]
    fn test_merge_requires_equal_keys() {
        let mut ledger = test_ledger();
        let widgets = ledger
            .create_deliverable(&id("F1"), &id("F1"), "WIDGET", dec!(10), dec!(5), true, None)
            .unwrap();
        let gadgets = ledger
            .create_deliverable(&id("F1"), &id("F1"), "GADGET", dec!(10), dec!(5), true, None)
            .unwrap();
        assert!(matches!(
            ledger.merge(widgets, gadgets),
            Err(LedgerError::NotFungible { .. })
        ));

        // Same SKU at a different price is still not fungible.
        let dearer = ledger
            .create_deliverable(&id("F1"), &id("F1"), "WIDGET", dec!(4), dec!(6), true, None)
            .unwrap();
        assert!(matches!(
            ledger.merge(widgets, dearer),
            Err(LedgerError::NotFungible { .. })
        ));
    }

    #[test]
    fn test_merge_same_key_deliverables() {
        let mut ledger = test_ledger();
        let a = ledger
            .create_deliverable(&id("F1"), &id("F1"), "WIDGET", dec!(10), dec!(5), true, None)
            .unwrap();
        let b = ledger
            .create_deliverable(&id("F1"), &id("F1"), "WIDGET", dec!(4), dec!(5), true, None)
            .unwrap();
        ledger.merge(a, b).unwrap();
        assert_eq!(ledger.instrument(a).unwrap().amount(), dec!(14));
        assert!(!ledger.has_instrument(b));
        assert!(ledger
            .events()
            .iter()
            .any(|e| matches!(e, Event::InstrumentMerged { .. })));
    }

    #[test]
    fn test_merge_across_holders_rejected() {
        let mut ledger = test_ledger();
        let mine = ledger.mint_cash(&id("H1"), dec!(10)).unwrap();
        let theirs = ledger.mint_cash(&id("F1"), dec!(10)).unwrap();
        assert!(matches!(
            ledger.merge(mine, theirs),
            Err(LedgerError::NotFungible { .. })
        ));
    }

    #[test]
    fn test_consume_to_zero_deletes() {
        let mut ledger = test_ledger();
        let piece = ledger.mint_cash(&id("H1"), dec!(100)).unwrap();
        ledger.consume(piece, dec!(40)).unwrap();
        assert_eq!(ledger.instrument(piece).unwrap().amount(), dec!(60));
        ledger.consume(piece, dec!(60)).unwrap();
        assert!(!ledger.has_instrument(piece));
        assert_eq!(ledger.cash_outstanding(), Decimal::ZERO);
        ledger.assert_invariants();
    }

    #[test]
    fn test_coalesce_deposits_merges_fragments() {
        let mut ledger = test_ledger();
        ledger.mint_cash(&id("H1"), dec!(100)).unwrap();
        // Two separate deposit instruments at the same bank.
        let a = ledger
            .add_contract(Instrument::deposit(
                id("H1"),
                id("B1"),
                dec!(30),
                Denomination::new("USD"),
            ))
            .unwrap();
        let b = ledger
            .add_contract(Instrument::deposit(
                id("H1"),
                id("B1"),
                dec!(20),
                Denomination::new("USD"),
            ))
            .unwrap();

        let survivor = ledger.coalesce_deposits(&id("H1"), &id("B1")).unwrap();
        assert_eq!(survivor, a);
        assert!(!ledger.has_instrument(b));
        assert_eq!(ledger.instrument(a).unwrap().amount(), dec!(50));
    }

    #[test]
    fn test_coalesce_deposits_creates_empty_account() {
        let mut ledger = test_ledger();
        let account = ledger.coalesce_deposits(&id("H1"), &id("B1")).unwrap();
        let instr = ledger.instrument(account).unwrap();
        assert_eq!(instr.amount(), Decimal::ZERO);
        assert_eq!(instr.issuer(), &id("B1"));
        ledger.assert_invariants();
    }
}
