//! The ledger core: sole owner of mutable state.
//!
//! Every other component — fungibility primitives, settlement, clearing —
//! reaches agents and instruments only through the operations defined here.
//! All mutating operations run inside [`Ledger::transact`], which snapshots
//! the whole [`State`] and restores it wholesale if the operation fails, so
//! there is never a partial-success state to reason about.
//!
//! # Critical Invariants
//!
//! 1. **Cross-reference integrity**: every live instrument id appears in
//!    exactly its holder's asset list and exactly its issuer's liability list
//! 2. **No duplicate ownership**: no id appears twice within either list
//! 3. **Conservation**: outstanding cash/reserve counters equal the sum of
//!    live instruments of those kinds
//! 4. **No negative amounts**
//!
//! [`Ledger::check_invariants`] verifies all four; debug builds re-verify
//! after every successful transaction.

pub mod balance;
pub mod fungible;
pub mod policy;

use crate::core::agent::{Agent, AgentId, AgentKind};
use crate::core::denom::Denomination;
use crate::core::error::{LedgerError, PolicyAction};
use crate::core::event::{Event, EventLog};
use crate::core::instrument::{Instrument, InstrumentId, InstrumentKind, Sku};
use log::debug;
use policy::PolicyTable;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The ledger's sole mutable aggregate.
///
/// Registries are `BTreeMap`s so every scan iterates in id order and a run
/// of the engine is deterministic without per-call sorting. `Clone` is the
/// snapshot mechanism behind [`Ledger::transact`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    agents: BTreeMap<AgentId, Agent>,
    instruments: BTreeMap<InstrumentId, Instrument>,
    events: EventLog,
    day: u32,
    cash_outstanding: Decimal,
    reserves_outstanding: Decimal,
    next_instrument: u64,
}

impl State {
    fn new() -> Self {
        Self {
            agents: BTreeMap::new(),
            instruments: BTreeMap::new(),
            events: EventLog::new(),
            day: 0,
            cash_outstanding: Decimal::ZERO,
            reserves_outstanding: Decimal::ZERO,
            next_instrument: 1,
        }
    }
}

/// The ledger engine.
///
/// Owns the [`State`] plus the immutable construction-time context: the
/// policy table, the base denomination, and the id of the unique central
/// bank (captured once — never looked up by scanning the registry).
///
/// # Examples
///
/// ```
/// use ledger_engine::prelude::*;
/// use rust_decimal_macros::dec;
///
/// let cb = Agent::new("CB", "Central Bank", AgentKind::CentralBank);
/// let mut ledger = Ledger::new(cb, Denomination::new("USD"), PolicyTable::default()).unwrap();
///
/// ledger.add_agent(Agent::new("H1", "Household 1", AgentKind::Household)).unwrap();
/// ledger.mint_cash(&AgentId::new("H1"), dec!(1000)).unwrap();
///
/// assert_eq!(ledger.total_of(&AgentId::new("H1"), InstrumentKind::Cash), dec!(1000));
/// ```
#[derive(Debug, Clone)]
pub struct Ledger {
    state: State,
    policy: PolicyTable,
    central_bank: AgentId,
    denomination: Denomination,
}

impl Ledger {
    /// Create a ledger around its unique central bank.
    ///
    /// The single-central-bank rule is an invariant of construction:
    /// `central_bank` must have kind [`AgentKind::CentralBank`], and the
    /// issuance operations always issue in its name.
    pub fn new(
        central_bank: Agent,
        denomination: Denomination,
        policy: PolicyTable,
    ) -> Result<Self, LedgerError> {
        if central_bank.kind() != AgentKind::CentralBank {
            return Err(LedgerError::NotCentralBank {
                id: central_bank.id().clone(),
            });
        }
        let cb_id = central_bank.id().clone();
        let mut state = State::new();
        state.agents.insert(cb_id.clone(), central_bank);
        Ok(Self {
            state,
            policy,
            central_bank: cb_id,
            denomination,
        })
    }

    // --- Read surface ---

    pub fn day(&self) -> u32 {
        self.state.day
    }

    pub fn events(&self) -> &EventLog {
        &self.state.events
    }

    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    pub fn central_bank(&self) -> &AgentId {
        &self.central_bank
    }

    pub fn denomination(&self) -> &Denomination {
        &self.denomination
    }

    pub fn cash_outstanding(&self) -> Decimal {
        self.state.cash_outstanding
    }

    pub fn reserves_outstanding(&self) -> Decimal {
        self.state.reserves_outstanding
    }

    pub fn agent(&self, id: &AgentId) -> Result<&Agent, LedgerError> {
        self.state
            .agents
            .get(id)
            .ok_or_else(|| LedgerError::UnknownAgent { id: id.clone() })
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.state.agents.values()
    }

    pub fn instrument(&self, id: InstrumentId) -> Result<&Instrument, LedgerError> {
        self.state
            .instruments
            .get(&id)
            .ok_or(LedgerError::NotFound { id })
    }

    pub fn has_instrument(&self, id: InstrumentId) -> bool {
        self.state.instruments.contains_key(&id)
    }

    /// All live instruments in id order.
    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.state.instruments.values()
    }

    /// Ids of `agent`'s held instruments of one kind, sorted by id.
    pub fn holdings(&self, agent: &AgentId, kind: InstrumentKind) -> Vec<InstrumentId> {
        let mut ids: Vec<InstrumentId> = match self.state.agents.get(agent) {
            Some(a) => a
                .assets()
                .iter()
                .copied()
                .filter(|id| {
                    self.state
                        .instruments
                        .get(id)
                        .map(|i| i.kind() == kind)
                        .unwrap_or(false)
                })
                .collect(),
            None => Vec::new(),
        };
        ids.sort_unstable();
        ids
    }

    /// Total amount `agent` holds of one instrument kind.
    pub fn total_of(&self, agent: &AgentId, kind: InstrumentKind) -> Decimal {
        self.holdings(agent, kind)
            .iter()
            .filter_map(|id| self.state.instruments.get(id))
            .map(|i| i.amount())
            .sum()
    }

    // --- Atomic transactions ---

    /// Run `f` atomically: on error the whole [`State`] is restored from a
    /// snapshot taken before `f` ran, including the event log and any
    /// partial multi-step effects. Nesting is permitted.
    pub fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut Ledger) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let snapshot = self.state.clone();
        match f(self) {
            Ok(value) => {
                #[cfg(debug_assertions)]
                self.assert_invariants();
                Ok(value)
            }
            Err(err) => {
                self.state = snapshot;
                Err(err)
            }
        }
    }

    // --- Registration ---

    /// Register an agent. The only requirement is a unique id.
    pub fn add_agent(&mut self, agent: Agent) -> Result<(), LedgerError> {
        if self.state.agents.contains_key(agent.id()) {
            return Err(LedgerError::DuplicateAgent {
                id: agent.id().clone(),
            });
        }
        self.state.agents.insert(agent.id().clone(), agent);
        Ok(())
    }

    /// Register an instrument draft: validate its type invariants, check the
    /// policy table on both sides, assign an id, and cross-reference it into
    /// both agents' collections.
    pub fn add_contract(&mut self, draft: Instrument) -> Result<InstrumentId, LedgerError> {
        self.transact(|l| {
            draft.validate()?;
            let kind = draft.kind();
            let holder_kind = l.agent(draft.holder())?.kind();
            let issuer_kind = l.agent(draft.issuer())?.kind();
            if !l.policy.can_hold(holder_kind, kind) {
                return Err(LedgerError::PolicyViolation {
                    agent: draft.holder().clone(),
                    action: PolicyAction::Hold,
                    kind,
                });
            }
            if !l.policy.can_issue(issuer_kind, kind) {
                return Err(LedgerError::PolicyViolation {
                    agent: draft.issuer().clone(),
                    action: PolicyAction::Issue,
                    kind,
                });
            }
            let issuer = draft.issuer().clone();
            let holder = draft.holder().clone();
            let sku = draft.sku().cloned();
            let quantity = draft.amount();
            let id = l.register(draft);
            if let Some(sku) = sku {
                let day = l.state.day;
                l.log_event(Event::DeliverableCreated {
                    day,
                    id,
                    issuer,
                    holder,
                    sku,
                    quantity,
                });
            }
            Ok(id)
        })
    }

    // --- Money issuance and destruction ---

    /// Mint cash issued by the central bank into `to`'s hands.
    pub fn mint_cash(&mut self, to: &AgentId, amount: Decimal) -> Result<InstrumentId, LedgerError> {
        self.transact(|l| {
            require_positive(amount)?;
            let draft = Instrument::cash(
                to.clone(),
                l.central_bank.clone(),
                amount,
                l.denomination.clone(),
            );
            let id = l.add_contract(draft)?;
            let day = l.state.day;
            l.log_event(Event::CashMinted {
                day,
                to: to.clone(),
                amount,
            });
            Ok(id)
        })
    }

    /// Mint central-bank reserves into a bank's account.
    pub fn mint_reserves(
        &mut self,
        to_bank: &AgentId,
        amount: Decimal,
    ) -> Result<InstrumentId, LedgerError> {
        self.transact(|l| {
            require_positive(amount)?;
            let draft = Instrument::reserves(
                to_bank.clone(),
                l.central_bank.clone(),
                amount,
                l.denomination.clone(),
            );
            let id = l.add_contract(draft)?;
            let day = l.state.day;
            l.log_event(Event::ReservesMinted {
                day,
                to: to_bank.clone(),
                amount,
            });
            Ok(id)
        })
    }

    /// Destroy `amount` of `from`'s cash, consuming pieces greedily.
    pub fn retire_cash(&mut self, from: &AgentId, amount: Decimal) -> Result<(), LedgerError> {
        self.transact(|l| {
            require_positive(amount)?;
            l.agent(from)?;
            l.consume_money(InstrumentKind::Cash, from, amount)?;
            let day = l.state.day;
            l.log_event(Event::CashRetired {
                day,
                from: from.clone(),
                amount,
            });
            Ok(())
        })
    }

    // --- Transfers ---

    pub fn transfer_cash(
        &mut self,
        from: &AgentId,
        to: &AgentId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        self.transact(|l| {
            l.move_money(InstrumentKind::Cash, from, to, amount)?;
            let day = l.state.day;
            l.log_event(Event::CashTransferred {
                day,
                from: from.clone(),
                to: to.clone(),
                amount,
            });
            Ok(())
        })
    }

    pub fn transfer_reserves(
        &mut self,
        from: &AgentId,
        to: &AgentId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        self.transact(|l| {
            l.move_money(InstrumentKind::Reserves, from, to, amount)?;
            let day = l.state.day;
            l.log_event(Event::ReservesTransferred {
                day,
                from: from.clone(),
                to: to.clone(),
                amount,
            });
            Ok(())
        })
    }

    // --- Conversions ---

    /// Swap a bank's reserves for freshly issued cash. Both outstanding
    /// counters move in lock-step inside one atomic scope.
    pub fn convert_reserves_to_cash(
        &mut self,
        bank: &AgentId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        self.transact(|l| {
            require_positive(amount)?;
            l.agent(bank)?;
            l.consume_money(InstrumentKind::Reserves, bank, amount)?;
            let draft = Instrument::cash(
                bank.clone(),
                l.central_bank.clone(),
                amount,
                l.denomination.clone(),
            );
            l.add_contract(draft)?;
            let day = l.state.day;
            l.log_event(Event::ReservesToCash {
                day,
                bank: bank.clone(),
                amount,
            });
            Ok(())
        })
    }

    /// Swap a bank's vault cash for freshly issued reserves.
    pub fn convert_cash_to_reserves(
        &mut self,
        bank: &AgentId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        self.transact(|l| {
            require_positive(amount)?;
            l.agent(bank)?;
            l.consume_money(InstrumentKind::Cash, bank, amount)?;
            let draft = Instrument::reserves(
                bank.clone(),
                l.central_bank.clone(),
                amount,
                l.denomination.clone(),
            );
            l.add_contract(draft)?;
            let day = l.state.day;
            l.log_event(Event::CashToReserves {
                day,
                bank: bank.clone(),
                amount,
            });
            Ok(())
        })
    }

    // --- Deposits ---

    /// Hand cash over the counter: the bank takes the notes into its vault
    /// and credits the customer's deposit account (opening one if needed).
    pub fn deposit_cash(
        &mut self,
        customer: &AgentId,
        bank: &AgentId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        self.transact(|l| {
            l.move_money(InstrumentKind::Cash, customer, bank, amount)?;
            l.credit_deposit(customer, bank, amount)?;
            let day = l.state.day;
            l.log_event(Event::CashDeposited {
                day,
                customer: customer.clone(),
                bank: bank.clone(),
                amount,
            });
            Ok(())
        })
    }

    /// The reverse of [`deposit_cash`](Ledger::deposit_cash): consume deposit
    /// balance, pay out vault cash. Fails with `InsufficientFunds` naming
    /// whichever side is short.
    pub fn withdraw_cash(
        &mut self,
        customer: &AgentId,
        bank: &AgentId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        self.transact(|l| {
            require_positive(amount)?;
            l.agent(customer)?;
            l.agent(bank)?;
            l.consume_deposit_at(customer, bank, amount)?;
            l.move_money(InstrumentKind::Cash, bank, customer, amount)?;
            let day = l.state.day;
            l.log_event(Event::CashWithdrawn {
                day,
                customer: customer.clone(),
                bank: bank.clone(),
                amount,
            });
            Ok(())
        })
    }

    /// Pay `payee` up to `limit` out of `payer`'s deposit balances, walking
    /// pieces in id order. Returns the amount actually paid (zero when the
    /// payer has no deposits or the payee may not hold any).
    ///
    /// The payee is credited at the bank where they already bank, or at the
    /// paying bank otherwise; paying the issuing bank itself just
    /// extinguishes deposit liability. Every credited piece logs a
    /// `ClientPayment` carrying both bank ids — the clearing engine nets the
    /// cross-bank ones at end of day.
    pub fn pay_by_deposit(
        &mut self,
        payer: &AgentId,
        payee: &AgentId,
        limit: Decimal,
    ) -> Result<Decimal, LedgerError> {
        self.transact(|l| {
            require_positive(limit)?;
            if payer == payee {
                return Err(LedgerError::NoOpTransfer {
                    agent: payer.clone(),
                });
            }
            let payee_kind = l.agent(payee)?.kind();
            l.agent(payer)?;
            if !l.policy.can_hold(payee_kind, InstrumentKind::Deposit) {
                return Ok(Decimal::ZERO);
            }

            let pieces = l.holdings(payer, InstrumentKind::Deposit);
            let available = l.total_of(payer, InstrumentKind::Deposit);
            let pay = limit.min(available);
            if pay.is_zero() {
                return Ok(Decimal::ZERO);
            }

            // Route credits to the bank where the payee already banks.
            let target_bank = l
                .holdings(payee, InstrumentKind::Deposit)
                .first()
                .map(|id| l.instrument(*id).map(|i| i.issuer().clone()))
                .transpose()?;

            let mut remaining = pay;
            for piece_id in pieces {
                if remaining.is_zero() {
                    break;
                }
                let piece = l.instrument(piece_id)?;
                let from_bank = piece.issuer().clone();
                let take = piece.amount().min(remaining);
                if take.is_zero() {
                    continue;
                }
                l.consume_piece(piece_id, take)?;
                if *payee == from_bank {
                    // Paying the issuing bank: its liability shrinks, no new claim.
                    remaining -= take;
                    continue;
                }
                let to_bank = target_bank.clone().unwrap_or_else(|| from_bank.clone());
                l.credit_deposit(payee, &to_bank, take)?;
                let day = l.state.day;
                l.log_event(Event::ClientPayment {
                    day,
                    from: payer.clone(),
                    to: payee.clone(),
                    from_bank,
                    to_bank,
                    amount: take,
                });
                remaining -= take;
            }
            Ok(pay)
        })
    }

    // --- Obligations ---

    /// Record that `debtor` owes `creditor` money, optionally due on a day.
    pub fn create_payable(
        &mut self,
        debtor: &AgentId,
        creditor: &AgentId,
        amount: Decimal,
        due_day: Option<u32>,
    ) -> Result<InstrumentId, LedgerError> {
        self.transact(|l| {
            require_positive(amount)?;
            let mut draft = Instrument::payable(
                creditor.clone(),
                debtor.clone(),
                amount,
                l.denomination.clone(),
            );
            if let Some(day) = due_day {
                draft = draft.due_on(day);
            }
            l.add_contract(draft)
        })
    }

    /// Record goods: self-held inventory when `holder == issuer`, a delivery
    /// obligation when a counterparty holds the claim with a due day.
    #[allow(clippy::too_many_arguments)]
    pub fn create_deliverable(
        &mut self,
        issuer: &AgentId,
        holder: &AgentId,
        sku: impl Into<Sku>,
        quantity: Decimal,
        unit_price: Decimal,
        divisible: bool,
        due_day: Option<u32>,
    ) -> Result<InstrumentId, LedgerError> {
        self.transact(|l| {
            require_positive(quantity)?;
            let mut draft = Instrument::deliverable(
                holder.clone(),
                issuer.clone(),
                sku,
                quantity,
                unit_price,
                l.denomination.clone(),
            );
            if !divisible {
                draft = draft.indivisible();
            }
            if let Some(day) = due_day {
                draft = draft.due_on(day);
            }
            l.add_contract(draft)
        })
    }

    /// Reprice a deliverable in place.
    pub fn update_deliverable_price(
        &mut self,
        id: InstrumentId,
        new_price: Decimal,
    ) -> Result<(), LedgerError> {
        self.transact(|l| {
            let instr = l.instrument(id)?;
            let old_price = instr
                .unit_price()
                .ok_or(LedgerError::NotDeliverable { id })?;
            if new_price < Decimal::ZERO {
                return Err(LedgerError::InvalidPrice { price: new_price });
            }
            l.state
                .instruments
                .get_mut(&id)
                .expect("instrument present")
                .set_unit_price(new_price);
            let day = l.state.day;
            l.log_event(Event::DeliverablePriceUpdated {
                day,
                id,
                old_price,
                new_price,
            });
            Ok(())
        })
    }

    /// Move goods between agents, splitting off a partial quantity when the
    /// piece is divisible. Returns the id of the piece the receiver ends up
    /// with (which may be an older piece it was merged into).
    pub fn transfer_deliverable(
        &mut self,
        id: InstrumentId,
        from: &AgentId,
        to: &AgentId,
        quantity: Option<Decimal>,
    ) -> Result<InstrumentId, LedgerError> {
        self.transact(|l| {
            let instr = l.instrument(id)?;
            if instr.kind() != InstrumentKind::Deliverable {
                return Err(LedgerError::NotDeliverable { id });
            }
            if instr.holder() != from {
                return Err(LedgerError::HolderMismatch {
                    id,
                    holder: instr.holder().clone(),
                    claimed: from.clone(),
                });
            }
            if from == to {
                return Err(LedgerError::NoOpTransfer { agent: from.clone() });
            }
            let to_kind = l.agent(to)?.kind();
            if !l.policy.can_hold(to_kind, InstrumentKind::Deliverable) {
                return Err(LedgerError::PolicyViolation {
                    agent: to.clone(),
                    action: PolicyAction::Hold,
                    kind: InstrumentKind::Deliverable,
                });
            }

            let instr = l.instrument(id)?;
            let full = instr.amount();
            let divisible = instr.divisible();
            let qty = quantity.unwrap_or(full);
            if qty <= Decimal::ZERO || qty > full {
                return Err(LedgerError::InvalidAmount { amount: qty });
            }

            let moved = if qty < full {
                if !divisible {
                    return Err(LedgerError::Indivisible { id });
                }
                let twin = l.split_piece(id, qty);
                l.move_holder(twin, to);
                twin
            } else {
                l.move_holder(id, to);
                id
            };
            let survivor = l.absorb_into_existing(moved)?;

            let day = l.state.day;
            l.log_event(Event::DeliverableTransferred {
                day,
                id,
                from: from.clone(),
                to: to.clone(),
                quantity: qty,
            });
            Ok(survivor)
        })
    }

    /// Unconditionally extinguish an instrument once its real-world
    /// counterpart has been honored. Guards against registry corruption: the
    /// cross-reference invariant must hold for this specific instrument.
    pub fn settle_obligation(&mut self, id: InstrumentId) -> Result<(), LedgerError> {
        self.transact(|l| {
            l.check_cross_reference(id)?;
            l.remove_instrument(id);
            let day = l.state.day;
            l.log_event(Event::ObligationSettled { day, id });
            Ok(())
        })
    }

    // --- Invariants ---

    /// Full-scan verification of the ledger invariants. Returns a
    /// description of the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (id, instr) in &self.state.instruments {
            if instr.amount() < Decimal::ZERO {
                return Err(format!("instrument {} has negative amount", id));
            }
            if instr.id() != *id {
                return Err(format!("instrument {} registered under wrong id", id));
            }
            let holder = self
                .state
                .agents
                .get(instr.holder())
                .ok_or_else(|| format!("instrument {} held by unknown agent", id))?;
            if !holder.holds(*id) {
                return Err(format!(
                    "instrument {} missing from holder {}'s assets",
                    id,
                    holder.id()
                ));
            }
            let issuer = self
                .state
                .agents
                .get(instr.issuer())
                .ok_or_else(|| format!("instrument {} issued by unknown agent", id))?;
            if !issuer.owes(*id) {
                return Err(format!(
                    "instrument {} missing from issuer {}'s liabilities",
                    id,
                    issuer.id()
                ));
            }
        }

        for agent in self.state.agents.values() {
            for (side, ids) in [("asset", agent.assets()), ("liability", agent.liabilities())] {
                let mut seen = std::collections::HashSet::new();
                for id in ids {
                    if !seen.insert(*id) {
                        return Err(format!(
                            "agent {} references instrument {} twice in its {} list",
                            agent.id(),
                            id,
                            side
                        ));
                    }
                    if !self.state.instruments.contains_key(id) {
                        return Err(format!(
                            "agent {} references dead instrument {} as {}",
                            agent.id(),
                            id,
                            side
                        ));
                    }
                }
            }
            for id in agent.assets() {
                if self.state.instruments[id].holder() != agent.id() {
                    return Err(format!(
                        "instrument {} in {}'s assets but held by someone else",
                        id,
                        agent.id()
                    ));
                }
            }
            for id in agent.liabilities() {
                if self.state.instruments[id].issuer() != agent.id() {
                    return Err(format!(
                        "instrument {} in {}'s liabilities but issued by someone else",
                        id,
                        agent.id()
                    ));
                }
            }
        }

        let cash_sum: Decimal = self
            .state
            .instruments
            .values()
            .filter(|i| i.kind() == InstrumentKind::Cash)
            .map(|i| i.amount())
            .sum();
        if cash_sum != self.state.cash_outstanding {
            return Err(format!(
                "outstanding cash counter {} != live cash sum {}",
                self.state.cash_outstanding, cash_sum
            ));
        }
        let reserve_sum: Decimal = self
            .state
            .instruments
            .values()
            .filter(|i| i.kind() == InstrumentKind::Reserves)
            .map(|i| i.amount())
            .sum();
        if reserve_sum != self.state.reserves_outstanding {
            return Err(format!(
                "outstanding reserves counter {} != live reserves sum {}",
                self.state.reserves_outstanding, reserve_sum
            ));
        }
        Ok(())
    }

    /// Panic on the first invariant violation. Intended for test/debug
    /// builds and controlled checkpoints; a failure is a programming defect,
    /// not a recoverable condition.
    pub fn assert_invariants(&self) {
        if let Err(violation) = self.check_invariants() {
            panic!("ledger invariant violated: {}", violation);
        }
    }

    // --- Crate-internal primitives ---
    //
    // Everything below is the primitive layer the fungibility module and the
    // settlement engines build on. The outstanding cash/reserve counters are
    // maintained here, at the lowest level that creates, destroys, or
    // resizes instruments, so every composite operation stays conserving.

    pub(crate) fn log_event(&mut self, event: Event) {
        self.state.events.push(event);
    }

    pub(crate) fn advance_day(&mut self) {
        self.state.day += 1;
    }

    fn counter_delta(&mut self, kind: InstrumentKind, delta: Decimal) {
        match kind {
            InstrumentKind::Cash => self.state.cash_outstanding += delta,
            InstrumentKind::Reserves => self.state.reserves_outstanding += delta,
            _ => {}
        }
    }

    /// Assign an id, adjust counters, and cross-reference into both agents.
    pub(crate) fn register(&mut self, mut draft: Instrument) -> InstrumentId {
        let id = InstrumentId::new(self.state.next_instrument);
        self.state.next_instrument += 1;
        draft.assign_id(id);
        self.counter_delta(draft.kind(), draft.amount());

        let holder = draft.holder().clone();
        let issuer = draft.issuer().clone();
        self.state
            .agents
            .get_mut(&holder)
            .expect("holder validated")
            .attach_asset(id);
        self.state
            .agents
            .get_mut(&issuer)
            .expect("issuer validated")
            .attach_liability(id);
        self.state.instruments.insert(id, draft);
        id
    }

    /// Detach from both agents, adjust counters, and delete.
    pub(crate) fn remove_instrument(&mut self, id: InstrumentId) -> Instrument {
        let instr = self
            .state
            .instruments
            .remove(&id)
            .expect("caller checked existence");
        self.counter_delta(instr.kind(), -instr.amount());
        self.state
            .agents
            .get_mut(instr.holder())
            .expect("holder registered")
            .detach_asset(id);
        self.state
            .agents
            .get_mut(instr.issuer())
            .expect("issuer registered")
            .detach_liability(id);
        instr
    }

    /// Resize an instrument in place, keeping the counters in step.
    pub(crate) fn resize_piece(&mut self, id: InstrumentId, new_amount: Decimal) {
        let instr = self
            .state
            .instruments
            .get_mut(&id)
            .expect("caller checked existence");
        let delta = new_amount - instr.amount();
        let kind = instr.kind();
        instr.set_amount(new_amount);
        self.counter_delta(kind, delta);
    }

    /// Change ownership without re-creating the id.
    pub(crate) fn move_holder(&mut self, id: InstrumentId, to: &AgentId) {
        let old_holder = self
            .state
            .instruments
            .get(&id)
            .expect("caller checked existence")
            .holder()
            .clone();
        self.state
            .agents
            .get_mut(&old_holder)
            .expect("holder registered")
            .detach_asset(id);
        self.state
            .agents
            .get_mut(to)
            .expect("receiver validated")
            .attach_asset(id);
        self.state
            .instruments
            .get_mut(&id)
            .expect("present")
            .set_holder(to.clone());
    }

    /// Split `amount` off `id` into a twin piece with the same holder,
    /// issuer, and terms. Caller validates amount and divisibility.
    pub(crate) fn split_piece(&mut self, id: InstrumentId, amount: Decimal) -> InstrumentId {
        let source = self
            .state
            .instruments
            .get(&id)
            .expect("caller checked existence");
        let twin = source.clone_with_amount(amount);
        let rest = source.amount() - amount;
        self.resize_piece(id, rest);
        self.register(twin)
    }

    /// Spend `take` from one piece, deleting it when it hits zero.
    pub(crate) fn consume_piece(
        &mut self,
        id: InstrumentId,
        take: Decimal,
    ) -> Result<(), LedgerError> {
        let amount = self.instrument(id)?.amount();
        if take <= Decimal::ZERO || take > amount {
            return Err(LedgerError::InvalidAmount { amount: take });
        }
        if take == amount {
            self.remove_instrument(id);
        } else {
            self.resize_piece(id, amount - take);
        }
        Ok(())
    }

    /// Greedily consume `amount` of `from`'s holdings of `kind`.
    pub(crate) fn consume_money(
        &mut self,
        kind: InstrumentKind,
        from: &AgentId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        let available = self.total_of(from, kind);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                agent: from.clone(),
                kind,
                required: amount,
                available,
            });
        }
        let mut remaining = amount;
        for id in self.holdings(from, kind) {
            if remaining.is_zero() {
                break;
            }
            let take = self.instrument(id)?.amount().min(remaining);
            if take.is_zero() {
                continue;
            }
            self.consume_piece(id, take)?;
            remaining -= take;
        }
        Ok(())
    }

    /// Move `amount` of `kind` from one agent to another: whole pieces move
    /// by ownership transfer, the last one is split, and the receiver's
    /// pieces are coalesced afterwards. Does not log — callers attach the
    /// appropriate event.
    pub(crate) fn move_money(
        &mut self,
        kind: InstrumentKind,
        from: &AgentId,
        to: &AgentId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        require_positive(amount)?;
        if from == to {
            return Err(LedgerError::NoOpTransfer { agent: from.clone() });
        }
        self.agent(from)?;
        let to_kind = self.agent(to)?.kind();
        if !self.policy.can_hold(to_kind, kind) {
            return Err(LedgerError::PolicyViolation {
                agent: to.clone(),
                action: PolicyAction::Hold,
                kind,
            });
        }
        let available = self.total_of(from, kind);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                agent: from.clone(),
                kind,
                required: amount,
                available,
            });
        }

        let mut remaining = amount;
        for id in self.holdings(from, kind) {
            if remaining.is_zero() {
                break;
            }
            let piece_amount = self.instrument(id)?.amount();
            if piece_amount.is_zero() {
                continue;
            }
            if piece_amount <= remaining {
                self.move_holder(id, to);
                remaining -= piece_amount;
            } else {
                let twin = self.split_piece(id, remaining);
                self.move_holder(twin, to);
                remaining = Decimal::ZERO;
            }
        }
        self.coalesce_money(to, kind);
        Ok(())
    }

    /// Increase the customer's deposit balance at `bank`, opening an account
    /// (a fresh zero-based deposit instrument) when none exists.
    pub(crate) fn credit_deposit(
        &mut self,
        customer: &AgentId,
        bank: &AgentId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        let existing = self
            .holdings(customer, InstrumentKind::Deposit)
            .into_iter()
            .find(|id| self.state.instruments[id].issuer() == bank);
        match existing {
            Some(id) => {
                let current = self.instrument(id)?.amount();
                self.resize_piece(id, current + amount);
            }
            None => {
                let draft = Instrument::deposit(
                    customer.clone(),
                    bank.clone(),
                    amount,
                    self.denomination.clone(),
                );
                self.add_contract(draft)?;
            }
        }
        Ok(())
    }

    /// Consume `amount` from the customer's deposits at one specific bank.
    pub(crate) fn consume_deposit_at(
        &mut self,
        customer: &AgentId,
        bank: &AgentId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        let pieces: Vec<InstrumentId> = self
            .holdings(customer, InstrumentKind::Deposit)
            .into_iter()
            .filter(|id| self.state.instruments[id].issuer() == bank)
            .collect();
        let available: Decimal = pieces
            .iter()
            .map(|id| self.state.instruments[id].amount())
            .sum();
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                agent: customer.clone(),
                kind: InstrumentKind::Deposit,
                required: amount,
                available,
            });
        }
        let mut remaining = amount;
        for id in pieces {
            if remaining.is_zero() {
                break;
            }
            let take = self.instrument(id)?.amount().min(remaining);
            if take.is_zero() {
                continue;
            }
            self.consume_piece(id, take)?;
            remaining -= take;
        }
        Ok(())
    }

    /// Pay up to `limit` cash from one agent to another; returns the amount
    /// actually moved. Skips silently when the receiver may not hold cash —
    /// the waterfall just falls through to the next method.
    pub(crate) fn pay_by_cash(
        &mut self,
        from: &AgentId,
        to: &AgentId,
        limit: Decimal,
    ) -> Result<Decimal, LedgerError> {
        let to_kind = self.agent(to)?.kind();
        if !self.policy.can_hold(to_kind, InstrumentKind::Cash) {
            return Ok(Decimal::ZERO);
        }
        let pay = limit.min(self.total_of(from, InstrumentKind::Cash));
        if pay.is_zero() {
            return Ok(Decimal::ZERO);
        }
        self.move_money(InstrumentKind::Cash, from, to, pay)?;
        let day = self.state.day;
        self.log_event(Event::CashTransferred {
            day,
            from: from.clone(),
            to: to.clone(),
            amount: pay,
        });
        debug!("{} paid {} cash to {}", from, pay, to);
        Ok(pay)
    }

    /// Reserve-funded sibling of [`pay_by_cash`](Ledger::pay_by_cash).
    pub(crate) fn pay_by_reserves(
        &mut self,
        from: &AgentId,
        to: &AgentId,
        limit: Decimal,
    ) -> Result<Decimal, LedgerError> {
        let to_kind = self.agent(to)?.kind();
        if !self.policy.can_hold(to_kind, InstrumentKind::Reserves) {
            return Ok(Decimal::ZERO);
        }
        let pay = limit.min(self.total_of(from, InstrumentKind::Reserves));
        if pay.is_zero() {
            return Ok(Decimal::ZERO);
        }
        self.move_money(InstrumentKind::Reserves, from, to, pay)?;
        let day = self.state.day;
        self.log_event(Event::ReservesTransferred {
            day,
            from: from.clone(),
            to: to.clone(),
            amount: pay,
        });
        debug!("{} paid {} reserves to {}", from, pay, to);
        Ok(pay)
    }

    /// Cross-reference guard for a single instrument.
    fn check_cross_reference(&self, id: InstrumentId) -> Result<(), LedgerError> {
        let instr = self.instrument(id)?;
        let holder = self.agent(instr.holder())?;
        if !holder.holds(id) {
            return Err(LedgerError::Inconsistent {
                id,
                detail: format!("missing from holder {}'s assets", holder.id()),
            });
        }
        let issuer = self.agent(instr.issuer())?;
        if !issuer.owes(id) {
            return Err(LedgerError::Inconsistent {
                id,
                detail: format!("missing from issuer {}'s liabilities", issuer.id()),
            });
        }
        Ok(())
    }
}

fn require_positive(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount { amount });
    }
    Ok(())
}
