use crate::core::agent::AgentId;
use crate::core::denom::Denomination;
use crate::core::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an instrument.
///
/// Ids are assigned sequentially by the ledger at registration, so a run of
/// the engine is deterministic and replayable: the same operation sequence
/// always yields the same ids. Id `0` is the unassigned placeholder carried
/// by instrument drafts before registration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct InstrumentId(u64);

impl InstrumentId {
    pub const UNASSIGNED: InstrumentId = InstrumentId(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stock-keeping unit tag for deliverable goods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    pub fn new(sku: impl Into<String>) -> Self {
        Self(sku.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Sku {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The closed set of instrument kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum InstrumentKind {
    Cash,
    Deposit,
    Reserves,
    Payable,
    Deliverable,
}

impl InstrumentKind {
    /// Whether instruments of this kind are financial claims.
    ///
    /// Deliverables are claims on goods, everything else on money.
    pub fn is_financial(&self) -> bool {
        match self {
            InstrumentKind::Cash
            | InstrumentKind::Deposit
            | InstrumentKind::Reserves
            | InstrumentKind::Payable => true,
            InstrumentKind::Deliverable => false,
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstrumentKind::Cash => "cash",
            InstrumentKind::Deposit => "deposit",
            InstrumentKind::Reserves => "reserves",
            InstrumentKind::Payable => "payable",
            InstrumentKind::Deliverable => "deliverable",
        };
        write!(f, "{}", s)
    }
}

/// Type-specific contract terms.
///
/// Every variant carries the complete field set for its kind — there is no
/// optional-attribute fallback anywhere; code that needs a type-specific
/// field matches on the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terms {
    Cash,
    Deposit,
    Reserves,
    Payable {
        due_day: Option<u32>,
    },
    Deliverable {
        sku: Sku,
        unit_price: Decimal,
        divisible: bool,
        due_day: Option<u32>,
    },
}

impl Terms {
    pub fn kind(&self) -> InstrumentKind {
        match self {
            Terms::Cash => InstrumentKind::Cash,
            Terms::Deposit => InstrumentKind::Deposit,
            Terms::Reserves => InstrumentKind::Reserves,
            Terms::Payable { .. } => InstrumentKind::Payable,
            Terms::Deliverable { .. } => InstrumentKind::Deliverable,
        }
    }
}

/// A bilateral contract between exactly one asset-holder and one
/// liability-issuer.
///
/// Constructors build unregistered drafts (id [`InstrumentId::UNASSIGNED`]);
/// the ledger assigns the real id when the draft is registered via
/// `add_contract` or one of the issuance operations.
///
/// # Examples
///
/// ```
/// use ledger_engine::core::instrument::Instrument;
/// use ledger_engine::core::denom::Denomination;
/// use rust_decimal_macros::dec;
///
/// let payable = Instrument::payable("H2", "H1", dec!(150), Denomination::new("USD"))
///     .due_on(5);
/// assert_eq!(payable.due_day(), Some(5));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    id: InstrumentId,
    holder: AgentId,
    issuer: AgentId,
    amount: Decimal,
    denomination: Denomination,
    terms: Terms,
}

impl Instrument {
    fn draft(
        holder: impl Into<AgentId>,
        issuer: impl Into<AgentId>,
        amount: Decimal,
        denomination: Denomination,
        terms: Terms,
    ) -> Self {
        Self {
            id: InstrumentId::UNASSIGNED,
            holder: holder.into(),
            issuer: issuer.into(),
            amount,
            denomination,
            terms,
        }
    }

    pub fn cash(
        holder: impl Into<AgentId>,
        issuer: impl Into<AgentId>,
        amount: Decimal,
        denomination: Denomination,
    ) -> Self {
        Self::draft(holder, issuer, amount, denomination, Terms::Cash)
    }

    pub fn deposit(
        customer: impl Into<AgentId>,
        bank: impl Into<AgentId>,
        amount: Decimal,
        denomination: Denomination,
    ) -> Self {
        Self::draft(customer, bank, amount, denomination, Terms::Deposit)
    }

    pub fn reserves(
        bank: impl Into<AgentId>,
        central_bank: impl Into<AgentId>,
        amount: Decimal,
        denomination: Denomination,
    ) -> Self {
        Self::draft(bank, central_bank, amount, denomination, Terms::Reserves)
    }

    /// A payable: `debtor` owes `creditor` the amount. The creditor holds the
    /// claim, the debtor issues it.
    pub fn payable(
        creditor: impl Into<AgentId>,
        debtor: impl Into<AgentId>,
        amount: Decimal,
        denomination: Denomination,
    ) -> Self {
        Self::draft(
            creditor,
            debtor,
            amount,
            denomination,
            Terms::Payable { due_day: None },
        )
    }

    /// A deliverable: `quantity` units of `sku`, divisible by default.
    /// With `holder == issuer` it is self-held inventory; with a holder and a
    /// `due_day` it is a delivery obligation.
    pub fn deliverable(
        holder: impl Into<AgentId>,
        issuer: impl Into<AgentId>,
        sku: impl Into<Sku>,
        quantity: Decimal,
        unit_price: Decimal,
        denomination: Denomination,
    ) -> Self {
        Self::draft(
            holder,
            issuer,
            quantity,
            denomination,
            Terms::Deliverable {
                sku: sku.into(),
                unit_price,
                divisible: true,
                due_day: None,
            },
        )
    }

    /// Set the due day (payables and deliverables only; no-op otherwise).
    pub fn due_on(mut self, day: u32) -> Self {
        match &mut self.terms {
            Terms::Payable { due_day } | Terms::Deliverable { due_day, .. } => {
                *due_day = Some(day)
            }
            _ => {}
        }
        self
    }

    /// Mark a deliverable as indivisible (no-op for other kinds).
    pub fn indivisible(mut self) -> Self {
        if let Terms::Deliverable { divisible, .. } = &mut self.terms {
            *divisible = false;
        }
        self
    }

    // --- Accessors ---

    pub fn id(&self) -> InstrumentId {
        self.id
    }

    pub fn holder(&self) -> &AgentId {
        &self.holder
    }

    pub fn issuer(&self) -> &AgentId {
        &self.issuer
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn denomination(&self) -> &Denomination {
        &self.denomination
    }

    pub fn terms(&self) -> &Terms {
        &self.terms
    }

    pub fn kind(&self) -> InstrumentKind {
        self.terms.kind()
    }

    pub fn is_financial(&self) -> bool {
        self.kind().is_financial()
    }

    pub fn due_day(&self) -> Option<u32> {
        match &self.terms {
            Terms::Payable { due_day } | Terms::Deliverable { due_day, .. } => *due_day,
            _ => None,
        }
    }

    pub fn sku(&self) -> Option<&Sku> {
        match &self.terms {
            Terms::Deliverable { sku, .. } => Some(sku),
            _ => None,
        }
    }

    pub fn unit_price(&self) -> Option<Decimal> {
        match &self.terms {
            Terms::Deliverable { unit_price, .. } => Some(*unit_price),
            _ => None,
        }
    }

    /// Whether pieces can be split off. Money-like kinds and payables are
    /// always divisible; deliverables carry an explicit flag.
    pub fn divisible(&self) -> bool {
        match &self.terms {
            Terms::Deliverable { divisible, .. } => *divisible,
            _ => true,
        }
    }

    /// Validate the instrument's own type invariants (no registry context).
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.amount < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount {
                amount: self.amount,
            });
        }
        match &self.terms {
            Terms::Deliverable { unit_price, .. } => {
                if *unit_price < Decimal::ZERO {
                    return Err(LedgerError::InvalidPrice { price: *unit_price });
                }
            }
            _ => {
                // Only deliverables may be self-held (inventory pending obligation).
                if self.holder == self.issuer {
                    return Err(LedgerError::SelfIssued {
                        agent: self.holder.clone(),
                        kind: self.kind(),
                    });
                }
            }
        }
        Ok(())
    }

    // --- Ledger-internal mutators ---

    pub(crate) fn assign_id(&mut self, id: InstrumentId) {
        debug_assert_eq!(self.id, InstrumentId::UNASSIGNED);
        self.id = id;
    }

    pub(crate) fn set_amount(&mut self, amount: Decimal) {
        debug_assert!(amount >= Decimal::ZERO);
        self.amount = amount;
    }

    pub(crate) fn set_holder(&mut self, holder: AgentId) {
        self.holder = holder;
    }

    pub(crate) fn set_unit_price(&mut self, price: Decimal) {
        if let Terms::Deliverable { unit_price, .. } = &mut self.terms {
            *unit_price = price;
        }
    }

    /// An unregistered twin of this instrument with a different amount —
    /// same holder, issuer, denomination, and terms. Used by split.
    pub(crate) fn clone_with_amount(&self, amount: Decimal) -> Instrument {
        let mut twin = self.clone();
        twin.id = InstrumentId::UNASSIGNED;
        twin.amount = amount;
        twin
    }
}
