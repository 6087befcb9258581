use crate::core::instrument::InstrumentId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an economic agent.
///
/// Agent ids are ordinary strings, but the `Ord` impl is load-bearing:
/// the clearing engine keys interbank nets by the lexicographically
/// smaller bank id, so ordering must be total and stable.
///
/// # Examples
///
/// ```
/// use ledger_engine::core::agent::AgentId;
///
/// let b1 = AgentId::new("B1");
/// let b2 = AgentId::new("B2");
/// assert!(b1 < b2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The closed set of agent kinds.
///
/// The kind drives the policy engine: which instrument kinds the agent may
/// issue or hold, and in what order it prefers to settle its obligations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentKind {
    CentralBank,
    Bank,
    Household,
    Firm,
    Treasury,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentKind::CentralBank => "central bank",
            AgentKind::Bank => "bank",
            AgentKind::Household => "household",
            AgentKind::Firm => "firm",
            AgentKind::Treasury => "treasury",
        };
        write!(f, "{}", s)
    }
}

/// An economic actor that can hold assets and owe liabilities.
///
/// The asset and liability collections hold instrument ids, not instruments;
/// the ledger owns the instruments themselves. Both collections are ordered
/// (insertion order) and an id never appears twice within either — the
/// attach/detach guards enforce that at the lowest level.
///
/// Agents are created once at setup and never deleted during a run. Only the
/// ledger mutates the collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    id: AgentId,
    name: String,
    kind: AgentKind,
    assets: Vec<InstrumentId>,
    liabilities: Vec<InstrumentId>,
}

impl Agent {
    pub fn new(id: impl Into<AgentId>, name: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            assets: Vec::new(),
            liabilities: Vec::new(),
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    /// Ids of the instruments this agent holds as assets, in attach order.
    pub fn assets(&self) -> &[InstrumentId] {
        &self.assets
    }

    /// Ids of the instruments this agent owes as liabilities, in attach order.
    pub fn liabilities(&self) -> &[InstrumentId] {
        &self.liabilities
    }

    pub fn holds(&self, id: InstrumentId) -> bool {
        self.assets.contains(&id)
    }

    pub fn owes(&self, id: InstrumentId) -> bool {
        self.liabilities.contains(&id)
    }

    pub(crate) fn attach_asset(&mut self, id: InstrumentId) {
        assert!(
            !self.assets.contains(&id),
            "instrument {} already attached as asset of {}",
            id,
            self.id
        );
        self.assets.push(id);
    }

    pub(crate) fn detach_asset(&mut self, id: InstrumentId) {
        let before = self.assets.len();
        self.assets.retain(|a| *a != id);
        assert!(
            self.assets.len() == before - 1,
            "instrument {} was not an asset of {}",
            id,
            self.id
        );
    }

    pub(crate) fn attach_liability(&mut self, id: InstrumentId) {
        assert!(
            !self.liabilities.contains(&id),
            "instrument {} already attached as liability of {}",
            id,
            self.id
        );
        self.liabilities.push(id);
    }

    pub(crate) fn detach_liability(&mut self, id: InstrumentId) {
        let before = self.liabilities.len();
        self.liabilities.retain(|l| *l != id);
        assert!(
            self.liabilities.len() == before - 1,
            "instrument {} was not a liability of {}",
            id,
            self.id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_ordering() {
        let a = AgentId::new("B1");
        let b = AgentId::new("B2");
        assert!(a < b);
    }

    #[test]
    fn test_attach_detach() {
        let mut agent = Agent::new("H1", "Household 1", AgentKind::Household);
        let id = InstrumentId::new(7);

        agent.attach_asset(id);
        assert!(agent.holds(id));

        agent.detach_asset(id);
        assert!(!agent.holds(id));
        assert!(agent.assets().is_empty());
    }

    #[test]
    #[should_panic(expected = "already attached")]
    fn test_duplicate_attach_panics() {
        let mut agent = Agent::new("H1", "Household 1", AgentKind::Household);
        let id = InstrumentId::new(7);
        agent.attach_asset(id);
        agent.attach_asset(id);
    }

    #[test]
    fn test_assets_keep_attach_order() {
        let mut agent = Agent::new("F1", "Firm 1", AgentKind::Firm);
        agent.attach_asset(InstrumentId::new(3));
        agent.attach_asset(InstrumentId::new(1));
        agent.attach_asset(InstrumentId::new(2));
        let ids: Vec<u64> = agent.assets().iter().map(|i| i.value()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }
}
