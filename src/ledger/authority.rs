// Authority Set - Identities allowed to produce ledger entries
//
// Each node configures its own copy. Nothing distributes or reconciles it
// across the network, so two nodes may disagree on who is authorized.

use crate::ledger::entry::GENESIS_VALIDATOR;
use std::collections::BTreeSet;

/// Identities every node trusts unless configured otherwise
pub const DEFAULT_AUTHORITIES: [&str; 5] = [
    "validator1",
    "validator2",
    GENESIS_VALIDATOR,
    "node_alpha",
    "node_beta",
];

/// Static allow-list of validator identities
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthoritySet {
    members: BTreeSet<String>,
}

impl AuthoritySet {
    /// Create a set from explicit identities
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// The default allow-list plus this node's own identity
    pub fn with_defaults(own_identity: &str) -> Self {
        let mut set = Self::new(DEFAULT_AUTHORITIES);
        set.insert(own_identity);
        set
    }

    /// Add an identity
    pub fn insert(&mut self, identity: &str) {
        self.members.insert(identity.to_string());
    }

    /// Check if an identity may produce entries
    pub fn is_authorized(&self, identity: &str) -> bool {
        self.members.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate identities in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }
}
