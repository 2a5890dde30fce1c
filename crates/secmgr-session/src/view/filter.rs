//! Authority-matching predicates used to project a summary.

use std::collections::BTreeSet;

use secmgr_core::types::Authority;

/// Selects the authorities a view draws facts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityFilter {
    /// Every authority.
    Any,
    /// Exactly one authority.
    Only(Authority),
    /// Any authority in the set.
    AnyOf(BTreeSet<Authority>),
}

impl AuthorityFilter {
    /// Whether the authority is selected.
    pub fn matches(&self, authority: &Authority) -> bool {
        match self {
            Self::Any => true,
            Self::Only(only) => only == authority,
            Self::AnyOf(set) => set.contains(authority),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        let a = Authority::for_mechanism("a");
        let b = Authority::for_mechanism("b");
        assert!(AuthorityFilter::Any.matches(&a));
        assert!(AuthorityFilter::Only(a.clone()).matches(&a));
        assert!(!AuthorityFilter::Only(a.clone()).matches(&b));
        assert!(AuthorityFilter::AnyOf([a.clone(), b.clone()].into()).matches(&b));
    }
}
