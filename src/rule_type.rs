//! Domain rule item definitions.

/// RuleItemKind distinguishes exact and suffix domain rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleItemKind {
    /// Exact domain match
    Domain,
    /// Domain suffix match (value carries the leading dot)
    DomainSuffix,
}

impl RuleItemKind {
    /// Convert to the geosite item type byte.
    pub fn as_u8(&self) -> u8 {
        match self {
            RuleItemKind::Domain => 0,
            RuleItemKind::DomainSuffix => 1,
        }
    }

    /// Convert from a geosite item type byte.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(RuleItemKind::Domain),
            1 => Some(RuleItemKind::DomainSuffix),
            _ => None,
        }
    }
}

/// A single domain rule: kind plus value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleItem {
    pub kind: RuleItemKind,
    pub value: String,
}

impl RuleItem {
    /// Exact domain rule.
    pub fn domain(value: impl Into<String>) -> Self {
        Self {
            kind: RuleItemKind::Domain,
            value: value.into(),
        }
    }

    /// Domain suffix rule.
    pub fn suffix(value: impl Into<String>) -> Self {
        Self {
            kind: RuleItemKind::DomainSuffix,
            value: value.into(),
        }
    }
}
