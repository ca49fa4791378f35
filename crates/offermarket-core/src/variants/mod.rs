//! Known marketplace flavours and the registry resolving them by type name

pub mod flower;
pub mod generic;

use std::fmt;
use std::str::FromStr;

use crate::variant::MarketVariant;

pub use flower::{Flower, FlowerOfferExtra, FlowerRequestExtra, FlowerType};
pub use generic::{Generic, RawExtra};

/// Flavours this build knows how to interpret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketKind {
    Flower,
    Generic,
}

impl MarketKind {
    /// Resolve a ledger-reported type name, falling back to [`MarketKind::Generic`]
    pub fn from_type_name(type_name: &str) -> Self {
        if type_name == Flower::TYPE_NAME {
            MarketKind::Flower
        } else {
            MarketKind::Generic
        }
    }

    /// Prefer an explicit override over the reported type name
    pub fn resolve(override_type: Option<&str>, reported: &str) -> Self {
        match override_type {
            Some(name) => name.parse().unwrap_or_else(|_| Self::from_type_name(name)),
            None => Self::from_type_name(reported),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            MarketKind::Flower => Flower::TYPE_NAME,
            MarketKind::Generic => Generic::TYPE_NAME,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            MarketKind::Flower => "flower",
            MarketKind::Generic => "generic",
        }
    }
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for MarketKind {
    type Err = String;

    /// Accepts a short name or a full ledger type name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flower" => Ok(MarketKind::Flower),
            "generic" => Ok(MarketKind::Generic),
            name if name == Flower::TYPE_NAME => Ok(MarketKind::Flower),
            other => Err(format!("unknown marketplace type '{other}'")),
        }
    }
}
