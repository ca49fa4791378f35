//! Flower auction: requests ask for a quantity of one flower type, offers
//! quote a price, and the ledger awards the single highest-priced offer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::PayloadError;
use crate::types::Extra;
use crate::variant::{DecisionPolicy, MarketVariant, Payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowerType {
    Rose,
    Tulip,
    Jasmine,
    White,
}

impl FlowerType {
    pub const ALL: [FlowerType; 4] = [
        FlowerType::Rose,
        FlowerType::Tulip,
        FlowerType::Jasmine,
        FlowerType::White,
    ];

    pub fn index(&self) -> u64 {
        match self {
            FlowerType::Rose => 0,
            FlowerType::Tulip => 1,
            FlowerType::Jasmine => 2,
            FlowerType::White => 3,
        }
    }

    pub fn from_index(index: u64) -> Option<Self> {
        Self::ALL.get(usize::try_from(index).ok()?).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowerType::Rose => "rose",
            FlowerType::Tulip => "tulip",
            FlowerType::Jasmine => "jasmine",
            FlowerType::White => "white",
        }
    }
}

impl fmt::Display for FlowerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowerType {
    type Err = PayloadError;

    /// Accepts a type name or its numeric index
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if let Ok(index) = s.parse::<u64>() {
            return Self::from_index(index)
                .ok_or_else(|| PayloadError::invalid_field("type", format!("unknown index {index}")));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                PayloadError::invalid_field("type", format!("'{s}' is not one of rose, tulip, jasmine, white"))
            })
    }
}

/// Accept both the flat `[a, b]` form and the nested `[[a, b]]` form
fn flatten(extra: &[Value]) -> &[Value] {
    match extra {
        [Value::Array(inner)] => inner,
        _ => extra,
    }
}

fn expect_len(extra: &[Value], expected: usize) -> Result<(), PayloadError> {
    if extra.len() != expected {
        return Err(PayloadError::WrongLength {
            expected,
            actual: extra.len(),
        });
    }
    Ok(())
}

fn unsigned(value: &Value, field: &str) -> Result<u64, PayloadError> {
    value
        .as_u64()
        .ok_or_else(|| PayloadError::invalid_field(field, format!("expected a non-negative integer, got {value}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowerRequestExtra {
    pub quantity: u64,
    pub flower_type: FlowerType,
}

impl Payload for FlowerRequestExtra {
    fn marshal(&self) -> Extra {
        vec![json!(self.quantity), json!(self.flower_type.index())]
    }

    fn unmarshal(extra: &[Value]) -> Result<Self, PayloadError> {
        let extra = flatten(extra);
        expect_len(extra, 2)?;
        let quantity = unsigned(&extra[0], "quantity")?;
        let flower_type = match &extra[1] {
            Value::String(name) => name.parse()?,
            other => {
                let index = unsigned(other, "type")?;
                FlowerType::from_index(index)
                    .ok_or_else(|| PayloadError::invalid_field("type", format!("unknown index {index}")))?
            }
        };
        Ok(Self {
            quantity,
            flower_type,
        })
    }

    fn is_valid(&self) -> bool {
        self.quantity > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowerOfferExtra {
    pub price: u64,
}

impl Payload for FlowerOfferExtra {
    fn marshal(&self) -> Extra {
        vec![json!(self.price)]
    }

    fn unmarshal(extra: &[Value]) -> Result<Self, PayloadError> {
        let extra = flatten(extra);
        expect_len(extra, 1)?;
        Ok(Self {
            price: unsigned(&extra[0], "price")?,
        })
    }
}

/// The flower auction marketplace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flower;

impl MarketVariant for Flower {
    const TYPE_NAME: &'static str = "eu.sofie-iot.offer-marketplace-demo.flower";
    const DECISION_POLICY: DecisionPolicy = DecisionPolicy::ContractSelects { max_winners: 1 };

    type RequestExtra = FlowerRequestExtra;
    type OfferExtra = FlowerOfferExtra;

    fn rank_offer(extra: &FlowerOfferExtra) -> Option<i128> {
        Some(i128::from(extra.price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Offer, Request};
    use crate::types::{OfferCommon, RequestCommon, Stage};
    use proptest::prelude::*;

    fn flower_type() -> impl Strategy<Value = FlowerType> {
        (0u64..4).prop_map(|i| FlowerType::from_index(i).unwrap())
    }

    proptest! {
        #[test]
        fn request_extra_survives_hydration(
            quantity in any::<u64>(),
            flower_type in flower_type(),
            deadline in 0i64..4_000_000_000,
        ) {
            let original = Request::<Flower>::new(deadline, FlowerRequestExtra { quantity, flower_type });
            let common = RequestCommon { deadline, ..Default::default() };
            let rebuilt = Request::<Flower>::from_data(9, &common, &original.marshal_extra(), vec![], vec![]).unwrap();
            prop_assert_eq!(rebuilt.extra, original.extra);
            prop_assert_eq!(rebuilt.deadline, original.deadline);
        }

        #[test]
        fn offer_extra_survives_hydration(price in any::<u64>(), request_id in 1u64..1000) {
            let original = Offer::<Flower>::new(request_id, FlowerOfferExtra { price });
            let common = OfferCommon { request_id, author: "0xa".into(), stage: Stage::Open };
            let rebuilt = Offer::<Flower>::from_data(3, &common, &original.marshal_extra()).unwrap();
            prop_assert_eq!(rebuilt.extra, original.extra);
            prop_assert_eq!(rebuilt.request_id, request_id);
        }
    }

    #[test]
    fn test_unmarshal_accepts_names_and_nesting() {
        let flat = FlowerRequestExtra::unmarshal(&[json!(20), json!("white")]).unwrap();
        let nested = FlowerRequestExtra::unmarshal(&[json!([20, 3])]).unwrap();
        assert_eq!(flat, nested);
        assert_eq!(flat.flower_type, FlowerType::White);
        assert_eq!(flat.marshal(), vec![json!(20), json!(3)]);
    }

    #[test]
    fn test_unmarshal_errors() {
        assert_eq!(
            FlowerRequestExtra::unmarshal(&[json!(1)]),
            Err(PayloadError::WrongLength {
                expected: 2,
                actual: 1
            })
        );
        assert!(FlowerRequestExtra::unmarshal(&[json!(1), json!(9)]).is_err());
        assert!(FlowerRequestExtra::unmarshal(&[json!(-1), json!(0)]).is_err());
        assert!(FlowerOfferExtra::unmarshal(&[json!("cheap")]).is_err());
    }

    #[test]
    fn test_validity() {
        let zero = FlowerRequestExtra {
            quantity: 0,
            flower_type: FlowerType::Rose,
        };
        assert!(!zero.is_valid());
        assert!(FlowerRequestExtra::unmarshal(&[json!(1), json!(1)]).unwrap().is_valid());
    }

    #[test]
    fn test_flower_type_parse() {
        assert_eq!("Jasmine".parse::<FlowerType>().unwrap(), FlowerType::Jasmine);
        assert_eq!("1".parse::<FlowerType>().unwrap(), FlowerType::Tulip);
        assert!("lily".parse::<FlowerType>().is_err());
    }
}
