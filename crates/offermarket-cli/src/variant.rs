//! Per-flavour argument parsing and rendering

use anyhow::{bail, Context};
use offermarket_core::{
    Flower, FlowerOfferExtra, FlowerRequestExtra, FlowerType, Generic, MarketVariant, RawExtra,
};

/// A marketplace flavour the CLI can build payloads for and print
pub trait CliVariant: MarketVariant {
    /// Build a request payload from positional arguments
    fn request_from_args(args: &[String]) -> anyhow::Result<Self::RequestExtra>;

    /// Build an offer payload from positional arguments
    fn offer_from_args(args: &[String]) -> anyhow::Result<Self::OfferExtra>;

    fn describe_request(extra: &Self::RequestExtra) -> String;

    fn describe_offer(extra: &Self::OfferExtra) -> String;
}

impl CliVariant for Flower {
    /// `<quantity> <type>`, the type given by name or index
    fn request_from_args(args: &[String]) -> anyhow::Result<FlowerRequestExtra> {
        let [quantity, flower_type] = args else {
            bail!("expected <quantity> <type>, got {} argument(s)", args.len());
        };
        Ok(FlowerRequestExtra {
            quantity: quantity
                .parse()
                .with_context(|| format!("invalid quantity '{quantity}'"))?,
            flower_type: flower_type.parse::<FlowerType>()?,
        })
    }

    /// `<price>`
    fn offer_from_args(args: &[String]) -> anyhow::Result<FlowerOfferExtra> {
        let [price] = args else {
            bail!("expected <price>, got {} argument(s)", args.len());
        };
        Ok(FlowerOfferExtra {
            price: price.parse().with_context(|| format!("invalid price '{price}'"))?,
        })
    }

    fn describe_request(extra: &FlowerRequestExtra) -> String {
        format!(
            "{} of {} ({})",
            extra.quantity,
            extra.flower_type,
            extra.flower_type.index()
        )
    }

    fn describe_offer(extra: &FlowerOfferExtra) -> String {
        format!("price {}", extra.price)
    }
}

impl CliVariant for Generic {
    fn request_from_args(_args: &[String]) -> anyhow::Result<RawExtra> {
        bail!("cannot build a request for an unrecognised marketplace type")
    }

    fn offer_from_args(_args: &[String]) -> anyhow::Result<RawExtra> {
        bail!("cannot build an offer for an unrecognised marketplace type")
    }

    fn describe_request(extra: &RawExtra) -> String {
        serde_json::to_string(&extra.0).unwrap_or_default()
    }

    fn describe_offer(extra: &RawExtra) -> String {
        serde_json::to_string(&extra.0).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_flower_args() {
        let request = Flower::request_from_args(&args(&["12", "tulip"])).unwrap();
        assert_eq!(request.quantity, 12);
        assert_eq!(request.flower_type, FlowerType::Tulip);

        let request = Flower::request_from_args(&args(&["3", "2"])).unwrap();
        assert_eq!(request.flower_type, FlowerType::Jasmine);
        assert_eq!(Flower::describe_request(&request), "3 of jasmine (2)");

        assert!(Flower::request_from_args(&args(&["3"])).is_err());
        assert!(Flower::request_from_args(&args(&["many", "rose"])).is_err());
        assert!(Flower::request_from_args(&args(&["3", "orchid"])).is_err());

        let offer = Flower::offer_from_args(&args(&["40"])).unwrap();
        assert_eq!(offer.price, 40);
        assert!(Flower::offer_from_args(&args(&[])).is_err());
    }

    #[test]
    fn test_generic_refuses_payloads() {
        assert!(Generic::request_from_args(&args(&["1", "2"])).is_err());
        assert!(Generic::offer_from_args(&args(&["1"])).is_err());
        assert_eq!(Generic::describe_offer(&RawExtra(vec![json!(1), json!("a")])), "[1,\"a\"]");
    }
}
