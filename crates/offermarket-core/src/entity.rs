//! Request and offer snapshots
//!
//! Entities are rebuilt from ledger state on every read. Hydration composes
//! three steps: the common fields reported by the ledger, the flavour's
//! payload decoder, then the flavour's decision cardinality check.

use serde_json::Value;

use crate::error::{MarketError, Result};
use crate::types::{Extra, OfferCommon, OfferId, RequestCommon, RequestId, Stage};
use crate::variant::{MarketVariant, Payload};

/// Decode an extra payload; an empty payload means none is attached yet
fn decode_extra<P: Payload>(extra: &[Value]) -> Result<Option<P>> {
    if extra.is_empty() {
        return Ok(None);
    }
    Ok(Some(P::unmarshal(extra)?))
}

// ============================================================================
// Request
// ============================================================================

/// A solicitation for offers
#[derive(Debug, Clone, PartialEq)]
pub struct Request<V: MarketVariant> {
    /// Assigned by the ledger; `None` until the request is created
    pub request_id: Option<RequestId>,
    /// Deadline in seconds since the Unix epoch
    pub deadline: i64,
    pub stage: Stage,
    pub is_decided: bool,
    pub maker: Option<String>,
    pub decided_at: Option<i64>,
    pub offers: Vec<Offer<V>>,
    pub decided_offers: Vec<Offer<V>>,
    /// `None` while the payload has not been attached
    pub extra: Option<V::RequestExtra>,
}

impl<V: MarketVariant> Request<V> {
    /// A request that has not been submitted yet
    pub fn new(deadline: i64, extra: V::RequestExtra) -> Self {
        Self {
            request_id: None,
            deadline,
            stage: Stage::Pending,
            is_decided: false,
            maker: None,
            decided_at: None,
            offers: Vec::new(),
            decided_offers: Vec::new(),
            extra: Some(extra),
        }
    }

    /// Rebuild a request from ledger data.
    ///
    /// `offers` and `decided_offers` are the already hydrated offers named
    /// by `common.offer_ids` and `common.decided_offer_ids`.
    pub fn from_data(
        request_id: RequestId,
        common: &RequestCommon,
        extra: &[Value],
        offers: Vec<Offer<V>>,
        decided_offers: Vec<Offer<V>>,
    ) -> Result<Self> {
        let mut request = Self::hydrate_base(request_id, common);
        request.offers = offers;
        request.decided_offers = decided_offers;
        request.extra = decode_extra(extra)?;

        V::DECISION_POLICY
            .check_decided(request.is_decided, request.decided_offers.len())
            .map_err(|reason| MarketError::precondition(format!("request {request_id}: {reason}")))?;

        Ok(request)
    }

    fn hydrate_base(request_id: RequestId, common: &RequestCommon) -> Self {
        Self {
            request_id: Some(request_id),
            deadline: common.deadline,
            stage: common.stage,
            is_decided: common.is_decided,
            maker: common.maker.clone(),
            decided_at: common.decided_at,
            offers: Vec::new(),
            decided_offers: Vec::new(),
            extra: None,
        }
    }

    /// Ledger representation of the payload. Inverse of the decoding step
    /// in [`Request::from_data`].
    pub fn marshal_extra(&self) -> Extra {
        self.extra.as_ref().map(Payload::marshal).unwrap_or_default()
    }

    pub fn is_pending(&self) -> bool {
        self.stage.is_pending()
    }

    pub fn is_open(&self) -> bool {
        self.stage.is_open()
    }

    pub fn is_closed(&self) -> bool {
        self.stage.is_closed()
    }

    /// The single winning offer, for flavours that decide on one
    pub fn decided_offer(&self) -> Option<&Offer<V>> {
        self.decided_offers.first()
    }

    pub fn is_past_deadline(&self, now: i64) -> bool {
        now > self.deadline
    }

    /// `decided` once a decision exists, otherwise the stage name
    pub fn state_str(&self) -> &'static str {
        if self.is_decided {
            "decided"
        } else {
            self.stage.as_str()
        }
    }

    pub fn offer_ids(&self) -> Vec<OfferId> {
        self.offers.iter().filter_map(|o| o.offer_id).collect()
    }

    pub fn decided_offer_ids(&self) -> Vec<OfferId> {
        self.decided_offers.iter().filter_map(|o| o.offer_id).collect()
    }
}

// ============================================================================
// Offer
// ============================================================================

/// A bid against a request
#[derive(Debug, Clone, PartialEq)]
pub struct Offer<V: MarketVariant> {
    /// Assigned by the ledger; `None` until the offer is created
    pub offer_id: Option<OfferId>,
    pub request_id: RequestId,
    pub author: Option<String>,
    pub stage: Stage,
    pub extra: Option<V::OfferExtra>,
}

impl<V: MarketVariant> Offer<V> {
    pub fn new(request_id: RequestId, extra: V::OfferExtra) -> Self {
        Self {
            offer_id: None,
            request_id,
            author: None,
            stage: Stage::Pending,
            extra: Some(extra),
        }
    }

    pub fn from_data(offer_id: OfferId, common: &OfferCommon, extra: &[Value]) -> Result<Self> {
        let mut offer = Self::hydrate_base(offer_id, common);
        offer.extra = decode_extra(extra)?;
        Ok(offer)
    }

    fn hydrate_base(offer_id: OfferId, common: &OfferCommon) -> Self {
        Self {
            offer_id: Some(offer_id),
            request_id: common.request_id,
            author: Some(common.author.clone()),
            stage: common.stage,
            extra: None,
        }
    }

    pub fn marshal_extra(&self) -> Extra {
        self.extra.as_ref().map(Payload::marshal).unwrap_or_default()
    }

    pub fn is_pending(&self) -> bool {
        self.stage.is_pending()
    }

    /// Ranking score of the payload, if the flavour ranks offers
    pub fn rank(&self) -> Option<i128> {
        self.extra.as_ref().and_then(V::rank_offer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variants::flower::{Flower, FlowerOfferExtra, FlowerRequestExtra, FlowerType};
    use serde_json::json;

    fn common(is_decided: bool, decided: Vec<OfferId>) -> RequestCommon {
        RequestCommon {
            deadline: 2_000_000_000,
            stage: Stage::Closed,
            is_decided,
            maker: Some("0xmanager".into()),
            offer_ids: vec![4, 5],
            decided_offer_ids: decided,
            decided_at: None,
        }
    }

    fn offer(id: OfferId, price: u64) -> Offer<Flower> {
        Offer {
            offer_id: Some(id),
            request_id: 1,
            author: Some("0xbidder".into()),
            stage: Stage::Open,
            extra: Some(FlowerOfferExtra { price }),
        }
    }

    #[test]
    fn test_request_from_data() {
        let request = Request::<Flower>::from_data(
            1,
            &common(true, vec![5]),
            &[json!(3), json!(1)],
            vec![offer(4, 10), offer(5, 20)],
            vec![offer(5, 20)],
        )
        .unwrap();

        assert_eq!(request.request_id, Some(1));
        assert_eq!(request.state_str(), "decided");
        assert_eq!(request.offer_ids(), vec![4, 5]);
        assert_eq!(request.decided_offer().and_then(|o| o.offer_id), Some(5));
        assert_eq!(
            request.extra,
            Some(FlowerRequestExtra {
                quantity: 3,
                flower_type: FlowerType::Tulip
            })
        );
    }

    #[test]
    fn test_empty_extra_is_transient_pending() {
        let mut data = common(false, vec![]);
        data.stage = Stage::Pending;
        let request = Request::<Flower>::from_data(1, &data, &[], vec![], vec![]).unwrap();
        assert!(request.is_pending());
        assert!(request.extra.is_none());
        assert!(request.marshal_extra().is_empty());
    }

    #[test]
    fn test_two_winners_fail_fast() {
        let result = Request::<Flower>::from_data(
            1,
            &common(true, vec![4, 5]),
            &[json!(3), json!(1)],
            vec![offer(4, 10), offer(5, 20)],
            vec![offer(4, 10), offer(5, 20)],
        );
        assert!(matches!(result, Err(MarketError::Precondition { .. })));
    }

    #[test]
    fn test_malformed_extra_rejected() {
        let result = Request::<Flower>::from_data(
            1,
            &common(false, vec![]),
            &[json!("many")],
            vec![],
            vec![],
        );
        assert!(matches!(result, Err(MarketError::Payload(_))));
    }

    #[test]
    fn test_offer_round_trip() {
        let data = OfferCommon {
            request_id: 1,
            author: "0xbidder".into(),
            stage: Stage::Open,
        };
        let original = offer(7, 42);
        let rebuilt = Offer::<Flower>::from_data(7, &data, &original.marshal_extra()).unwrap();
        assert_eq!(rebuilt, original);
        assert_eq!(rebuilt.rank(), Some(42));
    }

    #[test]
    fn test_deadline() {
        let request = Request::<Flower>::new(
            100,
            FlowerRequestExtra {
                quantity: 1,
                flower_type: FlowerType::Rose,
            },
        );
        assert!(request.request_id.is_none());
        assert!(!request.is_past_deadline(100));
        assert!(request.is_past_deadline(101));
    }
}
