//! Sample data for demo deployments

use std::sync::Arc;

use offermarket_core::{
    Flower, FlowerOfferExtra, FlowerRequestExtra, FlowerType, Marketplace, MemoryContract, Offer, Request,
    Roles,
};
use tracing::info;

const DAY: i64 = 86_400;

/// Bidders and the prices they quote, per request
const BIDS: [(&str, [u64; 2]); 3] = [
    ("0xflorist-amsterdam", [120, 95]),
    ("0xflorist-lisbon", [140, 80]),
    ("0xflorist-oulu", [110, 100]),
];

/// Seed two flower requests with offers and decide the first.
///
/// Returns the ids of the seeded requests.
pub async fn flower_demo(contract: &MemoryContract, now: i64) -> anyhow::Result<Vec<u64>> {
    let market = Marketplace::<Flower>::new(Arc::new(contract.clone()), Roles::owner());

    let wishes = [
        FlowerRequestExtra {
            quantity: 24,
            flower_type: FlowerType::Rose,
        },
        FlowerRequestExtra {
            quantity: 10,
            flower_type: FlowerType::Tulip,
        },
    ];

    let mut request_ids = Vec::with_capacity(wishes.len());
    for extra in wishes {
        let request = market.add_request(&Request::new(now + DAY, extra)).await?;
        if let Some(id) = request.request_id {
            request_ids.push(id);
        }
    }

    for (bidder, prices) in BIDS {
        let bidder_market = Marketplace::<Flower>::new(Arc::new(contract.as_caller(bidder)), Roles::none());
        for (request_id, price) in request_ids.iter().zip(prices) {
            bidder_market
                .add_offer(&Offer::new(*request_id, FlowerOfferExtra { price }))
                .await?;
        }
    }

    if let Some(first) = request_ids.first() {
        market.decide_request_by_id(*first, &[]).await?;
    }

    info!(requests = request_ids.len(), "Demo marketplace seeded");
    Ok(request_ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flower_demo() {
        let contract = MemoryContract::new::<Flower>("0xowner");
        let now = chrono::Utc::now().timestamp();
        let ids = flower_demo(&contract, now).await.unwrap();
        assert_eq!(ids.len(), 2);

        let market = Marketplace::<Flower>::new(Arc::new(contract), Roles::none());
        let decided = market.get_request(ids[0]).await.unwrap().unwrap();
        assert!(decided.is_decided);
        assert_eq!(
            decided.decided_offer().and_then(|o| o.extra.clone()),
            Some(FlowerOfferExtra { price: 140 })
        );

        let open = market.get_request(ids[1]).await.unwrap().unwrap();
        assert!(open.is_open());
        assert_eq!(open.offers.len(), 3);
    }
}
