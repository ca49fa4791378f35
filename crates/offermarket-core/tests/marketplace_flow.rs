use std::sync::Arc;

use serde_json::json;

use offermarket_core::{
    Contract, ContractStatus, EventKind, EventSource, Flower, FlowerOfferExtra, FlowerRequestExtra,
    FlowerType, ManualClock, MarketError, Marketplace, MemoryContract, Offer, Request, Roles,
};

const OWNER: &str = "0xowner";
const FAR_DEADLINE: i64 = 2_000_000_000;

fn ledger() -> MemoryContract {
    MemoryContract::new::<Flower>(OWNER).with_clock(Arc::new(ManualClock::new(1_700_000_000)))
}

fn manager_market(contract: &MemoryContract) -> Marketplace<Flower> {
    Marketplace::new(Arc::new(contract.clone()), Roles::owner())
}

fn bidder_market(contract: &MemoryContract, account: &str) -> Marketplace<Flower> {
    Marketplace::new(Arc::new(contract.as_caller(account)), Roles::none())
}

fn roses(quantity: u64) -> Request<Flower> {
    Request::new(
        FAR_DEADLINE,
        FlowerRequestExtra {
            quantity,
            flower_type: FlowerType::Rose,
        },
    )
}

#[tokio::test]
async fn created_request_starts_pending() {
    let contract = ledger();
    let market = manager_market(&contract);

    let request_id = market.create_request(FAR_DEADLINE).await.unwrap();
    let request = market.get_request(request_id).await.unwrap().unwrap();

    assert_eq!(request.request_id, Some(request_id));
    assert!(request.is_pending());
    assert!(request.extra.is_none());
    assert_eq!(request.maker.as_deref(), Some(OWNER));
}

#[tokio::test]
async fn attaching_valid_extra_twice_opens_request() {
    let contract = ledger();
    let market = manager_market(&contract);
    let request_id = market.create_request(FAR_DEADLINE).await.unwrap();

    assert!(market.add_request_extra(request_id, &[json!(1), json!(1)]).await.unwrap());
    assert!(market.add_request_extra(request_id, &[json!(1), json!(1)]).await.unwrap());

    let request = market.get_request(request_id).await.unwrap().unwrap();
    assert!(request.is_open());
    assert_eq!(
        request.extra,
        Some(FlowerRequestExtra {
            quantity: 1,
            flower_type: FlowerType::Tulip
        })
    );
}

#[tokio::test]
async fn deciding_twice_changes_nothing() {
    let contract = ledger();
    let market = manager_market(&contract);
    let request = market.add_request(&roses(12)).await.unwrap();
    let request_id = request.request_id.unwrap();

    let bidder = bidder_market(&contract, "0xbidder");
    bidder
        .add_offer(&Offer::new(request_id, FlowerOfferExtra { price: 40 }))
        .await
        .unwrap();

    assert!(market.decide_request(&request, &[]).await.unwrap());
    let decided = market.get_request(request_id).await.unwrap().unwrap();

    assert!(!market.decide_request(&request, &[]).await.unwrap());
    let again = market.get_request(request_id).await.unwrap().unwrap();
    assert_eq!(decided, again);
    assert_eq!(again.state_str(), "decided");
}

#[tokio::test]
async fn non_manager_cannot_add_request() {
    let contract = ledger();
    let market = bidder_market(&contract, "0xbidder");

    let result = market.add_request(&roses(3)).await;
    assert!(matches!(result, Err(MarketError::ManagerAccessRequired)));
    assert!(contract.get_request_ids().await.unwrap().is_empty());
    assert!(contract.events_since(0).await.unwrap().is_empty());
}

#[tokio::test]
async fn offer_on_unknown_request_is_rejected() {
    let contract = ledger();
    let market = bidder_market(&contract, "0xbidder");

    let result = market
        .add_offer(&Offer::new(77, FlowerOfferExtra { price: 5 }))
        .await;
    assert!(matches!(
        result,
        Err(MarketError::Rejected {
            status: Some(ContractStatus::UndefinedId),
            ..
        })
    ));
}

#[tokio::test]
async fn highest_offer_wins_the_auction() {
    let contract = ledger();
    let market = manager_market(&contract);
    let request = market.add_request(&roses(100)).await.unwrap();
    let request_id = request.request_id.unwrap();
    assert!(request.is_open());

    let alice = bidder_market(&contract, "0xalice");
    let bob = bidder_market(&contract, "0xbob");
    alice
        .add_offer(&Offer::new(request_id, FlowerOfferExtra { price: 100 }))
        .await
        .unwrap();
    let best = bob
        .add_offer(&Offer::new(request_id, FlowerOfferExtra { price: 666 }))
        .await
        .unwrap();
    alice
        .add_offer(&Offer::new(request_id, FlowerOfferExtra { price: 13 }))
        .await
        .unwrap();

    let offers = market.get_offers(request_id).await.unwrap().unwrap();
    assert_eq!(offers.len(), 3);

    assert!(market.decide_request(&request, &offers).await.unwrap());
    let decided = market.get_request(request_id).await.unwrap().unwrap();
    assert!(decided.is_closed());
    assert_eq!(decided.decided_offer(), Some(&best));
    assert_eq!(best.author.as_deref(), Some("0xbob"));

    let kinds: Vec<EventKind> = contract
        .events_since(0)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert!(kinds.contains(&EventKind::RequestDecided));
}

#[tokio::test]
async fn invalid_request_extra_leaves_no_orphan() {
    let contract = ledger();
    let market = manager_market(&contract);

    let result = market.add_request(&roses(0)).await;
    assert!(matches!(
        result,
        Err(MarketError::RequestExtraRejected {
            compensated: true,
            ..
        })
    ));
    assert!(market.get_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn closed_requests_can_be_deleted() {
    let contract = ledger();
    let market = manager_market(&contract);
    let request_id = market.add_request(&roses(2)).await.unwrap().request_id.unwrap();

    assert!(!market.delete_request(request_id).await.unwrap());
    assert!(market.close_request(request_id).await.unwrap());
    assert!(market.delete_request(request_id).await.unwrap());
    assert!(market.get_request(request_id).await.unwrap().is_none());
}

#[tokio::test]
async fn all_offers_span_requests() {
    let contract = ledger();
    let market = manager_market(&contract);
    let first = market.add_request(&roses(1)).await.unwrap().request_id.unwrap();
    let second = market.add_request(&roses(2)).await.unwrap().request_id.unwrap();

    let bidder = bidder_market(&contract, "0xbidder");
    for (request_id, price) in [(first, 1), (second, 2), (second, 3)] {
        bidder
            .add_offer(&Offer::new(request_id, FlowerOfferExtra { price }))
            .await
            .unwrap();
    }

    let offers = market.get_all_offers().await.unwrap();
    assert_eq!(offers.len(), 3);
    assert_eq!(market.get_requests().await.unwrap().len(), 2);
}
