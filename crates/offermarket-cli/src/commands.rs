//! Subcommand implementations, generic over the marketplace flavour

use colored::*;
use offermarket_core::{Marketplace, Offer, Request, RequestId};

use crate::display;
use crate::variant::CliVariant;

/// Subcommands after their arguments have been read
#[derive(Debug, Clone)]
pub enum Action {
    List,
    Show { request: RequestId },
    AddRequest { deadline: i64, params: Vec<String> },
    AddOffer { request: RequestId, params: Vec<String> },
    DecideRequest { request: RequestId },
    CloseRequest { request: RequestId },
    DeleteRequest { request: RequestId },
    Info,
}

pub async fn run<V: CliVariant>(market: &Marketplace<V>, action: Action, now: i64) -> anyhow::Result<()> {
    match action {
        Action::List => list(market, now).await,
        Action::Show { request } => show(market, request, now).await,
        Action::AddRequest { deadline, params } => add_request(market, deadline, &params, now).await,
        Action::AddOffer { request, params } => add_offer(market, request, &params).await,
        Action::DecideRequest { request } => decide(market, request).await,
        Action::CloseRequest { request } => close(market, request).await,
        Action::DeleteRequest { request } => delete(market, request).await,
        Action::Info => info(market).await,
    }
}

async fn list<V: CliVariant>(market: &Marketplace<V>, now: i64) -> anyhow::Result<()> {
    let mut requests = market.get_requests().await?;
    requests.sort_by_key(|r| r.request_id);

    if requests.is_empty() {
        println!("No requests");
    }
    for request in &requests {
        println!("{}", display::request_line(request, now));
    }
    Ok(())
}

async fn show<V: CliVariant>(market: &Marketplace<V>, request_id: RequestId, now: i64) -> anyhow::Result<()> {
    let Some(request) = market.get_request(request_id).await? else {
        display::error(&format!("Request {request_id} does not exist"));
        return Ok(());
    };

    display::section(&format!("Request #{request_id}"));
    let past = if request.is_past_deadline(now) { " (PAST)" } else { "" };
    display::labeled("Deadline", &format!("{}{}", display::timestamp(request.deadline), past));
    display::labeled("Maker", request.maker.as_deref().unwrap_or("unknown"));
    display::labeled("State", &display::state_label(&request).to_string());
    display::labeled("Decided", display::yes_no(request.is_decided));
    display::labeled("Pending", display::yes_no(request.is_pending()));
    display::labeled("Open", display::yes_no(request.is_open()));
    display::labeled("Closed", display::yes_no(request.is_closed()));
    if let Some(extra) = &request.extra {
        display::labeled("Details", &V::describe_request(extra));
    }

    println!();
    if request.offers.is_empty() {
        println!("  No offers");
    } else {
        println!("  {}", "Offers:".bright_white());
        let winners = request.decided_offer_ids();
        for offer in &request.offers {
            let decided = offer.offer_id.map(|id| winners.contains(&id)).unwrap_or(false);
            println!("    {}", display::offer_line(offer, decided));
        }
    }
    Ok(())
}

async fn add_request<V: CliVariant>(
    market: &Marketplace<V>,
    deadline: i64,
    params: &[String],
    now: i64,
) -> anyhow::Result<()> {
    let extra = V::request_from_args(params)?;
    let request = market.add_request(&Request::new(deadline, extra)).await?;
    display::success(&format!("Added {}", display::request_line(&request, now)));
    Ok(())
}

async fn add_offer<V: CliVariant>(market: &Marketplace<V>, request_id: RequestId, params: &[String]) -> anyhow::Result<()> {
    let extra = V::offer_from_args(params)?;
    if market.get_request(request_id).await?.is_none() {
        display::error(&format!("Request {request_id} does not exist"));
        return Ok(());
    }

    let offer = market.add_offer(&Offer::new(request_id, extra)).await?;
    display::success(&format!(
        "Offer {} for request {request_id} added",
        display::offer_line(&offer, false)
    ));
    Ok(())
}

async fn decide<V: CliVariant>(market: &Marketplace<V>, request_id: RequestId) -> anyhow::Result<()> {
    let Some(request) = market.get_request(request_id).await? else {
        display::error(&format!("Request {request_id} does not exist"));
        return Ok(());
    };
    if request.is_decided {
        display::warning(&format!("Request {request_id} has already been decided"));
        return Ok(());
    }

    if market.decide_request(&request, &selection(&request)).await? {
        display::success(&format!("Request {request_id} has now been decided"));
    } else {
        display::error(&format!("Request {request_id} could not be decided"));
    }
    Ok(())
}

/// Offers handed to the ledger as the winners. Flavours where the ledger
/// picks the winners ignore the selection; pending offers are never eligible.
fn selection<V: CliVariant>(request: &Request<V>) -> Vec<Offer<V>> {
    if !V::DECISION_POLICY.caller_selects() {
        return Vec::new();
    }
    request.offers.iter().filter(|o| !o.is_pending()).cloned().collect()
}

async fn close<V: CliVariant>(market: &Marketplace<V>, request_id: RequestId) -> anyhow::Result<()> {
    if market.close_request(request_id).await? {
        display::success(&format!("Request {request_id} closed"));
    } else {
        display::error(&format!("Request {request_id} could not be closed"));
    }
    Ok(())
}

async fn delete<V: CliVariant>(market: &Marketplace<V>, request_id: RequestId) -> anyhow::Result<()> {
    if market.delete_request(request_id).await? {
        display::success(&format!("Request {request_id} deleted"));
    } else {
        display::error(&format!("Request {request_id} could not be deleted, is it closed?"));
    }
    Ok(())
}

async fn info<V: CliVariant>(market: &Marketplace<V>) -> anyhow::Result<()> {
    let info = market.info().await?;
    display::section("Marketplace");
    display::labeled("Type", &info.type_name);
    display::labeled("Owner", &info.owner);
    display::labeled("Address", &info.address);
    display::labeled("Network", &info.network);
    display::labeled("Manager", display::yes_no(market.is_manager()));
    display::labeled("Owner", display::yes_no(market.is_owner()));
    Ok(())
}
