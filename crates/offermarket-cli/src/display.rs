//! Display utilities for the CLI

use chrono::{DateTime, Utc};
use colored::*;
use offermarket_core::{Offer, Request};

use crate::variant::CliVariant;

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", "━".repeat(60).bright_black());
    println!(" {}", title.bright_white().bold());
    println!("{}", "━".repeat(60).bright_black());
}

pub fn success(message: &str) {
    println!("  {} {}", "✓".bright_green(), message);
}

pub fn error(message: &str) {
    println!("  {} {}", "✗".bright_red(), message.bright_red());
}

pub fn warning(message: &str) {
    println!("  {} {}", "⚠".yellow(), message.yellow());
}

/// Print a labeled value
pub fn labeled(label: &str, value: &str) {
    println!("  {:<10} {}", format!("{label}:").bright_white(), value.bright_cyan());
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

pub fn timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

/// Colored stage label, `DECIDED` taking precedence
pub fn state_label<V: CliVariant>(request: &Request<V>) -> ColoredString {
    let label = request.state_str().to_uppercase();
    if request.is_decided {
        label.bright_magenta()
    } else if request.is_open() {
        label.bright_green()
    } else if request.is_pending() {
        label.yellow()
    } else {
        label.bright_black()
    }
}

/// One-line summary of a request
pub fn request_line<V: CliVariant>(request: &Request<V>, now: i64) -> String {
    let extra = request
        .extra
        .as_ref()
        .map(V::describe_request)
        .unwrap_or_else(|| "(no payload)".to_string());
    let past = if request.is_past_deadline(now) { " PAST" } else { "" };
    format!(
        "#{:<4} {} by {}{} {}",
        request.request_id.unwrap_or_default(),
        extra,
        timestamp(request.deadline),
        past.red(),
        state_label(request)
    )
}

/// One-line summary of an offer
pub fn offer_line<V: CliVariant>(offer: &Offer<V>, decided: bool) -> String {
    let extra = offer
        .extra
        .as_ref()
        .map(V::describe_offer)
        .unwrap_or_else(|| "(no payload)".to_string());
    format!(
        "#{:<4} {} (@{}){}",
        offer.offer_id.unwrap_or_default(),
        extra,
        offer.author.as_deref().unwrap_or("unset"),
        if decided { " DECIDED".bright_magenta().to_string() } else { String::new() }
    )
}
