//! In-game command surface
//!
//! The chat grammar `trade <target> | accept | deny | cancel | confirm |
//! complete | history` maps 1:1 onto coordinator operations. The host
//! resolves display names to party ids before dispatch; the demo binary
//! derives ids from lowercased names.

use crate::coordinator::TradeCoordinator;
use crate::domain::Party;

pub const USAGE: &str =
    "Usage: trade <player> | trade accept | trade deny | trade cancel | trade confirm | trade complete | trade history";

/// One parsed `trade ...` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeCommand {
    Request { target: String },
    Accept,
    Deny,
    Cancel,
    Confirm,
    Complete,
    History,
}

/// Split a raw shell line of the form `<caller> trade <args...>` into the
/// caller name and the argument string. The keyword token must be exactly
/// `trade` (case-insensitive).
pub fn split_line(line: &str) -> Option<(&str, &str)> {
    let (caller, rest) = line.split_once(char::is_whitespace)?;
    let rest = rest.trim_start();
    let (keyword, args) = rest
        .split_once(char::is_whitespace)
        .unwrap_or((rest, ""));
    if !keyword.eq_ignore_ascii_case("trade") {
        return None;
    }
    Some((caller, args.trim()))
}

/// Parse the arguments following the `trade` keyword
pub fn parse(args: &str) -> Result<TradeCommand, String> {
    let mut tokens = args.split_whitespace();
    let first = tokens.next().ok_or_else(|| USAGE.to_string())?;
    if tokens.next().is_some() {
        return Err(USAGE.to_string());
    }

    match first.to_lowercase().as_str() {
        "accept" => Ok(TradeCommand::Accept),
        "deny" | "decline" => Ok(TradeCommand::Deny),
        "cancel" => Ok(TradeCommand::Cancel),
        "confirm" => Ok(TradeCommand::Confirm),
        "complete" => Ok(TradeCommand::Complete),
        "history" => Ok(TradeCommand::History),
        _ => Ok(TradeCommand::Request {
            target: first.to_string(),
        }),
    }
}

/// Execute one command for the calling party, returning the message shown
/// to them. Counterpart notifications go through the coordinator's
/// notifier as usual.
pub async fn dispatch(
    coordinator: &TradeCoordinator,
    caller: &Party,
    command: &TradeCommand,
) -> String {
    match command {
        TradeCommand::Request { target } => {
            let target = Party::new(target.to_lowercase(), target.clone());
            match coordinator.send_request(caller, &target) {
                Ok(()) => format!("Trade request sent to {}", target.name),
                Err(e) => e.to_string(),
            }
        }
        TradeCommand::Accept => match coordinator.accept_request(&caller.id).await {
            Ok(handle) => {
                let session = handle.snapshot().await;
                let other = session
                    .other_party(&caller.id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                format!("Trade with {} started", other)
            }
            Err(e) => e.to_string(),
        },
        TradeCommand::Deny => match coordinator.decline_request(&caller.id) {
            Ok(()) => "Trade request declined".to_string(),
            Err(e) => e.to_string(),
        },
        TradeCommand::Cancel => {
            if coordinator.session_for(&caller.id).is_none() {
                return "You are not in a trade".to_string();
            }
            coordinator
                .cancel_trade(&caller.id, "cancelled by participant")
                .await;
            "Trade cancelled".to_string()
        }
        TradeCommand::Confirm => match coordinator.toggle_confirm(&caller.id).await {
            Ok(true) => "Offer confirmed".to_string(),
            Ok(false) => "Offer unconfirmed".to_string(),
            Err(e) => e.to_string(),
        },
        TradeCommand::Complete => match coordinator.complete_trade(&caller.id).await {
            Ok(()) => "Trade complete".to_string(),
            Err(e) => e.to_string(),
        },
        TradeCommand::History => {
            let entries = coordinator.history().for_participant(&caller.id, 10).await;
            if entries.is_empty() {
                return "No trades yet".to_string();
            }
            let mut out = String::from("Recent trades:\n");
            for entry in entries {
                out.push_str(&format!(
                    "  [{}] {} gave {} coins, {} gems, {} | {} gave {} coins, {} gems, {}\n",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.side_a.name,
                    entry.side_a.coins,
                    entry.side_a.gems,
                    entry.side_a.items,
                    entry.side_b.name,
                    entry.side_b.coins,
                    entry.side_b.gems,
                    entry.side_b.items,
                ));
            }
            out
        }
    }
}
