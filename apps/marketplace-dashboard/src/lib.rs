//! Command surface for the marketplace dashboard binary.
#![cfg_attr(test, allow(clippy::expect_used, clippy::panic, clippy::unwrap_used))]

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use marketplace_read_state::{
    BadgeScope, DashboardSession, MarkReadOutcome, NotificationBus, OperatorDesk, Panel,
    UnreadBadge, UnreadSlot,
};
use marketplace_records::{Domain, SharedRecordStore};
use serde_json::{Map, Value, json};

#[derive(Parser, Debug)]
#[command(name = "marketplace-dashboard")]
#[command(about = "Inspect and drive unread state across marketplace domains")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load an owner's dashboard and print per-domain unread counts
    Counts(OwnerArgs),
    /// Focus panels in order, acknowledging each domain entered
    Focus(FocusArgs),
    /// Print the navigation badge total
    Badge(BadgeArgs),
    /// Mark every record in a domain read on the operator side
    OperatorAck(OperatorAckArgs),
    /// Change a record's status as the operator
    OperatorStatus(OperatorStatusArgs),
}

#[derive(Args, Debug)]
pub struct OwnerArgs {
    #[arg(long)]
    pub owner: String,
}

#[derive(Args, Debug)]
pub struct FocusArgs {
    #[arg(long)]
    pub owner: String,
    /// overview, orders, fabrication or recycling
    #[arg(required = true)]
    pub panels: Vec<Panel>,
}

#[derive(Args, Debug)]
pub struct BadgeArgs {
    #[arg(long, conflicts_with = "operator", required_unless_present = "operator")]
    pub owner: Option<String>,
    #[arg(long)]
    pub operator: bool,
}

#[derive(Args, Debug)]
pub struct OperatorAckArgs {
    pub domain: Domain,
}

#[derive(Args, Debug)]
pub struct OperatorStatusArgs {
    pub domain: Domain,
    pub record: String,
    pub status: String,
}

/// Runs one command against `store` and returns its printable result.
pub async fn execute(command: Commands, store: SharedRecordStore) -> Result<Value> {
    let bus = NotificationBus::new();
    match command {
        Commands::Counts(args) => {
            let session = DashboardSession::mount(args.owner, store, bus);
            session.load().await;
            let counts = render_counts(&session.counts());
            session.unmount();
            Ok(counts)
        }
        Commands::Focus(args) => run_focus(args, store, bus).await,
        Commands::Badge(args) => {
            let scope = match args.owner {
                Some(owner) if !args.operator => BadgeScope::Owner(owner),
                _ => BadgeScope::Operator,
            };
            let badge = UnreadBadge::attach(&bus, store, scope);
            let unread = badge.refresh().await;
            Ok(json!({
                "scope": scope_label(badge.scope()),
                "unread": unread.known(),
            }))
        }
        Commands::OperatorAck(args) => {
            OperatorDesk::new(store, bus)
                .acknowledge(args.domain)
                .await
                .with_context(|| format!("acknowledge {}", args.domain))?;
            Ok(json!({ "domain": args.domain.as_str(), "acknowledged": true }))
        }
        Commands::OperatorStatus(args) => {
            let record = OperatorDesk::new(store, bus)
                .update_status(&args.record, args.domain, &args.status)
                .await
                .with_context(|| format!("update {} {}", args.domain, args.record))?;
            Ok(json!({
                "id": record.id,
                "domain": record.domain.as_str(),
                "status": record.status,
                "read_by_owner": record.read_by_owner,
                "read_by_operator": record.read_by_operator,
            }))
        }
    }
}

async fn run_focus(
    args: FocusArgs,
    store: SharedRecordStore,
    bus: NotificationBus,
) -> Result<Value> {
    let mut session = DashboardSession::mount(args.owner, store, bus);
    session.load().await;
    let mut steps = Vec::with_capacity(args.panels.len());
    for panel in args.panels {
        let transition = session.select(panel);
        let mark_read = match transition.mark_read {
            Some(task) => Some(task.wait().await),
            None => None,
        };
        steps.push(json!({
            "panel": panel.label(),
            "mark_read": mark_read.as_ref().map(outcome_label),
            "counts": render_counts(&session.counts()),
        }));
    }
    session.unmount();
    Ok(Value::Array(steps))
}

fn render_counts(slots: &[(Domain, UnreadSlot)]) -> Value {
    let mut rendered = Map::new();
    for (domain, slot) in slots {
        rendered.insert(
            domain.as_str().to_string(),
            json!({ "unread": slot.count.known(), "stale": slot.stale }),
        );
    }
    Value::Object(rendered)
}

fn outcome_label(outcome: &MarkReadOutcome) -> String {
    match outcome {
        MarkReadOutcome::Acknowledged => "acknowledged".to_string(),
        MarkReadOutcome::Failed { error } => format!("failed: {error}"),
        MarkReadOutcome::Interrupted { reason } => format!("interrupted: {reason}"),
    }
}

fn scope_label(scope: &BadgeScope) -> String {
    match scope {
        BadgeScope::Owner(owner) => format!("owner:{owner}"),
        BadgeScope::Operator => "operator".to_string(),
    }
}
