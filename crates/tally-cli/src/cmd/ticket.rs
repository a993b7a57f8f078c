//! `tally ticket`: create, import, list, and review T&M tickets.

use crate::output::{
    OrRender, OutputMode, local_time, pretty_kv, pretty_rule, pretty_section, render, render_mode,
};
use crate::workspace::Workspace;
use anyhow::Context as _;
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::{Read as _, Write};
use std::path::{Path, PathBuf};
use tally_core::capture;
use tally_core::db::query::{Assignment, TicketFilter};
use tally_core::error::TallyError;
use tally_core::model::{ChangeOrderId, NewTicket, Ticket, TicketId, TicketStatus};
use tally_core::store::TicketStore;

#[derive(Subcommand, Debug)]
pub enum TicketCommand {
    /// Enter a ticket by hand.
    Create(CreateArgs),
    /// Create tickets from transcript extractor JSON.
    Import(ImportArgs),
    /// List tickets.
    List(ListArgs),
    /// Show one ticket.
    Show(ShowArgs),
    /// Move a ticket through its review lifecycle.
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Project code or id.
    #[arg(long, short)]
    pub project: String,
    /// Priced labor total.
    #[arg(long, default_value = "0")]
    pub labor: Decimal,
    /// Priced materials total.
    #[arg(long, default_value = "0")]
    pub materials: Decimal,
    /// Date the work was performed (YYYY-MM-DD).
    #[arg(long)]
    pub date: Option<NaiveDate>,
    #[arg(long, short)]
    pub description: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub cost_code: Option<String>,
    /// Initial status (`draft` or `pending_review`).
    #[arg(long, default_value = "pending_review")]
    pub status: TicketStatus,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Project code or id the tickets belong to.
    #[arg(long, short)]
    pub project: String,
    /// Extractor JSON file, or `-` for stdin.
    #[arg(default_value = "-")]
    pub file: PathBuf,
    /// Hourly rate for labor lines without one (overrides config).
    #[arg(long)]
    pub labor_rate: Option<Decimal>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Project code or id.
    #[arg(long, short)]
    pub project: Option<String>,
    #[arg(long, short)]
    pub status: Option<TicketStatus>,
    /// Only tickets not on any change order.
    #[arg(long, conflicts_with_all = ["assigned", "change_order"])]
    pub unassigned: bool,
    /// Only tickets on some change order.
    #[arg(long, conflicts_with = "change_order")]
    pub assigned: bool,
    /// Only tickets on this change order.
    #[arg(long = "co")]
    pub change_order: Option<ChangeOrderId>,
    #[arg(long)]
    pub limit: Option<u32>,
    #[arg(long)]
    pub offset: Option<u32>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub id: TicketId,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    pub id: TicketId,
    /// Target status: draft, pending_review, approved, rejected, billed, paid.
    pub status: TicketStatus,
}

#[derive(Debug, Serialize)]
struct ImportReport {
    created: Vec<Ticket>,
    warnings: Vec<String>,
}

pub fn run_ticket(
    command: &TicketCommand,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let ws = Workspace::open(project_root, output)?;
    let store = TicketStore::new(&ws.conn);

    match command {
        TicketCommand::Create(args) => {
            let project = ws.project(&args.project).or_render(output)?;
            let ticket = store
                .create_ticket(&NewTicket {
                    project_id: Some(project.id),
                    status: args.status,
                    work_date: args.date,
                    description: args.description.clone(),
                    location: args.location.clone(),
                    cost_code: args.cost_code.clone(),
                    labor_total: args.labor,
                    materials_total: args.materials,
                })
                .or_render(output)?;
            render_one(&ws, output, &ticket)
        }
        TicketCommand::Import(args) => run_import(&ws, &store, args, output),
        TicketCommand::List(args) => {
            let project_id = match &args.project {
                Some(reference) => Some(ws.project(reference).or_render(output)?.id),
                None => None,
            };
            let assignment = match (args.unassigned, args.assigned, args.change_order) {
                (true, _, _) => Assignment::Unassigned,
                (_, true, _) => Assignment::Assigned,
                (_, _, Some(id)) => Assignment::To(id),
                _ => Assignment::Any,
            };
            let tickets = store
                .list_tickets(&TicketFilter {
                    project_id,
                    status: args.status,
                    assignment,
                    limit: args.limit,
                    offset: args.offset,
                })
                .or_render(output)?;
            render_many(&ws, output, &tickets)
        }
        TicketCommand::Show(args) => {
            let ticket = store.get_ticket(args.id).or_render(output)?;
            render_one(&ws, output, &ticket)
        }
        TicketCommand::Status(args) => {
            let ticket = store.set_ticket_status(args.id, args.status).or_render(output)?;
            render_one(&ws, output, &ticket)
        }
    }
}

fn run_import(
    ws: &Workspace,
    store: &TicketStore<'_>,
    args: &ImportArgs,
    output: OutputMode,
) -> anyhow::Result<()> {
    let project = ws.project(&args.project).or_render(output)?;
    let raw = read_input(&args.file)?;
    let extracted = capture::parse_extraction(&raw).or_render(output)?;
    let rate = args.labor_rate.or(ws.config.capture.default_labor_rate);

    // Price everything before writing so one bad entry creates nothing.
    let mut warnings = Vec::new();
    let mut pending = Vec::with_capacity(extracted.len());
    for (i, entry) in extracted.into_iter().enumerate() {
        let draft = entry.normalize();
        warnings.extend(draft.warnings.iter().map(|w| format!("ticket {}: {w}", i + 1)));
        let priced = draft
            .price(project.id, rate)
            .map_err(|err| match err {
                TallyError::Validation(msg) => {
                    TallyError::Validation(format!("ticket {}: {msg}", i + 1))
                }
                other => other,
            })
            .or_render(output)?;
        pending.push(priced);
    }

    let mut created = Vec::with_capacity(pending.len());
    for new in &pending {
        created.push(store.create_ticket(new).or_render(output)?);
    }
    tracing::info!(count = created.len(), project = %project.code, "imported captured tickets");

    let report = ImportReport { created, warnings };
    render(output, &report, |report, w| {
        for ticket in &report.created {
            writeln!(
                w,
                "Created {} for {} ({})",
                ticket.id,
                ws.money(ticket.total_amount),
                ticket.description.as_deref().unwrap_or("no description")
            )?;
        }
        for warning in &report.warnings {
            writeln!(w, "warning: {warning}")?;
        }
        Ok(())
    })
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read extractor JSON from stdin")?;
        Ok(raw)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

fn co_label(ticket: &Ticket) -> String {
    ticket
        .change_order_id
        .map_or_else(|| "-".to_string(), |id| id.to_string())
}

fn render_one(ws: &Workspace, output: OutputMode, ticket: &Ticket) -> anyhow::Result<()> {
    render_mode(
        output,
        ticket,
        |t, w| {
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}",
                t.id,
                t.project_id,
                t.status,
                t.total_amount,
                co_label(t)
            )
        },
        |t, w| {
            pretty_section(w, &format!("Ticket {}", t.id))?;
            pretty_kv(w, "Project", t.project_id.to_string())?;
            pretty_kv(w, "Status", t.status.as_str())?;
            if let Some(date) = t.work_date {
                pretty_kv(w, "Work date", date.to_string())?;
            }
            if let Some(description) = &t.description {
                pretty_kv(w, "Description", description)?;
            }
            if let Some(location) = &t.location {
                pretty_kv(w, "Location", location)?;
            }
            if let Some(cost_code) = &t.cost_code {
                pretty_kv(w, "Cost code", cost_code)?;
            }
            pretty_kv(w, "Labor", ws.money(t.labor_total))?;
            pretty_kv(w, "Materials", ws.money(t.materials_total))?;
            pretty_kv(w, "Total", ws.money(t.total_amount))?;
            pretty_kv(w, "Change order", co_label(t))?;
            pretty_kv(w, "Created", local_time(t.created_at))
        },
    )
}

fn render_many(ws: &Workspace, output: OutputMode, tickets: &[Ticket]) -> anyhow::Result<()> {
    render_mode(
        output,
        &tickets,
        |tickets, w| {
            for t in *tickets {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}\t{}",
                    t.id,
                    t.project_id,
                    t.status,
                    t.total_amount,
                    co_label(t)
                )?;
            }
            Ok(())
        },
        |tickets, w| {
            pretty_section(w, &format!("Tickets ({})", tickets.len()))?;
            for t in *tickets {
                writeln!(
                    w,
                    "{:<7} {:<6} {:<15} {:>14}  {:<6} {}",
                    t.id.to_string(),
                    t.project_id.to_string(),
                    t.status.as_str(),
                    ws.money(t.total_amount),
                    co_label(t),
                    t.description.as_deref().unwrap_or("")
                )?;
            }
            pretty_rule(w)?;
            let total: Decimal = tickets.iter().map(|t| t.total_amount).sum();
            writeln!(w, "Total {}", ws.money(total))
        },
    )
}
