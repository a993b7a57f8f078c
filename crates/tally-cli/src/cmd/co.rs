//! `tally co`: change order lifecycle and ticket membership.

use crate::output::{
    OrRender, OutputMode, local_time, pretty_kv, pretty_rule, pretty_section, render, render_mode,
};
use crate::workspace::Workspace;
use clap::{Args, Subcommand};
use std::io::Write;
use std::path::Path;
use tally_core::db::query::ChangeOrderFilter;
use tally_core::engine::ChangeOrderEngine;
use tally_core::model::{ChangeOrder, ChangeOrderId, ChangeOrderPatch, ChangeOrderStatus, TicketId};
use tally_core::report::calculate_variance;

#[derive(Subcommand, Debug)]
pub enum CoCommand {
    /// Open a draft change order.
    Create(CreateArgs),
    /// Edit a draft's title or notes.
    Update(UpdateArgs),
    /// Link tickets to a draft.
    Add(AddArgs),
    /// Unlink a ticket from a draft.
    Remove(RemoveArgs),
    /// Lock the original amount and send for decision.
    Submit(IdArgs),
    /// Record owner approval of a submitted change order.
    Approve(DecideArgs),
    /// Record owner rejection of a submitted change order.
    Reject(DecideArgs),
    /// Delete a draft and release its tickets.
    Delete(IdArgs),
    /// Show a change order with its tickets and variance.
    Show(IdArgs),
    /// List change orders.
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Project code or id.
    #[arg(long, short)]
    pub project: String,
    #[arg(long, short)]
    pub title: String,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: ChangeOrderId,
    #[arg(long, short)]
    pub title: Option<String>,
    #[arg(long, conflicts_with = "clear_notes")]
    pub notes: Option<String>,
    /// Remove the notes entirely.
    #[arg(long)]
    pub clear_notes: bool,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    pub id: ChangeOrderId,
    /// Tickets to link (`t-3` or `3`).
    #[arg(required = true, num_args = 1..)]
    pub tickets: Vec<TicketId>,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub id: ChangeOrderId,
    pub ticket: TicketId,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    pub id: ChangeOrderId,
}

#[derive(Args, Debug)]
pub struct DecideArgs {
    pub id: ChangeOrderId,
    /// Who made the decision.
    #[arg(long)]
    pub by: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Project code or id.
    #[arg(long, short)]
    pub project: Option<String>,
    #[arg(long, short)]
    pub status: Option<ChangeOrderStatus>,
}

pub fn run_co(command: &CoCommand, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let ws = Workspace::open(project_root, output)?;
    let engine = ChangeOrderEngine::new(&ws.conn);

    match command {
        CoCommand::Create(args) => {
            let project = ws.project(&args.project).or_render(output)?;
            let co = engine
                .create_change_order(&args.title, Some(project.id), args.notes.as_deref())
                .or_render(output)?;
            render_summary(&ws, output, &co)
        }
        CoCommand::Update(args) => {
            let notes = if args.clear_notes {
                Some(None)
            } else {
                args.notes.clone().map(Some)
            };
            let patch = ChangeOrderPatch {
                title: args.title.clone(),
                notes,
                ..ChangeOrderPatch::default()
            };
            let co = engine.update_change_order(args.id, &patch).or_render(output)?;
            render_summary(&ws, output, &co)
        }
        CoCommand::Add(args) => {
            let change = engine
                .add_tickets_to_change_order(args.id, &args.tickets)
                .or_render(output)?;
            render(output, &change, |change, w| {
                let added = if change.added.is_empty() {
                    "no new tickets".to_string()
                } else {
                    change
                        .added
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                writeln!(
                    w,
                    "{}: linked {added}; {} tickets, current {}",
                    change.change_order.display_number(),
                    change.tickets.len(),
                    ws.money(change.change_order.current_amount)
                )
            })
        }
        CoCommand::Remove(args) => {
            let co = engine
                .remove_ticket_from_change_order(args.ticket, args.id)
                .or_render(output)?;
            render_summary(&ws, output, &co)
        }
        CoCommand::Submit(args) => {
            let co = engine.submit_change_order(args.id).or_render(output)?;
            render_summary(&ws, output, &co)
        }
        CoCommand::Approve(args) => {
            let co = engine.approve_change_order(args.id, &args.by).or_render(output)?;
            render_summary(&ws, output, &co)
        }
        CoCommand::Reject(args) => {
            let co = engine.reject_change_order(args.id, &args.by).or_render(output)?;
            render_summary(&ws, output, &co)
        }
        CoCommand::Delete(args) => {
            let deleted = engine.delete_change_order(args.id).or_render(output)?;
            render(output, &deleted, |d, w| {
                writeln!(
                    w,
                    "Deleted {} (CO-{:03}); released {} tickets",
                    d.id,
                    d.number,
                    d.released.len()
                )
            })
        }
        CoCommand::Show(args) => show_detail(&ws, &engine, args.id, output),
        CoCommand::List(args) => list_change_orders(&ws, &engine, args, output),
    }
}

fn show_detail(
    ws: &Workspace,
    engine: &ChangeOrderEngine<'_>,
    id: ChangeOrderId,
    output: OutputMode,
) -> anyhow::Result<()> {
    let detail = engine.change_order_detail(id).or_render(output)?;
    render_mode(
        output,
        &detail,
        |d, w| {
            let co = &d.change_order;
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}\t{}",
                co.id,
                co.display_number(),
                co.status,
                co.original_amount,
                co.current_amount,
                d.variance.percent_label()
            )?;
            for t in &d.tickets {
                writeln!(w, "{}\t{}\t{}", t.id, t.status, t.total_amount)?;
            }
            Ok(())
        },
        |d, w| {
            let co = &d.change_order;
            pretty_section(w, &format!("{} {}", co.display_number(), co.title))?;
            if let Some(project) = &d.project {
                pretty_kv(w, "Project", format!("{} {}", project.code, project.name))?;
            }
            pretty_kv(w, "Status", co.status.as_str())?;
            if let Some(notes) = &co.notes {
                pretty_kv(w, "Notes", notes)?;
            }
            pretty_kv(w, "Original", ws.money(co.original_amount))?;
            pretty_kv(w, "Current", ws.money(co.current_amount))?;
            pretty_kv(
                w,
                "Variance",
                format!(
                    "{} ({}){}",
                    ws.money(d.variance.amount),
                    d.variance.percent_label(),
                    if d.variance.is_over_budget { " over" } else { "" }
                ),
            )?;
            if let Some(at) = co.submitted_at {
                pretty_kv(w, "Submitted", local_time(at))?;
            }
            if let (Some(at), Some(by)) = (co.approved_at, &co.approved_by) {
                pretty_kv(w, "Approved", format!("{} by {by}", local_time(at)))?;
            }
            if let (Some(at), Some(by)) = (co.rejected_at, &co.rejected_by) {
                pretty_kv(w, "Rejected", format!("{} by {by}", local_time(at)))?;
            }
            writeln!(w)?;
            pretty_section(w, &format!("Tickets ({})", d.tickets.len()))?;
            for t in &d.tickets {
                writeln!(
                    w,
                    "{:<7} {:<15} {:>14}  {}",
                    t.id.to_string(),
                    t.status.as_str(),
                    ws.money(t.total_amount),
                    t.description.as_deref().unwrap_or("")
                )?;
            }
            Ok(())
        },
    )
}

fn list_change_orders(
    ws: &Workspace,
    engine: &ChangeOrderEngine<'_>,
    args: &ListArgs,
    output: OutputMode,
) -> anyhow::Result<()> {
    let project_id = match &args.project {
        Some(reference) => Some(ws.project(reference).or_render(output)?.id),
        None => None,
    };
    let cos = engine
        .list_change_orders(&ChangeOrderFilter {
            project_id,
            status: args.status,
        })
        .or_render(output)?;
    render_mode(
        output,
        &cos,
        |cos, w| {
            for co in cos {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    co.id,
                    co.project_id,
                    co.display_number(),
                    co.status,
                    co.original_amount,
                    co.current_amount
                )?;
            }
            Ok(())
        },
        |cos, w| {
            pretty_section(w, &format!("Change orders ({})", cos.len()))?;
            for co in cos {
                let variance = calculate_variance(co);
                writeln!(
                    w,
                    "{:<6} {:<6} {:<7} {:<10} {:>14} {:>14} {:>8}  {}",
                    co.id.to_string(),
                    co.project_id.to_string(),
                    co.display_number(),
                    co.status.as_str(),
                    ws.money(co.original_amount),
                    ws.money(co.current_amount),
                    variance.percent_label(),
                    co.title
                )?;
            }
            pretty_rule(w)
        },
    )
}

fn render_summary(ws: &Workspace, output: OutputMode, co: &ChangeOrder) -> anyhow::Result<()> {
    render_mode(
        output,
        co,
        |co, w| {
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}",
                co.id,
                co.display_number(),
                co.status,
                co.original_amount,
                co.current_amount
            )
        },
        |co, w| {
            writeln!(
                w,
                "{} ({}) {} \"{}\": original {}, current {}",
                co.display_number(),
                co.id,
                co.status,
                co.title,
                ws.money(co.original_amount),
                ws.money(co.current_amount)
            )
        },
    )
}
