//! `tally report`: portfolio views for the office.

use crate::output::{OrRender, OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode};
use crate::workspace::Workspace;
use chrono::Utc;
use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use std::io::Write;
use std::path::Path;
use tally_core::model::{ChangeOrderStatus, TicketStatus};
use tally_core::report::risk::OverdueItem;
use tally_core::report::{OVERDUE_THRESHOLD_DAYS, Snapshot, unassigned_tickets};

#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    /// Money waiting on review or owner decision, and what is overdue.
    Risk,
    /// Change order totals and variance per project.
    Rollup,
    /// Tickets not yet on any change order.
    Unassigned(UnassignedArgs),
}

#[derive(Args, Debug)]
pub struct UnassignedArgs {
    /// Project code or id.
    #[arg(long, short)]
    pub project: Option<String>,
}

pub fn run_report(
    command: &ReportCommand,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let ws = Workspace::open(project_root, output)?;

    match command {
        ReportCommand::Risk => risk(&ws, output),
        ReportCommand::Rollup => rollup(&ws, output),
        ReportCommand::Unassigned(args) => unassigned(&ws, args, output),
    }
}

fn risk(ws: &Workspace, output: OutputMode) -> anyhow::Result<()> {
    let snapshot = Snapshot::load(&ws.conn).or_render(output)?;
    let report = snapshot.value_at_risk(Utc::now());
    render_mode(
        output,
        &report,
        |r, w| {
            writeln!(w, "at_risk\t{}", r.total_at_risk)?;
            writeln!(w, "approved\t{}", r.total_approved)?;
            writeln!(w, "overdue\t{}\t{}", r.overdue.len(), r.overdue_total_value)?;
            for p in &r.by_project {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}\t{}",
                    p.project_id, p.draft, p.pending, p.approved, p.total
                )?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, "Value at risk")?;
            pretty_kv(w, "At risk", ws.money(r.total_at_risk))?;
            pretty_kv(w, "Approved", ws.money(r.total_approved))?;
            writeln!(w)?;

            pretty_section(w, "Tickets")?;
            for status in TicketStatus::ALL {
                let b = r.tickets.get(status);
                writeln!(
                    w,
                    "{:<15} {:>5} {:>14}  avg {:.1} days",
                    status.as_str(),
                    b.count,
                    ws.money(b.value),
                    b.avg_age_days
                )?;
            }
            writeln!(w)?;

            pretty_section(w, "Change orders")?;
            for status in ChangeOrderStatus::ALL {
                let b = r.change_orders.get(status);
                writeln!(w, "{:<15} {:>5} {:>14}", status.as_str(), b.count, ws.money(b.value))?;
            }
            pretty_kv(
                w,
                "Avg pending",
                format!("{:.1} days", r.change_orders.submitted_avg_days_pending),
            )?;
            writeln!(w)?;

            pretty_section(
                w,
                &format!(
                    "Overdue, waiting more than {OVERDUE_THRESHOLD_DAYS} days ({})",
                    ws.money(r.overdue_total_value)
                ),
            )?;
            for item in &r.overdue {
                let label = match item {
                    OverdueItem::Ticket { id, .. } => id.to_string(),
                    OverdueItem::ChangeOrder { id, number, .. } => {
                        format!("{id} CO-{number:03}")
                    }
                };
                writeln!(
                    w,
                    "{label:<16} {:>14}  {} days",
                    ws.money(item.amount()),
                    item.days()
                )?;
            }
            writeln!(w)?;

            pretty_section(w, "By project")?;
            for p in &r.by_project {
                writeln!(
                    w,
                    "{:<10} draft {:>12}  pending {:>12}  approved {:>12}  total {:>12}",
                    p.project_code.as_deref().unwrap_or("?"),
                    ws.money(p.draft),
                    ws.money(p.pending),
                    ws.money(p.approved),
                    ws.money(p.total)
                )?;
            }
            Ok(())
        },
    )
}

fn rollup(ws: &Workspace, output: OutputMode) -> anyhow::Result<()> {
    let rollup = Snapshot::load(&ws.conn).or_render(output)?.rollup();
    render_mode(
        output,
        &rollup,
        |rows, w| {
            for r in rows {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    r.project_id,
                    r.change_orders,
                    r.total_original,
                    r.total_current,
                    r.total_variance,
                    r.variance_percent
                )?;
            }
            Ok(())
        },
        |rows, w| {
            pretty_section(w, "Change order rollup")?;
            for r in rows {
                writeln!(
                    w,
                    "{:<10} {:>3} COs  original {:>12}  current {:>12}  variance {:>12} ({}%)",
                    r.project_code.as_deref().unwrap_or("?"),
                    r.change_orders,
                    ws.money(r.total_original),
                    ws.money(r.total_current),
                    ws.money(r.total_variance),
                    r.variance_percent
                )?;
            }
            pretty_rule(w)
        },
    )
}

fn unassigned(ws: &Workspace, args: &UnassignedArgs, output: OutputMode) -> anyhow::Result<()> {
    let project_id = match &args.project {
        Some(reference) => Some(ws.project(reference).or_render(output)?.id),
        None => None,
    };
    let tickets = unassigned_tickets(&ws.conn, project_id).or_render(output)?;
    let now = Utc::now();
    render_mode(
        output,
        &tickets,
        |tickets, w| {
            for t in tickets {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}\t{}",
                    t.id,
                    t.project_id,
                    t.status,
                    t.total_amount,
                    t.age_days(now)
                )?;
            }
            Ok(())
        },
        |tickets, w| {
            pretty_section(w, &format!("Unassigned tickets ({})", tickets.len()))?;
            for t in tickets {
                writeln!(
                    w,
                    "{:<7} {:<6} {:<15} {:>14}  {:>4} days",
                    t.id.to_string(),
                    t.project_id.to_string(),
                    t.status.as_str(),
                    ws.money(t.total_amount),
                    t.age_days(now)
                )?;
            }
            pretty_rule(w)?;
            let total: Decimal = tickets.iter().map(|t| t.total_amount).sum();
            writeln!(w, "Total {}", ws.money(total))
        },
    )
}
