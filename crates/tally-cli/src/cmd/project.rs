//! `tally project`: register and list the jobs tickets are billed against.

use crate::output::{OrRender, OutputMode, pretty_section, render_mode};
use crate::workspace::Workspace;
use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use std::io::Write;
use std::path::Path;
use tally_core::db::query;
use tally_core::model::{NewProject, Project};
use tally_core::store::{ProjectSource, TicketStore};

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Register a project.
    Add(AddArgs),
    /// List projects.
    List(ListArgs),
    /// Close a project to new billing. Its records stay readable.
    Close(RefArgs),
    /// Reopen a closed project.
    Reopen(RefArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Short unique code, e.g. `P1`.
    pub code: String,
    /// Descriptive name.
    pub name: String,
    /// Contract budget.
    #[arg(long, default_value = "0")]
    pub budget: Decimal,
}

#[derive(Args, Debug)]
pub struct RefArgs {
    /// Project code or id.
    pub project: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Include closed projects.
    #[arg(long)]
    pub all: bool,
}

pub fn run_project(
    command: &ProjectCommand,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let ws = Workspace::open(project_root, output)?;
    match command {
        ProjectCommand::Add(args) => {
            let project = TicketStore::new(&ws.conn)
                .create_project(&NewProject {
                    code: args.code.clone(),
                    name: args.name.clone(),
                    budget: args.budget,
                })
                .or_render(output)?;
            render_mode(
                output,
                &project,
                |p, w| writeln!(w, "{}\t{}\t{}", p.id, p.code, p.name),
                |p, w| {
                    writeln!(
                        w,
                        "Registered project {} ({}) with budget {}",
                        p.code,
                        p.id,
                        ws.money(p.budget)
                    )
                },
            )
        }
        ProjectCommand::List(args) => {
            let projects = if args.all {
                query::list_projects(&ws.conn, false)
            } else {
                ws.conn.get_active_projects()
            }
            .or_render(output)?;
            render_mode(
                output,
                &projects,
                |projects, w| {
                    for p in projects {
                        writeln!(w, "{}\t{}\t{}\t{}", p.id, p.code, p.name, state(p))?;
                    }
                    Ok(())
                },
                |projects, w| {
                    pretty_section(w, &format!("Projects ({})", projects.len()))?;
                    for p in projects {
                        writeln!(
                            w,
                            "{:<6} {:<10} {:<36} {:>14}  {}",
                            p.id.to_string(),
                            p.code,
                            p.name,
                            ws.money(p.budget),
                            state(p)
                        )?;
                    }
                    Ok(())
                },
            )
        }
        ProjectCommand::Close(args) | ProjectCommand::Reopen(args) => {
            let active = matches!(command, ProjectCommand::Reopen(_));
            let project = ws.project(&args.project).or_render(output)?;
            let project = TicketStore::new(&ws.conn)
                .set_project_active(project.id, active)
                .or_render(output)?;
            render_mode(
                output,
                &project,
                |p, w| writeln!(w, "{}\t{}\t{}", p.id, p.code, state(p)),
                |p, w| writeln!(w, "Project {} is now {}", p.code, state(p)),
            )
        }
    }
}

const fn state(project: &Project) -> &'static str {
    if project.is_active { "active" } else { "closed" }
}
