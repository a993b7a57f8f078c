#![forbid(unsafe_code)]

mod cmd;
mod output;
mod workspace;

use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "tally",
    author,
    version,
    about = "tally: T&M tickets, change orders, and what they are worth",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output (shorthand for `--format json`).
    #[arg(long, global = true)]
    json: bool,

    /// Output format. Defaults to pretty on a terminal and text when piped.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a tally workspace",
        long_about = "Create .tally/ with a migrated database and a config template.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    tally init\n\n    # Rewrite the config template, keeping data\n    tally init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Register and list projects",
        after_help = "EXAMPLES:\n    # Register a project\n    tally project add P1 \"Clinic fit-out\" --budget 250000\n\n    # List every project, closed ones included\n    tally project list --all"
    )]
    Project {
        #[command(subcommand)]
        command: cmd::project::ProjectCommand,
    },

    #[command(
        next_help_heading = "Tickets",
        about = "Create, import, and review T&M tickets",
        after_help = "EXAMPLES:\n    # Enter a ticket by hand\n    tally ticket create --project P1 --labor 680 --materials 120.50\n\n    # Import extractor output\n    tally ticket import --project P1 transcript.json\n\n    # Tickets not yet on a change order\n    tally ticket list --unassigned --json"
    )]
    Ticket {
        #[command(subcommand)]
        command: cmd::ticket::TicketCommand,
    },

    #[command(
        next_help_heading = "Change Orders",
        about = "Manage change orders and their tickets",
        long_about = "Change orders move draft -> submitted -> approved | rejected. \
                      Tickets can be linked and unlinked only while draft; \
                      submitting locks the original amount.",
        after_help = "EXAMPLES:\n    # Open a draft and link tickets\n    tally co create --project P1 --title \"Added outlets\"\n    tally co add co-1 t-3 t-4\n\n    # Submit and record the owner's decision\n    tally co submit co-1\n    tally co approve co-1 --by \"Owner PM\""
    )]
    Co {
        #[command(subcommand)]
        command: cmd::co::CoCommand,
    },

    #[command(
        next_help_heading = "Reports",
        about = "Value-at-risk, rollups, and unassigned tickets",
        after_help = "EXAMPLES:\n    # What money is waiting on a decision\n    tally report risk\n\n    # Variance per project\n    tally report rollup --json"
    )]
    Report {
        #[command(subcommand)]
        command: cmd::report::ReportCommand,
    },

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    tally completions bash\n\n    # Generate zsh completions\n    tally completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "tally=debug,info"
        } else {
            "tally=info,warn"
        })
    });

    let format = env::var("TALLY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let output = cli.output_mode();

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, output, &project_root),
        Commands::Project { command } => cmd::project::run_project(command, output, &project_root),
        Commands::Ticket { command } => cmd::ticket::run_ticket(command, output, &project_root),
        Commands::Co { command } => cmd::co::run_co(command, output, &project_root),
        Commands::Report { command } => cmd::report::run_report(command, output, &project_root),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}
