mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use dotenvy::dotenv;
use owo_colors::OwoColorize;
use revisor::{
    Dialect, GroupOutcome, GroupReport, GroupSpec, Introspector, MySqlExecutor, Orchestrator,
    Report,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Transparent revision history for MySQL tables.
#[derive(Parser, Debug)]
#[command(name = "revisor", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// MySQL connection URL
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// How triggers raise errors: `standard` (SIGNAL) or `legacy`
    #[arg(long, global = true)]
    dialect: Option<Dialect>,

    /// Session variable holding the acting user's id
    #[arg(long, global = true, value_name = "NAME")]
    user_variable: Option<String>,

    /// Configuration file (defaults to the nearest .config/revisor.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log more (-v: debug, -vv: trace, including every statement)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install or upgrade revisioning, e.g. `revisor install 'orders(order_lines)'`
    Install {
        #[arg(value_name = "GROUP")]
        groups: Vec<GroupSpec>,
    },
    /// Remove revisioning and drop all history
    Remove {
        #[arg(value_name = "GROUP")]
        groups: Vec<GroupSpec>,
    },
    /// Print the script `install` would run, without changing anything
    Plan {
        #[arg(value_name = "GROUP")]
        groups: Vec<GroupSpec>,
    },
}

impl Command {
    fn verb(&self) -> &'static str {
        match self {
            Command::Install { .. } => "install",
            Command::Remove { .. } => "remove",
            Command::Plan { .. } => "plan",
        }
    }

    fn groups(&self) -> &[GroupSpec] {
        match self {
            Command::Install { groups } | Command::Remove { groups } | Command::Plan { groups } => {
                groups
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "revisor=info",
        1 => "revisor=debug",
        _ => "revisor=trace",
    };
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if verbose > 0
        && let Ok(directive) = level.parse()
    {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let (settings, config_path) = config::load(cli.config.as_deref()).with_context(|| {
        match &cli.config {
            Some(path) => format!("failed to load {}", path.display()),
            None => format!("failed to load {}", config::CONFIG_FILE),
        }
    })?;
    if let Some(path) = &config_path {
        debug!(path = %path.display(), "using configuration file");
    }

    let options = settings
        .options(cli.dialect, cli.user_variable.clone())
        .map_err(anyhow::Error::msg)
        .context("invalid dialect in configuration")?;

    let groups = match cli.command.groups() {
        [] => settings
            .groups()
            .context("invalid group in configuration")?,
        groups => groups.to_vec(),
    };
    if groups.is_empty() {
        bail!(
            "no groups to {}: pass them as arguments or list them under `groups` in {}",
            cli.command.verb(),
            config::CONFIG_FILE
        );
    }

    let Some(url) = cli.database_url.or(settings.database_url) else {
        bail!(
            "no database URL: pass --database-url, set DATABASE_URL, or add `database_url` to {}",
            config::CONFIG_FILE
        );
    };

    let mut executor = MySqlExecutor::connect(&url)
        .await
        .with_context(|| format!("could not connect to {}", mask_password(&url)))?;
    let render = Introspector::new(&mut executor)
        .render_context()
        .await
        .context("could not read the session sql_mode")?;
    debug!(?options, backslash_escapes = render.backslash_escapes, "connected");

    let mut orchestrator = Orchestrator::new(executor, options).with_render_context(render);
    let report = match &cli.command {
        Command::Install { .. } => orchestrator.install(&groups).await,
        Command::Remove { .. } => orchestrator.remove(&groups).await,
        Command::Plan { .. } => {
            let plan = orchestrator.plan(&groups).await;
            print_script(&plan.statements);
            plan.report
        }
    };

    print_report(cli.command.verb(), &report);

    if let Err(err) = orchestrator.into_executor().close().await {
        warn!("closing the connection failed: {err}");
    }

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Statements go to stdout as a script the `mysql` client can replay.
fn print_script(statements: &[String]) {
    println!("DELIMITER ;;");
    for statement in statements {
        println!("{statement};;");
        println!();
    }
    println!("DELIMITER ;");
}

fn print_report(verb: &str, report: &Report) {
    for group in &report.groups {
        let name = group_name(group);
        match &group.outcome {
            GroupOutcome::Done => {
                let detail = match verb {
                    "remove" => "removed",
                    _ if group.structural => "storage created, triggers installed",
                    _ => "storage exists, triggers reinstalled",
                };
                eprintln!("{} {} {}", "ok".green().bold(), name.bold(), detail.dimmed());
            }
            GroupOutcome::Skipped(err) => {
                eprintln!("{} {} {err}", "skipped".yellow().bold(), name.bold());
            }
            GroupOutcome::Failed(err) => {
                eprintln!("{} {} {err}", "failed".red().bold(), name.bold());
            }
        }
        if !group.structural && group.is_done() {
            for child in &group.child_storage {
                eprintln!("  {} {child}", "storage created for".green());
            }
        }
        for child in &group.skipped_children {
            eprintln!("  {} {child}", "left out".yellow());
        }
    }

    let failed = report.groups.iter().filter(|g| !g.is_done()).count();
    if failed > 0 {
        eprintln!(
            "{}",
            format!("{verb}: {failed} of {} groups did not complete", report.groups.len()).red()
        );
    }
}

fn group_name(group: &GroupReport) -> String {
    let mut spec = GroupSpec::new(group.root.clone());
    spec.children = group.children.clone();
    spec.to_string()
}

/// Mask the password in a database URL for display.
fn mask_password(url: &str) -> String {
    let Some(start) = url.find("://").map(|i| i + 3) else {
        return url.to_owned();
    };
    let Some(at) = url[start..].rfind('@').map(|i| start + i) else {
        return url.to_owned();
    };
    match url[start..at].find(':') {
        Some(colon) => format!("{}:***{}", &url[..start + colon], &url[at..]),
        None => url.to_owned(),
    }
}
