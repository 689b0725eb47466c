use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use lcnckit::{build_controller, init_logging, run_monitor, BUILD_DATE, VERSION};
use lcnckit_communication::SettleStrategy;
use lcnckit_core::EventDispatcher;
use lcnckit_harness::{builtin_scenarios, Scenario, TransitionRunner};
use lcnckit_settings::Config;
use std::path::PathBuf;

/// LcncKit: status display and transition checks for a CNC motion controller.
#[derive(Debug, Parser)]
#[command(
    name = "lcnckit",
    author,
    version,
    about = "Status display and transition test harness for CNC motion controllers",
    long_about = None,
    arg_required_else_help = true
)]
struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Emit logs and reports as JSON.
    #[arg(long, global = true)]
    json: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll twice and require an unchanged status.
    Check,
    /// Run transition scenarios against the controller.
    Verify(VerifyArgs),
    /// Show the active G-codes and M-codes until interrupted.
    Monitor(MonitorArgs),
    /// Keep the process alive until interrupted.
    Hold,
    /// Inspect or create the configuration file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Args)]
struct VerifyArgs {
    /// Scenario to run; repeat for several. Runs all when omitted.
    #[arg(long = "scenario", value_name = "NAME")]
    scenarios: Vec<String>,
    /// JSON file with extra scenarios.
    #[arg(long, value_name = "PATH")]
    scenario_file: Option<PathBuf>,
    /// Skip the two-poll consistency check.
    #[arg(long)]
    no_consistency: bool,
    /// Wait a fixed time after each command instead of polling.
    #[arg(long, value_name = "MS")]
    fixed_delay: Option<u64>,
}

#[derive(Debug, Args)]
struct MonitorArgs {
    /// Stop after this many polls.
    #[arg(long, value_name = "N")]
    iterations: Option<u64>,
    /// Override the refresh period.
    #[arg(long, value_name = "MS")]
    refresh_ms: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration.
    Show,
    /// Print the configuration file location.
    Path,
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json, cli.verbose)?;
    tracing::debug!("lcnckit {} (built {})", VERSION, BUILD_DATE);

    let config_path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => Config::default_path().ok(),
    };
    let config = match &config_path {
        Some(path) => Config::load_or_default(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Command::Check => check(&config, cli.json),
        Command::Verify(args) => verify(&config, args, cli.json),
        Command::Monitor(args) => monitor(&config, args).await,
        Command::Hold => hold().await,
        Command::Config(command) => config_command(command, &config, config_path),
    }
}

fn runner(config: &Config) -> TransitionRunner {
    TransitionRunner::new(config.harness.settle)
        .with_min_shared_fields(config.harness.min_shared_fields)
}

fn check(config: &Config, json: bool) -> anyhow::Result<()> {
    let mut controller = build_controller(&config.controller);
    let report = runner(config).check_consistency(&mut controller);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.passed() {
        println!("Status consistent ({} shared fields)", report.shared_fields);
    }

    if let Some(reason) = report.failure {
        bail!("consistency check failed: {}", reason);
    }
    Ok(())
}

fn select_scenarios(config: &Config, args: &VerifyArgs) -> anyhow::Result<Vec<Scenario>> {
    let mut available = builtin_scenarios();
    if let Some(path) = args
        .scenario_file
        .as_ref()
        .or(config.harness.scenario_file.as_ref())
    {
        let extra = Scenario::load_all(path)
            .with_context(|| format!("loading scenarios from {}", path.display()))?;
        available.extend(extra);
    }

    if args.scenarios.is_empty() {
        return Ok(available);
    }
    args.scenarios
        .iter()
        .map(|name| {
            available
                .iter()
                .find(|s| &s.name == name)
                .cloned()
                .with_context(|| format!("unknown scenario '{}'", name))
        })
        .collect()
}

fn verify(config: &Config, args: VerifyArgs, json: bool) -> anyhow::Result<()> {
    let scenarios = select_scenarios(config, &args)?;

    let mut runner = runner(config);
    if let Some(delay_ms) = args.fixed_delay {
        runner = TransitionRunner::new(SettleStrategy::Fixed { delay_ms })
            .with_min_shared_fields(config.harness.min_shared_fields);
    }
    let dispatcher = EventDispatcher::default();
    let mut events = dispatcher.subscribe();
    let runner = runner.with_dispatcher(dispatcher);

    let mut controller = build_controller(&config.controller);
    let consistency = config.harness.check_consistency && !args.no_consistency;
    let report = runner.run(&mut controller, &scenarios, consistency);

    while let Ok(event) = events.try_recv() {
        tracing::debug!("{}", event);
    }

    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report);
    }

    if !report.passed() {
        bail!("{} check(s) failed", report.failure_count());
    }
    Ok(())
}

async fn monitor(config: &Config, args: MonitorArgs) -> anyhow::Result<()> {
    let mut settings = config.display;
    if let Some(refresh_ms) = args.refresh_ms.filter(|ms| *ms > 0) {
        settings.refresh_ms = refresh_ms;
    }
    let mut controller = build_controller(&config.controller);
    let mut stdout = std::io::stdout();

    let summary = run_monitor(
        &mut controller,
        settings,
        args.iterations,
        None,
        &mut stdout,
    )
    .await?;
    tracing::info!(
        "Monitor stopped after {} polls ({} redraws, {} losses)",
        summary.polls,
        summary.redraws,
        summary.losses
    );
    Ok(())
}

async fn hold() -> anyhow::Result<()> {
    tracing::info!("Holding until interrupted");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupted, exiting");
    Ok(())
}

fn config_command(
    command: ConfigCommand,
    config: &Config,
    path: Option<PathBuf>,
) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigCommand::Path => match path {
            Some(path) => println!("{}", path.display()),
            None => bail!("no configuration directory on this platform"),
        },
        ConfigCommand::Init { force } => {
            let path = path.context("no configuration directory on this platform")?;
            if path.exists() && !force {
                bail!("{} already exists (use --force)", path.display());
            }
            Config::default().save_to_file(&path)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}
