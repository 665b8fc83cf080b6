use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use issuegate_core::GateConfig;
use issuegate_gate::{Scenario, ScenarioRunner};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("issuegate")
        .version(issuegate_core::VERSION)
        .about("Confidentiality and spam gated issue mutations")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("check-config")
                .about("Validate a gate configuration file")
                .arg(config_arg().required(true)),
        )
        .subcommand(
            Command::new("replay")
                .about("Replay a JSON scenario against the in-memory store")
                .arg(config_arg())
                .arg(
                    Arg::new("scenario")
                        .long("scenario")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("Path to the scenario JSON file"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the report as JSON"),
                ),
        );

    let matches = cli.get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("check-config", args)) => check_config(args),
        Some(("replay", args)) => replay(args).await,
        _ => Ok(()),
    }
}

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .value_parser(clap::value_parser!(PathBuf))
        .help("Path to the gate configuration (TOML)")
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &ArgMatches) -> anyhow::Result<GateConfig> {
    match args.get_one::<PathBuf>("config") {
        Some(path) => GateConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(GateConfig::default()),
    }
}

fn check_config(args: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(args)?;
    println!("Configuration OK");
    println!(
        "  spam check:   {}",
        if config.anti_abuse.spam_check_enabled { "enabled" } else { "disabled" }
    );
    println!(
        "  recaptcha:    {}",
        if config.anti_abuse.recaptcha_enabled { "enabled" } else { "disabled" }
    );
    println!("  title limit:  {}", config.limits.max_title_length);
    println!("  spam terms:   {}", config.offline.spam_terms.len());
    Ok(())
}

async fn replay(args: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let path = args
        .get_one::<PathBuf>("scenario")
        .context("missing --scenario")?;
    let scenario = Scenario::load(path)
        .with_context(|| format!("loading scenario from {}", path.display()))?;

    let report = ScenarioRunner::new(&config).run(&scenario).await?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for step in &report.steps {
        println!("{step}");
    }
    println!();
    println!("Issues stored: {}", report.issue_count);
    println!("Spam logs:     {}", report.spam_logs.len());
    for log in &report.spam_logs {
        println!(
            "  {} user {} verified={} \"{}\"",
            log.id, log.user, log.recaptcha_verified, log.title
        );
    }
    println!("Notifications: {}", report.events.len());
    Ok(())
}
