use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::{Parser, Subcommand};
use guard::{
    BlockOutcome, ConfigSources, DisableEc2Metadata, DryRunExecutor, GuardError, MODULE_META,
    MODULE_NAME, SystemLocator, TracingDiagnostics, load_config,
};
use types::{GuardConfig, init_tracing};

#[derive(Debug, Clone, Subcommand, PartialEq, Eq)]
enum CliCommand {
    /// Print module metadata and whether the loaded config activates it
    Describe,
}

#[derive(Debug, Clone, Parser, PartialEq, Eq)]
#[command(
    name = "imds-guard",
    about = "Reject host routes to the cloud metadata endpoint"
)]
struct CliArgs {
    #[arg(short = 'c', long = "config")]
    config_path: Option<PathBuf>,
    /// Force `disable_ec2_metadata = true` regardless of config
    #[arg(long = "enable")]
    enable: bool,
    /// Print the route commands instead of running them
    #[arg(long = "dry-run")]
    dry_run: bool,
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
    #[command(subcommand)]
    command: Option<CliCommand>,
}

fn main() -> ExitCode {
    if let Err(error) = run() {
        eprintln!("imds-guard error: {error}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> Result<(), GuardError> {
    let args = CliArgs::parse();
    init_tracing(if args.verbose { "debug" } else { "info" });

    let config = load_config(&ConfigSources {
        file: args.config_path.clone(),
        overrides: cli_overrides(&args),
        ..ConfigSources::default()
    })?;

    if let Some(CliCommand::Describe) = args.command {
        describe(&config);
        return Ok(());
    }

    let outcome = if args.dry_run {
        let executor = Arc::new(DryRunExecutor::default());
        let action = DisableEc2Metadata::new(
            Arc::new(SystemLocator::from_env()),
            executor.clone(),
            Arc::new(TracingDiagnostics),
        );
        let outcome = action.handle(MODULE_NAME, &config)?;
        for command in executor.planned() {
            println!("would_run={command}");
        }
        outcome
    } else {
        DisableEc2Metadata::for_host().handle(MODULE_NAME, &config)?
    };

    println!("outcome={}", outcome.as_label());
    match &outcome {
        BlockOutcome::Blocked { tool } => println!("tool={tool}"),
        BlockOutcome::NoRoutingTool { checked } => println!("checked={}", checked.join(",")),
        BlockOutcome::Skipped => {}
    }
    tracing::debug!(outcome = outcome.as_label(), "metadata guard finished");
    Ok(())
}

fn cli_overrides(args: &CliArgs) -> GuardConfig {
    if args.enable {
        GuardConfig::with_disable_ec2_metadata(true)
    } else {
        GuardConfig::default()
    }
}

fn describe(config: &GuardConfig) {
    println!("id={}", MODULE_META.id);
    println!("name={}", MODULE_META.name);
    println!("title={}", MODULE_META.title);
    println!("description={}", MODULE_META.description);
    println!("distros={}", MODULE_META.distros.join(","));
    println!("frequency={}", MODULE_META.frequency);
    println!("activate_by_keys={}", MODULE_META.activate_by_keys.join(","));
    for example in MODULE_META.examples {
        println!("example={example}");
    }
    println!("activated={}", MODULE_META.activates(config));
}
