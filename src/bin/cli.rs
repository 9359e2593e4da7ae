use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use capscan::config::Config;
use capscan::error::CapscanError;
use capscan::{generate_policy, output, policy, ScanOptions};

#[derive(Parser)]
#[command(
    name = "capscan",
    about = "Static capability policy generator for npm package trees",
    version,
    author
)]
struct Cli {
    /// Path to the package root
    path: Option<PathBuf>,

    /// Overwrite the stored policy with the derived one
    #[arg(long, short = 'w')]
    overwrite: bool,

    /// Log source locations of recorded capabilities (debug aid)
    #[arg(long)]
    locations: bool,

    /// Trace specific members of modules and globals
    #[arg(long, short = 'm')]
    members: bool,

    /// Do not keep a .old backup when overwriting the policy
    #[arg(long)]
    no_backup: bool,

    /// Include non-builtin module specifiers in the policy
    #[arg(long)]
    all_modules: bool,

    /// Emit the merged policy as JSON to stdout
    #[arg(long)]
    stdout: bool,

    /// Policy file path (default /tmp/node_policy.json)
    #[arg(long)]
    policy_file: Option<PathBuf>,

    /// Config file path (default <path>/.capscan.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(path) = cli.path.clone() else {
        eprintln!("Usage: capscan <path> [options]");
        process::exit(1);
    };

    match run(&path, cli) {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn run(path: &Path, cli: Cli) -> Result<i32, CapscanError> {
    let config_path = cli
        .config
        .unwrap_or_else(|| path.join(".capscan.toml"));
    let config = Config::load(&config_path)?;

    let options = ScanOptions {
        member_access_tracing: cli.members || config.policy.member_access_tracing,
        include_locations: cli.locations,
        include_external_modules: cli.all_modules || config.policy.include_external_modules,
        extra_builtin_modules: config.policy.extra_builtin_modules.clone(),
    };

    let policy_path = cli.policy_file.unwrap_or_else(|| config.policy.file.clone());

    let derived = generate_policy(path, &options)?;

    // The diff against the stored policy is the review artifact: it shows
    // which packages gained or lost capabilities since the last run.
    let previous = output::load_policy(&policy_path)?.unwrap_or_default();
    let diff = policy::diff::diff(&previous, &derived);
    eprint!("{}", output::console::render_diff(&diff));

    if cli.stdout {
        print!("{}", output::json::render(&derived)?);
    }

    if cli.overwrite {
        output::save_policy(&policy_path, &derived, !cli.no_backup)?;
        eprintln!("  Policy written to {}", policy_path.display());
    }

    Ok(0)
}
