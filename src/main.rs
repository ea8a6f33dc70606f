use anyhow::Result;
use bwmon::{app, config, App};
use bwmon_core::{AppConfig, Module};
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;

/// bwmon - bandwidth monitor and rate estimator
#[derive(Parser, Debug, Clone)]
#[command(name = "bwmon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input modules, e.g. "dummy:num=3;randomize"
    #[arg(short = 'i', long = "input", value_name = "MODPARM")]
    input: Option<String>,

    /// Output modules, e.g. "ascii:diagram=details;quitafter=1"
    #[arg(short = 'o', long = "output", value_name = "MODPARM")]
    output: Option<String>,

    /// Seconds between two read passes
    #[arg(short = 'r', long = "read-interval", value_name = "FLOAT")]
    read_interval: Option<f64>,

    /// Seconds a rate is computed over
    #[arg(short = 'R', long = "rate-interval", value_name = "FLOAT")]
    rate_interval: Option<f64>,

    /// Seconds an unreported element is kept
    #[arg(short = 'L', long = "lifetime", value_name = "LIFETIME")]
    lifetime: Option<f64>,

    /// Element policy, e.g. "eth*,!eth1"
    #[arg(short = 'p', long = "policy", value_name = "POLICY")]
    policy: Option<String>,

    /// Configuration file (default: the user config directory)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show all elements, ignoring policy and hidden elements
    #[arg(short = 'a', long = "show-all")]
    show_all: bool,

    /// Debug verbosity level (0=quiet, 1=info, 2=debug, 3=trace)
    #[arg(short = 'd', long = "debug", action = clap::ArgAction::Count)]
    debug: u8,

    /// List available input and output modules
    #[arg(long = "list-modules")]
    list_modules: bool,
}

impl Cli {
    /// Command line values take precedence over the configuration file
    fn apply(&self, config: &mut AppConfig) {
        if let Some(input) = &self.input {
            config.input = Some(input.clone());
        }
        if let Some(output) = &self.output {
            config.output = Some(output.clone());
        }
        if let Some(read_interval) = self.read_interval {
            config.settings.read_interval = read_interval;
        }
        if let Some(rate_interval) = self.rate_interval {
            config.settings.rate_interval = rate_interval;
        }
        if let Some(lifetime) = self.lifetime {
            config.settings.lifetime = lifetime;
        }
        if let Some(policy) = &self.policy {
            config.settings.policy = policy.clone();
        }
        if self.show_all {
            config.settings.show_all = true;
        }
    }
}

fn list_modules() {
    let (input, output) = app::subsystems();
    for subsystem in [&input, &output] {
        println!("{} modules:", subsystem.name());
        for module in subsystem.modules() {
            print_module(module);
        }
        println!();
    }
}

fn print_module(module: &dyn Module) {
    println!("  {:<10} {}", module.name(), module.description());
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Initialize logger with verbosity based on -d/--debug flag
    let log_level = match cli.debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // Allow RUST_LOG to override CLI setting
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if cli.list_modules {
        list_modules();
        return;
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => config::load_from_path(path)?,
        None => config::load()?,
    };
    cli.apply(&mut config);

    info!("Starting bwmon v{}", env!("CARGO_PKG_VERSION"));

    App::new(&config)?.run().await
}
