// SPDX-License-Identifier: MIT

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use futures::StreamExt;
use std::time::Duration;

use typeless_rs::epic::Action;
use typeless_rs::typeless::counter::{counter_module, CounterState};
use typeless_rs::typeless::{ConfigLoader, EngineConfig, Runtime};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the counter module and print every state transition
    Counter {
        /// How many times to press "increase"
        #[arg(short, long, default_value_t = 3)]
        clicks: u32,

        /// Delay before the epic answers, in milliseconds
        #[arg(short, long, default_value_t = 500)]
        delay_ms: u64,

        /// Engine config file (YAML); defaults to the environment
        #[arg(long)]
        config: Option<String>,
    },
    /// Validate an engine config file
    CheckConfig {
        /// Path to the config file
        #[arg(short, long)]
        file: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Counter {
            clicks,
            delay_ms,
            config,
        } => {
            let config = match config {
                Some(path) => ConfigLoader::new()
                    .load(&path)
                    .with_context(|| format!("Failed to load config from {}", path))?,
                None => EngineConfig::from_env()?,
            };
            run_counter(config, clicks, Duration::from_millis(delay_ms)).await?;
        }
        Commands::CheckConfig { file } => {
            let config = ConfigLoader::new()
                .load(&file)
                .with_context(|| format!("Invalid config {}", file))?;
            println!("{} is valid", file);
            println!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}

async fn run_counter(config: EngineConfig, clicks: u32, delay: Duration) -> anyhow::Result<()> {
    let (module, actions) = counter_module(delay);
    let runtime = Runtime::builder(CounterState::default())
        .module(module)
        .config(config)
        .start()?;
    let mut applied = runtime.subscribe();

    print_state(None, &runtime.state());
    for _ in 0..clicks {
        runtime.dispatch(actions.start_count.create(()));

        // The button stays disabled until the count comes back
        while let Some(action) = applied.next().await {
            print_state(Some(&action), &runtime.state());
            if actions.count_done.matches(&action) {
                break;
            }
        }
    }

    runtime.shutdown().await?;
    Ok(())
}

fn print_state(action: Option<&Action>, state: &CounterState) {
    let label = action.map(|a| a.kind().to_string()).unwrap_or_default();
    let button = if state.is_loading { "loading..." } else { "increase" };
    println!("{:<22} [{}] count: {}", label, button, state.count);
}
