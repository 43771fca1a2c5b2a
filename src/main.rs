//! td3dash - TD3 trading agent results dashboard
//!
//! Usage:
//!   td3dash serve                 # results/run backend
//!   td3dash show [--json]         # load results and print the dashboard
//!   td3dash run --episodes 5      # retrain, then print log and dashboard

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::num::NonZeroU32;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use td3_dashboard::{
    api,
    config::{ClientConfig, ServerConfig, MAX_EPISODES},
    pipeline::{derive::short_date_label, metric_cards, HttpResultsClient, ResultsCache},
    Dashboard, RunReport, ViewState,
};

/// Rows of each series printed in text mode
const TAIL_ROWS: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "td3dash")]
#[command(about = "TD3 trading agent results dashboard")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve results and run the training job over HTTP
    Serve {
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
    /// Load the latest results and print them
    Show {
        #[command(flatten)]
        client: ClientArgs,

        /// Print the derived series as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// Retrain the model, then print the run log and results
    Run {
        #[command(flatten)]
        client: ClientArgs,

        /// Episode count hint passed to the training job
        #[arg(long, env = "TD3_EPISODES", value_parser = clap::value_parser!(u32).range(1..=MAX_EPISODES as i64))]
        episodes: Option<u32>,

        #[arg(long, default_value = "false")]
        json: bool,
    },
}

#[derive(clap::Args, Debug)]
struct ClientArgs {
    /// Base URL of the results backend
    #[arg(long, env = "TD3_API_URL")]
    api_url: Option<String>,

    /// Static results artifact used when the backend has nothing
    #[arg(long, env = "TD3_FALLBACK_URL")]
    fallback_url: Option<String>,
}

impl ClientArgs {
    fn into_config(self) -> Result<ClientConfig> {
        let mut config = ClientConfig::from_env().context("Invalid client configuration")?;
        if let Some(api_url) = self.api_url {
            config.api_base = api_url;
        }
        if let Some(fallback_url) = self.fallback_url {
            config.fallback_url = fallback_url;
        }
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_tracing();

    match run_cli(Args::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(3)
        }
    }
}

async fn run_cli(args: Args) -> Result<ExitCode> {
    match args.command {
        Command::Serve { port } => {
            let mut config = ServerConfig::from_env().context("Invalid server configuration")?;
            if let Some(port) = port {
                config.port = port;
            }
            api::serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { client, json } => {
            let dashboard = build_dashboard(&client.into_config()?)?;
            let state = dashboard.mount().await?;
            render(&state, json)?;
            Ok(exit_code(&state))
        }
        Command::Run {
            client,
            episodes,
            json,
        } => {
            let config = client.into_config()?;
            let episodes = NonZeroU32::new(episodes.unwrap_or(config.episodes))
                .context("episodes must be positive")?;
            let dashboard = build_dashboard(&config)?;
            dashboard.mount().await?;

            info!(episodes = episodes.get(), "Running model (this can take a few minutes)");
            let state = dashboard.run(episodes).await?;
            render(&state, json)?;
            Ok(exit_code(&state))
        }
    }
}

fn build_dashboard(config: &ClientConfig) -> Result<Dashboard> {
    let transport = Arc::new(HttpResultsClient::new(config)?);
    let cache = ResultsCache::new(config.cache_max_age);
    Ok(Dashboard::new(transport, cache))
}

fn exit_code(state: &ViewState) -> ExitCode {
    match state {
        ViewState::Ready { .. } => ExitCode::SUCCESS,
        ViewState::Empty { .. } => ExitCode::from(1),
        _ => ExitCode::from(2),
    }
}

fn render(state: &ViewState, json: bool) -> Result<()> {
    if json {
        let series = state.visible_view().map(|v| v.series.as_ref());
        let doc = serde_json::json!({
            "state": state.kind(),
            "runLog": state.report().map(|r| r.log.clone()).unwrap_or_default(),
            "runError": state.report().and_then(|r| r.error.clone()),
            "metrics": state.visible_view().map(|v| v.payload.metrics()),
            "series": series,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).context("Failed to encode output")?
        );
        return Ok(());
    }

    if let Some(report) = state.report() {
        print_report(report);
    }

    match state {
        ViewState::Loading | ViewState::Running { .. } => println!("Loading…"),
        ViewState::Error { message } => {
            println!("Could not load results: {}", message);
            println!("Try `td3dash show` again.");
        }
        ViewState::Empty { .. } => {
            println!("No TD3 results yet.");
            println!("Run `td3dash run` to train the model, or `td3dash show` to check again.");
        }
        ViewState::ErrorWithLog { previous: None, .. } => {
            println!("No TD3 results yet. Retry with `td3dash run`.");
        }
        _ => {}
    }

    if let Some(view) = state.visible_view() {
        println!("=== TD3 Model Output ===");
        for card in metric_cards(view.payload.metrics()) {
            println!("  {:<22} {:>12}", card.label, card.value);
        }
        println!();

        let series = &view.series;
        if series.is_empty() {
            println!("  (no samples)");
            return Ok(());
        }
        println!(
            "  {:<8} {:>10} {:>10} {:>10} {:>10} {:>10} {:>8} {:>8}",
            "date", "open", "high", "low", "close", "equity", "action", "position"
        );
        let start = series.len().saturating_sub(TAIL_ROWS);
        for i in start..series.len() {
            let bar = &series.bars[i].bar;
            let equity = &series.equity_curve[i];
            let signal = &series.signal_series[i];
            println!(
                "  {:<8} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.4} {:>8.2} {:>8.2}",
                short_date_label(&equity.date),
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                equity.value,
                signal.action,
                signal.position
            );
        }
        println!("  ({} samples)", series.len());
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    if report.is_blank() {
        return;
    }
    println!("=== Run output ===");
    if let Some(error) = &report.error {
        println!("{}", error);
    }
    if report.log.is_empty() {
        println!("(no output)");
    }
    for line in &report.log {
        println!("  {}", line);
    }
    println!();
}

/// Initialize tracing; `RUST_LOG` overrides the default filter
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "td3_dashboard=info,td3dash=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
