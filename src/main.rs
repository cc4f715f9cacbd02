mod analytics;
mod config;
mod error;
mod forecast;
mod notifications;
mod types;
mod upstream;
mod web;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use analytics::{fetch_snapshot, TradingSnapshot};
use config::Settings;
use forecast::{Horizon, LanguageModel, OpenAiChatClient, PredictProfitInput, ProfitForecaster};
use notifications::NotificationTracker;
use types::BotModel;
use upstream::{BotApi, BotApiClient};
use web::{start_dashboard_server, AppState};

#[derive(Parser)]
#[command(name = "starshot")]
#[command(version)]
#[command(about = "Dashboard for the ChatGPT and Gemini trading bots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the dashboard and its JSON API
    Serve {
        /// Dashboard port (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print one bot's trading snapshot as JSON
    Snapshot {
        /// Bot to query (chatgpt or gemini)
        #[arg(short, long)]
        model: BotModel,
    },
    /// Poll both bots and log newly completed trades
    Watch {
        /// Poll interval in seconds (overrides polling.interval_secs)
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Forecast one bot's cumulative profit
    Predict {
        /// Bot whose history is used
        #[arg(short, long)]
        model: BotModel,
        /// Forecast horizon: 1W, 1M, 3M or 1Y
        #[arg(short, long, default_value = "1M")]
        duration: Horizon,
    },
    /// Print the effective configuration with secrets masked
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::load(&cli.config)?;
    init_logging(cli.verbose, settings.logging.json)?;

    info!("Starshot dashboard v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve { port } => {
            run_server(settings, port).await?;
        }
        Commands::Snapshot { model } => {
            let snapshot = snapshot(&settings, model).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Watch { interval } => {
            run_watch(settings, interval).await?;
        }
        Commands::Predict { model, duration } => {
            run_predict(&settings, model, duration).await?;
        }
        Commands::ShowConfig => {
            println!("{}", toml::to_string_pretty(&settings.redacted())?);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn build_api(settings: &Settings) -> Result<Arc<dyn BotApi>> {
    let client = BotApiClient::new(settings.models.clone(), settings.polling.request_timeout())?;
    Ok(Arc::new(client))
}

fn build_forecaster(settings: &Settings) -> Result<Option<ProfitForecaster>> {
    if !settings.llm.is_configured() {
        return Ok(None);
    }
    let model: Arc<dyn LanguageModel> = Arc::new(OpenAiChatClient::new(&settings.llm)?);
    Ok(Some(ProfitForecaster::new(model)))
}

async fn snapshot(settings: &Settings, model: BotModel) -> Result<TradingSnapshot> {
    let api = build_api(settings)?;
    let snapshot = fetch_snapshot(api.as_ref(), model, settings.models.get(model)).await?;
    Ok(snapshot)
}

async fn run_server(settings: Settings, port: Option<u16>) -> Result<()> {
    let api = build_api(&settings)?;
    let forecaster = build_forecaster(&settings)?;
    if forecaster.is_none() {
        warn!("llm.api_key not set, /api/predict-profit will answer 503");
    }

    for model in BotModel::all() {
        info!("{} API: {}", model.display_name(), settings.models.get(model).base_url);
    }

    let host = settings.server.host.clone();
    let port = port.unwrap_or(settings.server.port);
    let state = AppState::new(Arc::new(settings), api, forecaster.map(Arc::new));

    start_dashboard_server(state, &host, port).await
}

async fn run_watch(settings: Settings, interval: Option<u64>) -> Result<()> {
    let api = build_api(&settings)?;
    let tracker = NotificationTracker::new();
    let period = interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| settings.polling.interval());
    if period.is_zero() {
        return Err(anyhow!("Poll interval must be > 0"));
    }

    info!("Watching both bots every {}s (Ctrl+C to stop)", period.as_secs());
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let polls = BotModel::all().into_iter().map(|model| {
                    let api = api.clone();
                    let settings = settings.models.get(model).clone();
                    async move { (model, fetch_snapshot(api.as_ref(), model, &settings).await) }
                });

                for (model, result) in join_all(polls).await {
                    match result {
                        Ok(snapshot) => {
                            info!(
                                "{}: {} open, {} closed, P&L ${:.2}, win rate {:.1}%",
                                model.display_name(),
                                snapshot.open_trades.len(),
                                snapshot.stats.total_trades,
                                snapshot.stats.pnl,
                                snapshot.stats.win_rate * Decimal::ONE_HUNDRED
                            );
                            tracker.observe(model, snapshot.stats.total_trades).await;
                        }
                        Err(e) => error!("{}: snapshot failed: {}", model.display_name(), e),
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down watcher ({} unread)", tracker.unread_count().await);
                break;
            }
        }
    }

    Ok(())
}

async fn run_predict(settings: &Settings, model: BotModel, duration: Horizon) -> Result<()> {
    let forecaster = build_forecaster(settings)?
        .ok_or_else(|| anyhow!("Set llm.api_key (or STARSHOT__LLM__API_KEY) to enable forecasting"))?;

    let snapshot = snapshot(settings, model).await?;
    let input = PredictProfitInput {
        history: snapshot.forecast_history(),
        duration,
    };

    let output = forecaster.predict(&input).await?;
    if output.prediction.is_empty() {
        warn!("{} has fewer than 2 closed trades, nothing to forecast", model.display_name());
        return Ok(());
    }

    println!("\n=== {} forecast ({}) ===", model.display_name(), duration);
    for point in &output.prediction {
        println!("{}  {}  ${:.2}", point.name, point.date, point.predicted_profit);
    }

    Ok(())
}
