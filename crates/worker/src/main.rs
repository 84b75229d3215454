use anyhow::Context;
use clap::{Parser, Subcommand};
use rsiwatch_core::backtest::{BacktestParams, DEFAULT_BACKTEST_OVERSOLD_THRESHOLD};
use rsiwatch_core::domain::stock::Ticker;
use rsiwatch_core::ingest::provider::YahooChartSource;
use rsiwatch_core::ingest::types::Lookback;
use rsiwatch_core::notify::console::ConsoleNotifier;
use rsiwatch_core::notify::webhook::WebhookNotifier;
use rsiwatch_core::notify::Notifier;
use rsiwatch_core::run::{InvocationContext, RunOptions};
use rsiwatch_core::strategy::budget::BudgetPolicy;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "rsiwatch_worker")]
#[command(about = "Weekly RSI screen and allocation report", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch prices, classify by RSI and deliver the weekly report (default).
    Report(ReportArgs),
    /// Replay the weekly oversold screen over a historical window.
    Backtest(BacktestArgs),
}

#[derive(Debug, Default, clap::Args)]
struct ReportArgs {
    /// Print the report instead of delivering it.
    #[arg(long)]
    dry_run: bool,

    /// Comma separated tickers. Overrides RSI_TICKERS.
    #[arg(long)]
    tickers: Option<String>,

    #[arg(long)]
    rsi_window: Option<usize>,

    #[arg(long)]
    oversold: Option<f64>,

    #[arg(long)]
    overbought: Option<f64>,

    /// History fetched per ticker (5d, 1mo, 3mo, 6mo, 1y, 2y, 5y).
    #[arg(long)]
    lookback: Option<Lookback>,

    /// fixed, rsi_scaled or per_stock.
    #[arg(long)]
    budget_policy: Option<String>,

    /// Amount for the budget policy (total, base, or per stock).
    #[arg(long)]
    budget: Option<f64>,
}

#[derive(Debug, clap::Args)]
struct BacktestArgs {
    /// First day of the window (YYYY-MM-DD).
    #[arg(long)]
    start: chrono::NaiveDate,

    /// Last day of the window (YYYY-MM-DD).
    #[arg(long)]
    end: chrono::NaiveDate,

    #[arg(long, default_value_t = 100.0)]
    weekly_budget: f64,

    #[arg(long, default_value_t = 14)]
    rsi_window: usize,

    /// Defaults to BACKTEST_OVERSOLD_THRESHOLD, then 95.
    #[arg(long)]
    oversold_threshold: Option<f64>,

    /// Comma separated tickers. Defaults to the report universe.
    #[arg(long)]
    tickers: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = rsiwatch_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Report(ReportArgs::default()));

    let res = match command {
        Command::Report(args) => run_report(&settings, args).await,
        Command::Backtest(args) => run_backtest(&settings, args).await,
    };

    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "worker run failed");
    }
    res
}

async fn run_report(
    settings: &rsiwatch_core::config::Settings,
    args: ReportArgs,
) -> anyhow::Result<()> {
    let mut opts = RunOptions::from_env()?;
    apply_report_overrides(&mut opts, &args)?;

    let source = YahooChartSource::from_settings(settings)?;
    let notifier: Box<dyn Notifier> = if args.dry_run {
        Box::new(ConsoleNotifier)
    } else {
        Box::new(WebhookNotifier::from_settings(settings)?)
    };

    let ctx = InvocationContext::new();
    let event = serde_json::json!({
        "source": "rsiwatch_worker",
        "dry_run": args.dry_run,
    });

    let summary = rsiwatch_core::run::handle_invocation(
        &event,
        &ctx,
        &source,
        notifier.as_ref(),
        &opts,
    )
    .await?;

    tracing::info!(
        invocation_id = %summary.invocation_id,
        dry_run = args.dry_run,
        oversold = summary.oversold.len(),
        overbought = summary.overbought.len(),
        total_allocated = summary.total_allocated,
        "weekly report run finished"
    );
    Ok(())
}

fn apply_report_overrides(opts: &mut RunOptions, args: &ReportArgs) -> anyhow::Result<()> {
    if let Some(s) = args.tickers.as_deref() {
        opts.tickers = Ticker::parse_list(s).context("invalid --tickers")?;
    }
    if let Some(n) = args.rsi_window {
        opts.rsi_window = n;
    }
    if let Some(v) = args.oversold {
        opts.thresholds.oversold = v;
    }
    if let Some(v) = args.overbought {
        opts.thresholds.overbought = v;
    }
    if let Some(lookback) = args.lookback {
        opts.lookback = lookback;
    }
    if args.budget_policy.is_some() || args.budget.is_some() {
        opts.budget_policy = BudgetPolicy::from_parts(
            args.budget_policy
                .as_deref()
                .unwrap_or(opts.budget_policy.kind()),
            args.budget.unwrap_or(opts.budget_policy.amount()),
        )?;
    }

    opts.validate()
}

async fn run_backtest(
    settings: &rsiwatch_core::config::Settings,
    args: BacktestArgs,
) -> anyhow::Result<()> {
    let tickers = match args.tickers.as_deref() {
        Some(s) => Ticker::parse_list(s).context("invalid --tickers")?,
        None => RunOptions::from_env()?.tickers,
    };
    anyhow::ensure!(!tickers.is_empty(), "ticker list must be non-empty");

    let oversold_threshold = match args.oversold_threshold {
        Some(v) => v,
        None => backtest_threshold_from_env()?.unwrap_or(DEFAULT_BACKTEST_OVERSOLD_THRESHOLD),
    };

    let params = BacktestParams {
        rsi_window: args.rsi_window,
        oversold_threshold,
        ..BacktestParams::new(args.start, args.end, args.weekly_budget)
    };

    let source = YahooChartSource::from_settings(settings)?;
    let result = rsiwatch_core::backtest::backtest(&source, &tickers, &params).await?;

    for week in &result.weeks {
        tracing::info!(
            date = %week.date,
            buys = week.allocation.len(),
            spent = week.spent,
            "backtest week"
        );
    }

    let gain = result.final_value - result.amount_invested;
    tracing::info!(
        weeks = result.weeks.len(),
        amount_invested = result.amount_invested,
        final_value = result.final_value,
        gain,
        "backtest finished"
    );

    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("failed to serialize backtest result")?
    );
    Ok(())
}

fn backtest_threshold_from_env() -> anyhow::Result<Option<f64>> {
    match std::env::var("BACKTEST_OVERSOLD_THRESHOLD") {
        Ok(s) if !s.trim().is_empty() => {
            let v = s
                .trim()
                .parse::<f64>()
                .with_context(|| format!("invalid BACKTEST_OVERSOLD_THRESHOLD: {s:?}"))?;
            Ok(Some(v))
        }
        _ => Ok(None),
    }
}

fn init_sentry(settings: &rsiwatch_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
