use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use exchange_optimizer::evaluation::{EvalContext, Evaluation, PolicyObjective, evaluate};
use exchange_optimizer::optimizer::{ParamBounds, optimize};
use exchange_optimizer::params::PolicyParams;
use exchange_optimizer::smoothing::SmoothedState;
use exchange_optimizer::{AppConfig, PolicySimulator, PriceMatrix, logging, report};

#[derive(Parser, Debug)]
#[command(author, version, about = "Trading-policy simulator and parameter optimizer")]
struct Cli {
    /// TOML file with [simulation], [optimizer] and [logging] sections.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay one parameter vector over a price file.
    Evaluate {
        #[arg(long)]
        prices: PathBuf,
        /// q1,q2,q3,fc,phi,B,S[,extra weights]; defaults to the configured initial guess.
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        params: Vec<f64>,
        /// Full history as JSON.
        #[arg(long)]
        history: Option<PathBuf>,
        /// Per-day summary CSV.
        #[arg(long)]
        summary: Option<PathBuf>,
        /// Per-instrument CSV.
        #[arg(long)]
        detail: Option<PathBuf>,
    },
    /// Search for the parameters with the highest final value.
    Optimize {
        #[arg(long)]
        prices: PathBuf,
        /// Held-out prices the optimum is re-evaluated on.
        #[arg(long)]
        test_prices: Option<PathBuf>,
        #[arg(long, default_value = "optimized_params.json")]
        out: PathBuf,
        #[arg(long)]
        max_evals: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Smoothed series of one instrument under several forgetting factors.
    Smooth {
        #[arg(long)]
        prices: PathBuf,
        #[arg(long, default_value_t = 0)]
        instrument: usize,
        #[arg(long, value_delimiter = ',', default_values_t = [0.7, 0.5, 0.3])]
        phi: Vec<f64>,
        #[arg(long, default_value = "smoothing.csv")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    logging::init(&config.logging);

    match cli.command {
        Command::Evaluate {
            prices,
            params,
            history,
            summary,
            detail,
        } => {
            let params = if params.is_empty() {
                config.optimizer.initial_guess.clone()
            } else {
                params
            };
            run_evaluate(&config, &prices, &params, history, summary, detail)
        }
        Command::Optimize {
            prices,
            test_prices,
            out,
            max_evals,
            seed,
        } => {
            if let Some(n) = max_evals {
                config.optimizer.max_evals = n;
            }
            if let Some(s) = seed {
                config.optimizer.seed = s;
            }
            run_optimize(&config, &prices, test_prices.as_deref(), &out)
        }
        Command::Smooth {
            prices,
            instrument,
            phi,
            out,
        } => run_smooth(&prices, instrument, &phi, &out),
    }
}

fn run_evaluate(
    config: &AppConfig,
    prices_path: &Path,
    params: &[f64],
    history: Option<PathBuf>,
    summary: Option<PathBuf>,
    detail: Option<PathBuf>,
) -> Result<()> {
    let prices = load_prices(prices_path)?;
    let sim = PolicySimulator::new(config.simulation)?;
    let wants_history = history.is_some() || summary.is_some() || detail.is_some();
    let ctx = EvalContext::with_diagnostics(&prices, u32::from(wants_history));

    let eval = evaluate(&sim, params, &ctx)?;
    print_value("final", &eval);

    if let Some(h) = eval.history.as_ref() {
        if let Some(path) = history {
            report::write_history_json(h, create(&path)?)?;
            println!("Saved history: {}", path.display());
        }
        if let Some(path) = summary {
            report::write_summary_csv(h, create(&path)?)?;
            println!("Saved summary: {}", path.display());
        }
        if let Some(path) = detail {
            report::write_instruments_csv(h, &prices, create(&path)?)?;
            println!("Saved detail: {}", path.display());
        }
    }
    Ok(())
}

fn run_optimize(
    config: &AppConfig,
    prices_path: &Path,
    test_path: Option<&Path>,
    out: &Path,
) -> Result<()> {
    let prices = load_prices(prices_path)?;
    let sim = PolicySimulator::new(config.simulation)?;
    let objective = PolicyObjective::new(&sim, &prices);

    let mut init = config.optimizer.initial_guess.clone();
    init.resize(objective.dimension, 0.0);
    let bounds = ParamBounds::around(&init);

    println!("data={}", prices_path.display());
    println!(
        "days={} instruments={} max_evals={} seed={}",
        prices.days(),
        prices.instruments(),
        config.optimizer.max_evals,
        config.optimizer.seed
    );

    let initial = evaluate(&sim, &init, &EvalContext::quiet(&prices))?;
    print_value("initial", &initial);

    let outcome = optimize(&objective, &bounds, &config.optimizer)?;
    let best = evaluate(&sim, &outcome.best.params, &EvalContext::quiet(&prices))?;
    print_value("optimized", &best);
    let named = PolicyParams::from_slice(&outcome.best.params)?;
    println!("params={:?}", outcome.best.params);

    let test = match test_path {
        Some(path) => {
            let test_prices = load_prices(path)?;
            let e = evaluate(&sim, &outcome.best.params, &EvalContext::quiet(&test_prices))?;
            print_value("held-out", &e);
            Some(json!({
                "data_file": path,
                "portfolio_value": e.portfolio_value(),
                "final_value": e.final_value,
                "final_cash": e.final_cash,
            }))
        }
        None => None,
    };

    let payload = json!({
        "objective": "maximize final portfolio value",
        "generated_at_utc": Utc::now().to_rfc3339(),
        "data_file": prices_path,
        "algorithm": "adaptive elite search + boundary refinement",
        "simulation": config.simulation,
        "optimizer": config.optimizer,
        "bounds": bounds,
        "refined_bounds": outcome.refined_bounds,
        "evaluations": outcome.evaluations,
        "converged": outcome.converged,
        "initial": {
            "params": init,
            "portfolio_value": initial.portfolio_value(),
        },
        "best": {
            "cost": outcome.best.cost,
            "params": outcome.best.params,
            "named": named,
            "portfolio_value": best.portfolio_value(),
            "final_value": best.final_value,
            "final_cash": best.final_cash,
        },
        "held_out": test,
    });

    fs::write(out, serde_json::to_string_pretty(&payload)?)
        .with_context(|| format!("failed to write {}", out.display()))?;
    println!("\nSaved result: {}", out.display());
    Ok(())
}

fn run_smooth(prices_path: &Path, instrument: usize, phis: &[f64], out: &Path) -> Result<()> {
    if phis.is_empty() {
        bail!("--phi needs at least one value");
    }
    if let Some(bad) = phis.iter().find(|p| !(p.is_finite() && **p > 0.0 && **p <= 1.0)) {
        bail!("--phi values must be in (0, 1], got {bad}");
    }

    let prices = load_prices(prices_path)?.select(instrument)?;
    let runs = phis
        .iter()
        .map(|&phi| Ok((phi, SmoothedState::run(&prices, phi)?)))
        .collect::<Result<Vec<_>>>()?;
    report::write_smoothing_csv(&prices, &runs, create(out)?)?;

    info!(instrument, factors = phis.len(), days = prices.days(), "smoothing written");
    println!("Saved smoothing: {}", out.display());
    Ok(())
}

fn load_prices(path: &Path) -> Result<PriceMatrix> {
    PriceMatrix::from_csv_path(path).with_context(|| format!("failed to load {}", path.display()))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let f = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(f))
}

fn print_value(label: &str, e: &Evaluation) {
    println!(
        "{label} portfolio value={:.2} (investments={:.2} cash={:.2})",
        e.portfolio_value(),
        e.final_value,
        e.final_cash
    );
}
