use clap::Parser;

use prospect::core::{ContributionSchedule, MarketModel, SimulationConfig, run_simulation};

#[derive(Parser, Debug)]
#[command(
    name = "prospect",
    about = "Multi-asset Monte Carlo projection engine (correlated stocks, bonds, inflation)"
)]
struct Cli {
    #[arg(long, default_value_t = 100_000.0)]
    initial_investment: f64,
    #[arg(long, default_value_t = 30)]
    years: u32,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Flat contribution added every year after year 1"
    )]
    annual_contribution: f64,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Per-year contributions; length must equal --years"
    )]
    contributions: Option<Vec<f64>>,
    #[arg(long, default_value = "balanced")]
    risk_profile: String,
    #[arg(long, default_value_t = 5_000)]
    simulations: u32,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

fn main() {
    let cli = Cli::parse();

    let contribution = match cli.contributions {
        Some(amounts) => ContributionSchedule::PerYear(amounts),
        None => ContributionSchedule::Flat(cli.annual_contribution),
    };
    let config = SimulationConfig {
        initial_investment: cli.initial_investment,
        years: cli.years,
        contribution,
        risk_profile: cli.risk_profile,
        simulations: cli.simulations,
        seed: cli.seed,
    };

    let model = MarketModel::default();
    let result = match run_simulation(&model, &config) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let encoded = if cli.pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    };
    match encoded {
        Ok(body) => println!("{body}"),
        Err(e) => {
            eprintln!("Failed to encode result: {e}");
            std::process::exit(1);
        }
    }
}
