use rayon::iter::{IntoParallelIterator, ParallelIterator};

use super::model::{MarketModel, PreviousYear, RegimeState, RiskProfile, simulate_year};
use super::rng::{UniformSource, Variates, XorShift64, derive_stream_seed};
use super::types::{
    AggregateResult, ConfigError, ContributionSchedule, DrawdownStats, FinalValuePercentiles,
    PercentilePath, SimulationConfig, SimulationPath,
};

/// Reporting percentiles, in ascending order.
pub const PERCENTILES: [u8; 7] = [1, 10, 25, 50, 75, 90, 99];

/// Runs one complete Monte Carlo projection: validate the configuration,
/// fan out `simulations` independent paths, reduce them into an
/// [`AggregateResult`].
///
/// Paths share no mutable state; each one owns its regime state and a
/// private RNG stream derived from `(config.seed, path index)`, so the
/// fan-out runs on the rayon pool without locking and the whole result is
/// reproducible for a fixed seed.
pub fn run_simulation(
    model: &MarketModel,
    config: &SimulationConfig,
) -> Result<AggregateResult, ConfigError> {
    let profile = validate_config(model, config)?;

    let paths: Vec<SimulationPath> = (0..config.simulations)
        .into_par_iter()
        .map(|path_index| {
            let stream = XorShift64::new(derive_stream_seed(config.seed, path_index));
            let mut variates = Variates::new(stream);
            simulate_path(model, profile, config, &mut variates)
        })
        .collect();

    Ok(aggregate(model, config, &paths))
}

/// All validation happens here, before any path runs.
fn validate_config<'a>(
    model: &'a MarketModel,
    config: &SimulationConfig,
) -> Result<&'a RiskProfile, ConfigError> {
    if !config.initial_investment.is_finite() || config.initial_investment <= 0.0 {
        return Err(ConfigError::InvalidInitialInvestment);
    }
    if config.years < 1 {
        return Err(ConfigError::InvalidHorizon);
    }
    if config.simulations < 1 {
        return Err(ConfigError::InvalidSimulationCount);
    }
    match &config.contribution {
        ContributionSchedule::Flat(amount) => {
            if !amount.is_finite() {
                return Err(ConfigError::InvalidContribution);
            }
        }
        ContributionSchedule::PerYear(amounts) => {
            if amounts.len() != config.years as usize {
                return Err(ConfigError::ContributionLengthMismatch {
                    expected: config.years as usize,
                    got: amounts.len(),
                });
            }
            if amounts.iter().any(|a| !a.is_finite()) {
                return Err(ConfigError::InvalidContribution);
            }
        }
    }
    model
        .risk_profile(&config.risk_profile)
        .ok_or_else(|| ConfigError::UnknownRiskProfile(config.risk_profile.clone()))
}

/// Simulates one lifetime: contributions, per-year returns, nominal/real
/// accounting, drawdown tracking, and the terminal long-horizon guardrail.
pub fn simulate_path<U: UniformSource>(
    model: &MarketModel,
    profile: &RiskProfile,
    config: &SimulationConfig,
    variates: &mut Variates<U>,
) -> SimulationPath {
    let years = config.years;
    let mut regime = RegimeState::new(variates);

    let mut nominal = config.initial_investment;
    let mut peak = nominal;
    let mut max_drawdown = 0.0_f64;

    let mut nominal_values = Vec::with_capacity(years as usize + 1);
    let mut real_values = Vec::with_capacity(years as usize + 1);
    let mut records = Vec::with_capacity(years as usize);
    nominal_values.push(nominal);
    real_values.push(nominal);

    let mut prev = PreviousYear {
        stock_return: 0.0,
        inflation: model.inflation.mean,
    };

    for year in 1..=years {
        nominal += config.contribution.for_year(year);

        let record = simulate_year(model, profile, prev, &mut regime, variates);

        nominal *= 1.0 + record.portfolio_return;
        regime.cumulative_inflation *= 1.0 + record.inflation;
        let real = nominal / regime.cumulative_inflation;

        peak = peak.max(nominal);
        max_drawdown = max_drawdown.min((nominal - peak) / peak);

        nominal_values.push(nominal);
        real_values.push(real);
        prev = PreviousYear {
            stock_return: record.stock_return,
            inflation: record.inflation,
        };
        records.push(record);
    }

    let inv_years = 1.0 / years as f64;
    let nominal_cagr = (nominal / config.initial_investment).powf(inv_years) - 1.0;
    let mut real_cagr =
        (real_values[years as usize] / config.initial_investment).powf(inv_years) - 1.0;

    // Long-horizon guardrail: uniformly rescale the whole path so that the
    // final values compound at no worse than the configured floor. Year 0
    // stays put; the reported nominal CAGR keeps the unadjusted value for
    // diagnostics.
    let guardrail = &model.guardrail;
    let mut guardrail_adjusted = false;
    if years >= guardrail.min_years && real_cagr < guardrail.real_cagr_floor {
        let scale = ((1.0 + guardrail.real_cagr_floor) / (1.0 + real_cagr)).powi(years as i32);
        for value in nominal_values.iter_mut().skip(1) {
            *value *= scale;
        }
        for value in real_values.iter_mut().skip(1) {
            *value *= scale;
        }
        real_cagr = guardrail.real_cagr_floor;
        guardrail_adjusted = true;
    }

    // Reported drawdowns never exceed the historical cap.
    max_drawdown = max_drawdown.max(guardrail.drawdown_cap);

    SimulationPath {
        nominal_values,
        real_values,
        records,
        nominal_cagr,
        real_cagr,
        max_drawdown,
        guardrail_adjusted,
    }
}

/// Single-threaded reduce over the completed batch: percentile extraction by
/// rank on the final-nominal-value sort, worst-drawdown surfacing, batch
/// averages, and the bounded raw-path sample.
fn aggregate(
    model: &MarketModel,
    config: &SimulationConfig,
    paths: &[SimulationPath],
) -> AggregateResult {
    let n = paths.len();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| paths[a].final_nominal().total_cmp(&paths[b].final_nominal()));

    let rank = |percentile: u8| -> usize {
        let index = (n as f64 * percentile as f64 / 100.0).floor() as usize;
        index.min(n - 1)
    };

    let percentile_paths: Vec<PercentilePath> = PERCENTILES
        .iter()
        .map(|&percentile| {
            let path = &paths[order[rank(percentile)]];
            PercentilePath {
                percentile,
                final_nominal: path.final_nominal(),
                final_real: path.final_real(),
                nominal_values: path.nominal_values.clone(),
                real_values: path.real_values.clone(),
            }
        })
        .collect();

    let mut final_nominals = [0.0_f64; 7];
    let mut final_reals = [0.0_f64; 7];
    for (i, selected) in percentile_paths.iter().enumerate() {
        final_nominals[i] = selected.final_nominal;
        final_reals[i] = selected.final_real;
    }

    let worst_drawdown_path = paths
        .iter()
        .min_by(|a, b| a.max_drawdown.total_cmp(&b.max_drawdown))
        .map(|path| path.nominal_values.clone())
        .unwrap_or_default();

    let average_annual_return =
        paths.iter().map(SimulationPath::mean_annual_return).sum::<f64>() / n as f64;
    let average_drawdown = paths.iter().map(|p| p.max_drawdown).sum::<f64>() / n as f64;
    let worst_drawdown = paths
        .iter()
        .map(|p| p.max_drawdown)
        .fold(0.0_f64, f64::min);

    // Evenly spaced sample over the value sort, real trajectories only.
    // Never hands the caller all N full paths.
    let cap = model.sample_cap.max(1);
    let sample_paths: Vec<Vec<f64>> = if n <= cap {
        order.iter().map(|&i| paths[i].real_values.clone()).collect()
    } else {
        (0..cap)
            .map(|i| paths[order[i * n / cap]].real_values.clone())
            .collect()
    };

    AggregateResult {
        simulations: config.simulations,
        years: config.years,
        percentiles: FinalValuePercentiles::from_values(final_nominals),
        real_percentiles: FinalValuePercentiles::from_values(final_reals),
        percentile_paths,
        average_annual_return,
        drawdowns: DrawdownStats {
            average: average_drawdown,
            worst: worst_drawdown,
        },
        worst_drawdown_path,
        sample_paths,
    }
}
