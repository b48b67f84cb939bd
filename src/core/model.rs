use serde::{Deserialize, Serialize};

use super::rng::{UniformSource, Variates};
use super::types::YearRecord;

// Behavioral constants of the stylized return model.
const BULL_DRIFT_SHIFT: f64 = 0.02;
const BEAR_DRIFT_SHIFT: f64 = -0.02;
const BULL_LENGTH_YEARS: (u32, u32) = (4, 7);
const BEAR_LENGTH_YEARS: (u32, u32) = (1, 2);
const POST_CRASH_THRESHOLD: f64 = -0.20;
const POST_CRASH_RECOVERY_BONUS: f64 = 0.05;
const STRONG_GAIN_THRESHOLD: f64 = 0.20;
const MAX_YEARS_WITHOUT_STRONG_GAIN: u32 = 6;
const FORCED_RECOVERY_PROBABILITY: f64 = 0.70;
const FORCED_RECOVERY_RANGE: (f64, f64) = (0.15, 0.35);
const CRASH_PROBABILITY: f64 = 0.015;
const CRASH_PROBABILITY_AFTER_DEEP_LOSS: f64 = 0.005;
const DEEP_LOSS_THRESHOLD: f64 = -0.25;
const CRASH_RANGE: (f64, f64) = (-0.50, -0.30);
const SEVERE_LOSS_THRESHOLD: f64 = -0.15;
const MAX_SEVERE_LOSS_STREAK: u32 = 2;
const BREAKER_RANGE: (f64, f64) = (0.0, 0.05);
const EQUITY_RETURN_FLOOR: f64 = -0.50;

/// Per asset class: long-run mean return (mean REAL return for bonds),
/// return volatility, and the linear effect of an inflation surprise on the
/// realized return (0 for stocks).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetClassParams {
    pub mean_return: f64,
    pub volatility: f64,
    pub inflation_sensitivity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InflationParams {
    pub mean: f64,
    pub volatility: f64,
    /// Fraction of the gap to the long-run mean closed each year.
    pub mean_reversion: f64,
}

/// Pairwise correlations between asset shocks, each in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationParams {
    pub stock_bond: f64,
}

/// Named stock/bond allocation. Fractions are non-negative and sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub name: String,
    pub stocks: f64,
    pub bonds: f64,
}

impl RiskProfile {
    pub fn new(name: &str, stocks: f64, bonds: f64) -> Self {
        Self {
            name: name.to_string(),
            stocks,
            bonds,
        }
    }
}

/// Long-horizon guardrail: paths of at least `min_years` whose real CAGR
/// falls below the floor are rescaled; reported drawdowns are clamped to the
/// historical cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuardrailParams {
    pub min_years: u32,
    pub real_cagr_floor: f64,
    pub drawdown_cap: f64,
}

impl Default for GuardrailParams {
    fn default() -> Self {
        Self {
            min_years: 20,
            real_cagr_floor: -0.01,
            drawdown_cap: -0.60,
        }
    }
}

/// The immutable parameter tables the engine runs against. Injected rather
/// than global so tests and callers can substitute alternate calibrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketModel {
    pub stocks: AssetClassParams,
    pub bonds: AssetClassParams,
    pub inflation: InflationParams,
    pub correlations: CorrelationParams,
    pub profiles: Vec<RiskProfile>,
    pub guardrail: GuardrailParams,
    /// Upper bound on the raw-path sample returned for visualization.
    pub sample_cap: usize,
}

impl Default for MarketModel {
    fn default() -> Self {
        Self {
            stocks: AssetClassParams {
                mean_return: 0.08,
                volatility: 0.17,
                inflation_sensitivity: 0.0,
            },
            bonds: AssetClassParams {
                mean_return: 0.015,
                volatility: 0.05,
                inflation_sensitivity: -0.25,
            },
            inflation: InflationParams {
                mean: 0.025,
                volatility: 0.015,
                mean_reversion: 0.25,
            },
            correlations: CorrelationParams { stock_bond: 0.2 },
            profiles: vec![
                RiskProfile::new("conservative", 0.30, 0.70),
                RiskProfile::new("balanced", 0.60, 0.40),
                RiskProfile::new("growth", 0.80, 0.20),
                RiskProfile::new("aggressive", 1.00, 0.00),
            ],
            guardrail: GuardrailParams::default(),
            sample_cap: 500,
        }
    }
}

impl MarketModel {
    pub fn risk_profile(&self, name: &str) -> Option<&RiskProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Bull,
    Bear,
}

/// Behavioral state owned by exactly one path's simulation loop.
#[derive(Debug, Clone)]
pub struct RegimeState {
    pub regime: Regime,
    pub years_in_regime: u32,
    /// Regime-length targets, drawn once per path.
    pub bull_length: u32,
    pub bear_length: u32,
    pub severe_loss_streak: u32,
    pub years_since_strong_gain: u32,
    pub cumulative_inflation: f64,
}

impl RegimeState {
    pub fn new<U: UniformSource>(variates: &mut Variates<U>) -> Self {
        Self {
            regime: Regime::Bull,
            years_in_regime: 0,
            bull_length: variates.uniform_u32_in(BULL_LENGTH_YEARS.0, BULL_LENGTH_YEARS.1),
            bear_length: variates.uniform_u32_in(BEAR_LENGTH_YEARS.0, BEAR_LENGTH_YEARS.1),
            severe_loss_streak: 0,
            years_since_strong_gain: 0,
            cumulative_inflation: 1.0,
        }
    }
}

/// Previous-year context carried forward explicitly by the path loop. The
/// first simulated year sees a 0.0 stock return and the long-run inflation
/// mean.
#[derive(Debug, Clone, Copy)]
pub struct PreviousYear {
    pub stock_return: f64,
    pub inflation: f64,
}

/// One year of the annual return model: inflation, regime transition, the
/// behavioral equity rules, the correlated bond return, and the
/// allocation-weighted portfolio return. Mutates only the caller-owned
/// `RegimeState` and consumes variates.
pub fn simulate_year<U: UniformSource>(
    model: &MarketModel,
    profile: &RiskProfile,
    prev: PreviousYear,
    regime: &mut RegimeState,
    variates: &mut Variates<U>,
) -> YearRecord {
    let inflation = draw_inflation(&model.inflation, prev.inflation, variates);
    advance_regime(regime);

    let stocks = &model.stocks;
    let mut drift =
        (1.0 + stocks.mean_return).ln() - 0.5 * stocks.volatility * stocks.volatility;
    drift += match regime.regime {
        Regime::Bull => BULL_DRIFT_SHIFT,
        Regime::Bear => BEAR_DRIFT_SHIFT,
    };
    if prev.stock_return < POST_CRASH_THRESHOLD {
        drift += POST_CRASH_RECOVERY_BONUS;
    }

    // The equity shock is drawn in every branch: the bond shock below
    // correlates against it even when the equity return itself is overridden.
    let equity_shock = variates.standard_normal();

    let mut forced_recovery = false;
    let mut stock_return = if regime.years_since_strong_gain > MAX_YEARS_WITHOUT_STRONG_GAIN
        && variates.uniform() < FORCED_RECOVERY_PROBABILITY
    {
        forced_recovery = true;
        variates.uniform_in(FORCED_RECOVERY_RANGE.0, FORCED_RECOVERY_RANGE.1)
    } else {
        (drift + stocks.volatility * equity_shock).exp() - 1.0
    };

    let crash_probability = if prev.stock_return < DEEP_LOSS_THRESHOLD {
        CRASH_PROBABILITY_AFTER_DEEP_LOSS
    } else {
        CRASH_PROBABILITY
    };
    if variates.uniform() < crash_probability {
        stock_return = variates.uniform_in(CRASH_RANGE.0, CRASH_RANGE.1);
        forced_recovery = false;
    }

    if stock_return < SEVERE_LOSS_THRESHOLD {
        regime.severe_loss_streak += 1;
    } else {
        regime.severe_loss_streak = 0;
    }
    if regime.severe_loss_streak > MAX_SEVERE_LOSS_STREAK && stock_return < 0.0 {
        stock_return = variates.uniform_in(BREAKER_RANGE.0, BREAKER_RANGE.1);
        regime.severe_loss_streak = 0;
    }

    stock_return = stock_return.max(EQUITY_RETURN_FLOOR);

    if forced_recovery || stock_return > STRONG_GAIN_THRESHOLD {
        regime.years_since_strong_gain = 0;
    } else {
        regime.years_since_strong_gain += 1;
    }

    let bonds = &model.bonds;
    let bond_drift = (1.0 + bonds.mean_return + inflation).ln()
        - 0.5 * bonds.volatility * bonds.volatility;
    let bond_shock = variates.correlated_normal(equity_shock, model.correlations.stock_bond);
    let bond_return = (bond_drift + bonds.volatility * bond_shock).exp() - 1.0
        + (inflation - model.inflation.mean) * bonds.inflation_sensitivity;

    let portfolio_return = profile.stocks * stock_return + profile.bonds * bond_return;

    YearRecord {
        portfolio_return,
        stock_return,
        bond_return,
        inflation,
    }
}

fn draw_inflation<U: UniformSource>(
    params: &InflationParams,
    prev_inflation: f64,
    variates: &mut Variates<U>,
) -> f64 {
    let center = prev_inflation + params.mean_reversion * (params.mean - prev_inflation);
    center + params.volatility * variates.standard_normal()
}

fn advance_regime(state: &mut RegimeState) {
    state.years_in_regime += 1;
    let target = match state.regime {
        Regime::Bull => state.bull_length,
        Regime::Bear => state.bear_length,
    };
    if state.years_in_regime > target {
        state.regime = match state.regime {
            Regime::Bull => Regime::Bear,
            Regime::Bear => Regime::Bull,
        };
        state.years_in_regime = 0;
    }
}
