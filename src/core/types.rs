use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected configuration. Raised before any path runs; nothing is ever
/// silently corrected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown risk profile: {0}")]
    UnknownRiskProfile(String),
    #[error("initial investment must be a positive, finite amount")]
    InvalidInitialInvestment,
    #[error("projection horizon must be at least 1 year")]
    InvalidHorizon,
    #[error("number of simulations must be at least 1")]
    InvalidSimulationCount,
    #[error("per-year contribution schedule has {got} entries, expected {expected}")]
    ContributionLengthMismatch { expected: usize, got: usize },
    #[error("contribution amounts must be finite")]
    InvalidContribution,
}

/// Annual contributions: either one flat amount applied every year after
/// year 1, or an explicit amount per year of the horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContributionSchedule {
    Flat(f64),
    PerYear(Vec<f64>),
}

impl ContributionSchedule {
    /// Contribution added at the start of `year` (1-based). Year 1 never
    /// receives one: the initial investment already is the starting capital.
    pub fn for_year(&self, year: u32) -> f64 {
        if year <= 1 {
            return 0.0;
        }
        match self {
            ContributionSchedule::Flat(amount) => *amount,
            ContributionSchedule::PerYear(amounts) => {
                amounts.get(year as usize - 1).copied().unwrap_or(0.0)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub initial_investment: f64,
    pub years: u32,
    pub contribution: ContributionSchedule,
    pub risk_profile: String,
    pub simulations: u32,
    pub seed: u64,
}

/// One simulated year's realized returns. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearRecord {
    pub portfolio_return: f64,
    pub stock_return: f64,
    pub bond_return: f64,
    pub inflation: f64,
}

/// One complete simulated lifetime: value series indexed by year 0..=N plus
/// derived scalars.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationPath {
    pub nominal_values: Vec<f64>,
    pub real_values: Vec<f64>,
    pub records: Vec<YearRecord>,
    pub nominal_cagr: f64,
    pub real_cagr: f64,
    pub max_drawdown: f64,
    pub guardrail_adjusted: bool,
}

impl SimulationPath {
    pub fn final_nominal(&self) -> f64 {
        self.nominal_values.last().copied().unwrap_or(0.0)
    }

    pub fn final_real(&self) -> f64 {
        self.real_values.last().copied().unwrap_or(0.0)
    }

    /// Mean year-over-year portfolio return of this path.
    pub fn mean_annual_return(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let total: f64 = self.records.iter().map(|r| r.portfolio_return).sum();
        total / self.records.len() as f64
    }
}

/// Final values at the fixed reporting percentiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FinalValuePercentiles {
    pub p1: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p99: f64,
}

impl FinalValuePercentiles {
    pub(crate) fn from_values(values: [f64; 7]) -> Self {
        Self {
            p1: values[0],
            p10: values[1],
            p25: values[2],
            p50: values[3],
            p75: values[4],
            p90: values[5],
            p99: values[6],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DrawdownStats {
    pub average: f64,
    pub worst: f64,
}

/// Full trajectories of the path ranked nearest one reporting percentile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentilePath {
    pub percentile: u8,
    pub final_nominal: f64,
    pub final_real: f64,
    pub nominal_values: Vec<f64>,
    pub real_values: Vec<f64>,
}

/// Reduction of a whole batch of paths: percentile trajectories and
/// final-value statistics, batch-wide averages, the worst-drawdown
/// trajectory, and a bounded raw-path sample for background charting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub simulations: u32,
    pub years: u32,
    pub percentiles: FinalValuePercentiles,
    pub real_percentiles: FinalValuePercentiles,
    pub percentile_paths: Vec<PercentilePath>,
    pub average_annual_return: f64,
    pub drawdowns: DrawdownStats,
    pub worst_drawdown_path: Vec<f64>,
    pub sample_paths: Vec<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_contribution_skips_year_one() {
        let schedule = ContributionSchedule::Flat(12_000.0);
        assert_eq!(schedule.for_year(1), 0.0);
        assert_eq!(schedule.for_year(2), 12_000.0);
        assert_eq!(schedule.for_year(30), 12_000.0);
    }

    #[test]
    fn per_year_contribution_indexes_by_year() {
        let schedule = ContributionSchedule::PerYear(vec![1.0, 2.0, 3.0]);
        assert_eq!(schedule.for_year(1), 0.0);
        assert_eq!(schedule.for_year(2), 2.0);
        assert_eq!(schedule.for_year(3), 3.0);
        assert_eq!(schedule.for_year(4), 0.0);
    }

    #[test]
    fn contribution_schedule_serde_is_untagged() {
        let flat: ContributionSchedule = serde_json::from_str("2500.0").expect("flat");
        assert_eq!(flat, ContributionSchedule::Flat(2500.0));

        let per_year: ContributionSchedule =
            serde_json::from_str("[100.0, 200.0]").expect("per-year");
        assert_eq!(per_year, ContributionSchedule::PerYear(vec![100.0, 200.0]));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = SimulationConfig {
            initial_investment: 250_000.0,
            years: 25,
            contribution: ContributionSchedule::Flat(10_000.0),
            risk_profile: "growth".to_string(),
            simulations: 1_000,
            seed: 7,
        };
        let json = serde_json::to_string(&config).expect("encode");
        let back: SimulationConfig = serde_json::from_str(&json).expect("decode");
        assert_eq!(back, config);
    }
}
