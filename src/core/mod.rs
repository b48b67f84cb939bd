mod engine;
mod model;
mod rng;
mod types;

pub use engine::{PERCENTILES, run_simulation, simulate_path};
pub use model::{
    AssetClassParams, CorrelationParams, GuardrailParams, InflationParams, MarketModel,
    PreviousYear, Regime, RegimeState, RiskProfile, simulate_year,
};
pub use rng::{UniformSource, Variates, XorShift64, derive_stream_seed};
pub use types::{
    AggregateResult, ConfigError, ContributionSchedule, DrawdownStats, FinalValuePercentiles,
    PercentilePath, SimulationConfig, SimulationPath, YearRecord,
};
