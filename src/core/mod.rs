pub mod divisor;
mod engine;
mod error;
mod types;

pub use engine::{
    annual_pension_from_balance, evaluate_pension_age, run_comparison, run_model,
    run_yearly_trace, simulate_until_pension_age,
};
pub use error::{PensionError, PensionResult};
pub use types::{
    AgeResult, ComparisonResult, DivisorStyle, ModelResult, PensionInputs, PensionParams,
    RejectedAge, ScenarioVariant, SimulationResult, YearTrace,
};
