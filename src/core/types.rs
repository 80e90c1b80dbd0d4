use chrono::Datelike;
use serde::Serialize;

use super::error::{PensionError, PensionResult};

const MAX_CURRENT_AGE: u32 = 120;
const MIN_BIRTH_YEAR: i32 = 1900;

/// Raw scalars describing a person's starting point and assumptions.
///
/// Amounts are in NOK, rates are fractions (0.18 means 18 %). A `PensionParams`
/// is only trusted by the engine once it has been wrapped in [`PensionInputs`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PensionParams {
    pub current_age: u32,
    pub birth_year: i32,
    pub life_expectancy: u32,
    pub state_pension_balance: f64,
    pub occupational_pension_balance: f64,
    pub savings_balance: f64,
    pub annual_savings_contribution: f64,
    pub annual_rental_savings: f64,
    /// The base unit "G" (grunnbeløp).
    pub base_unit_amount: f64,
    pub salary_in_base_units: f64,
    pub state_accrual_rate: f64,
    pub occupational_rate_below_cap: f64,
    pub occupational_rate_above_cap: f64,
    pub state_growth_rate: f64,
    pub occupational_growth_rate: f64,
    pub savings_growth_rate: f64,
}

impl Default for PensionParams {
    fn default() -> Self {
        let current_age = 36;
        Self {
            current_age,
            birth_year: chrono::Local::now().year() - current_age as i32,
            life_expectancy: 90,
            state_pension_balance: 1_697_820.0,
            occupational_pension_balance: 0.0,
            savings_balance: 660_000.0,
            annual_savings_contribution: 120_000.0,
            annual_rental_savings: 0.0,
            base_unit_amount: 124_028.0,
            salary_in_base_units: 7.1,
            state_accrual_rate: 0.18,
            occupational_rate_below_cap: 0.07,
            occupational_rate_above_cap: 0.18,
            state_growth_rate: 0.02,
            occupational_growth_rate: 0.04,
            savings_growth_rate: 0.05,
        }
    }
}

/// A validated, immutable parameter bundle.
///
/// Scenario variants are derived with [`PensionInputs::with_overrides`], which
/// returns a fresh bundle and leaves `self` untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct PensionInputs {
    params: PensionParams,
    current_year: i32,
}

impl PensionInputs {
    pub fn new(params: PensionParams) -> PensionResult<Self> {
        Self::new_as_of(params, chrono::Local::now().year())
    }

    /// Validates against an explicit calendar year instead of today's.
    pub fn new_as_of(params: PensionParams, current_year: i32) -> PensionResult<Self> {
        validate(&params, current_year)?;
        Ok(Self {
            params,
            current_year,
        })
    }

    pub fn params(&self) -> &PensionParams {
        &self.params
    }

    /// Calendar year the bundle was validated against.
    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    pub fn with_overrides<F>(&self, apply: F) -> PensionResult<Self>
    where
        F: FnOnce(&mut PensionParams),
    {
        let mut params = self.params;
        apply(&mut params);
        Self::new_as_of(params, self.current_year)
    }

    pub fn nominal_salary(&self) -> f64 {
        self.params.base_unit_amount * self.params.salary_in_base_units
    }
}

fn validate(params: &PensionParams, current_year: i32) -> PensionResult<()> {
    if params.current_age > MAX_CURRENT_AGE {
        return Err(PensionError::CurrentAgeOutOfRange {
            value: params.current_age,
        });
    }

    if params.life_expectancy <= params.current_age {
        return Err(PensionError::LifeExpectancyNotAfterCurrentAge {
            life_expectancy: params.life_expectancy,
            current_age: params.current_age,
        });
    }

    if !(MIN_BIRTH_YEAR..=current_year).contains(&params.birth_year) {
        return Err(PensionError::BirthYearOutOfRange {
            value: params.birth_year,
            max: current_year,
        });
    }

    for (field, value) in [
        ("state_pension_balance", params.state_pension_balance),
        (
            "occupational_pension_balance",
            params.occupational_pension_balance,
        ),
        ("savings_balance", params.savings_balance),
        (
            "annual_savings_contribution",
            params.annual_savings_contribution,
        ),
        ("annual_rental_savings", params.annual_rental_savings),
    ] {
        if !value.is_finite() {
            return Err(PensionError::NonFiniteAmount { field });
        }
        if value < 0.0 {
            return Err(PensionError::NegativeAmount { field, value });
        }
    }

    if !params.base_unit_amount.is_finite() {
        return Err(PensionError::NonFiniteAmount {
            field: "base_unit_amount",
        });
    }
    if params.base_unit_amount <= 0.0 {
        return Err(PensionError::NonPositiveBaseUnit {
            value: params.base_unit_amount,
        });
    }

    if !params.salary_in_base_units.is_finite() {
        return Err(PensionError::NonFiniteAmount {
            field: "salary_in_base_units",
        });
    }
    if params.salary_in_base_units < 0.0 {
        return Err(PensionError::NegativeSalaryMultiple {
            value: params.salary_in_base_units,
        });
    }

    Ok(())
}

/// Balances at the start of the first retirement year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationResult {
    pub state_balance: f64,
    pub occupational_balance: f64,
    pub savings_balance: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DivisorStyle {
    /// Life-expectancy adjusted divisor (delingstall), used for the state pension.
    Nav,
    /// Plain remaining-years divisor, used for occupational pension and savings.
    Simple,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeResult {
    pub retirement_age: u32,
    pub work_until_age: u32,
    pub salary_in_base_units: f64,
    pub state_balance: f64,
    pub occupational_balance: f64,
    pub savings_balance: f64,
    pub annual_state_income: f64,
    pub annual_occupational_income: f64,
    pub annual_savings_income: f64,
    pub total_annual_income: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedAge {
    pub retirement_age: u32,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ModelResult {
    pub work_until_age: u32,
    pub age_results: Vec<AgeResult>,
    pub rejected_ages: Vec<RejectedAge>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearTrace {
    pub age: u32,
    pub working: bool,
    pub salary: f64,
    pub state_accrual: f64,
    pub occupational_accrual: f64,
    pub savings_contribution: f64,
    pub end_state_balance: f64,
    pub end_occupational_balance: f64,
    pub end_savings_balance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioVariant {
    pub label: String,
    pub salary_in_base_units: Option<f64>,
    pub work_until_age: Option<u32>,
}

#[derive(Debug, Clone)]
pub enum ComparisonResult {
    Evaluated {
        label: String,
        salary_in_base_units: f64,
        work_until_age: u32,
        model: ModelResult,
    },
    Invalid {
        label: String,
        error: PensionError,
    },
}

impl ComparisonResult {
    pub fn label(&self) -> &str {
        match self {
            ComparisonResult::Evaluated { label, .. } | ComparisonResult::Invalid { label, .. } => {
                label
            }
        }
    }
}
