use rayon::prelude::*;

use super::divisor::{
    MIN_NAV_PENSION_AGE, SALARY_CAP_IN_G, delingsfaktor, years_remaining_divisor,
};
use super::error::{PensionError, PensionResult};
use super::types::{
    AgeResult, ComparisonResult, DivisorStyle, ModelResult, PensionInputs, RejectedAge,
    ScenarioVariant, SimulationResult, YearTrace,
};

#[derive(Debug)]
struct Balances {
    state: f64,
    occupational: f64,
    savings: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct AccrualFlow {
    state: f64,
    occupational: f64,
    savings: f64,
}

pub fn simulate_until_pension_age(
    inputs: &PensionInputs,
    work_until_age: u32,
    pension_age: u32,
) -> PensionResult<SimulationResult> {
    check_pension_age(inputs, pension_age)?;
    Ok(simulate(inputs, work_until_age, pension_age, None))
}

pub fn run_yearly_trace(
    inputs: &PensionInputs,
    work_until_age: u32,
    pension_age: u32,
) -> PensionResult<Vec<YearTrace>> {
    check_pension_age(inputs, pension_age)?;
    let years = (pension_age - inputs.params().current_age) as usize;
    let mut trace = Vec::with_capacity(years);
    simulate(inputs, work_until_age, pension_age, Some(&mut trace));
    Ok(trace)
}

pub fn annual_pension_from_balance(
    balance: f64,
    pension_age: u32,
    birth_year: i32,
    life_expectancy: u32,
    style: DivisorStyle,
) -> f64 {
    if balance.is_nan() || balance <= 0.0 {
        return 0.0;
    }

    let divisor = match style {
        DivisorStyle::Nav if pension_age >= MIN_NAV_PENSION_AGE => {
            delingsfaktor(pension_age, birth_year, life_expectancy)
        }
        _ => years_remaining_divisor(life_expectancy, pension_age),
    };

    balance / divisor
}

pub fn evaluate_pension_age(
    inputs: &PensionInputs,
    work_until_age: u32,
    pension_age: u32,
) -> PensionResult<AgeResult> {
    let balances = simulate_until_pension_age(inputs, work_until_age, pension_age)?;
    let params = inputs.params();
    let annualize = |balance: f64, style: DivisorStyle| {
        annual_pension_from_balance(
            balance,
            pension_age,
            params.birth_year,
            params.life_expectancy,
            style,
        )
    };

    let annual_state_income = annualize(balances.state_balance, DivisorStyle::Nav);
    // OTP is not administered by NAV, so it gets the simple divisor.
    let annual_occupational_income =
        annualize(balances.occupational_balance, DivisorStyle::Simple);
    let annual_savings_income = annualize(balances.savings_balance, DivisorStyle::Simple);

    log::debug!(
        "pension_age={pension_age} work_until_age={work_until_age}: state={annual_state_income:.2} otp={annual_occupational_income:.2} savings={annual_savings_income:.2}"
    );

    Ok(AgeResult {
        retirement_age: pension_age,
        work_until_age,
        salary_in_base_units: params.salary_in_base_units,
        state_balance: balances.state_balance,
        occupational_balance: balances.occupational_balance,
        savings_balance: balances.savings_balance,
        annual_state_income,
        annual_occupational_income,
        annual_savings_income,
        total_annual_income: annual_state_income
            + annual_occupational_income
            + annual_savings_income,
    })
}

/// Evaluates every requested pension age independently.
///
/// Ages are sorted and deduplicated; an age that fails its preconditions is
/// reported in `rejected_ages` without affecting the others.
pub fn run_model(
    inputs: &PensionInputs,
    work_until_age: u32,
    pension_ages: &[u32],
) -> ModelResult {
    let mut ages = pension_ages.to_vec();
    ages.sort_unstable();
    ages.dedup();

    log::debug!(
        "running model for {} pension ages, work_until_age={work_until_age}",
        ages.len()
    );

    let outcomes: Vec<(u32, PensionResult<AgeResult>)> = ages
        .par_iter()
        .map(|&age| (age, evaluate_pension_age(inputs, work_until_age, age)))
        .collect();

    let mut age_results = Vec::with_capacity(outcomes.len());
    let mut rejected_ages = Vec::new();
    for (age, outcome) in outcomes {
        match outcome {
            Ok(result) => age_results.push(result),
            Err(err) => {
                log::warn!("pension age {age} rejected: {err}");
                rejected_ages.push(RejectedAge {
                    retirement_age: age,
                    reason: err.to_string(),
                });
            }
        }
    }

    ModelResult {
        work_until_age,
        age_results,
        rejected_ages,
    }
}

/// Runs the model once per variant, each on its own copy of `inputs`.
pub fn run_comparison(
    inputs: &PensionInputs,
    work_until_age: u32,
    pension_ages: &[u32],
    variants: &[ScenarioVariant],
) -> Vec<ComparisonResult> {
    variants
        .iter()
        .map(|variant| {
            let variant_inputs = match variant.salary_in_base_units {
                Some(salary) => inputs.with_overrides(|p| p.salary_in_base_units = salary),
                None => Ok(inputs.clone()),
            };
            let variant_inputs = match variant_inputs {
                Ok(variant_inputs) => variant_inputs,
                Err(error) => {
                    log::warn!("comparison variant '{}' is invalid: {error}", variant.label);
                    return ComparisonResult::Invalid {
                        label: variant.label.clone(),
                        error,
                    };
                }
            };
            let variant_work_until = variant.work_until_age.unwrap_or(work_until_age);

            ComparisonResult::Evaluated {
                label: variant.label.clone(),
                salary_in_base_units: variant_inputs.params().salary_in_base_units,
                work_until_age: variant_work_until,
                model: run_model(&variant_inputs, variant_work_until, pension_ages),
            }
        })
        .collect()
}

fn check_pension_age(inputs: &PensionInputs, pension_age: u32) -> PensionResult<()> {
    let params = inputs.params();
    if pension_age <= params.current_age {
        return Err(PensionError::RetirementNotAfterCurrentAge {
            pension_age,
            current_age: params.current_age,
        });
    }
    if pension_age > params.life_expectancy {
        return Err(PensionError::RetirementAfterLifeExpectancy {
            pension_age,
            life_expectancy: params.life_expectancy,
        });
    }
    Ok(())
}

fn simulate(
    inputs: &PensionInputs,
    work_until_age: u32,
    pension_age: u32,
    mut trace: Option<&mut Vec<YearTrace>>,
) -> SimulationResult {
    let params = inputs.params();
    let mut balances = Balances {
        state: params.state_pension_balance,
        occupational: params.occupational_pension_balance,
        savings: params.savings_balance,
    };

    for age in params.current_age..pension_age {
        let salary = inputs.nominal_salary();
        let working = age < work_until_age;

        let flow = if working {
            apply_working_year_accrual(inputs, &mut balances, salary)
        } else {
            AccrualFlow::default()
        };
        apply_annual_growth(inputs, &mut balances);

        if let Some(points) = trace.as_deref_mut() {
            points.push(YearTrace {
                age,
                working,
                salary,
                state_accrual: flow.state,
                occupational_accrual: flow.occupational,
                savings_contribution: flow.savings,
                end_state_balance: balances.state,
                end_occupational_balance: balances.occupational,
                end_savings_balance: balances.savings,
            });
        }
    }

    SimulationResult {
        state_balance: balances.state,
        occupational_balance: balances.occupational,
        savings_balance: balances.savings,
    }
}

fn apply_working_year_accrual(
    inputs: &PensionInputs,
    balances: &mut Balances,
    salary: f64,
) -> AccrualFlow {
    let params = inputs.params();
    let capped_salary = salary.min(params.base_unit_amount * SALARY_CAP_IN_G);
    let above_cap = (salary - capped_salary).max(0.0);

    let flow = AccrualFlow {
        state: capped_salary * params.state_accrual_rate,
        occupational: capped_salary * params.occupational_rate_below_cap
            + above_cap * params.occupational_rate_above_cap,
        // Rental income is saved in full.
        savings: params.annual_savings_contribution + params.annual_rental_savings,
    };

    balances.state += flow.state;
    balances.occupational += flow.occupational;
    balances.savings += flow.savings;
    flow
}

fn apply_annual_growth(inputs: &PensionInputs, balances: &mut Balances) {
    let params = inputs.params();
    balances.state *= 1.0 + params.state_growth_rate;
    balances.occupational *= 1.0 + params.occupational_growth_rate;
    balances.savings *= 1.0 + params.savings_growth_rate;
}
