//! Division factors used to turn a pension balance into an annual payout.
//!
//! The reference table holds NAV-style delingstall for the 1963 cohort at ages
//! 62 to 67. It is applied to every birth year; later cohorts would in reality
//! see slightly higher factors.

use serde::Serialize;

/// Folketrygd salary cap in units of G.
pub const SALARY_CAP_IN_G: f64 = 7.1;
/// Earliest age NAV pays old-age pension.
pub const MIN_NAV_PENSION_AGE: u32 = 62;
pub const STANDARD_PENSION_AGE: u32 = 67;
/// Last age covered by the extrapolated divisor.
pub const MAX_NAV_PENSION_AGE: u32 = 75;
/// Yearly reduction of the divisor after the standard pension age.
pub const ANNUAL_DIVISOR_REDUCTION: f64 = 0.9;

pub const REFERENCE_DIVISORS: [(u32, f64); 6] = [
    (62, 20.06),
    (63, 19.25),
    (64, 18.44),
    (65, 17.63),
    (66, 16.83),
    (67, 16.02),
];

pub fn reference_divisor(pension_age: u32) -> Option<f64> {
    REFERENCE_DIVISORS
        .iter()
        .find(|(age, _)| *age == pension_age)
        .map(|(_, divisor)| *divisor)
}

const fn table_divisor(pension_age: u32) -> f64 {
    let mut i = 0;
    while i < REFERENCE_DIVISORS.len() {
        if REFERENCE_DIVISORS[i].0 == pension_age {
            return REFERENCE_DIVISORS[i].1;
        }
        i += 1;
    }
    panic!("pension age missing from the reference table");
}

/// Divisor at the standard pension age, resolved at compile time.
pub const STANDARD_AGE_DIVISOR: f64 = table_divisor(STANDARD_PENSION_AGE);

/// Equal drawdown over the years left until `life_expectancy`, never below one year.
pub fn years_remaining_divisor(life_expectancy: u32, pension_age: u32) -> f64 {
    let years = (i64::from(life_expectancy) - i64::from(pension_age)).max(1);
    years as f64
}

/// NAV-like divisor for `pension_age`.
///
/// `birth_year` is carried for cohort-specific tables but does not change the
/// result while only the 1963 table exists.
pub fn delingsfaktor(pension_age: u32, _birth_year: i32, life_expectancy: u32) -> f64 {
    if (MIN_NAV_PENSION_AGE..=STANDARD_PENSION_AGE).contains(&pension_age) {
        if let Some(divisor) = reference_divisor(pension_age) {
            return divisor;
        }
    }

    if (STANDARD_PENSION_AGE + 1..=MAX_NAV_PENSION_AGE).contains(&pension_age) {
        let years_after = f64::from(pension_age - STANDARD_PENSION_AGE);
        return (STANDARD_AGE_DIVISOR - ANNUAL_DIVISOR_REDUCTION * years_after).max(1.0);
    }

    years_remaining_divisor(life_expectancy, pension_age)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisorTableEntry {
    pub age: u32,
    pub divisor: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisorConstants {
    pub salary_cap_in_g: f64,
    pub min_nav_pension_age: u32,
    pub standard_pension_age: u32,
    pub max_nav_pension_age: u32,
    pub annual_divisor_reduction: f64,
    pub reference_table: Vec<DivisorTableEntry>,
}

pub fn divisor_constants() -> DivisorConstants {
    DivisorConstants {
        salary_cap_in_g: SALARY_CAP_IN_G,
        min_nav_pension_age: MIN_NAV_PENSION_AGE,
        standard_pension_age: STANDARD_PENSION_AGE,
        max_nav_pension_age: MAX_NAV_PENSION_AGE,
        annual_divisor_reduction: ANNUAL_DIVISOR_REDUCTION,
        reference_table: REFERENCE_DIVISORS
            .iter()
            .map(|&(age, divisor)| DivisorTableEntry { age, divisor })
            .collect(),
    }
}
