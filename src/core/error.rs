use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PensionError {
    #[error("current_age must be between 0 and 120, got {value}")]
    CurrentAgeOutOfRange { value: u32 },

    #[error("life_expectancy ({life_expectancy}) must be greater than current_age ({current_age})")]
    LifeExpectancyNotAfterCurrentAge {
        life_expectancy: u32,
        current_age: u32,
    },

    #[error("birth_year must be between 1900 and {max}, got {value}")]
    BirthYearOutOfRange { value: i32, max: i32 },

    #[error("{field} cannot be negative, got {value}")]
    NegativeAmount { field: &'static str, value: f64 },

    #[error("{field} must be a finite number")]
    NonFiniteAmount { field: &'static str },

    #[error("base_unit_amount must be positive, got {value}")]
    NonPositiveBaseUnit { value: f64 },

    #[error("salary_in_base_units cannot be negative, got {value}")]
    NegativeSalaryMultiple { value: f64 },

    #[error("pension_age ({pension_age}) must be greater than current_age ({current_age})")]
    RetirementNotAfterCurrentAge { pension_age: u32, current_age: u32 },

    #[error("pension_age ({pension_age}) cannot exceed life_expectancy ({life_expectancy})")]
    RetirementAfterLifeExpectancy {
        pension_age: u32,
        life_expectancy: u32,
    },
}

pub type PensionResult<T> = Result<T, PensionError>;
