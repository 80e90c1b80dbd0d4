use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Datelike;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use tokio::net::TcpListener;

use crate::core::divisor::{DivisorConstants, divisor_constants};
use crate::core::{
    AgeResult, ComparisonResult, ModelResult, PensionInputs, PensionParams, RejectedAge,
    ScenarioVariant, YearTrace, run_comparison, run_model, run_yearly_trace,
};

const DEFAULT_PENSION_AGES: [u32; 3] = [62, 67, 70];
const MIN_DEFAULT_WORK_UNTIL_AGE: u32 = 55;

/// A list given either as a JSON array or as a comma-separated string, so the
/// same payload works for POST bodies and GET query strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ValueList<T> {
    List(Vec<T>),
    Csv(String),
}

impl<T: FromStr> ValueList<T> {
    fn into_values(self, name: &str) -> Result<Vec<T>, String> {
        match self {
            ValueList::List(values) => Ok(values),
            ValueList::Csv(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| {
                    part.parse::<T>()
                        .map_err(|_| format!("{name} contains an invalid value: '{part}'"))
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    current_age: Option<u32>,
    birth_year: Option<i32>,
    life_expectancy: Option<u32>,

    state_balance: Option<f64>,
    occupational_balance: Option<f64>,
    savings_balance: Option<f64>,
    annual_savings: Option<f64>,
    annual_rental_savings: Option<f64>,

    g_amount: Option<f64>,
    salary_in_g: Option<f64>,

    state_accrual_rate: Option<f64>,
    otp_below_rate: Option<f64>,
    otp_above_rate: Option<f64>,
    state_growth: Option<f64>,
    otp_growth: Option<f64>,
    savings_growth: Option<f64>,

    work_until_age: Option<u32>,
    pension_ages: Option<ValueList<u32>>,
    compare_salary_in_g: Option<ValueList<f64>>,
    compare_work_until_age: Option<ValueList<u32>>,
    trace: Option<bool>,
}

#[derive(Parser, Debug)]
#[command(
    name = "pension",
    about = "Simplified Norwegian pension projection (Folketrygd + OTP + personal savings)",
    after_help = "Run `pension serve [port]` to start the HTTP API instead."
)]
struct Cli {
    #[arg(long, default_value_t = 36)]
    current_age: u32,
    #[arg(long, help = "Birth year; defaults to the current year minus current age")]
    birth_year: Option<i32>,
    #[arg(long, default_value_t = 90, help = "Expected age at death")]
    life_expectancy: u32,
    #[arg(
        long,
        default_value_t = 1_697_820.0,
        help = "Current Folketrygd balance (NOK)"
    )]
    state_balance: f64,
    #[arg(long, default_value_t = 0.0, help = "Current OTP balance (NOK)")]
    occupational_balance: f64,
    #[arg(
        long,
        default_value_t = 660_000.0,
        help = "Current private savings, funds and bank (NOK)"
    )]
    savings_balance: f64,
    #[arg(long, default_value_t = 120_000.0, help = "Annual private savings (NOK)")]
    annual_savings: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Annual rental income that is saved (NOK)"
    )]
    annual_rental_savings: f64,
    #[arg(long, default_value_t = 124_028.0, help = "Base amount G (NOK)")]
    g_amount: f64,
    #[arg(long, default_value_t = 7.1, help = "Annual salary in units of G")]
    salary_in_g: f64,
    #[arg(
        long,
        default_value_t = 18.0,
        help = "Folketrygd accrual on salary up to 7.1 G, in percent"
    )]
    state_accrual_rate: f64,
    #[arg(
        long,
        default_value_t = 7.0,
        help = "OTP rate on salary up to 7.1 G, in percent"
    )]
    otp_below_rate: f64,
    #[arg(
        long,
        default_value_t = 18.0,
        help = "OTP rate on salary above 7.1 G, in percent"
    )]
    otp_above_rate: f64,
    #[arg(
        long,
        default_value_t = 2.0,
        help = "Annual Folketrygd regulation in percent"
    )]
    state_growth: f64,
    #[arg(long, default_value_t = 4.0, help = "Annual OTP growth in percent")]
    otp_growth: f64,
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Annual return on private savings in percent"
    )]
    savings_growth: f64,
    #[arg(long, help = "Age when work stops; defaults to max(55, current age)")]
    work_until_age: Option<u32>,
    #[arg(
        long = "pension-age",
        value_delimiter = ',',
        help = "Pension ages to show; defaults to 62,67,70"
    )]
    pension_ages: Vec<u32>,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Extra scenarios with a different salary in G"
    )]
    compare_salary_in_g: Vec<f64>,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Extra scenarios with a different age when work stops"
    )]
    compare_work_until_age: Vec<u32>,
    #[arg(long, help = "Print the yearly balance trace for the last valid pension age")]
    trace: bool,
}

#[derive(Debug, Clone)]
struct SimulationOptions {
    work_until_age: u32,
    pension_ages: Vec<u32>,
    variants: Vec<ScenarioVariant>,
    trace: bool,
}

#[derive(Debug)]
struct ApiRequest {
    inputs: PensionInputs,
    options: SimulationOptions,
}

/// One presentation row; incomes are rounded to whole NOK.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct IncomeRow {
    retirement_age: u32,
    work_until_age: u32,
    salary_in_g: f64,
    annual_state_income: i64,
    annual_occupational_income: i64,
    annual_savings_income: i64,
    total_annual_income: i64,
}

impl From<&AgeResult> for IncomeRow {
    fn from(result: &AgeResult) -> Self {
        IncomeRow {
            retirement_age: result.retirement_age,
            work_until_age: result.work_until_age,
            salary_in_g: result.salary_in_base_units,
            annual_state_income: round_nok(result.annual_state_income),
            annual_occupational_income: round_nok(result.annual_occupational_income),
            annual_savings_income: round_nok(result.annual_savings_income),
            total_annual_income: round_nok(result.total_annual_income),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ComparisonResponse {
    label: String,
    salary_in_g: Option<f64>,
    work_until_age: Option<u32>,
    rows: Vec<IncomeRow>,
    rejected_ages: Vec<RejectedAge>,
    error: Option<String>,
}

impl From<&ComparisonResult> for ComparisonResponse {
    fn from(result: &ComparisonResult) -> Self {
        match result {
            ComparisonResult::Evaluated {
                label,
                salary_in_base_units,
                work_until_age,
                model,
            } => ComparisonResponse {
                label: label.clone(),
                salary_in_g: Some(*salary_in_base_units),
                work_until_age: Some(*work_until_age),
                rows: income_rows(model),
                rejected_ages: model.rejected_ages.clone(),
                error: None,
            },
            ComparisonResult::Invalid { label, error } => ComparisonResponse {
                label: label.clone(),
                salary_in_g: None,
                work_until_age: None,
                rows: Vec::new(),
                rejected_ages: Vec::new(),
                error: Some(error.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TraceResponse {
    retirement_age: u32,
    years: Vec<YearTrace>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    work_until_age: u32,
    rows: Vec<IncomeRow>,
    rejected_ages: Vec<RejectedAge>,
    comparisons: Vec<ComparisonResponse>,
    trace: Option<TraceResponse>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn round_nok(amount: f64) -> i64 {
    amount.round() as i64
}

fn income_rows(model: &ModelResult) -> Vec<IncomeRow> {
    model.age_results.iter().map(IncomeRow::from).collect()
}

fn build_request(cli: Cli) -> Result<ApiRequest, String> {
    for (name, rate) in [
        ("--state-accrual-rate", cli.state_accrual_rate),
        ("--otp-below-rate", cli.otp_below_rate),
        ("--otp-above-rate", cli.otp_above_rate),
        ("--state-growth", cli.state_growth),
        ("--otp-growth", cli.otp_growth),
        ("--savings-growth", cli.savings_growth),
    ] {
        if !rate.is_finite() {
            return Err(format!("{name} must be a finite number"));
        }
    }

    for (name, salary) in std::iter::once(("--salary-in-g", cli.salary_in_g)).chain(
        cli.compare_salary_in_g
            .iter()
            .map(|&salary| ("--compare-salary-in-g", salary)),
    ) {
        if !salary.is_finite() {
            return Err(format!("{name} must be a finite number"));
        }
    }

    let birth_year = cli
        .birth_year
        .unwrap_or_else(|| chrono::Local::now().year() - cli.current_age as i32);

    let params = PensionParams {
        current_age: cli.current_age,
        birth_year,
        life_expectancy: cli.life_expectancy,
        state_pension_balance: cli.state_balance,
        occupational_pension_balance: cli.occupational_balance,
        savings_balance: cli.savings_balance,
        annual_savings_contribution: cli.annual_savings,
        annual_rental_savings: cli.annual_rental_savings,
        base_unit_amount: cli.g_amount,
        salary_in_base_units: cli.salary_in_g,
        state_accrual_rate: cli.state_accrual_rate / 100.0,
        occupational_rate_below_cap: cli.otp_below_rate / 100.0,
        occupational_rate_above_cap: cli.otp_above_rate / 100.0,
        state_growth_rate: cli.state_growth / 100.0,
        occupational_growth_rate: cli.otp_growth / 100.0,
        savings_growth_rate: cli.savings_growth / 100.0,
    };
    let inputs = PensionInputs::new(params).map_err(|e| format!("Invalid input: {e}"))?;

    let work_until_age = cli
        .work_until_age
        .unwrap_or_else(|| MIN_DEFAULT_WORK_UNTIL_AGE.max(cli.current_age));

    let pension_ages = if cli.pension_ages.is_empty() {
        DEFAULT_PENSION_AGES.to_vec()
    } else {
        cli.pension_ages
    };

    let variants = cli
        .compare_salary_in_g
        .iter()
        .map(|&salary| ScenarioVariant {
            label: format!("{salary} G"),
            salary_in_base_units: Some(salary),
            work_until_age: None,
        })
        .chain(
            cli.compare_work_until_age
                .iter()
                .map(|&age| ScenarioVariant {
                    label: format!("work until {age}"),
                    salary_in_base_units: None,
                    work_until_age: Some(age),
                }),
        )
        .collect();

    Ok(ApiRequest {
        inputs,
        options: SimulationOptions {
            work_until_age,
            pension_ages,
            variants,
            trace: cli.trace,
        },
    })
}

fn simulate(request: &ApiRequest) -> SimulateResponse {
    let inputs = &request.inputs;
    let options = &request.options;

    let model = run_model(inputs, options.work_until_age, &options.pension_ages);
    let comparisons = run_comparison(
        inputs,
        options.work_until_age,
        &options.pension_ages,
        &options.variants,
    );

    let trace = if options.trace {
        model.age_results.last().and_then(|last| {
            run_yearly_trace(inputs, options.work_until_age, last.retirement_age)
                .ok()
                .map(|years| TraceResponse {
                    retirement_age: last.retirement_age,
                    years,
                })
        })
    } else {
        None
    };

    SimulateResponse {
        work_until_age: model.work_until_age,
        rows: income_rows(&model),
        rejected_ages: model.rejected_ages.clone(),
        comparisons: comparisons.iter().map(ComparisonResponse::from).collect(),
        trace,
    }
}

pub fn run_cli() -> Result<(), String> {
    let request = build_request(Cli::parse())?;
    let response = simulate(&request);

    println!("Results, working until age {}", response.work_until_age);
    print_rows(&response.rows, &response.rejected_ages);

    for comparison in &response.comparisons {
        println!();
        match &comparison.error {
            Some(error) => println!("Scenario '{}': {error}", comparison.label),
            None => {
                println!("Scenario '{}'", comparison.label);
                print_rows(&comparison.rows, &comparison.rejected_ages);
            }
        }
    }

    if let Some(trace) = &response.trace {
        println!();
        println!("Yearly balances until pension age {}", trace.retirement_age);
        println!(
            "{:>4} {:>7} {:>14} {:>14} {:>14}",
            "Age", "Working", "Folketrygd", "OTP", "Savings"
        );
        for year in &trace.years {
            println!(
                "{:>4} {:>7} {:>14} {:>14} {:>14}",
                year.age,
                if year.working { "yes" } else { "no" },
                round_nok(year.end_state_balance),
                round_nok(year.end_occupational_balance),
                round_nok(year.end_savings_balance),
            );
        }
    }

    Ok(())
}

fn print_rows(rows: &[IncomeRow], rejected: &[RejectedAge]) {
    println!(
        "{:>11} {:>10} {:>8} {:>12} {:>12} {:>12} {:>12}",
        "Pension age", "Work until", "Salary G", "NAV/yr", "OTP/yr", "Savings/yr", "Total/yr"
    );
    println!("{}", "-".repeat(84));
    for row in rows {
        println!(
            "{:>11} {:>10} {:>8.1} {:>12} {:>12} {:>12} {:>12}",
            row.retirement_age,
            row.work_until_age,
            row.salary_in_g,
            row.annual_state_income,
            row.annual_occupational_income,
            row.annual_savings_income,
            row.total_annual_income,
        );
    }
    for rejected_age in rejected {
        eprintln!(
            "Calculation error for pension age {}: {}",
            rejected_age.retirement_age, rejected_age.reason
        );
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/divisors", get(divisors_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    log::info!("pension HTTP API listening on http://{addr}");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn divisors_handler() -> Response {
    let constants: DivisorConstants = divisor_constants();
    json_response(StatusCode::OK, constants)
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            log::warn!("rejected simulate request: {msg}");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    json_response(StatusCode::OK, simulate(&request))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.birth_year {
        cli.birth_year = Some(v);
    }
    if let Some(v) = payload.life_expectancy {
        cli.life_expectancy = v;
    }

    if let Some(v) = payload.state_balance {
        cli.state_balance = v;
    }
    if let Some(v) = payload.occupational_balance {
        cli.occupational_balance = v;
    }
    if let Some(v) = payload.savings_balance {
        cli.savings_balance = v;
    }
    if let Some(v) = payload.annual_savings {
        cli.annual_savings = v;
    }
    if let Some(v) = payload.annual_rental_savings {
        cli.annual_rental_savings = v;
    }

    if let Some(v) = payload.g_amount {
        cli.g_amount = v;
    }
    if let Some(v) = payload.salary_in_g {
        cli.salary_in_g = v;
    }

    if let Some(v) = payload.state_accrual_rate {
        cli.state_accrual_rate = v;
    }
    if let Some(v) = payload.otp_below_rate {
        cli.otp_below_rate = v;
    }
    if let Some(v) = payload.otp_above_rate {
        cli.otp_above_rate = v;
    }
    if let Some(v) = payload.state_growth {
        cli.state_growth = v;
    }
    if let Some(v) = payload.otp_growth {
        cli.otp_growth = v;
    }
    if let Some(v) = payload.savings_growth {
        cli.savings_growth = v;
    }

    if let Some(v) = payload.work_until_age {
        cli.work_until_age = Some(v);
    }
    if let Some(v) = payload.pension_ages {
        let ages = v.into_values("pensionAges")?;
        if ages.is_empty() {
            return Err("pensionAges must contain at least one age".to_string());
        }
        cli.pension_ages = ages;
    }
    if let Some(v) = payload.compare_salary_in_g {
        cli.compare_salary_in_g = v.into_values("compareSalaryInG")?;
    }
    if let Some(v) = payload.compare_work_until_age {
        cli.compare_work_until_age = v.into_values("compareWorkUntilAge")?;
    }
    if let Some(v) = payload.trace {
        cli.trace = v;
    }

    build_request(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        current_age: 36,
        birth_year: None,
        life_expectancy: 90,
        state_balance: 1_697_820.0,
        occupational_balance: 0.0,
        savings_balance: 660_000.0,
        annual_savings: 120_000.0,
        annual_rental_savings: 0.0,
        g_amount: 124_028.0,
        salary_in_g: 7.1,
        state_accrual_rate: 18.0,
        otp_below_rate: 7.0,
        otp_above_rate: 18.0,
        state_growth: 2.0,
        otp_growth: 4.0,
        savings_growth: 5.0,
        work_until_age: None,
        pension_ages: Vec::new(),
        compare_salary_in_g: Vec::new(),
        compare_work_until_age: Vec::new(),
        trace: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        let mut cli = default_cli_for_api();
        cli.birth_year = Some(1989);
        cli
    }

    #[test]
    fn defaults_match_clap_defaults() {
        let parsed = Cli::parse_from(["pension"]);
        let defaults = default_cli_for_api();
        assert_eq!(parsed.current_age, defaults.current_age);
        assert_eq!(parsed.life_expectancy, defaults.life_expectancy);
        assert_approx(parsed.state_balance, defaults.state_balance);
        assert_approx(parsed.savings_balance, defaults.savings_balance);
        assert_approx(parsed.g_amount, defaults.g_amount);
        assert_approx(parsed.salary_in_g, defaults.salary_in_g);
        assert_approx(parsed.state_accrual_rate, defaults.state_accrual_rate);
        assert_approx(parsed.otp_below_rate, defaults.otp_below_rate);
        assert_approx(parsed.otp_above_rate, defaults.otp_above_rate);
        assert_approx(parsed.savings_growth, defaults.savings_growth);
        assert!(parsed.pension_ages.is_empty());
        assert_eq!(parsed.work_until_age, None);
    }

    #[test]
    fn cli_accepts_repeated_and_delimited_pension_ages() {
        let cli = Cli::parse_from([
            "pension",
            "--pension-age",
            "62,65",
            "--pension-age",
            "70",
            "--compare-salary-in-g",
            "6",
        ]);
        assert_eq!(cli.pension_ages, vec![62, 65, 70]);
        assert_eq!(cli.compare_salary_in_g, vec![6.0]);
    }

    #[test]
    fn build_request_converts_percent_rates_to_fractions() {
        let request = build_request(sample_cli()).expect("valid inputs");
        let params = request.inputs.params();
        assert_approx(params.state_accrual_rate, 0.18);
        assert_approx(params.occupational_rate_below_cap, 0.07);
        assert_approx(params.occupational_rate_above_cap, 0.18);
        assert_approx(params.state_growth_rate, 0.02);
        assert_approx(params.occupational_growth_rate, 0.04);
        assert_approx(params.savings_growth_rate, 0.05);
        assert_eq!(params.birth_year, 1989);
    }

    #[test]
    fn build_request_applies_default_ages() {
        let request = build_request(sample_cli()).expect("valid inputs");
        assert_eq!(request.options.pension_ages, vec![62, 67, 70]);
        assert_eq!(request.options.work_until_age, 55);

        let mut cli = sample_cli();
        cli.current_age = 60;
        let request = build_request(cli).expect("valid inputs");
        assert_eq!(request.options.work_until_age, 60);
    }

    #[test]
    fn build_request_rejects_invalid_bundle() {
        let mut cli = sample_cli();
        cli.savings_balance = -5.0;
        let err = build_request(cli).expect_err("negative savings must fail");
        assert!(err.contains("savings_balance"));

        let mut cli = sample_cli();
        cli.life_expectancy = 30;
        let err = build_request(cli).expect_err("life expectancy below age must fail");
        assert!(err.contains("life_expectancy"));
    }

    #[test]
    fn build_request_rejects_non_finite_rate() {
        let mut cli = sample_cli();
        cli.otp_growth = f64::INFINITY;
        let err = build_request(cli).expect_err("infinite rate must fail");
        assert!(err.contains("--otp-growth"));
    }

    #[test]
    fn build_request_labels_comparison_variants() {
        let mut cli = sample_cli();
        cli.compare_salary_in_g = vec![6.0];
        cli.compare_work_until_age = vec![67];
        let request = build_request(cli).expect("valid inputs");
        let labels: Vec<&str> = request
            .options
            .variants
            .iter()
            .map(|v| v.label.as_str())
            .collect();
        assert_eq!(labels, vec!["6 G", "work until 67"]);
        assert_eq!(request.options.variants[1].work_until_age, Some(67));
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let json = r#"{
          "currentAge": 40,
          "birthYear": 1985,
          "lifeExpectancy": 88,
          "stateBalance": 2000000,
          "occupationalBalance": 150000,
          "savingsBalance": 500000,
          "annualSavings": 60000,
          "annualRentalSavings": 24000,
          "gAmount": 130000,
          "salaryInG": 9.5,
          "otpAboveRate": 15,
          "savingsGrowth": 6,
          "workUntilAge": 60,
          "pensionAges": [67, 62],
          "compareSalaryInG": "6, 8",
          "trace": true
        }"#;
        let request = api_request_from_json(json).expect("json should parse");
        let params = request.inputs.params();

        assert_eq!(params.current_age, 40);
        assert_eq!(params.birth_year, 1985);
        assert_eq!(params.life_expectancy, 88);
        assert_approx(params.state_pension_balance, 2_000_000.0);
        assert_approx(params.occupational_pension_balance, 150_000.0);
        assert_approx(params.savings_balance, 500_000.0);
        assert_approx(params.annual_savings_contribution, 60_000.0);
        assert_approx(params.annual_rental_savings, 24_000.0);
        assert_approx(params.base_unit_amount, 130_000.0);
        assert_approx(params.salary_in_base_units, 9.5);
        assert_approx(params.occupational_rate_above_cap, 0.15);
        assert_approx(params.savings_growth_rate, 0.06);
        assert_eq!(request.options.work_until_age, 60);
        assert_eq!(request.options.pension_ages, vec![67, 62]);
        assert_eq!(request.options.variants.len(), 2);
        assert!(request.options.trace);
    }

    #[test]
    fn api_request_accepts_comma_separated_ages() {
        let request =
            api_request_from_json(r#"{"pensionAges": "55,62 , 70"}"#).expect("json should parse");
        assert_eq!(request.options.pension_ages, vec![55, 62, 70]);
    }

    #[test]
    fn api_request_rejects_bad_age_list() {
        let err = api_request_from_json(r#"{"pensionAges": "62,abc"}"#)
            .expect_err("must reject non-numeric age");
        assert!(err.contains("pensionAges"));
        assert!(err.contains("abc"));

        let err = api_request_from_json(r#"{"pensionAges": []}"#)
            .expect_err("must reject empty age list");
        assert!(err.contains("at least one"));
    }

    #[test]
    fn simulate_rounds_rows_and_reports_rejected_ages() {
        let mut cli = sample_cli();
        cli.pension_ages = vec![67, 30];
        cli.trace = true;
        let request = build_request(cli).expect("valid inputs");
        let response = simulate(&request);

        assert_eq!(response.rows.len(), 1);
        let row = &response.rows[0];
        assert_eq!(row.retirement_age, 67);
        assert_eq!(
            row.total_annual_income,
            round_nok(
                run_model(&request.inputs, 55, &[67]).age_results[0].total_annual_income
            )
        );
        assert!(row.total_annual_income > 0);
        assert_eq!(response.rejected_ages.len(), 1);
        assert_eq!(response.rejected_ages[0].retirement_age, 30);

        let trace = response.trace.expect("trace requested");
        assert_eq!(trace.retirement_age, 67);
        assert_eq!(trace.years.len(), 31);
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let mut cli = sample_cli();
        cli.compare_salary_in_g = vec![6.0, -1.0];
        let request = build_request(cli).expect("valid inputs");
        let response = simulate(&request);
        let json = serde_json::to_string(&response).expect("response should serialize");

        assert!(json.contains("\"workUntilAge\":55"));
        assert!(json.contains("\"rows\""));
        assert!(json.contains("\"rejectedAges\""));
        assert!(json.contains("\"comparisons\""));
        assert!(json.contains("\"annualStateIncome\""));
        assert!(json.contains("\"annualOccupationalIncome\""));
        assert!(json.contains("\"annualSavingsIncome\""));
        assert!(json.contains("\"totalAnnualIncome\""));
        assert!(json.contains("\"trace\":null"));
        assert_eq!(response.comparisons.len(), 2);
        assert!(response.comparisons[0].error.is_none());
        assert!(
            response.comparisons[1]
                .error
                .as_deref()
                .is_some_and(|e| e.contains("salary_in_base_units"))
        );
    }

    fn assert_no_store(response: &Response) {
        assert_eq!(
            response
                .headers()
                .get(header::CACHE_CONTROL)
                .and_then(|v| v.to_str().ok()),
            Some("no-store")
        );
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    #[test]
    fn json_response_sets_status_and_no_store() {
        let response = json_response(StatusCode::OK, divisor_constants());
        assert_eq!(response.status(), StatusCode::OK);
        assert_no_store(&response);
    }

    #[tokio::test]
    async fn error_response_carries_message() {
        let response = error_response(StatusCode::BAD_REQUEST, "bad input");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_no_store(&response);
        let body = body_json(response).await;
        assert_eq!(body["error"], "bad input");
    }

    #[tokio::test]
    async fn unknown_route_returns_not_found() {
        let response = not_found_handler().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_no_store(&response);
    }

    #[tokio::test]
    async fn invalid_payload_returns_bad_request() {
        let payload = SimulatePayload {
            savings_balance: Some(-1.0),
            ..SimulatePayload::default()
        };
        let response = simulate_handler_impl(payload).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_no_store(&response);
        let body = body_json(response).await;
        assert!(
            body["error"]
                .as_str()
                .is_some_and(|e| e.contains("savings_balance"))
        );
    }

    #[tokio::test]
    async fn valid_payload_returns_rows() {
        let payload = SimulatePayload {
            birth_year: Some(1989),
            pension_ages: Some(ValueList::List(vec![62, 67])),
            ..SimulatePayload::default()
        };
        let response = simulate_handler_impl(payload).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_no_store(&response);
        let body = body_json(response).await;
        assert_eq!(body["rows"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["rows"][1]["retirementAge"], 67);
    }

    #[test]
    fn query_string_payload_parses_lists() {
        let uri: axum::http::Uri = "http://localhost/api/simulate?currentAge=40&pensionAges=62,67&compareSalaryInG=6&trace=true"
            .parse()
            .expect("valid uri");
        let Query(payload) =
            Query::<SimulatePayload>::try_from_uri(&uri).expect("query should parse");
        let request = api_request_from_payload(payload).expect("valid request");

        assert_eq!(request.inputs.params().current_age, 40);
        assert_eq!(request.options.pension_ages, vec![62, 67]);
        assert_eq!(request.options.variants.len(), 1);
        assert_eq!(request.options.variants[0].salary_in_base_units, Some(6.0));
        assert!(request.options.trace);
    }

    #[test]
    fn divisor_constants_serialize_camel_case() {
        let json = serde_json::to_string(&divisor_constants()).expect("constants serialize");
        assert!(json.contains("\"salaryCapInG\":7.1"));
        assert!(json.contains("\"referenceTable\""));
        assert!(json.contains("\"divisor\":20.06"));
    }
}
