//! Cumulative-profit forecasting through a language model.
//!
//! The model receives the profit history as text and must answer with
//! 10 to 15 dated points. Answers that do not fit that shape are errors;
//! there is no retry.

pub mod llm;

pub use llm::*;

use chrono::{DateTime, Duration, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::error::ForecastError;

pub const MIN_PREDICTION_POINTS: usize = 10;
pub const MAX_PREDICTION_POINTS: usize = 15;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SYSTEM_PROMPT: &str = "You are a financial analyst specializing in time-series forecasting. \
Your task is to predict the cumulative profit trajectory based on the provided historical data.";

/// How far past the last known point to forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "1W")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "1Y")]
    OneYear,
}

impl Horizon {
    pub fn as_str(&self) -> &'static str {
        match self {
            Horizon::OneWeek => "1W",
            Horizon::OneMonth => "1M",
            Horizon::ThreeMonths => "3M",
            Horizon::OneYear => "1Y",
        }
    }

    /// Calendar offset from `start`; month arithmetic clamps to the last day
    /// of the target month.
    pub fn end_date(&self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Horizon::OneWeek => start.checked_add_signed(Duration::days(7)),
            Horizon::OneMonth => start.checked_add_months(Months::new(1)),
            Horizon::ThreeMonths => start.checked_add_months(Months::new(3)),
            Horizon::OneYear => start.checked_add_months(Months::new(12)),
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Horizon {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "1W" => Ok(Horizon::OneWeek),
            "1M" => Ok(Horizon::OneMonth),
            "3M" => Ok(Horizon::ThreeMonths),
            "1Y" => Ok(Horizon::OneYear),
            other => Err(format!("unknown duration '{}', expected 1W, 1M, 3M or 1Y", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub date: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub cumulative_profit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictProfitInput {
    /// Chronological.
    pub history: Vec<HistoryPoint>,
    pub duration: Horizon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionPoint {
    pub name: String,
    pub date: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub predicted_profit: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictProfitOutput {
    pub prediction: Vec<PredictionPoint>,
}

/// Everything the prompt needs, derived from the input.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub formatted_history: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub last_profit: Decimal,
}

impl ForecastRequest {
    /// Requires a non-empty history whose last date parses.
    pub fn from_input(input: &PredictProfitInput) -> Result<Self, ForecastError> {
        let last = input
            .history
            .last()
            .ok_or_else(|| ForecastError::InvalidHistory("history is empty".to_string()))?;

        let start_date = parse_history_date(&last.date)?;
        let end_date = input.duration.end_date(start_date).ok_or_else(|| {
            ForecastError::InvalidHistory(format!("{} past {} is out of range", input.duration, start_date))
        })?;

        let formatted_history = input
            .history
            .iter()
            .map(|p| format!("{}: ${:.2}", p.date, p.cumulative_profit))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(Self {
            formatted_history,
            start_date,
            end_date,
            last_profit: last.cumulative_profit,
        })
    }

    pub fn render_prompt(&self) -> String {
        format!(
            "Analyze the trends, volatility, and patterns in the historical data to make a realistic projection. \
The prediction should consist of {min}-{max} data points.\n\n\
The last known cumulative profit is {last}. Your prediction should start from there.\n\n\
Historical Data:\n{history}\n\n\
Predict the cumulative profit from {start} to {end}.\n\
The output should be a series of data points, each with a date and a predicted cumulative profit value. \
Do not just return a single final value; provide the progression.\n\
The name for each point should be 'Prediction 1', 'Prediction 2', etc.\n\
The date format for each prediction point must be 'yyyy-MM-dd'.",
            min = MIN_PREDICTION_POINTS,
            max = MAX_PREDICTION_POINTS,
            last = self.last_profit,
            history = self.formatted_history,
            start = self.start_date.format(DATE_FORMAT),
            end = self.end_date.format(DATE_FORMAT),
        )
    }
}

/// JSON schema the model's answer is constrained to.
pub fn prediction_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "prediction": {
                "type": "array",
                "description": "10 to 15 predicted future profit points in chronological order.",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {
                            "type": "string",
                            "description": "The label for the data point (e.g., 'Prediction 1')."
                        },
                        "date": {
                            "type": "string",
                            "description": "The predicted future date in yyyy-MM-dd format."
                        },
                        "predictedProfit": {
                            "type": "number",
                            "description": "The predicted cumulative profit for that date."
                        }
                    },
                    "required": ["name", "date", "predictedProfit"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["prediction"],
        "additionalProperties": false
    })
}

/// Reject answers outside the point-count bounds or with malformed dates.
pub fn validate_prediction(output: &PredictProfitOutput) -> Result<(), ForecastError> {
    let count = output.prediction.len();
    if !(MIN_PREDICTION_POINTS..=MAX_PREDICTION_POINTS).contains(&count) {
        return Err(ForecastError::SchemaViolation(format!(
            "expected {}-{} points, got {}",
            MIN_PREDICTION_POINTS, MAX_PREDICTION_POINTS, count
        )));
    }

    for point in &output.prediction {
        if NaiveDate::parse_from_str(&point.date, DATE_FORMAT).is_err() {
            return Err(ForecastError::SchemaViolation(format!(
                "{} has date '{}', expected yyyy-MM-dd",
                point.name, point.date
            )));
        }
    }

    Ok(())
}

fn parse_history_date(date: &str) -> Result<NaiveDate, ForecastError> {
    NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(date.trim()).map(|dt| dt.date_naive()))
        .map_err(|_| ForecastError::InvalidHistory(format!("unparseable date '{}'", date)))
}

pub struct ProfitForecaster {
    model: Arc<dyn LanguageModel>,
}

impl ProfitForecaster {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn predict(&self, input: &PredictProfitInput) -> Result<PredictProfitOutput, ForecastError> {
        if input.history.len() < 2 {
            return Ok(PredictProfitOutput::default());
        }

        let request = ForecastRequest::from_input(input)?;
        info!(
            "Forecasting {} points from {} to {}",
            input.history.len(),
            request.start_date,
            request.end_date
        );

        let answer = self
            .model
            .complete_json(StructuredPrompt {
                system: SYSTEM_PROMPT.to_string(),
                user: request.render_prompt(),
                schema_name: "profit_forecast".to_string(),
                schema: prediction_schema(),
            })
            .await?;

        let output: PredictProfitOutput = serde_json::from_value(answer)?;
        validate_prediction(&output)?;
        Ok(output)
    }
}
