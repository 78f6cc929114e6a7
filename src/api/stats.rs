use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::errors::AppError;
use crate::http::{ApiClient, RequestOptions};

/// Aggregate reports served under `/statistics/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsReport {
    Comprehensive,
    Calories,
    Macronutrients,
    Micronutrients,
    ConsumptionPatterns,
    Progress,
    Comparison,
    Trends,
}

impl StatsReport {
    pub fn path(&self) -> &'static str {
        match self {
            StatsReport::Comprehensive => "/statistics/comprehensive",
            StatsReport::Calories => "/statistics/calories",
            StatsReport::Macronutrients => "/statistics/macronutrients",
            StatsReport::Micronutrients => "/statistics/micronutrients",
            StatsReport::ConsumptionPatterns => "/statistics/consumption-patterns",
            StatsReport::Progress => "/statistics/progress",
            StatsReport::Comparison => "/statistics/comparison",
            StatsReport::Trends => "/statistics/trends",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, AppError> {
        if end_date < start_date {
            return Err(AppError::InvalidField {
                field_name: "end_date".to_string(),
                reason: format!("{end_date} is before start date {start_date}"),
            });
        }
        Ok(Self { start_date, end_date })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuickStats {
    pub calories_today: f64,
    #[serde(default)]
    pub calorie_goal: Option<f64>,
    #[serde(default)]
    pub protein_g: f64,
    #[serde(default)]
    pub carbs_g: f64,
    #[serde(default)]
    pub fats_g: f64,
    #[serde(default)]
    pub meals_logged: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DailyCalories {
    pub date: NaiveDate,
    pub calories: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalorieStats {
    pub total_calories: f64,
    pub average_daily_calories: f64,
    #[serde(default)]
    pub daily: Vec<DailyCalories>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MacronutrientStats {
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
    #[serde(default)]
    pub protein_pct: f64,
    #[serde(default)]
    pub carbs_pct: f64,
    #[serde(default)]
    pub fats_pct: f64,
}

/// Today's headline numbers.
pub async fn quick_stats(client: &ApiClient) -> Result<QuickStats, AppError> {
    client.request_json("/statistics/quick", RequestOptions::get()).await
}

/// Any report over a date range, decoded into the caller's type.
pub async fn fetch_report<T: DeserializeOwned>(
    client: &ApiClient,
    report: StatsReport,
    range: DateRange,
) -> Result<T, AppError> {
    let options = RequestOptions::get()
        .query("start_date", range.start_date)
        .query("end_date", range.end_date);
    client.request_json(report.path(), options).await
}

pub async fn calories(client: &ApiClient, range: DateRange) -> Result<CalorieStats, AppError> {
    fetch_report(client, StatsReport::Calories, range).await
}

pub async fn macronutrients(
    client: &ApiClient,
    range: DateRange,
) -> Result<MacronutrientStats, AppError> {
    fetch_report(client, StatsReport::Macronutrients, range).await
}
