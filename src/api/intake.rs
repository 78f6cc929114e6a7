use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::http::{ApiClient, RequestOptions};
use crate::models::id_string;

/// One logged portion of a dish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intake {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(deserialize_with = "id_string")]
    pub dish_id: String,
    #[serde(default)]
    pub dish_name: Option<String>,
    pub portion_size: f64,
    pub intake_time: DateTime<Utc>,
    #[serde(default)]
    pub calories: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewIntake {
    pub dish_id: String,
    pub portion_size: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intake_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntakeList {
    pub intakes: Vec<Intake>,
    #[serde(default)]
    pub total_count: u64,
}

pub async fn log_intake(client: &ApiClient, intake: &NewIntake) -> Result<Intake, AppError> {
    if intake.dish_id.trim().is_empty() {
        return Err(AppError::empty_field("dish_id"));
    }
    client.request_json("/intakes", RequestOptions::post().json(intake)?).await
}

/// Intakes between two dates, inclusive.
pub async fn list_intakes(
    client: &ApiClient,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<IntakeList, AppError> {
    let options = RequestOptions::get()
        .query("start_date", start_date)
        .query("end_date", end_date);
    client.request_json("/intakes", options).await
}

pub async fn delete_intake(client: &ApiClient, intake_id: &str) -> Result<(), AppError> {
    client
        .request(&format!("/intakes/{intake_id}"), RequestOptions::delete())
        .await?;
    Ok(())
}
