use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::http::{ApiClient, RequestOptions};
use crate::models::id_string;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub protein_g: Option<f64>,
    #[serde(default)]
    pub carbs_g: Option<f64>,
    #[serde(default)]
    pub fats_g: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewDish {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DishSearchResults {
    pub dishes: Vec<Dish>,
    #[serde(default)]
    pub total_count: u64,
}

pub async fn search(client: &ApiClient, query: &str, limit: u32) -> Result<DishSearchResults, AppError> {
    if query.trim().is_empty() {
        return Err(AppError::empty_field("query"));
    }
    let options = RequestOptions::get().query("q", query.trim()).query("limit", limit);
    client.request_json("/dishes/search", options).await
}

pub async fn create(client: &ApiClient, dish: &NewDish) -> Result<Dish, AppError> {
    if dish.name.trim().is_empty() {
        return Err(AppError::empty_field("name"));
    }
    client.request_json("/dishes", RequestOptions::post().json(dish)?).await
}
