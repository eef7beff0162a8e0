use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use bank::catalog::Restaurant;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::AppError,
    recommend::{RecommendError, RecommendationPage, TriggerOutcome},
    state::AppState,
    utils::{check_page, check_uid, sample_restaurants},
};

#[derive(Deserialize)]
pub struct PreferencePayload {
    preference: Vec<f64>,
}

#[derive(Deserialize)]
pub struct ClickPayload {
    tags: Vec<String>,
}

#[derive(Serialize)]
pub struct RandomRecommendation {
    random_recommendation: Vec<Restaurant>,
}

/// Registration: the first run stores the all-zero vector.
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    check_uid(&uid)?;
    info!(uid = %uid, "User registered");

    state.coordinator.spawn_trigger(uid);
    Ok(StatusCode::CREATED)
}

pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    check_uid(&uid)?;

    state.coordinator.spawn_trigger(uid);
    Ok(StatusCode::ACCEPTED)
}

pub async fn preference_handler(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    payload: Result<Json<PreferencePayload>, JsonRejection>,
) -> Result<Json<TriggerOutcome>, AppError> {
    check_uid(&uid)?;
    let Json(payload) = payload.map_err(|_| AppError::MalformedPayload)?;

    let outcome = state
        .coordinator
        .submit_preferences(&uid, payload.preference)
        .await?;

    Ok(Json(outcome))
}

pub async fn click_handler(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    payload: Result<Json<ClickPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    check_uid(&uid)?;
    let Json(payload) = payload.map_err(|_| AppError::MalformedPayload)?;

    state.coordinator.record_click(&uid, &payload.tags).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn recommend_handler(
    State(state): State<Arc<AppState>>,
    Path((uid, page)): Path<(String, u32)>,
) -> Result<Json<RecommendationPage>, AppError> {
    check_uid(&uid)?;
    let page = check_page(page, state.config.max_page)?;

    Ok(Json(state.coordinator.recommendation_page(&uid, page).await?))
}

pub async fn random_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RandomRecommendation>, AppError> {
    let restaurants = state
        .catalog
        .list_all()
        .await
        .map_err(RecommendError::CatalogUnavailable)?;

    Ok(Json(RandomRecommendation {
        random_recommendation: sample_restaurants(&restaurants, state.config.random_sample_size),
    }))
}
