use crate::dtos::{
    ExpressionResult, GenerateCharacterRequest, GenerateCharacterResponse,
    GenerateExpressionsRequest, GenerateExpressionsResponse,
};
use crate::services::metrics;
use crate::startup::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use service_core::error::AppError;
use validator::Validate;

fn outcome<T>(result: &Result<T, AppError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) if e.status_code().is_client_error() => "rejected",
        Err(_) => "failed",
    }
}

#[tracing::instrument(skip_all)]
pub async fn generate_character(
    State(state): State<AppState>,
    payload: Result<Json<GenerateCharacterRequest>, JsonRejection>,
) -> Result<Json<GenerateCharacterResponse>, AppError> {
    let result = async {
        let Json(request) = payload?;
        request.validate()?;
        state.generator.generate_character(&request.prompt).await
    }
    .await;

    metrics::record_request("generate_character", outcome(&result));
    let stored = result.map_err(|e| {
        tracing::error!(error = %e, "Error generating character");
        e
    })?;

    Ok(Json(stored.into()))
}

#[tracing::instrument(skip_all)]
pub async fn generate_expressions(
    State(state): State<AppState>,
    payload: Result<Json<GenerateExpressionsRequest>, JsonRejection>,
) -> Result<Json<GenerateExpressionsResponse>, AppError> {
    let result = async {
        let Json(request) = payload?;
        request.validate()?;
        tracing::info!(count = request.expressions.len(), "Generating expressions");
        state
            .generator
            .generate_expressions(&request.base_image, &request.expressions)
            .await
    }
    .await;

    metrics::record_request("generate_expressions", outcome(&result));
    let results = result.map_err(|e| {
        tracing::error!(error = %e, "Error generating expressions");
        e
    })?;

    Ok(Json(GenerateExpressionsResponse {
        success: true,
        expressions: results.into_iter().map(ExpressionResult::from).collect(),
    }))
}
