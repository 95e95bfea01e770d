use axum::{
    extract::{Query, State},
    Extension, Json,
};
use common::db::repositories::SymptomRepository;
use common::models::{Symptom, SymptomCategory, UserClaims};
use serde::Deserialize;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SymptomListQuery {
    pub category: Option<String>,
    pub search: Option<String>,
}

/// Browse symptoms, filterable by category and free-text search
#[tracing::instrument(skip(state))]
pub async fn list_symptoms(
    State(state): State<AppState>,
    Query(query): Query<SymptomListQuery>,
    Extension(_claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<Vec<Symptom>>>, ErrorResponse> {
    let symptoms = SymptomRepository::new(state.db_pool.clone())
        .search(query.category.as_deref(), query.search.as_deref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list symptoms");
            ErrorResponse::new("internal_error", "Failed to list symptoms")
        })?;

    Ok(Json(SuccessResponse::new(symptoms)))
}

/// Browse symptom categories
#[tracing::instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
    Extension(_claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<Vec<SymptomCategory>>>, ErrorResponse> {
    let categories = SymptomRepository::new(state.db_pool.clone())
        .find_categories()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list symptom categories");
            ErrorResponse::new("internal_error", "Failed to list symptom categories")
        })?;

    Ok(Json(SuccessResponse::new(categories)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symptom_list_query_all_optional() {
        let query: SymptomListQuery = serde_json::from_str("{}").unwrap();
        assert!(query.category.is_none());
        assert!(query.search.is_none());
    }
}
