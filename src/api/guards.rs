use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::security::{self, Claims, Role};
use crate::core::state::AppState;
use crate::db::models::StudentProfile;
use crate::services::rewards::RewardError;

/// Any caller with a valid bearer token. Identity lives in the token; the
/// account service owns users.
pub(crate) struct CurrentUser(pub(crate) Claims);
pub(crate) struct CurrentTeacher(pub(crate) Claims);
pub(crate) struct CurrentStudent(pub(crate) StudentProfile);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        Ok(CurrentUser(claims))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentTeacher {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(claims) = CurrentUser::from_request_parts(parts, state).await?;

        match claims.role {
            Role::Teacher | Role::Admin => Ok(CurrentTeacher(claims)),
            Role::Student => Err(ApiError::Forbidden("Teacher access required")),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentStudent {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(claims) = CurrentUser::from_request_parts(parts, state).await?;
        if claims.role != Role::Student {
            return Err(ApiError::Forbidden("Student access required"));
        }

        match state.services().rewards.profile(&claims.profile_id).await {
            Ok(profile) if profile.user_id == claims.sub => Ok(CurrentStudent(profile)),
            Ok(_) | Err(RewardError::StudentNotFound) => {
                Err(ApiError::Forbidden("Student profile not found"))
            }
            Err(RewardError::Store(err)) => {
                Err(ApiError::internal(err, "Failed to load student profile"))
            }
        }
    }
}

/// Teachers only see their own jobs; admins see all of them.
pub(crate) fn ensure_job_owner(claims: &Claims, owner_id: &str) -> Result<(), ApiError> {
    if claims.role == Role::Admin || claims.sub == owner_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not the owner of this chapter"))
    }
}
