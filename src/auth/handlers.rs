use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginForm, TokenResponse},
        services::Authenticator,
    },
    error::ApiError,
    extract::ApiForm,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/token", post(login))
}

#[instrument(skip_all, fields(username = %form.username))]
pub async fn login(
    State(auth): State<Arc<Authenticator>>,
    ApiForm(form): ApiForm<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = auth.login(&form.username, &form.password).await?;
    Ok(Json(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_serialization() {
        let json = serde_json::to_value(TokenResponse::bearer("abc".into())).unwrap();
        assert_eq!(json["access_token"], "abc");
        assert_eq!(json["token_type"], "bearer");
    }
}
