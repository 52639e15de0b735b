use super::blocking;
use crate::error::AppError;
use crate::services::{rate_limit, submission};
use crate::AppState;
use ntex::util::Bytes;
use ntex::web::{self, HttpRequest, HttpResponse};
use std::sync::Arc;

pub async fn submit_run(
    state: web::types::State<Arc<AppState>>,
    req: HttpRequest,
    body: Bytes,
) -> Result<HttpResponse, AppError> {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok());
    let client = rate_limit::client_identity(forwarded);
    let state: Arc<AppState> = (*state).clone();
    let result = blocking(move || {
        submission::submit_run(state.store.as_ref(), &client, &body, &state.config)
    })
    .await?;
    Ok(HttpResponse::Ok().json(&result))
}
