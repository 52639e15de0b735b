use super::blocking;
use crate::error::AppError;
use crate::models::leaderboard::LeaderboardQuery;
use crate::services::leaderboard as service;
use crate::AppState;
use ntex::http::header;
use ntex::web::{self, HttpResponse};
use std::sync::Arc;

const CACHE_CONTROL: &str = "public, s-maxage=10, stale-while-revalidate=30";

pub async fn get_leaderboard(
    state: web::types::State<Arc<AppState>>,
    query: web::types::Query<LeaderboardQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let limit = service::parse_limit(query.limit.as_deref());
    let state: Arc<AppState> = (*state).clone();
    let board = blocking(move || {
        service::get_leaderboard(state.store.as_ref(), limit, query.player.as_deref())
    })
    .await?;
    Ok(HttpResponse::Ok()
        .header(header::CACHE_CONTROL, CACHE_CONTROL)
        .json(&board))
}
