use super::AppState;
use crate::error::{Kind, ReplayError};
use crate::events::Event;
use crate::store::{LiveBet, Order};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde::Deserialize;

const DIFFICULTIES: [&str; 4] = ["easy", "medium", "hard", "expert"];

#[derive(Debug, Deserialize)]
pub struct IngestPayload {
    id: String,
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    nonce: i64,
    amount: f64,
    payout: f64,
    difficulty: String,
    #[serde(rename = "roundTarget")]
    round_target: f64,
    #[serde(rename = "roundResult")]
    round_result: f64,
    #[serde(rename = "clientSeed")]
    client_seed: String,
    #[serde(rename = "serverSeedHashed")]
    server_seed_hashed: String,
}

fn validate(payload: &IngestPayload) -> Result<(String, DateTime<Utc>), ReplayError> {
    if payload.id.is_empty() {
        return Err(ReplayError::validation("VALIDATION_ERROR", "id is required").with_field("id"));
    }
    if payload.client_seed.is_empty() {
        return Err(
            ReplayError::validation("VALIDATION_ERROR", "clientSeed is required")
                .with_field("clientSeed"),
        );
    }
    if payload.server_seed_hashed.is_empty() {
        return Err(ReplayError::validation(
            "VALIDATION_ERROR",
            "serverSeedHashed is required",
        )
        .with_field("serverSeedHashed"));
    }
    if payload.nonce < 1 {
        return Err(
            ReplayError::validation("VALIDATION_ERROR", "nonce must be >= 1").with_field("nonce"),
        );
    }
    let difficulty = payload.difficulty.to_lowercase();
    if !DIFFICULTIES.contains(&difficulty.as_str()) {
        return Err(ReplayError::validation(
            "VALIDATION_ERROR",
            format!("difficulty must be one of {DIFFICULTIES:?}"),
        )
        .with_field("difficulty"));
    }
    let date_time = payload
        .date_time
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Ok((difficulty, date_time))
}

fn check_auth(state: &AppState, req: &HttpRequest) -> Result<(), ReplayError> {
    let Some(expected) = &state.token else {
        return Ok(());
    };
    let provided = req
        .headers()
        .get("X-Ingest-Token")
        .and_then(|v| v.to_str().ok());
    if provided != Some(expected.as_str()) {
        return Err(ReplayError::new(Kind::Validation, "UNAUTHORIZED", "missing or invalid token"));
    }
    Ok(())
}

pub async fn ingest(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<IngestPayload>,
) -> impl Responder {
    if let Err(e) = check_auth(&state, &req) {
        return error_response(&e);
    }
    let (difficulty, date_time) = match validate(&body) {
        Ok(v) => v,
        Err(e) => return error_response(&e),
    };

    let stream_id = match state
        .live_store
        .find_or_create_stream(&body.server_seed_hashed, &body.client_seed)
        .await
    {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    let bet = LiveBet {
        id: 0,
        stream_id: stream_id.clone(),
        antebot_bet_id: body.id.clone(),
        date_time,
        nonce: body.nonce,
        amount: body.amount,
        payout: body.payout,
        difficulty,
        round_target: body.round_target,
        round_result: body.round_result,
    };

    match state.live_store.ingest_bet(&stream_id, &bet).await {
        Ok(accepted) => {
            if accepted {
                state.bus.publish(Event::NewRows {
                    stream_id: stream_id.clone(),
                    last_id: "unknown".into(),
                });
            }
            HttpResponse::Ok().json(serde_json::json!({ "streamId": stream_id, "accepted": accepted }))
        }
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListStreamsQuery {
    limit: Option<u32>,
    offset: Option<u32>,
}

pub async fn list_streams(
    state: web::Data<AppState>,
    query: web::Query<ListStreamsQuery>,
) -> impl Responder {
    match state
        .live_store
        .list_streams(query.limit.unwrap_or(50), query.offset.unwrap_or(0))
        .await
    {
        Ok((streams, count)) => HttpResponse::Ok().json(serde_json::json!({ "streams": streams, "count": count })),
        Err(e) => error_response(&e),
    }
}

pub async fn get_stream(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match state.live_store.get_stream(&path).await {
        Ok(stream) => HttpResponse::Ok().json(stream),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListBetsQuery {
    min_multiplier: Option<f64>,
    limit: Option<u32>,
    offset: Option<u32>,
    order: Option<String>,
}

pub async fn list_bets(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ListBetsQuery>,
) -> impl Responder {
    let order = match query.order.as_deref() {
        Some("asc") | None => Order::Asc,
        Some("desc") => Order::Desc,
        Some(other) => {
            return error_response(&ReplayError::validation(
                "VALIDATION_ERROR",
                format!("order must be 'asc' or 'desc', got '{other}'"),
            ))
        }
    };
    match state
        .live_store
        .list_bets(
            &path,
            query.min_multiplier,
            order,
            query.limit.unwrap_or(1000),
            query.offset.unwrap_or(0),
        )
        .await
    {
        Ok((rows, total)) => HttpResponse::Ok().json(serde_json::json!({ "total": total, "rows": rows })),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct TailQuery {
    since_id: Option<i64>,
    limit: Option<u32>,
}

pub async fn tail(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<TailQuery>,
) -> impl Responder {
    match state
        .live_store
        .tail_bets(&path, query.since_id.unwrap_or(0), query.limit.unwrap_or(500))
        .await
    {
        Ok(rows) => {
            let last_id = rows.last().map(|b| b.id).unwrap_or(query.since_id.unwrap_or(0));
            HttpResponse::Ok().json(serde_json::json!({ "rows": rows, "lastID": last_id }))
        }
        Err(e) => error_response(&e),
    }
}

pub async fn export_csv(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let mut buf: Vec<u8> = Vec::new();
    match state.live_store.export_csv(&path, &mut buf).await {
        Ok(()) => HttpResponse::Ok().content_type("text/csv").body(buf),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateNotesBody {
    notes: String,
}

pub async fn update_notes(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateNotesBody>,
) -> impl Responder {
    match state.live_store.update_notes(&path, &body.notes).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "status": "updated" })),
        Err(e) => error_response(&e),
    }
}

pub async fn delete_stream(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match state.live_store.delete_stream(&path).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(&e),
    }
}

fn error_response(err: &ReplayError) -> HttpResponse {
    let status = match err.kind {
        Kind::Validation => actix_web::http::StatusCode::UNPROCESSABLE_ENTITY,
        Kind::Domain => actix_web::http::StatusCode::UNPROCESSABLE_ENTITY,
        Kind::Resource => actix_web::http::StatusCode::NOT_FOUND,
        Kind::Timeout => actix_web::http::StatusCode::GATEWAY_TIMEOUT,
        Kind::Cancellation => actix_web::http::StatusCode::CONFLICT,
        Kind::System => actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
    };
    let status = if err.code == "UNAUTHORIZED" {
        actix_web::http::StatusCode::UNAUTHORIZED
    } else {
        status
    };
    HttpResponse::build(status).json(err.envelope())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> IngestPayload {
        IngestPayload {
            id: "bet-1".into(),
            date_time: None,
            nonce: 5,
            amount: 1.0,
            payout: 2.0,
            difficulty: "EASY".into(),
            round_target: 2.0,
            round_result: 1.5,
            client_seed: "client".into(),
            server_seed_hashed: "hash".into(),
        }
    }

    #[test]
    fn validate_lowercases_difficulty_and_defaults_missing_date_time() {
        let (difficulty, date_time) = validate(&payload()).unwrap();
        assert_eq!(difficulty, "easy");
        assert!(date_time <= Utc::now());
    }

    #[test]
    fn validate_rejects_empty_id() {
        let mut p = payload();
        p.id = String::new();
        let err = validate(&p).unwrap_err();
        assert_eq!(err.field, Some("id"));
    }

    #[test]
    fn validate_rejects_nonce_below_one() {
        let mut p = payload();
        p.nonce = 0;
        let err = validate(&p).unwrap_err();
        assert_eq!(err.field, Some("nonce"));
    }

    #[test]
    fn validate_rejects_unknown_difficulty() {
        let mut p = payload();
        p.difficulty = "impossible".into();
        let err = validate(&p).unwrap_err();
        assert_eq!(err.field, Some("difficulty"));
    }

    #[test]
    fn validate_parses_iso8601_date_time() {
        let mut p = payload();
        p.date_time = Some("2024-01-01T00:00:00Z".into());
        let (_, date_time) = validate(&p).unwrap();
        assert_eq!(date_time.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }
}
