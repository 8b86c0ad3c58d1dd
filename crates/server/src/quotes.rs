//! Shipper-facing quote endpoints:
//!
//! - `POST /api/v1/quotes`                                  - create + invite carriers
//! - `GET  /api/v1/quotes`                                  - list, role-scoped
//! - `GET  /api/v1/quotes/{id}`                             - read one
//! - `POST /api/v1/quotes/responses/{responseId}/approve`   - select the winning bid
//! - `POST /api/v1/quotes/responses/{responseId}/consent`   - carrier confirms/declines
//! - `GET  /api/v1/quotes/responses/{responseId}/consent-history`

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use lanehaul_core::domain::quote::{QuoteRequestId, QuoteResponseId};
use lanehaul_core::domain::response::{ConsentAction, ConsentSource};
use lanehaul_core::policy;
use lanehaul_db::repositories::QuoteRequestRepository;
use lanehaul_db::NewQuoteRequest;

use crate::auth::AuthUser;
use crate::bootstrap::AppState;
use crate::dto::{ConsentLogDto, QuoteRequestDto, QuoteResponseDto, ShipmentDto};
use crate::error::ApiError;
use crate::fanout;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/quotes", post(create_quote).get(list_quotes))
        .route("/api/v1/quotes/{id}", get(get_quote))
        .route("/api/v1/quotes/responses/{responseId}/approve", post(approve_response))
        .route("/api/v1/quotes/responses/{responseId}/consent", post(submit_consent))
        .route(
            "/api/v1/quotes/responses/{responseId}/consent-history",
            get(consent_history),
        )
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateQuoteBody {
    from_location: Option<String>,
    to_location: Option<String>,
    from_lat: Option<f64>,
    from_lng: Option<f64>,
    to_lat: Option<f64>,
    to_lng: Option<f64>,
    weight: Option<f64>,
    shipment_type: Option<String>,
    urgency: Option<String>,
    notes: Option<String>,
    vendor_ids: Option<Vec<i64>>,
}

async fn create_quote(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(body): Json<CreateQuoteBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (from_location, to_location, weight, shipment_type, urgency) = match (
        body.from_location,
        body.to_location,
        body.weight,
        body.shipment_type,
        body.urgency,
    ) {
        (Some(from), Some(to), Some(weight), Some(kind), Some(urgency)) => {
            (from, to, weight, kind, urgency)
        }
        _ => {
            return Err(ApiError::BadRequest("Missing required shipment details.".to_string()))
        }
    };

    let creation = state
        .lifecycle
        .create_quote_request(
            &actor,
            NewQuoteRequest {
                from_location,
                to_location,
                from_lat: body.from_lat,
                from_lng: body.from_lng,
                to_lat: body.to_lat,
                to_lng: body.to_lng,
                weight_kg: weight,
                shipment_type,
                urgency,
                notes: body.notes,
                vendor_ids: body.vendor_ids.unwrap_or_default(),
            },
        )
        .await?;

    fanout::enqueue_sync(&state.sync_queue, fanout::quote_created_sync(&creation)).await;
    state.dispatcher.publish(fanout::quote_created_event(&creation));

    info!(
        event_name = "quotes.request_created",
        quote_request_id = creation.request.id.0,
        actor_id = actor.user_id.0,
        "quote request created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "quoteRequest": QuoteRequestDto::from(&creation.request),
            "responses": creation
                .responses
                .iter()
                .map(QuoteResponseDto::from)
                .collect::<Vec<_>>(),
        })),
    ))
}

async fn list_quotes(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let scope = policy::quote_list_scope(&actor)
        .ok_or_else(|| ApiError::Forbidden("Company context missing".to_string()))?;

    let requests = state.quote_requests.list(scope).await?;

    Ok(Json(json!({
        "requests": requests.iter().map(QuoteRequestDto::from).collect::<Vec<_>>(),
    })))
}

async fn get_quote(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let (request, responses) =
        state.lifecycle.get_quote_request(&actor, QuoteRequestId(id)).await?;

    Ok(Json(json!({
        "request": QuoteRequestDto::from(&request),
        "responses": responses.iter().map(QuoteResponseDto::from).collect::<Vec<_>>(),
    })))
}

async fn approve_response(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(response_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let approval =
        state.lifecycle.approve_response(&actor, QuoteResponseId(response_id)).await?;

    fanout::enqueue_sync(&state.sync_queue, fanout::approval_sync(&approval)).await;
    if let Some(event) = fanout::approval_event(&approval) {
        state.dispatcher.publish(event);
    }

    info!(
        event_name = "quotes.response_approved",
        quote_response_id = approval.response.id.0,
        shipment_id = approval.shipment.id.0,
        actor_id = actor.user_id.0,
        "quotation response approved; shipment created"
    );

    Ok(Json(json!({
        "approval": {
            "quoteRequest": QuoteRequestDto::from(&approval.request),
            "quoteResponse": QuoteResponseDto::from(&approval.response),
            "shipment": ShipmentDto::from(&approval.shipment),
        }
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsentBody {
    action: Option<String>,
    note: Option<String>,
    source: Option<String>,
}

fn parse_consent_source(raw: Option<&str>) -> Option<ConsentSource> {
    match raw.map(ConsentSource::parse) {
        Some(Some(source)) if source != ConsentSource::System => Some(source),
        _ => None,
    }
}

async fn submit_consent(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(response_id): Path<i64>,
    Json(body): Json<ConsentBody>,
) -> Result<Json<Value>, ApiError> {
    let action = body
        .action
        .as_deref()
        .and_then(ConsentAction::parse)
        .ok_or_else(|| {
            ApiError::BadRequest("Action must be either ACCEPT or DECLINE.".to_string())
        })?;
    let note = body.note.and_then(|note| {
        let trimmed = note.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    });
    let source = parse_consent_source(body.source.as_deref());

    let outcome = state
        .lifecycle
        .submit_consent(&actor, QuoteResponseId(response_id), action, note, source)
        .await?;

    fanout::enqueue_sync(&state.sync_queue, fanout::consent_sync(&outcome)).await;
    state.dispatcher.publish(fanout::consent_event(&outcome));

    info!(
        event_name = "quotes.consent_recorded",
        quote_response_id = outcome.response.id.0,
        consent_status = outcome.recorded.as_str(),
        actor_id = actor.user_id.0,
        "booking consent recorded"
    );

    Ok(Json(json!({
        "consent": {
            "quoteResponse": QuoteResponseDto::from(&outcome.response),
            "shipment": outcome.shipment.as_ref().map(ShipmentDto::from),
        }
    })))
}

async fn consent_history(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(response_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let logs = state.lifecycle.consent_history(&actor, QuoteResponseId(response_id)).await?;

    Ok(Json(json!({
        "logs": logs.iter().map(ConsentLogDto::from).collect::<Vec<_>>(),
    })))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use lanehaul_core::domain::party::{Actor, Role};
    use lanehaul_db::fixtures::{seed_user, seed_vendor, seed_vendor_user};

    use crate::bootstrap::router;
    use crate::test_support::{bearer, call, test_state};

    #[tokio::test]
    async fn quote_to_booking_round_trip_over_http() {
        let (state, context) = test_state().await;
        let pool = state.db_pool.clone();

        let shipper_id = seed_user(&pool, "Asha", "SHIPPER", None, None).await;
        let vendor_id = seed_vendor(&pool, "Sharma Logistics", true).await;
        let carrier_id = seed_vendor_user(&pool, "Ravi", vendor_id).await;

        let shipper = Actor::new(shipper_id, Role::Shipper, None, None);
        let carrier = Actor::new(carrier_id, Role::Transporter, None, Some(vendor_id));
        let shipper_token = bearer(&context, &shipper);
        let carrier_token = bearer(&context, &carrier);

        let app = router(state.clone());

        // Shipper solicits a quote from one carrier.
        let (status, body) = call(
            app.clone(),
            Method::POST,
            "/api/v1/quotes",
            Some(&shipper_token),
            Some(json!({
                "fromLocation": "Pune",
                "toLocation": "Nagpur",
                "weight": 1200.0,
                "shipmentType": "FTL",
                "urgency": "STANDARD",
                "vendorIds": [vendor_id.0],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["quoteRequest"]["status"], "PENDING");
        let response_id = body["responses"][0]["id"].as_i64().expect("response id");

        // Carrier submits pricing.
        let (status, body) = call(
            app.clone(),
            Method::POST,
            &format!("/api/v1/transporter/quotes/{response_id}/respond"),
            Some(&carrier_token),
            Some(json!({
                "quotedPrice": "1000",
                "estimatedDelivery": "2025-01-10",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"]["status"], "RESPONDED");

        // Shipper approves the winning bid; a shipment appears.
        let (status, body) = call(
            app.clone(),
            Method::POST,
            &format!("/api/v1/quotes/responses/{response_id}/approve"),
            Some(&shipper_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["approval"]["quoteRequest"]["status"], "APPROVED");
        assert_eq!(body["approval"]["quoteResponse"]["consentStatus"], "PENDING");
        assert_eq!(body["approval"]["shipment"]["cost"], "1000");
        assert_eq!(body["approval"]["shipment"]["bookingStatus"], "PENDING_TRANSPORTER");

        // Repeat approval conflicts without creating a second shipment.
        let (status, _) = call(
            app.clone(),
            Method::POST,
            &format!("/api/v1/quotes/responses/{response_id}/approve"),
            Some(&shipper_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Carrier confirms the booking.
        let (status, body) = call(
            app.clone(),
            Method::POST,
            &format!("/api/v1/quotes/responses/{response_id}/consent"),
            Some(&carrier_token),
            Some(json!({ "action": "ACCEPT" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["consent"]["quoteResponse"]["consentStatus"], "ACCEPTED");
        assert_eq!(body["consent"]["shipment"]["bookingStatus"], "CONFIRMED");

        // A second decision conflicts.
        let (status, _) = call(
            app.clone(),
            Method::POST,
            &format!("/api/v1/quotes/responses/{response_id}/consent"),
            Some(&carrier_token),
            Some(json!({ "action": "DECLINE" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        // History lists the creation row and the accept, newest first.
        let (status, body) = call(
            app.clone(),
            Method::GET,
            &format!("/api/v1/quotes/responses/{response_id}/consent-history"),
            Some(&carrier_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let logs = body["logs"].as_array().expect("logs array");
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0]["statusAfter"], "ACCEPTED");
        assert_eq!(logs[1]["statusAfter"], "PENDING");

        // The dispatcher eventually delivers the consent-request email.
        let mut delivered = false;
        for _ in 0..200 {
            if !context.email.sent().is_empty() {
                delivered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(delivered, "outbound email fan-out should be observable");

        context.dispatcher_task.abort();
    }

    #[tokio::test]
    async fn missing_fields_and_missing_tokens_are_rejected() {
        let (state, context) = test_state().await;
        let pool = state.db_pool.clone();
        let shipper_id = seed_user(&pool, "Asha", "SHIPPER", None, None).await;
        let shipper = Actor::new(shipper_id, Role::Shipper, None, None);
        let token = bearer(&context, &shipper);

        let app = router(state);

        let (status, _) = call(
            app.clone(),
            Method::POST,
            "/api/v1/quotes",
            Some(&token),
            Some(json!({ "fromLocation": "Pune" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            call(app.clone(), Method::GET, "/api/v1/quotes", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        context.dispatcher_task.abort();
    }

    #[tokio::test]
    async fn quote_listing_is_scoped_by_role() {
        let (state, context) = test_state().await;
        let pool = state.db_pool.clone();

        let first = seed_user(&pool, "Asha", "SHIPPER", None, None).await;
        let second = seed_user(&pool, "Vikram", "SHIPPER", None, None).await;
        let admin = seed_user(&pool, "Root", "ADMIN", None, None).await;
        let vendor = seed_vendor(&pool, "Sharma Logistics", true).await;

        let app = router(state.clone());
        for (owner, route) in [(first, "Pune"), (second, "Delhi")] {
            let token = bearer(&context, &Actor::new(owner, Role::Shipper, None, None));
            let (status, _) = call(
                app.clone(),
                Method::POST,
                "/api/v1/quotes",
                Some(&token),
                Some(json!({
                    "fromLocation": route,
                    "toLocation": "Nagpur",
                    "weight": 500.0,
                    "shipmentType": "LTL",
                    "urgency": "STANDARD",
                    "vendorIds": [vendor.0],
                })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let own_token = bearer(&context, &Actor::new(first, Role::Shipper, None, None));
        let (status, body) =
            call(app.clone(), Method::GET, "/api/v1/quotes", Some(&own_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["requests"].as_array().expect("requests").len(), 1);

        let admin_token = bearer(&context, &Actor::new(admin, Role::Admin, None, None));
        let (status, body) =
            call(app.clone(), Method::GET, "/api/v1/quotes", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["requests"].as_array().expect("requests").len(), 2);

        // A shipper who does not own the request cannot read it.
        let other_token = bearer(&context, &Actor::new(second, Role::Shipper, None, None));
        let first_id = body["requests"]
            .as_array()
            .expect("requests")
            .iter()
            .find(|request| request["createdByUserId"] == first.0)
            .and_then(|request| request["id"].as_i64())
            .expect("first request id");
        let (status, _) = call(
            app.clone(),
            Method::GET,
            &format!("/api/v1/quotes/{first_id}"),
            Some(&other_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        context.dispatcher_task.abort();
    }
}
