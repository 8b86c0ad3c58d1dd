//! Carrier-facing endpoints:
//!
//! - `GET  /api/v1/transporter/quotes`                           - open bid invitations
//! - `POST /api/v1/transporter/quotes/{responseId}/respond`      - price or decline a bid
//! - `GET  /api/v1/transporter/assignments`                      - shipments awaiting action
//! - `POST /api/v1/transporter/assignments/{shipmentId}/respond` - confirm/decline a booking
//! - `POST /api/v1/transporter/assignments/{shipmentId}/driver`  - record driver details
//!
//! Admins and company admins may pass `?vendorId=` to act across carriers;
//! transporter users are pinned to their own vendor link.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use lanehaul_core::domain::quote::QuoteResponseId;
use lanehaul_core::domain::shipment::{AssignmentAction, ShipmentId};
use lanehaul_db::repositories::{QuoteResponseRepository, ShipmentRepository};
use lanehaul_db::{AssignmentOutcome, BidCommand, DriverAssignment};

use crate::auth::AuthUser;
use crate::bootstrap::AppState;
use crate::dto::{QuoteResponseDto, ShipmentDto};
use crate::error::ApiError;
use crate::fanout;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/transporter/quotes", get(list_open_bids))
        .route("/api/v1/transporter/quotes/{responseId}/respond", post(respond_to_bid))
        .route("/api/v1/transporter/assignments", get(list_assignments))
        .route(
            "/api/v1/transporter/assignments/{shipmentId}/respond",
            post(respond_to_assignment),
        )
        .route("/api/v1/transporter/assignments/{shipmentId}/driver", post(assign_driver))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VendorQuery {
    vendor_id: Option<i64>,
}

async fn list_open_bids(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<VendorQuery>,
) -> Result<Json<Value>, ApiError> {
    let scope = state.lifecycle.transporter_vendor_scope(&actor, query.vendor_id)?;
    let responses = state.quote_responses.list_pending(scope).await?;

    Ok(Json(json!({
        "responses": responses.iter().map(QuoteResponseDto::from).collect::<Vec<_>>(),
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BidBody {
    action: Option<String>,
    quoted_price: Option<Value>,
    estimated_delivery: Option<String>,
    transporter_notes: Option<String>,
}

fn parse_price(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(raw) => raw.trim().parse::<Decimal>().ok(),
        Value::Number(number) => number.as_f64().and_then(|raw| Decimal::try_from(raw).ok()),
        _ => None,
    }
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DD` (read as midnight UTC).
fn parse_delivery_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

async fn respond_to_bid(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(response_id): Path<i64>,
    Json(body): Json<BidBody>,
) -> Result<Json<Value>, ApiError> {
    let declined =
        body.action.as_deref().map(|action| action.eq_ignore_ascii_case("DECLINE")).unwrap_or(false);

    let command = if declined {
        BidCommand::Decline { notes: body.transporter_notes }
    } else {
        let quoted_price = body
            .quoted_price
            .as_ref()
            .and_then(parse_price)
            .ok_or_else(|| {
                ApiError::BadRequest(
                    "Quoted price and estimated delivery date are required.".to_string(),
                )
            })?;
        let estimated_delivery = body
            .estimated_delivery
            .as_deref()
            .and_then(parse_delivery_date)
            .ok_or_else(|| {
                ApiError::BadRequest(
                    "Quoted price and estimated delivery date are required.".to_string(),
                )
            })?;
        BidCommand::Respond {
            quoted_price,
            estimated_delivery,
            notes: body.transporter_notes,
        }
    };

    let outcome = state
        .lifecycle
        .respond_to_quote(&actor, QuoteResponseId(response_id), command)
        .await?;

    fanout::enqueue_sync(&state.sync_queue, fanout::bid_sync(&outcome)).await;
    state.dispatcher.publish(fanout::bid_event(&outcome));

    info!(
        event_name = "transporter.bid_recorded",
        quote_response_id = outcome.response.id.0,
        declined = outcome.declined,
        actor_id = actor.user_id.0,
        "carrier bid recorded"
    );

    Ok(Json(json!({ "response": QuoteResponseDto::from(&outcome.response) })))
}

async fn list_assignments(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<VendorQuery>,
) -> Result<Json<Value>, ApiError> {
    let scope = state.lifecycle.transporter_vendor_scope(&actor, query.vendor_id)?;
    let assignments = state.shipments.list_awaiting(scope).await?;

    Ok(Json(json!({
        "assignments": assignments.iter().map(ShipmentDto::from).collect::<Vec<_>>(),
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignmentBody {
    action: Option<String>,
    notes: Option<String>,
}

async fn respond_to_assignment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(shipment_id): Path<i64>,
    Json(body): Json<AssignmentBody>,
) -> Result<Json<Value>, ApiError> {
    let action = body
        .action
        .as_deref()
        .and_then(AssignmentAction::parse)
        .ok_or_else(|| ApiError::BadRequest("Unsupported action supplied.".to_string()))?;

    let outcome = state
        .lifecycle
        .respond_to_assignment(&actor, ShipmentId(shipment_id), action, body.notes.clone())
        .await?;

    match outcome {
        AssignmentOutcome::Consent(consent) => {
            fanout::enqueue_sync(&state.sync_queue, fanout::consent_sync(&consent)).await;
            state.dispatcher.publish(fanout::consent_event(&consent));

            info!(
                event_name = "transporter.assignment_via_consent",
                shipment_id,
                consent_status = consent.recorded.as_str(),
                actor_id = actor.user_id.0,
                "assignment response routed through booking consent"
            );

            Ok(Json(json!({
                "shipment": consent.shipment.as_ref().map(ShipmentDto::from),
                "consent": { "quoteResponse": QuoteResponseDto::from(&consent.response) },
            })))
        }
        AssignmentOutcome::Direct { shipment, requester } => {
            let accepted = action == AssignmentAction::Accept;
            fanout::enqueue_sync(
                &state.sync_queue,
                fanout::assignment_sync(shipment.id.0, accepted, body.notes.as_deref()),
            )
            .await;
            state.dispatcher.publish(fanout::assignment_event(&shipment, &requester, accepted));

            info!(
                event_name = "transporter.assignment_recorded",
                shipment_id,
                accepted,
                actor_id = actor.user_id.0,
                "assignment response recorded"
            );

            Ok(Json(json!({ "shipment": ShipmentDto::from(&shipment) })))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriverBody {
    driver_name: Option<String>,
    driver_phone: Option<String>,
    vehicle_type: Option<String>,
    vehicle_registration: Option<String>,
    driver_eta: Option<String>,
}

async fn assign_driver(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(shipment_id): Path<i64>,
    Json(body): Json<DriverBody>,
) -> Result<Json<Value>, ApiError> {
    let (driver_name, driver_phone, vehicle_type, vehicle_registration) = match (
        body.driver_name,
        body.driver_phone,
        body.vehicle_type,
        body.vehicle_registration,
    ) {
        (Some(name), Some(phone), Some(vehicle), Some(registration)) => {
            (name, phone, vehicle, registration)
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Driver name, phone, vehicle type, and registration number are required."
                    .to_string(),
            ))
        }
    };

    let driver_eta = body.driver_eta.as_deref().and_then(parse_delivery_date);

    let outcome = state
        .lifecycle
        .assign_driver(
            &actor,
            ShipmentId(shipment_id),
            DriverAssignment {
                driver_name,
                driver_phone,
                vehicle_type,
                vehicle_registration,
                driver_eta,
            },
        )
        .await?;

    fanout::enqueue_sync(&state.sync_queue, fanout::driver_sync(&outcome.shipment)).await;
    state.dispatcher.publish(fanout::driver_event(&outcome.shipment, &outcome.requester));

    Ok(Json(json!({ "shipment": ShipmentDto::from(&outcome.shipment) })))
}
