//! Transactional quote-to-booking operations.
//!
//! Every state transition that touches more than one table runs inside a
//! single database transaction; partial writes are never observable. The
//! approved-response guard is re-checked inside the approval transaction so
//! two concurrent approvals on the same request cannot both win. Post-commit
//! fan-out (notifications, sync enqueue) is the caller's concern and never
//! rolls anything back.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use thiserror::Error;
use uuid::Uuid;

use lanehaul_core::domain::consent_log::ConsentActor;
use lanehaul_core::domain::party::{Actor, User, UserId, Vendor, VendorId};
use lanehaul_core::domain::quote::{
    status_after_bid, QuoteRequest, QuoteRequestId, QuoteRequestStatus, QuoteResponseId,
};
use lanehaul_core::domain::response::{
    ConsentAction, ConsentDecision, ConsentSource, ConsentStatus, QuoteResponse,
    QuoteResponseStatus,
};
use lanehaul_core::domain::shipment::{
    AssignmentAction, BookingStatus, Shipment, ShipmentId, ShipmentStatus,
};
use lanehaul_core::policy;

use crate::repositories::party::{row_to_user, row_to_vendor};
use crate::repositories::quote_request::{row_to_quote_request, QUOTE_REQUEST_COLUMNS};
use crate::repositories::quote_response::{row_to_quote_response, QUOTE_RESPONSE_COLUMNS};
use crate::repositories::shipment::{row_to_shipment, SHIPMENT_COLUMNS};
use crate::repositories::{ConsentLogRepository, RepositoryError, SqlConsentLogRepository};
use crate::DbPool;

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),
    /// The operation exists but this state does not admit it.
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// Already decided, already approved, or expired.
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Clone, Debug)]
pub struct NewQuoteRequest {
    pub from_location: String,
    pub to_location: String,
    pub from_lat: Option<f64>,
    pub from_lng: Option<f64>,
    pub to_lat: Option<f64>,
    pub to_lng: Option<f64>,
    pub weight_kg: f64,
    pub shipment_type: String,
    pub urgency: String,
    pub notes: Option<String>,
    pub vendor_ids: Vec<i64>,
}

#[derive(Clone, Debug)]
pub struct QuoteCreation {
    pub request: QuoteRequest,
    pub responses: Vec<QuoteResponse>,
    pub vendors: Vec<Vendor>,
    pub requester: User,
}

#[derive(Clone, Debug)]
pub enum BidCommand {
    Respond {
        quoted_price: Decimal,
        estimated_delivery: DateTime<Utc>,
        notes: Option<String>,
    },
    Decline { notes: Option<String> },
}

#[derive(Clone, Debug)]
pub struct BidOutcome {
    pub response: QuoteResponse,
    pub request: QuoteRequest,
    pub requester: User,
    pub declined: bool,
}

#[derive(Clone, Debug)]
pub struct ApprovalOutcome {
    pub request: QuoteRequest,
    pub response: QuoteResponse,
    pub shipment: Shipment,
    pub vendor: Vendor,
    pub requester: User,
}

#[derive(Clone, Debug)]
pub struct ConsentOutcome {
    pub response: QuoteResponse,
    pub shipment: Option<Shipment>,
    pub vendor: Vendor,
    pub requester: User,
    pub recorded: ConsentStatus,
}

#[derive(Clone, Debug)]
pub enum AssignmentOutcome {
    /// The shipment is consent-gated; the decision went through the consent
    /// machine.
    Consent(Box<ConsentOutcome>),
    Direct { shipment: Shipment, requester: User },
}

#[derive(Clone, Debug)]
pub struct DriverAssignment {
    pub driver_name: String,
    pub driver_phone: String,
    pub vehicle_type: String,
    pub vehicle_registration: String,
    pub driver_eta: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub struct DriverOutcome {
    pub shipment: Shipment,
    pub requester: User,
}

#[derive(Clone, Debug)]
pub struct ExpiredConsent {
    pub response: QuoteResponse,
    pub shipment: Option<Shipment>,
    pub vendor: Vendor,
    pub requester: User,
}

const EXPIRY_NOTE: &str = "Consent window elapsed; booking marked as expired.";

pub struct BookingLifecycle {
    pool: DbPool,
    consent_sla_minutes: i64,
}

impl BookingLifecycle {
    pub fn new(pool: DbPool, consent_sla_minutes: i64) -> Self {
        Self { pool, consent_sla_minutes }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    // -----------------------------------------------------------------------
    // Quote solicitation
    // -----------------------------------------------------------------------

    pub async fn create_quote_request(
        &self,
        actor: &Actor,
        input: NewQuoteRequest,
    ) -> Result<QuoteCreation, LifecycleError> {
        if input.from_location.trim().is_empty()
            || input.to_location.trim().is_empty()
            || input.shipment_type.trim().is_empty()
            || input.urgency.trim().is_empty()
        {
            return Err(LifecycleError::Validation(
                "Missing required shipment details.".to_string(),
            ));
        }
        if input.weight_kg <= 0.0 {
            return Err(LifecycleError::Validation(
                "Shipment weight must be greater than zero.".to_string(),
            ));
        }

        let mut unique_vendor_ids: Vec<i64> = Vec::new();
        for id in input.vendor_ids.iter().copied().filter(|id| *id > 0) {
            if !unique_vendor_ids.contains(&id) {
                unique_vendor_ids.push(id);
            }
        }
        if unique_vendor_ids.is_empty() {
            return Err(LifecycleError::Validation(
                "Select at least one transporter to request a quotation.".to_string(),
            ));
        }

        let vendors = self.load_active_vendors(&unique_vendor_ids).await?;
        if vendors.len() != unique_vendor_ids.len() {
            return Err(LifecycleError::Validation(
                "One or more selected transporters are unavailable.".to_string(),
            ));
        }

        let requester = self.require_user(actor.user_id).await?;

        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let request_id = sqlx::query(
            "INSERT INTO quote_request (created_by_user_id, from_location, to_location, from_lat,
                                        from_lng, to_lat, to_lng, weight_kg, shipment_type,
                                        urgency, notes, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'PENDING', ?, ?)",
        )
        .bind(actor.user_id.0)
        .bind(input.from_location.trim())
        .bind(input.to_location.trim())
        .bind(input.from_lat)
        .bind(input.from_lng)
        .bind(input.to_lat)
        .bind(input.to_lng)
        .bind(input.weight_kg)
        .bind(input.shipment_type.trim())
        .bind(input.urgency.trim())
        .bind(&input.notes)
        .bind(&now_str)
        .bind(&now_str)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for vendor_id in &unique_vendor_ids {
            sqlx::query(
                "INSERT INTO quote_response (quote_request_id, vendor_id, status, consent_status,
                                             created_at, updated_at)
                 VALUES (?, ?, 'PENDING', 'PENDING', ?, ?)",
            )
            .bind(request_id)
            .bind(vendor_id)
            .bind(&now_str)
            .bind(&now_str)
            .execute(&mut *tx)
            .await?;
        }

        let request = load_request(&mut tx, QuoteRequestId(request_id))
            .await?
            .ok_or_else(|| LifecycleError::NotFound("Quotation request not found.".to_string()))?;
        let responses = load_responses_for_request(&mut tx, QuoteRequestId(request_id)).await?;

        tx.commit().await?;

        Ok(QuoteCreation { request, responses, vendors, requester })
    }

    // -----------------------------------------------------------------------
    // Carrier price response
    // -----------------------------------------------------------------------

    pub async fn respond_to_quote(
        &self,
        actor: &Actor,
        response_id: QuoteResponseId,
        command: BidCommand,
    ) -> Result<BidOutcome, LifecycleError> {
        let response = self.require_response(response_id).await?;

        if !policy::has_transporter_privileges(actor)
            && !policy::can_act_for_vendor(actor, response.vendor_id)
        {
            return Err(LifecycleError::Forbidden(
                "This quotation does not belong to your transporter profile.".to_string(),
            ));
        }

        if response.status != QuoteResponseStatus::Pending {
            return Err(LifecycleError::InvalidState("Quotation already processed.".to_string()));
        }

        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let declined = matches!(command, BidCommand::Decline { .. });

        let mut tx = self.pool.begin().await?;

        match &command {
            BidCommand::Respond { quoted_price, estimated_delivery, notes } => {
                sqlx::query(
                    "UPDATE quote_response
                     SET status = 'RESPONDED', quoted_price = ?, estimated_delivery = ?,
                         transporter_notes = ?, updated_at = ?
                     WHERE id = ?",
                )
                .bind(quoted_price.to_string())
                .bind(estimated_delivery.to_rfc3339())
                .bind(notes)
                .bind(&now_str)
                .bind(response_id.0)
                .execute(&mut *tx)
                .await?;
            }
            BidCommand::Decline { notes } => {
                sqlx::query(
                    "UPDATE quote_response
                     SET status = 'DECLINED', transporter_notes = ?, updated_at = ?
                     WHERE id = ?",
                )
                .bind(notes)
                .bind(&now_str)
                .bind(response_id.0)
                .execute(&mut *tx)
                .await?;
            }
        }

        let siblings = load_responses_for_request(&mut tx, response.quote_request_id).await?;
        let sibling_statuses: Vec<QuoteResponseStatus> =
            siblings.iter().map(|sibling| sibling.status).collect();

        let request = load_request(&mut tx, response.quote_request_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound("Quotation request not found.".to_string()))?;
        let next_status = status_after_bid(request.status, &sibling_statuses);

        if next_status != request.status {
            sqlx::query("UPDATE quote_request SET status = ?, updated_at = ? WHERE id = ?")
                .bind(next_status.as_str())
                .bind(&now_str)
                .bind(request.id.0)
                .execute(&mut *tx)
                .await?;
        }

        let response = load_response(&mut tx, response_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound("Quotation response not found.".to_string()))?;
        let request = load_request(&mut tx, response.quote_request_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound("Quotation request not found.".to_string()))?;

        tx.commit().await?;

        let requester = self.require_user(request.created_by_user_id).await?;

        Ok(BidOutcome { response, request, requester, declined })
    }

    // -----------------------------------------------------------------------
    // Quote approval
    // -----------------------------------------------------------------------

    pub async fn approve_response(
        &self,
        actor: &Actor,
        response_id: QuoteResponseId,
    ) -> Result<ApprovalOutcome, LifecycleError> {
        let response = self.require_response(response_id).await?;
        let request = self.require_request(response.quote_request_id).await?;
        let requester = self.require_user(request.created_by_user_id).await?;

        let ownership = policy::QuoteOwnership {
            created_by_user_id: request.created_by_user_id,
            creator_company_id: requester.company_id,
        };
        if !policy::can_manage_quote(actor, ownership) {
            return Err(LifecycleError::Forbidden(
                "You are not allowed to approve this quotation.".to_string(),
            ));
        }

        if response.status != QuoteResponseStatus::Responded {
            return Err(LifecycleError::InvalidState(
                "Transporter must submit a price before approval.".to_string(),
            ));
        }

        if request.status == QuoteRequestStatus::Approved || request.approved_response_id.is_some()
        {
            return Err(LifecycleError::Conflict("Quotation already approved.".to_string()));
        }

        let (quoted_price, estimated_delivery) =
            match (response.quoted_price, response.estimated_delivery) {
                (Some(price), Some(delivery)) => (price, delivery),
                _ => {
                    return Err(LifecycleError::Validation(
                        "Quotation is missing price or delivery information.".to_string(),
                    ))
                }
            };

        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let consent_expires_at = now + Duration::minutes(self.consent_sla_minutes);
        let tracking_number = new_tracking_number();

        let mut tx = self.pool.begin().await?;

        // Optimistic guard, re-checked inside the transaction: the first
        // approval to commit wins, any concurrent attempt affects zero rows.
        let guarded = sqlx::query(
            "UPDATE quote_request
             SET status = 'APPROVED', approved_response_id = ?, updated_at = ?
             WHERE id = ? AND approved_response_id IS NULL AND status != 'APPROVED'",
        )
        .bind(response_id.0)
        .bind(&now_str)
        .bind(request.id.0)
        .execute(&mut *tx)
        .await?;

        if guarded.rows_affected() == 0 {
            return Err(LifecycleError::Conflict("Quotation already approved.".to_string()));
        }

        sqlx::query(
            "UPDATE quote_response
             SET status = 'APPROVED', consent_status = 'PENDING', consent_at = NULL,
                 consent_source = NULL, expires_at = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(consent_expires_at.to_rfc3339())
        .bind(&now_str)
        .bind(response_id.0)
        .execute(&mut *tx)
        .await?;

        let shipment_id = sqlx::query(
            "INSERT INTO shipment (user_id, quote_request_id, transporter_quote_id,
                                   selected_vendor_id, from_location, to_location, from_lat,
                                   from_lng, to_lat, to_lng, weight_kg, shipment_type, urgency,
                                   notes, cost, estimated_delivery, status, booking_status,
                                   tracking_number, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'REQUESTED',
                     'PENDING_TRANSPORTER', ?, ?, ?)",
        )
        .bind(request.created_by_user_id.0)
        .bind(request.id.0)
        .bind(response_id.0)
        .bind(response.vendor_id.0)
        .bind(&request.from_location)
        .bind(&request.to_location)
        .bind(request.from_lat)
        .bind(request.from_lng)
        .bind(request.to_lat)
        .bind(request.to_lng)
        .bind(request.weight_kg)
        .bind(&request.shipment_type)
        .bind(&request.urgency)
        .bind(&request.notes)
        .bind(quoted_price.to_string())
        .bind(estimated_delivery.to_rfc3339())
        .bind(&tracking_number)
        .bind(&now_str)
        .bind(&now_str)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        insert_consent_log(
            &mut tx,
            response_id,
            Some(ShipmentId(shipment_id)),
            ConsentStatus::Pending,
            ConsentStatus::Pending,
            ConsentActor::System,
            Some(actor.user_id),
            Some("Shipment created; awaiting transporter consent."),
            &now_str,
        )
        .await?;

        sqlx::query("UPDATE quote_request SET shipment_id = ? WHERE id = ?")
            .bind(shipment_id)
            .bind(request.id.0)
            .execute(&mut *tx)
            .await?;

        let request = load_request(&mut tx, request.id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound("Quotation request not found.".to_string()))?;
        let response = load_response(&mut tx, response_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound("Quotation response not found.".to_string()))?;
        let shipment = load_shipment(&mut tx, ShipmentId(shipment_id))
            .await?
            .ok_or_else(|| LifecycleError::NotFound("Shipment not found.".to_string()))?;

        tx.commit().await?;

        let vendor = self.require_vendor(response.vendor_id).await?;

        Ok(ApprovalOutcome { request, response, shipment, vendor, requester })
    }

    // -----------------------------------------------------------------------
    // Consent submission
    // -----------------------------------------------------------------------

    pub async fn submit_consent(
        &self,
        actor: &Actor,
        response_id: QuoteResponseId,
        action: ConsentAction,
        note: Option<String>,
        source: Option<ConsentSource>,
    ) -> Result<ConsentOutcome, LifecycleError> {
        let response = self.require_response(response_id).await?;

        if !policy::can_act_for_vendor(actor, response.vendor_id) {
            return Err(LifecycleError::Forbidden(
                "You are not authorized to respond to this booking.".to_string(),
            ));
        }

        let now = Utc::now();

        match response.consent_decision(action, now) {
            ConsentDecision::NotApproved => Err(LifecycleError::InvalidState(
                "Booking consent is not open for this quotation response.".to_string(),
            )),
            ConsentDecision::AlreadyDecided(status) => Err(LifecycleError::Conflict(format!(
                "Consent already recorded as {}.",
                status.as_str()
            ))),
            ConsentDecision::Expired => {
                self.force_expire(&response, Some(actor.user_id), now).await?;
                Err(LifecycleError::Conflict(
                    "Consent window has expired. Please request a new quotation.".to_string(),
                ))
            }
            ConsentDecision::Record(next_status) => {
                self.record_consent(actor, &response, next_status, note, source, now).await
            }
        }
    }

    async fn record_consent(
        &self,
        actor: &Actor,
        response: &QuoteResponse,
        next_status: ConsentStatus,
        note: Option<String>,
        source: Option<ConsentSource>,
        now: DateTime<Utc>,
    ) -> Result<ConsentOutcome, LifecycleError> {
        let now_str = now.to_rfc3339();
        let admin = policy::is_platform_admin(actor);
        let actor_type = if admin { ConsentActor::Admin } else { ConsentActor::Transporter };
        let consent_source = if admin {
            ConsentSource::System
        } else {
            source.unwrap_or(ConsentSource::TransporterPortal)
        };
        let next_booking = BookingStatus::from_consent(next_status).ok_or_else(|| {
            LifecycleError::InvalidState("Consent decision must be terminal.".to_string())
        })?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE quote_response
             SET consent_status = ?, consent_at = ?, consent_source = ?,
                 transporter_notes = COALESCE(?, transporter_notes), updated_at = ?
             WHERE id = ?",
        )
        .bind(next_status.as_str())
        .bind(&now_str)
        .bind(consent_source.as_str())
        .bind(&note)
        .bind(&now_str)
        .bind(response.id.0)
        .execute(&mut *tx)
        .await?;

        let shipment = load_shipment_for_response(&mut tx, response.id).await?;
        if let Some(shipment) = &shipment {
            let (accepted_at, rejected_at) = if next_status == ConsentStatus::Accepted {
                (Some(now_str.clone()), None)
            } else {
                (None, Some(now_str.clone()))
            };

            sqlx::query(
                "UPDATE shipment
                 SET booking_status = ?, transporter_responded_at = ?,
                     transporter_accepted_at = ?, transporter_rejected_at = ?,
                     transporter_response_notes = COALESCE(?, transporter_response_notes),
                     updated_at = ?
                 WHERE id = ?",
            )
            .bind(next_booking.as_str())
            .bind(&now_str)
            .bind(accepted_at)
            .bind(rejected_at)
            .bind(&note)
            .bind(&now_str)
            .bind(shipment.id.0)
            .execute(&mut *tx)
            .await?;
        }

        insert_consent_log(
            &mut tx,
            response.id,
            shipment.as_ref().map(|shipment| shipment.id),
            response.consent_status,
            next_status,
            actor_type,
            Some(actor.user_id),
            note.as_deref(),
            &now_str,
        )
        .await?;

        let updated_response = load_response(&mut tx, response.id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound("Quotation response not found.".to_string()))?;
        let updated_shipment = match &shipment {
            Some(shipment) => load_shipment(&mut tx, shipment.id).await?,
            None => None,
        };

        tx.commit().await?;

        let request = self.require_request(response.quote_request_id).await?;
        let requester = self.require_user(request.created_by_user_id).await?;
        let vendor = self.require_vendor(response.vendor_id).await?;

        Ok(ConsentOutcome {
            response: updated_response,
            shipment: updated_shipment,
            vendor,
            requester,
            recorded: next_status,
        })
    }

    /// Shared by the lazy path (first access after the deadline) and the
    /// sweep: same transaction shape, same ConsentLog semantics.
    async fn force_expire(
        &self,
        response: &QuoteResponse,
        actor_id: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<Option<ShipmentId>, LifecycleError> {
        let now_str = now.to_rfc3339();

        let mut tx = self.pool.begin().await?;

        // Guard inside the transaction so a racing consent or second sweep
        // pass cannot double-expire the row.
        let guarded = sqlx::query(
            "UPDATE quote_response
             SET consent_status = 'EXPIRED', consent_at = ?, consent_source = 'SYSTEM',
                 updated_at = ?
             WHERE id = ? AND consent_status = 'PENDING'",
        )
        .bind(&now_str)
        .bind(&now_str)
        .bind(response.id.0)
        .execute(&mut *tx)
        .await?;

        if guarded.rows_affected() == 0 {
            return Err(LifecycleError::Conflict(format!(
                "Consent already recorded as {}.",
                response.consent_status.as_str()
            )));
        }

        let shipment = load_shipment_for_response(&mut tx, response.id).await?;
        if let Some(shipment) = &shipment {
            sqlx::query(
                "UPDATE shipment
                 SET booking_status = 'EXPIRED', transporter_responded_at = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(&now_str)
            .bind(&now_str)
            .bind(shipment.id.0)
            .execute(&mut *tx)
            .await?;
        }

        insert_consent_log(
            &mut tx,
            response.id,
            shipment.as_ref().map(|shipment| shipment.id),
            response.consent_status,
            ConsentStatus::Expired,
            ConsentActor::System,
            actor_id,
            Some(EXPIRY_NOTE),
            &now_str,
        )
        .await?;

        tx.commit().await?;

        Ok(shipment.map(|shipment| shipment.id))
    }

    /// Proactive counterpart to the lazy expiry check: forces EXPIRED for
    /// every overdue PENDING consent, one transaction per booking.
    pub async fn expire_overdue_consents(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExpiredConsent>, LifecycleError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {QUOTE_RESPONSE_COLUMNS} FROM quote_response
             WHERE status = 'APPROVED' AND consent_status = 'PENDING'
               AND expires_at IS NOT NULL AND expires_at < ?
             ORDER BY expires_at ASC"
        ))
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        let mut expired = Vec::new();
        for row in &rows {
            let response = row_to_quote_response(row)?;
            match self.force_expire(&response, None, now).await {
                Ok(shipment_id) => {
                    let updated = self.require_response(response.id).await?;
                    let shipment = match shipment_id {
                        Some(id) => self.find_shipment(id).await?,
                        None => None,
                    };
                    let request = self.require_request(response.quote_request_id).await?;
                    let requester = self.require_user(request.created_by_user_id).await?;
                    let vendor = self.require_vendor(response.vendor_id).await?;
                    expired.push(ExpiredConsent { response: updated, shipment, vendor, requester });
                }
                // Lost the race to a concurrent consent; nothing to report.
                Err(LifecycleError::Conflict(_)) => continue,
                Err(error) => return Err(error),
            }
        }

        Ok(expired)
    }

    // -----------------------------------------------------------------------
    // Consent history
    // -----------------------------------------------------------------------

    pub async fn consent_history(
        &self,
        actor: &Actor,
        response_id: QuoteResponseId,
    ) -> Result<Vec<lanehaul_core::domain::consent_log::ConsentLogEntry>, LifecycleError> {
        let response = self.require_response(response_id).await?;
        let request = self.require_request(response.quote_request_id).await?;
        let requester = self.require_user(request.created_by_user_id).await?;

        let ownership = policy::QuoteOwnership {
            created_by_user_id: request.created_by_user_id,
            creator_company_id: requester.company_id,
        };
        if !policy::can_view_consent_history(actor, ownership, response.vendor_id) {
            return Err(LifecycleError::Forbidden(
                "You are not authorized to view this consent history.".to_string(),
            ));
        }

        let repo = SqlConsentLogRepository::new(self.pool.clone());
        Ok(repo.list_for_response(response_id).await?)
    }

    // -----------------------------------------------------------------------
    // Assignment response (unified with consent)
    // -----------------------------------------------------------------------

    pub async fn respond_to_assignment(
        &self,
        actor: &Actor,
        shipment_id: ShipmentId,
        action: AssignmentAction,
        notes: Option<String>,
    ) -> Result<AssignmentOutcome, LifecycleError> {
        let shipment = self.require_shipment(shipment_id).await?;

        let authorized = policy::has_transporter_privileges(actor)
            || shipment
                .selected_vendor_id
                .is_some_and(|vendor_id| policy::can_act_for_vendor(actor, vendor_id));
        if !authorized {
            return Err(LifecycleError::Forbidden(
                "Shipment not assigned to your transporter profile.".to_string(),
            ));
        }

        // A consent-gated booking has exactly one confirmation path: the
        // consent machine. The direct path is reserved for shipments that
        // never went through quote approval.
        if let Some(response_id) = shipment.transporter_quote_id {
            let response = self.require_response(response_id).await?;
            if response.consent_status == ConsentStatus::Pending
                && response.status == QuoteResponseStatus::Approved
            {
                let consent_action = match action {
                    AssignmentAction::Accept => ConsentAction::Accept,
                    AssignmentAction::Reject => ConsentAction::Decline,
                };
                let outcome =
                    self.submit_consent(actor, response_id, consent_action, notes, None).await?;
                return Ok(AssignmentOutcome::Consent(Box::new(outcome)));
            }
            return Err(LifecycleError::Conflict(
                "Booking already settled through the consent flow.".to_string(),
            ));
        }

        if !shipment.awaiting_transporter() {
            return Err(LifecycleError::InvalidState(
                "Shipment no longer requires transporter confirmation.".to_string(),
            ));
        }

        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let (next_status, next_booking) = match action {
            AssignmentAction::Accept => (ShipmentStatus::Accepted, BookingStatus::Confirmed),
            AssignmentAction::Reject => (ShipmentStatus::Rejected, BookingStatus::Declined),
        };
        let (accepted_at, rejected_at) = match action {
            AssignmentAction::Accept => (Some(now_str.clone()), None),
            AssignmentAction::Reject => (None, Some(now_str.clone())),
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE shipment
             SET status = ?, booking_status = ?, transporter_responded_at = ?,
                 transporter_accepted_at = ?, transporter_rejected_at = ?,
                 transporter_response_notes = COALESCE(?, transporter_response_notes),
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(next_status.as_str())
        .bind(next_booking.as_str())
        .bind(&now_str)
        .bind(accepted_at)
        .bind(rejected_at)
        .bind(&notes)
        .bind(&now_str)
        .bind(shipment_id.0)
        .execute(&mut *tx)
        .await?;

        insert_status_history(
            &mut tx,
            shipment_id,
            next_status,
            notes.as_deref(),
            Some(actor.user_id),
            &now_str,
        )
        .await?;

        let updated = load_shipment(&mut tx, shipment_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound("Shipment not found.".to_string()))?;

        tx.commit().await?;

        let requester = self.require_user(updated.user_id).await?;

        Ok(AssignmentOutcome::Direct { shipment: updated, requester })
    }

    // -----------------------------------------------------------------------
    // Driver assignment
    // -----------------------------------------------------------------------

    pub async fn assign_driver(
        &self,
        actor: &Actor,
        shipment_id: ShipmentId,
        assignment: DriverAssignment,
    ) -> Result<DriverOutcome, LifecycleError> {
        if assignment.driver_name.trim().is_empty()
            || assignment.driver_phone.trim().is_empty()
            || assignment.vehicle_type.trim().is_empty()
            || assignment.vehicle_registration.trim().is_empty()
        {
            return Err(LifecycleError::Validation(
                "Driver name, phone, vehicle type, and registration number are required."
                    .to_string(),
            ));
        }

        let shipment = self.require_shipment(shipment_id).await?;

        let authorized = policy::has_transporter_privileges(actor)
            || shipment
                .selected_vendor_id
                .is_some_and(|vendor_id| policy::can_act_for_vendor(actor, vendor_id));
        if !authorized {
            return Err(LifecycleError::Forbidden(
                "Shipment not assigned to your transporter profile.".to_string(),
            ));
        }

        let now_str = Utc::now().to_rfc3339();
        let history_note = format!(
            "Driver assigned: {} ({})",
            assignment.driver_name.trim(),
            assignment.vehicle_registration.trim()
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE shipment
             SET assigned_driver = ?, driver_phone = ?, vehicle_type = ?,
                 vehicle_registration = ?, driver_eta = COALESCE(?, driver_eta), updated_at = ?
             WHERE id = ?",
        )
        .bind(assignment.driver_name.trim())
        .bind(assignment.driver_phone.trim())
        .bind(assignment.vehicle_type.trim())
        .bind(assignment.vehicle_registration.trim())
        .bind(assignment.driver_eta.map(|eta| eta.to_rfc3339()))
        .bind(&now_str)
        .bind(shipment_id.0)
        .execute(&mut *tx)
        .await?;

        insert_status_history(
            &mut tx,
            shipment_id,
            shipment.status,
            Some(&history_note),
            Some(actor.user_id),
            &now_str,
        )
        .await?;

        let updated = load_shipment(&mut tx, shipment_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound("Shipment not found.".to_string()))?;

        tx.commit().await?;

        let requester = self.require_user(updated.user_id).await?;

        Ok(DriverOutcome { shipment: updated, requester })
    }

    // -----------------------------------------------------------------------
    // Reads with authorization
    // -----------------------------------------------------------------------

    pub async fn get_quote_request(
        &self,
        actor: &Actor,
        request_id: QuoteRequestId,
    ) -> Result<(QuoteRequest, Vec<QuoteResponse>), LifecycleError> {
        let request = self.require_request(request_id).await?;
        let requester = self.require_user(request.created_by_user_id).await?;

        let ownership = policy::QuoteOwnership {
            created_by_user_id: request.created_by_user_id,
            creator_company_id: requester.company_id,
        };
        if !policy::can_manage_quote(actor, ownership) {
            return Err(LifecycleError::Forbidden(
                "You are not allowed to view this quotation request.".to_string(),
            ));
        }

        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {QUOTE_RESPONSE_COLUMNS} FROM quote_response
             WHERE quote_request_id = ? ORDER BY created_at ASC"
        ))
        .bind(request_id.0)
        .fetch_all(&self.pool)
        .await?;
        let responses =
            rows.iter().map(row_to_quote_response).collect::<Result<Vec<_>, _>>()?;

        Ok((request, responses))
    }

    /// Vendor scope for the transporter surfaces: admins may pass an explicit
    /// vendor override (or none for all vendors); carriers are pinned to
    /// their own vendor link.
    pub fn transporter_vendor_scope(
        &self,
        actor: &Actor,
        vendor_override: Option<i64>,
    ) -> Result<Option<VendorId>, LifecycleError> {
        if policy::has_transporter_privileges(actor) {
            return Ok(vendor_override.map(VendorId));
        }
        match actor.vendor_id {
            Some(vendor_id) => Ok(Some(vendor_id)),
            None => Err(LifecycleError::Forbidden(
                "Transporter profile not linked to a vendor.".to_string(),
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Row loading helpers
    // -----------------------------------------------------------------------

    async fn require_response(
        &self,
        id: QuoteResponseId,
    ) -> Result<QuoteResponse, LifecycleError> {
        let row = sqlx::query(&format!(
            "SELECT {QUOTE_RESPONSE_COLUMNS} FROM quote_response WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(row_to_quote_response(row)?),
            None => Err(LifecycleError::NotFound("Quotation response not found.".to_string())),
        }
    }

    async fn require_request(&self, id: QuoteRequestId) -> Result<QuoteRequest, LifecycleError> {
        let row = sqlx::query(&format!(
            "SELECT {QUOTE_REQUEST_COLUMNS} FROM quote_request WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(row_to_quote_request(row)?),
            None => Err(LifecycleError::NotFound("Quotation request not found.".to_string())),
        }
    }

    async fn require_shipment(&self, id: ShipmentId) -> Result<Shipment, LifecycleError> {
        match self.find_shipment(id).await? {
            Some(shipment) => Ok(shipment),
            None => Err(LifecycleError::NotFound("Shipment not found.".to_string())),
        }
    }

    async fn find_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>, LifecycleError> {
        let row = sqlx::query(&format!("SELECT {SHIPMENT_COLUMNS} FROM shipment WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_shipment(row)?)),
            None => Ok(None),
        }
    }

    async fn require_user(&self, id: UserId) -> Result<User, LifecycleError> {
        let row = sqlx::query(
            "SELECT id, name, email, phone, role, company_id, vendor_id, is_active
             FROM app_user WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(row_to_user(row)?),
            None => Err(LifecycleError::NotFound("User account not found.".to_string())),
        }
    }

    async fn require_vendor(&self, id: VendorId) -> Result<Vendor, LifecycleError> {
        let row = sqlx::query(
            "SELECT id, name, email, phone, rating, is_active FROM vendor WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(row_to_vendor(row)?),
            None => Err(LifecycleError::NotFound("Transporter not found.".to_string())),
        }
    }

    async fn load_active_vendors(&self, ids: &[i64]) -> Result<Vec<Vendor>, LifecycleError> {
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, name, email, phone, rating, is_active FROM vendor
             WHERE is_active = 1 AND id IN ({placeholders})
             ORDER BY id ASC"
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_vendor).collect::<Result<Vec<_>, _>>()?)
    }
}

fn new_tracking_number() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("LH-{}", token[..12].to_ascii_uppercase())
}

async fn load_request(
    conn: &mut SqliteConnection,
    id: QuoteRequestId,
) -> Result<Option<QuoteRequest>, LifecycleError> {
    let row =
        sqlx::query(&format!("SELECT {QUOTE_REQUEST_COLUMNS} FROM quote_request WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&mut *conn)
            .await?;

    match row {
        Some(ref row) => Ok(Some(row_to_quote_request(row)?)),
        None => Ok(None),
    }
}

async fn load_response(
    conn: &mut SqliteConnection,
    id: QuoteResponseId,
) -> Result<Option<QuoteResponse>, LifecycleError> {
    let row =
        sqlx::query(&format!("SELECT {QUOTE_RESPONSE_COLUMNS} FROM quote_response WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&mut *conn)
            .await?;

    match row {
        Some(ref row) => Ok(Some(row_to_quote_response(row)?)),
        None => Ok(None),
    }
}

async fn load_responses_for_request(
    conn: &mut SqliteConnection,
    request_id: QuoteRequestId,
) -> Result<Vec<QuoteResponse>, LifecycleError> {
    let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
        "SELECT {QUOTE_RESPONSE_COLUMNS} FROM quote_response
         WHERE quote_request_id = ? ORDER BY created_at ASC, id ASC"
    ))
    .bind(request_id.0)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.iter().map(row_to_quote_response).collect::<Result<Vec<_>, _>>()?)
}

async fn load_shipment(
    conn: &mut SqliteConnection,
    id: ShipmentId,
) -> Result<Option<Shipment>, LifecycleError> {
    let row = sqlx::query(&format!("SELECT {SHIPMENT_COLUMNS} FROM shipment WHERE id = ?"))
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(ref row) => Ok(Some(row_to_shipment(row)?)),
        None => Ok(None),
    }
}

async fn load_shipment_for_response(
    conn: &mut SqliteConnection,
    response_id: QuoteResponseId,
) -> Result<Option<Shipment>, LifecycleError> {
    let row = sqlx::query(&format!(
        "SELECT {SHIPMENT_COLUMNS} FROM shipment WHERE transporter_quote_id = ?"
    ))
    .bind(response_id.0)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(ref row) => Ok(Some(row_to_shipment(row)?)),
        None => Ok(None),
    }
}

#[allow(clippy::too_many_arguments)]
async fn insert_consent_log(
    conn: &mut SqliteConnection,
    response_id: QuoteResponseId,
    shipment_id: Option<ShipmentId>,
    status_before: ConsentStatus,
    status_after: ConsentStatus,
    actor_type: ConsentActor,
    actor_id: Option<UserId>,
    note: Option<&str>,
    now_str: &str,
) -> Result<(), LifecycleError> {
    sqlx::query(
        "INSERT INTO consent_log (quote_response_id, shipment_id, status_before, status_after,
                                  actor_type, actor_id, note, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(response_id.0)
    .bind(shipment_id.map(|id| id.0))
    .bind(status_before.as_str())
    .bind(status_after.as_str())
    .bind(actor_type.as_str())
    .bind(actor_id.map(|id| id.0))
    .bind(note)
    .bind(now_str)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_status_history(
    conn: &mut SqliteConnection,
    shipment_id: ShipmentId,
    status: ShipmentStatus,
    notes: Option<&str>,
    updated_by: Option<UserId>,
    now_str: &str,
) -> Result<(), LifecycleError> {
    sqlx::query(
        "INSERT INTO status_history (shipment_id, status, notes, updated_by, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(shipment_id.0)
    .bind(status.as_str())
    .bind(notes)
    .bind(updated_by.map(|id| id.0))
    .bind(now_str)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use sqlx::Row;

    use lanehaul_core::domain::party::{Actor, Role, UserId, VendorId};
    use lanehaul_core::domain::quote::{QuoteRequestStatus, QuoteResponseId};
    use lanehaul_core::domain::response::{ConsentAction, ConsentStatus, QuoteResponseStatus};
    use lanehaul_core::domain::shipment::{AssignmentAction, BookingStatus, ShipmentStatus};

    use super::{
        AssignmentOutcome, BidCommand, BookingLifecycle, DriverAssignment, LifecycleError,
        NewQuoteRequest,
    };
    use crate::fixtures::{seed_shipment, seed_user, seed_vendor, seed_vendor_user, test_pool};

    async fn lifecycle() -> BookingLifecycle {
        BookingLifecycle::new(test_pool().await, 120)
    }

    fn shipper_actor(id: UserId) -> Actor {
        Actor::new(id, Role::Shipper, None, None)
    }

    fn carrier_actor(id: UserId, vendor: VendorId) -> Actor {
        Actor::new(id, Role::Transporter, None, Some(vendor))
    }

    fn new_request(vendor_ids: Vec<i64>) -> NewQuoteRequest {
        NewQuoteRequest {
            from_location: "Pune".to_string(),
            to_location: "Nagpur".to_string(),
            from_lat: Some(18.52),
            from_lng: Some(73.86),
            to_lat: Some(21.15),
            to_lng: Some(79.09),
            weight_kg: 1200.0,
            shipment_type: "FTL".to_string(),
            urgency: "STANDARD".to_string(),
            notes: Some("Fragile cargo".to_string()),
            vendor_ids,
        }
    }

    fn respond_command(price: i64) -> BidCommand {
        BidCommand::Respond {
            quoted_price: Decimal::new(price, 0),
            estimated_delivery: Utc::now() + Duration::days(3),
            notes: None,
        }
    }

    /// Seeds shipper + carrier, creates a request, and prices the bid.
    async fn responded_bid(
        lifecycle: &BookingLifecycle,
    ) -> (Actor, Actor, QuoteResponseId) {
        let pool = lifecycle.pool().clone();
        let shipper = seed_user(&pool, "Asha", "SHIPPER", None, None).await;
        let vendor = seed_vendor(&pool, "Sharma Logistics", true).await;
        let carrier = seed_vendor_user(&pool, "Ravi", vendor).await;

        let shipper = shipper_actor(shipper);
        let carrier = carrier_actor(carrier, vendor);

        let creation = lifecycle
            .create_quote_request(&shipper, new_request(vec![vendor.0]))
            .await
            .expect("create quote request");
        let response_id = creation.responses[0].id;

        lifecycle
            .respond_to_quote(&carrier, response_id, respond_command(1000))
            .await
            .expect("price the bid");

        (shipper, carrier, response_id)
    }

    async fn consent_log_count(lifecycle: &BookingLifecycle, response_id: QuoteResponseId) -> i64 {
        sqlx::query("SELECT COUNT(*) AS count FROM consent_log WHERE quote_response_id = ?")
            .bind(response_id.0)
            .fetch_one(lifecycle.pool())
            .await
            .expect("count consent logs")
            .get::<i64, _>("count")
    }

    #[tokio::test]
    async fn create_requires_known_active_vendors() {
        let lifecycle = lifecycle().await;
        let pool = lifecycle.pool().clone();
        let shipper = seed_user(&pool, "Asha", "SHIPPER", None, None).await;
        let inactive = seed_vendor(&pool, "Dormant Freight", false).await;

        let error = lifecycle
            .create_quote_request(&shipper_actor(shipper), new_request(vec![inactive.0]))
            .await
            .expect_err("inactive vendor should fail validation");
        assert!(matches!(error, LifecycleError::Validation(_)));

        let error = lifecycle
            .create_quote_request(&shipper_actor(shipper), new_request(vec![]))
            .await
            .expect_err("empty vendor list should fail validation");
        assert!(matches!(error, LifecycleError::Validation(_)));
    }

    #[tokio::test]
    async fn create_invites_one_response_per_vendor() {
        let lifecycle = lifecycle().await;
        let pool = lifecycle.pool().clone();
        let shipper = seed_user(&pool, "Asha", "SHIPPER", None, None).await;
        let first = seed_vendor(&pool, "Sharma Logistics", true).await;
        let second = seed_vendor(&pool, "Verma Freight", true).await;

        let creation = lifecycle
            .create_quote_request(
                &shipper_actor(shipper),
                new_request(vec![first.0, second.0, first.0]),
            )
            .await
            .expect("create quote request");

        assert_eq!(creation.request.status, QuoteRequestStatus::Pending);
        assert_eq!(creation.responses.len(), 2, "duplicate vendor ids should collapse");
        assert!(creation
            .responses
            .iter()
            .all(|response| response.status == QuoteResponseStatus::Pending));
    }

    #[tokio::test]
    async fn priced_bid_moves_request_to_responded() {
        let lifecycle = lifecycle().await;
        let (_, _, response_id) = responded_bid(&lifecycle).await;

        let response = lifecycle.require_response(response_id).await.expect("reload response");
        assert_eq!(response.status, QuoteResponseStatus::Responded);
        assert_eq!(response.quoted_price, Some(Decimal::new(1000, 0)));

        let request = lifecycle
            .require_request(response.quote_request_id)
            .await
            .expect("reload request");
        assert_eq!(request.status, QuoteRequestStatus::Responded);
    }

    #[tokio::test]
    async fn processed_bid_cannot_be_resubmitted() {
        let lifecycle = lifecycle().await;
        let (_, carrier, response_id) = responded_bid(&lifecycle).await;

        let error = lifecycle
            .respond_to_quote(&carrier, response_id, respond_command(900))
            .await
            .expect_err("second submission should be rejected");
        assert!(matches!(error, LifecycleError::InvalidState(_)));
    }

    #[tokio::test]
    async fn declining_every_bid_closes_the_request() {
        let lifecycle = lifecycle().await;
        let pool = lifecycle.pool().clone();
        let shipper = seed_user(&pool, "Asha", "SHIPPER", None, None).await;
        let first = seed_vendor(&pool, "Sharma Logistics", true).await;
        let second = seed_vendor(&pool, "Verma Freight", true).await;
        let first_user = seed_vendor_user(&pool, "Ravi", first).await;
        let second_user = seed_vendor_user(&pool, "Meena", second).await;

        let creation = lifecycle
            .create_quote_request(&shipper_actor(shipper), new_request(vec![first.0, second.0]))
            .await
            .expect("create quote request");

        let outcome = lifecycle
            .respond_to_quote(
                &carrier_actor(first_user, first),
                creation.responses[0].id,
                BidCommand::Decline { notes: None },
            )
            .await
            .expect("first decline");
        assert_eq!(outcome.request.status, QuoteRequestStatus::Pending);

        let outcome = lifecycle
            .respond_to_quote(
                &carrier_actor(second_user, second),
                creation.responses[1].id,
                BidCommand::Decline { notes: None },
            )
            .await
            .expect("second decline");
        assert_eq!(outcome.request.status, QuoteRequestStatus::Closed);
    }

    #[tokio::test]
    async fn a_responded_sibling_keeps_the_request_open_after_declines() {
        let lifecycle = lifecycle().await;
        let pool = lifecycle.pool().clone();
        let shipper = seed_user(&pool, "Asha", "SHIPPER", None, None).await;
        let first = seed_vendor(&pool, "Sharma Logistics", true).await;
        let second = seed_vendor(&pool, "Verma Freight", true).await;
        let first_user = seed_vendor_user(&pool, "Ravi", first).await;
        let second_user = seed_vendor_user(&pool, "Meena", second).await;

        let creation = lifecycle
            .create_quote_request(&shipper_actor(shipper), new_request(vec![first.0, second.0]))
            .await
            .expect("create quote request");

        lifecycle
            .respond_to_quote(
                &carrier_actor(second_user, second),
                creation.responses[1].id,
                respond_command(1500),
            )
            .await
            .expect("price second bid");

        let outcome = lifecycle
            .respond_to_quote(
                &carrier_actor(first_user, first),
                creation.responses[0].id,
                BidCommand::Decline { notes: None },
            )
            .await
            .expect("decline first bid");

        assert_eq!(outcome.request.status, QuoteRequestStatus::Responded);
    }

    #[tokio::test]
    async fn approval_creates_exactly_one_shipment() {
        let lifecycle = lifecycle().await;
        let (shipper, _, response_id) = responded_bid(&lifecycle).await;

        let approval =
            lifecycle.approve_response(&shipper, response_id).await.expect("approve");

        assert_eq!(approval.request.status, QuoteRequestStatus::Approved);
        assert_eq!(approval.request.approved_response_id, Some(response_id));
        assert_eq!(approval.response.status, QuoteResponseStatus::Approved);
        assert_eq!(approval.response.consent_status, ConsentStatus::Pending);
        assert!(approval.response.expires_at.is_some());
        assert_eq!(approval.shipment.status, ShipmentStatus::Requested);
        assert_eq!(approval.shipment.booking_status, BookingStatus::PendingTransporter);
        assert_eq!(approval.shipment.cost, Some(Decimal::new(1000, 0)));
        assert_eq!(approval.shipment.selected_vendor_id, Some(approval.vendor.id));
        assert_eq!(approval.request.shipment_id, Some(approval.shipment.id));

        // A PENDING->PENDING SYSTEM row documents shipment creation.
        assert_eq!(consent_log_count(&lifecycle, response_id).await, 1);

        // Second attempt conflicts and leaves a single shipment behind.
        let error = lifecycle
            .approve_response(&shipper, response_id)
            .await
            .expect_err("repeat approval should conflict");
        assert!(matches!(error, LifecycleError::Conflict(_)));

        let shipment_count =
            sqlx::query("SELECT COUNT(*) AS count FROM shipment")
                .fetch_one(lifecycle.pool())
                .await
                .expect("count shipments")
                .get::<i64, _>("count");
        assert_eq!(shipment_count, 1);
    }

    #[tokio::test]
    async fn approving_a_sibling_after_a_winner_conflicts() {
        let lifecycle = lifecycle().await;
        let pool = lifecycle.pool().clone();
        let shipper = seed_user(&pool, "Asha", "SHIPPER", None, None).await;
        let first = seed_vendor(&pool, "Sharma Logistics", true).await;
        let second = seed_vendor(&pool, "Verma Freight", true).await;
        let first_user = seed_vendor_user(&pool, "Ravi", first).await;
        let second_user = seed_vendor_user(&pool, "Meena", second).await;
        let shipper = shipper_actor(shipper);

        let creation = lifecycle
            .create_quote_request(&shipper, new_request(vec![first.0, second.0]))
            .await
            .expect("create quote request");

        lifecycle
            .respond_to_quote(
                &carrier_actor(first_user, first),
                creation.responses[0].id,
                respond_command(1000),
            )
            .await
            .expect("price first bid");
        lifecycle
            .respond_to_quote(
                &carrier_actor(second_user, second),
                creation.responses[1].id,
                respond_command(900),
            )
            .await
            .expect("price second bid");

        lifecycle
            .approve_response(&shipper, creation.responses[0].id)
            .await
            .expect("first approval wins");

        let error = lifecycle
            .approve_response(&shipper, creation.responses[1].id)
            .await
            .expect_err("sibling approval should conflict");
        assert!(matches!(error, LifecycleError::Conflict(_)));

        let request = lifecycle
            .require_request(creation.request.id)
            .await
            .expect("reload request");
        assert_eq!(request.approved_response_id, Some(creation.responses[0].id));
    }

    #[tokio::test]
    async fn approval_requires_a_priced_bid() {
        let lifecycle = lifecycle().await;
        let pool = lifecycle.pool().clone();
        let shipper = seed_user(&pool, "Asha", "SHIPPER", None, None).await;
        let vendor = seed_vendor(&pool, "Sharma Logistics", true).await;

        let creation = lifecycle
            .create_quote_request(&shipper_actor(shipper), new_request(vec![vendor.0]))
            .await
            .expect("create quote request");

        let error = lifecycle
            .approve_response(&shipper_actor(shipper), creation.responses[0].id)
            .await
            .expect_err("pending bid cannot be approved");
        assert!(matches!(error, LifecycleError::InvalidState(_)));
    }

    #[tokio::test]
    async fn approval_is_denied_to_unrelated_shippers() {
        let lifecycle = lifecycle().await;
        let (_, _, response_id) = responded_bid(&lifecycle).await;
        let stranger = seed_user(lifecycle.pool(), "Vikram", "SHIPPER", None, None).await;

        let error = lifecycle
            .approve_response(&shipper_actor(stranger), response_id)
            .await
            .expect_err("unrelated shipper should be rejected");
        assert!(matches!(error, LifecycleError::Forbidden(_)));
    }

    #[tokio::test]
    async fn full_round_trip_accept_confirms_the_booking() {
        let lifecycle = lifecycle().await;
        let (shipper, carrier, response_id) = responded_bid(&lifecycle).await;

        lifecycle.approve_response(&shipper, response_id).await.expect("approve");

        let outcome = lifecycle
            .submit_consent(&carrier, response_id, ConsentAction::Accept, None, None)
            .await
            .expect("accept consent");

        assert_eq!(outcome.recorded, ConsentStatus::Accepted);
        assert_eq!(outcome.response.consent_status, ConsentStatus::Accepted);
        assert!(outcome.response.consent_at.is_some());

        let shipment = outcome.shipment.expect("linked shipment");
        assert_eq!(shipment.booking_status, BookingStatus::Confirmed);
        assert!(shipment.transporter_accepted_at.is_some());
        assert_eq!(shipment.transporter_rejected_at, None);

        // Creation row plus the accept row.
        assert_eq!(consent_log_count(&lifecycle, response_id).await, 2);
    }

    #[tokio::test]
    async fn consent_decline_marks_the_booking_declined() {
        let lifecycle = lifecycle().await;
        let (shipper, carrier, response_id) = responded_bid(&lifecycle).await;

        lifecycle.approve_response(&shipper, response_id).await.expect("approve");

        let outcome = lifecycle
            .submit_consent(
                &carrier,
                response_id,
                ConsentAction::Decline,
                Some("No trucks available this week".to_string()),
                None,
            )
            .await
            .expect("decline consent");

        assert_eq!(outcome.recorded, ConsentStatus::Declined);
        let shipment = outcome.shipment.expect("linked shipment");
        assert_eq!(shipment.booking_status, BookingStatus::Declined);
        assert!(shipment.transporter_rejected_at.is_some());
        assert_eq!(shipment.transporter_accepted_at, None);
        assert_eq!(
            shipment.transporter_response_notes.as_deref(),
            Some("No trucks available this week")
        );
    }

    #[tokio::test]
    async fn decided_consent_conflicts_and_writes_no_new_log_rows() {
        let lifecycle = lifecycle().await;
        let (shipper, carrier, response_id) = responded_bid(&lifecycle).await;

        lifecycle.approve_response(&shipper, response_id).await.expect("approve");
        lifecycle
            .submit_consent(&carrier, response_id, ConsentAction::Accept, None, None)
            .await
            .expect("accept consent");

        let before = consent_log_count(&lifecycle, response_id).await;
        let error = lifecycle
            .submit_consent(&carrier, response_id, ConsentAction::Decline, None, None)
            .await
            .expect_err("second decision should conflict");
        assert!(matches!(error, LifecycleError::Conflict(_)));
        assert_eq!(consent_log_count(&lifecycle, response_id).await, before);
    }

    #[tokio::test]
    async fn consent_is_denied_to_other_vendors() {
        let lifecycle = lifecycle().await;
        let (shipper, _, response_id) = responded_bid(&lifecycle).await;
        lifecycle.approve_response(&shipper, response_id).await.expect("approve");

        let other_vendor = seed_vendor(lifecycle.pool(), "Verma Freight", true).await;
        let other_user = seed_vendor_user(lifecycle.pool(), "Arun", other_vendor).await;

        let error = lifecycle
            .submit_consent(
                &carrier_actor(other_user, other_vendor),
                response_id,
                ConsentAction::Accept,
                None,
                None,
            )
            .await
            .expect_err("other vendor should be rejected");
        assert!(matches!(error, LifecycleError::Forbidden(_)));
    }

    #[tokio::test]
    async fn late_submission_forces_expiry_before_the_action() {
        let lifecycle = lifecycle().await;
        let (shipper, carrier, response_id) = responded_bid(&lifecycle).await;
        lifecycle.approve_response(&shipper, response_id).await.expect("approve");

        let past = (Utc::now() - Duration::minutes(5)).to_rfc3339();
        sqlx::query("UPDATE quote_response SET expires_at = ? WHERE id = ?")
            .bind(&past)
            .bind(response_id.0)
            .execute(lifecycle.pool())
            .await
            .expect("backdate the deadline");

        let error = lifecycle
            .submit_consent(&carrier, response_id, ConsentAction::Accept, None, None)
            .await
            .expect_err("late accept should conflict");
        assert!(matches!(error, LifecycleError::Conflict(_)));

        let response = lifecycle.require_response(response_id).await.expect("reload response");
        assert_eq!(response.consent_status, ConsentStatus::Expired);

        let shipment_row = sqlx::query(
            "SELECT booking_status FROM shipment WHERE transporter_quote_id = ?",
        )
        .bind(response_id.0)
        .fetch_one(lifecycle.pool())
        .await
        .expect("load shipment");
        assert_eq!(shipment_row.get::<String, _>("booking_status"), "EXPIRED");

        let log_row = sqlx::query(
            "SELECT actor_type, status_after FROM consent_log
             WHERE quote_response_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(response_id.0)
        .fetch_one(lifecycle.pool())
        .await
        .expect("load last consent log");
        assert_eq!(log_row.get::<String, _>("actor_type"), "SYSTEM");
        assert_eq!(log_row.get::<String, _>("status_after"), "EXPIRED");
    }

    #[tokio::test]
    async fn sweep_expires_overdue_consents_with_the_same_semantics() {
        let lifecycle = lifecycle().await;
        let (shipper, _, response_id) = responded_bid(&lifecycle).await;
        lifecycle.approve_response(&shipper, response_id).await.expect("approve");

        let past = (Utc::now() - Duration::minutes(5)).to_rfc3339();
        sqlx::query("UPDATE quote_response SET expires_at = ? WHERE id = ?")
            .bind(&past)
            .bind(response_id.0)
            .execute(lifecycle.pool())
            .await
            .expect("backdate the deadline");

        let expired = lifecycle
            .expire_overdue_consents(Utc::now())
            .await
            .expect("sweep overdue consents");

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].response.consent_status, ConsentStatus::Expired);
        let shipment = expired[0].shipment.as_ref().expect("linked shipment");
        assert_eq!(shipment.booking_status, BookingStatus::Expired);

        let log_row = sqlx::query(
            "SELECT actor_type, status_before, status_after FROM consent_log
             WHERE quote_response_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(response_id.0)
        .fetch_one(lifecycle.pool())
        .await
        .expect("load last consent log");
        assert_eq!(log_row.get::<String, _>("actor_type"), "SYSTEM");
        assert_eq!(log_row.get::<String, _>("status_before"), "PENDING");
        assert_eq!(log_row.get::<String, _>("status_after"), "EXPIRED");

        // Second pass finds nothing left to expire.
        let again = lifecycle
            .expire_overdue_consents(Utc::now())
            .await
            .expect("second sweep");
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn assignment_response_routes_through_the_consent_machine() {
        let lifecycle = lifecycle().await;
        let (shipper, carrier, response_id) = responded_bid(&lifecycle).await;
        let approval = lifecycle.approve_response(&shipper, response_id).await.expect("approve");

        let outcome = lifecycle
            .respond_to_assignment(
                &carrier,
                approval.shipment.id,
                AssignmentAction::Accept,
                None,
            )
            .await
            .expect("assignment accept");

        match outcome {
            AssignmentOutcome::Consent(consent) => {
                assert_eq!(consent.recorded, ConsentStatus::Accepted);
                let shipment = consent.shipment.expect("linked shipment");
                assert_eq!(shipment.booking_status, BookingStatus::Confirmed);
            }
            AssignmentOutcome::Direct { .. } => {
                panic!("consent-gated shipment must use the consent machine")
            }
        }

        // The consent machine owns the write: the direct path never runs, so
        // a second settle attempt conflicts.
        let error = lifecycle
            .respond_to_assignment(
                &carrier,
                approval.shipment.id,
                AssignmentAction::Accept,
                None,
            )
            .await
            .expect_err("settled booking should conflict");
        assert!(matches!(error, LifecycleError::Conflict(_)));
    }

    #[tokio::test]
    async fn direct_assignment_path_applies_to_consent_free_shipments() {
        let lifecycle = lifecycle().await;
        let pool = lifecycle.pool().clone();
        let shipper = seed_user(&pool, "Asha", "SHIPPER", None, None).await;
        let vendor = seed_vendor(&pool, "Sharma Logistics", true).await;
        let carrier = seed_vendor_user(&pool, "Ravi", vendor).await;
        let shipment_id = seed_shipment(&pool, shipper, Some(vendor), "REQUESTED").await;

        let outcome = lifecycle
            .respond_to_assignment(
                &carrier_actor(carrier, vendor),
                shipment_id,
                AssignmentAction::Accept,
                Some("Truck ready".to_string()),
            )
            .await
            .expect("direct accept");

        match outcome {
            AssignmentOutcome::Direct { shipment, .. } => {
                assert_eq!(shipment.status, ShipmentStatus::Accepted);
                assert_eq!(shipment.booking_status, BookingStatus::Confirmed);
                assert!(shipment.transporter_accepted_at.is_some());
            }
            AssignmentOutcome::Consent(_) => {
                panic!("consent-free shipment must use the direct path")
            }
        }

        let history_count = sqlx::query(
            "SELECT COUNT(*) AS count FROM status_history WHERE shipment_id = ?",
        )
        .bind(shipment_id.0)
        .fetch_one(&pool)
        .await
        .expect("count history rows")
        .get::<i64, _>("count");
        assert_eq!(history_count, 1);

        let error = lifecycle
            .respond_to_assignment(
                &carrier_actor(carrier, vendor),
                shipment_id,
                AssignmentAction::Reject,
                None,
            )
            .await
            .expect_err("settled shipment no longer accepts responses");
        assert!(matches!(error, LifecycleError::InvalidState(_)));
    }

    #[tokio::test]
    async fn driver_assignment_records_details_and_history() {
        let lifecycle = lifecycle().await;
        let pool = lifecycle.pool().clone();
        let shipper = seed_user(&pool, "Asha", "SHIPPER", None, None).await;
        let vendor = seed_vendor(&pool, "Sharma Logistics", true).await;
        let carrier = seed_vendor_user(&pool, "Ravi", vendor).await;
        let shipment_id = seed_shipment(&pool, shipper, Some(vendor), "ACCEPTED").await;

        let outcome = lifecycle
            .assign_driver(
                &carrier_actor(carrier, vendor),
                shipment_id,
                DriverAssignment {
                    driver_name: "Suresh Kumar".to_string(),
                    driver_phone: "+91-98111-22222".to_string(),
                    vehicle_type: "32ft Container".to_string(),
                    vehicle_registration: "MH-12-AB-1234".to_string(),
                    driver_eta: None,
                },
            )
            .await
            .expect("assign driver");

        assert_eq!(outcome.shipment.assigned_driver.as_deref(), Some("Suresh Kumar"));
        assert_eq!(outcome.shipment.vehicle_registration.as_deref(), Some("MH-12-AB-1234"));

        let history_note = sqlx::query(
            "SELECT notes FROM status_history WHERE shipment_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(shipment_id.0)
        .fetch_one(&pool)
        .await
        .expect("load history")
        .get::<String, _>("notes");
        assert!(history_note.contains("Suresh Kumar"));
    }

    #[tokio::test]
    async fn consent_history_is_scoped_to_stakeholders() {
        let lifecycle = lifecycle().await;
        let (shipper, carrier, response_id) = responded_bid(&lifecycle).await;
        lifecycle.approve_response(&shipper, response_id).await.expect("approve");
        lifecycle
            .submit_consent(&carrier, response_id, ConsentAction::Accept, None, None)
            .await
            .expect("accept consent");

        let history = lifecycle
            .consent_history(&carrier, response_id)
            .await
            .expect("carrier reads history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status_after, ConsentStatus::Accepted);
        assert!(history[0].created_at >= history[1].created_at);

        let stranger = seed_user(lifecycle.pool(), "Vikram", "SHIPPER", None, None).await;
        let error = lifecycle
            .consent_history(&shipper_actor(stranger), response_id)
            .await
            .expect_err("stranger should be rejected");
        assert!(matches!(error, LifecycleError::Forbidden(_)));
    }
}
