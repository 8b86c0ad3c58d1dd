//! `GET /api/v1/notifications` - the caller's in-app notification feed,
//! newest first.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use lanehaul_db::repositories::NotificationRepository;

use crate::auth::AuthUser;
use crate::bootstrap::AppState;
use crate::dto::NotificationDto;
use crate::error::ApiError;

pub fn router(state: AppState) -> Router {
    Router::new().route("/api/v1/notifications", get(list_notifications)).with_state(state)
}

async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let notifications = state.notifications.list_for_user(actor.user_id).await?;

    Ok(Json(json!({
        "notifications": notifications.iter().map(NotificationDto::from).collect::<Vec<_>>(),
    })))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use lanehaul_core::domain::party::{Actor, Role};
    use lanehaul_db::fixtures::seed_user;
    use lanehaul_db::repositories::{NotificationRepository, SqlNotificationRepository};
    use lanehaul_db::NewNotification;

    use crate::bootstrap::router;
    use crate::test_support::{bearer, call, test_state};

    #[tokio::test]
    async fn feed_returns_only_the_callers_rows() {
        let (state, context) = test_state().await;
        let pool = state.db_pool.clone();

        let first = seed_user(&pool, "Asha", "SHIPPER", None, None).await;
        let second = seed_user(&pool, "Vikram", "SHIPPER", None, None).await;

        let repo = SqlNotificationRepository::new(pool);
        for (user, title) in [(first, "Booking confirmed"), (second, "Quotation declined")] {
            repo.create(NewNotification {
                user_id: user,
                title: title.to_string(),
                message: "details".to_string(),
                kind: "system".to_string(),
                metadata: None,
            })
            .await
            .expect("seed notification");
        }

        let app = router(state);
        let token = bearer(&context, &Actor::new(first, Role::Shipper, None, None));
        let (status, body) =
            call(app, Method::GET, "/api/v1/notifications", Some(&token), None).await;

        assert_eq!(status, StatusCode::OK);
        let notifications = body["notifications"].as_array().expect("notifications");
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0]["title"], "Booking confirmed");

        context.dispatcher_task.abort();
    }
}
