//! Audit submission and lookup endpoints

use super::{AppState, form::FormData};
use crate::{
    core::audit::{self, AuditSubmission, CorrectiveActionSubmission, RecordedAudit},
    entities::audit::Model as AuditModel,
    errors::{Error, Result},
};
use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
};

/// POST /api/audits
///
/// Multipart fields: `token_id`, `status`, `description`, `auditor_name`,
/// `action_completed` and an optional `photo` file.
pub async fn submit_audit(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<RecordedAudit>)> {
    let mut form = FormData::read(multipart).await?;

    let submission = AuditSubmission {
        token_id: form.required_i64("token_id")?,
        status: form.required("status")?.to_string(),
        description: form.required("description")?.to_string(),
        auditor_name: form.text("auditor_name").map(str::to_string),
        action_completed: form.flag("action_completed"),
        photo: form.take_file("photo"),
    };

    let recorded = audit::record_audit(&state.db, &state.photos, submission).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

/// POST /api/audits/:id/corrective-action
///
/// Multipart fields: `description`, `resolved` and an optional `photo` file.
pub async fn submit_corrective_action(
    State(state): State<AppState>,
    Path(audit_id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<RecordedAudit>> {
    let mut form = FormData::read(multipart).await?;

    let submission = CorrectiveActionSubmission {
        audit_id,
        description: form.required("description")?.to_string(),
        resolved: form.flag("resolved"),
        photo: form.take_file("photo"),
    };

    audit::record_corrective_action(&state.db, &state.photos, submission)
        .await
        .map(Json)
}

/// GET /api/audits/:id
pub async fn get_audit(
    State(state): State<AppState>,
    Path(audit_id): Path<i64>,
) -> Result<Json<AuditModel>> {
    audit::get_audit_by_id(&state.db, audit_id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("audit", audit_id))
}

/// GET /api/audit_data/:machine_id/:question_id
///
/// Latest audit for one machine/question pair.
pub async fn audit_data(
    State(state): State<AppState>,
    Path((machine_id, question_id)): Path<(i64, i64)>,
) -> Result<Json<AuditModel>> {
    audit::latest_audit_for_pair(&state.db, machine_id, question_id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("audit", format!("{machine_id}/{question_id}")))
}

/// Build audit routes
pub fn audit_routes() -> Router<AppState> {
    Router::new()
        .route("/api/audits", post(submit_audit))
        .route("/api/audits/:id", get(get_audit))
        .route(
            "/api/audits/:id/corrective-action",
            post(submit_corrective_action),
        )
        .route(
            "/api/audit_data/:machine_id/:question_id",
            get(audit_data),
        )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use crate::api::test_support::*;
    use crate::config::Settings;
    use crate::core::pairing;
    use axum::http::StatusCode;
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn test_submit_audit_and_replay() {
        let (app, state, dir) = test_app(Settings::default()).await;
        let token = pairing::next_pair(&state.db).await.unwrap().unwrap();
        let token_id = token.id.to_string();
        let fields = [
            ("token_id", token_id.as_str()),
            ("status", "nok"),
            ("description", "Rozlany olej pod maszyną"),
            ("auditor_name", "Kowalski"),
        ];

        let response = app
            .clone()
            .oneshot(post_form("/api/audits", &fields, Some(("olej.jpg", &b"jpegdata"[..]))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(response).await;
        assert_eq!(body["audit"]["status"], "NOK");
        assert_eq!(body["audit"]["audit_sequence"], 1);
        assert_eq!(body["audit"]["action_completed"], false);
        assert!(body["photo_warning"].is_null());
        let photo = body["audit"]["photo_path"].as_str().unwrap();
        let stored = dir.path().join(photo.trim_start_matches("uploads/"));
        assert!(stored.exists());

        let replay = app
            .oneshot(post_form("/api/audits", &fields, None))
            .await
            .unwrap();
        assert_eq!(replay.status(), StatusCode::CONFLICT);
        assert!(json_body(replay).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_submit_audit_validation() {
        let (app, state, _dir) = test_app(Settings::default()).await;
        let token = pairing::next_pair(&state.db).await.unwrap().unwrap();
        let token_id = token.id.to_string();

        let response = app
            .clone()
            .oneshot(post_form(
                "/api/audits",
                &[
                    ("token_id", token_id.as_str()),
                    ("status", "MAYBE"),
                    ("description", "opis"),
                ],
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_form(
                "/api/audits",
                &[("token_id", token_id.as_str()), ("status", "OK")],
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Token is still open after rejected submissions
        let open = pairing::get_token_by_id(&state.db, token.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!open.consumed);
    }

    #[tokio::test]
    async fn test_corrective_action_and_lookup() {
        let (app, state, _dir) = test_app(Settings::default()).await;
        let audit = crate::test_utils::record_test_audit(&state.db, "NOK")
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(post_form(
                &format!("/api/audits/{}/corrective-action", audit.id),
                &[("description", "Posprzątano"), ("resolved", "on")],
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["audit"]["action_completed"], true);
        assert_eq!(body["audit"]["action_description"], "Posprzątano");
        assert!(body["audit"]["resolved_at"].is_string());

        let uri = format!("/api/audit_data/{}/{}", audit.machine_id, audit.question_id);
        let body = json_body(app.clone().oneshot(get(&uri)).await.unwrap()).await;
        assert_eq!(body["id"], audit.id);

        let missing = app
            .oneshot(post_form(
                "/api/audits/9999/corrective-action",
                &[("description", "nic")],
                None,
            ))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
