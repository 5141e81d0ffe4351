use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    Form, Json,
};

use crate::export;
use crate::models::{EditFieldForm, KeypairIdForm, KeypairsPage, NewKeypairForm, Notice};
use crate::repo::{KeypairChanges, NewKeypair};
use crate::routes::auth;
use crate::scanner::ScanError;
use crate::state::AppState;
use crate::validation;

const LIST_PATH: &str = "/api/keypairs";
const SUCCESS: &str = "Successful.";
const SCAN_BUSY: &str = "Please try again at a later time. Sorry for the inconvenience.";

fn db_error(context: &str, e: sea_orm::DbErr) -> (StatusCode, String) {
    tracing::error!("{context}: {e}");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}"))
}

/// GET /api/keypairs — every keypair plus any notices waiting for this operator
pub async fn list_keypairs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<KeypairsPage>, (StatusCode, String)> {
    let claims = auth::extract_claims(&state.jwt_secret, &headers)?;

    let keypairs = state
        .keypairs
        .find_all()
        .await
        .map_err(|e| db_error("Failed to list keypairs", e))?;

    Ok(Json(KeypairsPage {
        keypairs,
        notices: state.flash.take(&claims.sub),
    }))
}

/// POST /api/keypairs/scan — block until a tag is read, return its UID
pub async fn scan_rfid(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<String, (StatusCode, String)> {
    auth::extract_claims(&state.jwt_secret, &headers)?;

    match state.scanner.begin_scan().await {
        Ok(uid) => Ok(uid),
        Err(ScanError::Busy) => {
            tracing::warn!("Rejected scan request: reader busy");
            Err((StatusCode::BAD_REQUEST, SCAN_BUSY.into()))
        }
        Err(e) => {
            tracing::error!("RFID scan failed: {e}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("Scan failed: {e}")))
        }
    }
}

/// POST /api/keypairs — create a keypair, reporting the outcome as notices
pub async fn new_keypair(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<NewKeypairForm>,
) -> Result<Redirect, (StatusCode, String)> {
    let claims = auth::extract_claims(&state.jwt_secret, &headers)?;

    let errors = validation::new_keypair_errors(&form.pin, &form.rfid_uid);
    if !errors.is_empty() {
        for message in errors {
            state.flash.push(&claims.sub, Notice::error(message));
        }
        return Ok(Redirect::to(LIST_PATH));
    }

    let kp = state
        .keypairs
        .create(NewKeypair {
            name: form.name,
            pin: form.pin,
            rfid_uid: form.rfid_uid,
        })
        .await
        .map_err(|e| db_error("Failed to create keypair", e))?;

    tracing::info!("Created keypair {} ({})", kp.id, kp.name);
    state.flash.push(&claims.sub, Notice::success("Pair addition successful."));
    Ok(Redirect::to(LIST_PATH))
}

/// POST /api/keypairs/name
pub async fn edit_keypair_name(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<EditFieldForm>,
) -> Result<&'static str, (StatusCode, String)> {
    auth::extract_claims(&state.jwt_secret, &headers)?;

    state
        .keypairs
        .update_fields(form.kid, KeypairChanges::name(form.value))
        .await
        .map_err(|e| db_error("Failed to update keypair name", e))?;

    Ok(SUCCESS)
}

/// POST /api/keypairs/pin — same PIN rule as creation
pub async fn edit_keypair_pin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<EditFieldForm>,
) -> Result<&'static str, (StatusCode, String)> {
    let claims = auth::extract_claims(&state.jwt_secret, &headers)?;

    if !validation::is_valid_pin(&form.value) {
        state.flash.push(&claims.sub, Notice::error(validation::INVALID_PIN));
        return Err((StatusCode::BAD_REQUEST, "Invalid PIN".into()));
    }

    state
        .keypairs
        .update_fields(form.kid, KeypairChanges::pin(form.value))
        .await
        .map_err(|e| db_error("Failed to update keypair PIN", e))?;

    Ok(SUCCESS)
}

/// POST /api/keypairs/uid — no emptiness check, unlike creation
pub async fn edit_keypair_uid(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<EditFieldForm>,
) -> Result<&'static str, (StatusCode, String)> {
    auth::extract_claims(&state.jwt_secret, &headers)?;

    state
        .keypairs
        .update_fields(form.kid, KeypairChanges::rfid_uid(form.value))
        .await
        .map_err(|e| db_error("Failed to update keypair UID", e))?;

    Ok(SUCCESS)
}

/// POST /api/keypairs/delete — succeeds whether or not the keypair existed
pub async fn delete_keypair(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<KeypairIdForm>,
) -> Result<&'static str, (StatusCode, String)> {
    auth::extract_claims(&state.jwt_secret, &headers)?;

    let rows = state
        .keypairs
        .delete(form.kid)
        .await
        .map_err(|e| db_error("Failed to delete keypair", e))?;

    if rows > 0 {
        tracing::info!("Deleted keypair {}", form.kid);
    }
    Ok(SUCCESS)
}

/// POST /api/keypairs/toggle-active — 404 when the keypair does not exist.
/// A missing id is reported as not found rather than as a server error; the
/// status is pending a product-owner decision.
pub async fn toggle_keypair_active(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<KeypairIdForm>,
) -> Result<&'static str, (StatusCode, String)> {
    auth::extract_claims(&state.jwt_secret, &headers)?;

    // Read-modify-write without a transaction: concurrent toggles may collapse.
    let kp = state
        .keypairs
        .find_by_id(form.kid)
        .await
        .map_err(|e| db_error("Failed to find keypair", e))?
        .ok_or((StatusCode::NOT_FOUND, "Keypair not found".into()))?;

    state
        .keypairs
        .update_fields(kp.id, KeypairChanges::is_active(!kp.is_active))
        .await
        .map_err(|e| db_error("Failed to toggle keypair", e))?;

    tracing::info!("Keypair {} is now {}", kp.id, if kp.is_active { "inactive" } else { "active" });
    Ok(SUCCESS)
}

/// GET /api/keypairs/export.pdf — printable table of every keypair
pub async fn export_pdf(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth::extract_claims(&state.jwt_secret, &headers)?;

    let keypairs = state
        .keypairs
        .find_all()
        .await
        .map_err(|e| db_error("Failed to load keypairs for export", e))?;

    let bytes = export::render_pdf(&export::build_table(&keypairs)).map_err(|e| {
        tracing::error!("Failed to render keypair export: {e}");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export::EXPORT_FILENAME),
            ),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::Router;
    use tower::ServiceExt;

    use crate::models::{Keypair, NoticeLevel};
    use crate::routes::router;
    use crate::routes::testing::{bearer, test_state, test_state_with_reader, TEST_TAG};
    use crate::scanner::tests::GatedReader;

    const OPERATOR: &str = "op-1";

    fn form_post(state: &AppState, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("authorization", bearer(state, OPERATOR))
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn authed_get(state: &AppState, uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("authorization", bearer(state, OPERATOR))
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn seed(state: &AppState, name: &str, pin: &str, uid: &str) -> Keypair {
        state
            .keypairs
            .create(NewKeypair {
                name: name.into(),
                pin: pin.into(),
                rfid_uid: uid.into(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let state = test_state().await;
        let app = router(state);

        let req = Request::builder().uri("/api/keypairs").body(Body::empty()).unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_valid_keypair() {
        let state = test_state().await;
        let app = router(state.clone());

        let res = app
            .clone()
            .oneshot(form_post(&state, "/api/keypairs", "name=Alice&pin=1234&rfid_uid=04A1B2C3"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()["location"], LIST_PATH);

        let stored = state.keypairs.find_all().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "Alice");
        assert!(stored[0].is_active);

        let (status, body) = send(&app, authed_get(&state, "/api/keypairs")).await;
        assert_eq!(status, StatusCode::OK);
        let page: KeypairsPage = serde_json::from_slice(&body).unwrap();
        assert_eq!(page.keypairs.len(), 1);
        assert_eq!(page.notices, vec![Notice::success("Pair addition successful.")]);

        // Notices are shown once
        let (_, body) = send(&app, authed_get(&state, "/api/keypairs")).await;
        let page: KeypairsPage = serde_json::from_slice(&body).unwrap();
        assert!(page.notices.is_empty());
    }

    #[tokio::test]
    async fn test_create_with_empty_uid_never_writes() {
        let state = test_state().await;
        let app = router(state.clone());

        let res = app
            .clone()
            .oneshot(form_post(&state, "/api/keypairs", "name=Alice&pin=1234&rfid_uid="))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert!(state.keypairs.find_all().await.unwrap().is_empty());

        let notices = state.flash.take(OPERATOR);
        assert_eq!(notices, vec![Notice::error(validation::EMPTY_RFID_UID)]);
    }

    #[tokio::test]
    async fn test_create_reports_both_validation_failures() {
        let state = test_state().await;
        let app = router(state.clone());

        let (status, _) = send(&app, form_post(&state, "/api/keypairs", "name=Alice&pin=12a&rfid_uid=")).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert!(state.keypairs.find_all().await.unwrap().is_empty());

        let notices = state.flash.take(OPERATOR);
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|n| n.level == NoticeLevel::Error));
        assert_ne!(notices[0].message, notices[1].message);
    }

    #[tokio::test]
    async fn test_edit_pin() {
        let state = test_state().await;
        let app = router(state.clone());
        let kp = seed(&state, "Alice", "1234", "04A1B2C3").await;

        let (status, body) = send(&app, form_post(&state, "/api/keypairs/pin", &format!("kid={}&value=0000", kp.id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, SUCCESS.as_bytes());
        assert_eq!(state.keypairs.find_by_id(kp.id).await.unwrap().unwrap().pin, "0000");

        let (status, body) = send(&app, form_post(&state, "/api/keypairs/pin", &format!("kid={}&value=000", kp.id))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, b"Invalid PIN");
        assert_eq!(state.keypairs.find_by_id(kp.id).await.unwrap().unwrap().pin, "0000");
        assert_eq!(state.flash.take(OPERATOR), vec![Notice::error(validation::INVALID_PIN)]);
    }

    #[tokio::test]
    async fn test_edit_name_and_uid() {
        let state = test_state().await;
        let app = router(state.clone());
        let kp = seed(&state, "Alice", "", "04A1B2C3").await;

        let (status, _) = send(&app, form_post(&state, "/api/keypairs/name", &format!("kid={}&value=Alice+Smith", kp.id))).await;
        assert_eq!(status, StatusCode::OK);
        // An empty UID is accepted on edit
        let (status, _) = send(&app, form_post(&state, "/api/keypairs/uid", &format!("kid={}&value=", kp.id))).await;
        assert_eq!(status, StatusCode::OK);

        let stored = state.keypairs.find_by_id(kp.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Alice Smith");
        assert_eq!(stored.rfid_uid, "");
    }

    #[tokio::test]
    async fn test_edit_missing_keypair_is_noop() {
        let state = test_state().await;
        let app = router(state.clone());

        let (status, body) = send(&app, form_post(&state, "/api/keypairs/name", "kid=99&value=Ghost")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, SUCCESS.as_bytes());
        assert!(state.keypairs.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let state = test_state().await;
        let app = router(state.clone());
        let kp = seed(&state, "Alice", "", "04A1B2C3").await;

        let existing = send(&app, form_post(&state, "/api/keypairs/delete", &format!("kid={}", kp.id))).await;
        let missing = send(&app, form_post(&state, "/api/keypairs/delete", &format!("kid={}", kp.id))).await;

        assert_eq!(existing, (StatusCode::OK, SUCCESS.as_bytes().to_vec()));
        assert_eq!(existing, missing);
        assert!(state.keypairs.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_active_flips_back_and_forth() {
        let state = test_state().await;
        let app = router(state.clone());
        let kp = seed(&state, "Alice", "", "04A1B2C3").await;
        let body = format!("kid={}", kp.id);

        let (status, _) = send(&app, form_post(&state, "/api/keypairs/toggle-active", &body)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!state.keypairs.find_by_id(kp.id).await.unwrap().unwrap().is_active);

        send(&app, form_post(&state, "/api/keypairs/toggle-active", &body)).await;
        assert!(state.keypairs.find_by_id(kp.id).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_toggle_missing_keypair_is_not_found() {
        let state = test_state().await;
        let app = router(state.clone());

        let (status, _) = send(&app, form_post(&state, "/api/keypairs/toggle-active", "kid=7")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_scan_returns_tag_as_text() {
        let state = test_state().await;
        let app = router(state.clone());

        let (status, body) = send(&app, form_post(&state, "/api/keypairs/scan", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, TEST_TAG.as_bytes());
    }

    #[tokio::test]
    async fn test_scan_while_busy_asks_to_retry() {
        let (reader, tx) = GatedReader::new();
        let state = test_state_with_reader(reader.clone()).await;
        let app = router(state.clone());

        let first = tokio::spawn(app.clone().oneshot(form_post(&state, "/api/keypairs/scan", "")));
        while reader.calls() == 0 {
            tokio::task::yield_now().await;
        }

        let (status, body) = send(&app, form_post(&state, "/api/keypairs/scan", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, SCAN_BUSY.as_bytes());
        assert_eq!(reader.calls(), 1);

        tx.send("04D4E5F6".to_string()).unwrap();
        let res = first.await.unwrap().unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"04D4E5F6");
    }

    #[tokio::test]
    async fn test_export_is_pdf_attachment() {
        let state = test_state().await;
        let app = router(state.clone());
        seed(&state, "Alice", "", "04A1B2C3").await;
        let bob = seed(&state, "Bob", "", "04D4E5F6").await;
        state
            .keypairs
            .update_fields(bob.id, KeypairChanges::is_active(false))
            .await
            .unwrap();

        let res = app
            .oneshot(authed_get(&state, "/api/keypairs/export.pdf"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"forkpi_keypairs.pdf\""
        );
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert!(body.starts_with(b"%PDF"));
    }
}
