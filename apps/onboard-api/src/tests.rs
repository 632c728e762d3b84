//! HTTP endpoint integration tests using axum-test

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use lopdf::{dictionary, Document, Object, Stream};
use onboard_pdf::{page_count, FieldOffsets};
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

use crate::app;
use crate::jwt::issue_token;
use crate::models::DbUser;
use crate::state::AppState;
use crate::store::{MemoryStore, OnboardStore};

const TEST_SECRET: &str = "test-secret-key-for-jwt-signing";

struct Harness {
    server: TestServer,
    store: Arc<MemoryStore>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::with_store(
        store.clone() as Arc<dyn OnboardStore>,
        TEST_SECRET.to_string(),
        FieldOffsets::builtin(),
    );
    Harness {
        server: TestServer::new(app(Arc::new(state))).unwrap(),
        store,
    }
}

async fn user_with_role(store: &MemoryStore, role: Option<&str>) -> String {
    let id = Uuid::new_v4().to_string();
    store
        .insert_user(DbUser {
            id: id.clone(),
            email: Some("jane.doe@example.com".to_string()),
            name: None,
            role: role.map(str::to_string),
        })
        .await;
    id
}

fn bearer(user_id: &str) -> (HeaderName, HeaderValue) {
    let token = issue_token(user_id, TEST_SECRET, 3600);
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    )
}

/// PDF with `pages` pages, each showing `label`
fn pdf_bytes(pages: u32, label: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for n in 1..=pages {
        let content = format!("BT /F1 12 Tf 50 700 Td ({}-{}) Tj ET", label, n);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

#[tokio::test]
async fn test_health_returns_200() {
    let h = harness();
    let response = h.server.get("/health").await;
    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "onboard-api");
}

#[tokio::test]
async fn test_admin_pdf_requires_token() {
    let h = harness();
    let response = h
        .server
        .get(&format!("/api/admin/user-pdf?user_id={}", Uuid::new_v4()))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], 401);
}

#[tokio::test]
async fn test_forged_token_rejected() {
    let h = harness();
    let caller = user_with_role(&h.store, Some("admin")).await;
    let token = issue_token(&caller, "some-other-secret", 3600);

    let response = h
        .server
        .get(&format!("/api/admin/user-pdf?user_id={}", caller))
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        )
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_employee_cannot_read_packets() {
    let h = harness();
    let caller = user_with_role(&h.store, Some("employee")).await;
    let (name, value) = bearer(&caller);

    let response = h
        .server
        .get(&format!("/api/admin/user-pdf?user_id={}", caller))
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_user_without_role_is_forbidden() {
    let h = harness();
    let caller = user_with_role(&h.store, None).await;
    let (name, value) = bearer(&caller);

    let response = h
        .server
        .get(&format!("/api/admin/user-pdf?user_id={}", caller))
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_missing_user_id_is_bad_request() {
    let h = harness();
    let caller = user_with_role(&h.store, Some("hr")).await;
    let (name, value) = bearer(&caller);

    let response = h
        .server
        .get("/api/admin/user-pdf")
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_document_filter_is_bad_request() {
    let h = harness();
    let caller = user_with_role(&h.store, Some("hr")).await;
    let (name, value) = bearer(&caller);

    let response = h
        .server
        .get(&format!(
            "/api/admin/user-pdf?user_id={}&document=paystub",
            Uuid::new_v4()
        ))
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_staff_gets_404_when_nothing_stored() {
    let h = harness();
    let caller = user_with_role(&h.store, Some("exec")).await;
    let (name, value) = bearer(&caller);

    let response = h
        .server
        .get(&format!("/api/admin/user-pdf?user_id={}", Uuid::new_v4()))
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_then_staff_download_merges_documents() {
    let h = harness();
    let employee = user_with_role(&h.store, Some("employee")).await;
    h.store.set_profile_name(&employee, "Jane Q. Doe").await;
    let reviewer = user_with_role(&h.store, Some("background_checker")).await;

    let (name, value) = bearer(&employee);
    let upload = h
        .server
        .post("/api/onboarding/pdf")
        .add_header(name, value)
        .json(&json!({
            "waiver_pdf_data": BASE64.encode(pdf_bytes(2, "waiver")),
            "disclosure_pdf_data": format!(
                "data:application/pdf;base64,{}",
                BASE64.encode(pdf_bytes(1, "disclosure"))
            ),
            "signature": "Jane Doe",
            "signature_type": "type",
        }))
        .await;
    upload.assert_status_ok();
    let json = upload.json::<serde_json::Value>();
    assert_eq!(json["success"], true);
    assert_eq!(json["stored"], json!(["waiver", "disclosure"]));

    let (name, value) = bearer(&reviewer);
    let response = h
        .server
        .get(&format!("/api/admin/user-pdf?user_id={}", employee))
        .add_header(name, value)
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.header(header::CONTENT_TYPE),
        HeaderValue::from_static("application/pdf")
    );
    assert_eq!(
        response.header(header::CONTENT_DISPOSITION).to_str().unwrap(),
        format!("inline; filename=\"onboarding-{}.pdf\"", employee)
    );

    let bytes = response.as_bytes().to_vec();
    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(page_count(&bytes).unwrap(), 3);
}

#[tokio::test]
async fn test_embed_signature_flag_accepts_common_spellings() {
    let h = harness();
    let employee = user_with_role(&h.store, Some("employee")).await;
    let reviewer = user_with_role(&h.store, Some("hr")).await;

    let (name, value) = bearer(&employee);
    h.server
        .post("/api/onboarding/pdf")
        .add_header(name, value)
        .json(&json!({ "waiver_pdf_data": BASE64.encode(pdf_bytes(1, "waiver")) }))
        .await
        .assert_status_ok();

    for flag in ["1", "yes", "0", "off"] {
        let (name, value) = bearer(&reviewer);
        h.server
            .get(&format!(
                "/api/admin/user-pdf?user_id={}&embed_signature={}",
                employee, flag
            ))
            .add_header(name, value)
            .await
            .assert_status_ok();
    }

    let (name, value) = bearer(&reviewer);
    let response = h
        .server
        .get(&format!(
            "/api/admin/user-pdf?user_id={}&embed_signature=maybe",
            employee
        ))
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], 400);
    assert!(json["error"].as_str().unwrap().contains("embed_signature"));
}

#[tokio::test]
async fn test_uppercase_user_id_finds_stored_packet() {
    let h = harness();
    let employee = user_with_role(&h.store, Some("employee")).await;
    let reviewer = user_with_role(&h.store, Some("admin")).await;

    let (name, value) = bearer(&employee);
    h.server
        .post("/api/onboarding/pdf")
        .add_header(name, value)
        .json(&json!({ "addon_pdf_data": BASE64.encode(pdf_bytes(1, "addon")) }))
        .await
        .assert_status_ok();

    let (name, value) = bearer(&reviewer);
    let response = h
        .server
        .get(&format!(
            "/api/admin/user-pdf?user_id={}",
            employee.to_uppercase()
        ))
        .add_header(name, value)
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.header(header::CONTENT_DISPOSITION).to_str().unwrap(),
        format!("inline; filename=\"onboarding-{}.pdf\"", employee)
    );
}

#[tokio::test]
async fn test_typed_resign_clears_drawn_tag() {
    let h = harness();
    let employee = user_with_role(&h.store, Some("employee")).await;

    let (name, value) = bearer(&employee);
    h.server
        .post("/api/onboarding/pdf")
        .add_header(name, value)
        .json(&json!({
            "waiver_pdf_data": BASE64.encode(pdf_bytes(1, "waiver")),
            "signature": "data:image/png;base64,iVBORw0KGgo=",
            "signature_type": "draw",
        }))
        .await
        .assert_status_ok();

    let (name, value) = bearer(&employee);
    h.server
        .post("/api/onboarding/pdf")
        .add_header(name, value)
        .json(&json!({
            "disclosure_pdf_data": BASE64.encode(pdf_bytes(1, "disclosure")),
            "signature": "Jane Doe",
        }))
        .await
        .assert_status_ok();

    let stored = h.store.find_user_pdf(&employee).await.unwrap().unwrap();
    assert_eq!(stored.signature.as_deref(), Some("Jane Doe"));
    assert_eq!(stored.signature_type, None);
}

#[tokio::test]
async fn test_document_filter_limits_packet() {
    let h = harness();
    let employee = user_with_role(&h.store, Some("employee")).await;
    let reviewer = user_with_role(&h.store, Some("admin")).await;

    let (name, value) = bearer(&employee);
    h.server
        .post("/api/onboarding/pdf")
        .add_header(name, value)
        .json(&json!({
            "waiver_pdf_data": BASE64.encode(pdf_bytes(2, "waiver")),
            "addon_pdf_data": BASE64.encode(pdf_bytes(1, "addon")),
        }))
        .await
        .assert_status_ok();

    let (name, value) = bearer(&reviewer);
    let response = h
        .server
        .get(&format!(
            "/api/admin/user-pdf?user_id={}&document=addon&embed_signature=false",
            employee
        ))
        .add_header(name, value)
        .await;
    response.assert_status_ok();
    assert_eq!(page_count(response.as_bytes()).unwrap(), 1);

    let (name, value) = bearer(&reviewer);
    let missing = h
        .server
        .get(&format!(
            "/api/admin/user-pdf?user_id={}&document=disclosure",
            employee
        ))
        .add_header(name, value)
        .await;
    missing.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_requires_a_payload() {
    let h = harness();
    let employee = user_with_role(&h.store, Some("employee")).await;
    let (name, value) = bearer(&employee);

    let response = h
        .server
        .post("/api/onboarding/pdf")
        .add_header(name, value)
        .json(&json!({ "pdf_data": "   ", "signature": "Jane" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_rejects_non_pdf_payload() {
    let h = harness();
    let employee = user_with_role(&h.store, Some("employee")).await;
    let (name, value) = bearer(&employee);

    let response = h
        .server
        .post("/api/onboarding/pdf")
        .add_header(name, value)
        .json(&json!({ "waiver_pdf_data": BASE64.encode(b"hello world") }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let json = response.json::<serde_json::Value>();
    assert!(json["error"].as_str().unwrap().contains("waiver"));
}

#[tokio::test]
async fn test_upload_accepts_cookie_token() {
    let h = harness();
    let employee = user_with_role(&h.store, None).await;
    let token = issue_token(&employee, TEST_SECRET, 3600);

    let response = h
        .server
        .post("/api/onboarding/pdf")
        .add_header(
            header::COOKIE,
            HeaderValue::from_str(&format!("sb-access-token={}", token)).unwrap(),
        )
        .json(&json!({ "pdf_data": BASE64.encode(pdf_bytes(1, "legacy")) }))
        .await;
    response.assert_status_ok();

    let stored = h.store.find_user_pdf(&employee).await.unwrap().unwrap();
    assert!(stored.pdf_data.unwrap().starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_progress_roundtrip() {
    let h = harness();
    let employee = user_with_role(&h.store, Some("employee")).await;
    let pdf = pdf_bytes(1, "draft");

    let (name, value) = bearer(&employee);
    h.server
        .post("/api/onboarding/progress")
        .add_header(name, value)
        .json(&json!({
            "form_name": "waiver",
            "pdf_data": BASE64.encode(&pdf),
        }))
        .await
        .assert_status_ok();

    let (name, value) = bearer(&employee);
    let response = h
        .server
        .get("/api/onboarding/progress?form_name=waiver")
        .add_header(name, value)
        .await;
    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["form_name"], "waiver");
    let restored = BASE64.decode(json["pdf_data"].as_str().unwrap()).unwrap();
    assert_eq!(restored, pdf);
}

#[tokio::test]
async fn test_progress_missing_is_404_and_needs_form_name() {
    let h = harness();
    let employee = user_with_role(&h.store, Some("employee")).await;

    let (name, value) = bearer(&employee);
    h.server
        .get("/api/onboarding/progress?form_name=disclosure")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let (name, value) = bearer(&employee);
    h.server
        .get("/api/onboarding/progress")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let (name, value) = bearer(&employee);
    h.server
        .post("/api/onboarding/progress")
        .add_header(name, value)
        .json(&json!({ "form_name": "waiver" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
