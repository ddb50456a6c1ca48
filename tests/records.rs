mod common;

use axum::http::StatusCode;
use common::{Part, TestApp, job_card_parts};
use serde_json::json;

fn service_order(fee: f64, transport: f64) -> serde_json::Value {
    json!({
        "engineer_name": "Kofi Mensah",
        "site": "Korle Bu Teaching Hospital",
        "equipment_name": "Humalyzer 3000",
        "arrival_date": "2024-03-01",
        "return_date": "2024-03-03",
        "mission_fee": fee,
        "transport_fee": transport,
    })
}

#[tokio::test]
async fn job_cards_are_visible_only_to_their_owner() {
    let app = TestApp::new().await;

    let mut staff = app.browser();
    let staff_user = staff.sign_up("staff@example.com", "staff").await;

    let created = staff
        .post_multipart("/api/jobcards", &job_card_parts("HumaCount", "2024-01-10"))
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "body: {:?}", created.body);
    let card = created.json();
    assert_eq!(card["equipment_name"], "HumaCount");
    assert_eq!(card["maintenance_type"], "calibration");
    assert_eq!(card["service_date"], "2024-01-10");
    assert_eq!(card["owner_id"], staff_user["user_id"]);

    let listed = staff.get("/api/jobcards").await.json();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], card["id"]);

    let mut other = app.browser();
    other.sign_up("other@example.com", "client").await;
    assert_eq!(other.get("/api/jobcards").await.json(), json!([]));

    let card_path = format!("/api/jobcards/{}", card["id"].as_str().unwrap());
    assert_eq!(other.get(&card_path).await.status, StatusCode::FORBIDDEN);
    assert_eq!(other.delete(&card_path).await.status, StatusCode::FORBIDDEN);
    assert_eq!(staff.get(&card_path).await.status, StatusCode::OK);
}

#[tokio::test]
async fn job_cards_list_oldest_first() {
    let app = TestApp::new().await;
    let mut browser = app.browser();
    browser.sign_up("order@example.com", "client").await;

    for equipment in ["First", "Second", "Third"] {
        let response = browser
            .post_multipart("/api/jobcards", &job_card_parts(equipment, "2024-01-10"))
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    let names: Vec<String> = browser
        .get("/api/jobcards")
        .await
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|card| card["equipment_name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["First", "Second", "Third"]);
}

#[tokio::test]
async fn deleting_twice_reports_not_found() {
    let app = TestApp::new().await;
    let mut browser = app.browser();
    browser.sign_up("delete@example.com", "staff").await;

    let card = browser
        .post_multipart("/api/jobcards", &job_card_parts("Centrifuge", "2024-05-05"))
        .await
        .json();
    let path = format!("/api/jobcards/{}", card["id"].as_str().unwrap());

    assert_eq!(browser.delete(&path).await.status, StatusCode::OK);
    assert_eq!(browser.delete(&path).await.status, StatusCode::NOT_FOUND);
    assert_eq!(browser.get(&path).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn job_card_validation_errors() {
    let app = TestApp::new().await;
    let mut browser = app.browser();
    browser.sign_up("invalid@example.com", "client").await;

    let missing_equipment = vec![
        Part::text("maintenance_type", "repair"),
        Part::text("service_date", "2024-01-10"),
    ];
    let bad_date = job_card_parts("HumaCount", "2024-13-01");

    for parts in [missing_equipment, bad_date] {
        let response = browser.post_multipart("/api/jobcards", &parts).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }
    assert_eq!(browser.get("/api/jobcards").await.json(), json!([]));
}

#[tokio::test]
async fn attachments_download_under_their_original_name() {
    let app = TestApp::new().await;
    let mut browser = app.browser();
    browser.sign_up("files@example.com", "staff").await;

    let mut parts = job_card_parts("HumaCount", "2024-01-10");
    parts.push(Part::file("file", "service report.txt", b"all channels within tolerance"));
    let card = browser.post_multipart("/api/jobcards", &parts).await.json();
    assert_eq!(card["attachment"]["original_filename"], "service report.txt");
    assert_eq!(card["attachment"]["size_bytes"], 29);

    let download = browser
        .get(&format!("/api/jobcards/{}/attachment", card["id"].as_str().unwrap()))
        .await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(&download.body[..], b"all channels within tolerance");
    assert_eq!(
        download.headers["content-disposition"],
        r#"attachment; filename="service report.txt""#
    );

    let mut other = app.browser();
    other.sign_up("peek@example.com", "client").await;
    let peek = other
        .get(&format!("/api/jobcards/{}/attachment", card["id"].as_str().unwrap()))
        .await;
    assert_eq!(peek.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn empty_file_input_means_no_attachment() {
    let app = TestApp::new().await;
    let mut browser = app.browser();
    browser.sign_up("nofile@example.com", "client").await;

    let mut parts = job_card_parts("HumaCount", "2024-01-10");
    parts.push(Part::file("file", "", b""));
    let card = browser.post_multipart("/api/jobcards", &parts).await.json();
    assert!(card["attachment"].is_null());

    let download = browser
        .get(&format!("/api/jobcards/{}/attachment", card["id"].as_str().unwrap()))
        .await;
    assert_eq!(download.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn service_order_total_ignores_submitted_value() {
    let app = TestApp::new().await;
    let mut browser = app.browser();
    browser.sign_up("orders@example.com", "staff").await;

    let mut body = service_order(150.25, 40.5);
    body["total_cost"] = json!(1.0);
    let created = browser.post_json("/api/serviceorders", body).await;
    assert_eq!(created.status, StatusCode::CREATED, "body: {:?}", created.body);

    let order = created.json();
    assert_eq!(order["mission_fee_cents"], 15025);
    assert_eq!(order["transport_fee_cents"], 4050);
    assert_eq!(order["total_cost_cents"], 19075);

    let listed = browser.get("/api/serviceorders").await.json();
    assert_eq!(listed[0]["total_cost_cents"], 19075);
}

#[tokio::test]
async fn service_order_dates_must_be_ordered_and_well_formed() {
    let app = TestApp::new().await;
    let mut browser = app.browser();
    browser.sign_up("dates@example.com", "client").await;

    let mut reversed = service_order(10.0, 5.0);
    reversed["arrival_date"] = json!("2024-03-05");
    let mut malformed = service_order(10.0, 5.0);
    malformed["return_date"] = json!("March 3rd");
    let mut missing_site = service_order(10.0, 5.0);
    missing_site["site"] = json!("   ");

    for body in [reversed, malformed, missing_site] {
        let response = browser.post_json("/api/serviceorders", body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }
    assert_eq!(browser.get("/api/serviceorders").await.json(), json!([]));
}

#[tokio::test]
async fn service_orders_are_owner_scoped() {
    let app = TestApp::new().await;
    let mut owner = app.browser();
    owner.sign_up("owner@example.com", "staff").await;
    let order = owner
        .post_json("/api/serviceorders", service_order(20.0, 10.0))
        .await
        .json();
    let path = format!("/api/serviceorders/{}", order["id"].as_str().unwrap());

    let mut other = app.browser();
    other.sign_up("intruder@example.com", "staff").await;
    assert_eq!(other.get("/api/serviceorders").await.json(), json!([]));
    assert_eq!(other.get(&path).await.status, StatusCode::FORBIDDEN);
    assert_eq!(other.delete(&path).await.status, StatusCode::FORBIDDEN);

    assert_eq!(owner.get(&path).await.status, StatusCode::OK);
    assert_eq!(owner.delete(&path).await.status, StatusCode::OK);
    assert_eq!(owner.delete(&path).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dashboards_count_own_records() {
    let app = TestApp::new().await;
    let mut client = app.browser();
    client.sign_up("counts@example.com", "client").await;

    client
        .post_multipart("/api/jobcards", &job_card_parts("HumaCount", "2024-01-10"))
        .await;
    client
        .post_json("/api/serviceorders", service_order(1.0, 1.0))
        .await;

    let dashboard = client.get("/client").await.json();
    assert_eq!(dashboard["job_cards"], 1);
    assert_eq!(dashboard["service_orders"], 1);
    assert!(dashboard.get("manuals").is_none());
}

#[tokio::test]
async fn staff_can_delete_a_user_and_everything_they_own() {
    let app = TestApp::new().await;
    let mut client = app.browser();
    let client_user = client.sign_up("leaving@example.com", "client").await;
    client
        .post_multipart("/api/jobcards", &job_card_parts("HumaCount", "2024-01-10"))
        .await;

    let mut staff = app.browser();
    staff.sign_up("admin@example.com", "staff").await;

    let path = format!("/api/admin/users/{}", client_user["user_id"].as_str().unwrap());

    // Clients are sent back to their own dashboard.
    client.delete(&path).await.assert_redirect("/client");

    assert_eq!(staff.delete(&path).await.status, StatusCode::OK);
    assert_eq!(staff.delete(&path).await.status, StatusCode::NOT_FOUND);

    client.get("/api/jobcards").await.assert_redirect("/");
    assert_eq!(
        client.login("leaving@example.com", "pw123").await.status,
        StatusCode::UNAUTHORIZED
    );
}
