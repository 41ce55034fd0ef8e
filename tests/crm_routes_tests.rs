mod common;

use axum::http::StatusCode;
use chrono::{Datelike, Duration, Utc};
use common::spawn_app;
use serde_json::json;

#[tokio::test]
async fn contacts_filter_and_validate() {
    let app = spawn_app().await;
    let (_, token) = app.active_user("crm").await;

    let (status, _) = app
        .post("/api/contacts", Some(&token), json!({"notes": "nameless"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .post(
            "/api/contacts",
            Some(&token),
            json!({"first_name": "Eve", "email": "not-an-email"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, dealer) = app
        .post(
            "/api/contacts",
            Some(&token),
            json!({"company": "Tick Tock Ltd", "contact_type": "WatchTrader", "phone": "555-0100"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{dealer}");
    let (_, buyer) = app
        .post(
            "/api/contacts",
            Some(&token),
            json!({"first_name": "Ben", "last_name": "Buyer", "email": "BEN@example.com"}),
        )
        .await;
    assert_eq!(buyer["contact_type"], "Customer");
    assert_eq!(buyer["email"], "ben@example.com");

    let (_, traders) = app.get("/api/contacts?type=WatchTrader", &token).await;
    assert_eq!(traders.as_array().unwrap().len(), 1);
    let (_, found) = app.get("/api/contacts?q=buyer", &token).await;
    assert_eq!(found[0]["id"], buyer["id"]);

    let id = buyer["id"].as_i64().unwrap();
    let (status, updated) = app
        .put(
            &format!("/api/contacts/{id}"),
            &token,
            json!({"first_name": "Benjamin", "last_name": "Buyer", "city": "Geneva"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["city"], "Geneva");
    assert_eq!(updated["contact_type"], "Customer");

    let (status, _) = app.delete(&format!("/api/contacts/{id}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&format!("/api/contacts/{id}"), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn contact_watch_history_and_reference_cleanup() {
    let app = spawn_app().await;
    let (_, token) = app.active_user("history").await;
    let (_, seller) = app
        .post("/api/contacts", Some(&token), json!({"first_name": "Sam"}))
        .await;
    let seller_id = seller["id"].as_i64().unwrap();

    let (status, watch) = app
        .post(
            "/api/watches",
            Some(&token),
            json!({"brand": "IWC", "model": "Pilot", "seller_contact_id": seller_id}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    app.post(
        "/api/watches",
        Some(&token),
        json!({"brand": "Zenith", "model": "El Primero"}),
    )
    .await;

    let (status, history) = app
        .get(&format!("/api/contacts/{seller_id}/watches"), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["id"], watch["id"]);

    // Deleting the contact keeps the watch and clears the reference.
    app.delete(&format!("/api/contacts/{seller_id}"), &token).await;
    let (status, watch) = app
        .get(&format!("/api/watches/{}", watch["id"]), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(watch["seller_contact_id"], serde_json::Value::Null);
}

#[tokio::test]
async fn cards_store_display_metadata_only() {
    let app = spawn_app().await;
    let (_, token) = app.active_user("cards").await;
    let (_, other) = app.active_user("intruder").await;
    let (_, contact) = app
        .post("/api/contacts", Some(&token), json!({"first_name": "Cara"}))
        .await;
    let id = contact["id"].as_i64().unwrap();
    let next_year = Utc::now().year() + 1;

    for bad in [
        json!({"last4": "4242424242424242", "exp_month": 1, "exp_year": next_year}),
        json!({"last4": "42a2", "exp_month": 1, "exp_year": next_year}),
        json!({"last4": "4242", "exp_month": 13, "exp_year": next_year}),
        json!({"last4": "4242", "exp_month": 1, "exp_year": 1999}),
        json!({"last4": "4242", "exp_month": 1, "exp_year": 2001}),
    ] {
        let (status, body) = app
            .post(&format!("/api/contacts/{id}/cards"), Some(&token), bad.clone())
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{bad} -> {body}");
    }

    let (status, card) = app
        .post(
            &format!("/api/contacts/{id}/cards"),
            Some(&token),
            json!({"brand": "Visa", "last4": "4242", "exp_month": 12, "exp_year": next_year}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{card}");
    let card_id = card["id"].as_i64().unwrap();

    let (_, cards) = app.get(&format!("/api/contacts/{id}/cards"), &token).await;
    assert_eq!(cards.as_array().unwrap().len(), 1);
    let (status, _) = app.get(&format!("/api/contacts/{id}/cards"), &other).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .delete(&format!("/api/contacts/{id}/cards/{card_id}"), &other)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .delete(&format!("/api/contacts/{id}/cards/{card_id}"), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, cards) = app.get(&format!("/api/contacts/{id}/cards"), &token).await;
    assert!(cards.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn leads_lifecycle_and_reminders() {
    let app = spawn_app().await;
    let (_, token) = app.active_user("sales").await;
    let (_, stranger) = app.active_user("stranger").await;
    let (_, foreign_watch) = app
        .post(
            "/api/watches",
            Some(&stranger),
            json!({"brand": "Breitling", "model": "Navitimer"}),
        )
        .await;

    let (status, _) = app
        .post(
            "/api/leads",
            Some(&token),
            json!({"title": "Navitimer buyer", "watch_id": foreign_watch["id"]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let today = Utc::now().date_naive();
    let yesterday = (today - Duration::days(1)).to_string();
    let next_week = (today + Duration::days(7)).to_string();

    let (status, due) = app
        .post(
            "/api/leads",
            Some(&token),
            json!({"title": "Call back about Daytona", "reminder_date": yesterday}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{due}");
    assert_eq!(due["status"], "new");
    let (_, later) = app
        .post(
            "/api/leads",
            Some(&token),
            json!({"title": "Follow up on GMT", "reminder_date": next_week}),
        )
        .await;
    app.post(
        "/api/leads",
        Some(&token),
        json!({"title": "Closed deal", "status": "won", "reminder_date": yesterday}),
    )
    .await;

    let (_, reminders) = app.get("/api/leads/reminders", &token).await;
    let titles: Vec<&str> = reminders
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Call back about Daytona"]);

    let (_, reminders) = app
        .get(&format!("/api/leads/reminders?until={next_week}"), &token)
        .await;
    assert_eq!(reminders.as_array().unwrap().len(), 2);
    let (status, _) = app.get("/api/leads/reminders?until=soon", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let id = later["id"].as_i64().unwrap();
    let uri = format!("/api/leads/{id}/status");
    let (status, lead) = app.put(&uri, &token, json!({"status": "contacted"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lead["status"], "contacted");
    let (status, lead) = app.put(&uri, &token, json!({"status": "contacted"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lead["status"], "contacted");
    let (status, _) = app.put(&uri, &stranger, json!({"status": "lost"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, won) = app.get("/api/leads?status=won", &token).await;
    assert_eq!(won.as_array().unwrap().len(), 1);
    let (status, _) = app.delete(&format!("/api/leads/{id}"), &token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn contact_import_splits_names_and_skips_known_emails() {
    let app = spawn_app().await;
    let (_, token) = app.active_user("rolodex").await;
    app.post(
        "/api/contacts",
        Some(&token),
        json!({"first_name": "Old", "email": "old@example.com"}),
    )
    .await;

    let csv = "\
Name,E-mail,Phone Number,Type
Jane Q Public,jane@example.com,555-1000,buyer
Old Friend,OLD@example.com,,Customer
Dan Dealer,,555-2000,plumber
";
    let (status, report) = app
        .post("/api/contacts/import", Some(&token), json!({"csv": csv}))
        .await;
    assert_eq!(status, StatusCode::OK, "{report}");
    assert_eq!(report["imported"], 1);
    assert_eq!(report["duplicates"], json!([{"row": 2, "matches": "existing"}]));
    assert_eq!(report["errors"][0]["row"], 3);
    assert_eq!(report["errors"][0]["field"], "contact_type");

    let (_, found) = app.get("/api/contacts?q=jane", &token).await;
    assert_eq!(found[0]["first_name"], "Jane Q");
    assert_eq!(found[0]["last_name"], "Public");
    assert_eq!(found[0]["contact_type"], "Customer");
}
