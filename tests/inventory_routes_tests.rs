mod common;

use axum::http::StatusCode;
use common::spawn_app;
use serde_json::{Value, json};
use watchdesk::db::users::SubscriptionUpdate;
use watchdesk::types::{SubscriptionStatus, Tier};

fn sold_watch() -> Value {
    json!({
        "brand": "Omega",
        "model": "Speedmaster",
        "reference_number": "311.30.42.30.01.005",
        "serial_number": "SN-1",
        "date_purchased": "2024-01-10",
        "purchase_price": 4000.0,
        "date_sold": "2024-03-10",
        "price_sold": 5200.0,
        "platform_fees": 150.25,
        "shipping_cost": 40.0,
        "taxes": 0.0
    })
}

#[tokio::test]
async fn watch_crud_with_profit() {
    let app = spawn_app().await;
    let (_, token) = app.active_user("dealer").await;

    let (status, watch) = app.post("/api/watches", Some(&token), sold_watch()).await;
    assert_eq!(status, StatusCode::CREATED, "{watch}");
    assert_eq!(watch["profit"], 1009.75);
    let id = watch["id"].as_i64().unwrap();

    let (status, _) = app
        .post(
            "/api/watches",
            Some(&token),
            json!({"brand": "Rolex", "model": "Explorer", "purchase_price": 7000}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, sold) = app.get("/api/watches?status=sold", &token).await;
    assert_eq!(sold.as_array().unwrap().len(), 1);
    let (_, unsold) = app.get("/api/watches?status=unsold", &token).await;
    assert_eq!(unsold.as_array().unwrap().len(), 1);
    assert_eq!(unsold[0]["profit"], Value::Null);
    let (_, found) = app.get("/api/watches?q=speed", &token).await;
    assert_eq!(found.as_array().unwrap().len(), 1);

    let mut updated = sold_watch();
    updated["notes"] = json!("box and papers");
    updated["price_sold"] = json!(5000.0);
    let (status, watch) = app
        .put(&format!("/api/watches/{id}"), &token, updated)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(watch["notes"], "box and papers");
    assert_eq!(watch["profit"], 809.75);

    let (status, stats) = app.get("/api/watches/stats", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_watches"], 2);
    assert_eq!(stats["sold"], 1);
    assert_eq!(stats["in_stock"], 1);
    assert_eq!(stats["inventory_cost"], 7000.0);
    assert_eq!(stats["average_days_to_sell"], 60.0);

    let (status, _) = app.delete(&format!("/api/watches/{id}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/api/watches/{id}"), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn watch_validation_rules() {
    let app = spawn_app().await;
    let (_, token) = app.active_user("dealer").await;

    let cases = [
        json!({"brand": "", "model": "X"}),
        json!({"brand": "Tudor", "model": "BB58", "date_purchased": "03/01/2024"}),
        json!({"brand": "Tudor", "model": "BB58", "purchase_price": -5}),
        json!({"brand": "Tudor", "model": "BB58", "price_sold": 100}),
        json!({"brand": "Tudor", "model": "BB58", "date_purchased": "2024-05-01",
               "date_sold": "2024-04-01", "price_sold": 100}),
        json!({"brand": "Tudor", "model": "BB58", "buyer_contact_id": 999}),
    ];
    for body in cases {
        let (status, resp) = app.post("/api/watches", Some(&token), body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body} -> {resp}");
    }
}

#[tokio::test]
async fn other_users_rows_are_invisible() {
    let app = spawn_app().await;
    let (_, alice) = app.active_user("alice").await;
    let (_, bob) = app.active_user("bob").await;

    let (_, watch) = app.post("/api/watches", Some(&alice), sold_watch()).await;
    let id = watch["id"].as_i64().unwrap();
    let (_, contact) = app
        .post("/api/contacts", Some(&alice), json!({"first_name": "Carol"}))
        .await;
    let contact_id = contact["id"].as_i64().unwrap();

    let (status, _) = app.get(&format!("/api/watches/{id}"), &bob).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.put(&format!("/api/watches/{id}"), &bob, sold_watch()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&format!("/api/watches/{id}"), &bob).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, list) = app.get("/api/watches", &bob).await;
    assert!(list.as_array().unwrap().is_empty());

    // Bob cannot point his watch at Alice's contact.
    let (status, _) = app
        .post(
            "/api/watches",
            Some(&bob),
            json!({"brand": "Seiko", "model": "SKX", "seller_contact_id": contact_id}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get(&format!("/api/contacts/{contact_id}"), &bob).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_matches_wildcard_characters_literally() {
    let app = spawn_app().await;
    let (_, token) = app.active_user("searcher").await;
    for (brand, model) in [
        ("Omega", "Seamaster 100%"),
        ("Rolex", "Submariner 16610"),
        ("Tudor", "Black_Bay"),
    ] {
        let (status, _) = app
            .post("/api/watches", Some(&token), json!({"brand": brand, "model": model}))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, found) = app.get("/api/watches?q=0%25", &token).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["brand"], "Omega");

    let (_, found) = app.get("/api/watches?q=_", &token).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["brand"], "Tudor");

    let (_, found) = app.get("/api/watches?q=610", &token).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
}

fn csv_rows(n: usize) -> String {
    let mut csv = String::from("Brand,Model,Serial #,Purchase Price,Date Purchased\n");
    for i in 0..n {
        csv.push_str(&format!("Seiko,SKX007,S{i},\"$1,2{:02}.00\",3/1/2024\n", i % 100));
    }
    csv
}

#[tokio::test]
async fn free_tier_caps_unsold_watches() {
    let app = spawn_app().await;
    let (user, token) = app.active_user("small").await;

    let (status, report) = app
        .post(
            "/api/watches/import",
            Some(&token),
            json!({"csv": csv_rows(25)}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{report}");
    assert_eq!(report["imported"], 25);

    let (status, body) = app
        .post(
            "/api/watches",
            Some(&token),
            json!({"brand": "Casio", "model": "F-91W"}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("25"));

    // Sold watches do not count against the limit.
    let (status, _) = app.post("/api/watches", Some(&token), sold_watch()).await;
    assert_eq!(status, StatusCode::CREATED);

    // A lapsed paid plan behaves like free; an active one lifts the cap.
    let mut update = SubscriptionUpdate {
        tier: Tier::Operandi,
        status: SubscriptionStatus::PastDue,
        price: Some(29.0),
        start: None,
        end: None,
        stripe_customer_id: None,
        stripe_subscription_id: None,
    };
    app.state.storage.update_subscription(user.id, &update).await.unwrap();
    let casio = json!({"brand": "Casio", "model": "F-91W"});
    let (status, _) = app.post("/api/watches", Some(&token), casio.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    update.status = SubscriptionStatus::Active;
    app.state.storage.update_subscription(user.id, &update).await.unwrap();
    let (status, _) = app.post("/api/watches", Some(&token), casio).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, sub) = app.get("/api/account/subscription", &token).await;
    assert_eq!(sub["effective_tier"], "operandi");
    assert_eq!(sub["watch_limit"], 500);
    assert_eq!(sub["active_watches"], 26);
}

#[tokio::test]
async fn import_over_the_limit_writes_nothing() {
    let app = spawn_app().await;
    let (_, token) = app.active_user("bulk").await;

    let (status, _) = app
        .post(
            "/api/watches/import",
            Some(&token),
            json!({"csv": csv_rows(30)}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, list) = app.get("/api/watches", &token).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn import_maps_headers_and_reports_problems() {
    let app = spawn_app().await;
    let (_, token) = app.active_user("importer").await;
    app.post("/api/watches", Some(&token), sold_watch()).await;

    let csv = "\
Make,Model Name,Serial Number,Cost,Purchase Date,Sold For,Sale Date,Mystery
Omega,Speedmaster,sn-1,\"$4,000\",2024-01-10,,,x
Rolex,Submariner,R-2,\"$9,500.50\",03/15/2024,,,y
Rolex,Submariner,r-2,9500,2024-03-15,,,z
Tudor,Pelagos,T-3,abc,2024-02-01,,,q
Cartier,Tank,C-4,2100,2024-02-01,2600,2024-02-20,w
";
    let request = json!({"csv": csv, "dry_run": true});
    let (status, preview) = app
        .post("/api/watches/import", Some(&token), request)
        .await;
    assert_eq!(status, StatusCode::OK, "{preview}");
    assert_eq!(preview["dry_run"], true);
    assert_eq!(preview["mapping"]["Make"], "brand");
    assert_eq!(preview["mapping"]["Cost"], "purchase_price");
    assert_eq!(preview["unmapped_columns"], json!(["Mystery"]));
    assert_eq!(preview["imported"], 2);
    assert_eq!(
        preview["duplicates"],
        json!([{"row": 1, "matches": "existing"}, {"row": 3, "matches": "file"}])
    );
    assert_eq!(preview["errors"][0]["row"], 4);
    assert_eq!(preview["errors"][0]["field"], "purchase_price");

    let (_, list) = app.get("/api/watches", &token).await;
    assert_eq!(list.as_array().unwrap().len(), 1, "dry run must not write");

    let (status, report) = app
        .post("/api/watches/import", Some(&token), json!({"csv": csv}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["dry_run"], false);
    assert_eq!(report["imported"], 2);

    let (_, sold) = app.get("/api/watches?brand=cartier", &token).await;
    assert_eq!(sold[0]["profit"], 500.0);
    let (_, subs) = app.get("/api/watches?q=submariner", &token).await;
    assert_eq!(subs[0]["date_purchased"], "2024-03-15");
    assert_eq!(subs[0]["purchase_price"], 9500.5);
}

#[tokio::test]
async fn import_can_keep_duplicates_and_use_explicit_mapping() {
    let app = spawn_app().await;
    let (_, token) = app.active_user("mapper").await;

    let csv = "A,B\nOmega,Seamaster\nOmega,Seamaster\n";
    let (status, report) = app
        .post(
            "/api/watches/import",
            Some(&token),
            json!({
                "csv": csv,
                "mapping": {"A": "brand", "B": "model"},
                "skip_duplicates": false
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{report}");
    assert_eq!(report["imported"], 2);
    assert_eq!(report["duplicates"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .post(
            "/api/watches/import",
            Some(&token),
            json!({"csv": csv, "mapping": {"A": "wingspan"}}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
