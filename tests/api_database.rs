use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

mod support;

use support::{init_test_db, send};

fn transaction(transaction_id: &str, risk_score: i32) -> Value {
    json!({
        "transaction_id": transaction_id,
        "email": "Buyer@Example.com",
        "amount": 49.99,
        "currency": "usd",
        "status": "succeeded",
        "risk_score": risk_score,
        "chargeback_confidence": 35,
        "metadata": { "order": "A-1" }
    })
}

#[tokio::test]
async fn transaction_round_trip() {
    let Some(db) = init_test_db().await else {
        return;
    };

    let mut body = transaction("txn_round_trip", 75);
    body["created_at"] = json!("2024-03-01T10:00:05.123456789Z");

    let (status, created) = send(db.app(), Method::POST, "/transactions", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["risk_level"], "high");
    assert_eq!(created["data"]["created_at"], "2024-03-01T10:00:05.123456Z");

    let (status, fetched) = send(db.app(), Method::GET, "/transactions/txn_round_trip", None).await;
    assert_eq!(status, StatusCode::OK);

    let data = &fetched["data"];
    assert_eq!(data["email"], "buyer@example.com");
    assert_eq!(data["currency"], "USD");
    assert_eq!(data["amount"], 49.99);
    assert_eq!(data["risk_score"], 75);
    assert_eq!(data["chargeback_confidence"], 0.35);
    assert_eq!(data["metadata"]["order"], "A-1");
    assert!(data["manual_review"].is_null());
    assert_eq!(data["created_at"], created["data"]["created_at"]);
    assert_eq!(data, &created["data"]);

    let (status, _) = send(
        db.app(),
        Method::POST,
        "/transactions",
        Some(transaction("txn_round_trip", 10)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn review_of_unknown_transaction_is_not_found() {
    let Some(db) = init_test_db().await else {
        return;
    };

    send(
        db.app(),
        Method::POST,
        "/transactions",
        Some(transaction("txn_present", 55)),
    )
    .await;
    let (_, before) = send(db.app(), Method::GET, "/transactions?stats=true", None).await;

    let (status, body) = send(
        db.app(),
        Method::PATCH,
        "/transactions",
        Some(json!({ "transaction_id": "txn_missing", "action": "mark_fraud" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (_, after) = send(db.app(), Method::GET, "/transactions?stats=true", None).await;
    assert_eq!(after, before);
    assert_eq!(after["totalCount"], 1);
    assert_eq!(after["data"][0]["risk_score"], 55);
    assert!(after["data"][0]["manual_review"].is_null());
}

#[tokio::test]
async fn review_never_lowers_fraud_or_raises_safe_scores() {
    let Some(db) = init_test_db().await else {
        return;
    };

    for (id, score) in [("txn_risky", 95), ("txn_clean", 3)] {
        let (status, _) = send(db.app(), Method::POST, "/transactions", Some(transaction(id, score))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    for _ in 0..2 {
        let (status, fraud) = send(
            db.app(),
            Method::PATCH,
            "/transactions",
            Some(json!({ "transaction_id": "txn_risky", "action": "mark_fraud", "retrain_model": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fraud["data"]["risk_score"], 95);
        assert_eq!(fraud["data"]["risk_level"], "high");
        assert_eq!(fraud["data"]["manual_review"]["retrain_model"], false);

        let (status, safe) = send(
            db.app(),
            Method::PATCH,
            "/transactions",
            Some(json!({ "transaction_id": "txn_clean", "action": "mark_safe" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(safe["data"]["risk_score"], 3);
        assert_eq!(safe["data"]["risk_level"], "low");
        assert_eq!(safe["data"]["manual_review"]["retrain_model"], true);
    }

    let (_, risky) = send(db.app(), Method::GET, "/transactions/txn_risky", None).await;
    assert_eq!(risky["data"]["risk_score"], 95);
    assert_eq!(risky["data"]["fraud_detected"], true);

    let (_, clean) = send(db.app(), Method::GET, "/transactions/txn_clean", None).await;
    assert_eq!(clean["data"]["risk_score"], 3);
    assert_eq!(clean["data"]["fraud_detected"], false);
}

#[tokio::test]
async fn review_clamps_risk_and_last_review_wins() {
    let Some(db) = init_test_db().await else {
        return;
    };

    send(
        db.app(),
        Method::POST,
        "/transactions",
        Some(transaction("txn_review", 50)),
    )
    .await;

    let review = |action: &str| {
        json!({ "transaction_id": "txn_review", "action": action, "notes": "checked" })
    };

    let (status, fraud) = send(db.app(), Method::PATCH, "/transactions", Some(review("mark_fraud"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fraud["data"]["fraud_detected"], true);
    assert_eq!(fraud["data"]["risk_level"], "high");
    assert_eq!(fraud["data"]["risk_score"], 90);
    assert_eq!(fraud["data"]["manual_review"]["marked_as"], "fraud");
    assert_eq!(fraud["data"]["manual_review"]["retrain_model"], true);

    let (_, safe) = send(db.app(), Method::PATCH, "/transactions", Some(review("mark_safe"))).await;
    assert_eq!(safe["data"]["fraud_detected"], false);
    assert_eq!(safe["data"]["risk_level"], "low");
    assert_eq!(safe["data"]["risk_score"], 10);

    let (_, again) = send(db.app(), Method::PATCH, "/transactions", Some(review("mark_safe"))).await;
    assert_eq!(again["data"]["risk_score"], 10);
    assert_eq!(again["data"]["manual_review"]["marked_as"], "safe");

    let (_, stored) = send(db.app(), Method::GET, "/transactions/txn_review", None).await;
    assert_eq!(stored["data"]["risk_score"], 10);
    assert_eq!(stored["data"]["manual_review"]["reviewed"], true);
    assert_eq!(stored["data"]["manual_review"]["notes"], "checked");
}

#[tokio::test]
async fn stale_review_is_a_conflict() {
    let Some(db) = init_test_db().await else {
        return;
    };

    let (_, created) = send(
        db.app(),
        Method::POST,
        "/transactions",
        Some(transaction("txn_stale", 20)),
    )
    .await;
    let read_at = created["data"]["updated_at"].clone();

    let (status, _) = send(
        db.app(),
        Method::PATCH,
        "/transactions",
        Some(json!({ "transaction_id": "txn_stale", "action": "mark_fraud" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        db.app(),
        Method::PATCH,
        "/transactions",
        Some(json!({
            "transaction_id": "txn_stale",
            "action": "mark_safe",
            "expected_updated_at": read_at
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (_, stored) = send(db.app(), Method::GET, "/transactions/txn_stale", None).await;
    assert_eq!(stored["data"]["fraud_detected"], true);
}

#[tokio::test]
async fn duplicate_customer_email_is_a_conflict() {
    let Some(db) = init_test_db().await else {
        return;
    };

    let (status, created) = send(
        db.app(),
        Method::POST,
        "/customers",
        Some(json!({ "email": "jane@example.com", "name": "Jane" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        db.app(),
        Method::POST,
        "/customers",
        Some(json!({ "email": "JANE@example.com", "name": "Impostor" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, stored) = send(db.app(), Method::GET, &format!("/customers/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["data"]["name"], "Jane");
}

#[tokio::test]
async fn transaction_listing_filters_and_stats() {
    let Some(db) = init_test_db().await else {
        return;
    };

    for (id, status) in [("txn_a", "succeeded"), ("txn_b", "failed"), ("txn_c", "succeeded")] {
        let mut body = transaction(id, 30);
        body["status"] = json!(status);
        send(db.app(), Method::POST, "/transactions", Some(body)).await;
    }

    let (status, body) = send(
        db.app(),
        Method::GET,
        "/transactions?status=succeeded&limit=1&stats=true",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["totalCount"], 2);
    assert_eq!(body["limit"], 1);
    assert_eq!(body["stats"]["totalTransactions"], 2);
    assert_eq!(body["stats"]["successRate"], 100.0);

    let (_, body) = send(db.app(), Method::GET, "/transactions?search=TXN_B", None).await;
    assert_eq!(body["totalCount"], 1);
    assert!(body.get("stats").is_none());
}

#[tokio::test]
async fn subscription_stats_report_mrr_and_arr() {
    let Some(db) = init_test_db().await else {
        return;
    };

    let subscriptions = [
        ("sub_month", 10.0, 1, "month"),
        ("sub_year", 120.0, 1, "year"),
        ("sub_week", 5.0, 2, "week"),
    ];
    for (id, price, quantity, interval) in subscriptions {
        let (status, _) = send(
            db.app(),
            Method::POST,
            "/subscriptions",
            Some(json!({
                "subscription_id": id,
                "email": "sub@example.com",
                "price_amount": price,
                "quantity": quantity,
                "interval": interval
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = send(db.app(), Method::GET, "/subscriptions?stats=true", None).await;
    assert_eq!(body["stats"]["mrr"], 63.3);
    assert_eq!(body["stats"]["arr"], 759.6);
    assert_eq!(body["stats"]["churnRate"], 0.0);

    let (_, active) = send(db.app(), Method::GET, "/subscriptions?status=Active", None).await;
    assert_eq!(active["totalCount"], 3);
    assert_eq!(active["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn import_reports_rejected_rows_and_clear_empties_everything() {
    let Some(db) = init_test_db().await else {
        return;
    };

    let (status, body) = send(
        db.app(),
        Method::POST,
        "/admin/import",
        Some(json!({
            "customers": [
                { "email": "one@example.com", "name": "One" },
                { "email": "two@example.com" },
                { "email": "one@example.com", "name": "Duplicate" }
            ],
            "fraud_results": [
                { "transaction_id": "txn_1", "fraud_detected": true, "confidence": 0.9 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let customers = &body["data"]["customers"];
    assert_eq!(customers["inserted"], 1);
    let failed: Vec<u64> = customers["failed"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["index"].as_u64().unwrap())
        .collect();
    assert_eq!(failed, vec![1, 2]);
    assert_eq!(body["data"]["fraud_results"]["inserted"], 1);
    assert!(body["data"].get("transactions").is_none());

    let (_, dashboard) = send(db.app(), Method::GET, "/dashboard?includeData=true", None).await;
    assert_eq!(dashboard["stats"]["customers"]["totalCustomers"], 1);
    assert_eq!(dashboard["stats"]["fraud"]["fraudRate"], 100.0);
    assert_eq!(dashboard["data"]["customers"].as_array().unwrap().len(), 1);

    let (status, cleared) = send(db.app(), Method::DELETE, "/admin/data", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["data"]["customers"], 1);
    assert_eq!(cleared["data"]["fraud_results"], 1);

    let (_, dashboard) = send(db.app(), Method::GET, "/dashboard", None).await;
    assert_eq!(dashboard["stats"]["customers"]["totalCustomers"], 0);
    assert!(dashboard.get("data").is_none());
}
