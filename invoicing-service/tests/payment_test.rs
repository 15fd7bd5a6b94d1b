//! Payment recording integration tests for invoicing-service.

mod common;

use common::TestApp;
use serde_json::json;

fn sample_items() -> serde_json::Value {
    json!([
        { "description": "Consulting", "quantity": "2", "unit_price": "100" },
        { "description": "Support plan", "quantity": "1", "unit_price": "50" },
    ])
}

async fn record_payment(
    app: &TestApp,
    invoice_id: &str,
    amount: &str,
    method: &str,
) -> reqwest::Response {
    let client = reqwest::Client::new();
    client
        .post(format!("{}/invoices/{}/payment", app.address, invoice_id))
        .json(&json!({
            "amount": amount,
            "method": method,
            "date": "2026-01-25",
            "reference": format!("{}-ref", method),
        }))
        .send()
        .await
        .expect("Failed to record payment")
}

#[tokio::test]
async fn record_payment_updates_balance() {
    let app = TestApp::spawn().await;

    // totalAmount = 270 (10% discount, 20% tax)
    let invoice = app
        .create_invoice("Payment Client", sample_items(), "20", "10")
        .await;
    let id = invoice["id"].as_str().unwrap();

    let response = record_payment(&app, id, "100", "cash").await;
    assert_eq!(response.status().as_u16(), 201);

    let invoice: serde_json::Value = response.json().await.expect("Invalid JSON");
    assert_eq!(invoice["total_paid"], "100");
    assert_eq!(invoice["balance"], "170");
    assert_eq!(invoice["is_fully_paid"], false);
    assert_eq!(invoice["payment_history"].as_array().unwrap().len(), 1);
    assert_eq!(invoice["payment_history"][0]["amount"], "100");
    assert_eq!(invoice["payment_history"][0]["method"], "cash");
    assert_eq!(invoice["payment_history"][0]["date"], "2026-01-25");

    app.cleanup().await;
}

#[tokio::test]
async fn multiple_payments_accumulate() {
    let app = TestApp::spawn().await;

    let invoice = app
        .create_invoice("Installment Client", sample_items(), "20", "10")
        .await;
    let id = invoice["id"].as_str().unwrap();

    for (amount, expected_balance) in [("100", "170"), ("100", "70"), ("70", "0")] {
        let response = record_payment(&app, id, amount, "bank").await;
        assert_eq!(response.status().as_u16(), 201);
        let invoice: serde_json::Value = response.json().await.expect("Invalid JSON");
        assert_eq!(invoice["balance"], expected_balance);
    }

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/invoices/{}", app.address, id))
        .send()
        .await
        .expect("Failed to get invoice");
    let invoice: serde_json::Value = response.json().await.expect("Invalid JSON");

    assert_eq!(invoice["total_paid"], "270");
    assert_eq!(invoice["balance"], "0");
    assert_eq!(invoice["is_fully_paid"], true);
    assert_eq!(invoice["payment_history"].as_array().unwrap().len(), 3);
    // Settling the balance does not touch the independently-assigned status.
    assert_eq!(invoice["status"], "pending");

    app.cleanup().await;
}

#[tokio::test]
async fn overpayment_is_rejected_and_invoice_unchanged() {
    let app = TestApp::spawn().await;

    let invoice = app
        .create_invoice("Overpay Client", sample_items(), "20", "10")
        .await;
    let id = invoice["id"].as_str().unwrap();

    let response = record_payment(&app, id, "100", "cash").await;
    assert_eq!(response.status().as_u16(), 201);

    // 200 > remaining 170
    let response = record_payment(&app, id, "200", "cash").await;
    assert_eq!(response.status().as_u16(), 400);
    let error: serde_json::Value = response.json().await.expect("Invalid JSON");
    assert!(error["error"]
        .as_str()
        .unwrap()
        .contains("exceeds outstanding balance"));

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/invoices/{}", app.address, id))
        .send()
        .await
        .expect("Failed to get invoice");
    let invoice: serde_json::Value = response.json().await.expect("Invalid JSON");

    assert_eq!(invoice["balance"], "170");
    assert_eq!(invoice["total_paid"], "100");
    assert_eq!(invoice["payment_history"].as_array().unwrap().len(), 1);

    app.cleanup().await;
}

#[tokio::test]
async fn non_positive_payment_is_rejected() {
    let app = TestApp::spawn().await;

    let invoice = app
        .create_invoice("Zero Client", sample_items(), "0", "0")
        .await;
    let id = invoice["id"].as_str().unwrap();

    for amount in ["0", "-10"] {
        let response = record_payment(&app, id, amount, "cash").await;
        assert_eq!(response.status().as_u16(), 400);
    }

    app.cleanup().await;
}

#[tokio::test]
async fn backdated_payment_is_allowed() {
    let app = TestApp::spawn().await;

    let invoice = app
        .create_invoice("Backdate Client", sample_items(), "0", "0")
        .await;
    let id = invoice["id"].as_str().unwrap();

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/invoices/{}/payment", app.address, id))
        .json(&json!({
            "amount": "50",
            "method": "check",
            "date": "2019-06-01",
        }))
        .send()
        .await
        .expect("Failed to record payment");

    assert_eq!(response.status().as_u16(), 201);
    let invoice: serde_json::Value = response.json().await.expect("Invalid JSON");
    assert_eq!(invoice["payment_history"][0]["date"], "2019-06-01");
    assert_eq!(invoice["payment_history"][0]["reference"], serde_json::Value::Null);

    app.cleanup().await;
}

#[tokio::test]
async fn payment_on_unknown_invoice_returns_404() {
    let app = TestApp::spawn().await;

    let response = record_payment(
        &app,
        "99999999-9999-9999-9999-999999999999",
        "100",
        "cash",
    )
    .await;
    assert_eq!(response.status().as_u16(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn items_and_rates_freeze_once_payments_exist() {
    let app = TestApp::spawn().await;

    let invoice = app
        .create_invoice("Frozen Client", sample_items(), "0", "0")
        .await;
    let id = invoice["id"].as_str().unwrap();

    let response = record_payment(&app, id, "100", "mobile").await;
    assert_eq!(response.status().as_u16(), 201);

    let client = reqwest::Client::new();

    // Shrinking the total below the amount already paid would force a
    // negative balance; the edit is refused outright.
    let response = client
        .put(format!("{}/invoices/{}", app.address, id))
        .json(&json!({
            "items": [
                { "description": "Tiny fee", "quantity": "1", "unit_price": "10" },
            ],
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 409);

    let response = client
        .put(format!("{}/invoices/{}", app.address, id))
        .json(&json!({ "tax_rate": "5" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 409);

    // Non-financial fields stay editable.
    let response = client
        .put(format!("{}/invoices/{}", app.address, id))
        .json(&json!({ "client_name": "Frozen Client (renamed)" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert!(response.status().is_success());
    let invoice: serde_json::Value = response.json().await.expect("Invalid JSON");
    assert_eq!(invoice["client_name"], "Frozen Client (renamed)");
    assert_eq!(invoice["total_amount"], "250");

    app.cleanup().await;
}
