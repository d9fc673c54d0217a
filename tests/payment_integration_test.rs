mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use common::{buyer, delivery_form, read_json, TestApp};
use partstore_api::{
    entities::{
        order::{OrderPaymentStatus, OrderStatus},
        payment::{self, PaymentMethod, PaymentStatus},
        Payment,
    },
    errors::ServiceError,
    handlers::payment_webhooks::SIGNATURE_HEADER,
    services::{
        commerce::PlaceOrderRequest, payment_gateway::sign_webhook_payload,
        payments::{ReconcileOutcome, WebhookOutcome},
    },
};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const SECRET: &str = "sk_test_webhook_secret";

fn charge_success(reference: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "event": "charge.success",
        "data": {
            "id": 302961,
            "reference": reference,
            "status": "success",
            "amount": 450000,
            "currency": "NGN"
        }
    }))
    .unwrap()
}

async fn payment_row(app: &TestApp, reference: &str) -> payment::Model {
    Payment::find()
        .filter(payment::Column::Reference.eq(reference))
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("payment exists")
}

#[tokio::test]
async fn test_initiate_returns_popup_parameters() {
    let app = TestApp::with_config(|cfg| {
        cfg.paystack_public_key = Some("pk_test_public".to_string());
    })
    .await;
    let caller = buyer();
    let placed = app.place_order_for(&caller, dec!(2500), delivery_form()).await;

    let initiation = app
        .state
        .services
        .payments
        .initiate_payment(&caller, placed.order.id)
        .await
        .unwrap();

    assert!(initiation
        .reference
        .starts_with(&format!("PAY-{}-", placed.order.order_number)));
    assert_eq!(initiation.public_key.as_deref(), Some("pk_test_public"));
    assert_eq!(initiation.amount.amount(), dec!(4500));
    assert_eq!(initiation.amount_minor, 450_000);
    assert_eq!(initiation.currency, "NGN");
    assert_eq!(initiation.email, "ada@example.com");
    assert_eq!(
        initiation.callback_url,
        format!("http://shop.test/api/v1/payments/verify/{}", initiation.reference)
    );

    let stored = payment_row(&app, &initiation.reference).await;
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert_eq!(stored.amount, dec!(4500));
}

#[tokio::test]
async fn test_initiate_requires_contact_email() {
    let app = TestApp::new().await;
    let caller = buyer();
    let placed = app
        .place_order_for(
            &caller,
            dec!(1000),
            PlaceOrderRequest {
                email: None,
                ..delivery_form()
            },
        )
        .await;

    let err = app
        .state
        .services
        .payments
        .initiate_payment(&caller, placed.order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn test_signed_webhook_settles_order_once() {
    let app = TestApp::with_config(|cfg| {
        cfg.paystack_secret_key = Some(SECRET.to_string());
    })
    .await;
    let caller = buyer();
    let placed = app.place_order_for(&caller, dec!(2500), delivery_form()).await;
    let reference = app
        .state
        .services
        .payments
        .initiate_payment(&caller, placed.order.id)
        .await
        .unwrap()
        .reference;

    let body = charge_success(&reference);
    let signature = sign_webhook_payload(SECRET, &body);

    let response = app
        .post_raw(
            "/api/v1/payments/callback",
            body.clone(),
            &[(SIGNATURE_HEADER, signature.as_str())],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], "success");

    let payment = payment_row(&app, &reference).await;
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.transaction_id.as_deref(), Some("302961"));
    assert!(payment.paid_at.is_some());

    let order = app
        .state
        .services
        .orders
        .get_order(&caller, placed.order.id)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.payment_status, OrderPaymentStatus::Completed);
    let first_paid_at = payment.paid_at;

    // Redelivery is acknowledged and changes nothing
    let response = app
        .post_raw(
            "/api/v1/payments/callback",
            body,
            &[(SIGNATURE_HEADER, signature.as_str())],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(payment_row(&app, &reference).await.paid_at, first_paid_at);
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let app = TestApp::with_config(|cfg| {
        cfg.paystack_secret_key = Some(SECRET.to_string());
    })
    .await;
    let caller = buyer();
    let placed = app.place_order_for(&caller, dec!(2500), delivery_form()).await;
    let reference = app
        .state
        .services
        .payments
        .initiate_payment(&caller, placed.order.id)
        .await
        .unwrap()
        .reference;

    let body = charge_success(&reference);
    let forged = sign_webhook_payload("not-the-secret", &body);

    let response = app
        .post_raw(
            "/api/v1/payments/callback",
            body.clone(),
            &[(SIGNATURE_HEADER, forged.as_str())],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.post_raw("/api/v1/payments/callback", body, &[]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(
        payment_row(&app, &reference).await.status,
        PaymentStatus::Pending
    );
}

#[tokio::test]
async fn test_webhook_outcomes_for_unknown_and_other_events() {
    let app = TestApp::new().await;

    let response = app
        .post_raw("/api/v1/payments/callback", charge_success("PAY-UNKNOWN"), &[])
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await["status"], "payment_not_found");

    let transfer = serde_json::to_vec(&json!({
        "event": "transfer.success",
        "data": {"reference": "TRF-1", "status": "success"}
    }))
    .unwrap();
    let response = app.post_raw("/api/v1/payments/callback", transfer, &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], "event_received");

    let response = app
        .post_raw("/api/v1/payments/callback", b"not json".to_vec(), &[])
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(read_json(response).await["status"], "error");
}

#[tokio::test]
async fn test_verify_settles_successful_gateway_charge() {
    let server = MockServer::start().await;
    let app = TestApp::with_config(|cfg| {
        cfg.paystack_base_url = server.uri();
        cfg.paystack_secret_key = Some(SECRET.to_string());
    })
    .await;
    let caller = buyer();
    let placed = app.place_order_for(&caller, dec!(2500), delivery_form()).await;
    let reference = app
        .state
        .services
        .payments
        .initiate_payment(&caller, placed.order.id)
        .await
        .unwrap()
        .reference;

    Mock::given(method("GET"))
        .and(path(format!("/transaction/verify/{}", reference)))
        .and(header("authorization", format!("Bearer {}", SECRET).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "message": "Verification successful",
            "data": {"id": 4099260516u64, "status": "success", "reference": reference}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = app
        .state
        .services
        .payments
        .verify_payment(&caller, &reference)
        .await
        .unwrap();
    assert!(result.verified);
    assert_eq!(result.payment_status, PaymentStatus::Completed);
    assert_eq!(result.order_status, OrderStatus::Paid);
    assert_eq!(result.order_payment_status, OrderPaymentStatus::Completed);

    // Already settled: answered locally without another gateway call
    let again = app
        .state
        .services
        .payments
        .verify_payment(&caller, &reference)
        .await
        .unwrap();
    assert!(again.verified);
}

#[tokio::test]
async fn test_verify_records_declined_charge() {
    let server = MockServer::start().await;
    let app = TestApp::with_config(|cfg| {
        cfg.paystack_base_url = server.uri();
        cfg.paystack_secret_key = Some(SECRET.to_string());
    })
    .await;
    let caller = buyer();
    let placed = app.place_order_for(&caller, dec!(2500), delivery_form()).await;
    let reference = app
        .state
        .services
        .payments
        .initiate_payment(&caller, placed.order.id)
        .await
        .unwrap()
        .reference;

    Mock::given(method("GET"))
        .and(path(format!("/transaction/verify/{}", reference)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "message": "Verification successful",
            "data": {"id": 1, "status": "failed", "gateway_response": "Declined"}
        })))
        .mount(&server)
        .await;

    let result = app
        .state
        .services
        .payments
        .verify_payment(&caller, &reference)
        .await
        .unwrap();
    assert!(!result.verified);
    assert_eq!(result.payment_status, PaymentStatus::Failed);
    assert_eq!(result.order_status, OrderStatus::Pending);
    assert_eq!(result.order_payment_status, OrderPaymentStatus::Pending);
}

#[tokio::test]
async fn test_verify_gateway_outage_leaves_payment_pending() {
    let server = MockServer::start().await;
    let app = TestApp::with_config(|cfg| {
        cfg.paystack_base_url = server.uri();
        cfg.paystack_secret_key = Some(SECRET.to_string());
    })
    .await;
    let caller = buyer();
    let placed = app.place_order_for(&caller, dec!(2500), delivery_form()).await;
    let reference = app
        .state
        .services
        .payments
        .initiate_payment(&caller, placed.order.id)
        .await
        .unwrap()
        .reference;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = app
        .state
        .services
        .payments
        .verify_payment(&caller, &reference)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ExternalServiceError(_));
    assert_eq!(
        payment_row(&app, &reference).await.status,
        PaymentStatus::Pending
    );

    // Another buyer cannot even see the payment
    let err = app
        .state
        .services
        .payments
        .verify_payment(&buyer(), &reference)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn test_bank_transfer_flow_until_staff_confirmation() {
    let app = TestApp::new().await;
    app.seed_bank_account("Zenith Bank", true).await;
    app.seed_bank_account("Access Bank", true).await;
    app.seed_bank_account("Closed Bank", false).await;

    let caller = buyer();
    let placed = app
        .place_order_for(
            &caller,
            dec!(3000),
            PlaceOrderRequest {
                payment_method: PaymentMethod::BankTransfer,
                ..delivery_form()
            },
        )
        .await;
    let order_id = placed.order.id;

    let payments = &app.state.services.payments;
    let instructions = payments.bank_transfer(&caller, order_id).await.unwrap();
    assert!(instructions.reference.starts_with("BANK-"));
    assert_eq!(instructions.amount.amount(), dec!(5000));
    let banks: Vec<&str> = instructions
        .accounts
        .iter()
        .map(|a| a.bank_name.as_str())
        .collect();
    assert_eq!(banks, vec!["Access Bank", "Zenith Bank"]);

    // Reopening the page keeps the same reference
    let again = payments.bank_transfer(&caller, order_id).await.unwrap();
    assert_eq!(again.reference, instructions.reference);

    let confirmation = payments.confirm_transfer(&caller, order_id).await.unwrap();
    assert_eq!(confirmation.reference, instructions.reference);
    assert_eq!(confirmation.order_status, OrderStatus::Pending);
    assert_eq!(confirmation.payment_status, PaymentStatus::Pending);

    let outcome = payments
        .confirm_bank_transfer(&instructions.reference)
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied);

    let order = app
        .state
        .services
        .orders
        .get_order(&caller, order_id)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.payment_status, OrderPaymentStatus::Completed);
    assert_eq!(order.payment_method, PaymentMethod::BankTransfer);

    assert_eq!(
        payments
            .confirm_bank_transfer(&instructions.reference)
            .await
            .unwrap(),
        ReconcileOutcome::AlreadyApplied
    );

    let err = payments.bank_transfer(&caller, order_id).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(ref msg) if msg == "This order has already been paid for.");
}

fn bank_transfer_form() -> PlaceOrderRequest {
    PlaceOrderRequest {
        payment_method: PaymentMethod::BankTransfer,
        ..delivery_form()
    }
}

#[tokio::test]
async fn test_gateway_cannot_settle_bank_transfers() {
    let app = TestApp::new().await;
    let caller = buyer();
    let placed = app
        .place_order_for(&caller, dec!(3000), bank_transfer_form())
        .await;
    let payments = &app.state.services.payments;
    let reference = payments
        .bank_transfer(&caller, placed.order.id)
        .await
        .unwrap()
        .reference;

    let payload: serde_json::Value = serde_json::from_slice(&charge_success(&reference)).unwrap();
    let outcome = payments.handle_webhook(&payload).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);

    let err = payments
        .verify_payment(&caller, &reference)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    let row = payment_row(&app, &reference).await;
    assert_eq!(row.status, PaymentStatus::Pending);
    assert!(row.paid_at.is_none());
    let order = app
        .state
        .services
        .orders
        .get_order(&caller, placed.order.id)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, OrderPaymentStatus::Pending);
}

#[tokio::test]
async fn test_staff_cannot_confirm_transfer_for_paid_order() {
    let app = TestApp::new().await;
    let caller = buyer();
    let placed = app
        .place_order_for(&caller, dec!(3000), bank_transfer_form())
        .await;
    let payments = &app.state.services.payments;

    let transfer = payments
        .bank_transfer(&caller, placed.order.id)
        .await
        .unwrap()
        .reference;
    let card = payments
        .initiate_payment(&caller, placed.order.id)
        .await
        .unwrap()
        .reference;

    let payload: serde_json::Value = serde_json::from_slice(&charge_success(&card)).unwrap();
    assert_eq!(
        payments.handle_webhook(&payload).await.unwrap(),
        WebhookOutcome::Applied
    );

    let err = payments.confirm_bank_transfer(&transfer).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(ref msg) if msg == "This order has already been paid for.");

    assert_eq!(payment_row(&app, &transfer).await.status, PaymentStatus::Pending);
    let completed = Payment::find()
        .filter(payment::Column::OrderId.eq(placed.order.id))
        .filter(payment::Column::Status.eq(PaymentStatus::Completed))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].reference, card);
}

#[tokio::test]
async fn test_confirm_transfer_needs_a_started_transfer() {
    let app = TestApp::new().await;
    let caller = buyer();
    let placed = app.place_order_for(&caller, dec!(3000), delivery_form()).await;

    let err = app
        .state
        .services
        .payments
        .confirm_transfer(&caller, placed.order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn test_admin_confirmation_route_requires_token() {
    let app = TestApp::new().await;
    let caller = buyer();
    let placed = app
        .place_order_for(
            &caller,
            dec!(3000),
            PlaceOrderRequest {
                payment_method: PaymentMethod::BankTransfer,
                ..delivery_form()
            },
        )
        .await;
    let reference = app
        .state
        .services
        .payments
        .bank_transfer(&caller, placed.order.id)
        .await
        .unwrap()
        .reference;
    let uri = format!("/api/v1/admin/payments/{}/confirm", reference);

    let response = app.request(Method::POST, &uri, None, &[]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.request_as_admin(Method::POST, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["applied"], true);
    assert_eq!(body["data"]["reference"], reference.as_str());
}
