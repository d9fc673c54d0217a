mod common;

use assert_matches::assert_matches;
use common::{buyer, delivery_form, TestApp};
use partstore_api::{
    auth::CallerIdentity,
    entities::{
        order::{OrderPaymentStatus, OrderStatus},
        payment::PaymentMethod,
        Order, OrderItem,
    },
    errors::ServiceError,
    services::commerce::{NextStep, PlaceOrderRequest},
};
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};
use uuid::Uuid;

#[tokio::test]
async fn test_checkout_snapshots_prices_and_decrements_stock() {
    let app = TestApp::new().await;
    let caller = buyer();

    let pads = app.seed_part("Brake Pad Set", dec!(1000), 5).await;
    let disc = app.seed_part("Brake Disc", dec!(500), 1).await;
    app.add_to_cart(&caller, pads.id, 2).await;
    app.add_to_cart(&caller, disc.id, 1).await;

    let placed = app
        .state
        .services
        .checkout
        .place_order(&caller, delivery_form())
        .await
        .expect("order placed");

    let order = &placed.order;
    assert!(order.order_number.starts_with("ORD-"));
    assert_eq!(order.subtotal.amount(), dec!(2500));
    assert_eq!(order.shipping_amount.amount(), dec!(2000));
    assert_eq!(order.total_amount.amount(), dec!(4500));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, OrderPaymentStatus::Pending);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.contact_email.as_deref(), Some("ada@example.com"));
    assert_eq!(order.shipping_address.city, "Lagos Island");

    let pad_line = order
        .items
        .iter()
        .find(|line| line.part_id == pads.id)
        .expect("pad line");
    assert_eq!(pad_line.quantity, 2);
    assert_eq!(pad_line.unit_price.amount(), dec!(1000));
    assert_eq!(pad_line.total_price.amount(), dec!(2000));

    assert_eq!(
        placed.next_step,
        NextStep::InitiateGatewayPayment { order_id: order.id }
    );

    assert_eq!(app.part(pads.id).await.stock_quantity, 3);
    assert_eq!(app.part(disc.id).await.stock_quantity, 0);
    assert_eq!(
        app.state.services.cart.cart_count(&caller).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_checkout_fails_whole_order_when_any_line_is_short() {
    let app = TestApp::new().await;
    let caller = buyer();

    let pads = app.seed_part("Brake Pad Set", dec!(1000), 5).await;
    let disc = app.seed_part("Brake Disc", dec!(500), 3).await;
    app.add_to_cart(&caller, pads.id, 2).await;
    app.add_to_cart(&caller, disc.id, 3).await;

    // Someone else bought discs after this cart was filled
    app.state
        .services
        .catalog
        .set_stock(disc.id, 1)
        .await
        .unwrap();

    let err = app
        .state
        .services
        .checkout
        .place_order(&caller, delivery_form())
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InsufficientStock(ref msg) if msg.contains("Brake Disc (requested 3, available 1)"));

    assert_eq!(app.part(pads.id).await.stock_quantity, 5);
    assert_eq!(app.part(disc.id).await.stock_quantity, 1);
    assert_eq!(
        app.state.services.cart.cart_count(&caller).await.unwrap(),
        5
    );
    let (orders, total) = app
        .state
        .services
        .orders
        .list_orders(&caller, 1, 10)
        .await
        .unwrap();
    assert!(orders.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_concurrent_checkouts_cannot_oversell_last_unit() {
    let app = TestApp::new().await;
    let first = buyer();
    let second = buyer();

    let pump = app.seed_part("Water Pump", dec!(15000), 1).await;
    app.add_to_cart(&first, pump.id, 1).await;
    app.add_to_cart(&second, pump.id, 1).await;

    let checkout = &app.state.services.checkout;
    let (a, b) = tokio::join!(
        checkout.place_order(&first, delivery_form()),
        checkout.place_order(&second, delivery_form()),
    );

    let (winner, loser, err) = match (a, b) {
        (Ok(_), Err(err)) => (&first, &second, err),
        (Err(err), Ok(_)) => (&second, &first, err),
        (a, b) => panic!("expected exactly one checkout to succeed: {:?} / {:?}", a.is_ok(), b.is_ok()),
    };
    assert_matches!(err, ServiceError::InsufficientStock(ref msg) if msg.contains("Water Pump (requested 1, available 0)"));

    let db = &*app.state.db;
    assert_eq!(Order::find().count(db).await.unwrap(), 1);
    assert_eq!(OrderItem::find().count(db).await.unwrap(), 1);
    assert_eq!(app.part(pump.id).await.stock_quantity, 0);

    let cart = &app.state.services.cart;
    assert_eq!(cart.cart_count(winner).await.unwrap(), 0);
    assert_eq!(cart.cart_count(loser).await.unwrap(), 1);
}

#[tokio::test]
async fn test_checkout_rejects_empty_cart_and_anonymous_callers() {
    let app = TestApp::new().await;

    let err = app
        .state
        .services
        .checkout
        .place_order(&buyer(), delivery_form())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(ref msg) if msg == "Your cart is empty");

    let session = CallerIdentity::session("guest-session");
    let part = app.seed_part("Oil Filter", dec!(300), 4).await;
    app.add_to_cart(&session, part.id, 1).await;
    let err = app
        .state
        .services
        .checkout
        .place_order(&session, delivery_form())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unauthorized(_));
}

#[tokio::test]
async fn test_checkout_uses_selected_shipping_method() {
    let app = TestApp::new().await;
    let caller = buyer();
    app.seed_shipping_method("Standard", dec!(2000)).await;
    let express = app.seed_shipping_method("Express", dec!(5000)).await;

    let part = app.seed_part("Spark Plug", dec!(800), 10).await;
    app.add_to_cart(&caller, part.id, 1).await;

    let placed = app
        .state
        .services
        .checkout
        .place_order(
            &caller,
            PlaceOrderRequest {
                shipping_method_id: Some(express.id),
                ..delivery_form()
            },
        )
        .await
        .unwrap();

    assert_eq!(placed.order.shipping_amount.amount(), dec!(5000));
    assert_eq!(placed.order.total_amount.amount(), dec!(5800));
}

#[tokio::test]
async fn test_checkout_rejects_unknown_shipping_method_without_side_effects() {
    let app = TestApp::new().await;
    let caller = buyer();
    let part = app.seed_part("Spark Plug", dec!(800), 10).await;
    app.add_to_cart(&caller, part.id, 2).await;

    let err = app
        .state
        .services
        .checkout
        .place_order(
            &caller,
            PlaceOrderRequest {
                shipping_method_id: Some(Uuid::new_v4()),
                ..delivery_form()
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::NotFound(ref msg) if msg == "Invalid shipping method selected");
    assert_eq!(app.part(part.id).await.stock_quantity, 10);
}

#[tokio::test]
async fn test_cash_on_delivery_orders_start_processing() {
    let app = TestApp::new().await;
    let caller = buyer();

    let placed = app
        .place_order_for(
            &caller,
            dec!(1500),
            PlaceOrderRequest {
                payment_method: PaymentMethod::CashOnDelivery,
                ..delivery_form()
            },
        )
        .await;

    assert_eq!(placed.order.status, OrderStatus::Processing);
    assert_eq!(placed.order.payment_status, OrderPaymentStatus::Pending);
    assert_eq!(placed.next_step, NextStep::Confirmed { order_id: placed.order.id });
}

#[tokio::test]
async fn test_checkout_can_ship_to_saved_profile_address() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let caller = CallerIdentity::user(user_id);
    app.seed_profile(user_id, Some("profile@example.com")).await;

    let summary_part = app.seed_part("Wiper Blade", dec!(700), 3).await;
    app.add_to_cart(&caller, summary_part.id, 1).await;

    let summary = app
        .state
        .services
        .checkout
        .checkout_summary(&caller)
        .await
        .unwrap();
    assert_eq!(summary.subtotal.amount(), dec!(700));
    assert_eq!(summary.total.amount(), dec!(2700));
    assert_eq!(
        summary.saved_address.as_ref().map(|a| a.city.as_str()),
        Some("Ikeja")
    );

    let placed = app
        .state
        .services
        .checkout
        .place_order(
            &caller,
            PlaceOrderRequest {
                first_name: "Ada".into(),
                last_name: "Obi".into(),
                phone: "08031234567".into(),
                use_profile_address: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(placed.order.shipping_address.address, "4 Allen Avenue");
    assert_eq!(placed.order.shipping_address.phone, "08031234567");
    assert_eq!(
        placed.order.contact_email.as_deref(),
        Some("profile@example.com")
    );
}

#[tokio::test]
async fn test_checkout_reports_missing_delivery_fields() {
    let app = TestApp::new().await;
    let caller = buyer();
    let part = app.seed_part("Wiper Blade", dec!(700), 3).await;
    app.add_to_cart(&caller, part.id, 1).await;

    let err = app
        .state
        .services
        .checkout
        .place_order(
            &caller,
            PlaceOrderRequest {
                city: None,
                state: Some(" ".into()),
                ..delivery_form()
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(ref msg) if msg == "Missing delivery fields: city, state");
}

#[tokio::test]
async fn test_orders_are_scoped_to_their_owner() {
    let app = TestApp::new().await;
    let owner = buyer();
    let placed = app.place_order_for(&owner, dec!(900), delivery_form()).await;

    let fetched = app
        .state
        .services
        .orders
        .get_order(&owner, placed.order.id)
        .await
        .unwrap();
    assert_eq!(fetched.order_number, placed.order.order_number);
    assert_eq!(fetched.items.len(), 1);

    let err = app
        .state
        .services
        .orders
        .get_order(&buyer(), placed.order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let (orders, total) = app
        .state
        .services
        .orders
        .list_orders(&owner, 1, 10)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(orders[0].id, placed.order.id);
}
