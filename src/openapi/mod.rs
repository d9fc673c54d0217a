use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Parts Store API",
        version = "1.0.0",
        description = r#"
# Parts Store API

Storefront backend for an auto-parts shop: catalog, cart, checkout,
payments and delivery tracking.

## Identity

Signed-in callers are identified by the `x-user-id` header set by the
authentication gateway. Anonymous shoppers carry an `x-session-key`; one is
issued on the first response when none is sent. Checkout, orders and
payments require a signed-in caller.

## Amounts

Every amount is an object with a decimal string and its currency code:

```json
{ "amount": "4500.00", "currency": "NGN" }
```

## Errors

```json
{
  "error": "Not Found",
  "message": "Order 3b1c... not found",
  "request_id": "req-123",
  "timestamp": "2025-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Catalog", description = "Parts, categories and manufacturers"),
        (name = "Cart", description = "The caller's shopping cart"),
        (name = "Checkout", description = "Order placement"),
        (name = "Orders", description = "Order history and tracking"),
        (name = "Payments", description = "Gateway and bank transfer payments"),
        (name = "Shipping", description = "Shipping quotes"),
        (name = "Admin", description = "Administrative endpoints")
    ),
    paths(
        // Catalog
        crate::handlers::commerce::catalog::list_parts,
        crate::handlers::commerce::catalog::get_part,
        crate::handlers::commerce::catalog::get_part_by_slug,
        // Cart
        crate::handlers::commerce::carts::get_cart,
        crate::handlers::commerce::carts::cart_count,
        crate::handlers::commerce::carts::add_to_cart,
        crate::handlers::commerce::carts::update_cart_item,
        crate::handlers::commerce::carts::remove_cart_item,
        // Checkout
        crate::handlers::commerce::checkout::checkout_summary,
        crate::handlers::commerce::checkout::place_order,
        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::track_order,
        // Payments
        crate::handlers::payments::initiate_payment,
        crate::handlers::payments::bank_transfer,
        crate::handlers::payments::confirm_transfer,
        crate::handlers::payments::verify_payment,
        crate::handlers::payment_webhooks::payment_callback,
        // Shipping
        crate::handlers::shipping::shipping_rates,
        crate::handlers::shipping::calculate_shipping,
        // Admin
        crate::handlers::admin::confirm_bank_transfer,
        crate::handlers::admin::create_shipment,
        crate::handlers::admin::update_shipment_status,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::entities::payment::PaymentMethod,
            crate::entities::shipment::ShipmentStatus,
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_storefront_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Parts Store API"));
        assert!(json.contains("/api/v1/checkout"));
        assert!(json.contains("/api/v1/payments/callback"));
    }
}
