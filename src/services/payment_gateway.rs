//! Outbound integration with the hosted payment gateway.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha512;
use std::time::Duration;
use tracing::{instrument, warn};

use crate::auth::constant_time_eq;
use crate::config::AppConfig;
use crate::errors::ServiceError;

type HmacSha512 = Hmac<Sha512>;

const VERIFY_FAILED: &str = "Unable to verify payment";

/// What the gateway says about a transaction reference.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayVerification {
    /// Both the envelope flag and the transaction status reported success
    pub succeeded: bool,
    pub transaction_id: Option<String>,
    /// Transaction object on success, full envelope otherwise
    pub raw: Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Key handed to the hosted checkout popup
    fn public_key(&self) -> Option<&str>;

    /// Query the gateway for the outcome of `reference`.
    ///
    /// Transport failures and non-200 answers are reported as
    /// `ServiceError::ExternalServiceError` so callers leave state untouched.
    async fn verify_transaction(&self, reference: &str)
        -> Result<GatewayVerification, ServiceError>;
}

/// Paystack REST client.
#[derive(Clone)]
pub struct PaystackGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: Option<String>,
    public_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyEnvelope {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    data: Option<VerifyData>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    id: Option<Value>,
}

impl PaystackGateway {
    pub fn new(
        base_url: impl Into<String>,
        secret_key: Option<String>,
        public_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.filter(|k| !k.trim().is_empty()),
            public_key: public_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        Self::new(
            config.paystack_base_url.clone(),
            config.paystack_secret_key.clone(),
            config.paystack_public_key.clone(),
            Duration::from_secs(config.gateway_timeout_secs),
        )
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    #[instrument(skip(self))]
    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<GatewayVerification, ServiceError> {
        let Some(secret) = self.secret_key.as_deref() else {
            warn!("gateway secret key is not configured");
            return Err(ServiceError::ExternalServiceError(VERIFY_FAILED.to_string()));
        };

        let url = format!("{}/transaction/verify/{}", self.base_url, reference);
        let response = self
            .client
            .get(&url)
            .bearer_auth(secret)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "gateway verification request failed");
                ServiceError::ExternalServiceError(VERIFY_FAILED.to_string())
            })?;

        if response.status() != reqwest::StatusCode::OK {
            warn!(status = %response.status(), "gateway verification returned non-200");
            return Err(ServiceError::ExternalServiceError(VERIFY_FAILED.to_string()));
        }

        let body: Value = response.json().await.map_err(|e| {
            warn!(error = %e, "gateway verification body was not JSON");
            ServiceError::ExternalServiceError(VERIFY_FAILED.to_string())
        })?;

        Ok(interpret_verification(body))
    }
}

/// Success requires the envelope `status` flag and `data.status == "success"`.
fn interpret_verification(body: Value) -> GatewayVerification {
    let envelope: VerifyEnvelope = serde_json::from_value(body.clone()).unwrap_or(VerifyEnvelope {
        status: false,
        data: None,
    });

    let data = envelope.data.as_ref();
    let succeeded =
        envelope.status && data.and_then(|d| d.status.as_deref()) == Some("success");
    let transaction_id = data.and_then(|d| d.id.as_ref()).and_then(transaction_id_text);

    let raw = if succeeded {
        body.get("data").cloned().unwrap_or(body)
    } else {
        body
    };

    GatewayVerification {
        succeeded,
        transaction_id,
        raw,
    }
}

/// Gateway ids arrive as numbers; store them as text.
pub fn transaction_id_text(id: &Value) -> Option<String> {
    match id {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Checks the `x-paystack-signature` header: hex HMAC-SHA512 of the raw
/// body keyed with the secret key.
pub fn verify_webhook_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(expected.as_bytes(), signature.trim().to_ascii_lowercase().as_bytes())
}

/// Hex signature for `payload`; the counterpart of `verify_webhook_signature`.
pub fn sign_webhook_payload(secret: &str, payload: &[u8]) -> String {
    match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(payload);
            hex::encode(mac.finalize().into_bytes())
        }
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_needs_both_flags() {
        let ok = interpret_verification(json!({
            "status": true,
            "message": "Verification successful",
            "data": {"id": 4099260516u64, "status": "success", "reference": "PAY-1"}
        }));
        assert!(ok.succeeded);
        assert_eq!(ok.transaction_id.as_deref(), Some("4099260516"));
        assert_eq!(ok.raw["reference"], "PAY-1");

        let abandoned = interpret_verification(json!({
            "status": true,
            "data": {"id": 1, "status": "abandoned"}
        }));
        assert!(!abandoned.succeeded);
        assert_eq!(abandoned.raw["data"]["status"], "abandoned");

        let envelope_false = interpret_verification(json!({
            "status": false,
            "data": {"status": "success"}
        }));
        assert!(!envelope_false.succeeded);
    }

    #[test]
    fn malformed_bodies_are_failures() {
        let result = interpret_verification(json!({"unexpected": []}));
        assert!(!result.succeeded);
        assert_eq!(result.transaction_id, None);
    }

    #[test]
    fn webhook_signature_round_trip() {
        let body = br#"{"event":"charge.success"}"#;
        let sig = sign_webhook_payload("sk_test_secret", body);
        assert_eq!(sig.len(), 128);
        assert!(verify_webhook_signature("sk_test_secret", body, &sig));
        assert!(verify_webhook_signature("sk_test_secret", body, &sig.to_uppercase()));
        assert!(!verify_webhook_signature("other", body, &sig));
        assert!(!verify_webhook_signature("sk_test_secret", b"{}", &sig));
    }

    #[tokio::test]
    async fn missing_secret_is_an_external_error() {
        let gateway =
            PaystackGateway::new("http://127.0.0.1:9", None, None, Duration::from_secs(1)).unwrap();
        let err = gateway.verify_transaction("PAY-1").await.unwrap_err();
        assert!(matches!(err, ServiceError::ExternalServiceError(ref m) if m == VERIFY_FAILED));
    }
}
