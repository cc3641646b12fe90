use crate::{
    config::PaymentConfig,
    error::{ApiError, Result},
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::collections::HashMap;
use time::{macros::format_description, OffsetDateTime};
use tracing::{info, instrument};

type HmacSha512 = Hmac<Sha512>;

/// Provider-mandated signature field order. The request hash is the
/// HMAC-SHA512 of the present field values concatenated in exactly this
/// order (absent/empty fields skipped, no separator). Wire contract: do not
/// reorder.
pub const SIGNATURE_FIELD_ORDER: [&str; 24] = [
    "req_time",
    "merchant_id",
    "tran_id",
    "amount",
    "items",
    "shipping",
    "firstname",
    "lastname",
    "email",
    "phone",
    "type",
    "payment_option",
    "return_url",
    "cancel_url",
    "continue_success_url",
    "return_deeplink",
    "currency",
    "custom_fields",
    "return_params",
    "payout",
    "lifetime",
    "additional_params",
    "google_pay_token",
    "skip_success_page",
];

/// Compute the base64 HMAC-SHA512 request signature over the provider's
/// fixed field order. A field whose value is empty contributes nothing,
/// exactly as if the key were absent.
pub fn compute_request_signature(fields: &HashMap<&str, String>, api_key: &str) -> String {
    let mut payload = String::new();
    for name in SIGNATURE_FIELD_ORDER {
        if let Some(value) = fields.get(name) {
            if !value.is_empty() {
                payload.push_str(value);
            }
        }
    }

    let mut mac =
        HmacSha512::new_from_slice(api_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Provider timestamp: `YYYYMMDDHHmmss`, UTC, to the second.
pub fn format_req_time(at: OffsetDateTime) -> Result<String> {
    let fmt = format_description!("[year][month][day][hour][minute][second]");
    at.format(&fmt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("req_time formatting failed: {}", e)))
}

pub struct PaymentGateway {
    config: PaymentConfig,
    http_client: reqwest::Client,
}

impl PaymentGateway {
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            config: config.clone(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn purchase_endpoint(&self) -> String {
        format!("{}/purchase", self.config.base_url)
    }

    /// Build the signed form fields for checkout initiation. The client
    /// posts these to the provider's purchase endpoint.
    pub fn checkout_fields(
        &self,
        tran_id: &str,
        amount: &str,
        currency: &str,
        firstname: &str,
        lastname: &str,
        email: &str,
    ) -> Result<HashMap<String, String>> {
        let req_time = format_req_time(OffsetDateTime::now_utc())?;

        let mut fields: HashMap<&str, String> = HashMap::new();
        fields.insert("req_time", req_time);
        fields.insert("merchant_id", self.config.merchant_id.clone());
        fields.insert("tran_id", tran_id.to_string());
        fields.insert("amount", amount.to_string());
        fields.insert("firstname", firstname.to_string());
        fields.insert("lastname", lastname.to_string());
        fields.insert("email", email.to_string());
        fields.insert("type", "purchase".to_string());
        fields.insert("return_url", self.config.return_url.clone());
        fields.insert("cancel_url", self.config.cancel_url.clone());
        fields.insert("currency", currency.to_string());

        let hash = compute_request_signature(&fields, &self.config.api_key);

        let mut form: HashMap<String, String> = fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        form.insert("hash".to_string(), hash);

        Ok(form)
    }

    /// Poll the provider for the authoritative status of a transaction.
    ///
    /// The check request reuses the purchase HMAC recipe over the reduced
    /// field set {req_time, merchant_id, tran_id} and is submitted as a
    /// form-encoded POST. No timeout or retry policy: a hung upstream call
    /// blocks only the requesting call chain.
    #[instrument(skip(self))]
    pub async fn check_transaction(&self, tran_id: &str) -> Result<serde_json::Value> {
        let req_time = format_req_time(OffsetDateTime::now_utc())?;

        let mut fields: HashMap<&str, String> = HashMap::new();
        fields.insert("req_time", req_time.clone());
        fields.insert("merchant_id", self.config.merchant_id.clone());
        fields.insert("tran_id", tran_id.to_string());

        let hash = compute_request_signature(&fields, &self.config.api_key);

        let form = [
            ("req_time", req_time.as_str()),
            ("merchant_id", self.config.merchant_id.as_str()),
            ("tran_id", tran_id),
            ("hash", hash.as_str()),
        ];

        let response = self
            .http_client
            .post(format!("{}/check-transaction", self.config.base_url))
            .form(&form)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("check-transaction request failed: {}", e)))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("check-transaction bad response: {}", e)))?;

        info!(tran_id, "Provider check-transaction response received");

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn fields(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_signature_known_vector_reduced_set() {
        // Independently computed: HMAC-SHA512("20260115093045" + "ec4001" +
        // "txn-0001", "merchant-api-key"), base64.
        let f = fields(&[
            ("req_time", "20260115093045"),
            ("merchant_id", "ec4001"),
            ("tran_id", "txn-0001"),
        ]);
        assert_eq!(
            compute_request_signature(&f, "merchant-api-key"),
            "UacolYBuYpFWDh/MjIQhfddaaCFV56t72nJX2KNE9+Ho73SQ5gVbsCD/U1JD/eTeJO4+dq2Tcn3lJGib7qLTYw=="
        );
    }

    #[test]
    fn test_signature_known_vector_checkout_set() {
        let f = fields(&[
            ("req_time", "20260115093045"),
            ("merchant_id", "ec4001"),
            ("tran_id", "txn-0001"),
            ("amount", "5.00"),
            ("firstname", "Sokha"),
            ("email", "sokha@example.com"),
            ("type", "purchase"),
            ("payment_option", "cards"),
            ("currency", "USD"),
        ]);
        assert_eq!(
            compute_request_signature(&f, "merchant-api-key"),
            "ITgWRb9sF1v0eYAXwF52p7cnsSdSbWmZEyXShS1wWGA4jeRJCxBtCto5Bs4m4sgGwrqwvgwDhY1qSsln40AdSQ=="
        );
    }

    #[test]
    fn test_signature_is_deterministic() {
        let f = fields(&[
            ("req_time", "20260115093045"),
            ("merchant_id", "ec4001"),
            ("tran_id", "txn-0001"),
            ("amount", "9.99"),
        ]);
        let a = compute_request_signature(&f, "k");
        let b = compute_request_signature(&f, "k");
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_field_equals_absent_field() {
        let with_empty = fields(&[
            ("req_time", "20260115093045"),
            ("merchant_id", "ec4001"),
            ("tran_id", "txn-0001"),
            ("items", ""),
            ("phone", ""),
        ]);
        let without = fields(&[
            ("req_time", "20260115093045"),
            ("merchant_id", "ec4001"),
            ("tran_id", "txn-0001"),
        ]);
        assert_eq!(
            compute_request_signature(&with_empty, "k"),
            compute_request_signature(&without, "k")
        );
    }

    #[test]
    fn test_signature_uses_provider_order_not_insertion_order() {
        // HashMap has no order; the provider order places amount after
        // tran_id regardless of how the map was built. Swapping two values
        // must change the signature.
        let a = fields(&[
            ("req_time", "20260115093045"),
            ("merchant_id", "ec4001"),
            ("tran_id", "AAA"),
            ("amount", "BBB"),
        ]);
        let b = fields(&[
            ("req_time", "20260115093045"),
            ("merchant_id", "ec4001"),
            ("tran_id", "BBB"),
            ("amount", "AAA"),
        ]);
        assert_ne!(
            compute_request_signature(&a, "k"),
            compute_request_signature(&b, "k")
        );
    }

    #[test]
    fn test_req_time_format() {
        let t = datetime!(2026-01-15 09:30:45 UTC);
        assert_eq!(format_req_time(t).unwrap(), "20260115093045");
    }
}
