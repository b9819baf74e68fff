use serde::Deserialize;

const VERIFY_URL: &str = "https://api.veriphone.io/v2/verify";

/// Body of a Veriphone `/v2/verify` response. Fields the API omits on
/// failures all decode to their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub phone_valid: bool,
    pub carrier: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub phone_region: Option<String>,
    pub e164: Option<String>,
}

impl VerifyResponse {
    /// The API both answered and judged the number valid.
    pub fn is_success(&self) -> bool {
        self.status == "success" && self.phone_valid
    }

    /// True when the carrier field is missing or the "Unknown Carrier"
    /// sentinel, meaning the secondary carrier API is worth asking.
    pub fn needs_carrier_lookup(&self) -> bool {
        matches!(self.carrier.as_deref(), None | Some("") | Some("Unknown Carrier"))
    }
}

/// Validate a number against Veriphone. Any HTTP or decode failure
/// surfaces as an error; the caller decides how much that matters.
pub async fn verify(
    client: &reqwest::Client,
    phone: &str,
    api_key: &str,
) -> Result<VerifyResponse, reqwest::Error> {
    client
        .get(VERIFY_URL)
        .query(&[("phone", phone), ("key", api_key)])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
}

#[cfg(test)]
mod tests {
    use super::VerifyResponse;

    #[test]
    fn carrier_lookup_only_when_carrier_is_unknown() {
        let mut response = VerifyResponse {
            status: "success".to_string(),
            phone_valid: true,
            carrier: Some("T-Mobile USA, Inc.".to_string()),
            ..Default::default()
        };
        assert!(response.is_success());
        assert!(!response.needs_carrier_lookup());

        response.carrier = Some("Unknown Carrier".to_string());
        assert!(response.needs_carrier_lookup());
        response.carrier = None;
        assert!(response.needs_carrier_lookup());
    }

    #[test]
    fn error_bodies_decode_to_failure() {
        let response: VerifyResponse =
            serde_json::from_str(r#"{"status": "error", "message": "key invalid"}"#)
                .expect("unknown fields should be ignored");
        assert!(!response.is_success());
    }
}
