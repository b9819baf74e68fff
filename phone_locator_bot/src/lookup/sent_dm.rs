use std::time::Duration;

use serde::Deserialize;

use super::{carrier, proxy::ProxyConfig, proxy::ProxyRotator, rate_limit::RateLimiter};
use crate::types::CarrierInfo;

const LOOKUP_URL: &str = "https://www.sent.dm/api/phone-lookup";
const TEST_URL: &str = "https://www.sent.dm/api/test-proxy";

/// Attempts per number before giving up on carrier info.
const LOOKUP_ATTEMPTS: u32 = 3;

const PROXY_TEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct LookupResponse {
    data: Option<LookupData>,
}

#[derive(Debug, Deserialize)]
struct LookupData {
    carrier: Option<CarrierPayload>,
}

#[derive(Debug, Deserialize)]
struct CarrierPayload {
    name: Option<String>,
    normalized_carrier: Option<String>,
}

/// Ask sent.dm who carries `phone`. Rate-limited and proxy-rotated;
/// a 429 rotates to the next proxy and retries, any other error ends
/// the attempt loop. Returns `None` when carrier info isn't available,
/// whatever the reason.
pub async fn check_carrier(
    limiter: &RateLimiter,
    proxies: &ProxyRotator,
    phone: &str,
) -> Option<CarrierInfo> {
    for attempt in 0..LOOKUP_ATTEMPTS {
        limiter.await_slot().await;
        limiter.record().await;

        let proxy = proxies.next();
        if proxy.is_some() {
            log::debug!(
                "Using proxy #{} for carrier lookup of {}",
                proxies.current_index(),
                phone
            );
        }

        match lookup_once(proxy.as_ref(), phone).await {
            Ok(info) => return info,
            Err(e) if is_rate_limited(&e) => {
                log::info!(
                    "Carrier API rate limit hit (attempt {}/{}), rotating to next proxy",
                    attempt + 1,
                    LOOKUP_ATTEMPTS
                );
            }
            Err(e) => {
                log::error!("Error checking carrier for {}: {}", phone, e);
                return None;
            }
        }
    }

    None
}

async fn lookup_once(
    proxy: Option<&ProxyConfig>,
    phone: &str,
) -> Result<Option<CarrierInfo>, reqwest::Error> {
    let mut builder = reqwest::Client::builder();
    if let Some(proxy) = proxy {
        builder = builder.proxy(proxy.to_reqwest()?);
    }
    let client = builder.build()?;

    let response: LookupResponse = client
        .get(LOOKUP_URL)
        .query(&[("phone", phone)])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(response
        .data
        .and_then(|data| data.carrier)
        .map(|payload| {
            let name = payload.name.unwrap_or_default();
            let group = payload
                .normalized_carrier
                .as_deref()
                .and_then(carrier::group_from_normalized)
                .unwrap_or_else(|| carrier::classify(&name));
            CarrierInfo { name, group }
        }))
}

fn is_rate_limited(error: &reqwest::Error) -> bool {
    error.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS)
}

/// Probe one proxy with a short request through it.
pub async fn test_proxy(proxy: &ProxyConfig) -> Result<(), reqwest::Error> {
    let client = reqwest::Client::builder()
        .proxy(proxy.to_reqwest()?)
        .timeout(PROXY_TEST_TIMEOUT)
        .build()?;

    client.get(TEST_URL).send().await?.error_for_status()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CarrierGroup;

    #[test]
    fn carrier_payload_decodes_nested_shape() {
        let body = r#"{"data": {"carrier": {"name": "Metro PCS", "normalized_carrier": "T-Mobile"}}}"#;
        let response: LookupResponse = serde_json::from_str(body).unwrap();
        let payload = response.data.unwrap().carrier.unwrap();
        assert_eq!(payload.name.as_deref(), Some("Metro PCS"));
        assert_eq!(
            carrier::group_from_normalized(payload.normalized_carrier.as_deref().unwrap()),
            Some(CarrierGroup::TMobile)
        );
    }

    #[test]
    fn missing_carrier_section_is_none() {
        let response: LookupResponse = serde_json::from_str(r#"{"data": {}}"#).unwrap();
        assert!(response.data.unwrap().carrier.is_none());
    }
}
