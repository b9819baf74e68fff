pub mod batch;
pub mod cache;
pub mod carrier;
pub mod progress;
pub mod proxy;
pub mod rate_limit;
pub mod sent_dm;
pub mod veriphone;

use std::sync::{atomic::AtomicUsize, Arc};
use std::time::Duration;

use crate::{
    database::Database,
    types::{CarrierInfo, LookupResult},
};

use self::cache::ResultCache;
use self::proxy::ProxyRotator;
use self::rate_limit::RateLimiter;
use self::veriphone::VerifyResponse;

/// sent.dm allows 15 requests per rolling minute.
const SENT_DM_MAX_REQUESTS: usize = 15;
const SENT_DM_WINDOW: Duration = Duration::from_secs(60);

/// Everything one phone lookup needs: the database, an HTTP client for
/// the primary API, and the shared limiter/rotation/cache state.
/// Constructed once at startup and injected into the handlers.
pub struct LookupEngine {
    db: Arc<Database>,
    http: reqwest::Client,
    rate_limiter: RateLimiter,
    pub proxies: ProxyRotator,
    cache: ResultCache,
}

impl LookupEngine {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            http: reqwest::Client::new(),
            rate_limiter: RateLimiter::new(SENT_DM_MAX_REQUESTS, SENT_DM_WINDOW),
            proxies: ProxyRotator::new(),
            cache: ResultCache::new(cache::DEFAULT_TTL, cache::DEFAULT_CAPACITY),
        }
    }

    /// Look up every number in the batch with bounded concurrency,
    /// preserving input order.
    pub async fn run_batch(
        self: Arc<Self>,
        numbers: Vec<String>,
        user_id: &str,
        completed: Arc<AtomicUsize>,
    ) -> Vec<LookupResult> {
        let engine = self;
        let user_id = user_id.to_string();

        batch::run_batch(numbers, completed, move |number| {
            let engine = Arc::clone(&engine);
            let user_id = user_id.clone();
            async move { engine.lookup(&number, &user_id).await }
        })
        .await
    }

    /// Look up a single phone number. Never fails: every error branch
    /// is converted into a user-facing result, and a history record is
    /// written whatever happens.
    pub async fn lookup(&self, raw_number: &str, user_id: &str) -> LookupResult {
        if let Some(cached) = self.cache.get(raw_number) {
            log::debug!("Cache hit for {raw_number}");
            // Cache hits still count in the audit trail.
            self.record_history(user_id, &cached).await;
            return cached;
        }

        let Some(number) = parse_phone(raw_number) else {
            log::debug!("Could not parse {raw_number} as a phone number");
            let result = LookupResult::parse_error(raw_number);
            // Parse errors are not cached; a typo shouldn't occupy a slot.
            self.record_history(user_id, &result).await;
            return result;
        };

        let result = if !phonenumber::is_valid(&number) {
            log::debug!("Invalid phone number: {raw_number}");
            LookupResult::invalid(raw_number)
        } else {
            match self.verify_number(raw_number).await {
                Some(data) => {
                    let looked_up = if data.is_success() && data.needs_carrier_lookup() {
                        sent_dm::check_carrier(&self.rate_limiter, &self.proxies, raw_number)
                            .await
                    } else {
                        None
                    };
                    build_verified_result(raw_number, &data, looked_up)
                }
                None => LookupResult::validation_failed(raw_number, None),
            }
        };

        self.record_history(user_id, &result).await;
        self.cache.put(raw_number, result.clone());
        result
    }

    /// Primary validation call. `None` means the call never produced a
    /// usable response; the lookup degrades to "validation failed".
    async fn verify_number(&self, raw_number: &str) -> Option<VerifyResponse> {
        let Some(api_key) = self.db.next_api_key().await else {
            log::warn!("No validation API key available");
            return None;
        };

        match veriphone::verify(&self.http, raw_number, &api_key).await {
            Ok(data) => Some(data),
            Err(e) => {
                log::error!("Error with validation API: {e}");
                None
            }
        }
    }

    /// History writes must never fail a lookup.
    async fn record_history(&self, user_id: &str, result: &LookupResult) {
        if let Err(e) = self.db.record_lookup(user_id, result).await {
            log::error!("Error saving lookup history: {e}");
        }
    }
}

/// Decide what a primary-API response means, folding in carrier info
/// from the secondary API when it was consulted.
fn build_verified_result(
    raw_number: &str,
    data: &VerifyResponse,
    looked_up: Option<CarrierInfo>,
) -> LookupResult {
    if !data.is_success() {
        return LookupResult::validation_failed(raw_number, Some(data));
    }

    let carrier = looked_up.unwrap_or_else(|| {
        // Fall back to the primary API's carrier field, classified locally.
        let name = data
            .carrier
            .clone()
            .unwrap_or_else(|| "Unknown Carrier".to_string());
        let group = carrier::classify(&name);
        CarrierInfo { name, group }
    });

    LookupResult::success(raw_number, data, carrier)
}

/// Numbers with a `+` prefix parse as international; everything else is
/// assumed to be a US number.
fn parse_phone(raw: &str) -> Option<phonenumber::PhoneNumber> {
    if raw.starts_with('+') {
        phonenumber::parse(None, raw).ok()
    } else {
        phonenumber::parse(Some(phonenumber::country::Id::US), raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CarrierGroup;

    fn mock_verify_response() -> VerifyResponse {
        serde_json::from_value(serde_json::json!({
            "status": "success",
            "phone_valid": true,
            "carrier": "T-Mobile USA, Inc.",
            "country": "United States",
            "country_code": "US",
            "phone_region": "CA",
            "e164": "+14155552671"
        }))
        .unwrap()
    }

    #[test]
    fn verified_result_formats_country_and_carrier() {
        let data = mock_verify_response();
        let result = build_verified_result("+14155552671", &data, None);

        assert!(result.valid);
        let carrier = result.carrier.as_ref().unwrap();
        assert_eq!(carrier.group, CarrierGroup::TMobile);
        assert!(result.message.contains("+14155552671"));
        assert!(result.message.contains("United States \u{1F1FA}\u{1F1F8}"));
        assert!(result.message.contains("📍Region: CA"));
        assert!(result.message.contains("(T-Mobile)"));
    }

    #[test]
    fn secondary_carrier_overrides_primary_field() {
        let mut data = mock_verify_response();
        data.carrier = Some("Unknown Carrier".to_string());

        let looked_up = CarrierInfo {
            name: "Cellco Partnership".to_string(),
            group: CarrierGroup::Verizon,
        };
        let result = build_verified_result("+14155552671", &data, Some(looked_up));
        assert!(result.message.contains("(Verizon)"));
        assert!(result.message.contains("Cellco Partnership"));
    }

    #[test]
    fn failed_validation_keeps_reported_fields_for_history() {
        let data = VerifyResponse {
            status: "success".to_string(),
            phone_valid: false,
            country: Some("United States".to_string()),
            ..Default::default()
        };
        let result = build_verified_result("+14155550000", &data, None);
        assert!(!result.valid);
        assert_eq!(result.country.as_deref(), Some("United States"));
        assert!(result.message.contains("validation failed"));
    }

    #[tokio::test]
    async fn unparseable_input_short_circuits_without_any_api_call() {
        let db = Database::new_in_memory().await.unwrap();
        let engine = LookupEngine::new(Arc::clone(&db));

        let result = engine.lookup("abc", "42").await;
        assert_eq!(
            result.message,
            "📞Phone Number: abc\n❌ Error parsing phone number. Please check the format."
        );

        // The parse error is recorded, not cached.
        assert_eq!(db.history_count().await.unwrap(), 1);
        assert!(engine.cache.is_empty());
    }

    #[tokio::test]
    async fn invalid_number_is_cached_and_rechecks_hit_history() {
        let db = Database::new_in_memory().await.unwrap();
        let engine = LookupEngine::new(Arc::clone(&db));

        // Parses fine but is too short to be a real number anywhere.
        let first = engine.lookup("+1999999", "42").await;
        assert_eq!(
            first.message,
            "📞Phone Number: +1999999\n❌ Invalid phone number."
        );
        assert_eq!(engine.cache.len(), 1);

        let second = engine.lookup("+1999999", "42").await;
        assert_eq!(second.message, first.message);
        assert_eq!(db.history_count().await.unwrap(), 2);
    }
}
