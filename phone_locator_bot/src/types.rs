use html_escape::encode_text;

use crate::lookup::veriphone::VerifyResponse;

/// Carrier group a phone number gets filed under for display and history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierGroup {
    TMobile,
    Att,
    Verizon,
    Other,
}

impl CarrierGroup {
    /// Tag stored in lookup history records.
    pub fn as_str(self) -> &'static str {
        match self {
            CarrierGroup::TMobile => "tmobile",
            CarrierGroup::Att => "att",
            CarrierGroup::Verizon => "verizon",
            CarrierGroup::Other => "other",
        }
    }

    /// Name shown to users next to the raw carrier name.
    pub fn display_name(self) -> &'static str {
        match self {
            CarrierGroup::TMobile => "T-Mobile",
            CarrierGroup::Att => "AT&T",
            CarrierGroup::Verizon => "Verizon",
            CarrierGroup::Other => "Other-Mobile",
        }
    }
}

/// Carrier name as reported upstream, plus the group it maps to.
#[derive(Debug, Clone)]
pub struct CarrierInfo {
    pub name: String,
    pub group: CarrierGroup,
}

/// Outcome of looking up one phone number. Immutable once built;
/// `message` is the exact HTML block shown to the user.
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub input: String,
    pub valid: bool,
    pub country: Option<String>,
    pub region: Option<String>,
    pub carrier: Option<CarrierInfo>,
    pub message: String,
}

impl LookupResult {
    /// Input that could not be parsed as a phone number at all.
    pub fn parse_error(input: &str) -> Self {
        Self {
            input: input.to_string(),
            valid: false,
            country: None,
            region: None,
            carrier: None,
            message: format!(
                "📞Phone Number: {input}\n❌ Error parsing phone number. Please check the format."
            ),
        }
    }

    /// Input that parsed but isn't a valid number anywhere.
    pub fn invalid(input: &str) -> Self {
        Self {
            input: input.to_string(),
            valid: false,
            country: None,
            region: None,
            carrier: None,
            message: format!("📞Phone Number: {input}\n❌ Invalid phone number."),
        }
    }

    /// The validation API declined the number, or wasn't reachable at all.
    /// Whatever fields it did report still go into history.
    pub fn validation_failed(input: &str, data: Option<&VerifyResponse>) -> Self {
        Self {
            input: input.to_string(),
            valid: false,
            country: data.and_then(|d| d.country.clone()),
            region: data.and_then(|d| d.phone_region.clone()),
            carrier: data.and_then(|d| d.carrier.clone()).map(|name| CarrierInfo {
                group: crate::lookup::carrier::classify(&name),
                name,
            }),
            message: format!("📞Phone Number: {input}\n❌ Phone number validation failed."),
        }
    }

    /// Placeholder for a batch slot whose worker died.
    pub fn failed_item(input: &str) -> Self {
        Self {
            input: input.to_string(),
            valid: false,
            country: None,
            region: None,
            carrier: None,
            message: format!("📞Phone Number: {input}\n⚠️ Error processing this number."),
        }
    }

    /// A validated number, with carrier info already resolved.
    pub fn success(input: &str, data: &VerifyResponse, carrier: CarrierInfo) -> Self {
        let phone = data.e164.clone().unwrap_or_else(|| input.to_string());
        let country = data.country.clone().unwrap_or_else(|| "Unknown".to_string());
        let flag = country_flag(data.country_code.as_deref().unwrap_or(""));
        let region = data
            .phone_region
            .clone()
            .unwrap_or_else(|| "N/A".to_string());

        let message = format!(
            "📞Phone Number: {phone}\n✅Status: Success\n🌍Country: {country} {flag}\n📍Region: {region}\n📶<code>{}</code> ({})",
            encode_text(&carrier.name),
            carrier.group.display_name(),
        );

        Self {
            input: input.to_string(),
            valid: true,
            country: Some(country),
            region: data.phone_region.clone(),
            carrier: Some(carrier),
            message,
        }
    }
}

/// Flag emoji for a 2-letter country code: each letter maps to its
/// regional indicator symbol, offset 0x1F1E6 from 'A'.
pub fn country_flag(country_code: &str) -> String {
    if country_code.len() != 2 || !country_code.chars().all(|c| c.is_ascii_alphabetic()) {
        return String::new();
    }

    country_code
        .chars()
        .filter_map(|c| char::from_u32(0x1F1E6 + (c.to_ascii_uppercase() as u32 - 'A' as u32)))
        .collect()
}
