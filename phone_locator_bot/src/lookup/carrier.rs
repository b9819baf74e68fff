use crate::types::CarrierGroup;

/// Carrier names (and resold-network aliases) that bill through T-Mobile.
const TMOBILE_KEYWORDS: &[&str] = &[
    "T-MOBILE",
    "T MOBILE",
    "ELISKA WIRELESS VENTURES SUBSIDIARY I, LLC",
    "METROPCS",
    "METRO PCS",
    "SPRINT",
    "BANDWIDTH.COM-NSR-10X/1",
    "METRO PCS COMMUNICATIONS INC-SVR-10X/2",
    "METRO PCS-ROYAL ST. COMM-SVR-10X/2",
    "OMNIPOINT COMMUNICATIONS CAP OPERATIONS, LLC",
    "OMNIPOINT COMMUNICATIONS ENTERPRISES, LP",
    "OMNIPOINT COMMUNICATIONS MIDWEST OPERATIONS, LLC",
    "OMNIPOINT COMMUNICATIONS, INC. - CT",
    "OMNIPOINT COMMUNICATIONS, INC. - NJ",
    "OMNIPOINT COMMUNICATIONS, INC. - NY",
    "OMNIPOINT MIAMI E LICENSE, LLC",
    "POWERTEL ATLANTA LICENSES, INC.",
    "POWERTEL BIRMINGHAM LICENSES, INC.",
    "POWERTEL JACKSONVILLE LICENSES, INC.",
    "POWERTEL KENTUCKY LICENSES, INC.",
    "POWERTEL MEMPHIS LICENSES, INC.",
    "POWERTEL NASHVILLE LICENSES, INC.",
    "T-MOBILE USA, INC.",
    "T-MOBILE US-SVR-10X/2",
    "SPRINT PCS-SVR-10X/2",
];

const ATT_KEYWORDS: &[&str] = &["AT&T", "ATT", "CINGULAR", "CRICKET"];

const VERIZON_KEYWORDS: &[&str] = &["VERIZON", "CELLCO", "GTE", "ALLTEL"];

/// Map a raw carrier name to its group by keyword matching.
/// Case-insensitive; first matching group wins, checked in the order
/// T-Mobile, AT&T, Verizon.
pub fn classify(carrier_name: &str) -> CarrierGroup {
    let normalized = carrier_name.to_uppercase();

    let matches_any = |keywords: &[&str]| keywords.iter().any(|k| normalized.contains(k));

    if matches_any(TMOBILE_KEYWORDS) {
        CarrierGroup::TMobile
    } else if matches_any(ATT_KEYWORDS) {
        CarrierGroup::Att
    } else if matches_any(VERIZON_KEYWORDS) {
        CarrierGroup::Verizon
    } else {
        CarrierGroup::Other
    }
}

/// Group from the carrier API's pre-normalized name, when it gives one.
pub fn group_from_normalized(normalized_carrier: &str) -> Option<CarrierGroup> {
    if normalized_carrier.contains("T-Mobile") {
        Some(CarrierGroup::TMobile)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_major_carriers() {
        assert_eq!(classify("T-MOBILE USA, INC."), CarrierGroup::TMobile);
        assert_eq!(classify("Sprint Spectrum L.P."), CarrierGroup::TMobile);
        assert_eq!(classify("New Cingular Wireless PCS, LLC"), CarrierGroup::Att);
        assert_eq!(classify("VERIZON WIRELESS"), CarrierGroup::Verizon);
        assert_eq!(classify("Cellco Partnership"), CarrierGroup::Verizon);
        assert_eq!(classify("Random Co"), CarrierGroup::Other);
        assert_eq!(classify(""), CarrierGroup::Other);
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(classify("t-mobile usa, inc."), CarrierGroup::TMobile);
        assert_eq!(classify("verizon wireless"), CarrierGroup::Verizon);
    }

    #[test]
    fn tmobile_wins_over_later_groups() {
        // "SPRINT" and "GTE" both appear; T-Mobile's list is checked first.
        assert_eq!(classify("SPRINT GTE JOINT VENTURE"), CarrierGroup::TMobile);
    }

    #[test]
    fn normalized_name_only_maps_tmobile() {
        assert_eq!(
            group_from_normalized("T-Mobile US"),
            Some(CarrierGroup::TMobile)
        );
        assert_eq!(group_from_normalized("Verizon"), None);
    }
}
