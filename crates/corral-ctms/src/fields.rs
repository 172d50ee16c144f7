//! Static field table for the vendor's grouped record schema.
//!
//! One row per vendor field. Rows with an application name take part in
//! both conversion directions; rows with `app: None` exist so inbound data
//! is recognized (and dropped) rather than mistaken for schema drift.
//!
//! The application-side vocabulary is closed: an outbound field that is
//! neither in this table nor in the ignore set is an error.

use corral_core::{SyncError, SyncResult};
use std::collections::BTreeSet;

/// Validation applied to an outbound value before it is placed in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Trim surrounding whitespace, truncate to the given number of
    /// characters, omit if empty. Non-string scalars pass through.
    Text { max: usize },
    /// Pass the value through unchanged (booleans, vendor-typed scalars).
    Scalar,
    /// Normalize as a mailing country code; invalid values are omitted.
    Country,
    /// Normalize as a language code; invalid values are omitted.
    Language,
}

/// One vendor field and its application-side counterpart.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub group: &'static str,
    pub vendor: &'static str,
    /// Application field name; `None` means inbound-only recognition with
    /// no application counterpart.
    pub app: Option<&'static str>,
    pub rule: FieldRule,
}

const TEXT: FieldRule = FieldRule::Text { max: 255 };

/// The full vendor-field table.
pub const FIELD_TABLE: &[FieldMapping] = &[
    // amo group
    FieldMapping { group: "amo", vendor: "add_on_ids", app: None, rule: TEXT },
    FieldMapping { group: "amo", vendor: "display_name", app: Some("amo_display_name"), rule: TEXT },
    FieldMapping { group: "amo", vendor: "email_opt_in", app: None, rule: FieldRule::Scalar },
    FieldMapping { group: "amo", vendor: "language", app: None, rule: TEXT },
    FieldMapping { group: "amo", vendor: "last_login", app: Some("amo_last_login"), rule: TEXT },
    FieldMapping { group: "amo", vendor: "location", app: Some("amo_location"), rule: TEXT },
    FieldMapping { group: "amo", vendor: "profile_url", app: Some("amo_homepage"), rule: TEXT },
    FieldMapping { group: "amo", vendor: "user", app: Some("amo_user"), rule: FieldRule::Scalar },
    FieldMapping { group: "amo", vendor: "user_id", app: Some("amo_id"), rule: FieldRule::Text { max: 40 } },
    FieldMapping { group: "amo", vendor: "username", app: None, rule: TEXT },
    FieldMapping { group: "amo", vendor: "create_timestamp", app: None, rule: TEXT },
    FieldMapping { group: "amo", vendor: "update_timestamp", app: None, rule: TEXT },
    // email group
    FieldMapping { group: "email", vendor: "primary_email", app: Some("email"), rule: TEXT },
    FieldMapping { group: "email", vendor: "basket_token", app: Some("token"), rule: TEXT },
    FieldMapping { group: "email", vendor: "double_opt_in", app: Some("optin"), rule: FieldRule::Scalar },
    FieldMapping { group: "email", vendor: "sfdc_id", app: Some("id"), rule: TEXT },
    FieldMapping { group: "email", vendor: "first_name", app: Some("first_name"), rule: TEXT },
    FieldMapping { group: "email", vendor: "last_name", app: Some("last_name"), rule: TEXT },
    FieldMapping { group: "email", vendor: "mailing_country", app: Some("country"), rule: FieldRule::Country },
    FieldMapping { group: "email", vendor: "email_format", app: Some("format"), rule: FieldRule::Text { max: 1 } },
    FieldMapping { group: "email", vendor: "email_lang", app: Some("lang"), rule: FieldRule::Language },
    FieldMapping { group: "email", vendor: "has_opted_out_of_email", app: Some("optout"), rule: FieldRule::Scalar },
    FieldMapping { group: "email", vendor: "unsubscribe_reason", app: Some("reason"), rule: FieldRule::Text { max: 1000 } },
    FieldMapping { group: "email", vendor: "email_id", app: Some("email_id"), rule: TEXT },
    FieldMapping { group: "email", vendor: "create_timestamp", app: Some("created_date"), rule: TEXT },
    FieldMapping { group: "email", vendor: "update_timestamp", app: Some("last_modified_date"), rule: TEXT },
    // fxa group
    FieldMapping { group: "fxa", vendor: "fxa_id", app: Some("fxa_id"), rule: TEXT },
    FieldMapping { group: "fxa", vendor: "primary_email", app: Some("fxa_primary_email"), rule: TEXT },
    FieldMapping { group: "fxa", vendor: "created_date", app: Some("fxa_create_date"), rule: TEXT },
    FieldMapping { group: "fxa", vendor: "lang", app: Some("fxa_lang"), rule: TEXT },
    FieldMapping { group: "fxa", vendor: "first_service", app: Some("fxa_service"), rule: TEXT },
    FieldMapping { group: "fxa", vendor: "account_deleted", app: Some("fxa_deleted"), rule: FieldRule::Scalar },
    // mofo group: pending integration detail, recognized inbound only
    FieldMapping { group: "mofo", vendor: "mofo_email_id", app: None, rule: TEXT },
    FieldMapping { group: "mofo", vendor: "mofo_contact_id", app: None, rule: TEXT },
    FieldMapping { group: "mofo", vendor: "mofo_relevant", app: None, rule: FieldRule::Scalar },
    // vpn_waitlist group
    FieldMapping { group: "vpn_waitlist", vendor: "geo", app: Some("fpn_country"), rule: FieldRule::Text { max: 100 } },
    FieldMapping { group: "vpn_waitlist", vendor: "platform", app: Some("fpn_platform"), rule: FieldRule::Text { max: 100 } },
];

/// Application fields accepted outbound but intentionally not sent to this
/// vendor (legacy-CRM record markers and feature data the vendor does not
/// model).
pub const IGNORED_OUTBOUND: &[&str] = &[
    "_set_subscriber",
    "record_type",
    "postal_code",
    "source_url",
    "amo_deleted",
    "fxa_last_login",
];

/// Prefixes of application fields ignored outbound wholesale.
pub const IGNORED_OUTBOUND_PREFIXES: &[&str] = &["fsa_", "cv_"];

/// Whether an application field is in the outbound ignore set.
pub fn is_ignored_outbound(field: &str) -> bool {
    IGNORED_OUTBOUND.contains(&field)
        || IGNORED_OUTBOUND_PREFIXES
            .iter()
            .any(|prefix| field.starts_with(prefix))
}

/// Look up the row for an application field.
pub fn by_app_field(field: &str) -> Option<&'static FieldMapping> {
    FIELD_TABLE
        .iter()
        .find(|m| m.app == Some(field))
}

/// Rows belonging to a vendor group.
pub fn group_rows(group: &str) -> impl Iterator<Item = &'static FieldMapping> + '_ {
    FIELD_TABLE.iter().filter(move |m| m.group == group)
}

/// Whether the group name appears in the table at all.
pub fn is_known_group(group: &str) -> bool {
    FIELD_TABLE.iter().any(|m| m.group == group)
}

/// Verify table invariants: every application field maps to at most one
/// vendor field, and every (group, vendor) pair appears once.
///
/// Run once at startup; the table is static, so a failure here is a
/// programming error in this file.
pub fn verify_field_table() -> SyncResult<()> {
    let mut apps = BTreeSet::new();
    let mut vendor_pairs = BTreeSet::new();
    for mapping in FIELD_TABLE {
        if let Some(app) = mapping.app {
            if !apps.insert(app) {
                return Err(SyncError::invalid_config(format!(
                    "application field {app} mapped twice"
                )));
            }
        }
        if !vendor_pairs.insert((mapping.group, mapping.vendor)) {
            return Err(SyncError::invalid_config(format!(
                "vendor field {}.{} mapped twice",
                mapping.group, mapping.vendor
            )));
        }
    }
    Ok(())
}

/// Aliases accepted for mailing countries before the known-code check.
pub const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("usa", "us"),
    ("gbr", "gb"),
    ("can", "ca"),
    ("aus", "au"),
    ("deu", "de"),
    ("mex", "mx"),
];

/// ISO 3166-1 alpha-2 codes accepted as mailing countries.
pub const COUNTRY_CODES: &[&str] = &[
    "ad", "ae", "af", "ag", "ai", "al", "am", "ao", "aq", "ar", "as", "at", "au", "aw", "ax", "az",
    "ba", "bb", "bd", "be", "bf", "bg", "bh", "bi", "bj", "bl", "bm", "bn", "bo", "bq", "br", "bs",
    "bt", "bv", "bw", "by", "bz", "ca", "cc", "cd", "cf", "cg", "ch", "ci", "ck", "cl", "cm", "cn",
    "co", "cr", "cu", "cv", "cw", "cx", "cy", "cz", "de", "dj", "dk", "dm", "do", "dz", "ec", "ee",
    "eg", "eh", "er", "es", "et", "fi", "fj", "fk", "fm", "fo", "fr", "ga", "gb", "gd", "ge", "gf",
    "gg", "gh", "gi", "gl", "gm", "gn", "gp", "gq", "gr", "gs", "gt", "gu", "gw", "gy", "hk", "hm",
    "hn", "hr", "ht", "hu", "id", "ie", "il", "im", "in", "io", "iq", "ir", "is", "it", "je", "jm",
    "jo", "jp", "ke", "kg", "kh", "ki", "km", "kn", "kp", "kr", "kw", "ky", "kz", "la", "lb", "lc",
    "li", "lk", "lr", "ls", "lt", "lu", "lv", "ly", "ma", "mc", "md", "me", "mf", "mg", "mh", "mk",
    "ml", "mm", "mn", "mo", "mp", "mq", "mr", "ms", "mt", "mu", "mv", "mw", "mx", "my", "mz", "na",
    "nc", "ne", "nf", "ng", "ni", "nl", "no", "np", "nr", "nu", "nz", "om", "pa", "pe", "pf", "pg",
    "ph", "pk", "pl", "pm", "pn", "pr", "ps", "pt", "pw", "py", "qa", "re", "ro", "rs", "ru", "rw",
    "sa", "sb", "sc", "sd", "se", "sg", "sh", "si", "sj", "sk", "sl", "sm", "sn", "so", "sr", "ss",
    "st", "sv", "sx", "sy", "sz", "tc", "td", "tf", "tg", "th", "tj", "tk", "tl", "tm", "tn", "to",
    "tr", "tt", "tv", "tw", "tz", "ua", "ug", "um", "us", "uy", "uz", "va", "vc", "ve", "vg", "vi",
    "vn", "vu", "wf", "ws", "ye", "yt", "za", "zm", "zw",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_invariants_hold() {
        verify_field_table().unwrap();
    }

    #[test]
    fn test_app_field_lookup() {
        let mapping = by_app_field("fpn_country").unwrap();
        assert_eq!(mapping.group, "vpn_waitlist");
        assert_eq!(mapping.vendor, "geo");
        assert_eq!(mapping.rule, FieldRule::Text { max: 100 });

        assert!(by_app_field("add_on_ids").is_none());
        assert!(by_app_field("not_a_field").is_none());
    }

    #[test]
    fn test_ignored_outbound_set() {
        assert!(is_ignored_outbound("record_type"));
        assert!(is_ignored_outbound("fsa_school"));
        assert!(is_ignored_outbound("cv_days_interval"));
        assert!(!is_ignored_outbound("first_name"));
    }

    #[test]
    fn test_known_groups() {
        for group in ["amo", "email", "fxa", "mofo", "vpn_waitlist"] {
            assert!(is_known_group(group));
        }
        assert!(!is_known_group("favorites"));
    }

    #[test]
    fn test_country_codes_sorted_unique() {
        let mut sorted = COUNTRY_CODES.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, COUNTRY_CODES);
    }
}
