//! Identity resolution against the vendor's alternate-identifier search.
//!
//! Callers hand over whichever identifiers they have; resolution picks the
//! strongest one. A vendor email id skips the search entirely and fetches
//! the record directly. Everything else goes through the filtered
//! multi-record search with a strict cardinality policy: zero matches is a
//! valid "no contact", more than one is a data-integrity failure the
//! caller must not guess around.

use crate::client::CtmsClient;
use corral_core::{EmailId, SyncError, SyncResult};
use serde_json::Value;

/// One alternate identifier for a contact.
///
/// `EmailId`, `Token`, `Email`, `SfdcId`, `FxaId`, and `MofoEmailId` are
/// unique under correct data; `AmoUserId`, `MofoContactId`, and
/// `FxaPrimaryEmail` may legitimately be shared before filtering. The
/// partition documents expectation only; every search result goes through
/// the same multiplicity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactIdentifier {
    /// The vendor's own record id; resolved with a direct fetch.
    EmailId(EmailId),
    /// The application's opaque contact token.
    Token(String),
    /// Primary email address.
    Email(String),
    /// Legacy CRM record id.
    SfdcId(String),
    /// Auth-service account id.
    FxaId(String),
    /// Foundation email id.
    MofoEmailId(String),
    /// Add-on site user id.
    AmoUserId(String),
    /// Foundation contact id (shared).
    MofoContactId(String),
    /// Primary email on the auth-service account (shared).
    FxaPrimaryEmail(String),
}

impl ContactIdentifier {
    /// The vendor search parameter and value for this identifier.
    pub fn query_param(&self) -> (&'static str, &str) {
        match self {
            ContactIdentifier::EmailId(id) => ("email_id", id.as_str()),
            ContactIdentifier::Token(v) => ("basket_token", v),
            ContactIdentifier::Email(v) => ("primary_email", v),
            ContactIdentifier::SfdcId(v) => ("sfdc_id", v),
            ContactIdentifier::FxaId(v) => ("fxa_id", v),
            ContactIdentifier::MofoEmailId(v) => ("mofo_email_id", v),
            ContactIdentifier::AmoUserId(v) => ("amo_user_id", v),
            ContactIdentifier::MofoContactId(v) => ("mofo_contact_id", v),
            ContactIdentifier::FxaPrimaryEmail(v) => ("fxa_primary_email", v),
        }
    }

    /// Whether correct data guarantees at most one match.
    pub fn is_unique(&self) -> bool {
        !matches!(
            self,
            ContactIdentifier::AmoUserId(_)
                | ContactIdentifier::MofoContactId(_)
                | ContactIdentifier::FxaPrimaryEmail(_)
        )
    }

    /// Lookup preference; lower is tried first.
    fn precedence(&self) -> u8 {
        match self {
            ContactIdentifier::EmailId(_) => 0,
            ContactIdentifier::Token(_) => 1,
            ContactIdentifier::Email(_) => 2,
            ContactIdentifier::SfdcId(_) => 3,
            ContactIdentifier::FxaId(_) => 4,
            ContactIdentifier::MofoEmailId(_) => 5,
            ContactIdentifier::AmoUserId(_) => 6,
            ContactIdentifier::MofoContactId(_) => 7,
            ContactIdentifier::FxaPrimaryEmail(_) => 8,
        }
    }
}

impl std::fmt::Display for ContactIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (param, value) = self.query_param();
        write!(f, "{param}={value}")
    }
}

/// Resolve a contact from whichever identifiers the caller has.
///
/// Returns the vendor's nested record, or `None` when no contact matches.
/// Fails with [`SyncError::InvalidArgument`] when no identifier is given
/// and [`SyncError::AmbiguousIdentity`] when the search returns more than
/// one record.
pub async fn resolve(
    client: &CtmsClient,
    identifiers: &[ContactIdentifier],
) -> SyncResult<Option<Value>> {
    let best = identifiers
        .iter()
        .min_by_key(|id| id.precedence())
        .ok_or_else(|| SyncError::invalid_argument("at least one identifier must be supplied"))?;

    if let ContactIdentifier::EmailId(email_id) = best {
        return client.get_by_email_id(email_id).await.map(Some);
    }

    let (param, value) = best.query_param();
    let mut contacts = client.search_by_alternate_id(param, value).await?;
    match contacts.len() {
        0 => Ok(None),
        1 => Ok(Some(contacts.remove(0))),
        _ => Err(SyncError::AmbiguousIdentity {
            identifier: best.to_string(),
        }),
    }
}
