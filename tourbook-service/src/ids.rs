//! Identifiers for documents and requests
//!
//! Document ids are UUIDv7 in simple (32 hex digit) form, so they sort by
//! creation time. Imported data may also carry 24-digit hex object ids,
//! which are accepted as-is.
//!
//! Request ids follow the [TypeID](https://github.com/jetpack-io/typeid)
//! format with a `req` prefix:
//!
//! ```rust
//! use tourbook_service::ids::{DocumentId, RequestId};
//!
//! let request = RequestId::new();
//! assert!(request.as_str().starts_with("req_"));
//!
//! let document = DocumentId::new();
//! assert_eq!(document.as_str().len(), 32);
//! assert!(DocumentId::parse(document.as_str()).is_some());
//! assert!(DocumentId::parse("5c88fa8cf4afda39709c2951").is_some());
//! assert!(DocumentId::parse("not-an-id").is_none());
//! ```

use std::fmt;

use http::Request;
use mti::prelude::*;
use tower_http::request_id::{MakeRequestId, RequestId as TowerRequestId};
use uuid::Uuid;

/// Primary key of a stored document
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    /// A fresh time-ordered id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// Validate an id supplied by a client or a data file.
    ///
    /// Accepts 24- or 32-digit hex strings and hyphenated UUIDs. The result
    /// is lowercased so lookups are case-insensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let is_hex = |s: &str| s.bytes().all(|b| b.is_ascii_hexdigit());
        match raw.len() {
            24 | 32 if is_hex(raw) => Some(Self(raw.to_ascii_lowercase())),
            36 => Uuid::parse_str(raw)
                .ok()
                .map(|uuid| Self(uuid.simple().to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

/// Request id carried in `x-request-id`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(MagicTypeId);

impl RequestId {
    pub const PREFIX: &'static str = "req";

    #[must_use]
    pub fn new() -> Self {
        Self(Self::PREFIX.create_type_id::<V7>())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates a [`RequestId`] for every request without one
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeTypedRequestId;

impl MakeRequestId for MakeTypedRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<TowerRequestId> {
        let header_value = http::HeaderValue::from_str(RequestId::new().as_str()).ok()?;
        Some(TowerRequestId::new(header_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_ids_are_time_ordered() {
        let first = DocumentId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = DocumentId::new();
        assert!(first < second);
    }

    #[test]
    fn test_parse_forms() {
        let canonical = DocumentId::parse("018F2B6C-7A1D-7C3E-9B2A-4E5F6A7B8C9D").unwrap();
        assert_eq!(canonical.as_str(), "018f2b6c7a1d7c3e9b2a4e5f6a7b8c9d");
        assert_eq!(
            DocumentId::parse("018f2b6c7a1d7c3e9b2a4e5f6a7b8c9d"),
            Some(canonical)
        );
        assert!(DocumentId::parse("5C88FA8CF4AFDA39709C2951").is_some());
    }

    #[test]
    fn test_parse_rejects() {
        for raw in ["", "123", "zzzzzzzzzzzzzzzzzzzzzzzz", "5c88fa8cf4afda39709c295"] {
            assert!(DocumentId::parse(raw).is_none(), "{raw}");
        }
    }

    #[test]
    fn test_request_id_prefix() {
        let id = RequestId::new();
        assert!(id.to_string().starts_with("req_"));
        assert_eq!(id.as_str().len(), 30);
    }

    #[test]
    fn test_make_typed_request_id() {
        let mut maker = MakeTypedRequestId;
        let request = http::Request::builder().body(()).unwrap();
        let header_value = maker.make_request_id(&request).unwrap().into_header_value();
        assert!(header_value.to_str().unwrap().starts_with("req_"));
    }
}
