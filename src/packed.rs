//! The packed representation produced by [crate::schema::Schema::pack].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Out-of-band field values transmitted alongside the packed text.
pub type ExternalMap = BTreeMap<String, Value>;

/// A packed snapshot: padding-free base64 text plus the external field map.
///
/// The text is opaque and self-describing only through its length; it decodes
/// to exactly the schema's buffer length, and payloads of any other length
/// are rejected at unpack time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packed {
    pub text: String,
    pub external: ExternalMap,
}
