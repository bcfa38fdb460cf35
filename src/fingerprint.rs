//! Fingerprint utilities for template cache keys
//!
//! Template resolution is a pure function of (classification code, attribute
//! structure); the attribute structure is collapsed into a SHA256 digest so
//! resolved templates can be cached and reused across records that share it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::record::Record;

/// SHA256 fingerprint of the template-relevant parts of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute fingerprint from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Fingerprint the fields template resolution depends on: classification
    /// code, pathway, intended-use text, and the attributes with the value
    /// content resolution can read.
    ///
    /// Keyword-tier matching reads the intended-use text and attribute
    /// predicates read flag, numeric, and text values, so all of those hash
    /// by content. Standards and feature sets participate by kind only;
    /// nothing in resolution inspects their elements.
    pub fn of_record(record: &Record) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(record.classification_code.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(format!("{:?}", record.pathway).as_bytes());
        hasher.update(b"\x1f");
        hasher.update(record.intended_use.as_bytes());
        // BTreeMap iteration order is sorted, so this is canonical.
        for (name, value) in &record.attributes {
            hasher.update(b"\x1e");
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            match value {
                crate::record::AttributeValue::Flag(b) => {
                    hasher.update(if *b { b"flag:1" as &[u8] } else { b"flag:0" })
                }
                crate::record::AttributeValue::Number(n) => {
                    hasher.update(format!("num:{}", n).as_bytes())
                }
                crate::record::AttributeValue::Text(s) => {
                    hasher.update(b"text:");
                    hasher.update(s.as_bytes())
                }
                crate::record::AttributeValue::Standards(_) => hasher.update(b"standards"),
                crate::record::AttributeValue::Features(_) => hasher.update(b"features"),
            }
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
