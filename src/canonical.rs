use std::{borrow::Cow, fmt, sync::OnceLock};

use regex::Regex;
use sha2::{Digest, Sha256};

pub const FIELD_DELIMITER: char = '|';
pub const CANONICAL_VERSION: &str = "v1";

/// Number of digest bytes kept for audit identifiers (32 hex chars).
pub const SHORT_HASH_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalError {
    EmptyTypeTag,
    DelimiterInField { index: usize },
}

impl fmt::Display for CanonicalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTypeTag => write!(f, "canonical type tag cannot be empty"),
            Self::DelimiterInField { index } => {
                write!(f, "canonical field {index} contains the '|' delimiter")
            }
        }
    }
}

impl std::error::Error for CanonicalError {}

/// Builder for `TYPE|v1|field1|field2|...` strings.
#[derive(Debug, Clone)]
pub struct CanonicalString {
    buffer: String,
    fields: usize,
}

impl CanonicalString {
    pub fn new(type_tag: &str) -> Result<Self, CanonicalError> {
        if type_tag.is_empty() {
            return Err(CanonicalError::EmptyTypeTag);
        }
        if contains_delimiter(type_tag) {
            return Err(CanonicalError::DelimiterInField { index: 0 });
        }

        let mut buffer = String::with_capacity(64);
        buffer.push_str(type_tag);
        buffer.push(FIELD_DELIMITER);
        buffer.push_str(CANONICAL_VERSION);
        Ok(Self { buffer, fields: 0 })
    }

    pub fn push(mut self, field: impl AsRef<str>) -> Result<Self, CanonicalError> {
        let field = field.as_ref();
        self.fields += 1;
        if contains_delimiter(field) {
            return Err(CanonicalError::DelimiterInField { index: self.fields });
        }
        self.buffer.push(FIELD_DELIMITER);
        self.buffer.push_str(field);
        Ok(self)
    }

    pub fn push_all<I, S>(self, fields: I) -> Result<Self, CanonicalError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        fields
            .into_iter()
            .try_fold(self, |builder, field| builder.push(field))
    }

    pub fn finish(self) -> String {
        self.buffer
    }

    pub fn short_hash(self) -> String {
        short_hash(&self.buffer)
    }

    pub fn content_hash(self) -> String {
        sha256_hex(self.buffer.as_bytes())
    }
}

pub fn contains_delimiter(value: &str) -> bool {
    value.contains(FIELD_DELIMITER)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn short_hash(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..SHORT_HASH_BYTES])
}

/// Exactly 64 lowercase hex characters.
pub fn is_content_hash(value: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new("^[0-9a-f]{64}$").expect("static content hash pattern"))
        .is_match(value)
}

/// Exactly 32 lowercase hex characters.
pub fn is_short_hash(value: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new("^[0-9a-f]{32}$").expect("static short hash pattern"))
        .is_match(value)
}

/// Digest stand-in for a field that cannot be embedded verbatim.
pub fn opaque_field(value: &str) -> String {
    short_hash(value)
}

/// `value` itself when it is a legal field, otherwise its digest.
pub fn safe_field(value: &str) -> Cow<'_, str> {
    if contains_delimiter(value) {
        Cow::Owned(opaque_field(value))
    } else {
        Cow::Borrowed(value)
    }
}
