//! JSON collection codec.
//!
//! Collections are stored as pretty-printed JSON with two-space indentation,
//! keys in insertion order and exactly one trailing newline. Encoding the same
//! logical document twice yields identical bytes, which is what makes no-op
//! write suppression in the mutator reliable.

use serde::{de, de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Schema tag written into enveloped collections.
pub const ENVELOPE_SCHEMA: &str = "v2";

/// A JSON document that can be stored at a blob path.
///
/// `empty()` is what a missing or blank blob decodes to.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    fn empty() -> Self;
}

impl<T> Document for Vec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn empty() -> Self {
        Vec::new()
    }
}

/// Single-object documents (e.g. a report detail) that may not exist yet.
impl<T> Document for Option<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn empty() -> Self {
        None
    }
}

/// `{schema, items}` wrapper used by indexed collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub schema: String,
    pub items: Vec<T>,
}

impl<T> Envelope<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            schema: ENVELOPE_SCHEMA.to_string(),
            items,
        }
    }
}

impl<T> Document for Envelope<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn empty() -> Self {
        Envelope::new(Vec::new())
    }
}

/// A collection of unknown shape: either a bare array or an object carrying an
/// `items` array (such as the `{schema, items}` envelope). Other keys are kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RawCollection(Value);

impl<'de> Deserialize<'de> for RawCollection {
    fn deserialize<De: Deserializer<'de>>(deserializer: De) -> Result<Self, De::Error> {
        match Value::deserialize(deserializer)? {
            value @ Value::Array(_) => Ok(Self(value)),
            Value::Object(map) if map.get("items").is_some_and(Value::is_array) => {
                Ok(Self(Value::Object(map)))
            }
            _ => Err(de::Error::custom(
                "expected a JSON array or an object with an `items` array",
            )),
        }
    }
}

impl Document for RawCollection {
    fn empty() -> Self {
        Self(Value::Array(Vec::new()))
    }
}

/// Strictly decode blob content. Blank content is the empty document.
pub fn decode<D: Document>(content: &str) -> Result<D, serde_json::Error> {
    if content.trim().is_empty() {
        return Ok(D::empty());
    }
    serde_json::from_str(content)
}

/// Decode for cache hydration only: anything malformed becomes the empty document.
pub fn decode_lenient<D: Document>(content: &str) -> D {
    decode(content).unwrap_or_else(|err| {
        tracing::debug!("discarding malformed cached document: {}", err);
        D::empty()
    })
}

/// Canonical encoding: two-space pretty JSON plus a single trailing newline.
pub fn encode<D: Serialize + ?Sized>(doc: &D) -> Result<String, serde_json::Error> {
    let mut text = serde_json::to_string_pretty(doc)?;
    text.push('\n');
    Ok(text)
}

/// Whether two serialized documents are the same for write-suppression purposes.
///
/// Trailing whitespace is ignored so a remote file saved without the final
/// newline still counts as unchanged.
pub fn same_content(a: &str, b: &str) -> bool {
    a.trim_end() == b.trim_end()
}
