//! Search result records with untouched raw field values

use serde::Deserialize;
use serde_json::value::RawValue;
use std::collections::BTreeMap;

use crate::client::MAX_ITEMS_PER_PAGE;
use crate::error::{Error, Result};

/// Envelope of a search response page
#[derive(Debug, Deserialize)]
struct ResultsEnvelope {
    #[serde(rename = "resultats")]
    results: Vec<Box<RawValue>>,
}

/// Decode one page body into its result entries
///
/// A page that does not decode, or that holds no result or more than a page's
/// worth, means the service and the pipeline disagree about the data.
pub fn decode_page(body: &[u8]) -> Result<Vec<Box<RawValue>>> {
    let envelope: ResultsEnvelope = serde_json::from_slice(body)
        .map_err(|e| Error::Integrity(format!("undecodable results page: {e}")))?;
    let count = envelope.results.len();
    if count == 0 || count > MAX_ITEMS_PER_PAGE as usize {
        return Err(Error::Integrity(format!(
            "page holds {count} results, expected 1..={MAX_ITEMS_PER_PAGE}"
        )));
    }
    Ok(envelope.results)
}

/// One search result: field names mapped to their raw JSON text
///
/// Fields the pipeline does not rewrite are re-emitted byte for byte.
#[derive(Debug, Clone)]
pub struct Record {
    fields: BTreeMap<String, Box<RawValue>>,
}

impl Record {
    /// Parse a single result object
    pub fn from_json(raw: &RawValue) -> Result<Self> {
        let fields = serde_json::from_str(raw.get())
            .map_err(|e| Error::Integrity(format!("result is not a JSON object: {e}")))?;
        Ok(Self { fields })
    }

    /// Identifier held in `field`, as a string (numbers are rendered)
    pub fn id(&self, field: &str) -> Result<String> {
        let raw = self
            .fields
            .get(field)
            .ok_or_else(|| Error::Integrity(format!("result without {field:?} field")))?;
        match serde_json::from_str::<serde_json::Value>(raw.get())? {
            serde_json::Value::String(id) => Ok(id),
            serde_json::Value::Number(id) => Ok(id.to_string()),
            other => Err(Error::Integrity(format!(
                "{field:?} is neither a string nor a number: {other}"
            ))),
        }
    }

    /// Replace the string in `field` with `f(string)`
    ///
    /// Absent and `null` fields are left as they are.
    pub fn rewrite_text<F>(&mut self, field: &str, f: F) -> Result<()>
    where
        F: FnOnce(&str) -> String,
    {
        let Some(raw) = self.fields.get_mut(field) else {
            return Ok(());
        };
        let text: Option<String> = serde_json::from_str(raw.get())
            .map_err(|e| Error::Integrity(format!("{field:?} is not a string: {e}")))?;
        if let Some(text) = text {
            *raw = serde_json::value::to_raw_value(&f(&text))?;
        }
        Ok(())
    }

    /// Raw JSON text of `field`
    pub fn raw(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(|raw| raw.get())
    }

    /// Serialize back to a compact JSON object with keys in sorted order
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.fields)?)
    }
}
