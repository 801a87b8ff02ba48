//! Completing a partial input with fixed defaults.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, trace};

use crate::error::{PredictError, Result};
use crate::record::{FullRecord, RawInput};

/// Expand `raw` into a full record ordered exactly as `schema`.
///
/// `schema` must not repeat a name, and the keys of `raw` and `defaults`
/// must together cover it with no gaps, no extras, and no name present in
/// both. Any violation is reported
/// as [`PredictError::SchemaMismatch`] listing every offending name.
pub fn reconcile<S: AsRef<str>>(
    raw: &RawInput,
    schema: &[S],
    defaults: &BTreeMap<String, f64>,
) -> Result<FullRecord> {
    let columns: HashSet<&str> = schema.iter().map(|s| s.as_ref()).collect();

    let mut missing = Vec::new();
    let mut duplicated = Vec::new();
    let mut seen = HashSet::with_capacity(schema.len());
    for name in schema.iter().map(|s| s.as_ref()) {
        if !seen.insert(name) {
            // Repeated schema column.
            if !duplicated.iter().any(|d| d == name) {
                duplicated.push(name.to_string());
            }
            continue;
        }
        match (raw.contains(name), defaults.contains_key(name)) {
            (false, false) => missing.push(name.to_string()),
            (true, true) => duplicated.push(name.to_string()),
            _ => {}
        }
    }

    let unexpected: Vec<String> = raw
        .keys()
        .chain(defaults.keys().map(|k| k.as_str()))
        .filter(|k| !columns.contains(k))
        .map(str::to_string)
        .collect();

    if !missing.is_empty() || !unexpected.is_empty() || !duplicated.is_empty() {
        debug!(?missing, ?unexpected, ?duplicated, "input does not cover the schema");
        return Err(PredictError::SchemaMismatch {
            missing,
            unexpected,
            duplicated,
        });
    }

    let mut values = Vec::with_capacity(schema.len());
    for name in schema.iter().map(|s| s.as_ref()) {
        let value = match raw.get(name) {
            Some(v) if !v.is_finite() => {
                return Err(PredictError::InvalidValue {
                    attribute: name.to_string(),
                    value: v,
                });
            }
            Some(v) => v,
            // Presence was checked above.
            None => defaults[name],
        };
        values.push(value);
    }

    trace!(
        supplied = raw.len(),
        defaulted = schema.len() - raw.len(),
        "reconciled record"
    );
    Ok(FullRecord::new(
        schema.iter().map(|s| s.as_ref().to_string()).collect(),
        values,
    ))
}
