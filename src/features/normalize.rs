//! Maps extracted or ingested values onto the trained [`FeatureSchema`].

use super::catalog::FeatureCatalog;
use super::pe::StructuralSummary;
use super::{FeatureSchema, FeatureVector};
use crate::error::SchemaMismatchError;
use std::collections::HashSet;
use std::sync::Arc;

/// One row of named raw values, e.g. the first data row of a feature dump.
#[derive(Debug, Clone, Default)]
pub struct TabularRow {
    columns: Vec<String>,
    values: Vec<String>,
}

impl TabularRow {
    pub fn new(columns: Vec<String>, values: Vec<String>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn value_at(&self, i: usize) -> Option<&str> {
        self.values.get(i).map(String::as_str)
    }
}

/// Builds [`FeatureVector`]s over one schema.
#[derive(Debug, Clone)]
pub struct Normalizer {
    schema: Arc<FeatureSchema>,
}

impl Normalizer {
    pub fn new(schema: Arc<FeatureSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    /// Schema names known to the catalog are computed; every other name stays 0.0.
    pub fn from_summary(&self, summary: &StructuralSummary) -> FeatureVector {
        let catalog = FeatureCatalog::global();
        let mut vector = FeatureVector::zeroed(Arc::clone(&self.schema));
        for name in self.schema.names() {
            if let Some(value) = catalog.compute(name, summary) {
                vector.set(name, value);
            }
        }
        vector
    }

    /// Align a tabular row to the schema.
    ///
    /// Accepted layouts: exactly the schema's column set (any order), or the
    /// training-dump layout with one leading identifier column and one
    /// trailing label column around the features, which are relabelled to the
    /// schema by position. Anything else is a [`SchemaMismatchError`].
    pub fn from_row(&self, row: &TabularRow) -> Result<FeatureVector, SchemaMismatchError> {
        let names = self.schema.names();
        let mut vector = FeatureVector::zeroed(Arc::clone(&self.schema));

        if self.matches_schema(row.columns()) {
            for name in names {
                let raw = row
                    .columns()
                    .iter()
                    .position(|c| c == name)
                    .and_then(|i| row.value_at(i));
                vector.set(name, coerce_or_zero(name, raw));
            }
            return Ok(vector);
        }

        if row.len() == names.len() + 2 {
            tracing::info!(
                columns = row.len(),
                "row has identifier and label columns around the features; using middle columns"
            );
            for (i, name) in names.iter().enumerate() {
                vector.set(name, coerce_or_zero(name, row.value_at(i + 1)));
            }
            return Ok(vector);
        }

        let present: HashSet<&str> = row.columns().iter().map(String::as_str).collect();
        let missing = names
            .iter()
            .filter(|n| !present.contains(n.as_str()))
            .cloned()
            .collect();
        Err(SchemaMismatchError {
            missing,
            expected: names.len(),
            found: row.len(),
        })
    }

    fn matches_schema(&self, columns: &[String]) -> bool {
        if columns.len() != self.schema.len() {
            return false;
        }
        let set: HashSet<&str> = columns.iter().map(String::as_str).collect();
        set.len() == columns.len() && self.schema.names().iter().all(|n| set.contains(n.as_str()))
    }
}

fn coerce(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") {
        return Some(1.0);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Some(0.0);
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A field that cannot be read as a finite float is 0.0; the rest of the row is unaffected.
fn coerce_or_zero(name: &str, raw: Option<&str>) -> f64 {
    match raw.and_then(coerce) {
        Some(v) => v,
        None => {
            tracing::warn!(feature = name, value = ?raw, "could not convert feature to float; using 0.0");
            0.0
        }
    }
}
