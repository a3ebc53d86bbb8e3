use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::DomainKey;
use crate::error::{EnrichError, Result};
use crate::store::{DataStore, Filter};
use crate::table::{Table, Value};

/// What to look up: a deduplicated key set, one date, and the wanted attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentQuery {
    pub keys: BTreeSet<DomainKey>,
    pub date: NaiveDate,
    pub columns: Vec<String>,
}

impl EnrichmentQuery {
    pub fn new(
        keys: impl IntoIterator<Item = DomainKey>,
        date: NaiveDate,
        columns: Vec<String>,
    ) -> Self {
        Self {
            keys: keys.into_iter().collect(),
            date,
            columns,
        }
    }
}

/// One store row matched for a key on the query date.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentRow {
    pub key: DomainKey,
    pub date: NaiveDate,
    /// Requested attributes in query order; missing ones are null.
    pub values: Vec<(String, Value)>,
}

impl EnrichmentRow {
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, value)| value)
    }
}

/// Ordered attribute → destination column mapping.
///
/// Re-inserting an attribute replaces its destination in place. Several
/// attributes may target the same destination; the last one applied wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMapping {
    entries: Vec<(String, String)>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attribute: impl Into<String>, destination: impl Into<String>) {
        let attribute = attribute.into();
        let destination = destination.into();
        match self.entries.iter_mut().find(|(a, _)| *a == attribute) {
            Some(entry) => entry.1 = destination,
            None => self.entries.push((attribute, destination)),
        }
    }

    /// Parse `attribute=destination`. An empty destination is kept and later skipped.
    pub fn parse_entry(raw: &str) -> Result<(String, String)> {
        match raw.split_once('=') {
            Some((attribute, destination)) if !attribute.trim().is_empty() => {
                Ok((attribute.trim().to_string(), destination.trim().to_string()))
            }
            _ => Err(EnrichError::validation(format!(
                "mapping '{}' must look like attribute=destination",
                raw
            ))),
        }
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

impl FromIterator<(String, String)> for ColumnMapping {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut mapping = ColumnMapping::new();
        for (attribute, destination) in iter {
            mapping.insert(attribute, destination);
        }
        mapping
    }
}

/// Keys bound per select; SQLite refuses statements with more than 32766 variables.
pub const MAX_KEYS_PER_QUERY: usize = 500;

/// Looks up enrichment rows in a [`DataStore`] keyed by domain and date.
pub struct Enricher<'a, S: DataStore + ?Sized> {
    store: &'a S,
    key_column: &'a str,
    date_column: &'a str,
}

impl<'a, S: DataStore + ?Sized> Enricher<'a, S> {
    pub fn new(store: &'a S, key_column: &'a str, date_column: &'a str) -> Self {
        Self {
            store,
            key_column,
            date_column,
        }
    }

    /// Fetch matching rows. The store is asked for full rows and the result is
    /// projected to `query.columns` here. No query is issued for an empty key set;
    /// larger sets are split into selects of at most [`MAX_KEYS_PER_QUERY`] keys,
    /// issued in key order.
    pub fn enrich(&self, query: &EnrichmentQuery) -> Result<Vec<EnrichmentRow>> {
        let start_time = Instant::now();

        if query.keys.is_empty() {
            info!(
                action = "skip",
                component = "enrichment",
                "No domain keys to look up"
            );
            return Ok(Vec::new());
        }

        let available = self.store.columns()?;
        if let Some(missing) = query.columns.iter().find(|c| !available.contains(c)) {
            return Err(EnrichError::UnknownColumn {
                table: "store".to_string(),
                column: missing.clone(),
            });
        }

        let keys: Vec<&str> = query.keys.iter().map(DomainKey::as_str).collect();
        let mut rows = Vec::new();
        for chunk in keys.chunks(MAX_KEYS_PER_QUERY) {
            let filter = Filter::new()
                .in_set(self.key_column, chunk.iter().copied())
                .date_eq(self.date_column, query.date);
            rows.extend(self.store.select(&[], &filter)?);
        }

        let mut enriched = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(key) = row.get(self.key_column).and_then(Value::as_text) else {
                warn!(
                    action = "skip",
                    component = "enrichment",
                    key_column = self.key_column,
                    "Store row without a text key"
                );
                continue;
            };
            let values = query
                .columns
                .iter()
                .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                .collect();
            enriched.push(EnrichmentRow {
                key: DomainKey::new(key),
                date: query.date,
                values,
            });
        }

        info!(
            action = "complete",
            component = "enrichment",
            key_count = query.keys.len(),
            row_count = enriched.len(),
            date = %query.date,
            duration_ms = start_time.elapsed().as_millis(),
            "Enrichment lookup completed"
        );
        Ok(enriched)
    }
}

/// Left-join `enrichment` onto `raw` by `key_column`, then apply `mapping`.
///
/// Every input row appears exactly once. Each of `attributes` becomes a column
/// (overwriting a same-named upload column) holding the first-seen match's
/// value, or null. Mapping entries are then copied in order: an existing
/// destination is overwritten, a new one appended, an empty one skipped.
pub fn merge(
    raw: &Table,
    key_column: &str,
    attributes: &[String],
    enrichment: &[EnrichmentRow],
    mapping: &ColumnMapping,
) -> Table {
    let mut by_key: HashMap<&DomainKey, &EnrichmentRow> = HashMap::new();
    for row in enrichment {
        by_key.entry(&row.key).or_insert(row);
    }

    let matches: Vec<Option<&EnrichmentRow>> = match raw.column_values(key_column) {
        Some(keys) => keys
            .into_iter()
            .map(|cell| {
                cell.as_text()
                    .and_then(|k| by_key.get(&DomainKey::new(k)).copied())
            })
            .collect(),
        None => {
            warn!(
                action = "merge",
                component = "enrichment",
                key_column = key_column,
                "Key column missing from uploaded table"
            );
            vec![None; raw.len()]
        }
    };

    // Mapping sources read these joined values, never columns a previous
    // mapping entry has already rewritten.
    let mut joined: HashMap<&str, Vec<Value>> = HashMap::new();
    let mut merged = raw.clone();
    for attribute in attributes {
        if attribute == key_column {
            continue;
        }
        let values: Vec<Value> = matches
            .iter()
            .map(|m| m.and_then(|row| row.get(attribute)).cloned().unwrap_or(Value::Null))
            .collect();
        merged.set_column(attribute, values.clone());
        joined.insert(attribute.as_str(), values);
    }

    for (attribute, destination) in mapping.entries() {
        if destination.is_empty() {
            debug!(attribute = %attribute, "Skipping mapping without destination");
            continue;
        }
        if destination == key_column {
            warn!(
                action = "map",
                component = "enrichment",
                attribute = %attribute,
                "Refusing to overwrite the key column"
            );
            continue;
        }
        let values = match joined.get(attribute.as_str()) {
            Some(values) => values.clone(),
            None => {
                warn!(
                    action = "map",
                    component = "enrichment",
                    attribute = %attribute,
                    "Mapped attribute was not requested, filling with nulls"
                );
                vec![Value::Null; merged.len()]
            }
        };
        merged.set_column(destination, values);
    }

    info!(
        action = "complete",
        component = "merge",
        row_count = merged.len(),
        matched_rows = matches.iter().filter(|m| m.is_some()).count(),
        "Merge completed"
    );
    merged
}
