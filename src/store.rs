use chrono::NaiveDate;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::error::{EnrichError, Result};
use crate::table::Value;

/// One conjunct of a [`Filter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Column value is one of `values`. An empty set matches nothing.
    In { column: String, values: Vec<String> },
    Eq { column: String, value: Value },
    /// Calendar date of the column equals `date`, whatever the stored time part.
    DateEq { column: String, date: NaiveDate },
    /// Case-insensitive substring match.
    Contains { column: String, needle: String },
}

impl Predicate {
    pub fn column(&self) -> &str {
        match self {
            Predicate::In { column, .. }
            | Predicate::Eq { column, .. }
            | Predicate::DateEq { column, .. }
            | Predicate::Contains { column, .. } => column,
        }
    }
}

/// Conjunction of predicates. Values never end up in the SQL text; they are
/// bound as parameters by [`Filter::render`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_set<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.predicates.push(Predicate::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn equals(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::Eq {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn date_eq(mut self, column: &str, date: NaiveDate) -> Self {
        self.predicates.push(Predicate::DateEq {
            column: column.to_string(),
            date,
        });
        self
    }

    pub fn contains(mut self, column: &str, needle: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Contains {
            column: column.to_string(),
            needle: needle.into(),
        });
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Render as a `WHERE` body with `?` placeholders plus the values to bind.
    /// An empty filter renders as an empty string.
    pub fn render(&self) -> (String, Vec<SqlValue>) {
        let mut clauses = Vec::with_capacity(self.predicates.len());
        let mut params = Vec::new();

        for predicate in &self.predicates {
            let column = quote_ident(predicate.column());
            match predicate {
                Predicate::In { values, .. } if values.is_empty() => {
                    clauses.push("0 = 1".to_string());
                }
                Predicate::In { values, .. } => {
                    let placeholders = vec!["?"; values.len()].join(", ");
                    clauses.push(format!("{} IN ({})", column, placeholders));
                    params.extend(values.iter().cloned().map(SqlValue::Text));
                }
                Predicate::Eq { value, .. } => {
                    clauses.push(format!("{} = ?", column));
                    params.push(to_sql_value(value));
                }
                Predicate::DateEq { date, .. } => {
                    clauses.push(format!("date({}) = ?", column));
                    params.push(SqlValue::Text(date.format("%Y-%m-%d").to_string()));
                }
                Predicate::Contains { needle, .. } => {
                    clauses.push(format!("instr(lower({}), lower(?)) > 0", column));
                    params.push(SqlValue::Text(needle.clone()));
                }
            }
        }

        (clauses.join(" AND "), params)
    }
}

/// A row returned by the store, cells in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreRow {
    cells: Vec<(String, Value)>,
}

impl StoreRow {
    pub fn new(cells: Vec<(String, Value)>) -> Self {
        Self { cells }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn cells(&self) -> &[(String, Value)] {
        &self.cells
    }
}

/// Read-only query service over the traffic analytics table.
pub trait DataStore {
    /// Column names of the table, in schema order.
    fn columns(&self) -> Result<Vec<String>>;

    /// Select `columns` (all of them when empty) from rows matching `filter`.
    fn select(&self, columns: &[String], filter: &Filter) -> Result<Vec<StoreRow>>;
}

pub struct SqliteStore {
    conn: Connection,
    table: String,
}

impl SqliteStore {
    pub fn open(path: &Path, table: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        info!(action = "open", component = "store", path = ?path, table = table, "Connected to traffic database");
        Ok(Self::from_connection(conn, table))
    }

    pub fn from_connection(conn: Connection, table: &str) -> Self {
        Self {
            conn,
            table: table.to_string(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the traffic table with its usual columns if it does not exist.
    pub fn create_traffic_table(&self) -> Result<()> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                targets TEXT NOT NULL,
                display_date TEXT NOT NULL,
                rank INTEGER,
                visits INTEGER,
                users INTEGER,
                bounce_rate REAL,
                pages_per_visit REAL,
                time_on_site REAL
            )",
            quote_ident(&self.table)
        ))?;
        Ok(())
    }

    /// Insert one row; every column must exist in the table.
    pub fn insert_row(&self, cells: &[(&str, Value)]) -> Result<()> {
        let known = self.columns()?;
        for (column, _) in cells {
            self.check_column(&known, column)?;
        }

        let names: Vec<String> = cells.iter().map(|(c, _)| quote_ident(c)).collect();
        let placeholders = vec!["?"; cells.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&self.table),
            names.join(", "),
            placeholders
        );
        self.conn.execute(
            &sql,
            params_from_iter(cells.iter().map(|(_, v)| to_sql_value(v))),
        )?;
        Ok(())
    }

    fn check_column(&self, known: &[String], column: &str) -> Result<()> {
        if known.iter().any(|c| c == column) {
            Ok(())
        } else {
            Err(EnrichError::UnknownColumn {
                table: self.table.clone(),
                column: column.to_string(),
            })
        }
    }
}

impl DataStore for SqliteStore {
    fn columns(&self) -> Result<Vec<String>> {
        let columns = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?
            .query_map([self.table.as_str()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        if columns.is_empty() {
            return Err(EnrichError::validation(format!(
                "table '{}' does not exist",
                self.table
            )));
        }
        Ok(columns)
    }

    fn select(&self, columns: &[String], filter: &Filter) -> Result<Vec<StoreRow>> {
        let start_time = Instant::now();
        let known = self.columns()?;

        for column in columns {
            self.check_column(&known, column)?;
        }
        for predicate in filter.predicates() {
            self.check_column(&known, predicate.column())?;
        }

        let selected: Vec<String> = if columns.is_empty() {
            known
        } else {
            columns.to_vec()
        };
        let select_list: Vec<String> = selected.iter().map(|c| quote_ident(c)).collect();

        let (where_sql, params) = filter.render();
        let mut sql = format!(
            "SELECT {} FROM {}",
            select_list.join(", "),
            quote_ident(&self.table)
        );
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let mut cells = Vec::with_capacity(selected.len());
                for (idx, name) in selected.iter().enumerate() {
                    cells.push((name.clone(), from_sql_ref(row.get_ref(idx)?)));
                }
                Ok(StoreRow::new(cells))
            })?
            .collect::<rusqlite::Result<Vec<StoreRow>>>()?;

        info!(
            action = "select",
            component = "store",
            table = %self.table,
            predicate_count = filter.predicates().len(),
            row_count = rows.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Store query completed"
        );
        Ok(rows)
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(x) => SqlValue::Real(*x),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn from_sql_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(x) => Value::Float(x),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Text(hex::encode(bytes)),
    }
}
