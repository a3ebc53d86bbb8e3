use chrono::NaiveDate;
use tracing::info;

use crate::error::Result;
use crate::store::{DataStore, Filter};
use crate::table::Table;
use crate::users::Session;

/// Filters for browsing the traffic table.
#[derive(Debug, Clone, Default)]
pub struct BrowseRequest {
    pub date: Option<NaiveDate>,
    /// Substring of the key column, matched as given (surrounding spaces
    /// included). Case folding is SQLite's `lower()`, which only folds ASCII
    /// letters. An empty string means no filter.
    pub targets_filter: Option<String>,
    /// Columns to show; empty shows every column.
    pub columns: Vec<String>,
}

/// Configured defaults that actually exist in the table, in configured order.
pub fn default_columns(available: &[String], configured: &[String]) -> Vec<String> {
    configured
        .iter()
        .filter(|c| available.contains(c))
        .cloned()
        .collect()
}

pub fn browse<S: DataStore + ?Sized>(
    session: &Session,
    store: &S,
    key_column: &str,
    date_column: &str,
    request: &BrowseRequest,
) -> Result<Table> {
    let mut filter = Filter::new();
    if let Some(date) = request.date {
        filter = filter.date_eq(date_column, date);
    }
    if let Some(needle) = request.targets_filter.as_deref().filter(|n| !n.is_empty()) {
        filter = filter.contains(key_column, needle);
    }

    let rows = store.select(&request.columns, &filter)?;

    let columns = if request.columns.is_empty() {
        store.columns()?
    } else {
        request.columns.clone()
    };
    let mut table = Table::new(columns);
    for row in rows {
        table.push_row(row.cells().iter().map(|(_, v)| v.clone()).collect());
    }

    info!(
        action = "browse",
        component = "browse",
        username = %session.username,
        row_count = table.len(),
        "Browse query completed"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::table::Value;
    use chrono::Utc;
    use rusqlite::Connection;

    fn session() -> Session {
        Session {
            user_id: 1,
            username: "ana".into(),
            started_at: Utc::now(),
        }
    }

    fn store() -> SqliteStore {
        let store =
            SqliteStore::from_connection(Connection::open_in_memory().unwrap(), "traffic_analytics");
        store.create_traffic_table().unwrap();
        for (target, date, users) in [
            ("uol.com.br", "2024-05-01", 300),
            ("g1.globo.com/sp", "2024-05-01", 200),
            ("UOL.com.br", "2024-06-01", 310),
        ] {
            store
                .insert_row(&[
                    ("targets", target.into()),
                    ("display_date", date.into()),
                    ("users", Value::Int(users)),
                ])
                .unwrap();
        }
        store
    }

    #[test]
    fn filters_by_date_and_substring() {
        let store = store();
        let request = BrowseRequest {
            date: NaiveDate::from_ymd_opt(2024, 5, 1),
            targets_filter: Some("uol".into()),
            columns: vec!["targets".into(), "users".into()],
        };
        let table = browse(&session(), &store, "targets", "display_date", &request).unwrap();
        assert_eq!(table.columns(), &["targets", "users"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, "users"), Some(&Value::Int(300)));
    }

    #[test]
    fn substring_filter_keeps_surrounding_spaces() {
        let store = store();
        let request = BrowseRequest {
            targets_filter: Some(" uol ".into()),
            ..Default::default()
        };
        let table = browse(&session(), &store, "targets", "display_date", &request).unwrap();
        assert!(table.is_empty());

        let request = BrowseRequest {
            targets_filter: Some(String::new()),
            ..Default::default()
        };
        let table = browse(&session(), &store, "targets", "display_date", &request).unwrap();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn no_filters_returns_everything() {
        let store = store();
        let table = browse(
            &session(),
            &store,
            "targets",
            "display_date",
            &BrowseRequest::default(),
        )
        .unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.columns().len(), store.columns().unwrap().len());
    }

    #[test]
    fn substring_filter_ignores_case() {
        let store = store();
        let request = BrowseRequest {
            targets_filter: Some("Uol".into()),
            ..Default::default()
        };
        let table = browse(&session(), &store, "targets", "display_date", &request).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn default_columns_keep_only_available() {
        let available: Vec<String> = ["targets", "users", "rank"].map(String::from).to_vec();
        let configured: Vec<String> = ["targets", "display_date", "rank"]
            .map(String::from)
            .to_vec();
        assert_eq!(default_columns(&available, &configured), vec!["targets", "rank"]);
    }
}
