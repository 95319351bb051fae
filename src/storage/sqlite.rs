use super::{FindOptions, RecallFilter, RecallStore, StoredDocument, UpsertOutcome};
use crate::domain::{NormalizedRecall, SortField, SortOrder};
use crate::error::{RecallError, Result};
use crate::normalize::inference::category_keywords;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// SQLite-backed recall collection: one row per `recallId` holding the full
/// document, plus the columns that filters, search and sorting run on.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

const SCHEMA: &str = r#"
    PRAGMA journal_mode=WAL;
    CREATE TABLE IF NOT EXISTS recalls (
        recall_id   TEXT PRIMARY KEY,
        document    TEXT NOT NULL,
        is_active   INTEGER NOT NULL DEFAULT 1,
        category    TEXT,
        retailer    TEXT,
        risk_level  TEXT,
        agency      TEXT,
        recall_date TEXT,
        updated_at  TEXT NOT NULL,
        title       TEXT,
        product     TEXT,
        brand       TEXT,
        status      TEXT,
        risk_rank   INTEGER,
        search_text TEXT
    );
"#;

/// Query columns older databases may lack; they are added on open
const QUERY_COLUMNS: &[(&str, &str)] = &[
    ("title", "TEXT"),
    ("product", "TEXT"),
    ("brand", "TEXT"),
    ("status", "TEXT"),
    ("risk_rank", "INTEGER"),
    ("search_text", "TEXT"),
];

const INDEXES: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_recalls_recall_date ON recalls (recall_date);
    CREATE INDEX IF NOT EXISTS idx_recalls_filters ON recalls (is_active, retailer, risk_level, agency);
    CREATE INDEX IF NOT EXISTS idx_recalls_category ON recalls (category);
"#;

/// Lower-cased title, description, product and brand, one per line
fn search_text(recall: &NormalizedRecall) -> String {
    [&recall.title, &recall.description, &recall.product, &recall.brand]
        .iter()
        .map(|field| field.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n")
}

fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

fn order_column(field: SortField) -> &'static str {
    match field {
        SortField::RecallDate => "recall_date",
        SortField::Title => "title",
        SortField::Product => "product",
        SortField::Brand => "brand",
        SortField::Category => "category",
        SortField::RiskLevel => "risk_rank",
        SortField::Retailer => "retailer",
        SortField::Agency => "agency",
        SortField::Status => "status",
    }
}

/// `ORDER BY` matching `compare_recalls`; ties keep insertion order
fn order_by(options: &FindOptions) -> String {
    let direction = match options.sort_order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    format!(" ORDER BY {} {direction}, rowid ASC", order_column(options.sort_field))
}

/// A `WHERE` clause built from a filter. When `exact` is false the clause is a
/// superset (category keyword matching needs word boundaries) and rows must be
/// re-checked with `RecallFilter::matches`.
struct Predicate {
    clause: String,
    args: Vec<Box<dyn ToSql>>,
    exact: bool,
}

impl Predicate {
    fn from_filter(filter: &RecallFilter) -> Self {
        let mut pred = Predicate {
            clause: String::from(" WHERE 1=1"),
            args: Vec::new(),
            exact: true,
        };

        if filter.active_only {
            pred.clause.push_str(" AND is_active = 1");
        }
        if let Some(retailer) = filter.retailer {
            pred.push(" AND retailer = ?", retailer.as_str().to_string());
        }
        if let Some(risk) = filter.risk_level {
            pred.push(" AND risk_level = ?", risk.as_str().to_string());
        }
        if let Some(agency) = filter.agency {
            pred.push(" AND agency = ?", agency.as_str().to_string());
        }
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pred.push(" AND search_text LIKE ? ESCAPE '\\'", like_pattern(&term.to_lowercase()));
        }
        if let Some(category) = filter.category {
            pred.exact = false;
            pred.push(" AND (category = ?", category.as_str().to_string());
            let stems: BTreeSet<String> = category_keywords(category)
                .iter()
                .filter_map(|k| k.split_whitespace().next())
                .map(str::to_lowercase)
                .collect();
            for stem in stems {
                pred.push(" OR search_text LIKE ? ESCAPE '\\'", like_pattern(&stem));
            }
            pred.clause.push(')');
        }
        pred
    }

    fn push(&mut self, fragment: &str, arg: String) {
        self.args.push(Box::new(arg));
        self.clause.push_str(&fragment.replace('?', &format!("?{}", self.args.len())));
    }

    fn arg_refs(&self) -> Vec<&dyn ToSql> {
        self.args.iter().map(|a| a.as_ref()).collect()
    }
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                RecallError::StoreUnavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path).map_err(|e| RecallError::StoreUnavailable(e.to_string()))?;
        Self::init(conn).map(|store| {
            info!(path = %path.display(), "Opened SQLite recall store");
            store
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| RecallError::StoreUnavailable(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        migrate(&conn)?;
        conn.execute_batch(INDEXES)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RecallError::StoreUnavailable("SQLite connection lock poisoned".into()))
    }

    /// Rows matching `pred` in `order`, with an optional SQL `LIMIT/OFFSET`
    fn select(
        &self,
        pred: &Predicate,
        order: &str,
        window: Option<(usize, Option<usize>)>,
    ) -> Result<Vec<(String, NormalizedRecall)>> {
        let mut sql = format!("SELECT recall_id, document FROM recalls{}{order}", pred.clause);
        if let Some((skip, limit)) = window {
            let limit = limit.map_or(-1, |l| l as i64);
            sql.push_str(&format!(" LIMIT {limit} OFFSET {skip}"));
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(pred.arg_refs().as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (recall_id, document) = row?;
            match serde_json::from_str::<NormalizedRecall>(&document) {
                Ok(recall) => out.push((recall_id, recall)),
                Err(e) => warn!(%recall_id, error = %e, "Skipping row that is not a normalized recall"),
            }
        }
        Ok(out)
    }

    /// Rows a superset predicate selected, re-checked against the full filter
    fn refined(
        &self,
        filter: &RecallFilter,
        pred: &Predicate,
        order: &str,
    ) -> Result<Vec<(String, NormalizedRecall)>> {
        Ok(self
            .select(pred, order, None)?
            .into_iter()
            .filter(|(_, r)| filter.matches(r))
            .collect())
    }
}

/// Add any missing query columns and backfill them from the stored documents
fn migrate(conn: &Connection) -> Result<()> {
    let existing: BTreeSet<String> = {
        let mut stmt = conn.prepare("PRAGMA table_info(recalls)")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
        let names: BTreeSet<String> = names.collect::<std::result::Result<_, _>>()?;
        names
    };
    let missing: Vec<&(&str, &str)> = QUERY_COLUMNS.iter().filter(|(name, _)| !existing.contains(*name)).collect();
    if missing.is_empty() {
        return Ok(());
    }
    for (name, kind) in &missing {
        conn.execute_batch(&format!("ALTER TABLE recalls ADD COLUMN {name} {kind}"))?;
    }

    let rows: Vec<(String, String)> = {
        let mut stmt = conn.prepare("SELECT recall_id, document FROM recalls")?;
        let mapped = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let rows: Vec<(String, String)> = mapped.collect::<std::result::Result<_, _>>()?;
        rows
    };
    let mut backfilled = 0;
    for (recall_id, document) in rows {
        let Ok(recall) = serde_json::from_str::<NormalizedRecall>(&document) else {
            warn!(%recall_id, "Cannot backfill query columns for unreadable row");
            continue;
        };
        conn.execute(
            "UPDATE recalls SET title = ?2, product = ?3, brand = ?4, status = ?5, risk_rank = ?6, search_text = ?7
             WHERE recall_id = ?1",
            params![
                recall_id,
                recall.title,
                recall.product,
                recall.brand,
                recall.status.as_str(),
                recall.risk_level.severity(),
                search_text(&recall),
            ],
        )?;
        backfilled += 1;
    }
    info!(columns = missing.len(), rows = backfilled, "Migrated recall table");
    Ok(())
}

#[async_trait]
impl RecallStore for SqliteStore {
    async fn find(&self, filter: &RecallFilter, options: &FindOptions) -> Result<Vec<NormalizedRecall>> {
        let pred = Predicate::from_filter(filter);
        let order = order_by(options);
        let rows = if pred.exact {
            self.select(&pred, &order, Some((options.skip, options.limit)))?
        } else {
            let matched = self.refined(filter, &pred, &order)?.into_iter().skip(options.skip);
            match options.limit {
                Some(limit) => matched.take(limit).collect(),
                None => matched.collect(),
            }
        };
        Ok(rows.into_iter().map(|(_, r)| r).collect())
    }

    async fn find_one(&self, recall_id: &str) -> Result<Option<NormalizedRecall>> {
        let conn = self.lock()?;
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM recalls WHERE recall_id = ?1",
                params![recall_id],
                |row| row.get(0),
            )
            .optional()?;
        match document {
            Some(doc) => Ok(serde_json::from_str(&doc).ok()),
            None => Ok(None),
        }
    }

    async fn upsert(&self, recall: &NormalizedRecall) -> Result<UpsertOutcome> {
        let document = serde_json::to_string(recall)?;
        let recall_date = recall.recall_date.to_rfc3339_opts(SecondsFormat::Micros, true);
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let conn = self.lock()?;
        let exists = conn
            .query_row(
                "SELECT 1 FROM recalls WHERE recall_id = ?1",
                params![recall.recall_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        conn.execute(
            "INSERT INTO recalls (recall_id, document, is_active, category, retailer, risk_level, agency, recall_date,
                                  updated_at, title, product, brand, status, risk_rank, search_text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(recall_id) DO UPDATE SET
                document=excluded.document, is_active=excluded.is_active, category=excluded.category,
                retailer=excluded.retailer, risk_level=excluded.risk_level, agency=excluded.agency,
                recall_date=excluded.recall_date, updated_at=excluded.updated_at, title=excluded.title,
                product=excluded.product, brand=excluded.brand, status=excluded.status,
                risk_rank=excluded.risk_rank, search_text=excluded.search_text",
            params![
                recall.recall_id,
                document,
                recall.is_active,
                recall.category.as_str(),
                recall.retailer.as_str(),
                recall.risk_level.as_str(),
                recall.agency.as_str(),
                recall_date,
                now,
                recall.title,
                recall.product,
                recall.brand,
                recall.status.as_str(),
                recall.risk_level.severity(),
                search_text(recall),
            ],
        )?;

        let outcome = if exists { UpsertOutcome::Updated } else { UpsertOutcome::Created };
        debug!(recall_id = %recall.recall_id, ?outcome, "Upserted recall");
        Ok(outcome)
    }

    async fn count(&self, filter: &RecallFilter) -> Result<usize> {
        let pred = Predicate::from_filter(filter);
        if !pred.exact {
            return Ok(self.refined(filter, &pred, "")?.len());
        }
        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM recalls{}", pred.clause),
            pred.arg_refs().as_slice(),
            |row| row.get(0),
        )?;
        Ok(total as usize)
    }

    async fn delete_many(&self, filter: &RecallFilter) -> Result<usize> {
        let pred = Predicate::from_filter(filter);
        if pred.exact {
            let conn = self.lock()?;
            let sql = format!("DELETE FROM recalls{}", pred.clause);
            return Ok(conn.execute(&sql, pred.arg_refs().as_slice())?);
        }

        let doomed: Vec<String> = self.refined(filter, &pred, "")?.into_iter().map(|(id, _)| id).collect();
        let conn = self.lock()?;
        let mut removed = 0;
        for id in &doomed {
            removed += conn.execute("DELETE FROM recalls WHERE recall_id = ?1", params![id])?;
        }
        Ok(removed)
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM recalls WHERE recall_id = ?1", params![key])? > 0)
    }

    async fn all(&self) -> Result<Vec<StoredDocument>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT recall_id, document FROM recalls ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            let (recall_id, document) = row?;
            match serde_json::from_str::<Value>(&document) {
                Ok(document) => out.push(StoredDocument { key: recall_id, document }),
                Err(e) => warn!(%recall_id, error = %e, "Skipping unreadable document"),
            }
        }
        Ok(out)
    }
}
