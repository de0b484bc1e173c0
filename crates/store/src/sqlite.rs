//! SQLite backend with FTS5 full-text search.
//!
//! One database file holds the site content, the conversation log and the
//! prompt templates:
//! - `documents`, `document_chunks`, `portfolio`, `extra_sources`: content
//!   tables, each with an external-content FTS5 index kept in sync by triggers
//! - `conversations`: append-only turns
//! - `prompt_templates`: named, versioned templates
//!
//! FTS5 selects candidates in `bm25()` order; the reported score is the
//! term coverage from [`crate::scoring`]. bm25 itself is unbounded and its
//! IDF collapses for terms present in most rows of a small table, so it
//! only breaks ties.

use crate::content::{
    ContentWriter, NewChunk, NewDocument, NewPortfolioEntry, NewSource, id_or_new,
};
use crate::scoring::{coverage, matched_field, query_terms};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use folio_core::error::StoreError;
use folio_core::history::{ConversationTurn, HistoryStore};
use folio_core::message::SessionId;
use folio_core::source::{KeywordMatch, SourceRecord, SourceType, TextStore};
use folio_core::template::{PromptTemplate, TemplateStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// FTS candidates fetched per requested result, before coverage scoring.
const CANDIDATES_PER_RESULT: usize = 4;

/// Lower bound on FTS candidates for small limits.
const MIN_CANDIDATES: usize = 32;

const SCHEMA: &[(&str, &str)] = &[
    (
        "documents table",
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            iid         INTEGER PRIMARY KEY AUTOINCREMENT,
            id          TEXT UNIQUE NOT NULL,
            title       TEXT NOT NULL,
            content     TEXT NOT NULL,
            tags        TEXT NOT NULL DEFAULT '[]',
            updated_at  TEXT NOT NULL
        )
        "#,
    ),
    (
        "documents FTS5 table",
        r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
            title, content, tags,
            content='documents', content_rowid='iid',
            tokenize='unicode61 remove_diacritics 2'
        )
        "#,
    ),
    (
        "documents triggers",
        r#"
        CREATE TRIGGER IF NOT EXISTS documents_ai AFTER INSERT ON documents BEGIN
            INSERT INTO documents_fts(rowid, title, content, tags)
            VALUES (new.iid, new.title, new.content, new.tags);
        END;
        CREATE TRIGGER IF NOT EXISTS documents_ad AFTER DELETE ON documents BEGIN
            INSERT INTO documents_fts(documents_fts, rowid, title, content, tags)
            VALUES ('delete', old.iid, old.title, old.content, old.tags);
        END;
        CREATE TRIGGER IF NOT EXISTS documents_au AFTER UPDATE ON documents BEGIN
            INSERT INTO documents_fts(documents_fts, rowid, title, content, tags)
            VALUES ('delete', old.iid, old.title, old.content, old.tags);
            INSERT INTO documents_fts(rowid, title, content, tags)
            VALUES (new.iid, new.title, new.content, new.tags);
        END;
        "#,
    ),
    (
        "document_chunks table",
        r#"
        CREATE TABLE IF NOT EXISTS document_chunks (
            iid          INTEGER PRIMARY KEY AUTOINCREMENT,
            id           TEXT UNIQUE NOT NULL,
            document_id  TEXT NOT NULL,
            chunk_index  INTEGER NOT NULL,
            text         TEXT NOT NULL
        )
        "#,
    ),
    (
        "document_chunks FTS5 table",
        r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS document_chunks_fts USING fts5(
            text,
            content='document_chunks', content_rowid='iid',
            tokenize='unicode61 remove_diacritics 2'
        )
        "#,
    ),
    (
        "document_chunks triggers",
        r#"
        CREATE TRIGGER IF NOT EXISTS document_chunks_ai AFTER INSERT ON document_chunks BEGIN
            INSERT INTO document_chunks_fts(rowid, text) VALUES (new.iid, new.text);
        END;
        CREATE TRIGGER IF NOT EXISTS document_chunks_ad AFTER DELETE ON document_chunks BEGIN
            INSERT INTO document_chunks_fts(document_chunks_fts, rowid, text)
            VALUES ('delete', old.iid, old.text);
        END;
        CREATE TRIGGER IF NOT EXISTS document_chunks_au AFTER UPDATE ON document_chunks BEGIN
            INSERT INTO document_chunks_fts(document_chunks_fts, rowid, text)
            VALUES ('delete', old.iid, old.text);
            INSERT INTO document_chunks_fts(rowid, text) VALUES (new.iid, new.text);
        END;
        "#,
    ),
    (
        "portfolio table",
        r#"
        CREATE TABLE IF NOT EXISTS portfolio (
            iid           INTEGER PRIMARY KEY AUTOINCREMENT,
            id            TEXT UNIQUE NOT NULL,
            title         TEXT NOT NULL,
            description   TEXT NOT NULL,
            technologies  TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    ),
    (
        "portfolio FTS5 table",
        r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS portfolio_fts USING fts5(
            title, description, technologies,
            content='portfolio', content_rowid='iid',
            tokenize='unicode61 remove_diacritics 2'
        )
        "#,
    ),
    (
        "portfolio triggers",
        r#"
        CREATE TRIGGER IF NOT EXISTS portfolio_ai AFTER INSERT ON portfolio BEGIN
            INSERT INTO portfolio_fts(rowid, title, description, technologies)
            VALUES (new.iid, new.title, new.description, new.technologies);
        END;
        CREATE TRIGGER IF NOT EXISTS portfolio_ad AFTER DELETE ON portfolio BEGIN
            INSERT INTO portfolio_fts(portfolio_fts, rowid, title, description, technologies)
            VALUES ('delete', old.iid, old.title, old.description, old.technologies);
        END;
        CREATE TRIGGER IF NOT EXISTS portfolio_au AFTER UPDATE ON portfolio BEGIN
            INSERT INTO portfolio_fts(portfolio_fts, rowid, title, description, technologies)
            VALUES ('delete', old.iid, old.title, old.description, old.technologies);
            INSERT INTO portfolio_fts(rowid, title, description, technologies)
            VALUES (new.iid, new.title, new.description, new.technologies);
        END;
        "#,
    ),
    (
        "extra_sources table",
        r#"
        CREATE TABLE IF NOT EXISTS extra_sources (
            iid          INTEGER PRIMARY KEY AUTOINCREMENT,
            id           TEXT NOT NULL,
            source_type  TEXT NOT NULL,
            label        TEXT NOT NULL,
            content      TEXT NOT NULL,
            UNIQUE (source_type, id)
        )
        "#,
    ),
    (
        "extra_sources FTS5 table",
        r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS extra_sources_fts USING fts5(
            label, content,
            content='extra_sources', content_rowid='iid',
            tokenize='unicode61 remove_diacritics 2'
        )
        "#,
    ),
    (
        "extra_sources triggers",
        r#"
        CREATE TRIGGER IF NOT EXISTS extra_sources_ai AFTER INSERT ON extra_sources BEGIN
            INSERT INTO extra_sources_fts(rowid, label, content)
            VALUES (new.iid, new.label, new.content);
        END;
        CREATE TRIGGER IF NOT EXISTS extra_sources_ad AFTER DELETE ON extra_sources BEGIN
            INSERT INTO extra_sources_fts(extra_sources_fts, rowid, label, content)
            VALUES ('delete', old.iid, old.label, old.content);
        END;
        CREATE TRIGGER IF NOT EXISTS extra_sources_au AFTER UPDATE ON extra_sources BEGIN
            INSERT INTO extra_sources_fts(extra_sources_fts, rowid, label, content)
            VALUES ('delete', old.iid, old.label, old.content);
            INSERT INTO extra_sources_fts(rowid, label, content)
            VALUES (new.iid, new.label, new.content);
        END;
        "#,
    ),
    (
        "conversations table",
        r#"
        CREATE TABLE IF NOT EXISTS conversations (
            iid               INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id        TEXT NOT NULL,
            user_message      TEXT NOT NULL,
            bot_response      TEXT NOT NULL,
            context_snapshot  TEXT NOT NULL DEFAULT '[]',
            provider          TEXT NOT NULL,
            tokens_used       INTEGER NOT NULL DEFAULT 0,
            created_at        TEXT NOT NULL
        )
        "#,
    ),
    (
        "conversations index",
        "CREATE INDEX IF NOT EXISTS idx_conversations_session ON conversations(session_id, created_at DESC)",
    ),
    (
        "prompt_templates table",
        r#"
        CREATE TABLE IF NOT EXISTS prompt_templates (
            name              TEXT PRIMARY KEY,
            system_text       TEXT NOT NULL,
            context_preamble  TEXT NOT NULL DEFAULT '',
            is_active         INTEGER NOT NULL DEFAULT 1,
            priority          INTEGER NOT NULL DEFAULT 0,
            category          TEXT NOT NULL DEFAULT '',
            version           INTEGER NOT NULL DEFAULT 1,
            updated_at        TEXT NOT NULL
        )
        "#,
    ),
];

/// A SQLite store implementing every collaborator trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and run migrations.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = if path.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(path)
                .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
        } else {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StoreError::Storage(format!("Cannot create {}: {e}", parent.display()))
                    })?;
                }
            }
            SqliteConnectOptions::new().filename(path)
        };

        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // An in-memory database exists per connection, so keep exactly one.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if max_connections == 1 {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        for (what, sql) in SCHEMA {
            sqlx::raw_sql(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{what}: {e}")))?;
        }
        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Build a safe FTS5 query from significant terms.
    ///
    /// Terms are alphanumeric already; each is quoted and prefix-matched,
    /// and terms are OR-ed so a record sharing any term is a candidate.
    fn fts_query(terms: &[String]) -> String {
        terms
            .iter()
            .map(|t| format!("\"{t}\"*"))
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    fn json_list(raw: &str) -> Vec<String> {
        serde_json::from_str(raw).unwrap_or_default()
    }

    fn row_to_record(group: &SourceType, row: &sqlx::sqlite::SqliteRow) -> Result<SourceRecord, StoreError> {
        let col = |e: sqlx::Error| StoreError::QueryFailed(format!("row decode: {e}"));
        let record = match group {
            SourceType::Document => SourceRecord::Document {
                id: row.try_get("id").map_err(col)?,
                title: row.try_get("title").map_err(col)?,
                content: row.try_get("content").map_err(col)?,
                tags: Self::json_list(&row.try_get::<String, _>("tags").map_err(col)?),
                score: 0.0,
            },
            SourceType::Chunk => SourceRecord::Fragment {
                id: row.try_get("id").map_err(col)?,
                document_id: row.try_get("document_id").map_err(col)?,
                document_title: row.try_get("document_title").map_err(col)?,
                chunk_index: row.try_get::<i64, _>("chunk_index").map_err(col)? as u32,
                text: row.try_get("text").map_err(col)?,
                score: 0.0,
            },
            SourceType::Portfolio => SourceRecord::Portfolio {
                id: row.try_get("id").map_err(col)?,
                title: row.try_get("title").map_err(col)?,
                description: row.try_get("description").map_err(col)?,
                technologies: Self::json_list(
                    &row.try_get::<String, _>("technologies").map_err(col)?,
                ),
                score: 0.0,
            },
            SourceType::Other(name) => SourceRecord::Other {
                source_type: name.clone(),
                id: row.try_get("id").map_err(col)?,
                label: row.try_get("label").map_err(col)?,
                content: row.try_get("content").map_err(col)?,
                score: 0.0,
            },
        };
        Ok(record)
    }

    /// `(select columns, content table, extra join)` of a group's rows, aliased `t`.
    fn group_source(group: &SourceType) -> (&'static str, &'static str, &'static str) {
        match group {
            SourceType::Document => ("t.id, t.title, t.content, t.tags", "documents", ""),
            SourceType::Chunk => (
                "t.id, t.document_id, t.chunk_index, t.text, COALESCE(d.title, '') AS document_title",
                "document_chunks",
                "LEFT JOIN documents d ON d.id = t.document_id",
            ),
            SourceType::Portfolio => (
                "t.id, t.title, t.description, t.technologies",
                "portfolio",
                "",
            ),
            SourceType::Other(_) => ("t.id, t.label, t.content", "extra_sources", ""),
        }
    }

    fn fts_table(group: &SourceType) -> &'static str {
        match group {
            SourceType::Document => "documents_fts",
            SourceType::Chunk => "document_chunks_fts",
            SourceType::Portfolio => "portfolio_fts",
            SourceType::Other(_) => "extra_sources_fts",
        }
    }
}

fn now_text() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl TextStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn lexical_search(
        &self,
        group: &SourceType,
        query: &str,
        min_score: f32,
        limit: usize,
    ) -> Result<Vec<SourceRecord>, StoreError> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(vec![]);
        }
        let fts_query = Self::fts_query(&terms);

        let (columns, table, join) = Self::group_source(group);
        let fts = Self::fts_table(group);
        let group_filter = match group {
            SourceType::Other(_) => "AND t.source_type = ?3",
            _ => "",
        };

        let sql = format!(
            r#"
            SELECT {columns}
            FROM {fts} f
            JOIN {table} t ON t.iid = f.rowid
            {join}
            WHERE {fts} MATCH ?1
            {group_filter}
            ORDER BY bm25({fts})
            LIMIT ?2
            "#
        );

        let candidates = limit.saturating_mul(CANDIDATES_PER_RESULT).max(MIN_CANDIDATES);
        let mut db_query = sqlx::query(&sql).bind(&fts_query).bind(candidates as i64);
        if let SourceType::Other(name) = group {
            db_query = db_query.bind(name.as_str());
        }

        let rows = db_query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("FTS5 search on {group}: {e}")))?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = Self::row_to_record(group, row)?;
            let score = coverage(&terms, &record);
            if score > min_score {
                results.push(record.with_score(score));
            }
        }

        // Stable, so bm25 order breaks ties.
        results.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        Ok(results)
    }

    async fn keyword_search(
        &self,
        group: &SourceType,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<KeywordMatch>, StoreError> {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return Ok(vec![]);
        }

        let (columns, table, join) = Self::group_source(group);
        let group_filter = match group {
            SourceType::Other(_) => "WHERE t.source_type = ?1",
            _ => "",
        };

        // Matching happens in Rust: SQLite's LIKE folds ASCII case only.
        let sql = format!(
            r#"
            SELECT {columns}
            FROM {table} t
            {join}
            {group_filter}
            ORDER BY t.iid
            "#
        );

        let mut db_query = sqlx::query(&sql);
        if let SourceType::Other(name) = group {
            db_query = db_query.bind(name.as_str());
        }

        let rows = db_query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("keyword search on {group}: {e}")))?;

        let mut matches = Vec::new();
        for row in &rows {
            if matches.len() >= limit {
                break;
            }
            let record = Self::row_to_record(group, row)?;
            if let Some(field) = matched_field(&record, &keyword) {
                matches.push(KeywordMatch { record, field });
            }
        }
        Ok(matches)
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn append_turn(&self, turn: ConversationTurn) -> Result<(), StoreError> {
        let snapshot = serde_json::to_string(&turn.context_snapshot)
            .map_err(|e| StoreError::Storage(format!("Snapshot serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO conversations
                (session_id, user_message, bot_response, context_snapshot, provider, tokens_used, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(turn.session_id.as_str())
        .bind(&turn.user_message)
        .bind(&turn.bot_response)
        .bind(&snapshot)
        .bind(&turn.provider)
        .bind(turn.tokens_used as i64)
        .bind(turn.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT turn failed: {e}")))?;

        Ok(())
    }

    async fn recent_turns(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM conversations
            WHERE session_id = ?1
            ORDER BY created_at DESC, iid DESC
            LIMIT ?2
            "#,
        )
        .bind(session_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("recent turns: {e}")))?;

        rows.iter()
            .map(|row| {
                let col = |e: sqlx::Error| StoreError::QueryFailed(format!("turn decode: {e}"));
                let snapshot: String = row.try_get("context_snapshot").map_err(col)?;
                let created_at: String = row.try_get("created_at").map_err(col)?;
                Ok(ConversationTurn {
                    session_id: SessionId::from_string(
                        row.try_get::<String, _>("session_id").map_err(col)?,
                    ),
                    user_message: row.try_get("user_message").map_err(col)?,
                    bot_response: row.try_get("bot_response").map_err(col)?,
                    context_snapshot: serde_json::from_str(&snapshot).unwrap_or_default(),
                    provider: row.try_get("provider").map_err(col)?,
                    tokens_used: row.try_get::<i64, _>("tokens_used").map_err(col)? as u32,
                    created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .collect()
    }
}

impl SqliteStore {
    fn row_to_template(row: &sqlx::sqlite::SqliteRow) -> Result<PromptTemplate, StoreError> {
        let col = |e: sqlx::Error| StoreError::QueryFailed(format!("template decode: {e}"));
        let updated_at: String = row.try_get("updated_at").map_err(col)?;
        Ok(PromptTemplate {
            name: row.try_get("name").map_err(col)?,
            system_text: row.try_get("system_text").map_err(col)?,
            context_preamble: row.try_get("context_preamble").map_err(col)?,
            is_active: row.try_get::<i64, _>("is_active").map_err(col)? != 0,
            priority: row.try_get::<i64, _>("priority").map_err(col)? as i32,
            category: row.try_get("category").map_err(col)?,
            version: row.try_get::<i64, _>("version").map_err(col)? as u32,
            updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[async_trait]
impl TemplateStore for SqliteStore {
    async fn active_template(&self, name: &str) -> Result<Option<PromptTemplate>, StoreError> {
        let row = sqlx::query("SELECT * FROM prompt_templates WHERE name = ?1 AND is_active = 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("template lookup: {e}")))?;

        row.as_ref().map(Self::row_to_template).transpose()
    }

    async fn list_active_templates(&self) -> Result<Vec<PromptTemplate>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM prompt_templates WHERE is_active = 1 ORDER BY priority DESC, name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("template listing: {e}")))?;

        rows.iter().map(Self::row_to_template).collect()
    }
}

#[async_trait]
impl ContentWriter for SqliteStore {
    async fn put_document(&self, doc: NewDocument) -> Result<String, StoreError> {
        let id = id_or_new(doc.id);
        let tags = serde_json::to_string(&doc.tags)
            .map_err(|e| StoreError::Storage(format!("Tags serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, title, content, tags, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                tags = excluded.tags,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(&doc.title)
        .bind(&doc.content)
        .bind(&tags)
        .bind(now_text())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT document failed: {e}")))?;

        debug!("Stored document {id}");
        Ok(id)
    }

    async fn put_chunk(&self, chunk: NewChunk) -> Result<String, StoreError> {
        let id = id_or_new(chunk.id);

        sqlx::query(
            r#"
            INSERT INTO document_chunks (id, document_id, chunk_index, text)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                document_id = excluded.document_id,
                chunk_index = excluded.chunk_index,
                text = excluded.text
            "#,
        )
        .bind(&id)
        .bind(&chunk.document_id)
        .bind(chunk.chunk_index as i64)
        .bind(&chunk.text)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT chunk failed: {e}")))?;

        Ok(id)
    }

    async fn put_portfolio(&self, entry: NewPortfolioEntry) -> Result<String, StoreError> {
        let id = id_or_new(entry.id);
        let technologies = serde_json::to_string(&entry.technologies)
            .map_err(|e| StoreError::Storage(format!("Technologies serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO portfolio (id, title, description, technologies)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                technologies = excluded.technologies
            "#,
        )
        .bind(&id)
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(&technologies)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT portfolio failed: {e}")))?;

        Ok(id)
    }

    async fn put_source(&self, source: NewSource) -> Result<String, StoreError> {
        let group = SourceType::from(source.source_type.as_str());
        if !matches!(group, SourceType::Other(_)) {
            return Err(StoreError::UnsupportedSource(source.source_type));
        }
        let id = id_or_new(source.id);

        sqlx::query(
            r#"
            INSERT INTO extra_sources (id, source_type, label, content)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(source_type, id) DO UPDATE SET
                label = excluded.label,
                content = excluded.content
            "#,
        )
        .bind(&id)
        .bind(group.as_str())
        .bind(&source.label)
        .bind(&source.content)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT source failed: {e}")))?;

        Ok(id)
    }

    async fn put_template(&self, template: PromptTemplate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO prompt_templates
                (name, system_text, context_preamble, is_active, priority, category, version, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(name) DO UPDATE SET
                system_text = excluded.system_text,
                context_preamble = excluded.context_preamble,
                is_active = excluded.is_active,
                priority = excluded.priority,
                category = excluded.category,
                version = excluded.version,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&template.name)
        .bind(&template.system_text)
        .bind(&template.context_preamble)
        .bind(template.is_active as i64)
        .bind(template.priority as i64)
        .bind(&template.category)
        .bind(template.version as i64)
        .bind(template.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPSERT template failed: {e}")))?;

        Ok(())
    }
}
