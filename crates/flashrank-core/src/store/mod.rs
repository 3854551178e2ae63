
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{FlashrankError, Result};
use crate::models::{FilterOptions, LabelCount};

/// A question row with its raw label names, as stored. Tag values may still
/// be compound comma-separated strings; normalization happens in the
/// metadata resolver, not here.
#[derive(Debug, Clone)]
pub struct QuestionLabels {
    pub id: String,
    pub module_id: Option<i64>,
    pub question_text: String,
    pub answer_text: Option<String>,
    pub topics: Vec<String>,
    pub subtopics: Vec<String>,
    pub tags: Vec<String>,
}

/// A document row with its raw label names, as stored.
#[derive(Debug, Clone)]
pub struct DocumentLabels {
    pub id: i64,
    pub module_id: Option<i64>,
    pub module_name: Option<String>,
    pub display_name: String,
    pub storage_locator: String,
    pub active: bool,
    pub topics: Vec<String>,
    pub subtopics: Vec<String>,
    pub tags: Vec<String>,
}

/// Read-only seam to the entity graph. The engine never writes through this
/// trait; mutation belongs to the out-of-scope authoring workflows.
pub trait TaxonomyStore {
    fn question_labels(&self, question_id: &str) -> Result<Option<QuestionLabels>>;
    fn document_labels(&self, document_id: i64) -> Result<Option<DocumentLabels>>;
    /// Active documents in one module. Inactive documents are never
    /// candidates and are filtered at the query, not downstream.
    fn active_documents_in_module(&self, module_id: i64) -> Result<Vec<DocumentLabels>>;
    /// Same-module questions eligible as distractor sources: a different id
    /// and a non-blank answer text.
    fn distractor_candidates(
        &self,
        module_id: i64,
        exclude_question_id: &str,
    ) -> Result<Vec<QuestionLabels>>;
    /// Curator-written wrong answers for one question, insertion order.
    fn manual_distractors(&self, question_id: &str) -> Result<Vec<String>>;
    fn questions_in_module(&self, module_id: i64) -> Result<Vec<QuestionLabels>>;
    fn filter_options(&self, module_id: i64) -> Result<FilterOptions>;
    fn module_name(&self, module_id: i64) -> Result<Option<String>>;
}

#[derive(Clone)]
pub struct SqliteTaxonomyStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteTaxonomyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTaxonomyStore").finish_non_exhaustive()
    }
}

impl SqliteTaxonomyStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| FlashrankError::Internal("sqlite mutex poisoned".to_string()))
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS modules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            -- Label names are globally unique per category. Some legacy
            -- schema revisions scoped topics per module; the normalized
            -- schema settled on the simpler global invariant.
            CREATE TABLE IF NOT EXISTS topics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS subtopics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS questions (
                id TEXT PRIMARY KEY,
                question_text TEXT NOT NULL,
                answer_text TEXT,
                module_id INTEGER REFERENCES modules(id)
            );

            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                module_id INTEGER REFERENCES modules(id),
                storage_locator TEXT NOT NULL,
                display_name TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS question_topics (
                question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
                topic_id INTEGER NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
                PRIMARY KEY (question_id, topic_id)
            );

            CREATE TABLE IF NOT EXISTS question_subtopics (
                question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
                subtopic_id INTEGER NOT NULL REFERENCES subtopics(id) ON DELETE CASCADE,
                PRIMARY KEY (question_id, subtopic_id)
            );

            CREATE TABLE IF NOT EXISTS question_tags (
                question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (question_id, tag_id)
            );

            CREATE TABLE IF NOT EXISTS document_topics (
                document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                topic_id INTEGER NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
                PRIMARY KEY (document_id, topic_id)
            );

            CREATE TABLE IF NOT EXISTS document_subtopics (
                document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                subtopic_id INTEGER NOT NULL REFERENCES subtopics(id) ON DELETE CASCADE,
                PRIMARY KEY (document_id, subtopic_id)
            );

            CREATE TABLE IF NOT EXISTS document_tags (
                document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (document_id, tag_id)
            );

            CREATE TABLE IF NOT EXISTS manual_distractors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
                distractor_text TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_questions_module ON questions(module_id);
            CREATE INDEX IF NOT EXISTS idx_documents_module_active ON documents(module_id, active);
            CREATE INDEX IF NOT EXISTS idx_manual_distractors_question
            ON manual_distractors(question_id);
            "#,
        )?;
        Ok(())
    }

    // Authoring-side helpers. The engine itself never calls these; they back
    // the admin/import workflows and the test fixtures.

    pub fn upsert_module(&self, name: &str) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO modules(name) VALUES (?1)",
            params![name],
        )?;
        let id = conn.query_row(
            "SELECT id FROM modules WHERE name = ?1",
            params![name],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(id)
    }

    pub fn insert_question(
        &self,
        question_id: &str,
        question_text: &str,
        answer_text: Option<&str>,
        module_id: Option<i64>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO questions(id, question_text, answer_text, module_id)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
              question_text = excluded.question_text,
              answer_text = excluded.answer_text,
              module_id = excluded.module_id
            "#,
            params![question_id, question_text, answer_text, module_id],
        )?;
        Ok(())
    }

    pub fn insert_document(
        &self,
        module_id: Option<i64>,
        storage_locator: &str,
        display_name: &str,
        active: bool,
    ) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO documents(module_id, storage_locator, display_name, active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                module_id,
                storage_locator,
                display_name,
                active,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn set_document_active(&self, document_id: i64, active: bool) -> Result<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE documents SET active = ?2 WHERE id = ?1",
            params![document_id, active],
        )?;
        if updated == 0 {
            return Err(FlashrankError::NotFound(format!(
                "document {document_id}"
            )));
        }
        Ok(())
    }

    pub fn link_question_topic(&self, question_id: &str, topic_name: &str) -> Result<()> {
        self.link_question_label(question_id, topic_name, "topics", "question_topics", "topic_id")
    }

    pub fn link_question_subtopic(&self, question_id: &str, subtopic_name: &str) -> Result<()> {
        self.link_question_label(
            question_id,
            subtopic_name,
            "subtopics",
            "question_subtopics",
            "subtopic_id",
        )
    }

    pub fn link_question_tag(&self, question_id: &str, tag_value: &str) -> Result<()> {
        // Tag values are stored verbatim; compound comma-separated values
        // from legacy imports are split by the resolver at read time.
        self.link_question_label(question_id, tag_value, "tags", "question_tags", "tag_id")
    }

    pub fn link_document_topic(&self, document_id: i64, topic_name: &str) -> Result<()> {
        self.link_document_label(document_id, topic_name, "topics", "document_topics", "topic_id")
    }

    pub fn link_document_subtopic(&self, document_id: i64, subtopic_name: &str) -> Result<()> {
        self.link_document_label(
            document_id,
            subtopic_name,
            "subtopics",
            "document_subtopics",
            "subtopic_id",
        )
    }

    pub fn link_document_tag(&self, document_id: i64, tag_value: &str) -> Result<()> {
        self.link_document_label(document_id, tag_value, "tags", "document_tags", "tag_id")
    }

    pub fn add_manual_distractor(&self, question_id: &str, distractor_text: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO manual_distractors(question_id, distractor_text, created_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![question_id, distractor_text, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn link_question_label(
        &self,
        question_id: &str,
        label: &str,
        label_table: &str,
        link_table: &str,
        link_column: &str,
    ) -> Result<()> {
        let label = label.trim();
        if label.is_empty() {
            return Ok(());
        }
        let conn = self.lock()?;
        let label_id = ensure_label(&conn, label_table, label)?;
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {link_table}(question_id, {link_column}) VALUES (?1, ?2)"
            ),
            params![question_id, label_id],
        )?;
        Ok(())
    }

    fn link_document_label(
        &self,
        document_id: i64,
        label: &str,
        label_table: &str,
        link_table: &str,
        link_column: &str,
    ) -> Result<()> {
        let label = label.trim();
        if label.is_empty() {
            return Ok(());
        }
        let conn = self.lock()?;
        let label_id = ensure_label(&conn, label_table, label)?;
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {link_table}(document_id, {link_column}) VALUES (?1, ?2)"
            ),
            params![document_id, label_id],
        )?;
        Ok(())
    }

    fn question_from_row(&self, conn: &Connection, row: QuestionRow) -> Result<QuestionLabels> {
        Ok(QuestionLabels {
            topics: label_names_for(
                conn,
                "SELECT t.name FROM topics t
                 JOIN question_topics qt ON qt.topic_id = t.id
                 WHERE qt.question_id = ?1
                 ORDER BY t.name",
                &row.id,
            )?,
            subtopics: label_names_for(
                conn,
                "SELECT s.name FROM subtopics s
                 JOIN question_subtopics qs ON qs.subtopic_id = s.id
                 WHERE qs.question_id = ?1
                 ORDER BY s.name",
                &row.id,
            )?,
            tags: label_names_for(
                conn,
                "SELECT g.name FROM tags g
                 JOIN question_tags qg ON qg.tag_id = g.id
                 WHERE qg.question_id = ?1
                 ORDER BY g.name",
                &row.id,
            )?,
            id: row.id,
            module_id: row.module_id,
            question_text: row.question_text,
            answer_text: row.answer_text,
        })
    }

    fn document_from_row(&self, conn: &Connection, row: DocumentRow) -> Result<DocumentLabels> {
        Ok(DocumentLabels {
            topics: doc_label_names_for(
                conn,
                "SELECT t.name FROM topics t
                 JOIN document_topics dt ON dt.topic_id = t.id
                 WHERE dt.document_id = ?1
                 ORDER BY t.name",
                row.id,
            )?,
            subtopics: doc_label_names_for(
                conn,
                "SELECT s.name FROM subtopics s
                 JOIN document_subtopics ds ON ds.subtopic_id = s.id
                 WHERE ds.document_id = ?1
                 ORDER BY s.name",
                row.id,
            )?,
            tags: doc_label_names_for(
                conn,
                "SELECT g.name FROM tags g
                 JOIN document_tags dg ON dg.tag_id = g.id
                 WHERE dg.document_id = ?1
                 ORDER BY g.name",
                row.id,
            )?,
            id: row.id,
            module_id: row.module_id,
            module_name: row.module_name,
            display_name: row.display_name,
            storage_locator: row.storage_locator,
            active: row.active,
        })
    }
}

struct QuestionRow {
    id: String,
    module_id: Option<i64>,
    question_text: String,
    answer_text: Option<String>,
}

struct DocumentRow {
    id: i64,
    module_id: Option<i64>,
    module_name: Option<String>,
    display_name: String,
    storage_locator: String,
    active: bool,
}

fn ensure_label(conn: &Connection, label_table: &str, name: &str) -> rusqlite::Result<i64> {
    conn.execute(
        &format!("INSERT OR IGNORE INTO {label_table}(name) VALUES (?1)"),
        params![name],
    )?;
    conn.query_row(
        &format!("SELECT id FROM {label_table} WHERE name = ?1"),
        params![name],
        |row| row.get::<_, i64>(0),
    )
}

fn label_names_for(conn: &Connection, sql: &str, question_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![question_id], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for name in rows {
        out.push(name?);
    }
    Ok(out)
}

fn doc_label_names_for(conn: &Connection, sql: &str, document_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![document_id], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for name in rows {
        out.push(name?);
    }
    Ok(out)
}

fn label_counts(conn: &Connection, sql: &str, module_id: i64) -> Result<Vec<LabelCount>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![module_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    let mut out = Vec::new();
    for entry in rows {
        let (name, count) = entry?;
        out.push(LabelCount {
            name,
            count: u64::try_from(count).unwrap_or(0),
        });
    }
    Ok(out)
}

const QUESTION_ROW_SQL: &str =
    "SELECT id, module_id, question_text, answer_text FROM questions WHERE id = ?1";

const DOCUMENT_ROW_SQL: &str = r#"
    SELECT d.id, d.module_id, m.name, d.display_name, d.storage_locator, d.active
    FROM documents d
    LEFT JOIN modules m ON m.id = d.module_id
    WHERE d.id = ?1
"#;

impl TaxonomyStore for SqliteTaxonomyStore {
    fn question_labels(&self, question_id: &str) -> Result<Option<QuestionLabels>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(QUESTION_ROW_SQL, params![question_id], |row| {
                Ok(QuestionRow {
                    id: row.get(0)?,
                    module_id: row.get(1)?,
                    question_text: row.get(2)?,
                    answer_text: row.get(3)?,
                })
            })
            .optional()?;
        match row {
            Some(row) => Ok(Some(self.question_from_row(&conn, row)?)),
            None => Ok(None),
        }
    }

    fn document_labels(&self, document_id: i64) -> Result<Option<DocumentLabels>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(DOCUMENT_ROW_SQL, params![document_id], |row| {
                Ok(DocumentRow {
                    id: row.get(0)?,
                    module_id: row.get(1)?,
                    module_name: row.get(2)?,
                    display_name: row.get(3)?,
                    storage_locator: row.get(4)?,
                    active: row.get(5)?,
                })
            })
            .optional()?;
        match row {
            Some(row) => Ok(Some(self.document_from_row(&conn, row)?)),
            None => Ok(None),
        }
    }

    fn active_documents_in_module(&self, module_id: i64) -> Result<Vec<DocumentLabels>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT d.id, d.module_id, m.name, d.display_name, d.storage_locator, d.active
            FROM documents d
            LEFT JOIN modules m ON m.id = d.module_id
            WHERE d.module_id = ?1 AND d.active = 1
            ORDER BY d.id
            "#,
        )?;
        let rows = stmt.query_map(params![module_id], |row| {
            Ok(DocumentRow {
                id: row.get(0)?,
                module_id: row.get(1)?,
                module_name: row.get(2)?,
                display_name: row.get(3)?,
                storage_locator: row.get(4)?,
                active: row.get(5)?,
            })
        })?;
        let mut base = Vec::new();
        for row in rows {
            base.push(row?);
        }
        drop(stmt);
        let mut out = Vec::with_capacity(base.len());
        for row in base {
            out.push(self.document_from_row(&conn, row)?);
        }
        Ok(out)
    }

    fn distractor_candidates(
        &self,
        module_id: i64,
        exclude_question_id: &str,
    ) -> Result<Vec<QuestionLabels>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, module_id, question_text, answer_text
            FROM questions
            WHERE module_id = ?1
              AND id != ?2
              AND answer_text IS NOT NULL
              AND TRIM(answer_text) != ''
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map(params![module_id, exclude_question_id], |row| {
            Ok(QuestionRow {
                id: row.get(0)?,
                module_id: row.get(1)?,
                question_text: row.get(2)?,
                answer_text: row.get(3)?,
            })
        })?;
        let mut base = Vec::new();
        for row in rows {
            base.push(row?);
        }
        drop(stmt);
        let mut out = Vec::with_capacity(base.len());
        for row in base {
            out.push(self.question_from_row(&conn, row)?);
        }
        Ok(out)
    }

    fn manual_distractors(&self, question_id: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT distractor_text FROM manual_distractors
            WHERE question_id = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![question_id], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for text in rows {
            out.push(text?);
        }
        Ok(out)
    }

    fn questions_in_module(&self, module_id: i64) -> Result<Vec<QuestionLabels>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, module_id, question_text, answer_text
            FROM questions
            WHERE module_id = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map(params![module_id], |row| {
            Ok(QuestionRow {
                id: row.get(0)?,
                module_id: row.get(1)?,
                question_text: row.get(2)?,
                answer_text: row.get(3)?,
            })
        })?;
        let mut base = Vec::new();
        for row in rows {
            base.push(row?);
        }
        drop(stmt);
        let mut out = Vec::with_capacity(base.len());
        for row in base {
            out.push(self.question_from_row(&conn, row)?);
        }
        Ok(out)
    }

    fn filter_options(&self, module_id: i64) -> Result<FilterOptions> {
        let conn = self.lock()?;
        Ok(FilterOptions {
            topics: label_counts(
                &conn,
                r#"
                SELECT t.name, COUNT(DISTINCT qt.question_id)
                FROM topics t
                JOIN question_topics qt ON qt.topic_id = t.id
                JOIN questions q ON q.id = qt.question_id
                WHERE q.module_id = ?1
                GROUP BY t.id
                ORDER BY COUNT(DISTINCT qt.question_id) DESC, t.name ASC
                "#,
                module_id,
            )?,
            subtopics: label_counts(
                &conn,
                r#"
                SELECT s.name, COUNT(DISTINCT qs.question_id)
                FROM subtopics s
                JOIN question_subtopics qs ON qs.subtopic_id = s.id
                JOIN questions q ON q.id = qs.question_id
                WHERE q.module_id = ?1
                GROUP BY s.id
                ORDER BY COUNT(DISTINCT qs.question_id) DESC, s.name ASC
                "#,
                module_id,
            )?,
            tags: label_counts(
                &conn,
                r#"
                SELECT g.name, COUNT(DISTINCT qg.question_id)
                FROM tags g
                JOIN question_tags qg ON qg.tag_id = g.id
                JOIN questions q ON q.id = qg.question_id
                WHERE q.module_id = ?1
                GROUP BY g.id
                ORDER BY COUNT(DISTINCT qg.question_id) DESC, g.name ASC
                "#,
                module_id,
            )?,
        })
    }

    fn module_name(&self, module_id: i64) -> Result<Option<String>> {
        let conn = self.lock()?;
        let name = conn
            .query_row(
                "SELECT name FROM modules WHERE id = ?1",
                params![module_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(name)
    }
}
