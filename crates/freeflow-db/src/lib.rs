// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod validation;

use anyhow::{Context, Result, anyhow, bail};
use freeflow_app::{
    Article, ArticleFormInput, ArticleId, DeletionEntity, DeletionRecord, DeletionRecordId,
    Invoice, InvoiceFormInput, InvoiceId, InvoiceStatus, RecordRef, Skill, SkillFormInput,
    SkillId, StatusKind,
};
use freeflow_testkit::Faker;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info};

pub const APP_NAME: &str = "freeflow";
pub const DB_PATH_ENV: &str = "FREEFLOW_DB_PATH";

const DEMO_INVOICES: usize = 14;
const DEMO_ARTICLES: usize = 10;
const DEMO_SKILLS: usize = 10;

const SCHEMA_SQL: &str = include_str!("sql/schema.sql");
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One record table and the columns its row mapper reads, in read order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Table {
    name: &'static str,
    columns: &'static [&'static str],
}

impl Table {
    const fn for_entity(entity: DeletionEntity) -> Self {
        match entity {
            DeletionEntity::Invoice => INVOICES,
            DeletionEntity::Article => ARTICLES,
            DeletionEntity::Skill => SKILLS,
        }
    }

    fn select(self) -> String {
        format!("SELECT {} FROM {}", self.columns.join(", "), self.name)
    }

    fn select_by_id(self) -> String {
        format!("{} WHERE id = ?", self.select())
    }

    /// Newest change first, id as tiebreaker.
    fn list(self, include_deleted: bool) -> String {
        let filter = if include_deleted {
            ""
        } else {
            " WHERE deleted_at IS NULL"
        };
        format!("{}{filter} ORDER BY updated_at DESC, id DESC", self.select())
    }
}

const INVOICES: Table = Table {
    name: "invoices",
    columns: &[
        "id",
        "invoice_number",
        "title",
        "client_name",
        "client_email",
        "status",
        "amount_cents",
        "currency",
        "issue_date",
        "due_date",
        "notes",
        "reminder_count",
        "last_reminder_at",
        "created_at",
        "updated_at",
        "deleted_at",
    ],
};

const ARTICLES: Table = Table {
    name: "articles",
    columns: &[
        "id",
        "title",
        "excerpt",
        "tags",
        "category",
        "author",
        "status",
        "views",
        "helpful_count",
        "not_helpful_count",
        "read_time_minutes",
        "created_at",
        "updated_at",
        "deleted_at",
    ],
};

const SKILLS: Table = Table {
    name: "skills",
    columns: &[
        "id",
        "name",
        "category",
        "level",
        "years_of_experience",
        "endorsements",
        "created_at",
        "updated_at",
        "deleted_at",
    ],
};

/// Row counts written by [`Store::seed_demo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedSummary {
    pub invoices: usize,
    pub articles: usize,
    pub skills: usize,
}

const fn lifecycle_target(target: RecordRef) -> (DeletionEntity, i64) {
    match target {
        RecordRef::Invoice(id) => (DeletionEntity::Invoice, id.get()),
        RecordRef::Article(id) => (DeletionEntity::Article, id.get()),
        RecordRef::Skill(id) => (DeletionEntity::Skill, id.get()),
    }
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let location = DbLocation::classify(path)?;
        let conn = match location {
            DbLocation::Memory => Connection::open_in_memory(),
            DbLocation::File => Connection::open(path),
        }
        .with_context(|| format!("open database at {}", path.display()))?;
        tune_connection(&conn, location)?;
        debug!(path = %path.display(), ?location, "opened database");
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        tune_connection(&conn, DbLocation::Memory)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    /// Creates the schema in an empty database. Otherwise checks every
    /// table and column against the embedded schema and rebuilds any index
    /// that went missing.
    pub fn bootstrap(&self) -> Result<()> {
        let found = SchemaShape::read(&self.conn)?;
        if found.tables.is_empty() {
            self.conn
                .execute_batch(SCHEMA_SQL)
                .context("create schema")?;
            info!("created database schema");
            return Ok(());
        }

        let expected = SchemaShape::expected()?;
        found.check_tables(&expected)?;
        for (name, sql) in &expected.indexes {
            if found.indexes.contains_key(name) {
                continue;
            }
            self.conn
                .execute_batch(sql)
                .with_context(|| format!("rebuild index `{name}`"))?;
            info!(index = %name, "rebuilt missing index");
        }
        Ok(())
    }

    /// True when no invoice, article or skill row exists, deleted or not.
    pub fn is_empty(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "
                SELECT
                  (SELECT COUNT(*) FROM invoices)
                  + (SELECT COUNT(*) FROM articles)
                  + (SELECT COUNT(*) FROM skills)
                ",
                [],
                |row| row.get(0),
            )
            .context("count records")?;
        Ok(count == 0)
    }

    pub fn list_invoices(&self, include_deleted: bool) -> Result<Vec<Invoice>> {
        let sql = INVOICES.list(include_deleted);
        debug!(include_deleted, "list invoices");
        let mut stmt = self.conn.prepare(&sql).context("prepare invoices query")?;
        let rows = stmt
            .query_map([], invoice_from_row)
            .context("query invoices")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect invoices")
    }

    pub fn get_invoice(&self, invoice_id: InvoiceId) -> Result<Invoice> {
        self.conn
            .query_row(
                &INVOICES.select_by_id(),
                params![invoice_id.get()],
                invoice_from_row,
            )
            .with_context(|| format!("load invoice {invoice_id}"))
    }

    /// Inserts the invoice with its computed total. A blank invoice number
    /// gets a fresh `INV-<unix-millis>` value.
    pub fn create_invoice(&self, input: &InvoiceFormInput) -> Result<InvoiceId> {
        let now = now_rfc3339()?;
        let number = match input.invoice_number.trim() {
            "" => self.next_invoice_number()?,
            given => given.to_owned(),
        };
        let totals = input.totals();
        self.conn
            .execute(
                "
                INSERT INTO invoices (
                  invoice_number, title, client_name, client_email, status,
                  amount_cents, currency, issue_date, due_date, notes,
                  created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    number,
                    input.title.trim(),
                    input.client_name.trim(),
                    input.client_email.trim(),
                    input.status.as_str(),
                    totals.total_cents,
                    input.currency.trim().to_ascii_uppercase(),
                    input.issue_date.map(format_date),
                    input.due_date.map(format_date),
                    input.notes,
                    now,
                    now,
                ],
            )
            .with_context(|| format!("insert invoice {number}"))?;

        let id = InvoiceId::new(self.conn.last_insert_rowid());
        info!(%id, number = %number, total_cents = totals.total_cents, "created invoice");
        Ok(id)
    }

    pub fn update_invoice(&self, invoice_id: InvoiceId, input: &InvoiceFormInput) -> Result<()> {
        let now = now_rfc3339()?;
        let totals = input.totals();
        let rows_affected = self
            .conn
            .execute(
                "
                UPDATE invoices
                SET
                  invoice_number = COALESCE(NULLIF(?, ''), invoice_number),
                  title = ?,
                  client_name = ?,
                  client_email = ?,
                  status = ?,
                  amount_cents = ?,
                  currency = ?,
                  issue_date = ?,
                  due_date = ?,
                  notes = ?,
                  updated_at = ?
                WHERE id = ? AND deleted_at IS NULL
                ",
                params![
                    input.invoice_number.trim(),
                    input.title.trim(),
                    input.client_name.trim(),
                    input.client_email.trim(),
                    input.status.as_str(),
                    totals.total_cents,
                    input.currency.trim().to_ascii_uppercase(),
                    input.issue_date.map(format_date),
                    input.due_date.map(format_date),
                    input.notes,
                    now,
                    invoice_id.get(),
                ],
            )
            .context("update invoice")?;
        if rows_affected == 0 {
            bail!("invoice {invoice_id} not found or deleted -- choose an existing invoice and retry");
        }
        info!(id = %invoice_id, "updated invoice");
        Ok(())
    }

    pub fn set_invoice_status(&self, invoice_id: InvoiceId, status: InvoiceStatus) -> Result<()> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "UPDATE invoices SET status = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
                params![status.as_str(), now, invoice_id.get()],
            )
            .with_context(|| format!("set invoice {invoice_id} status"))?;
        if rows_affected == 0 {
            bail!("invoice {invoice_id} not found or deleted -- choose an existing invoice and retry");
        }
        info!(id = %invoice_id, status = status.as_str(), "changed invoice status");
        Ok(())
    }

    /// Counts a payment reminder against a sent, viewed or overdue invoice.
    /// Like the article counters it leaves `updated_at` alone.
    pub fn send_invoice_reminder(&self, invoice_id: InvoiceId) -> Result<()> {
        let invoice = self.get_invoice(invoice_id)?;
        if invoice.deleted_at.is_some() {
            bail!("invoice {invoice_id} is deleted -- restore it before sending a reminder");
        }
        if !invoice.status.accepts_reminder() {
            bail!(
                "invoice {invoice_id} is {} -- only unpaid invoices the client has received get reminders",
                invoice.status.as_str()
            );
        }
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                UPDATE invoices
                SET reminder_count = reminder_count + 1, last_reminder_at = ?
                WHERE id = ?
                ",
                params![now, invoice_id.get()],
            )
            .with_context(|| format!("record reminder for invoice {invoice_id}"))?;
        info!(
            id = %invoice_id,
            reminders = invoice.reminder_count + 1,
            "sent invoice reminder"
        );
        Ok(())
    }

    /// Copies a live invoice into a new draft issued today. The payment term
    /// (days between issue and due) carries over.
    pub fn duplicate_invoice(&self, invoice_id: InvoiceId) -> Result<InvoiceId> {
        let source = self.get_invoice(invoice_id)?;
        if source.deleted_at.is_some() {
            bail!("invoice {invoice_id} is deleted -- restore it before duplicating");
        }
        let now = OffsetDateTime::now_utc();
        let now_text = format_timestamp(now)?;
        let today = now.date();
        let due_date = match (source.issue_date, source.due_date) {
            (Some(issue), Some(due)) => {
                let term = due - issue;
                let shifted = today.checked_add(term).ok_or_else(|| {
                    anyhow!(
                        "invoice {invoice_id} has a {}-day payment term that ends past the last supported date -- shorten its due date and retry",
                        term.whole_days()
                    )
                })?;
                Some(shifted)
            }
            (None, due) => due,
            (Some(_), None) => None,
        };
        let number = self.next_invoice_number()?;
        self.conn
            .execute(
                "
                INSERT INTO invoices (
                  invoice_number, title, client_name, client_email, status,
                  amount_cents, currency, issue_date, due_date, notes,
                  created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    number,
                    format!("Copy of {}", source.title),
                    source.client_name,
                    source.client_email,
                    InvoiceStatus::Draft.as_str(),
                    source.amount_cents,
                    source.currency,
                    format_date(today),
                    due_date.map(format_date),
                    source.notes,
                    now_text,
                    now_text,
                ],
            )
            .with_context(|| format!("duplicate invoice {invoice_id}"))?;

        let id = InvoiceId::new(self.conn.last_insert_rowid());
        info!(source = %invoice_id, %id, number = %number, "duplicated invoice");
        Ok(id)
    }

    pub fn soft_delete_invoice(&self, invoice_id: InvoiceId) -> Result<()> {
        self.soft_delete(RecordRef::Invoice(invoice_id))
    }

    pub fn restore_invoice(&self, invoice_id: InvoiceId) -> Result<()> {
        self.restore(RecordRef::Invoice(invoice_id))
    }

    pub fn list_articles(&self, include_deleted: bool) -> Result<Vec<Article>> {
        let sql = ARTICLES.list(include_deleted);
        debug!(include_deleted, "list articles");
        let mut stmt = self.conn.prepare(&sql).context("prepare articles query")?;
        let rows = stmt
            .query_map([], article_from_row)
            .context("query articles")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect articles")
    }

    pub fn get_article(&self, article_id: ArticleId) -> Result<Article> {
        self.conn
            .query_row(
                &ARTICLES.select_by_id(),
                params![article_id.get()],
                article_from_row,
            )
            .with_context(|| format!("load article {article_id}"))
    }

    pub fn create_article(&self, input: &ArticleFormInput) -> Result<ArticleId> {
        let now = now_rfc3339()?;
        let tags = encode_tags(&input.tags)?;
        self.conn
            .execute(
                "
                INSERT INTO articles (
                  title, excerpt, tags, category, author, status,
                  read_time_minutes, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    input.title.trim(),
                    input.excerpt,
                    tags,
                    input.category.trim(),
                    input.author.trim(),
                    input.status.as_str(),
                    input.read_time_minutes,
                    now,
                    now,
                ],
            )
            .context("insert article")?;

        let id = ArticleId::new(self.conn.last_insert_rowid());
        info!(%id, "created article");
        Ok(id)
    }

    /// Replaces the editable fields. View and vote counters are kept.
    pub fn update_article(&self, article_id: ArticleId, input: &ArticleFormInput) -> Result<()> {
        let now = now_rfc3339()?;
        let tags = encode_tags(&input.tags)?;
        let rows_affected = self
            .conn
            .execute(
                "
                UPDATE articles
                SET
                  title = ?,
                  excerpt = ?,
                  tags = ?,
                  category = ?,
                  author = ?,
                  status = ?,
                  read_time_minutes = ?,
                  updated_at = ?
                WHERE id = ? AND deleted_at IS NULL
                ",
                params![
                    input.title.trim(),
                    input.excerpt,
                    tags,
                    input.category.trim(),
                    input.author.trim(),
                    input.status.as_str(),
                    input.read_time_minutes,
                    now,
                    article_id.get(),
                ],
            )
            .context("update article")?;
        if rows_affected == 0 {
            bail!("article {article_id} not found or deleted -- choose an existing article and retry");
        }
        info!(id = %article_id, "updated article");
        Ok(())
    }

    pub fn record_article_feedback(&self, article_id: ArticleId, helpful: bool) -> Result<()> {
        let column = if helpful {
            "helpful_count"
        } else {
            "not_helpful_count"
        };
        let sql = format!(
            "UPDATE articles SET {column} = {column} + 1 WHERE id = ? AND deleted_at IS NULL"
        );
        let rows_affected = self
            .conn
            .execute(&sql, params![article_id.get()])
            .with_context(|| format!("record feedback for article {article_id}"))?;
        if rows_affected == 0 {
            bail!("article {article_id} not found or deleted -- choose an existing article and retry");
        }
        info!(id = %article_id, helpful, "recorded article feedback");
        Ok(())
    }

    pub fn record_article_view(&self, article_id: ArticleId) -> Result<()> {
        let rows_affected = self
            .conn
            .execute(
                "UPDATE articles SET views = views + 1 WHERE id = ? AND deleted_at IS NULL",
                params![article_id.get()],
            )
            .with_context(|| format!("record view for article {article_id}"))?;
        if rows_affected == 0 {
            bail!("article {article_id} not found or deleted -- choose an existing article and retry");
        }
        debug!(id = %article_id, "recorded article view");
        Ok(())
    }

    pub fn soft_delete_article(&self, article_id: ArticleId) -> Result<()> {
        self.soft_delete(RecordRef::Article(article_id))
    }

    pub fn restore_article(&self, article_id: ArticleId) -> Result<()> {
        self.restore(RecordRef::Article(article_id))
    }

    pub fn list_skills(&self, include_deleted: bool) -> Result<Vec<Skill>> {
        let sql = SKILLS.list(include_deleted);
        debug!(include_deleted, "list skills");
        let mut stmt = self.conn.prepare(&sql).context("prepare skills query")?;
        let rows = stmt
            .query_map([], skill_from_row)
            .context("query skills")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect skills")
    }

    pub fn create_skill(&self, input: &SkillFormInput) -> Result<SkillId> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO skills (
                  name, category, level, years_of_experience, endorsements,
                  created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    input.name.trim(),
                    input.category.trim(),
                    input.level.as_str(),
                    input.years_of_experience,
                    input.endorsements,
                    now,
                    now,
                ],
            )
            .context("insert skill")?;

        let id = SkillId::new(self.conn.last_insert_rowid());
        info!(%id, "created skill");
        Ok(id)
    }

    pub fn update_skill(&self, skill_id: SkillId, input: &SkillFormInput) -> Result<()> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "
                UPDATE skills
                SET
                  name = ?,
                  category = ?,
                  level = ?,
                  years_of_experience = ?,
                  endorsements = ?,
                  updated_at = ?
                WHERE id = ? AND deleted_at IS NULL
                ",
                params![
                    input.name.trim(),
                    input.category.trim(),
                    input.level.as_str(),
                    input.years_of_experience,
                    input.endorsements,
                    now,
                    skill_id.get(),
                ],
            )
            .context("update skill")?;
        if rows_affected == 0 {
            bail!("skill {skill_id} not found or deleted -- choose an existing skill and retry");
        }
        info!(id = %skill_id, "updated skill");
        Ok(())
    }

    pub fn soft_delete_skill(&self, skill_id: SkillId) -> Result<()> {
        self.soft_delete(RecordRef::Skill(skill_id))
    }

    pub fn restore_skill(&self, skill_id: SkillId) -> Result<()> {
        self.restore(RecordRef::Skill(skill_id))
    }

    pub fn soft_delete(&self, target: RecordRef) -> Result<()> {
        let (entity, id) = lifecycle_target(target);
        self.soft_delete_entity(entity, id)
    }

    pub fn restore(&self, target: RecordRef) -> Result<()> {
        let (entity, id) = lifecycle_target(target);
        self.restore_entity(entity, id)
    }

    /// Deletion history, newest first.
    pub fn list_deletion_records(&self) -> Result<Vec<DeletionRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, entity, target_id, deleted_at, restored_at
                FROM deletion_records
                ORDER BY deleted_at DESC, id DESC
                ",
            )
            .context("prepare deletion records query")?;
        let rows = stmt
            .query_map([], |row| {
                let entity_raw: String = row.get(1)?;
                let entity = DeletionEntity::parse(&entity_raw).ok_or_else(|| {
                    invalid_column(1, format!("unknown deletion entity {entity_raw}"))
                })?;
                let deleted_at_raw: String = row.get(3)?;
                let restored_at_raw: Option<String> = row.get(4)?;
                Ok(DeletionRecord {
                    id: DeletionRecordId::new(row.get(0)?),
                    entity,
                    target_id: row.get(2)?,
                    deleted_at: parse_datetime(&deleted_at_raw).map_err(to_sql_error)?,
                    restored_at: parse_opt_datetime(restored_at_raw).map_err(to_sql_error)?,
                })
            })
            .context("query deletion records")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect deletion records")
    }

    /// Fills an empty database with faked invoices, articles and skills.
    /// Refuses to touch a database that already holds records.
    pub fn seed_demo(&self, faker: &mut Faker) -> Result<SeedSummary> {
        if !self.is_empty()? {
            bail!("database already has records -- seed demo data into an empty database");
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin demo seed transaction")?;
        for _ in 0..DEMO_INVOICES {
            self.create_invoice(&faker.invoice())?;
        }
        for _ in 0..DEMO_ARTICLES {
            let id = self.create_article(&faker.article())?;
            let engagement = faker.engagement();
            self.conn
                .execute(
                    "
                    UPDATE articles
                    SET views = ?, helpful_count = ?, not_helpful_count = ?
                    WHERE id = ?
                    ",
                    params![
                        engagement.views,
                        engagement.helpful,
                        engagement.not_helpful,
                        id.get()
                    ],
                )
                .with_context(|| format!("seed engagement for article {id}"))?;
        }
        for _ in 0..DEMO_SKILLS {
            self.create_skill(&faker.skill())?;
        }
        tx.commit().context("commit demo seed")?;

        let summary = SeedSummary {
            invoices: DEMO_INVOICES,
            articles: DEMO_ARTICLES,
            skills: DEMO_SKILLS,
        };
        info!(seed = faker.seed(), ?summary, "seeded demo data");
        Ok(summary)
    }

    // Millisecond clock with a bump on collision so back-to-back creates
    // never share a number.
    fn next_invoice_number(&self) -> Result<String> {
        let mut millis = i64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000)
            .context("current time out of range for invoice number")?;
        loop {
            let candidate = format!("INV-{millis}");
            let taken: Option<i64> = self
                .conn
                .query_row(
                    "SELECT id FROM invoices WHERE invoice_number = ?",
                    params![candidate],
                    |row| row.get(0),
                )
                .optional()
                .context("check invoice number")?;
            if taken.is_none() {
                return Ok(candidate);
            }
            millis += 1;
        }
    }

    // The row flag and its deletion record commit together or not at all.
    fn soft_delete_entity(&self, entity: DeletionEntity, entity_id: i64) -> Result<()> {
        let now = now_rfc3339()?;
        let table = Table::for_entity(entity);
        let tx = self
            .conn
            .unchecked_transaction()
            .with_context(|| format!("begin delete of {} {entity_id}", entity.as_str()))?;
        let rows_affected = tx
            .execute(
                &format!(
                    "UPDATE {} SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                    table.name
                ),
                params![now, entity_id],
            )
            .with_context(|| format!("soft delete {} {entity_id}", entity.as_str()))?;
        if rows_affected == 0 {
            bail!(
                "{} {entity_id} not found or already deleted -- list with --deleted to check",
                entity.as_str()
            );
        }
        tx.execute(
            "INSERT INTO deletion_records (entity, target_id, deleted_at) VALUES (?, ?, ?)",
            params![entity.as_str(), entity_id, now],
        )
        .with_context(|| format!("record deletion for {} {entity_id}", entity.as_str()))?;
        tx.commit()
            .with_context(|| format!("commit delete of {} {entity_id}", entity.as_str()))?;
        info!(entity = entity.as_str(), id = entity_id, "soft deleted");
        Ok(())
    }

    fn restore_entity(&self, entity: DeletionEntity, entity_id: i64) -> Result<()> {
        let now = now_rfc3339()?;
        let table = Table::for_entity(entity);
        let tx = self
            .conn
            .unchecked_transaction()
            .with_context(|| format!("begin restore of {} {entity_id}", entity.as_str()))?;
        let rows_affected = tx
            .execute(
                &format!(
                    "UPDATE {} SET deleted_at = NULL, updated_at = ? WHERE id = ? AND deleted_at IS NOT NULL",
                    table.name
                ),
                params![now, entity_id],
            )
            .with_context(|| format!("restore {} {entity_id}", entity.as_str()))?;
        if rows_affected == 0 {
            bail!(
                "{} {entity_id} is not deleted or does not exist",
                entity.as_str()
            );
        }
        tx.execute(
            "
            UPDATE deletion_records
            SET restored_at = ?
            WHERE entity = ? AND target_id = ? AND restored_at IS NULL
            ",
            params![now, entity.as_str(), entity_id],
        )
        .with_context(|| format!("close deletion record for {} {entity_id}", entity.as_str()))?;
        tx.commit()
            .with_context(|| format!("commit restore of {} {entity_id}", entity.as_str()))?;
        info!(entity = entity.as_str(), id = entity_id, "restored");
        Ok(())
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os(DB_PATH_ENV) {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set {DB_PATH_ENV} to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("freeflow.db"))
}

/// Where a database path points once it has passed [`validate_db_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DbLocation {
    Memory,
    File,
}

impl DbLocation {
    fn classify(path: &Path) -> Result<Self> {
        let raw = path.to_string_lossy();
        validate_db_path(&raw)?;
        if raw == ":memory:" {
            return Ok(Self::Memory);
        }
        if path.is_dir() {
            bail!(
                "database path {} is a directory -- point it at a file such as {}",
                path.display(),
                path.join("freeflow.db").display()
            );
        }
        Ok(Self::File)
    }
}

/// Accepts `:memory:` or a plain filesystem path. SQLite URI syntax is
/// refused because connections are opened without URI handling.
pub fn validate_db_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        bail!("database path is blank -- set [storage].db_path or {DB_PATH_ENV}");
    }
    if path == ":memory:" {
        return Ok(());
    }

    let scheme = path
        .split_once("://")
        .map(|(scheme, _)| scheme)
        .filter(|scheme| !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric()));
    let uri_form = match scheme {
        Some(scheme) => Some(format!("{scheme}://")),
        None if path.starts_with("file:") => Some("file:".to_owned()),
        None => None,
    };
    if let Some(form) = uri_form {
        bail!("database path {path:?} is a {form} URI -- pass a plain file path instead");
    }
    if let Some((file, _)) = path.split_once('?') {
        bail!("database path {path:?} carries query parameters -- use {file:?} without them");
    }
    Ok(())
}

fn invoice_from_row(row: &Row<'_>) -> rusqlite::Result<Invoice> {
    let status = status_from_row(row, 5)?;
    let issue_date_raw: Option<String> = row.get(8)?;
    let due_date_raw: Option<String> = row.get(9)?;
    let last_reminder_raw: Option<String> = row.get(12)?;
    let created_at_raw: String = row.get(13)?;
    let updated_at_raw: String = row.get(14)?;
    let deleted_at_raw: Option<String> = row.get(15)?;

    Ok(Invoice {
        id: InvoiceId::new(row.get(0)?),
        invoice_number: row.get(1)?,
        title: row.get(2)?,
        client_name: row.get(3)?,
        client_email: row.get(4)?,
        status,
        amount_cents: row.get(6)?,
        currency: row.get(7)?,
        issue_date: parse_opt_date(issue_date_raw).map_err(to_sql_error)?,
        due_date: parse_opt_date(due_date_raw).map_err(to_sql_error)?,
        notes: row.get(10)?,
        reminder_count: row.get(11)?,
        last_reminder_at: parse_opt_datetime(last_reminder_raw).map_err(to_sql_error)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
        deleted_at: parse_opt_datetime(deleted_at_raw).map_err(to_sql_error)?,
    })
}

fn article_from_row(row: &Row<'_>) -> rusqlite::Result<Article> {
    let tags_raw: String = row.get(3)?;
    let tags: Vec<String> = serde_json::from_str(&tags_raw)
        .map_err(|error| invalid_column(3, format!("article tags are not a JSON list: {error}")))?;
    let status = status_from_row(row, 6)?;
    let created_at_raw: String = row.get(11)?;
    let updated_at_raw: String = row.get(12)?;
    let deleted_at_raw: Option<String> = row.get(13)?;

    Ok(Article {
        id: ArticleId::new(row.get(0)?),
        title: row.get(1)?,
        excerpt: row.get(2)?,
        tags,
        category: row.get(4)?,
        author: row.get(5)?,
        status,
        views: row.get(7)?,
        helpful_count: row.get(8)?,
        not_helpful_count: row.get(9)?,
        read_time_minutes: row.get(10)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
        deleted_at: parse_opt_datetime(deleted_at_raw).map_err(to_sql_error)?,
    })
}

fn skill_from_row(row: &Row<'_>) -> rusqlite::Result<Skill> {
    let level = status_from_row(row, 3)?;
    let created_at_raw: String = row.get(6)?;
    let updated_at_raw: String = row.get(7)?;
    let deleted_at_raw: Option<String> = row.get(8)?;

    Ok(Skill {
        id: SkillId::new(row.get(0)?),
        name: row.get(1)?,
        category: row.get(2)?,
        level,
        years_of_experience: row.get(4)?,
        endorsements: row.get(5)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
        deleted_at: parse_opt_datetime(deleted_at_raw).map_err(to_sql_error)?,
    })
}

fn status_from_row<S: StatusKind>(row: &Row<'_>, index: usize) -> rusqlite::Result<S> {
    let raw: String = row.get(index)?;
    S::parse(&raw).ok_or_else(|| invalid_column(index, format!("unknown status {raw}")))
}

fn invalid_column(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn encode_tags(tags: &[String]) -> Result<String> {
    let trimmed: Vec<&str> = tags.iter().map(|tag| tag.trim()).collect();
    serde_json::to_string(&trimmed).context("encode article tags")
}

/// Tables with their column names, and indexes with the SQL that builds
/// them, as recorded in `sqlite_master`.
#[derive(Debug, Default, PartialEq, Eq)]
struct SchemaShape {
    tables: BTreeMap<String, BTreeSet<String>>,
    indexes: BTreeMap<String, String>,
}

impl SchemaShape {
    fn read(conn: &Connection) -> Result<Self> {
        let mut shape = Self::default();

        let mut stmt = conn
            .prepare(
                "
                SELECT m.name, c.name
                FROM sqlite_master AS m
                JOIN pragma_table_info(m.name) AS c
                WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%'
                ",
            )
            .context("prepare schema columns query")?;
        let columns = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .context("query schema columns")?;
        for column in columns {
            let (table, column) = column.context("read schema column")?;
            shape.tables.entry(table).or_default().insert(column);
        }

        let mut stmt = conn
            .prepare(
                "
                SELECT name, sql
                FROM sqlite_master
                WHERE type = 'index' AND sql IS NOT NULL
                ",
            )
            .context("prepare schema indexes query")?;
        let indexes = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .context("query schema indexes")?;
        for index in indexes {
            let (name, sql) = index.context("read schema index")?;
            shape.indexes.insert(name, sql);
        }
        Ok(shape)
    }

    /// The shape a freshly created database has.
    fn expected() -> Result<Self> {
        let scratch = Connection::open_in_memory().context("open scratch schema database")?;
        scratch
            .execute_batch(SCHEMA_SQL)
            .context("load embedded schema")?;
        Self::read(&scratch)
    }

    fn check_tables(&self, expected: &Self) -> Result<()> {
        let missing_tables: Vec<&str> = expected
            .tables
            .keys()
            .filter(|table| !self.tables.contains_key(*table))
            .map(String::as_str)
            .collect();
        if !missing_tables.is_empty() {
            bail!(
                "database is missing tables {} -- point {DB_PATH_ENV} at a freeflow database or start from an empty file",
                missing_tables.join(", ")
            );
        }

        for (table, wanted) in &expected.tables {
            let Some(have) = self.tables.get(table) else {
                continue;
            };
            let missing: Vec<&str> = wanted.difference(have).map(String::as_str).collect();
            if !missing.is_empty() {
                bail!(
                    "table `{table}` lacks columns {} -- migrate the database before launching",
                    missing.join(", ")
                );
            }
        }
        Ok(())
    }
}

fn tune_connection(conn: &Connection, location: DbLocation) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("set sqlite busy timeout")?;
    if location == DbLocation::File {
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .context("switch sqlite journal to WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("set sqlite synchronous mode")?;
        debug!(%mode, "tuned database connection");
    }
    Ok(())
}

fn now_rfc3339() -> Result<String> {
    format_timestamp(OffsetDateTime::now_utc())
}

// Fixed-width nanoseconds keep text order equal to time order for ORDER BY.
fn format_timestamp(value: OffsetDateTime) -> Result<String> {
    value
        .to_offset(time::UtcOffset::UTC)
        .format(&format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z"
        ))
        .context("format timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}

fn parse_date(raw: &str) -> Result<Date> {
    if let Ok(value) = Date::parse(raw, &format_description!("[year]-[month]-[day]")) {
        return Ok(value);
    }

    // Hand-edited rows sometimes carry a full timestamp; keep the date part.
    let date_time = parse_datetime(raw)?;
    Ok(date_time.date())
}

fn parse_opt_datetime(raw: Option<String>) -> Result<Option<OffsetDateTime>> {
    raw.as_deref().map(parse_datetime).transpose()
}

fn parse_opt_date(raw: Option<String>) -> Result<Option<Date>> {
    raw.as_deref().map(parse_date).transpose()
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    invalid_column(0, error.to_string())
}

fn format_date(value: Date) -> String {
    value
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "1970-01-01".to_owned())
}
