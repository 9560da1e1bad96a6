// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use freeflow_app::{
    ArticleFormInput, ArticleStatus, DeletionEntity, Discount, InvoiceFormInput, InvoiceId,
    InvoiceStatus, LineItem, RecordRef, SkillFormInput, SkillLevel, Summarize,
};
use freeflow_db::{SeedSummary, Store};
use freeflow_testkit::{Faker, temp_db_path};
use time::macros::date;

fn invoice_input(client: &str, title: &str) -> InvoiceFormInput {
    InvoiceFormInput {
        invoice_number: String::new(),
        title: title.to_owned(),
        client_name: client.to_owned(),
        client_email: "billing@example.com".to_owned(),
        status: InvoiceStatus::Draft,
        currency: "usd".to_owned(),
        issue_date: Some(date!(2026 - 03 - 01)),
        due_date: Some(date!(2026 - 03 - 31)),
        line_items: vec![LineItem {
            description: "Design hours".to_owned(),
            quantity: 10,
            rate_cents: 12_500,
            tax_basis_points: 1_000,
        }],
        discount: Discount::Fixed { cents: 5_000 },
        notes: String::new(),
    }
}

fn article_input(title: &str, tags: &[&str]) -> ArticleFormInput {
    ArticleFormInput {
        title: title.to_owned(),
        excerpt: "How it works.".to_owned(),
        tags: tags.iter().map(|tag| (*tag).to_owned()).collect(),
        category: "Billing".to_owned(),
        author: "Riley".to_owned(),
        status: ArticleStatus::Published,
        read_time_minutes: 4,
    }
}

fn skill_input(name: &str, endorsements: i64) -> SkillFormInput {
    SkillFormInput {
        name: name.to_owned(),
        category: "Programming".to_owned(),
        level: SkillLevel::Advanced,
        years_of_experience: 6,
        endorsements,
    }
}

fn fresh_store() -> Result<Store> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    Ok(store)
}

#[test]
fn create_invoice_stores_computed_total_and_number() -> Result<()> {
    let store = fresh_store()?;
    let id = store.create_invoice(&invoice_input("Acme Corp", "Website redesign"))?;

    let invoice = store.get_invoice(id)?;
    // 10 * 125.00 = 1250.00, +10% tax = 1375.00, -50.00 fixed = 1325.00
    assert_eq!(invoice.amount_cents, 132_500);
    assert!(invoice.invoice_number.starts_with("INV-"));
    assert_eq!(invoice.currency, "USD");
    assert_eq!(invoice.status, InvoiceStatus::Draft);
    assert_eq!(invoice.due_date, Some(date!(2026 - 03 - 31)));
    assert!(invoice.deleted_at.is_none());
    Ok(())
}

#[test]
fn generated_invoice_numbers_are_unique() -> Result<()> {
    let store = fresh_store()?;
    for index in 0..5 {
        store.create_invoice(&invoice_input("Acme Corp", &format!("Batch {index}")))?;
    }
    let invoices = store.list_invoices(false)?;
    let mut numbers: Vec<&str> = invoices
        .iter()
        .map(|invoice| invoice.invoice_number.as_str())
        .collect();
    numbers.sort_unstable();
    numbers.dedup();
    assert_eq!(numbers.len(), 5);
    Ok(())
}

#[test]
fn explicit_invoice_number_is_kept() -> Result<()> {
    let store = fresh_store()?;
    let mut input = invoice_input("Acme Corp", "Retainer");
    input.invoice_number = "ACME-001".to_owned();
    let id = store.create_invoice(&input)?;
    assert_eq!(store.get_invoice(id)?.invoice_number, "ACME-001");
    Ok(())
}

#[test]
fn list_orders_by_most_recently_updated() -> Result<()> {
    let store = fresh_store()?;
    let first = store.create_skill(&skill_input("Rust", 30))?;
    let second = store.create_skill(&skill_input("SQL", 5))?;

    let ids: Vec<_> = store.list_skills(false)?.iter().map(|skill| skill.id).collect();
    assert_eq!(ids, vec![second, first]);

    store.update_skill(first, &skill_input("Rust", 31))?;
    let ids: Vec<_> = store.list_skills(false)?.iter().map(|skill| skill.id).collect();
    assert_eq!(ids, vec![first, second]);
    Ok(())
}

#[test]
fn set_invoice_status_and_missing_row_error() -> Result<()> {
    let store = fresh_store()?;
    let id = store.create_invoice(&invoice_input("Globex", "Audit"))?;

    store.set_invoice_status(id, InvoiceStatus::Sent)?;
    assert_eq!(store.get_invoice(id)?.status, InvoiceStatus::Sent);

    store.soft_delete_invoice(id)?;
    let error = store
        .set_invoice_status(id, InvoiceStatus::Paid)
        .expect_err("deleted invoice cannot change status");
    assert!(error.to_string().contains("not found or deleted"));
    Ok(())
}

#[test]
fn duplicate_invoice_creates_fresh_draft() -> Result<()> {
    let store = fresh_store()?;
    let id = store.create_invoice(&invoice_input("Initech", "Logo package"))?;
    store.set_invoice_status(id, InvoiceStatus::Paid)?;

    let copy_id = store.duplicate_invoice(id)?;
    assert_ne!(copy_id, id);

    let source = store.get_invoice(id)?;
    let copy = store.get_invoice(copy_id)?;
    assert_eq!(copy.title, "Copy of Logo package");
    assert_eq!(copy.status, InvoiceStatus::Draft);
    assert_eq!(copy.amount_cents, source.amount_cents);
    assert_eq!(copy.client_name, source.client_name);
    assert_ne!(copy.invoice_number, source.invoice_number);
    let term = copy
        .due_date
        .zip(copy.issue_date)
        .map(|(due, issue)| (due - issue).whole_days());
    assert_eq!(term, Some(30));
    Ok(())
}

#[test]
fn duplicate_refuses_a_term_past_the_calendar() -> Result<()> {
    let store = fresh_store()?;
    let mut input = invoice_input("Initech", "Perpetual license");
    input.issue_date = Some(date!(2000 - 01 - 01));
    input.due_date = Some(date!(9999 - 01 - 01));
    let id = store.create_invoice(&input)?;

    let error = store
        .duplicate_invoice(id)
        .expect_err("a term reaching past year 9999 cannot be copied");
    let message = error.to_string();
    assert!(message.contains(&format!("invoice {id} has a")));
    assert!(message.contains("shorten its due date"));
    assert_eq!(store.list_invoices(true)?.len(), 1);
    Ok(())
}

#[test]
fn update_invoice_rewrites_fields_and_keeps_blank_number() -> Result<()> {
    let store = fresh_store()?;
    let id = store.create_invoice(&invoice_input("Acme Corp", "Website redesign"))?;
    let number = store.get_invoice(id)?.invoice_number;

    let mut edit = invoice_input("Acme Corporation", "Website redesign, phase 2");
    edit.status = InvoiceStatus::Sent;
    edit.discount = Discount::Percent { basis_points: 1_000 };
    edit.due_date = Some(date!(2026 - 04 - 15));
    store.update_invoice(id, &edit)?;

    let invoice = store.get_invoice(id)?;
    assert_eq!(invoice.invoice_number, number);
    assert_eq!(invoice.client_name, "Acme Corporation");
    assert_eq!(invoice.status, InvoiceStatus::Sent);
    // 1250.00 + 125.00 tax - 125.00 discount
    assert_eq!(invoice.amount_cents, 125_000);
    assert_eq!(invoice.due_date, Some(date!(2026 - 04 - 15)));

    let error = store
        .update_invoice(InvoiceId::new(404), &edit)
        .expect_err("missing invoice");
    assert!(error.to_string().contains("invoice 404 not found or deleted"));
    Ok(())
}

#[test]
fn reminders_count_up_for_unpaid_sent_invoices_only() -> Result<()> {
    let store = fresh_store()?;
    let id = store.create_invoice(&invoice_input("Globex", "Audit"))?;

    let error = store
        .send_invoice_reminder(id)
        .expect_err("drafts have not reached the client");
    assert!(error.to_string().contains("is draft"));

    store.set_invoice_status(id, InvoiceStatus::Overdue)?;
    let before = store.get_invoice(id)?;
    store.send_invoice_reminder(id)?;
    store.send_invoice_reminder(id)?;
    let after = store.get_invoice(id)?;
    assert_eq!(after.reminder_count, 2);
    assert!(after.last_reminder_at.is_some());
    assert_eq!(after.updated_at, before.updated_at);

    store.set_invoice_status(id, InvoiceStatus::Paid)?;
    let error = store
        .send_invoice_reminder(id)
        .expect_err("paid invoices need no reminder");
    assert!(error.to_string().contains("is paid"));
    Ok(())
}

#[test]
fn article_tags_round_trip_as_json() -> Result<()> {
    let store = fresh_store()?;
    let id = store.create_article(&article_input("Sending invoices", &["invoices", " email "]))?;

    let article = store.get_article(id)?;
    assert_eq!(article.tags, vec!["invoices".to_owned(), "email".to_owned()]);

    let stored: String = store.raw_connection().query_row(
        "SELECT tags FROM articles WHERE id = ?",
        [id.get()],
        |row| row.get(0),
    )?;
    assert_eq!(stored, r#"["invoices","email"]"#);
    Ok(())
}

#[test]
fn article_feedback_and_views_increment_counters() -> Result<()> {
    let store = fresh_store()?;
    let id = store.create_article(&article_input("Payment terms", &["payments"]))?;

    store.record_article_feedback(id, true)?;
    store.record_article_feedback(id, true)?;
    store.record_article_feedback(id, false)?;
    store.record_article_view(id)?;

    let article = store.get_article(id)?;
    assert_eq!(article.helpful_count, 2);
    assert_eq!(article.not_helpful_count, 1);
    assert_eq!(article.views, 1);

    store.update_article(id, &article_input("Payment terms v2", &["payments"]))?;
    let article = store.get_article(id)?;
    assert_eq!(article.title, "Payment terms v2");
    assert_eq!(article.helpful_count, 2, "update keeps counters");
    Ok(())
}

#[test]
fn soft_delete_and_restore_write_deletion_records() -> Result<()> {
    let store = fresh_store()?;
    let id = store.create_skill(&skill_input("Figma", 3))?;

    store.soft_delete(RecordRef::Skill(id))?;
    assert!(store.list_skills(false)?.is_empty());
    let with_deleted = store.list_skills(true)?;
    assert_eq!(with_deleted.len(), 1);
    assert!(with_deleted[0].deleted_at.is_some());

    let records = store.list_deletion_records()?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entity, DeletionEntity::Skill);
    assert_eq!(records[0].target_id, id.get());
    assert!(records[0].restored_at.is_none());

    store.restore_skill(id)?;
    assert_eq!(store.list_skills(false)?.len(), 1);
    assert!(store.list_deletion_records()?[0].restored_at.is_some());
    Ok(())
}

#[test]
fn double_delete_and_bad_restore_are_actionable() -> Result<()> {
    let store = fresh_store()?;
    let id = store.create_skill(&skill_input("SEO", 1))?;

    let error = store
        .restore_skill(id)
        .expect_err("live skill cannot be restored");
    assert!(error.to_string().contains("is not deleted"));

    store.soft_delete_skill(id)?;
    let error = store
        .soft_delete_skill(id)
        .expect_err("second delete should fail");
    assert!(error.to_string().contains("already deleted"));
    Ok(())
}

#[test]
fn failed_deletion_record_rolls_back_the_row_flag() -> Result<()> {
    let store = fresh_store()?;
    let id = store.create_skill(&skill_input("Figma", 3))?;
    store
        .raw_connection()
        .execute_batch("ALTER TABLE deletion_records RENAME TO deletion_history;")?;

    store
        .soft_delete_skill(id)
        .expect_err("deletion record insert should fail");
    let skills = store.list_skills(true)?;
    assert_eq!(skills.len(), 1);
    assert!(skills[0].deleted_at.is_none(), "row flag must roll back");
    Ok(())
}

#[test]
fn restore_closes_the_open_deletion_record_only() -> Result<()> {
    let store = fresh_store()?;
    let id = store.create_skill(&skill_input("Figma", 3))?;
    store.soft_delete_skill(id)?;
    store.restore_skill(id)?;
    store.soft_delete_skill(id)?;

    let records = store.list_deletion_records()?;
    assert_eq!(records.len(), 2);
    let open: Vec<_> = records
        .iter()
        .filter(|record| record.restored_at.is_none())
        .collect();
    assert_eq!(open.len(), 1);
    assert!(store.list_skills(false)?.is_empty());
    Ok(())
}

#[test]
fn update_missing_row_fails_with_hint() -> Result<()> {
    let store = fresh_store()?;
    let error = store
        .update_skill(freeflow_app::SkillId::new(99), &skill_input("Rust", 1))
        .expect_err("missing skill");
    assert!(error.to_string().contains("choose an existing skill and retry"));
    Ok(())
}

#[test]
fn seed_demo_fills_empty_store_once() -> Result<()> {
    let store = fresh_store()?;
    let summary = store.seed_demo(&mut Faker::new(7))?;
    assert_eq!(
        summary,
        SeedSummary {
            invoices: store.list_invoices(false)?.len(),
            articles: store.list_articles(false)?.len(),
            skills: store.list_skills(false)?.len(),
        }
    );
    assert!(summary.invoices > 0 && summary.articles > 0 && summary.skills > 0);

    let articles = store.list_articles(false)?;
    let stats = freeflow_app::Article::summarize(&articles);
    assert!((0..=100).contains(&stats.helpful_rate));

    let error = store
        .seed_demo(&mut Faker::new(7))
        .expect_err("seeding twice should fail");
    assert!(error.to_string().contains("empty database"));
    Ok(())
}

#[test]
fn seed_demo_is_deterministic_per_seed() -> Result<()> {
    let left = fresh_store()?;
    let right = fresh_store()?;
    left.seed_demo(&mut Faker::new(11))?;
    right.seed_demo(&mut Faker::new(11))?;

    let names = |store: &Store| -> Result<Vec<(String, i64)>> {
        let mut skills: Vec<(String, i64)> = store
            .list_skills(false)?
            .into_iter()
            .map(|skill| (skill.name, skill.endorsements))
            .collect();
        skills.sort();
        Ok(skills)
    };
    assert_eq!(names(&left)?, names(&right)?);
    Ok(())
}

#[test]
fn file_backed_store_reopens_with_data() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        store.create_skill(&skill_input("Typography", 12))?;
    }

    let store = Store::open(&path)?;
    store.bootstrap()?;
    let skills = store.list_skills(false)?;
    assert_eq!(skills.len(), 1);
    assert_eq!(skills[0].name, "Typography");
    Ok(())
}

#[test]
fn bootstrap_rejects_schema_missing_required_column() -> Result<()> {
    let store = fresh_store()?;
    store.raw_connection().execute_batch(
        "
        ALTER TABLE skills RENAME TO skills_old;
        CREATE TABLE skills (
          id INTEGER PRIMARY KEY,
          name TEXT NOT NULL,
          category TEXT NOT NULL,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          deleted_at TEXT
        );
        ",
    )?;

    let error = store
        .bootstrap()
        .expect_err("schema without level should be rejected");
    let message = error.to_string();
    assert!(message.contains("table `skills` lacks columns"));
    assert!(message.contains("level"));
    assert!(message.contains("endorsements"));
    Ok(())
}
