// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use freeflow_app::{
    Article, DashboardRuntime, FormPayload, Invoice, Mutation, RecordRef, Skill,
};
use freeflow_db::Store;
use tracing::debug;

/// Backs the dashboard controller with a SQLite store.
pub struct DbRuntime<'a> {
    store: &'a Store,
}

impl<'a> DbRuntime<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

impl DashboardRuntime for DbRuntime<'_> {
    fn load_invoices(&mut self, include_deleted: bool) -> Result<Vec<Invoice>> {
        self.store.list_invoices(include_deleted)
    }

    fn load_articles(&mut self, include_deleted: bool) -> Result<Vec<Article>> {
        self.store.list_articles(include_deleted)
    }

    fn load_skills(&mut self, include_deleted: bool) -> Result<Vec<Skill>> {
        self.store.list_skills(include_deleted)
    }

    fn submit_form(&mut self, payload: &FormPayload) -> Result<()> {
        payload.validate()?;

        match payload {
            FormPayload::Invoice(form) => {
                self.store.create_invoice(form)?;
            }
            FormPayload::Article(form) => {
                self.store.create_article(form)?;
            }
            FormPayload::Skill(form) => {
                self.store.create_skill(form)?;
            }
        }
        Ok(())
    }

    fn update_form(&mut self, target: RecordRef, payload: &FormPayload) -> Result<()> {
        payload.validate()?;

        match (target, payload) {
            (RecordRef::Invoice(id), FormPayload::Invoice(form)) => {
                self.store.update_invoice(id, form)
            }
            (RecordRef::Article(id), FormPayload::Article(form)) => {
                self.store.update_article(id, form)
            }
            (RecordRef::Skill(id), FormPayload::Skill(form)) => self.store.update_skill(id, form),
            (target, payload) => bail!(
                "{} {} cannot take a {:?} form",
                target.page().as_str(),
                record_id(target),
                payload.kind()
            ),
        }
    }

    fn apply_mutation(&mut self, mutation: Mutation) -> Result<()> {
        debug!(?mutation, "applying mutation");
        match mutation {
            Mutation::SoftDelete(target) => self.store.soft_delete(target),
            Mutation::Restore(target) => self.store.restore(target),
            Mutation::SetInvoiceStatus(id, status) => self.store.set_invoice_status(id, status),
            Mutation::DuplicateInvoice(id) => self.store.duplicate_invoice(id).map(|_| ()),
            Mutation::SendReminder(id) => self.store.send_invoice_reminder(id),
            Mutation::ArticleFeedback { id, helpful } => {
                self.store.record_article_feedback(id, helpful)
            }
        }
    }
}

fn record_id(target: RecordRef) -> i64 {
    match target {
        RecordRef::Invoice(id) => id.get(),
        RecordRef::Article(id) => id.get(),
        RecordRef::Skill(id) => id.get(),
    }
}

#[cfg(test)]
mod tests {
    use super::DbRuntime;
    use anyhow::Result;
    use freeflow_app::{
        ArticleFormInput, DashboardController, DashboardRuntime, FormKind, FormPayload,
        InvoiceStatus, Mutation, PageKind, RecordRef, SkillFormInput, SkillLevel, ViewCommand,
        ViewEvent,
    };
    use freeflow_db::Store;
    use freeflow_testkit::Faker;

    fn store() -> Result<Store> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        Ok(store)
    }

    #[test]
    fn submit_form_creates_rows_for_each_kind() -> Result<()> {
        let store = store()?;
        let mut runtime = DbRuntime::new(&store);
        let mut faker = Faker::new(3);

        runtime.submit_form(&FormPayload::Invoice(faker.invoice()))?;
        runtime.submit_form(&FormPayload::Article(faker.article()))?;
        runtime.submit_form(&FormPayload::Skill(faker.skill()))?;

        assert_eq!(runtime.load_invoices(false)?.len(), 1);
        assert_eq!(runtime.load_articles(false)?.len(), 1);
        assert_eq!(runtime.load_skills(false)?.len(), 1);
        Ok(())
    }

    #[test]
    fn submit_form_rejects_invalid_payload_before_store() -> Result<()> {
        let store = store()?;
        let mut runtime = DbRuntime::new(&store);

        let error = runtime
            .submit_form(&FormPayload::blank_for(FormKind::Skill))
            .expect_err("blank skill should fail validation");
        assert!(error.to_string().contains("skill name is required"));
        assert!(store.is_empty()?);
        Ok(())
    }

    #[test]
    fn controller_mark_paid_refetches_from_store() -> Result<()> {
        let store = store()?;
        store.seed_demo(&mut Faker::new(5))?;
        let target = store.list_invoices(false)?[0].id;

        let mut controller = DashboardController::new(DbRuntime::new(&store));
        controller.refresh(PageKind::Invoices);
        let events = controller.apply(Mutation::mark_paid(target));

        assert!(events.contains(&ViewEvent::RefetchRequested));
        let paid = controller
            .invoices
            .records()
            .iter()
            .find(|invoice| invoice.id == target)
            .map(|invoice| invoice.status);
        assert_eq!(paid, Some(InvoiceStatus::Paid));
        Ok(())
    }

    #[test]
    fn deleted_rows_follow_the_session_toggle() -> Result<()> {
        let store = store()?;
        let mut controller = DashboardController::new(DbRuntime::new(&store));
        controller.submit(&FormPayload::Skill(SkillFormInput {
            name: "Rust".to_owned(),
            category: "Programming".to_owned(),
            level: SkillLevel::Expert,
            years_of_experience: 8,
            endorsements: 42,
        }));
        let id = controller.skills.records()[0].id;

        controller.apply(Mutation::SoftDelete(RecordRef::Skill(id)));
        assert!(controller.skills.records().is_empty());

        controller.skills.dispatch(ViewCommand::ToggleDeleted);
        controller.refresh(PageKind::Skills);
        assert_eq!(controller.skills.records().len(), 1);
        assert!(controller.skills.records()[0].deleted_at.is_some());
        Ok(())
    }

    #[test]
    fn failed_mutation_surfaces_store_message() -> Result<()> {
        let store = store()?;
        let mut controller = DashboardController::new(DbRuntime::new(&store));
        let events = controller.apply(Mutation::DuplicateInvoice(freeflow_app::InvoiceId::new(9)));
        assert!(
            events
                .iter()
                .any(|event| matches!(event, ViewEvent::MutationFailed(message) if message.contains("load invoice 9")))
        );
        Ok(())
    }

    #[test]
    fn controller_edit_rewrites_the_stored_row() -> Result<()> {
        let store = store()?;
        store.seed_demo(&mut Faker::new(11))?;
        let article = store.list_articles(false)?[0].clone();

        let mut form = ArticleFormInput::from(&article);
        form.title = "Reconciling payouts".to_owned();
        form.tags.push("Payouts".to_owned());
        let mut controller = DashboardController::new(DbRuntime::new(&store));
        controller.refresh(PageKind::Articles);
        let events = controller.edit(RecordRef::Article(article.id), &FormPayload::Article(form));

        let notice = format!("article {} updated", article.id);
        assert!(events.contains(&ViewEvent::MutationSucceeded(notice)));
        let stored = store.get_article(article.id)?;
        assert_eq!(stored.title, "Reconciling payouts");
        assert_eq!(stored.tags.last().map(String::as_str), Some("Payouts"));
        assert_eq!(stored.views, article.views);
        Ok(())
    }

    #[test]
    fn update_form_refuses_a_mismatched_target() -> Result<()> {
        let store = store()?;
        let mut runtime = DbRuntime::new(&store);
        let error = runtime
            .update_form(
                RecordRef::Invoice(freeflow_app::InvoiceId::new(1)),
                &FormPayload::Skill(Faker::new(1).skill()),
            )
            .expect_err("a skill form cannot edit an invoice");
        assert!(error.to_string().contains("invoices 1 cannot take a Skill form"));
        Ok(())
    }

    #[test]
    fn batch_reminders_skip_drafts_and_count_the_rest() -> Result<()> {
        let store = store()?;
        let mut faker = Faker::new(2);
        let mut ids = Vec::new();
        for status in [InvoiceStatus::Sent, InvoiceStatus::Draft, InvoiceStatus::Overdue] {
            let mut form = faker.invoice();
            form.status = status;
            ids.push(store.create_invoice(&form)?);
        }

        let mut controller = DashboardController::new(DbRuntime::new(&store));
        let batch: Vec<Mutation> = ids.iter().copied().map(Mutation::SendReminder).collect();
        let events = controller.apply_batch(PageKind::Invoices, &batch);

        assert!(events.iter().any(
            |event| matches!(event, ViewEvent::MutationSucceeded(message) if message.starts_with("2 of 3 applied"))
        ));
        let counts: Vec<i64> = ids
            .iter()
            .map(|id| store.get_invoice(*id).map(|invoice| invoice.reminder_count))
            .collect::<Result<_>>()?;
        assert_eq!(counts, vec![1, 0, 1]);
        Ok(())
    }
}
