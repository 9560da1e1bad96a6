// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use tracing::{info, warn};

use crate::forms::FormPayload;
use crate::model::{Article, Invoice, InvoiceStatus, PageKind, Skill, StatusKind};
use crate::state::{ViewEvent, ViewSession};
use crate::stats::Summarize;
use crate::{ArticleId, InvoiceId, SkillId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRef {
    Invoice(InvoiceId),
    Article(ArticleId),
    Skill(SkillId),
}

impl RecordRef {
    pub const fn page(self) -> PageKind {
        match self {
            Self::Invoice(_) => PageKind::Invoices,
            Self::Article(_) => PageKind::Articles,
            Self::Skill(_) => PageKind::Skills,
        }
    }

    pub fn for_page(page: PageKind, id: i64) -> Self {
        match page {
            PageKind::Invoices => Self::Invoice(InvoiceId::new(id)),
            PageKind::Articles => Self::Article(ArticleId::new(id)),
            PageKind::Skills => Self::Skill(SkillId::new(id)),
        }
    }

    fn describe(self) -> String {
        match self {
            Self::Invoice(id) => format!("invoice {id}"),
            Self::Article(id) => format!("article {id}"),
            Self::Skill(id) => format!("skill {id}"),
        }
    }
}

/// A store-side change other than a form submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    SoftDelete(RecordRef),
    Restore(RecordRef),
    SetInvoiceStatus(InvoiceId, InvoiceStatus),
    DuplicateInvoice(InvoiceId),
    SendReminder(InvoiceId),
    ArticleFeedback { id: ArticleId, helpful: bool },
}

impl Mutation {
    pub const fn send(id: InvoiceId) -> Self {
        Self::SetInvoiceStatus(id, InvoiceStatus::Sent)
    }

    pub const fn mark_paid(id: InvoiceId) -> Self {
        Self::SetInvoiceStatus(id, InvoiceStatus::Paid)
    }

    pub const fn void(id: InvoiceId) -> Self {
        Self::SetInvoiceStatus(id, InvoiceStatus::Cancelled)
    }

    pub const fn page(self) -> PageKind {
        match self {
            Self::SoftDelete(target) | Self::Restore(target) => target.page(),
            Self::SetInvoiceStatus(..) | Self::DuplicateInvoice(_) | Self::SendReminder(_) => {
                PageKind::Invoices
            }
            Self::ArticleFeedback { .. } => PageKind::Articles,
        }
    }

    pub fn success_message(self) -> String {
        match self {
            Self::SoftDelete(target) => format!("{} deleted", target.describe()),
            Self::Restore(target) => format!("{} restored", target.describe()),
            Self::SetInvoiceStatus(id, status) => {
                format!("invoice {id} marked {}", status.as_str())
            }
            Self::DuplicateInvoice(id) => format!("invoice {id} duplicated as draft"),
            Self::SendReminder(id) => format!("reminder sent for invoice {id}"),
            Self::ArticleFeedback { id, helpful: true } => format!("article {id} rated helpful"),
            Self::ArticleFeedback { id, helpful: false } => {
                format!("article {id} rated not helpful")
            }
        }
    }
}

/// The data-access collaborator behind every dashboard page.
pub trait DashboardRuntime {
    fn load_invoices(&mut self, include_deleted: bool) -> Result<Vec<Invoice>>;
    fn load_articles(&mut self, include_deleted: bool) -> Result<Vec<Article>>;
    fn load_skills(&mut self, include_deleted: bool) -> Result<Vec<Skill>>;
    fn submit_form(&mut self, payload: &FormPayload) -> Result<()>;
    /// Overwrite the user-editable fields of an existing record.
    fn update_form(&mut self, target: RecordRef, payload: &FormPayload) -> Result<()>;
    fn apply_mutation(&mut self, mutation: Mutation) -> Result<()>;
}

/// A record kind that can be fetched through a [`DashboardRuntime`].
pub trait Loadable: Summarize {
    const PAGE: PageKind;

    fn load<RT>(runtime: &mut RT, include_deleted: bool) -> Result<Vec<Self>>
    where
        RT: DashboardRuntime + ?Sized;
}

impl Loadable for Invoice {
    const PAGE: PageKind = PageKind::Invoices;

    fn load<RT>(runtime: &mut RT, include_deleted: bool) -> Result<Vec<Self>>
    where
        RT: DashboardRuntime + ?Sized,
    {
        runtime.load_invoices(include_deleted)
    }
}

impl Loadable for Article {
    const PAGE: PageKind = PageKind::Articles;

    fn load<RT>(runtime: &mut RT, include_deleted: bool) -> Result<Vec<Self>>
    where
        RT: DashboardRuntime + ?Sized,
    {
        runtime.load_articles(include_deleted)
    }
}

impl Loadable for Skill {
    const PAGE: PageKind = PageKind::Skills;

    fn load<RT>(runtime: &mut RT, include_deleted: bool) -> Result<Vec<Self>>
    where
        RT: DashboardRuntime + ?Sized,
    {
        runtime.load_skills(include_deleted)
    }
}

/// Owns one session per page and routes every change through
/// validate, store call, then refetch.
pub struct DashboardController<RT: DashboardRuntime> {
    runtime: RT,
    pub invoices: ViewSession<Invoice>,
    pub articles: ViewSession<Article>,
    pub skills: ViewSession<Skill>,
}

impl<RT: DashboardRuntime> DashboardController<RT> {
    pub fn new(runtime: RT) -> Self {
        Self {
            runtime,
            invoices: ViewSession::default(),
            articles: ViewSession::default(),
            skills: ViewSession::default(),
        }
    }

    pub fn runtime(&self) -> &RT {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut RT {
        &mut self.runtime
    }

    pub fn into_runtime(self) -> RT {
        self.runtime
    }

    pub fn refresh(&mut self, page: PageKind) -> Vec<ViewEvent> {
        match page {
            PageKind::Invoices => refresh_session(&mut self.runtime, &mut self.invoices),
            PageKind::Articles => refresh_session(&mut self.runtime, &mut self.articles),
            PageKind::Skills => refresh_session(&mut self.runtime, &mut self.skills),
        }
    }

    pub fn refresh_all(&mut self) -> Vec<ViewEvent> {
        PageKind::ALL
            .into_iter()
            .flat_map(|page| self.refresh(page))
            .collect()
    }

    /// Validate and create a new record from a form.
    pub fn submit(&mut self, payload: &FormPayload) -> Vec<ViewEvent> {
        self.save(None, payload)
    }

    /// Validate and overwrite an existing record from a form.
    pub fn edit(&mut self, target: RecordRef, payload: &FormPayload) -> Vec<ViewEvent> {
        self.save(Some(target), payload)
    }

    pub fn apply(&mut self, mutation: Mutation) -> Vec<ViewEvent> {
        let op = |runtime: &mut RT| {
            runtime
                .apply_mutation(mutation)
                .map(|()| mutation.success_message())
        };
        self.mutate_page(mutation.page(), op)
    }

    /// Apply changes one page at a time, in order, with a single refetch.
    ///
    /// One failure does not stop the rest. The batch only fails when nothing
    /// was applied.
    pub fn apply_batch(&mut self, page: PageKind, mutations: &[Mutation]) -> Vec<ViewEvent> {
        if let Some(stray) = mutations.iter().find(|mutation| mutation.page() != page) {
            let error = anyhow!(
                "{} changes cannot run on the {} page -- run them separately and retry",
                stray.page().as_str().trim_end_matches('s'),
                page.as_str()
            );
            return self.reject_on(page, &error);
        }
        if mutations.is_empty() {
            return self.reject_on(page, &anyhow!("no records selected -- pass at least one id"));
        }

        let op = |runtime: &mut RT| {
            let mut applied = 0_usize;
            let mut failures = Vec::new();
            for mutation in mutations {
                match runtime.apply_mutation(*mutation) {
                    Ok(()) => applied += 1,
                    Err(error) => {
                        warn!(%error, ?mutation, "batch member failed");
                        failures.push(format!("{error:#}"));
                    }
                }
            }
            if applied == 0 {
                bail!("nothing applied: {}", failures.join("; "));
            }
            let mut message = format!("{applied} of {} applied", mutations.len());
            if !failures.is_empty() {
                message.push_str(&format!(" ({})", failures.join("; ")));
            }
            Ok(message)
        };
        self.mutate_page(page, op)
    }

    fn save(&mut self, target: Option<RecordRef>, payload: &FormPayload) -> Vec<ViewEvent> {
        let page = payload.kind().page();
        let checked = payload.validate().and_then(|()| match target {
            Some(target) if target.page() != page => bail!(
                "{} cannot take a {} form -- edit it from the {} page",
                target.describe(),
                page.as_str().trim_end_matches('s'),
                target.page().as_str()
            ),
            _ => Ok(()),
        });
        if let Err(error) = checked {
            return self.reject_on(page, &error);
        }

        let op = |runtime: &mut RT| match target {
            None => runtime
                .submit_form(payload)
                .map(|()| format!("{} saved", page.as_str().trim_end_matches('s'))),
            Some(target) => runtime
                .update_form(target, payload)
                .map(|()| format!("{} updated", target.describe())),
        };
        self.mutate_page(page, op)
    }

    fn reject_on(&mut self, page: PageKind, error: &anyhow::Error) -> Vec<ViewEvent> {
        match page {
            PageKind::Invoices => self.invoices.reject_input(error),
            PageKind::Articles => self.articles.reject_input(error),
            PageKind::Skills => self.skills.reject_input(error),
        }
    }

    fn mutate_page<F>(&mut self, page: PageKind, op: F) -> Vec<ViewEvent>
    where
        F: FnOnce(&mut RT) -> Result<String>,
    {
        match page {
            PageKind::Invoices => mutate(&mut self.runtime, &mut self.invoices, op),
            PageKind::Articles => mutate(&mut self.runtime, &mut self.articles, op),
            PageKind::Skills => mutate(&mut self.runtime, &mut self.skills, op),
        }
    }
}

fn refresh_session<RT, R>(runtime: &mut RT, session: &mut ViewSession<R>) -> Vec<ViewEvent>
where
    RT: DashboardRuntime,
    R: Loadable,
{
    let ticket = session.begin_fetch();
    let result = R::load(runtime, session.include_deleted());
    session.complete_fetch(ticket, result)
}

fn mutate<RT, R, F>(runtime: &mut RT, session: &mut ViewSession<R>, op: F) -> Vec<ViewEvent>
where
    RT: DashboardRuntime,
    R: Loadable,
    F: FnOnce(&mut RT) -> Result<String>,
{
    if let Err(error) = session.begin_mutation() {
        return vec![ViewEvent::MutationRejected(error.to_string())];
    }
    let outcome = op(runtime);
    if let Ok(message) = &outcome {
        info!(page = R::PAGE.as_str(), %message, "mutation applied");
    }
    let mut events = session.finish_mutation(outcome);
    if events.contains(&ViewEvent::RefetchRequested) {
        events.extend(refresh_session(runtime, session));
    }
    events
}
