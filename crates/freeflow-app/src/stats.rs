// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Header statistics for each dashboard page.
//!
//! Every snapshot here is computed over the whole live collection, never the
//! filtered rows, and soft-deleted records are skipped. The one figure scoped
//! to the current filter is [`FilteredSummary`], carried separately on
//! [`DerivedView`] so callers cannot confuse the two.

use std::collections::BTreeMap;

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::model::{
    Article, ArticleStatus, Invoice, InvoiceStatus, Skill, SkillLevel, StatusKind,
};
use crate::view::{Record, ViewParams, project};

pub const TOP_SKILL_ENDORSEMENTS: i64 = 20;
pub const STALE_DRAFT_DAYS: i64 = 30;
pub const LOW_TRAFFIC_VIEWS: i64 = 100;
pub const HIGHLIGHT_LIMIT: usize = 5;

/// `part / whole` as a whole percentage, rounded half up. Zero when `whole`
/// is zero or negative.
pub fn percent(part: i64, whole: i64) -> i64 {
    if whole <= 0 {
        return 0;
    }
    let part = i128::from(part.max(0));
    let whole = i128::from(whole);
    let rounded = (part * 200 + whole) / (whole * 2);
    i64::try_from(rounded).unwrap_or(i64::MAX)
}

pub fn helpful_rate(helpful: i64, not_helpful: i64) -> i64 {
    percent(helpful, helpful.saturating_add(not_helpful))
}

/// Aggregation over a whole record collection.
pub trait Summarize: Record + Sized {
    type Stats: Clone + PartialEq + std::fmt::Debug + Serialize;

    fn summarize(records: &[Self]) -> Self::Stats;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FilteredSummary {
    pub count: usize,
    pub measure_sum: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedView<'a, R: Summarize> {
    pub rows: Vec<&'a R>,
    pub stats: R::Stats,
    pub filtered: FilteredSummary,
}

pub fn derive_view<'a, R: Summarize>(
    records: &'a [R],
    params: &ViewParams<R::Status>,
) -> DerivedView<'a, R> {
    let rows = project(records, params);
    let filtered = FilteredSummary {
        count: rows.len(),
        measure_sum: rows
            .iter()
            .filter_map(|row| row.measure())
            .fold(0_i64, i64::saturating_add),
    };
    DerivedView {
        stats: R::summarize(records),
        rows,
        filtered,
    }
}

fn status_counts<R: Record>(records: &[&R]) -> BTreeMap<&'static str, usize> {
    let mut counts: BTreeMap<&'static str, usize> = <R::Status as StatusKind>::ALL
        .iter()
        .map(|status| (status.as_str(), 0))
        .collect();
    for record in records {
        *counts.entry(record.status().as_str()).or_default() += 1;
    }
    counts
}

fn live<R: Record>(records: &[R]) -> Vec<&R> {
    records.iter().filter(|record| !record.is_deleted()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct InvoiceStats {
    pub total: usize,
    pub by_status: BTreeMap<&'static str, usize>,
    pub paid_cents: i64,
    pub pending_cents: i64,
    pub overdue_cents: i64,
    pub collection_rate: i64,
}

impl Summarize for Invoice {
    type Stats = InvoiceStats;

    fn summarize(records: &[Self]) -> InvoiceStats {
        let invoices = live(records);
        let sum_where = |wanted: fn(InvoiceStatus) -> bool| {
            invoices
                .iter()
                .filter(|invoice| wanted(invoice.status))
                .map(|invoice| invoice.amount_cents)
                .fold(0_i64, i64::saturating_add)
        };
        let paid = invoices
            .iter()
            .filter(|invoice| invoice.status == InvoiceStatus::Paid)
            .count();
        InvoiceStats {
            total: invoices.len(),
            by_status: status_counts(&invoices),
            paid_cents: sum_where(|status| status == InvoiceStatus::Paid),
            pending_cents: sum_where(InvoiceStatus::is_outstanding),
            overdue_cents: sum_where(|status| status == InvoiceStatus::Overdue),
            collection_rate: percent(count_i64(paid), count_i64(invoices.len())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ArticleStats {
    pub total: usize,
    pub by_status: BTreeMap<&'static str, usize>,
    pub total_views: i64,
    pub helpful_rate: i64,
    pub needs_attention: usize,
    pub top_tag: Option<String>,
}

impl Summarize for Article {
    type Stats = ArticleStats;

    fn summarize(records: &[Self]) -> ArticleStats {
        let articles = live(records);
        let helpful = articles
            .iter()
            .map(|article| article.helpful_count)
            .fold(0_i64, i64::saturating_add);
        let not_helpful = articles
            .iter()
            .map(|article| article.not_helpful_count)
            .fold(0_i64, i64::saturating_add);
        ArticleStats {
            total: articles.len(),
            by_status: status_counts(&articles),
            total_views: articles
                .iter()
                .map(|article| article.views)
                .fold(0_i64, i64::saturating_add),
            helpful_rate: helpful_rate(helpful, not_helpful),
            needs_attention: articles
                .iter()
                .filter(|article| needs_attention(article))
                .count(),
            top_tag: top_tag(&articles),
        }
    }
}

/// Published, voted on, and mostly voted down.
pub fn needs_attention(article: &Article) -> bool {
    article.status == ArticleStatus::Published
        && article.not_helpful_count > 0
        && helpful_rate(article.helpful_count, article.not_helpful_count) < 50
}

// Tags count case-insensitively but report the first spelling seen.
fn top_tag(articles: &[&Article]) -> Option<String> {
    let mut seen: Vec<(String, &str, usize)> = Vec::new();
    for tag in articles.iter().flat_map(|article| article.tags.iter()) {
        let key = tag.to_lowercase();
        match seen.iter_mut().find(|(existing, _, _)| *existing == key) {
            Some((_, _, count)) => *count += 1,
            None => seen.push((key, tag.as_str(), 1)),
        }
    }
    // max_by_key keeps the last maximum; scan in reverse so the first seen wins.
    seen.into_iter()
        .rev()
        .max_by_key(|(_, _, count)| *count)
        .map(|(_, spelling, _)| spelling.to_owned())
}

/// Drafts nobody touched for a month, or published pages nobody reads.
pub fn needs_cleanup(article: &Article, now: OffsetDateTime) -> bool {
    match article.status {
        ArticleStatus::Draft => now - article.updated_at > Duration::days(STALE_DRAFT_DAYS),
        ArticleStatus::Published => article.views < LOW_TRAFFIC_VIEWS,
        _ => false,
    }
}

pub fn cleanup_candidates(articles: &[Article], now: OffsetDateTime) -> Vec<&Article> {
    articles
        .iter()
        .filter(|article| article.deleted_at.is_none() && needs_cleanup(article, now))
        .collect()
}

pub fn popular_articles(articles: &[Article]) -> Vec<&Article> {
    let mut published: Vec<&Article> = articles
        .iter()
        .filter(|article| {
            article.deleted_at.is_none() && article.status == ArticleStatus::Published
        })
        .collect();
    published.sort_by(|left, right| right.views.cmp(&left.views));
    published.truncate(HIGHLIGHT_LIMIT);
    published
}

pub fn recent_articles(articles: &[Article]) -> Vec<&Article> {
    let mut recent = live(articles);
    recent.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
    recent.truncate(HIGHLIGHT_LIMIT);
    recent
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SkillStats {
    pub total: usize,
    pub by_level: BTreeMap<&'static str, usize>,
    pub total_endorsements: i64,
    pub top_skills: usize,
    pub categories: Vec<String>,
}

impl Summarize for Skill {
    type Stats = SkillStats;

    fn summarize(records: &[Self]) -> SkillStats {
        let skills = live(records);
        SkillStats {
            total: skills.len(),
            by_level: status_counts(&skills),
            total_endorsements: skills
                .iter()
                .map(|skill| skill.endorsements)
                .fold(0_i64, i64::saturating_add),
            top_skills: skills.iter().filter(|skill| is_top_skill(skill)).count(),
            categories: skill_categories(&skills),
        }
    }
}

pub fn is_top_skill(skill: &Skill) -> bool {
    skill.endorsements > TOP_SKILL_ENDORSEMENTS
}

fn skill_categories(skills: &[&Skill]) -> Vec<String> {
    let mut categories = vec!["all".to_owned()];
    for skill in skills {
        if !categories.iter().any(|known| *known == skill.category) {
            categories.push(skill.category.clone());
        }
    }
    categories
}

/// Level counts keyed by the enum rather than its spelling.
pub fn level_count(stats: &SkillStats, level: SkillLevel) -> usize {
    stats.by_level.get(level.as_str()).copied().unwrap_or(0)
}

fn count_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::{
        FilteredSummary, Summarize, cleanup_candidates, derive_view, helpful_rate, percent,
        popular_articles, recent_articles,
    };
    use crate::model::{Article, ArticleStatus, Invoice, InvoiceStatus, Skill, SkillLevel};
    use crate::view::{StatusFilter, ViewParams};
    use crate::{ArticleId, InvoiceId, SkillId};
    use time::macros::datetime;
    use time::{Duration, OffsetDateTime};

    fn invoice(id: i64, amount: i64, status: InvoiceStatus) -> Invoice {
        Invoice {
            id: InvoiceId::new(id),
            invoice_number: format!("INV-{id}"),
            title: format!("Retainer {id}"),
            client_name: "Acme".to_owned(),
            client_email: "billing@acme.test".to_owned(),
            status,
            amount_cents: amount,
            currency: "USD".to_owned(),
            issue_date: None,
            due_date: None,
            notes: String::new(),
            reminder_count: 0,
            last_reminder_at: None,
            created_at: datetime!(2026-01-01 0:00 UTC),
            updated_at: datetime!(2026-01-01 0:00 UTC),
            deleted_at: None,
        }
    }

    fn article(id: i64, status: ArticleStatus, views: i64, votes: (i64, i64)) -> Article {
        Article {
            id: ArticleId::new(id),
            title: format!("Article {id}"),
            excerpt: String::new(),
            tags: Vec::new(),
            category: "Guides".to_owned(),
            author: "Jo".to_owned(),
            status,
            views,
            helpful_count: votes.0,
            not_helpful_count: votes.1,
            read_time_minutes: 4,
            created_at: datetime!(2026-01-01 0:00 UTC),
            updated_at: datetime!(2026-01-01 0:00 UTC) + Duration::days(id),
            deleted_at: None,
        }
    }

    #[test]
    fn percent_guards_zero_denominator() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(helpful_rate(0, 0), 0);
        assert_eq!(percent(5, 0), 0);
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(2, 5), 40);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(helpful_rate(45, 5), 90);
    }

    #[test]
    fn filtered_rows_and_whole_collection_stats_are_separate() {
        let invoices = vec![
            invoice(1, 100, InvoiceStatus::Paid),
            invoice(2, 50, InvoiceStatus::Paid),
            invoice(3, 200, InvoiceStatus::Overdue),
            invoice(4, 75, InvoiceStatus::Draft),
            invoice(5, 300, InvoiceStatus::Sent),
        ];
        let params = ViewParams {
            status: StatusFilter::Only(InvoiceStatus::Paid),
            ..ViewParams::default()
        };
        let view = derive_view(&invoices, &params);
        assert_eq!(
            view.filtered,
            FilteredSummary {
                count: 2,
                measure_sum: 150
            }
        );
        assert_eq!(view.stats.total, 5);
        assert_eq!(view.stats.collection_rate, 40);
        assert_eq!(view.stats.paid_cents, 150);
        assert_eq!(view.stats.pending_cents, 300);
        assert_eq!(view.stats.overdue_cents, 200);
        assert_eq!(view.stats.by_status.get("paid"), Some(&2));
        assert_eq!(view.stats.by_status.get("cancelled"), Some(&0));
    }

    #[test]
    fn deleted_invoices_do_not_count() {
        let mut gone = invoice(2, 900, InvoiceStatus::Paid);
        gone.deleted_at = Some(datetime!(2026-01-02 0:00 UTC));
        let stats = Invoice::summarize(&[invoice(1, 100, InvoiceStatus::Draft), gone]);
        assert_eq!(stats.total, 1);
        assert_eq!(stats.paid_cents, 0);
        assert_eq!(stats.collection_rate, 0);
    }

    #[test]
    fn deleted_rows_show_in_view_but_not_in_stats() {
        let mut gone = invoice(2, 900, InvoiceStatus::Paid);
        gone.deleted_at = Some(datetime!(2026-01-02 0:00 UTC));
        let records = vec![invoice(1, 100, InvoiceStatus::Paid), gone];
        let view = derive_view(&records, &ViewParams::default());

        let ids: Vec<i64> = view.rows.iter().map(|row| row.id.get()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(view.filtered.count, 2);
        assert_eq!(view.filtered.measure_sum, 1_000);
        assert_eq!(view.stats.total, 1);
        assert_eq!(view.stats.paid_cents, 100);
        assert_eq!(view.stats.by_status.get("paid"), Some(&1));
    }

    #[test]
    fn empty_collections_summarize_to_zero() {
        let stats = Invoice::summarize(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.collection_rate, 0);

        let stats = Article::summarize(&[]);
        assert_eq!(stats.helpful_rate, 0);
        assert_eq!(stats.top_tag, None);

        let stats = Skill::summarize(&[]);
        assert_eq!(stats.categories, vec!["all".to_owned()]);
    }

    #[test]
    fn article_without_votes_has_zero_helpfulness() {
        let stats = Article::summarize(&[article(1, ArticleStatus::Published, 10, (0, 0))]);
        assert_eq!(stats.helpful_rate, 0);
        assert_eq!(stats.needs_attention, 0);
    }

    #[test]
    fn article_stats_aggregate_votes_and_flag_poor_pages() {
        let articles = vec![
            article(1, ArticleStatus::Published, 400, (30, 10)),
            article(2, ArticleStatus::Published, 50, (1, 9)),
            article(3, ArticleStatus::Draft, 0, (0, 0)),
        ];
        let stats = Article::summarize(&articles);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.total_views, 450);
        assert_eq!(stats.helpful_rate, 62);
        assert_eq!(stats.needs_attention, 1);
        assert_eq!(stats.by_status.get("published"), Some(&2));
    }

    #[test]
    fn top_tag_prefers_first_seen_on_ties() {
        let mut first = article(1, ArticleStatus::Published, 0, (0, 0));
        first.tags = vec!["setup".to_owned(), "API".to_owned()];
        let mut second = article(2, ArticleStatus::Published, 0, (0, 0));
        second.tags = vec!["api".to_owned(), "Setup".to_owned()];
        let stats = Article::summarize(&[first, second]);
        assert_eq!(stats.top_tag.as_deref(), Some("setup"));
    }

    #[test]
    fn top_tag_keeps_the_first_spelling() {
        let mut first = article(1, ArticleStatus::Published, 0, (0, 0));
        first.tags = vec!["GraphQL".to_owned()];
        let mut second = article(2, ArticleStatus::Published, 0, (0, 0));
        second.tags = vec!["graphql".to_owned(), "Billing".to_owned()];
        let stats = Article::summarize(&[first, second]);
        assert_eq!(stats.top_tag.as_deref(), Some("GraphQL"));
    }

    #[test]
    fn cleanup_flags_stale_drafts_and_unread_published_pages() {
        let now: OffsetDateTime = datetime!(2026-03-15 0:00 UTC);
        let mut fresh_draft = article(1, ArticleStatus::Draft, 0, (0, 0));
        fresh_draft.updated_at = now - Duration::days(3);
        let mut stale_draft = article(2, ArticleStatus::Draft, 0, (0, 0));
        stale_draft.updated_at = now - Duration::days(45);
        let unread = article(3, ArticleStatus::Published, 20, (0, 0));
        let popular = article(4, ArticleStatus::Published, 5_000, (0, 0));
        let archived = article(5, ArticleStatus::Archived, 0, (0, 0));

        let articles = vec![fresh_draft, stale_draft, unread, popular, archived];
        let flagged: Vec<i64> = cleanup_candidates(&articles, now)
            .iter()
            .map(|article| article.id.get())
            .collect();
        assert_eq!(flagged, vec![2, 3]);
    }

    #[test]
    fn popular_and_recent_are_capped_at_five() {
        let articles: Vec<Article> = (1..=7)
            .map(|id| article(id, ArticleStatus::Published, id * 10, (0, 0)))
            .collect();
        let popular: Vec<i64> = popular_articles(&articles)
            .iter()
            .map(|article| article.views)
            .collect();
        assert_eq!(popular, vec![70, 60, 50, 40, 30]);

        let recent: Vec<i64> = recent_articles(&articles)
            .iter()
            .map(|article| article.id.get())
            .collect();
        assert_eq!(recent, vec![7, 6, 5, 4, 3]);
    }

    #[test]
    fn skill_stats_list_categories_and_top_skills() {
        let skill = |id: i64, category: &str, level: SkillLevel, endorsements: i64| Skill {
            id: SkillId::new(id),
            name: format!("Skill {id}"),
            category: category.to_owned(),
            level,
            years_of_experience: 3,
            endorsements,
            created_at: datetime!(2026-01-01 0:00 UTC),
            updated_at: datetime!(2026-01-01 0:00 UTC),
            deleted_at: None,
        };
        let skills = vec![
            skill(1, "Engineering", SkillLevel::Expert, 42),
            skill(2, "Design", SkillLevel::Intermediate, 7),
            skill(3, "Engineering", SkillLevel::Advanced, 21),
        ];
        let stats = Skill::summarize(&skills);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.total_endorsements, 70);
        assert_eq!(stats.top_skills, 2);
        assert_eq!(
            stats.categories,
            vec!["all".to_owned(), "Engineering".to_owned(), "Design".to_owned()]
        );
        assert_eq!(super::level_count(&stats, SkillLevel::Expert), 1);
        assert_eq!(super::level_count(&stats, SkillLevel::Beginner), 0);
    }
}
