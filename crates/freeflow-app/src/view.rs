// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Filtering and sorting of in-memory record collections.
//!
//! Every function here is pure: inputs are borrowed, never mutated, and the
//! same collection plus the same [`ViewParams`] always yields the same rows.
//! Missing fields never raise. They fail bound checks and sort last.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};

use crate::model::{Article, Invoice, Skill, StatusKind};

const SECONDS_PER_DAY: i64 = 86_400;

/// How a record's party field is compared against the user's filter text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyMatch {
    Contains,
    Exact,
}

/// The designated fields one record kind exposes to the pipeline.
pub trait Record {
    type Status: StatusKind;

    /// Client for invoices, category for articles and skills.
    const PARTY_MATCH: PartyMatch;

    fn record_id(&self) -> i64;
    fn status(&self) -> Self::Status;
    fn title(&self) -> &str;
    fn description(&self) -> &str;
    fn tags(&self) -> &[String];
    fn party(&self) -> &str;
    fn measure(&self) -> Option<i64>;
    fn sort_date(&self) -> Option<OffsetDateTime>;
    fn sort_name(&self) -> &str;
    fn is_deleted(&self) -> bool;

    fn party_filter(value: impl Into<String>) -> PartyFilter {
        let value = value.into();
        if value.trim().is_empty() {
            return PartyFilter::Any;
        }
        match Self::PARTY_MATCH {
            PartyMatch::Contains => PartyFilter::Contains(value),
            PartyMatch::Exact => PartyFilter::Exact(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter<S> {
    #[default]
    All,
    Only(S),
}

impl<S: StatusKind> StatusFilter<S> {
    /// `"all"` or an empty string clears the filter.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        S::parse(&raw.to_ascii_lowercase()).map(Self::Only)
    }

    pub fn admits(self, status: S) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == status,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Only(status) => status.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PartyFilter {
    #[default]
    Any,
    Contains(String),
    Exact(String),
}

impl PartyFilter {
    fn admits(&self, party: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Contains(needle) => party.to_lowercase().contains(&needle.to_lowercase()),
            Self::Exact(wanted) => party.to_lowercase() == wanted.to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Date,
    Amount,
    Name,
    Status,
}

impl SortKey {
    pub const ALL: [Self; 4] = [Self::Date, Self::Amount, Self::Name, Self::Status];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Amount => "amount",
            Self::Name => "name",
            Self::Status => "status",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "date" => Some(Self::Date),
            "amount" => Some(Self::Amount),
            "name" | "client" => Some(Self::Name),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

/// User-controlled inputs for one view session. The default filters nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewParams<S> {
    pub query: String,
    pub status: StatusFilter<S>,
    pub min_measure: Option<i64>,
    pub max_measure: Option<i64>,
    pub party: PartyFilter,
    pub date_from: Option<Date>,
    pub date_to: Option<Date>,
    pub sort: SortKey,
}

impl<S> Default for ViewParams<S> {
    fn default() -> Self {
        Self {
            query: String::new(),
            status: StatusFilter::All,
            min_measure: None,
            max_measure: None,
            party: PartyFilter::Any,
            date_from: None,
            date_to: None,
            sort: SortKey::Date,
        }
    }
}

impl<S> ViewParams<S> {
    /// Restrict to the last `days` days ending at `today`, inclusive.
    ///
    /// A window reaching past the calendar's first day leaves the lower bound
    /// open.
    pub fn within_days(mut self, today: Date, days: i64) -> Self {
        self.date_from = days
            .max(0)
            .checked_mul(SECONDS_PER_DAY)
            .map(Duration::seconds)
            .and_then(|span| today.checked_sub(span));
        self.date_to = Some(today);
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        self.query.trim().is_empty()
            && matches!(self.status, StatusFilter::All)
            && self.min_measure.is_none()
            && self.max_measure.is_none()
            && self.party == PartyFilter::Any
            && self.date_from.is_none()
            && self.date_to.is_none()
    }
}

/// Records that satisfy every active filter, in collection order.
pub fn filter<'a, R: Record>(records: &'a [R], params: &ViewParams<R::Status>) -> Vec<&'a R> {
    let needle = params.query.trim().to_lowercase();
    records
        .iter()
        .filter(|record| matches_query(*record, &needle))
        .filter(|record| params.status.admits(record.status()))
        .filter(|record| within_measure(*record, params.min_measure, params.max_measure))
        .filter(|record| params.party.admits(record.party()))
        .filter(|record| within_dates(*record, params.date_from, params.date_to))
        .collect()
}

/// Stable sort; equal keys keep their incoming order.
pub fn sort<R: Record>(rows: &mut [&R], key: SortKey) {
    rows.sort_by(|left, right| compare(*left, *right, key));
}

/// Filter first, then sort.
pub fn project<'a, R: Record>(records: &'a [R], params: &ViewParams<R::Status>) -> Vec<&'a R> {
    let mut rows = filter(records, params);
    sort(&mut rows, params.sort);
    rows
}

pub fn compare<R: Record>(left: &R, right: &R, key: SortKey) -> Ordering {
    match key {
        SortKey::Date => descending_missing_last(left.sort_date(), right.sort_date()),
        SortKey::Amount => descending_missing_last(left.measure(), right.measure()),
        SortKey::Name => collate(left.sort_name(), right.sort_name()),
        SortKey::Status => left.status().as_str().cmp(right.status().as_str()),
    }
}

fn matches_query<R: Record>(record: &R, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    record.title().to_lowercase().contains(needle)
        || record.description().to_lowercase().contains(needle)
        || record
            .tags()
            .iter()
            .any(|tag| tag.to_lowercase().contains(needle))
}

fn within_measure<R: Record>(record: &R, min: Option<i64>, max: Option<i64>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = record.measure() else {
        return false;
    };
    min.is_none_or(|min| min <= value) && max.is_none_or(|max| value <= max)
}

fn within_dates<R: Record>(record: &R, from: Option<Date>, to: Option<Date>) -> bool {
    if from.is_none() && to.is_none() {
        return true;
    }
    let Some(date) = record.sort_date().map(|value| value.date()) else {
        return false;
    };
    from.is_none_or(|from| from <= date) && to.is_none_or(|to| date <= to)
}

fn descending_missing_last<T: Ord>(left: Option<T>, right: Option<T>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => right.cmp(&left),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// Case-folded first so "acme" and "Acme" land together; raw text breaks ties.
fn collate(left: &str, right: &str) -> Ordering {
    left.to_lowercase()
        .cmp(&right.to_lowercase())
        .then_with(|| left.cmp(right))
}

impl Record for Invoice {
    type Status = crate::model::InvoiceStatus;

    const PARTY_MATCH: PartyMatch = PartyMatch::Contains;

    fn record_id(&self) -> i64 {
        self.id.get()
    }

    fn status(&self) -> Self::Status {
        self.status
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn description(&self) -> &str {
        &self.invoice_number
    }

    fn tags(&self) -> &[String] {
        std::slice::from_ref(&self.client_name)
    }

    fn party(&self) -> &str {
        &self.client_name
    }

    fn measure(&self) -> Option<i64> {
        Some(self.amount_cents)
    }

    // Issue date, or creation time for undated drafts.
    fn sort_date(&self) -> Option<OffsetDateTime> {
        Some(
            self.issue_date
                .map_or(self.created_at, |date| date.midnight().assume_utc()),
        )
    }

    fn sort_name(&self) -> &str {
        &self.client_name
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Record for Article {
    type Status = crate::model::ArticleStatus;

    const PARTY_MATCH: PartyMatch = PartyMatch::Exact;

    fn record_id(&self) -> i64 {
        self.id.get()
    }

    fn status(&self) -> Self::Status {
        self.status
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn description(&self) -> &str {
        &self.excerpt
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn party(&self) -> &str {
        &self.category
    }

    fn measure(&self) -> Option<i64> {
        Some(self.views)
    }

    fn sort_date(&self) -> Option<OffsetDateTime> {
        Some(self.updated_at)
    }

    fn sort_name(&self) -> &str {
        &self.title
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Record for Skill {
    type Status = crate::model::SkillLevel;

    const PARTY_MATCH: PartyMatch = PartyMatch::Exact;

    fn record_id(&self) -> i64 {
        self.id.get()
    }

    fn status(&self) -> Self::Status {
        self.level
    }

    fn title(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.category
    }

    fn tags(&self) -> &[String] {
        &[]
    }

    fn party(&self) -> &str {
        &self.category
    }

    fn measure(&self) -> Option<i64> {
        Some(self.endorsements)
    }

    fn sort_date(&self) -> Option<OffsetDateTime> {
        Some(self.updated_at)
    }

    fn sort_name(&self) -> &str {
        &self.name
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
