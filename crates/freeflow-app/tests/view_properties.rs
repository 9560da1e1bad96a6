// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use freeflow_app::{
    Article, ArticleId, ArticleStatus, Invoice, InvoiceId, InvoiceStatus, Record, SortKey,
    StatusFilter, StatusKind, Summarize, ViewParams, derive_view, filter, helpful_rate, percent,
    project,
};
use proptest::prelude::*;
use time::{Date, Duration, OffsetDateTime, macros::datetime};

const CLIENTS: [&str; 4] = ["Acme Corp", "acme labs", "Globex", "Initech"];
const WORDS: [&str; 5] = ["Website", "retainer", "AUDIT", "Logo refresh", "hosting"];

fn base() -> OffsetDateTime {
    datetime!(2026-03-01 09:00 UTC)
}

fn arb_invoice_status() -> impl Strategy<Value = InvoiceStatus> {
    prop::sample::select(InvoiceStatus::ALL.to_vec())
}

fn arb_invoice() -> impl Strategy<Value = Invoice> {
    (
        1_i64..10_000,
        prop::sample::select(WORDS.to_vec()),
        prop::sample::select(CLIENTS.to_vec()),
        arb_invoice_status(),
        0_i64..500_000,
        prop::option::of(-60_i64..60),
        any::<bool>(),
    )
        .prop_map(|(id, title, client, status, amount, due_offset, deleted)| {
            let due_date: Option<Date> =
                due_offset.map(|days| (base() + Duration::days(days)).date());
            Invoice {
                id: InvoiceId::new(id),
                invoice_number: format!("INV-{id}"),
                title: title.to_owned(),
                client_name: client.to_owned(),
                client_email: String::new(),
                status,
                amount_cents: amount,
                currency: "USD".to_owned(),
                issue_date: None,
                due_date,
                notes: String::new(),
                reminder_count: 0,
                last_reminder_at: None,
                created_at: base(),
                updated_at: base(),
                deleted_at: deleted.then(base),
            }
        })
}

fn arb_article() -> impl Strategy<Value = Article> {
    (
        1_i64..10_000,
        prop::sample::select(WORDS.to_vec()),
        prop::collection::vec(prop::sample::select(WORDS.to_vec()), 0..3),
        prop::sample::select(ArticleStatus::ALL.to_vec()),
        0_i64..5_000,
        0_i64..50,
        0_i64..50,
    )
        .prop_map(|(id, title, tags, status, views, helpful, not_helpful)| Article {
            id: ArticleId::new(id),
            title: title.to_owned(),
            excerpt: String::new(),
            tags: tags.into_iter().map(str::to_owned).collect(),
            category: "Guides".to_owned(),
            author: "Sam".to_owned(),
            status,
            views,
            helpful_count: helpful,
            not_helpful_count: not_helpful,
            read_time_minutes: 3,
            created_at: base(),
            updated_at: base() + Duration::hours(id),
            deleted_at: None,
        })
}

fn arb_params() -> impl Strategy<Value = ViewParams<InvoiceStatus>> {
    (
        prop::option::of(prop::sample::select(vec!["web", "ACME", "audit", "zzz"])),
        prop::option::of(arb_invoice_status()),
        prop::option::of(0_i64..250_000),
        prop::option::of(250_000_i64..500_000),
        prop::option::of(prop::sample::select(vec!["acme", "glob"])),
        prop::sample::select(SortKey::ALL.to_vec()),
    )
        .prop_map(|(query, status, min, max, party, sort)| ViewParams {
            query: query.unwrap_or_default().to_owned(),
            status: status.map_or(StatusFilter::All, StatusFilter::Only),
            min_measure: min,
            max_measure: max,
            party: Invoice::party_filter(party.unwrap_or_default()),
            sort,
            ..ViewParams::default()
        })
}

fn is_subsequence(rows: &[&Invoice], records: &[Invoice]) -> bool {
    let mut remaining = records.iter();
    rows.iter()
        .all(|row| remaining.any(|record| std::ptr::eq(record, *row)))
}

proptest! {
    #[test]
    fn filter_returns_subsequence_of_input(
        records in prop::collection::vec(arb_invoice(), 0..30),
        params in arb_params(),
    ) {
        let rows = filter(&records, &params);
        prop_assert!(rows.len() <= records.len());
        prop_assert!(is_subsequence(&rows, &records), "filter must keep collection order");
    }

    #[test]
    fn projection_is_idempotent(
        records in prop::collection::vec(arb_invoice(), 0..30),
        params in arb_params(),
    ) {
        let once: Vec<Invoice> = project(&records, &params).into_iter().cloned().collect();
        let twice: Vec<Invoice> = project(&once, &params).into_iter().cloned().collect();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn status_filter_is_exact(
        records in prop::collection::vec(arb_invoice(), 0..30),
        wanted in arb_invoice_status(),
    ) {
        let params = ViewParams {
            status: StatusFilter::Only(wanted),
            ..ViewParams::default()
        };
        let rows = filter(&records, &params);
        prop_assert!(rows.iter().all(|row| row.status == wanted));
        let expected = records.iter().filter(|record| record.status == wanted).count();
        prop_assert_eq!(rows.len(), expected);
    }

    #[test]
    fn query_ignores_case(
        records in prop::collection::vec(arb_invoice(), 0..30),
        query in prop::sample::select(vec!["website", "acme", "inv-1", "audit"]),
    ) {
        let lower = ViewParams::<InvoiceStatus> {
            query: query.to_owned(),
            ..ViewParams::default()
        };
        let upper = ViewParams::<InvoiceStatus> {
            query: query.to_uppercase(),
            ..ViewParams::default()
        };
        prop_assert_eq!(filter(&records, &lower), filter(&records, &upper));
    }

    #[test]
    fn measure_bounds_hold_for_every_row(
        records in prop::collection::vec(arb_invoice(), 0..30),
        params in arb_params(),
    ) {
        for row in filter(&records, &params) {
            let amount = row.measure().unwrap_or_default();
            prop_assert!(params.min_measure.is_none_or(|min| min <= amount));
            prop_assert!(params.max_measure.is_none_or(|max| amount <= max));
        }
    }

    #[test]
    fn stats_ignore_active_filters(
        records in prop::collection::vec(arb_invoice(), 0..30),
        params in arb_params(),
    ) {
        let view = derive_view(&records, &params);
        prop_assert_eq!(view.stats, Invoice::summarize(&records));
        prop_assert_eq!(view.filtered.count, view.rows.len());
    }

    #[test]
    fn invoice_stats_count_only_live_records(
        records in prop::collection::vec(arb_invoice(), 0..30),
    ) {
        let stats = Invoice::summarize(&records);
        let live = records.iter().filter(|record| record.deleted_at.is_none()).count();
        prop_assert_eq!(stats.total, live);
        prop_assert_eq!(stats.by_status.values().sum::<usize>(), live);
        prop_assert!((0..=100).contains(&stats.collection_rate));
    }

    #[test]
    fn article_helpful_rate_stays_in_range(
        records in prop::collection::vec(arb_article(), 0..20),
    ) {
        let stats = Article::summarize(&records);
        prop_assert!((0..=100).contains(&stats.helpful_rate));
        prop_assert_eq!(stats.total, records.len());
    }

    #[test]
    fn percent_is_zero_without_denominator(part in any::<i64>()) {
        prop_assert_eq!(percent(part, 0), 0);
        prop_assert_eq!(helpful_rate(0, 0), 0);
    }

    #[test]
    fn percent_of_whole_is_hundred(whole in 1_i64..1_000_000) {
        prop_assert_eq!(percent(whole, whole), 100);
        prop_assert_eq!(percent(0, whole), 0);
    }
}
