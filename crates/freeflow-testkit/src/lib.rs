// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use freeflow_app::{
    ArticleFormInput, ArticleStatus, Discount, InvoiceFormInput, InvoiceStatus, LineItem,
    SkillFormInput, SkillLevel, StatusKind,
};
use std::path::PathBuf;
use time::{Date, Duration, macros::date};

const REFERENCE_DATE: Date = date!(2026 - 01 - 01);

const CLIENT_PREFIXES: [&str; 12] = [
    "Northwind",
    "Bluebird",
    "Harbor",
    "Copperline",
    "Juniper",
    "Summit",
    "Lantern",
    "Redwood",
    "Atlas",
    "Meridian",
    "Foxglove",
    "Ironbark",
];
const CLIENT_SUFFIXES: [&str; 6] = ["Studio", "Labs", "Co", "Partners", "Collective", "Media"];

const FIRST_NAMES: [&str; 12] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Rowan",
];

const INVOICE_WORK: [&str; 10] = [
    "Website redesign",
    "Brand refresh",
    "Monthly retainer",
    "Landing page build",
    "Copywriting sprint",
    "SEO audit",
    "Newsletter setup",
    "Analytics review",
    "Logo package",
    "Hosting migration",
];

const LINE_ITEM_WORK: [&str; 8] = [
    "Discovery session",
    "Design hours",
    "Development hours",
    "Revisions",
    "Project management",
    "Stock assets",
    "QA pass",
    "Launch support",
];

const ARTICLE_CATEGORIES: [&str; 5] = ["Billing", "Onboarding", "Projects", "Account", "Tools"];
const ARTICLE_TOPICS: [&str; 10] = [
    "Sending your first invoice",
    "Setting payment terms",
    "Tracking overdue payments",
    "Onboarding a new client",
    "Scoping a fixed-price project",
    "Writing a change request",
    "Exporting your records",
    "Choosing a currency",
    "Handling partial payments",
    "Closing out a project",
];
const ARTICLE_TAGS: [&str; 10] = [
    "invoices", "clients", "payments", "setup", "faq", "tax", "contracts", "export", "email",
    "reports",
];

const SKILL_CATALOG: [(&str, &str); 14] = [
    ("Rust", "Programming"),
    ("TypeScript", "Programming"),
    ("SQL", "Programming"),
    ("Figma", "Design"),
    ("Typography", "Design"),
    ("Illustration", "Design"),
    ("Copywriting", "Writing"),
    ("Technical writing", "Writing"),
    ("SEO", "Marketing"),
    ("Email campaigns", "Marketing"),
    ("Client discovery", "Consulting"),
    ("Workshop facilitation", "Consulting"),
    ("Video editing", "Media"),
    ("Photography", "Media"),
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Counts to apply to an article after it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Engagement {
    pub views: i64,
    pub helpful: i64,
    pub not_helpful: i64,
}

/// Seeded generator for realistic freelance records. The same seed always
/// produces the same sequence.
#[derive(Debug, Clone)]
pub struct Faker {
    rng: DeterministicRng,
    seed: u64,
}

impl Faker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            seed: normalized,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn client_name(&mut self) -> String {
        format!(
            "{} {}",
            self.pick(&CLIENT_PREFIXES),
            self.pick(&CLIENT_SUFFIXES)
        )
    }

    /// Leaves the invoice number blank so the store assigns one.
    pub fn invoice(&mut self) -> InvoiceFormInput {
        let client_name = self.client_name();
        let contact = self.pick(&FIRST_NAMES).to_lowercase();
        let domain: String = client_name
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_lowercase();
        let status = self.pick_status(InvoiceStatus::ALL);
        let issue_date = self.date_around(REFERENCE_DATE, 90);
        let due_date = issue_date + Duration::days(self.int_range_i64(7, 45));

        let line_count = self.int_range_i64(1, 4);
        let line_items = (0..line_count).map(|_| self.line_item()).collect();
        let discount = match self.int_n(4) {
            0 => Discount::Percent {
                basis_points: self.int_range_i64(1, 4) * 500,
            },
            1 => Discount::Fixed {
                cents: self.int_range_i64(10, 200) * 100,
            },
            _ => Discount::None,
        };

        InvoiceFormInput {
            invoice_number: String::new(),
            title: self.pick(&INVOICE_WORK).to_owned(),
            client_email: format!("{contact}@{domain}.example"),
            client_name,
            status,
            currency: "USD".to_owned(),
            issue_date: Some(issue_date),
            due_date: Some(due_date),
            line_items,
            discount,
            notes: String::new(),
        }
    }

    pub fn line_item(&mut self) -> LineItem {
        LineItem {
            description: self.pick(&LINE_ITEM_WORK).to_owned(),
            quantity: self.int_range_i64(1, 20),
            rate_cents: self.int_range_i64(40, 180) * 500,
            tax_basis_points: if self.int_n(3) == 0 { 825 } else { 0 },
        }
    }

    pub fn article(&mut self) -> ArticleFormInput {
        let tag_count = self.int_n(3) + 1;
        let mut tags: Vec<String> = Vec::with_capacity(tag_count);
        for _ in 0..tag_count {
            let tag = self.pick(&ARTICLE_TAGS).to_owned();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        let title = self.pick(&ARTICLE_TOPICS).to_owned();
        ArticleFormInput {
            excerpt: format!("A short guide to {}.", title.to_lowercase()),
            title,
            tags,
            category: self.pick(&ARTICLE_CATEGORIES).to_owned(),
            author: self.pick(&FIRST_NAMES).to_owned(),
            status: self.pick_status(ArticleStatus::ALL),
            read_time_minutes: self.int_range_i64(2, 15) as i32,
        }
    }

    /// Views and votes for a seeded article. Votes never exceed views.
    pub fn engagement(&mut self) -> Engagement {
        let views = self.int_range_i64(0, 2_500);
        let votes = self.int_range_i64(0, (views / 10).min(120));
        let helpful = self.int_range_i64(0, votes);
        Engagement {
            views,
            helpful,
            not_helpful: votes - helpful,
        }
    }

    pub fn skill(&mut self) -> SkillFormInput {
        let (name, category) = SKILL_CATALOG[self.int_n(SKILL_CATALOG.len())];
        SkillFormInput {
            name: name.to_owned(),
            category: category.to_owned(),
            level: self.pick_status(SkillLevel::ALL),
            years_of_experience: self.int_range_i64(0, 15) as i32,
            endorsements: self.int_range_i64(0, 40),
        }
    }

    pub fn date_around(&mut self, center: Date, spread_days: i64) -> Date {
        center + Duration::days(self.int_range_i64(-spread_days, spread_days))
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn pick_status<S: Copy>(&mut self, all: &[S]) -> S {
        all[self.rng.int_n(all.len())]
    }

    fn int_range_i64(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = max - min + 1;
        min + (self.rng.next_u64() % (span as u64)) as i64
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("freeflow.db");
    Ok((dir, db_path))
}

pub fn skill_catalog() -> &'static [(&'static str, &'static str)] {
    &SKILL_CATALOG
}

pub fn article_categories() -> &'static [&'static str] {
    &ARTICLE_CATEGORIES
}
