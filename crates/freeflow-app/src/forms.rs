// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::Serialize;
use time::Date;

use crate::{
    Article, ArticleStatus, Invoice, InvoiceStatus, PageKind, Skill, SkillLevel,
};

const BASIS_POINTS_PER_WHOLE: i64 = 10_000;
pub const MAX_YEARS_OF_EXPERIENCE: i32 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Invoice,
    Article,
    Skill,
}

impl FormKind {
    pub const fn page(self) -> PageKind {
        match self {
            Self::Invoice => PageKind::Invoices,
            Self::Article => PageKind::Articles,
            Self::Skill => PageKind::Skills,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub description: String,
    pub quantity: i64,
    pub rate_cents: i64,
    /// 825 is 8.25%.
    pub tax_basis_points: i64,
}

impl LineItem {
    fn gross_cents(&self) -> i128 {
        i128::from(self.quantity) * i128::from(self.rate_cents)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Discount {
    #[default]
    None,
    Percent {
        basis_points: i64,
    },
    Fixed {
        cents: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct InvoiceTotals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceFormInput {
    /// Left blank to have one generated at submit time.
    pub invoice_number: String,
    pub title: String,
    pub client_name: String,
    pub client_email: String,
    pub status: InvoiceStatus,
    pub currency: String,
    pub issue_date: Option<Date>,
    pub due_date: Option<Date>,
    pub line_items: Vec<LineItem>,
    pub discount: Discount,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleFormInput {
    pub title: String,
    pub excerpt: String,
    pub tags: Vec<String>,
    pub category: String,
    pub author: String,
    pub status: ArticleStatus,
    pub read_time_minutes: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillFormInput {
    pub name: String,
    pub category: String,
    pub level: SkillLevel,
    pub years_of_experience: i32,
    pub endorsements: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPayload {
    Invoice(InvoiceFormInput),
    Article(ArticleFormInput),
    Skill(SkillFormInput),
}

impl FormPayload {
    pub fn kind(&self) -> FormKind {
        match self {
            Self::Invoice(_) => FormKind::Invoice,
            Self::Article(_) => FormKind::Article,
            Self::Skill(_) => FormKind::Skill,
        }
    }

    pub fn blank_for(kind: FormKind) -> Self {
        match kind {
            FormKind::Invoice => Self::Invoice(InvoiceFormInput {
                invoice_number: String::new(),
                title: String::new(),
                client_name: String::new(),
                client_email: String::new(),
                status: InvoiceStatus::Draft,
                currency: "USD".to_owned(),
                issue_date: None,
                due_date: None,
                line_items: Vec::new(),
                discount: Discount::None,
                notes: String::new(),
            }),
            FormKind::Article => Self::Article(ArticleFormInput {
                title: String::new(),
                excerpt: String::new(),
                tags: Vec::new(),
                category: String::new(),
                author: String::new(),
                status: ArticleStatus::Draft,
                read_time_minutes: 0,
            }),
            FormKind::Skill => Self::Skill(SkillFormInput {
                name: String::new(),
                category: String::new(),
                level: SkillLevel::Beginner,
                years_of_experience: 0,
                endorsements: 0,
            }),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Invoice(invoice) => invoice.validate(),
            Self::Article(article) => article.validate(),
            Self::Skill(skill) => skill.validate(),
        }
    }
}

impl InvoiceFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.client_name.trim().is_empty() {
            bail!("invoice client name is required -- enter a client and retry");
        }
        if self.title.trim().is_empty() {
            bail!("invoice title is required -- enter a title and retry");
        }
        let email = self.client_email.trim();
        if !email.is_empty() && !email.contains('@') {
            bail!("client email {email:?} is missing '@' -- fix the address or leave it blank");
        }
        let currency = self.currency.trim();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            bail!("currency must be a 3-letter code like USD, got {currency:?}");
        }
        if let (Some(issue_date), Some(due_date)) = (self.issue_date, self.due_date)
            && due_date < issue_date
        {
            bail!("invoice due date must be on/after issue date");
        }
        for (index, item) in self.line_items.iter().enumerate() {
            let line = index + 1;
            if item.quantity <= 0 {
                bail!("line {line} quantity must be positive");
            }
            if item.rate_cents < 0 {
                bail!("line {line} rate cannot be negative");
            }
            if !(0..=BASIS_POINTS_PER_WHOLE).contains(&item.tax_basis_points) {
                bail!("line {line} tax must be between 0% and 100%");
            }
        }
        match self.discount {
            Discount::None => {}
            Discount::Percent { basis_points } => {
                if !(0..=BASIS_POINTS_PER_WHOLE).contains(&basis_points) {
                    bail!("invoice discount must be between 0% and 100%");
                }
            }
            Discount::Fixed { cents } => {
                if cents < 0 {
                    bail!("invoice discount cannot be negative");
                }
            }
        }
        Ok(())
    }

    /// Subtotal, tax and discount in whole cents, each rounded half up. The
    /// total never goes below zero.
    pub fn totals(&self) -> InvoiceTotals {
        let subtotal: i128 = self.line_items.iter().map(LineItem::gross_cents).sum();
        let tax_scaled: i128 = self
            .line_items
            .iter()
            .map(|item| item.gross_cents() * i128::from(item.tax_basis_points))
            .sum();
        let tax = round_div(tax_scaled, i128::from(BASIS_POINTS_PER_WHOLE));
        let discount = match self.discount {
            Discount::None => 0,
            Discount::Percent { basis_points } => round_div(
                subtotal * i128::from(basis_points),
                i128::from(BASIS_POINTS_PER_WHOLE),
            ),
            Discount::Fixed { cents } => i128::from(cents),
        };
        let total = (subtotal + tax - discount).max(0);
        InvoiceTotals {
            subtotal_cents: clamp_cents(subtotal),
            tax_cents: clamp_cents(tax),
            discount_cents: clamp_cents(discount),
            total_cents: clamp_cents(total),
        }
    }
}

impl ArticleFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            bail!("article title is required -- enter a title and retry");
        }
        if self.category.trim().is_empty() {
            bail!("article category is required -- choose a category and retry");
        }
        if self.read_time_minutes < 0 {
            bail!("article read time cannot be negative");
        }
        if self.tags.iter().any(|tag| tag.trim().is_empty()) {
            bail!("article tags cannot be blank -- remove the empty tag and retry");
        }
        Ok(())
    }
}

impl SkillFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("skill name is required -- enter a name and retry");
        }
        if self.category.trim().is_empty() {
            bail!("skill category is required -- choose a category and retry");
        }
        if !(0..=MAX_YEARS_OF_EXPERIENCE).contains(&self.years_of_experience) {
            bail!(
                "years of experience must be between 0 and {MAX_YEARS_OF_EXPERIENCE}, got {}",
                self.years_of_experience
            );
        }
        if self.endorsements < 0 {
            bail!("skill endorsements cannot be negative");
        }
        Ok(())
    }
}

/// Stored invoices keep only their total, so the edit form carries it as a
/// single untaxed line.
impl From<&Invoice> for InvoiceFormInput {
    fn from(invoice: &Invoice) -> Self {
        Self {
            invoice_number: invoice.invoice_number.clone(),
            title: invoice.title.clone(),
            client_name: invoice.client_name.clone(),
            client_email: invoice.client_email.clone(),
            status: invoice.status,
            currency: invoice.currency.clone(),
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            line_items: vec![LineItem {
                description: "Invoice total".to_owned(),
                quantity: 1,
                rate_cents: invoice.amount_cents,
                tax_basis_points: 0,
            }],
            discount: Discount::None,
            notes: invoice.notes.clone(),
        }
    }
}

impl From<&Article> for ArticleFormInput {
    fn from(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            excerpt: article.excerpt.clone(),
            tags: article.tags.clone(),
            category: article.category.clone(),
            author: article.author.clone(),
            status: article.status,
            read_time_minutes: article.read_time_minutes,
        }
    }
}

impl From<&Skill> for SkillFormInput {
    fn from(skill: &Skill) -> Self {
        Self {
            name: skill.name.clone(),
            category: skill.category.clone(),
            level: skill.level,
            years_of_experience: skill.years_of_experience,
            endorsements: skill.endorsements,
        }
    }
}

/// Split comma-separated tag text, trimming and dropping empties.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

fn round_div(numerator: i128, denominator: i128) -> i128 {
    if numerator >= 0 {
        (numerator * 2 + denominator) / (denominator * 2)
    } else {
        -((-numerator * 2 + denominator) / (denominator * 2))
    }
}

fn clamp_cents(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}
