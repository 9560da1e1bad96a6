// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::ids::*;

/// A closed set of status values with a stable storage spelling.
pub trait StatusKind: Copy + Eq + std::fmt::Debug + 'static {
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Viewed,
    Paid,
    Overdue,
    Cancelled,
}

impl StatusKind for InvoiceStatus {
    const ALL: &'static [Self] = &[
        Self::Draft,
        Self::Sent,
        Self::Viewed,
        Self::Paid,
        Self::Overdue,
        Self::Cancelled,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Viewed => "viewed",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Cancelled => "cancelled",
        }
    }
}

impl InvoiceStatus {
    /// Money in these states is still expected to arrive.
    pub const fn is_outstanding(self) -> bool {
        matches!(self, Self::Sent | Self::Viewed)
    }

    /// The client has the invoice and has not paid it yet.
    pub const fn accepts_reminder(self) -> bool {
        matches!(self, Self::Sent | Self::Viewed | Self::Overdue)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Draft,
    Review,
    Scheduled,
    Published,
    Archived,
}

impl StatusKind for ArticleStatus {
    const ALL: &'static [Self] = &[
        Self::Draft,
        Self::Review,
        Self::Scheduled,
        Self::Published,
        Self::Archived,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Review => "review",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl StatusKind for SkillLevel {
    const ALL: &'static [Self] = &[
        Self::Beginner,
        Self::Intermediate,
        Self::Advanced,
        Self::Expert,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionEntity {
    Invoice,
    Article,
    Skill,
}

impl DeletionEntity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Article => "article",
            Self::Skill => "skill",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "invoice" => Some(Self::Invoice),
            "article" => Some(Self::Article),
            "skill" => Some(Self::Skill),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Invoices,
    Articles,
    Skills,
}

impl PageKind {
    pub const ALL: [Self; 3] = [Self::Invoices, Self::Articles, Self::Skills];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invoices => "invoices",
            Self::Articles => "articles",
            Self::Skills => "skills",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Invoices => "Invoices",
            Self::Articles => "Knowledge Base",
            Self::Skills => "Profile Skills",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "invoices" | "invoice" => Some(Self::Invoices),
            "articles" | "article" | "kb" | "help" => Some(Self::Articles),
            "skills" | "skill" | "profile" => Some(Self::Skills),
            _ => None,
        }
    }

    pub const fn deletion_entity(self) -> DeletionEntity {
        match self {
            Self::Invoices => DeletionEntity::Invoice,
            Self::Articles => DeletionEntity::Article,
            Self::Skills => DeletionEntity::Skill,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub invoice_number: String,
    pub title: String,
    pub client_name: String,
    pub client_email: String,
    pub status: InvoiceStatus,
    pub amount_cents: i64,
    pub currency: String,
    pub issue_date: Option<Date>,
    pub due_date: Option<Date>,
    pub notes: String,
    pub reminder_count: i64,
    pub last_reminder_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub excerpt: String,
    pub tags: Vec<String>,
    pub category: String,
    pub author: String,
    pub status: ArticleStatus,
    pub views: i64,
    pub helpful_count: i64,
    pub not_helpful_count: i64,
    pub read_time_minutes: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
    pub category: String,
    pub level: SkillLevel,
    pub years_of_experience: i32,
    pub endorsements: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRecord {
    pub id: DeletionRecordId,
    pub entity: DeletionEntity,
    pub target_id: i64,
    pub deleted_at: OffsetDateTime,
    pub restored_at: Option<OffsetDateTime>,
}
