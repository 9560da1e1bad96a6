// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! record_id {
    ($name:ident, $label:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const LABEL: &'static str = $label;

            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(raw: &str) -> anyhow::Result<Self> {
                let value: i64 = raw.trim().parse().map_err(|_| {
                    anyhow::anyhow!("{} id {raw:?} is not a number", Self::LABEL)
                })?;
                if value <= 0 {
                    anyhow::bail!("{} id must be positive, got {value}", Self::LABEL);
                }
                Ok(Self(value))
            }
        }
    };
}

record_id!(InvoiceId, "invoice");
record_id!(ArticleId, "article");
record_id!(SkillId, "skill");
record_id!(DeletionRecordId, "deletion record");
