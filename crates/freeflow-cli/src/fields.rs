// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! `--set key=value` pairs applied onto a form payload.

use anyhow::{Context, Result, anyhow, bail};
use freeflow_app::{
    ArticleFormInput, ArticleStatus, Discount, FormKind, FormPayload, InvoiceFormInput,
    InvoiceStatus, LineItem, SkillFormInput, SkillLevel, StatusKind, parse_tags,
};
use freeflow_db::validation::{
    parse_count, parse_optional_date, parse_percent_basis_points, parse_required_cents,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FormFieldSpec {
    label: &'static str,
    hint: &'static str,
}

fn form_field_specs(kind: FormKind) -> &'static [FormFieldSpec] {
    match kind {
        FormKind::Invoice => &[
            FormFieldSpec {
                label: "number",
                hint: "blank to generate one",
            },
            FormFieldSpec {
                label: "title",
                hint: "text",
            },
            FormFieldSpec {
                label: "client",
                hint: "text",
            },
            FormFieldSpec {
                label: "email",
                hint: "an address with @",
            },
            FormFieldSpec {
                label: "status",
                hint: "draft, sent, viewed, paid, overdue or cancelled",
            },
            FormFieldSpec {
                label: "currency",
                hint: "a 3-letter code",
            },
            FormFieldSpec {
                label: "issue",
                hint: "YYYY-MM-DD or blank",
            },
            FormFieldSpec {
                label: "due",
                hint: "YYYY-MM-DD or blank",
            },
            FormFieldSpec {
                label: "amount",
                hint: "an amount like 1250.00",
            },
            FormFieldSpec {
                label: "tax",
                hint: "a percentage like 8.25",
            },
            FormFieldSpec {
                label: "discount",
                hint: "10% or a fixed amount, none to clear",
            },
            FormFieldSpec {
                label: "notes",
                hint: "text",
            },
        ],
        FormKind::Article => &[
            FormFieldSpec {
                label: "title",
                hint: "text",
            },
            FormFieldSpec {
                label: "excerpt",
                hint: "text",
            },
            FormFieldSpec {
                label: "tags",
                hint: "comma-separated",
            },
            FormFieldSpec {
                label: "category",
                hint: "text",
            },
            FormFieldSpec {
                label: "author",
                hint: "text",
            },
            FormFieldSpec {
                label: "status",
                hint: "draft, review, scheduled, published or archived",
            },
            FormFieldSpec {
                label: "read-time",
                hint: "whole minutes",
            },
        ],
        FormKind::Skill => &[
            FormFieldSpec {
                label: "name",
                hint: "text",
            },
            FormFieldSpec {
                label: "category",
                hint: "text",
            },
            FormFieldSpec {
                label: "level",
                hint: "beginner, intermediate, advanced or expert",
            },
            FormFieldSpec {
                label: "years",
                hint: "whole years",
            },
            FormFieldSpec {
                label: "endorsements",
                hint: "a whole number",
            },
        ],
    }
}

/// One `key=value` pair from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldArg {
    pub key: String,
    pub value: String,
}

impl FieldArg {
    pub fn parse(raw: &str) -> Result<Self> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow!("--set {raw:?} is missing '=' -- write it as key=value"))?;
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            bail!("--set {raw:?} has no field name -- write it as key=value");
        }
        Ok(Self {
            key,
            value: value.trim().to_owned(),
        })
    }
}

/// Field names for one form, for help text and error hints.
pub fn field_names(kind: FormKind) -> Vec<&'static str> {
    form_field_specs(kind).iter().map(|spec| spec.label).collect()
}

/// Apply every pair in order. Later pairs win over earlier ones.
pub fn apply_fields(payload: &mut FormPayload, fields: &[FieldArg]) -> Result<()> {
    let kind = payload.kind();
    for field in fields {
        let spec = form_field_specs(kind)
            .iter()
            .find(|spec| spec.label == field.key)
            .ok_or_else(|| {
                anyhow!(
                    "{} forms have no field {:?}; use {}",
                    kind.page().as_str().trim_end_matches('s'),
                    field.key,
                    field_names(kind).join(", ")
                )
            })?;
        let value = field.value.as_str();
        let applied = match payload {
            FormPayload::Invoice(form) => apply_invoice_field(form, spec.label, value),
            FormPayload::Article(form) => apply_article_field(form, spec.label, value),
            FormPayload::Skill(form) => apply_skill_field(form, spec.label, value),
        };
        applied.with_context(|| format!("{}={value:?} -- pass {}", spec.label, spec.hint))?;
    }
    Ok(())
}

fn apply_invoice_field(form: &mut InvoiceFormInput, label: &str, value: &str) -> Result<()> {
    match label {
        "number" => form.invoice_number = value.to_owned(),
        "title" => form.title = value.to_owned(),
        "client" => form.client_name = value.to_owned(),
        "email" => form.client_email = value.to_owned(),
        "status" => form.status = parse_status::<InvoiceStatus>(value)?,
        "currency" => form.currency = value.to_ascii_uppercase(),
        "issue" => form.issue_date = parse_optional_date(value)?,
        "due" => form.due_date = parse_optional_date(value)?,
        "amount" => {
            let tax_basis_points = form
                .line_items
                .first()
                .map_or(0, |item| item.tax_basis_points);
            form.line_items = vec![LineItem {
                description: "Invoice total".to_owned(),
                quantity: 1,
                rate_cents: parse_required_cents(value)?,
                tax_basis_points,
            }];
        }
        "tax" => {
            if form.line_items.is_empty() {
                bail!("the invoice has no amount yet -- set amount before tax");
            }
            let basis_points = parse_percent_basis_points(value)?;
            for item in &mut form.line_items {
                item.tax_basis_points = basis_points;
            }
        }
        "discount" => form.discount = parse_discount(value)?,
        "notes" => form.notes = value.to_owned(),
        _ => bail!("unhandled invoice field {label}"),
    }
    Ok(())
}

fn apply_article_field(form: &mut ArticleFormInput, label: &str, value: &str) -> Result<()> {
    match label {
        "title" => form.title = value.to_owned(),
        "excerpt" => form.excerpt = value.to_owned(),
        "tags" => form.tags = parse_tags(value),
        "category" => form.category = value.to_owned(),
        "author" => form.author = value.to_owned(),
        "status" => form.status = parse_status::<ArticleStatus>(value)?,
        "read-time" => form.read_time_minutes = parse_small_count(value)?,
        _ => bail!("unhandled article field {label}"),
    }
    Ok(())
}

fn apply_skill_field(form: &mut SkillFormInput, label: &str, value: &str) -> Result<()> {
    match label {
        "name" => form.name = value.to_owned(),
        "category" => form.category = value.to_owned(),
        "level" => form.level = parse_status::<SkillLevel>(value)?,
        "years" => form.years_of_experience = parse_small_count(value)?,
        "endorsements" => form.endorsements = parse_count(value)?,
        _ => bail!("unhandled skill field {label}"),
    }
    Ok(())
}

fn parse_status<S: StatusKind>(value: &str) -> Result<S> {
    S::parse(&value.to_ascii_lowercase()).ok_or_else(|| anyhow!("unknown value {value:?}"))
}

fn parse_small_count(value: &str) -> Result<i32> {
    let count = parse_count(value)?;
    i32::try_from(count).map_err(|_| anyhow!("{count} is too large"))
}

fn parse_discount(value: &str) -> Result<Discount> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(Discount::None);
    }
    if value.ends_with('%') {
        return Ok(Discount::Percent {
            basis_points: parse_percent_basis_points(value)?,
        });
    }
    Ok(Discount::Fixed {
        cents: parse_required_cents(value)?,
    })
}
