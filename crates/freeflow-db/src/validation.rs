// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Parsing and formatting of user-typed values: money, dates, counts and
//! percentages.

use thiserror::Error;
use time::Date;
use time::macros::format_description;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid money value")]
    InvalidMoney,
    #[error("negative money value")]
    NegativeMoney,
    #[error("invalid date value, expected YYYY-MM-DD")]
    InvalidDate,
    #[error("invalid count, expected a whole number 0 or greater")]
    InvalidCount,
    #[error("invalid percentage, expected 0 to 100 with at most two decimals")]
    InvalidPercent,
}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

pub fn parse_required_cents(input: &str) -> ValidationResult<i64> {
    parse_cents(input.trim())
}

pub fn parse_optional_cents(input: &str) -> ValidationResult<Option<i64>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    parse_cents(trimmed).map(Some)
}

pub fn format_cents(cents: i64) -> String {
    format_money(cents, "USD")
}

/// Dollar amounts get a leading `$`; every other currency trails its code.
pub fn format_money(cents: i64, currency: &str) -> String {
    let (sign, cents) = normalize_sign(cents);
    let amount = format!("{}.{:02}", comma_format(cents / 100), cents % 100);
    if currency.eq_ignore_ascii_case("USD") {
        format!("{sign}${amount}")
    } else {
        format!("{sign}{amount} {}", currency.to_ascii_uppercase())
    }
}

/// Plain `1234.56` with no separators or symbol, for spreadsheet export.
pub fn format_decimal_cents(cents: i64) -> String {
    let (sign, cents) = normalize_sign(cents);
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}

pub fn parse_required_date(input: &str) -> ValidationResult<Date> {
    parse_date(input.trim())
}

pub fn parse_optional_date(input: &str) -> ValidationResult<Option<Date>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    parse_date(trimmed).map(Some)
}

pub fn format_date(value: Option<Date>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    value
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

/// A whole number, zero or more. Used for views, endorsements and day counts.
pub fn parse_count(input: &str) -> ValidationResult<i64> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ValidationError::InvalidCount);
    }
    trimmed
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidCount)
}

pub fn parse_optional_count(input: &str) -> ValidationResult<Option<i64>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    parse_count(input).map(Some)
}

/// `"8.25"` or `"8.25%"` becomes 825 basis points.
pub fn parse_percent_basis_points(input: &str) -> ValidationResult<i64> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidPercent);
    }
    let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if frac.len() > 2 || (whole.is_empty() && frac.is_empty()) {
        return Err(ValidationError::InvalidPercent);
    }
    let whole = parse_digits(whole, true).map_err(|_| ValidationError::InvalidPercent)?;
    let mut frac_value = parse_digits(frac, true).map_err(|_| ValidationError::InvalidPercent)?;
    if frac.len() == 1 {
        frac_value *= 10;
    }
    let basis_points = whole
        .checked_mul(100)
        .and_then(|value| value.checked_add(frac_value))
        .ok_or(ValidationError::InvalidPercent)?;
    if basis_points > 10_000 {
        return Err(ValidationError::InvalidPercent);
    }
    Ok(basis_points)
}

fn parse_cents(input: &str) -> ValidationResult<i64> {
    let clean = input.replace(',', "");
    if clean.starts_with('-') {
        return Err(ValidationError::NegativeMoney);
    }

    let clean = clean.strip_prefix('$').unwrap_or(&clean);
    if clean.is_empty() {
        return Err(ValidationError::InvalidMoney);
    }

    let (whole, frac) = match clean.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (clean, None),
    };
    let whole = parse_digits(whole, true)?;

    let mut frac_value = 0i64;
    if let Some(frac) = frac {
        if frac.len() > 2 {
            return Err(ValidationError::InvalidMoney);
        }
        frac_value = parse_digits(frac, false)?;
        if frac.len() == 1 {
            frac_value *= 10;
        }
    }

    whole
        .checked_mul(100)
        .and_then(|value| value.checked_add(frac_value))
        .ok_or(ValidationError::InvalidMoney)
}

fn parse_digits(input: &str, allow_empty: bool) -> ValidationResult<i64> {
    if input.is_empty() {
        if allow_empty {
            return Ok(0);
        }
        return Err(ValidationError::InvalidMoney);
    }
    if !input.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ValidationError::InvalidMoney);
    }
    input
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidMoney)
}

fn parse_date(input: &str) -> ValidationResult<Date> {
    Date::parse(input, &format_description!("[year]-[month]-[day]"))
        .map_err(|_| ValidationError::InvalidDate)
}

fn comma_format(value: i64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn normalize_sign(cents: i64) -> (&'static str, i64) {
    if cents >= 0 {
        return ("", cents);
    }
    if cents == i64::MIN {
        ("-", i64::MAX)
    } else {
        ("-", -cents)
    }
}
