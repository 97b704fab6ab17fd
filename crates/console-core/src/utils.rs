//! Formatting helpers shared by table renderers and exports

use chrono::{DateTime, NaiveTime, Utc};

/// Format a timestamp as a short calendar date, e.g. `05 Mar 2025`
#[must_use]
pub fn format_date(instant: DateTime<Utc>) -> String {
    instant.format("%d %b %Y").to_string()
}

/// Format a timestamp with minutes, e.g. `05 Mar 2025 14:02`
#[must_use]
pub fn format_date_time(instant: DateTime<Utc>) -> String {
    instant.format("%d %b %Y %H:%M").to_string()
}

/// Format a rupee amount with Indian digit grouping, e.g. `₹1,23,456`
///
/// The last three digits form one group and every group before them has two
/// digits.
#[must_use]
pub fn format_inr(amount: u64) -> String {
    let digits = amount.to_string();
    if digits.len() <= 3 {
        return format!("₹{digits}");
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (left, right) = rest.split_at(rest.len() - 2);
        groups.push(right);
        rest = left;
    }
    groups.push(rest);
    groups.reverse();

    format!("₹{},{tail}", groups.join(","))
}

/// Up to two uppercase initials from a display name
#[must_use]
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|part| part.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}

/// Midnight UTC at the start of the instant's day
#[must_use]
pub fn start_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Rewrite text so it only contains characters a Latin-1 PDF font can show
#[must_use]
pub fn to_latin1_lossy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '₹' => out.push_str("Rs."),
            '—' | '–' => out.push('-'),
            '‘' | '’' => out.push('\''),
            '“' | '”' => out.push('"'),
            c if u32::from(c) <= 0xFF => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}
