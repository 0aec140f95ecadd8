use std::collections::HashMap;
use std::hash::Hash;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::{DashboardError, DashboardResult};
use crate::models::{FieldValue, Record, Task};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub indicator: &'static str,
    pub label: &'static str,
    pub value: FieldValue,
}

/// Counts rows per key, most frequent first. Ties keep first-seen order.
pub fn count_by<T, K, F>(rows: &[T], key: F) -> Vec<(K, usize)>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut counts: Vec<(K, usize)> = Vec::new();

    for row in rows {
        let value = key(row);
        match index.get(&value) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                index.insert(value.clone(), counts.len());
                counts.push((value, 1));
            }
        }
    }

    // sort_by is stable, so equal counts stay in first-seen order
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

pub fn count_by_category<R: Record>(
    rows: &[R],
    key_field: &str,
) -> DashboardResult<Vec<CategoryCount>> {
    if key_field != R::id_field() && !R::data_fields().any(|field| field.name == key_field) {
        return Err(DashboardError::UnknownField {
            table: R::TABLE,
            field: key_field.to_string(),
        });
    }

    let mut keys = Vec::with_capacity(rows.len());
    for row in rows {
        keys.push(row.value_of(key_field)?.category_key());
    }

    Ok(count_by(&keys, |key| key.clone())
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect())
}

/// Turns the single current snapshot into one point per non-id field, in
/// declared order. No snapshot means no series.
pub fn melt_latest_snapshot<R: Record>(latest: Option<&R>, id_field: &str) -> Vec<SeriesPoint> {
    let Some(row) = latest else {
        return Vec::new();
    };

    R::FIELDS
        .iter()
        .filter(|field| field.name != id_field)
        .filter_map(|field| {
            row.value_of(field.name).ok().map(|value| SeriesPoint {
                indicator: field.name,
                label: field.label,
                value,
            })
        })
        .collect()
}

/// Tasks whose [start, end] range touches [window_start, window_end], both
/// ends inclusive. Tasks that end before they start go through the same
/// comparison unchanged.
pub fn filter_overlapping(
    tasks: &[Task],
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| task.start_date <= window_end && task.end_date >= window_start)
        .cloned()
        .collect()
}

/// Whole days from start to end. Negative when end precedes start.
pub fn recompute_length(start_date: NaiveDate, end_date: NaiveDate) -> i64 {
    (end_date - start_date).num_days()
}

/// First and last calendar day of the month.
pub fn month_window(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

/// Parses `YYYY-MM` into the month's window.
pub fn parse_month(value: &str) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d").ok()?;
    month_window(first.year(), first.month())
}
