//! Time series derived from the collections.

use crate::types::{BalanceEntry, BalanceHistory, Challenge, Payout, REntry, RecordId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Position of a point on a cumulative series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "date", rename_all = "snake_case")]
pub enum SeriesLabel {
    /// Zero point before the first record.
    Start,
    /// Running total as of this date.
    Date(NaiveDate),
    /// Terminal goal marker.
    Goal,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub label: SeriesLabel,
    pub value: f64,
}

/// Running sum over dated values.
///
/// Values are sorted ascending by date (stable, so same-day values keep
/// their order), preceded by a zero `Start` point and, when `goal` is
/// given, followed by a `Goal` point. No input yields an empty series.
pub fn cumulative_series<I>(values: I, goal: Option<f64>) -> Vec<SeriesPoint>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let mut sorted: Vec<(NaiveDate, f64)> = values.into_iter().collect();
    if sorted.is_empty() {
        return Vec::new();
    }
    sorted.sort_by_key(|(date, _)| *date);

    let mut points = Vec::with_capacity(sorted.len() + 2);
    points.push(SeriesPoint {
        label: SeriesLabel::Start,
        value: 0.0,
    });

    let mut total = 0.0;
    for (date, value) in sorted {
        total += value;
        points.push(SeriesPoint {
            label: SeriesLabel::Date(date),
            value: total,
        });
    }

    if let Some(goal) = goal {
        points.push(SeriesPoint {
            label: SeriesLabel::Goal,
            value: goal,
        });
    }

    points
}

/// Cumulative payouts.
pub fn payout_series(payouts: &[Payout], goal: Option<f64>) -> Vec<SeriesPoint> {
    cumulative_series(payouts.iter().map(|p| (p.date, p.amount)), goal)
}

/// Cumulative R-multiples.
pub fn r_series(entries: &[REntry], goal: Option<f64>) -> Vec<SeriesPoint> {
    cumulative_series(entries.iter().map(|e| (e.date, e.value)), goal)
}

/// A balance entry with the change against the previous (older) entry.
#[derive(Clone, Debug, PartialEq)]
pub struct BalanceChange<'a> {
    pub entry: &'a BalanceEntry,
    /// `None` for the oldest entry.
    pub change: Option<f64>,
}

/// Entries newest first, each with its change since the entry before it.
pub fn balance_changes(history: &[BalanceEntry]) -> Vec<BalanceChange<'_>> {
    let mut ascending: Vec<&BalanceEntry> = history.iter().collect();
    ascending.sort_by_key(|e| e.date);

    let mut changes: Vec<BalanceChange<'_>> = ascending
        .iter()
        .enumerate()
        .map(|(i, &entry)| BalanceChange {
            entry,
            change: i
                .checked_sub(1)
                .map(|prev| entry.balance - ascending[prev].balance),
        })
        .collect();
    changes.reverse();
    changes
}

/// Balance series of one challenge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceSeries {
    pub challenge_id: RecordId,
    pub name: String,
    pub points: Vec<(NaiveDate, f64)>,
}

/// Dates axis plus one series per challenge with recorded history.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceTimeline {
    /// Every distinct entry date across all histories, ascending.
    pub dates: Vec<NaiveDate>,
    pub series: Vec<BalanceSeries>,
}

/// Build the balance timeline, series in challenge order.
pub fn balance_timeline(
    challenges: &[Challenge],
    history: &BalanceHistory,
) -> BalanceTimeline {
    let dates: BTreeSet<NaiveDate> = history
        .values()
        .flat_map(|entries| entries.iter().map(|e| e.date))
        .collect();

    let series = challenges
        .iter()
        .filter_map(|challenge| {
            let entries = history.get(&challenge.id)?;
            if entries.is_empty() {
                return None;
            }
            let mut points: Vec<(NaiveDate, f64)> =
                entries.iter().map(|e| (e.date, e.balance)).collect();
            points.sort_by_key(|(date, _)| *date);
            Some(BalanceSeries {
                challenge_id: challenge.id.clone(),
                name: challenge.name.clone(),
                points,
            })
        })
        .collect();

    BalanceTimeline {
        dates: dates.into_iter().collect(),
        series,
    }
}
