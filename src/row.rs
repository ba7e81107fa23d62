use crate::error::FunnelError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name of the date column in the sheet export.
pub const DATE_COLUMN: &str = "日付";

/// The pre-funnel friend-count stage. Its raw columns form a family of
/// their own (`{segment}友だち数`), separate from the generic
/// `{segment}{stage}` convention used by every in-funnel stage.
pub const PRE_FUNNEL_STAGE: &str = "友だち数";

/// The pseudo-segment whose value is derived, not stored: at every
/// stage it is the sum of the two real constituent segments.
pub const OVERALL_SEGMENT: &str = "全体";

/// Real segments that 全体 sums over.
pub const OVERALL_PARTS: [&str; 2] = ["新規", "既存"];

/// One calendar day of raw counters, keyed by column name.
///
/// Missing keys mean *absent*, never zero — resolving an absent key is
/// a `MissingColumn` error (see `resolve`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRow {
    pub date: NaiveDate,
    pub counts: HashMap<String, u64>,
}

/// Immutable snapshot of the whole sheet, fully materialized before
/// any computation starts. Queries never re-read or invalidate it, so
/// callers may share it freely across threads.
#[derive(Debug, Clone, Default)]
pub struct SheetSnapshot {
    rows: Vec<DailyRow>,
}

impl SheetSnapshot {
    pub fn new(rows: Vec<DailyRow>) -> Self {
        SheetSnapshot { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Exact-date lookup. If an export violates the one-row-per-date
    /// invariant, the first row wins.
    pub fn row_for(&self, date: NaiveDate) -> Option<&DailyRow> {
        self.rows.iter().find(|r| r.date == date)
    }

    /// All dates present, in row order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    /// (min, max) of the dates present, for the UI date picker.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.rows.iter().map(|r| r.date).min()?;
        let max = self.rows.iter().map(|r| r.date).max()?;
        Some((min, max))
    }
}

/// Generic column name for an in-funnel (segment, stage) pair.
///
/// All column names in the sheet are built by this function or by
/// `friend_count_key` — never by ad-hoc formatting at call sites. The
/// collision rule (no two catalog pairs may produce the same name) is
/// asserted by a test below.
pub fn column_key(segment: &str, stage: &str) -> String {
    format!("{segment}{stage}")
}

/// Column name in the pre-funnel friend-count family.
pub fn friend_count_key(segment: &str) -> String {
    format!("{segment}{PRE_FUNNEL_STAGE}")
}

/// Resolves the raw count for one (stage, segment) pair in a row.
///
/// * 全体 resolves as the sum of 新規 and 既存, at every stage
///   including the pre-funnel one.
/// * The pre-funnel stage resolves through the friend-count column
///   family; all other stages use the generic key convention.
///
/// Pure function of its inputs; no side effects.
///
/// # Errors
/// * `MissingColumn` if the row lacks the column — this aborts the
///   whole query rather than defaulting to zero.
pub fn resolve(row: &DailyRow, stage: &str, segment: &str) -> Result<u64, FunnelError> {
    if segment == OVERALL_SEGMENT {
        let mut sum = 0u64;
        for part in OVERALL_PARTS {
            sum += resolve(row, stage, part)?;
        }
        return Ok(sum);
    }

    let key = if stage == PRE_FUNNEL_STAGE {
        friend_count_key(segment)
    } else {
        column_key(segment, stage)
    };

    row.counts
        .get(&key)
        .copied()
        .ok_or_else(|| FunnelError::MissingColumn {
            segment: segment.to_string(),
            stage: stage.to_string(),
        })
}
