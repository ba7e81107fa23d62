use crate::catalog::{self, SegmentSpec};
use crate::error::FunnelError;
use crate::row::{self, DailyRow, SheetSnapshot};
use chrono::NaiveDate;
use serde::Serialize;

/// One segment's slice of a funnel stage in the comparative view.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentShare {
    pub label: String,
    pub value: u64,
    /// Share of the stage total, 0..=100. Exactly 0.0 for every
    /// segment when the stage total is 0.
    pub percent: f64,
}

/// One funnel stage with its per-segment breakdown, segments in
/// catalog label order.
#[derive(Debug, Clone, Serialize)]
pub struct StageBreakdown {
    pub stage: String,
    pub total: u64,
    pub segments: Vec<SegmentShare>,
}

/// Percent-of-total table: one breakdown per stage, stages in funnel
/// order.
pub type ShareTable = Vec<StageBreakdown>;

/// One stage of a single segment's funnel in the detail view.
#[derive(Debug, Clone, Serialize)]
pub struct StagePoint {
    pub stage: String,
    pub value: u64,
    /// Percentage carried over from the previous stage. Exactly 100.0
    /// at the first stage; 0.0 whenever the previous stage's value was
    /// 0 (normalized, never NaN).
    pub conversion_rate: f64,
}

/// A segment's full stage-by-stage funnel.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentSeries {
    pub label: String,
    pub points: Vec<StagePoint>,
}

/// Percent-of-total mode over one raw row.
///
/// Walks the segment type's stages in order; per stage, resolves every
/// segment, sums them into the stage total, and derives each segment's
/// share of that total.
pub fn share_table_for_row(
    raw: &DailyRow,
    spec: &SegmentSpec,
) -> Result<ShareTable, FunnelError> {
    let mut table = Vec::with_capacity(spec.stages.len());

    for stage in spec.stages {
        let mut values = Vec::with_capacity(spec.labels.len());
        let mut total = 0u64;
        for label in spec.labels {
            let value = row::resolve(raw, stage, label)?;
            total += value;
            values.push(value);
        }

        let segments = spec
            .labels
            .iter()
            .zip(values)
            .map(|(label, value)| SegmentShare {
                label: label.to_string(),
                value,
                percent: if total > 0 {
                    value as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
            })
            .collect();

        table.push(StageBreakdown {
            stage: stage.to_string(),
            total,
            segments,
        });
    }

    Ok(table)
}

/// Conversion-rate mode over one raw row.
///
/// Each segment is walked independently through the stage list. The
/// first stage has no predecessor and is pinned at exactly 100; a zero
/// predecessor yields 0 rather than a division error.
pub fn conversion_series_for_row(
    raw: &DailyRow,
    spec: &SegmentSpec,
) -> Result<Vec<SegmentSeries>, FunnelError> {
    let mut series = Vec::with_capacity(spec.labels.len());

    for label in spec.labels {
        let mut points = Vec::with_capacity(spec.stages.len());
        let mut prev: Option<u64> = None;

        for stage in spec.stages {
            let value = row::resolve(raw, stage, label)?;
            let conversion_rate = match prev {
                None => 100.0,
                Some(0) => 0.0,
                Some(p) => value as f64 / p as f64 * 100.0,
            };
            points.push(StagePoint {
                stage: stage.to_string(),
                value,
                conversion_rate,
            });
            prev = Some(value);
        }

        series.push(SegmentSeries {
            label: label.to_string(),
            points,
        });
    }

    Ok(series)
}

/// Percent-of-total query against the snapshot.
///
/// `Ok(None)` means no row exists for the date; the caller renders an
/// empty state. The segment type is validated before the date lookup,
/// so an unknown type fails even when the date has no data.
pub fn segment_share_table(
    sheet: &SheetSnapshot,
    segment_type: &str,
    date: NaiveDate,
) -> Result<Option<ShareTable>, FunnelError> {
    let spec = catalog::spec_for(segment_type)?;
    match sheet.row_for(date) {
        Some(raw) => share_table_for_row(raw, spec).map(Some),
        None => Ok(None),
    }
}

/// Conversion-rate query against the snapshot. Same no-data and
/// validation-order semantics as `segment_share_table`.
pub fn conversion_series(
    sheet: &SheetSnapshot,
    segment_type: &str,
    date: NaiveDate,
) -> Result<Option<Vec<SegmentSeries>>, FunnelError> {
    let spec = catalog::spec_for(segment_type)?;
    match sheet.row_for(date) {
        Some(raw) => conversion_series_for_row(raw, spec).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const EPS: f64 = 1e-9;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// The worked example: 新規 100→40, 既存 50→30, plus a full set of
    /// downstream stage columns so eight-stage queries resolve.
    fn full_row() -> DailyRow {
        let mut counts = HashMap::new();
        for (seg, friends, answers) in [("新規", 100, 40), ("既存", 50, 30)] {
            counts.insert(format!("{seg}友だち数"), friends);
            counts.insert(format!("{seg}回答数"), answers);
            counts.insert(format!("{seg}特典受取"), answers / 2);
            counts.insert(format!("{seg}コンサル申込"), answers / 4);
            counts.insert(format!("{seg}コンサル日程調整済"), answers / 5);
            counts.insert(format!("{seg}コンサル実施"), answers / 10);
            counts.insert(format!("{seg}紹介"), 2);
            counts.insert(format!("{seg}成約"), 1);
        }
        DailyRow {
            date: day(2024, 12, 1),
            counts,
        }
    }

    fn snapshot() -> SheetSnapshot {
        SheetSnapshot::new(vec![full_row()])
    }

    #[test]
    fn percents_sum_to_one_hundred_per_stage() {
        let table = segment_share_table(&snapshot(), "ユーザー属性", day(2024, 12, 1))
            .unwrap()
            .unwrap();
        for breakdown in &table {
            if breakdown.total > 0 {
                let sum: f64 = breakdown.segments.iter().map(|s| s.percent).sum();
                assert!((sum - 100.0).abs() < EPS, "stage {}: {sum}", breakdown.stage);
            }
        }
    }

    #[test]
    fn worked_example_share_of_pre_funnel_stage() {
        let table = segment_share_table(&snapshot(), "ユーザー属性", day(2024, 12, 1))
            .unwrap()
            .unwrap();
        let friends = &table[0];
        assert_eq!(friends.stage, "友だち数");
        assert_eq!(friends.total, 150);
        assert_eq!(friends.segments[0].label, "新規");
        assert_eq!(friends.segments[0].value, 100);
        assert!((friends.segments[0].percent - 100.0 / 150.0 * 100.0).abs() < EPS);
    }

    #[test]
    fn overall_table_sums_constituents_at_every_stage() {
        let overall = segment_share_table(&snapshot(), "全体", day(2024, 12, 1))
            .unwrap()
            .unwrap();
        let by_user = segment_share_table(&snapshot(), "ユーザー属性", day(2024, 12, 1))
            .unwrap()
            .unwrap();
        for (o, u) in overall.iter().zip(&by_user) {
            assert_eq!(o.stage, u.stage);
            assert_eq!(o.segments.len(), 1);
            assert_eq!(o.segments[0].value, u.total);
            // A single segment owns the whole stage.
            assert!((o.segments[0].percent - 100.0).abs() < EPS);
        }
    }

    #[test]
    fn zero_stage_total_yields_zero_percents() {
        let mut raw = full_row();
        raw.counts.insert("新規紹介".to_string(), 0);
        raw.counts.insert("既存紹介".to_string(), 0);
        let sheet = SheetSnapshot::new(vec![raw]);

        let table = segment_share_table(&sheet, "ユーザー属性", day(2024, 12, 1))
            .unwrap()
            .unwrap();
        let referrals = table.iter().find(|b| b.stage == "紹介").unwrap();
        assert_eq!(referrals.total, 0);
        for share in &referrals.segments {
            assert_eq!(share.percent, 0.0);
        }
    }

    #[test]
    fn first_stage_conversion_rate_is_exactly_one_hundred() {
        let series = conversion_series(&snapshot(), "ユーザー属性", day(2024, 12, 1))
            .unwrap()
            .unwrap();
        for s in &series {
            assert_eq!(s.points[0].conversion_rate, 100.0);
        }
    }

    #[test]
    fn worked_example_conversion_rate() {
        let series = conversion_series(&snapshot(), "ユーザー属性", day(2024, 12, 1))
            .unwrap()
            .unwrap();
        let new = series.iter().find(|s| s.label == "新規").unwrap();
        assert_eq!(new.points[0].stage, "友だち数");
        assert_eq!(new.points[0].value, 100);
        assert_eq!(new.points[1].stage, "回答数");
        assert_eq!(new.points[1].value, 40);
        assert!((new.points[1].conversion_rate - 40.0).abs() < EPS);
    }

    #[test]
    fn zero_predecessor_yields_zero_rate_not_nan() {
        let mut raw = full_row();
        raw.counts.insert("新規コンサル実施".to_string(), 0);
        let sheet = SheetSnapshot::new(vec![raw]);

        let series = conversion_series(&sheet, "ユーザー属性", day(2024, 12, 1))
            .unwrap()
            .unwrap();
        let new = series.iter().find(|s| s.label == "新規").unwrap();
        let idx = new.points.iter().position(|p| p.stage == "紹介").unwrap();
        assert_eq!(new.points[idx - 1].value, 0);
        assert_eq!(new.points[idx].conversion_rate, 0.0);
        assert!(new.points.iter().all(|p| p.conversion_rate.is_finite()));
    }

    #[test]
    fn unknown_segment_type_fails_before_any_computation() {
        let err = segment_share_table(&snapshot(), "地域別", day(2024, 12, 1)).unwrap_err();
        assert_eq!(err, FunnelError::UnknownSegmentType("地域別".to_string()));
        // Fails identically when the date has no row either.
        let err = conversion_series(&snapshot(), "地域別", day(1999, 1, 1)).unwrap_err();
        assert_eq!(err, FunnelError::UnknownSegmentType("地域別".to_string()));
    }

    #[test]
    fn absent_date_is_no_data_not_an_error() {
        let table = segment_share_table(&snapshot(), "ユーザー属性", day(2024, 12, 2)).unwrap();
        assert!(table.is_none());
        let series = conversion_series(&snapshot(), "全体", day(2024, 12, 2)).unwrap();
        assert!(series.is_none());
    }

    #[test]
    fn missing_column_aborts_the_whole_query() {
        let mut raw = full_row();
        raw.counts.remove("既存成約");
        let sheet = SheetSnapshot::new(vec![raw]);

        let err = segment_share_table(&sheet, "ユーザー属性", day(2024, 12, 1)).unwrap_err();
        assert_eq!(
            err,
            FunnelError::MissingColumn {
                segment: "既存".to_string(),
                stage: "成約".to_string(),
            }
        );
    }
}
