use crate::catalog;
use crate::error::FunnelError;
use crate::funnel::{SegmentSeries, ShareTable};
use plotters::prelude::*;
use serde::Serialize;

/// Canvas size for the comparative stacked chart.
const STACKED_WIDTH: u32 = 900;
const STACKED_HEIGHT: u32 = 600;

/// Canvas size for the per-segment funnel chart.
const SEGMENT_WIDTH: u32 = 800;
const SEGMENT_HEIGHT: u32 = 400;

/// Percent labels narrower than this are dropped rather than drawn
/// over the neighboring slice.
const MIN_LABELED_WIDTH: f64 = 5.0;

/// One colored slice of a stacked bar: `base` is the cumulative
/// percent of the slices drawn before it, `width` the slice's own
/// percent.
#[derive(Debug, Clone, Serialize)]
pub struct BarSlice {
    pub label: String,
    pub value: u64,
    pub base: f64,
    pub width: f64,
    pub color: String,
    pub text: String,
}

/// One stacked bar. Row 0 sits at the bottom of the chart, so rows run
/// from the last funnel stage up to the first.
#[derive(Debug, Clone, Serialize)]
pub struct StackedRow {
    pub stage: String,
    /// Y-axis tick label, `"{stage} (計: {total}人)"`.
    pub axis_label: String,
    pub slices: Vec<BarSlice>,
}

/// Legend entry, one per segment label, annotated with the segment's
/// first-stage value.
#[derive(Debug, Clone, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub text: String,
    pub color: String,
}

/// Geometry and labels for the comparative stacked-bar chart.
#[derive(Debug, Clone, Serialize)]
pub struct StackedChartParams {
    pub segment_type: String,
    pub rows: Vec<StackedRow>,
    pub legend: Vec<LegendEntry>,
}

/// One horizontal bar of a single segment's funnel.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentBar {
    pub stage: String,
    pub value: u64,
    pub value_text: String,
    /// `"CVR: {rate:.1}%"`, absent at the first stage.
    pub cvr_text: Option<String>,
}

/// Geometry and labels for one segment's funnel chart. Bars are in
/// funnel order; the renderer draws them top to bottom.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentChartParams {
    pub title: String,
    pub color: String,
    pub bars: Vec<SegmentBar>,
}

/// Builds the stacked-chart geometry from a percent-of-total table.
///
/// Slices within a bar are stacked in catalog label order, each based
/// on the cumulative percent of its predecessors, which keeps bar
/// order aligned with the legend.
pub fn stacked_chart_params(
    table: &ShareTable,
    segment_type: &str,
) -> Result<StackedChartParams, FunnelError> {
    let spec = catalog::spec_for(segment_type)?;

    let mut rows = Vec::with_capacity(table.len());
    for breakdown in table.iter().rev() {
        let mut cumulative = 0.0;
        let mut slices = Vec::with_capacity(breakdown.segments.len());
        for share in &breakdown.segments {
            slices.push(BarSlice {
                label: share.label.clone(),
                value: share.value,
                base: cumulative,
                width: share.percent,
                color: spec.color_of(&share.label).to_string(),
                text: format!("{:.1}%", share.percent),
            });
            cumulative += share.percent;
        }
        rows.push(StackedRow {
            stage: breakdown.stage.clone(),
            axis_label: format!(
                "{} (計: {}人)",
                breakdown.stage,
                group_digits(breakdown.total)
            ),
            slices,
        });
    }

    let legend = table
        .first()
        .map(|first| {
            first
                .segments
                .iter()
                .map(|share| LegendEntry {
                    label: share.label.clone(),
                    text: format!("{} ({})", share.label, group_digits(share.value)),
                    color: spec.color_of(&share.label).to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(StackedChartParams {
        segment_type: segment_type.to_string(),
        rows,
        legend,
    })
}

/// Builds one segment's funnel-chart geometry from its conversion
/// series.
pub fn segment_chart_params(
    series: &SegmentSeries,
    segment_type: &str,
) -> Result<SegmentChartParams, FunnelError> {
    let spec = catalog::spec_for(segment_type)?;

    let bars = series
        .points
        .iter()
        .enumerate()
        .map(|(i, point)| SegmentBar {
            stage: point.stage.clone(),
            value: point.value,
            value_text: format!("{}人", group_digits(point.value)),
            cvr_text: (i > 0).then(|| format!("CVR: {:.1}%", point.conversion_rate)),
        })
        .collect();

    Ok(SegmentChartParams {
        title: format!("{}のファネル分析", series.label),
        color: spec.color_of(&series.label).to_string(),
        bars,
    })
}

/// Renders the comparative stacked chart to PNG bytes.
pub fn render_stacked_chart(
    params: &StackedChartParams,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if params.rows.is_empty() {
        return Err("no stages to draw".into());
    }

    let tmp = tempfile::Builder::new().suffix(".png").tempfile()?;
    let path = tmp.path().to_path_buf();
    {
        let root =
            BitMapBackend::new(&path, (STACKED_WIDTH, STACKED_HEIGHT)).into_drawing_area();
        root.fill(&WHITE)?;

        let n = params.rows.len();
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(220)
            .build_cartesian_2d(0f64..100f64, 0f64..n as f64)?;

        let rows = &params.rows;
        chart
            .configure_mesh()
            .disable_y_mesh()
            .x_desc("割合 (%)")
            .y_labels(n)
            .y_label_formatter(&|y| {
                rows.get(y.floor() as usize)
                    .map(|r| r.axis_label.clone())
                    .unwrap_or_default()
            })
            .draw()?;

        for (i, row) in rows.iter().enumerate() {
            let (y0, y1) = (i as f64 + 0.2, i as f64 + 0.8);
            for slice in &row.slices {
                let color = parse_hex_color(&slice.color)?;
                chart.draw_series(std::iter::once(Rectangle::new(
                    [(slice.base, y0), (slice.base + slice.width, y1)],
                    color.filled(),
                )))?;
                if slice.width >= MIN_LABELED_WIDTH {
                    chart.draw_series(std::iter::once(Text::new(
                        slice.text.clone(),
                        (slice.base + slice.width / 2.0, (y0 + y1) / 2.0),
                        ("sans-serif", 13).into_font().color(&WHITE),
                    )))?;
                }
            }
        }

        for entry in &params.legend {
            let color = parse_hex_color(&entry.color)?;
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(0.0, 0.0), (0.0, 0.0)],
                    color.filled(),
                )))?
                .label(entry.text.clone())
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
                });
        }
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;

        root.present()?;
    }

    let buffer = std::fs::read(&path)?;
    Ok(buffer)
}

/// Renders one segment's funnel chart to PNG bytes.
pub fn render_segment_chart(
    params: &SegmentChartParams,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if params.bars.is_empty() {
        return Err("no stages to draw".into());
    }

    let tmp = tempfile::Builder::new().suffix(".png").tempfile()?;
    let path = tmp.path().to_path_buf();
    {
        let root =
            BitMapBackend::new(&path, (SEGMENT_WIDTH, SEGMENT_HEIGHT)).into_drawing_area();
        root.fill(&WHITE)?;

        let n = params.bars.len();
        let max_value = params.bars.iter().map(|b| b.value).max().unwrap_or(0).max(1) as f64;
        let color = parse_hex_color(&params.color)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&params.title, ("sans-serif", 20).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(160)
            .build_cartesian_2d(0f64..max_value * 1.35, 0f64..n as f64)?;

        let bars = &params.bars;
        chart
            .configure_mesh()
            .disable_y_mesh()
            .x_desc("人数")
            .y_labels(n)
            .y_label_formatter(&|y| {
                let i = y.floor() as usize;
                bars.get(n - 1 - i.min(n - 1))
                    .map(|b| b.stage.clone())
                    .unwrap_or_default()
            })
            .draw()?;

        // First stage at the top of the chart.
        for (i, bar) in bars.iter().enumerate() {
            let y = (n - 1 - i) as f64;
            chart.draw_series(std::iter::once(Rectangle::new(
                [(0.0, y + 0.2), (bar.value as f64, y + 0.8)],
                color.filled(),
            )))?;
            chart.draw_series(std::iter::once(Text::new(
                bar.value_text.clone(),
                (bar.value as f64 + max_value * 0.01, y + 0.45),
                ("sans-serif", 13).into_font().color(&BLACK),
            )))?;
            if let Some(cvr) = &bar.cvr_text {
                chart.draw_series(std::iter::once(Text::new(
                    cvr.clone(),
                    (max_value * 1.1, y + 0.45),
                    ("sans-serif", 12).into_font().color(&BLACK),
                )))?;
            }
        }

        root.present()?;
    }

    let buffer = std::fs::read(&path)?;
    Ok(buffer)
}

/// `#rrggbb` → RGBColor.
fn parse_hex_color(hex: &str) -> Result<RGBColor, Box<dyn std::error::Error>> {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("invalid hex color: {hex}").into());
    }
    let r = u8::from_str_radix(&digits[0..2], 16)?;
    let g = u8::from_str_radix(&digits[2..4], 16)?;
    let b = u8::from_str_radix(&digits[4..6], 16)?;
    Ok(RGBColor(r, g, b))
}

/// 1234567 → "1,234,567".
fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
