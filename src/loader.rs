use crate::row::{DATE_COLUMN, DailyRow, SheetSnapshot};
use chrono::NaiveDate;
use log::warn;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::path::Path;

/// Loads a sheet snapshot from a CSV export of the spreadsheet.
///
/// The export has a header row with the 日付 column plus one numeric
/// column per `{segment}{stage}` / `{segment}友だち数` pair. Cells that
/// do not parse as a non-negative count are recorded as *absent*, so a
/// query touching them fails with `MissingColumn` instead of silently
/// computing ratios over a coerced zero.
///
/// # Errors
/// * I/O and CSV parse failures
/// * a missing 日付 header or an unparsable date cell
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<SheetSnapshot, Box<dyn Error>> {
    let mut reader = csv::Reader::from_path(&filepath)?;
    let headers = reader.headers()?.clone();

    let date_idx = headers
        .iter()
        .position(|h| h.trim() == DATE_COLUMN)
        .ok_or_else(|| format!("CSV is missing the {DATE_COLUMN} column"))?;

    let mut rows: Vec<DailyRow> = Vec::new();
    let mut seen_dates: HashSet<NaiveDate> = HashSet::new();

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let date_field = record
            .get(date_idx)
            .ok_or_else(|| format!("row {} has no date field", line + 2))?;
        let date = parse_date(date_field)
            .ok_or_else(|| format!("row {}: unparsable date {date_field:?}", line + 2))?;

        // One row per date; the first occurrence wins.
        if !seen_dates.insert(date) {
            warn!("duplicate row for {date}, keeping the first");
            continue;
        }

        let mut counts = HashMap::new();
        for (i, field) in record.iter().enumerate() {
            if i == date_idx {
                continue;
            }
            let Some(header) = headers.get(i) else {
                continue;
            };
            if let Some(value) = parse_count(field) {
                counts.insert(header.trim().to_string(), value);
            }
        }

        rows.push(DailyRow { date, counts });
    }

    Ok(SheetSnapshot::new(rows))
}

/// Accepts the two date spellings seen in sheet exports.
fn parse_date(field: &str) -> Option<NaiveDate> {
    let trimmed = field.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y/%m/%d"))
        .ok()
}

/// Parses a counter cell. Thousands separators are stripped; empty and
/// non-numeric cells yield `None` (absent).
fn parse_count(field: &str) -> Option<u64> {
    let cleaned = field.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<u64>().ok().or_else(|| {
        // Sheets sometimes export counts as "40.0".
        cleaned
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
            .map(|v| v as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn loads_rows_with_dates_and_counts() {
        let file = write_csv(
            "日付,新規友だち数,既存友だち数,新規回答数,既存回答数\n\
             2024-12-01,100,50,40,30\n\
             2024/12/02,110,55,44,33\n",
        );
        let snapshot = from_csv(file.path()).unwrap();
        assert_eq!(snapshot.len(), 2);

        let row = snapshot.row_for(day(2024, 12, 1)).unwrap();
        assert_eq!(row.counts["新規友だち数"], 100);
        assert_eq!(row.counts["既存回答数"], 30);
        assert!(snapshot.row_for(day(2024, 12, 2)).is_some());
    }

    #[test]
    fn unparsable_cells_are_absent_not_zero() {
        let file = write_csv(
            "日付,新規回答数,既存回答数\n\
             2024-12-01,40,-\n",
        );
        let snapshot = from_csv(file.path()).unwrap();
        let row = snapshot.row_for(day(2024, 12, 1)).unwrap();
        assert_eq!(row.counts.get("新規回答数"), Some(&40));
        assert_eq!(row.counts.get("既存回答数"), None);
    }

    #[test]
    fn first_row_wins_on_duplicate_dates() {
        let file = write_csv(
            "日付,新規回答数\n\
             2024-12-01,40\n\
             2024-12-01,99\n",
        );
        let snapshot = from_csv(file.path()).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.row_for(day(2024, 12, 1)).unwrap().counts["新規回答数"],
            40
        );
    }

    #[test]
    fn thousands_separators_and_decimals_are_normalized() {
        assert_eq!(parse_count("1,234"), Some(1234));
        assert_eq!(parse_count("40.0"), Some(40));
        assert_eq!(parse_count(" 7 "), Some(7));
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("40.5"), None);
        assert_eq!(parse_count("-3"), None);
        assert_eq!(parse_count("abc"), None);
    }

    #[test]
    fn missing_date_column_is_rejected() {
        let file = write_csv("date,新規回答数\n2024-12-01,40\n");
        assert!(from_csv(file.path()).is_err());
    }

    #[test]
    fn unparsable_date_is_rejected() {
        let file = write_csv("日付,新規回答数\n12月1日,40\n");
        assert!(from_csv(file.path()).is_err());
    }
}
