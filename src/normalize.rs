use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::error::ConversionError;
use crate::model::{LoadMode, PolicyRecord};

/// Store columns in write order. Full-load tables additionally lead with `id`.
pub const COLUMNS: [&str; 8] = [
    "chrgrNm", "deptNm", "title", "regDt", "cont", "telNo", "inqCnt", "url",
];
pub const ID_COLUMN: &str = "id";

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y.%m.%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y%m%d%H%M%S",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d", "%Y%m%d", "%Y. %m. %d"];

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyRow {
    pub sequence_id: Option<i64>,
    pub charger_name: String,
    pub department_name: String,
    pub title: String,
    pub registered_date: Option<NaiveDateTime>,
    pub content: String,
    pub phone_number: String,
    pub inquiry_count: i64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyTable {
    pub mode: LoadMode,
    pub rows: Vec<PolicyRow>,
}

impl PolicyTable {
    pub fn columns(&self) -> Vec<&'static str> {
        let mut cols = Vec::with_capacity(COLUMNS.len() + 1);
        if self.mode == LoadMode::Full {
            cols.push(ID_COLUMN);
        }
        cols.extend(COLUMNS);
        cols
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Coerce fetched records into typed rows.
///
/// Text columns never fail and dates fall back to `None`; a garbage
/// `inqCnt` fails the whole table. Duplicate urls are kept.
pub fn normalize(records: &[PolicyRecord], mode: LoadMode) -> Result<PolicyTable, ConversionError> {
    let mut rows = records
        .iter()
        .map(normalize_record)
        .collect::<Result<Vec<_>, _>>()?;

    if mode == LoadMode::Full {
        for (i, row) in rows.iter_mut().enumerate() {
            row.sequence_id = Some(i as i64 + 1);
        }
    }

    Ok(PolicyTable { mode, rows })
}

fn normalize_record(r: &PolicyRecord) -> Result<PolicyRow, ConversionError> {
    Ok(PolicyRow {
        sequence_id: None,
        charger_name: r.charger_name.clone(),
        department_name: r.department_name.clone(),
        title: r.title.clone(),
        registered_date: parse_registered_date(&r.registered_date),
        content: r.content.clone(),
        phone_number: r.phone_number.clone(),
        inquiry_count: coerce_inquiry_count(&r.inquiry_count).ok_or_else(|| {
            ConversionError::InquiryCount {
                url: r.url.clone(),
                value: r.inquiry_count.to_string(),
            }
        })?,
        url: r.url.clone(),
    })
}

/// Parse `regDt`. Anything unrecognised is `None`, never a placeholder date.
pub fn parse_registered_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Null counts as zero; otherwise the value must be a non-negative integer,
/// possibly spelled as a string or an integral float.
pub fn coerce_inquiry_count(value: &Value) -> Option<i64> {
    let n = match value {
        Value::Null => Some(0),
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }?;
    (n >= 0).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> PolicyRecord {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn null_inquiry_count_is_zero() {
        let t = normalize(
            &[record(json!({ "url": "http://x", "inqCnt": null }))],
            LoadMode::Incremental,
        )
        .unwrap();
        assert_eq!(t.rows[0].inquiry_count, 0);
    }

    #[test]
    fn bad_date_is_none_but_null_title_is_empty() {
        let t = normalize(
            &[record(json!({ "regDt": "not-a-date", "title": null }))],
            LoadMode::Incremental,
        )
        .unwrap();
        assert_eq!(t.rows[0].registered_date, None);
        assert_eq!(t.rows[0].title, "");
    }

    #[test]
    fn missing_date_is_none() {
        let t = normalize(&[record(json!({}))], LoadMode::Incremental).unwrap();
        assert_eq!(t.rows[0].registered_date, None);
    }

    #[test]
    fn date_shapes() {
        let midnight = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        for raw in ["2024-03-01", "2024.03.01", "2024/03/01", "20240301", " 2024-03-01 "] {
            assert_eq!(parse_registered_date(raw), Some(midnight), "{raw}");
        }
        let with_time = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 15)
            .unwrap();
        assert_eq!(parse_registered_date("2024-03-01 09:30:15"), Some(with_time));
        assert_eq!(parse_registered_date("2024-03-01T09:30:15"), Some(with_time));
        assert_eq!(parse_registered_date("2024-03-01 09:30:15.0"), Some(with_time));
        assert_eq!(parse_registered_date("2024-13-01"), None);
        assert_eq!(parse_registered_date(""), None);
    }

    #[test]
    fn inquiry_count_coercion() {
        assert_eq!(coerce_inquiry_count(&json!(12)), Some(12));
        assert_eq!(coerce_inquiry_count(&json!("12")), Some(12));
        assert_eq!(coerce_inquiry_count(&json!(" 7 ")), Some(7));
        assert_eq!(coerce_inquiry_count(&json!(3.0)), Some(3));
        assert_eq!(coerce_inquiry_count(&json!(null)), Some(0));
        assert_eq!(coerce_inquiry_count(&json!(3.5)), None);
        assert_eq!(coerce_inquiry_count(&json!(-1)), None);
        assert_eq!(coerce_inquiry_count(&json!("many")), None);
        assert_eq!(coerce_inquiry_count(&json!("")), None);
        assert_eq!(coerce_inquiry_count(&json!([1])), None);
    }

    #[test]
    fn garbage_inquiry_count_fails() {
        let err = normalize(
            &[
                record(json!({ "url": "http://ok", "inqCnt": 1 })),
                record(json!({ "url": "http://bad", "inqCnt": "lots" })),
            ],
            LoadMode::Full,
        )
        .unwrap_err();
        let ConversionError::InquiryCount { url, value } = err;
        assert_eq!(url, "http://bad");
        assert_eq!(value, "\"lots\"");
    }

    #[test]
    fn text_is_not_trimmed() {
        let t = normalize(&[record(json!({ "title": "  spaced  " }))], LoadMode::Incremental).unwrap();
        assert_eq!(t.rows[0].title, "  spaced  ");
    }

    #[test]
    fn full_mode_assigns_positional_ids() {
        let records: Vec<_> = (0..4)
            .map(|i| record(json!({ "url": format!("http://x/{i}") })))
            .collect();
        let t = normalize(&records, LoadMode::Full).unwrap();
        let ids: Vec<_> = t.rows.iter().map(|r| r.sequence_id).collect();
        assert_eq!(ids, [Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(t.columns()[0], "id");
        assert_eq!(t.columns().len(), 9);
    }

    #[test]
    fn incremental_mode_has_no_ids() {
        let t = normalize(&[record(json!({ "url": "a" }))], LoadMode::Incremental).unwrap();
        assert_eq!(t.rows[0].sequence_id, None);
        assert_eq!(t.columns(), COLUMNS.to_vec());
    }

    #[test]
    fn duplicates_are_kept() {
        let records = [
            record(json!({ "url": "dup", "title": "first" })),
            record(json!({ "url": "dup", "title": "second" })),
        ];
        assert_eq!(normalize(&records, LoadMode::Incremental).unwrap().len(), 2);
    }

    #[test]
    fn normalization_is_idempotent() {
        let records = [
            record(json!({ "url": "a", "regDt": "2023-01-02", "inqCnt": "5" })),
            record(json!({ "url": "b", "regDt": "junk", "title": null })),
        ];
        assert_eq!(
            normalize(&records, LoadMode::Full).unwrap(),
            normalize(&records, LoadMode::Full).unwrap()
        );
    }
}
