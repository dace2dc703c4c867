use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Which of the two run flavours is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// One-off bulk ingestion; rows carry their own sequence id.
    Full,
    /// Recent pages only, upserted by url.
    Incremental,
}

impl LoadMode {
    pub fn pages(self) -> RangeInclusive<u32> {
        match self {
            LoadMode::Full => 1..=99,
            LoadMode::Incremental => 1..=2,
        }
    }
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Full => f.write_str("full load"),
            LoadMode::Incremental => f.write_str("incremental sync"),
        }
    }
}

/// Policy subject classification; each one is a separate pagination space upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Youth,
    Equality,
    Family,
    Professional,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Youth,
        Category::Equality,
        Category::Family,
        Category::Professional,
        Category::Other,
    ];

    /// Value of the `apiType` query parameter.
    pub fn api_type(self) -> &'static str {
        match self {
            Category::Youth => "youApi",
            Category::Equality => "equApi",
            Category::Family => "famApi",
            Category::Professional => "proApi",
            Category::Other => "othApi",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_type())
    }
}

/// One item of an API page, with every absent or null field already defaulted.
///
/// `registered_date` and `inquiry_count` stay raw here; the normalizer owns
/// their coercion.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PolicyRecord {
    #[serde(rename = "chrgrNm", default, deserialize_with = "text_or_empty")]
    pub charger_name: String,
    #[serde(rename = "deptNm", default, deserialize_with = "text_or_empty")]
    pub department_name: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub title: String,
    #[serde(rename = "regDt", default, deserialize_with = "text_or_empty")]
    pub registered_date: String,
    #[serde(rename = "cont", default, deserialize_with = "text_or_empty")]
    pub content: String,
    #[serde(rename = "telNo", default, deserialize_with = "text_or_empty")]
    pub phone_number: String,
    #[serde(rename = "inqCnt", default = "zero_count", deserialize_with = "count_or_zero")]
    pub inquiry_count: Value,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub url: String,
}

impl Default for PolicyRecord {
    fn default() -> Self {
        PolicyRecord {
            charger_name: String::new(),
            department_name: String::new(),
            title: String::new(),
            registered_date: String::new(),
            content: String::new(),
            phone_number: String::new(),
            inquiry_count: zero_count(),
            url: String::new(),
        }
    }
}

fn zero_count() -> Value {
    Value::from(0)
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

fn count_or_zero<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => zero_count(),
        Some(v) => v,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_fields_take_defaults() {
        let r: PolicyRecord = serde_json::from_value(json!({ "url": "http://x" })).unwrap();
        assert_eq!(r.url, "http://x");
        assert_eq!(r.title, "");
        assert_eq!(r.registered_date, "");
        assert_eq!(r.inquiry_count, json!(0));
    }

    #[test]
    fn null_fields_take_defaults() {
        let r: PolicyRecord = serde_json::from_value(json!({
            "url": "http://x",
            "title": null,
            "inqCnt": null,
        }))
        .unwrap();
        assert_eq!(r.title, "");
        assert_eq!(r.inquiry_count, json!(0));
    }

    #[test]
    fn scalar_text_fields_are_stringified() {
        let r: PolicyRecord = serde_json::from_value(json!({
            "telNo": 21234567,
            "deptNm": true,
            "inqCnt": "17",
        }))
        .unwrap();
        assert_eq!(r.phone_number, "21234567");
        assert_eq!(r.department_name, "true");
        // left raw for the normalizer
        assert_eq!(r.inquiry_count, json!("17"));
    }

    #[test]
    fn source_keys_map_to_fields() {
        let r: PolicyRecord = serde_json::from_value(json!({
            "chrgrNm": "Kim",
            "deptNm": "Youth Policy Division",
            "title": "Youth housing support",
            "regDt": "2024-03-01",
            "cont": "Details",
            "telNo": "02-123-4567",
            "inqCnt": 42,
            "url": "http://example.go.kr/1",
            "unknownKey": "ignored",
        }))
        .unwrap();
        assert_eq!(r.charger_name, "Kim");
        assert_eq!(r.content, "Details");
        assert_eq!(r.inquiry_count, json!(42));
    }

    #[test]
    fn mode_page_ranges() {
        assert_eq!(LoadMode::Full.pages(), 1..=99);
        assert_eq!(LoadMode::Incremental.pages(), 1..=2);
    }

    #[test]
    fn categories_in_scan_order() {
        let types: Vec<&str> = Category::ALL.iter().map(|c| c.api_type()).collect();
        assert_eq!(types, ["youApi", "equApi", "famApi", "proApi", "othApi"]);
    }
}
