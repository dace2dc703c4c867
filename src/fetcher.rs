use std::ops::RangeInclusive;

use indicatif::ProgressBar;
use reqwest::blocking::{Client, Request};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, FetchError};
use crate::model::{Category, PolicyRecord};
use crate::settings::{ApiSettings, ServiceKey};

const PAGE_SIZE: &str = "10";
const ITEMS_POINTER: &str = "/body/0/items/item";

/// Something that can return the raw body of one (category, page) of the policy API.
pub trait PageSource {
    fn fetch_page(&self, category: Category, page: u32) -> Result<String, FetchError>;
}

/// Blocking HTTP client for the policy subject list endpoint.
pub struct HttpPageSource {
    client: Client,
    base_url: String,
    service_key: ServiceKey,
}

impl HttpPageSource {
    pub fn new(settings: &ApiSettings) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(ConfigError::Client)?;
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            service_key: settings.service_key.clone(),
        })
    }

    fn request(&self, category: Category, page: u32) -> reqwest::Result<Request> {
        let page = page.to_string();
        self.client
            .get(&self.base_url)
            .query(&[
                ("serviceKey", self.service_key.expose()),
                ("type", "json"),
                ("numOFRows", PAGE_SIZE),
                ("apiType", category.api_type()),
                ("pageNo", page.as_str()),
            ])
            .build()
    }
}

impl PageSource for HttpPageSource {
    fn fetch_page(&self, category: Category, page: u32) -> Result<String, FetchError> {
        let resp = self.client.execute(self.request(category, page)?)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        Ok(resp.text()?)
    }
}

/// Extract the records of one page from `body[0].items.item`.
///
/// A missing or empty item list means the category has no more data and
/// yields an empty vec. Only unparseable bodies are errors.
pub fn parse_page(body: &str) -> Result<Vec<PolicyRecord>, FetchError> {
    let mut json: Value = serde_json::from_str(body)?;
    let items = json
        .pointer_mut(ITEMS_POINTER)
        .map(Value::take)
        .unwrap_or(Value::Null);

    match items {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.is_empty() => Ok(Vec::new()),
        // one-element lists come back collapsed to a bare object
        item @ Value::Object(_) => Ok(vec![serde_json::from_value(item)?]),
        items => Ok(serde_json::from_value(items)?),
    }
}

pub struct FetchOutcome {
    pub records: Vec<PolicyRecord>,
    pub pages_requested: usize,
    pub pages_failed: usize,
}

/// Walk every (category, page) pair in category-major order, one request at a time.
///
/// A failing page is logged and skipped; it never stops the walk.
pub fn fetch_records<S: PageSource + ?Sized>(
    source: &S,
    categories: &[Category],
    pages: RangeInclusive<u32>,
    progress: &ProgressBar,
) -> FetchOutcome {
    let mut records = Vec::new();
    let mut pages_requested = 0usize;
    let mut pages_failed = 0usize;

    for &category in categories {
        for page in pages.clone() {
            pages_requested += 1;
            match source
                .fetch_page(category, page)
                .and_then(|body| parse_page(&body))
            {
                Ok(items) if items.is_empty() => {
                    debug!(%category, page, "no items");
                }
                Ok(items) => {
                    debug!(%category, page, count = items.len(), "page fetched");
                    records.extend(items);
                }
                Err(e) => {
                    pages_failed += 1;
                    warn!(%category, page, error = %e, "skipping page");
                }
            }
            progress.inc(1);
        }
    }

    info!(
        records = records.len(),
        pages = pages_requested,
        failed = pages_failed,
        "fetch complete"
    );

    FetchOutcome {
        records,
        pages_requested,
        pages_failed,
    }
}
