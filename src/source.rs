use std::cell::RefCell;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::Result;
use crate::models::{DateRange, RawDbRecord};

/// Where the ERP side of a run comes from.
///
/// `organization_id = None` fetches across all organizations.
pub trait DataSource {
    fn fetch(&self, range: &DateRange, organization_id: Option<i64>) -> Result<Vec<RawDbRecord>>;
}

impl<T: DataSource + ?Sized> DataSource for &T {
    fn fetch(&self, range: &DateRange, organization_id: Option<i64>) -> Result<Vec<RawDbRecord>> {
        (**self).fetch(range, organization_id)
    }
}

// ---------------------------------------------------------------------------
// Time-bounded cache
// ---------------------------------------------------------------------------

type CacheKey = (DateRange, Option<i64>);

/// Serves repeated fetches with identical parameters from memory while the
/// entry is younger than `ttl`. Failed fetches are never cached.
pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    entries: RefCell<HashMap<CacheKey, (Instant, Vec<RawDbRecord>)>>,
}

impl<S: DataSource> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RefCell::new(HashMap::new()),
        }
    }
}

impl<S: DataSource> DataSource for CachedSource<S> {
    fn fetch(&self, range: &DateRange, organization_id: Option<i64>) -> Result<Vec<RawDbRecord>> {
        let key = (*range, organization_id);
        if let Some((stored_at, rows)) = self.entries.borrow().get(&key) {
            if stored_at.elapsed() < self.ttl {
                debug!("cache hit for {}..{} org={organization_id:?}", range.start, range.end);
                return Ok(rows.clone());
            }
        }
        let rows = self.inner.fetch(range, organization_id)?;
        self.entries
            .borrow_mut()
            .insert(key, (Instant::now(), rows.clone()));
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Partial-failure boundary
// ---------------------------------------------------------------------------

pub struct FetchOutcome {
    pub records: Vec<RawDbRecord>,
    /// Set when the source failed and the run continues with no ERP records.
    pub warning: Option<String>,
}

/// Fetch once. Configuration and connectivity failures degrade to an empty
/// record set plus a warning; any other error is returned.
pub fn fetch_or_empty<S: DataSource + ?Sized>(
    source: &S,
    range: &DateRange,
    organization_id: Option<i64>,
) -> Result<FetchOutcome> {
    match source.fetch(range, organization_id) {
        Ok(records) => Ok(FetchOutcome {
            records,
            warning: None,
        }),
        Err(e) if e.is_data_source_failure() => {
            warn!("data source unavailable, continuing with no ERP records: {e}");
            Ok(FetchOutcome {
                records: Vec::new(),
                warning: Some(e.to_string()),
            })
        }
        Err(e) => Err(e),
    }
}
