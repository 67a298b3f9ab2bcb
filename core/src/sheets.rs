use std::time::Duration;

use anyhow::{Context, Result};

use crate::cache::SheetCache;
use crate::table::Table;

/// The remote spreadsheet seam. The CLI implements this against the Google
/// Sheets REST API; tests implement it with an in-memory map.
pub trait SheetBackend: Send + Sync {
    /// Fetch all rows of the named sheet (header + data).
    fn fetch(&self, sheet: &str) -> Result<Table>;

    /// Replace the entire remote sheet content with `table`.
    fn replace(&self, sheet: &str, table: &Table) -> Result<()>;
}

/// The remote API's per-minute request quota was exceeded. Callers downcast
/// to this through the anyhow chain to apply the pause-and-retry policy.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("spreadsheet API quota exceeded")]
pub struct QuotaExceeded;

#[must_use]
pub fn is_quota_exceeded(err: &anyhow::Error) -> bool {
    err.downcast_ref::<QuotaExceeded>().is_some()
}

/// Cache freshness and quota-pause policy. The freshness window is a tunable
/// knob, not a contract.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    /// Serve cached data younger than this without a remote fetch.
    pub fresh_for: Duration,
    /// How long to pause after a quota-exceeded response before retrying.
    pub quota_pause: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            fresh_for: Duration::from_secs(5 * 60),
            quota_pause: Duration::from_secs(30),
        }
    }
}

/// Rate-limit-aware sheet access: loads go through the local CSV cache,
/// saves replace the remote sheet and invalidate the cache entry.
///
/// Every UI interaction used to re-fetch each dataset, which blows the
/// remote per-minute quota; the freshness window keeps repeat loads local.
pub struct SheetClient {
    backend: Box<dyn SheetBackend>,
    cache: SheetCache,
    policy: CachePolicy,
}

impl SheetClient {
    #[must_use]
    pub fn new(backend: Box<dyn SheetBackend>, cache: SheetCache, policy: CachePolicy) -> Self {
        Self {
            backend,
            cache,
            policy,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &SheetCache {
        &self.cache
    }

    /// Load a sheet, serving the cache while it is fresh. On staleness or
    /// miss, fetch remotely and rewrite the cache file. A quota-exceeded
    /// fetch warns, pauses once, and retries; if the retry also hits the
    /// quota, stale cached data is served when any exists.
    pub fn load(&self, sheet: &str) -> Result<Table> {
        if let Some(age) = self.cache.age(sheet)? {
            if age < self.policy.fresh_for {
                return self.cache.read(sheet);
            }
        }

        let table = match self.fetch_with_pause(sheet) {
            Ok(table) => table,
            Err(err) if is_quota_exceeded(&err) && self.cache.exists(sheet) => {
                eprintln!("Warning: quota still exceeded, serving stale cache for '{sheet}'");
                return self.cache.read(sheet);
            }
            Err(err) => return Err(err),
        };

        self.cache
            .write(sheet, &table)
            .with_context(|| format!("Failed to cache sheet '{sheet}'"))?;
        Ok(table)
    }

    /// Replace the full remote sheet, then invalidate the cache entry so the
    /// next load re-fetches authoritative data.
    pub fn save(&self, sheet: &str, table: &Table) -> Result<()> {
        self.backend
            .replace(sheet, table)
            .with_context(|| format!("Failed to update sheet '{sheet}'"))?;
        self.cache.invalidate(sheet)
    }

    fn fetch_with_pause(&self, sheet: &str) -> Result<Table> {
        match self.backend.fetch(sheet) {
            Err(err) if is_quota_exceeded(&err) => {
                let secs = self.policy.quota_pause.as_secs();
                eprintln!(
                    "Warning: spreadsheet API quota exceeded, pausing {secs}s before retrying"
                );
                std::thread::sleep(self.policy.quota_pause);
                self.backend.fetch(sheet)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::table::empty_schema;

    /// In-memory backend with a fetch counter, per the cache contracts.
    #[derive(Default)]
    struct MockBackend {
        sheets: Mutex<HashMap<String, Table>>,
        fetches: AtomicUsize,
        quota_failures: AtomicUsize,
    }

    impl MockBackend {
        fn with_sheet(sheet: &str, table: Table) -> Arc<Self> {
            let backend = Arc::new(Self::default());
            backend
                .sheets
                .lock()
                .unwrap()
                .insert(sheet.to_string(), table);
            backend
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        fn fail_next_fetches(&self, n: usize) {
            self.quota_failures.store(n, Ordering::SeqCst);
        }
    }

    impl SheetBackend for Arc<MockBackend> {
        fn fetch(&self, sheet: &str) -> Result<Table> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self
                .quota_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(QuotaExceeded.into());
            }
            Ok(self
                .sheets
                .lock()
                .unwrap()
                .get(sheet)
                .cloned()
                .unwrap_or_else(|| empty_schema(sheet)))
        }

        fn replace(&self, sheet: &str, table: &Table) -> Result<()> {
            self.sheets
                .lock()
                .unwrap()
                .insert(sheet.to_string(), table.clone());
            Ok(())
        }
    }

    fn weight_table(rows: &[(&str, &str)]) -> Table {
        let mut t = empty_schema("weight_log_bela");
        for (date, weight) in rows {
            t.push_row(vec![(*date).to_string(), (*weight).to_string()])
                .unwrap();
        }
        t
    }

    fn client_with(
        backend: &Arc<MockBackend>,
        policy: CachePolicy,
    ) -> (tempfile::TempDir, SheetClient) {
        let dir = tempfile::tempdir().unwrap();
        let cache = SheetCache::new(dir.path()).unwrap();
        let client = SheetClient::new(Box::new(Arc::clone(backend)), cache, policy);
        (dir, client)
    }

    fn fresh_policy() -> CachePolicy {
        CachePolicy {
            fresh_for: Duration::from_secs(300),
            quota_pause: Duration::ZERO,
        }
    }

    /// Every cache file is already stale, but still present for fallback.
    fn always_stale_policy() -> CachePolicy {
        CachePolicy {
            fresh_for: Duration::ZERO,
            quota_pause: Duration::ZERO,
        }
    }

    #[test]
    fn test_load_within_window_fetches_once() {
        let backend = MockBackend::with_sheet("weight_log_bela", weight_table(&[("2024-01-01", "90.5")]));
        let (_dir, client) = client_with(&backend, fresh_policy());

        let first = client.load("weight_log_bela").unwrap();
        let second = client.load("weight_log_bela").unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.fetch_count(), 1);
    }

    #[test]
    fn test_save_invalidates_cache() {
        let before = weight_table(&[("2024-01-01", "90.5")]);
        let backend = MockBackend::with_sheet("weight_log_bela", before.clone());
        let (_dir, client) = client_with(&backend, fresh_policy());

        assert_eq!(client.load("weight_log_bela").unwrap(), before);

        let after = weight_table(&[("2024-01-01", "90.5"), ("2024-01-02", "90.1")]);
        client.save("weight_log_bela", &after).unwrap();

        // A load immediately after a save must not return pre-save content.
        assert_eq!(client.load("weight_log_bela").unwrap(), after);
        assert_eq!(backend.fetch_count(), 2);
    }

    #[test]
    fn test_quota_pause_then_retry_succeeds() {
        let table = weight_table(&[("2024-01-01", "90.5")]);
        let backend = MockBackend::with_sheet("weight_log_bela", table.clone());
        let (_dir, client) = client_with(&backend, fresh_policy());
        backend.fail_next_fetches(1);

        assert_eq!(client.load("weight_log_bela").unwrap(), table);
        assert_eq!(backend.fetch_count(), 2);
    }

    #[test]
    fn test_quota_falls_back_to_stale_cache() {
        let table = weight_table(&[("2024-01-01", "90.5")]);
        let backend = MockBackend::with_sheet("weight_log_bela", table.clone());
        let (_dir, client) = client_with(&backend, always_stale_policy());

        // Prime the cache file, then make the quota persist through the retry.
        client.load("weight_log_bela").unwrap();
        backend.fail_next_fetches(2);

        assert_eq!(client.load("weight_log_bela").unwrap(), table);
        assert_eq!(backend.fetch_count(), 3);
    }

    #[test]
    fn test_quota_propagates_without_cache() {
        let backend =
            MockBackend::with_sheet("weight_log_bela", weight_table(&[("2024-01-01", "90.5")]));
        let (_dir, client) = client_with(&backend, fresh_policy());
        backend.fail_next_fetches(2);

        let err = client.load("weight_log_bela").unwrap_err();
        assert!(is_quota_exceeded(&err));
    }

    #[test]
    fn test_quota_error_detection() {
        let err: anyhow::Error = QuotaExceeded.into();
        assert!(is_quota_exceeded(&err));
        let other = anyhow::anyhow!("network down");
        assert!(!is_quota_exceeded(&other));
    }

    #[test]
    fn test_missing_sheet_loads_empty_schema() {
        let backend = Arc::new(MockBackend::default());
        let (_dir, client) = client_with(&backend, fresh_policy());
        let table = client.load("food_log_bela").unwrap();
        assert_eq!(
            table.columns(),
            ["date", "meal", "name", "quantity", "serving"]
        );
        assert!(table.is_empty());
    }
}
