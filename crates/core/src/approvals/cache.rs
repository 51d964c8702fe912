use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::config::ApprovalConfig;
use crate::domain::approval::DataApprovalKey;

/// Bounded existence cache for approval records.
///
/// Entries expire once they have not been read for `idle`. Any write to the
/// approval table must call [`ApprovalExistenceCache::invalidate_all`] both
/// before and after it touches the table. Loads take a [`CacheGeneration`]
/// before reading the database and store their answer through
/// [`ApprovalExistenceCache::insert_loaded`], which discards answers read
/// across an invalidation.
pub struct ApprovalExistenceCache {
    entries: Option<Mutex<Entries>>,
    idle: Duration,
}

struct Entries {
    values: LruCache<DataApprovalKey, CachedExistence>,
    generation: u64,
}

#[derive(Clone, Copy, Debug)]
struct CachedExistence {
    exists: bool,
    last_access: Instant,
}

/// Invalidation count observed when a load started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheGeneration(u64);

impl ApprovalExistenceCache {
    /// A capacity of zero disables caching; every lookup misses.
    pub fn new(capacity: usize, idle: Duration) -> Self {
        let entries = NonZeroUsize::new(capacity)
            .map(|capacity| Mutex::new(Entries { values: LruCache::new(capacity), generation: 0 }));
        Self { entries, idle }
    }

    pub fn from_config(config: &ApprovalConfig) -> Self {
        Self::new(config.cache_max_entries, Duration::from_secs(config.cache_idle_secs))
    }

    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub fn get(&self, key: &DataApprovalKey) -> Option<bool> {
        self.lookup_at(key, Instant::now())
    }

    /// Call before reading the database for a value that will be cached.
    pub fn generation(&self) -> CacheGeneration {
        CacheGeneration(self.lock().map_or(0, |guard| guard.generation))
    }

    /// Caches a loaded answer unless the cache was invalidated since `loaded_at`.
    pub fn insert_loaded(&self, key: DataApprovalKey, exists: bool, loaded_at: CacheGeneration) {
        self.insert_at(key, exists, loaded_at, Instant::now());
    }

    pub fn invalidate_all(&self) {
        if let Some(mut guard) = self.lock() {
            guard.values.clear();
            guard.generation = guard.generation.wrapping_add(1);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map_or(0, |guard| guard.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Option<MutexGuard<'_, Entries>> {
        let entries = self.entries.as_ref()?;
        Some(match entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        })
    }

    fn lookup_at(&self, key: &DataApprovalKey, now: Instant) -> Option<bool> {
        let mut guard = self.lock()?;

        let entry = guard.values.get_mut(key)?;
        if now.saturating_duration_since(entry.last_access) >= self.idle {
            guard.values.pop(key);
            return None;
        }

        entry.last_access = now;
        Some(entry.exists)
    }

    fn insert_at(
        &self,
        key: DataApprovalKey,
        exists: bool,
        loaded_at: CacheGeneration,
        now: Instant,
    ) {
        if let Some(mut guard) = self.lock() {
            if guard.generation != loaded_at.0 {
                return;
            }
            guard.values.put(key, CachedExistence { exists, last_access: now });
        }
    }
}

impl std::fmt::Debug for ApprovalExistenceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalExistenceCache")
            .field("enabled", &self.is_enabled())
            .field("len", &self.len())
            .field("idle", &self.idle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use chrono::NaiveDate;

    use super::{ApprovalExistenceCache, CacheGeneration};
    use crate::domain::approval::DataApprovalKey;
    use crate::domain::period::PeriodType;

    fn key(org_unit_id: i64) -> DataApprovalKey {
        DataApprovalKey {
            level_id: 1,
            workflow_id: 1,
            period_type: PeriodType::Monthly,
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).expect("date"),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 31).expect("date"),
            org_unit_id,
            attribute_option_combo_id: 1,
        }
    }

    fn insert(cache: &ApprovalExistenceCache, key: DataApprovalKey, exists: bool) {
        cache.insert_loaded(key, exists, cache.generation());
    }

    #[test]
    fn cached_answers_are_returned_until_invalidated() {
        let cache = ApprovalExistenceCache::new(10, Duration::from_secs(60));
        insert(&cache, key(1), true);
        insert(&cache, key(2), false);

        assert_eq!(cache.get(&key(1)), Some(true));
        assert_eq!(cache.get(&key(2)), Some(false));
        assert_eq!(cache.get(&key(3)), None);

        cache.invalidate_all();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key(1)), None);
    }

    #[test]
    fn capacity_bounds_entries() {
        let cache = ApprovalExistenceCache::new(2, Duration::from_secs(60));
        insert(&cache, key(1), true);
        insert(&cache, key(2), true);
        insert(&cache, key(3), true);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key(1)), None);
    }

    #[test]
    fn idle_entries_expire_and_reads_refresh_them() {
        let idle = Duration::from_secs(60);
        let cache = ApprovalExistenceCache::new(10, idle);
        let start = Instant::now();
        let generation = cache.generation();
        cache.insert_at(key(1), true, generation, start);
        cache.insert_at(key(2), true, generation, start);

        let later = start + Duration::from_secs(45);
        assert_eq!(cache.lookup_at(&key(1), later), Some(true));

        let expired = start + Duration::from_secs(61);
        assert_eq!(cache.lookup_at(&key(1), expired), Some(true));
        assert_eq!(cache.lookup_at(&key(2), expired), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let cache = ApprovalExistenceCache::disabled();
        insert(&cache, key(1), true);

        assert!(!cache.is_enabled());
        assert_eq!(cache.get(&key(1)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn answers_loaded_across_an_invalidation_are_discarded() {
        let cache = ApprovalExistenceCache::new(10, Duration::from_secs(60));
        let before_write = cache.generation();

        cache.invalidate_all();
        cache.insert_loaded(key(1), true, before_write);
        assert_eq!(cache.get(&key(1)), None);
        assert!(cache.is_empty());

        let after_write = cache.generation();
        assert_ne!(before_write, after_write);
        cache.insert_loaded(key(1), false, after_write);
        assert_eq!(cache.get(&key(1)), Some(false));
    }

    #[test]
    fn disabled_cache_reports_a_fixed_generation() {
        let cache = ApprovalExistenceCache::disabled();
        cache.invalidate_all();
        assert_eq!(cache.generation(), CacheGeneration(0));
    }
}
