use crate::builders::properties::parse_properties;
use crate::core::error::{ConfigurationError, Result, require_non_empty};
use crate::core::trace;
use parking_lot::{Mutex, RwLock, const_mutex};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{Level, trace};

/// Name of the bootstrap properties file searched for from the working directory upward.
pub const PROPERTIES_FILENAME: &str = "testscope.properties";

/// Environment variable naming an explicit properties file, bypassing the search.
pub const PROPERTIES_OVERRIDE_ENV: &str = "TESTSCOPE_PROPERTIES";

/// Well-known configuration keys.
pub mod keys {
    /// Absolute path of the properties file the registry was bootstrapped from.
    pub const PROPERTIES_PATH: &str = super::PROPERTIES_FILENAME;
    /// Path of the YAML filter definitions file.
    pub const FILTER_DEFINITIONS_FILENAME: &str = "testscope.engine.filter.definitions.filename";
    /// Classpath listing used instead of the `CLASSPATH` environment variable.
    pub const CLASSPATH: &str = "testscope.engine.classpath";
}

static GLOBAL: OnceLock<Arc<ConfigurationStore>> = OnceLock::new();
static GLOBAL_INIT: Mutex<()> = const_mutex(());

/// Thread-safe, sorted key/value registry.
///
/// One fair reader/writer lock guards the whole mapping: lookups take the read
/// lock, mutations take the write lock. Keys are always stored trimmed and are
/// never empty.
#[derive(Default)]
pub struct ConfigurationStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl ConfigurationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store holding the valid entries of `entries` (see [`merge_map`](Self::merge_map)).
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let store = Self::new();
        store.merge_map(entries);
        store
    }

    /// The process-wide registry.
    ///
    /// Loaded from the bootstrap properties file on first access and kept for
    /// the lifetime of the process. A load failure is returned to the caller and
    /// the next access retries.
    pub fn global() -> Result<Arc<ConfigurationStore>> {
        if let Some(store) = GLOBAL.get() {
            return Ok(Arc::clone(store));
        }

        let _guard = GLOBAL_INIT.lock();
        if let Some(store) = GLOBAL.get() {
            return Ok(Arc::clone(store));
        }

        trace::init();
        let loaded = ConfigurationLoader::from_env()?.load()?;
        Ok(Arc::clone(GLOBAL.get_or_init(|| Arc::new(loaded))))
    }

    /// Stores `value` under the trimmed `key`, returning the previous value.
    /// The value is stored as given.
    pub fn put(&self, key: &str, value: impl Into<String>) -> Result<Option<String>> {
        let key = require_non_empty(key, "key")?;
        Ok(self.entries.write().insert(key.to_string(), value.into()))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let key = require_non_empty(key, "key")?;
        Ok(self.entries.read().get(key).cloned())
    }

    /// Same lookup as [`get`](Self::get), for callers that treat every value as optional.
    pub fn get_optional(&self, key: &str) -> Result<Option<String>> {
        self.get(key)
    }

    /// Computes and stores a value for `key` if none is present.
    ///
    /// `transform` runs with no lock held, so it may read or write this store.
    /// If another caller stores a value for `key` in the meantime, that value
    /// is kept and returned. A transform that returns `None` leaves the key
    /// absent.
    pub fn compute_if_absent<F>(&self, key: &str, transform: F) -> Result<Option<String>>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let key = require_non_empty(key, "key")?;
        if let Some(existing) = self.entries.read().get(key) {
            return Ok(Some(existing.clone()));
        }

        let Some(computed) = transform(key) else {
            return Ok(None);
        };
        let mut entries = self.entries.write();
        Ok(Some(entries.entry(key.to_string()).or_insert(computed).clone()))
    }

    pub fn contains_key(&self, key: &str) -> Result<bool> {
        let key = require_non_empty(key, "key")?;
        Ok(self.entries.read().contains_key(key))
    }

    pub fn remove(&self, key: &str) -> Result<Option<String>> {
        let key = require_non_empty(key, "key")?;
        Ok(self.entries.write().remove(key))
    }

    pub fn remove_optional(&self, key: &str) -> Result<Option<String>> {
        self.remove(key)
    }

    pub fn size(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn clear(&self) -> &Self {
        self.entries.write().clear();
        self
    }

    /// Sorted snapshot of the keys. Later mutations are not reflected.
    pub fn key_set(&self) -> BTreeSet<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Sorted snapshot of every entry.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().clone()
    }

    /// Copies every entry whose key and value are both non-blank, trimming both.
    /// Other entries are skipped.
    pub fn merge_map<I, K, V>(&self, entries: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        merge_valid(&mut self.entries.write(), entries);
        self
    }

    /// Copies every entry of `other` into this store, values as-is.
    ///
    /// Lock order: `other`'s read lock, then this store's write lock, released
    /// in reverse. Every cross-store operation in this module follows that order.
    pub fn merge(&self, other: &ConfigurationStore) -> &Self {
        if std::ptr::eq(self, other) {
            return self;
        }

        let source = other.entries.read();
        let mut target = self.entries.write();
        target.extend(source.iter().map(|(k, v)| (k.clone(), v.clone())));
        drop(target);
        drop(source);
        self
    }

    /// Clears the store and merges `entries` as one critical section.
    pub fn replace_map<I, K, V>(&self, entries: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut target = self.entries.write();
        target.clear();
        merge_valid(&mut target, entries);
        self
    }

    /// Replaces this store's content with a copy of `other`'s as one critical section.
    pub fn replace(&self, other: &ConfigurationStore) -> &Self {
        if std::ptr::eq(self, other) {
            return self;
        }

        let source = other.entries.read();
        let mut target = self.entries.write();
        target.clone_from(&*source);
        drop(target);
        drop(source);
        self
    }

    /// Independent copy of the current content with its own lock.
    pub fn duplicate(&self) -> ConfigurationStore {
        ConfigurationStore {
            entries: RwLock::new(self.entries.read().clone()),
        }
    }
}

fn merge_valid<I, K, V>(target: &mut BTreeMap<String, String>, entries: I)
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    for (key, value) in entries {
        let key = key.as_ref().trim();
        let value = value.as_ref().trim();
        if !key.is_empty() && !value.is_empty() {
            target.insert(key.to_string(), value.to_string());
        }
    }
}

impl PartialEq for ConfigurationStore {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.snapshot() == other.snapshot()
    }
}

impl Eq for ConfigurationStore {}

impl fmt::Debug for ConfigurationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationStore")
            .field("entries", &*self.entries.read())
            .finish()
    }
}

impl fmt::Display for ConfigurationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.entries.read().iter() {
            writeln!(f, "{key} = {value}")?;
        }
        Ok(())
    }
}

/// Read-only view of a store with typed accessors.
pub struct ConfigurationParameters<'a> {
    store: &'a ConfigurationStore,
}

impl<'a> ConfigurationParameters<'a> {
    pub fn new(store: &'a ConfigurationStore) -> Self {
        Self { store }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.get(key)
    }

    /// `Some(true)` only for the exact value `true`.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self.store.get(key)?.map(|value| value == "true"))
    }

    pub fn get_with<T, F>(&self, key: &str, transform: F) -> Result<Option<T>>
    where
        F: FnOnce(&str) -> Option<T>,
    {
        Ok(self.store.get(key)?.and_then(|value| transform(&value)))
    }

    pub fn size(&self) -> usize {
        self.store.size()
    }

    pub fn key_set(&self) -> BTreeSet<String> {
        self.store.key_set()
    }
}

pub trait ConfigurationSource {
    /// Resolves the properties file to load, if any.
    ///
    /// An explicit override path is returned as given, made absolute, without
    /// checking that it exists; [`load`](Self::load) reports a missing file.
    fn locate(&self) -> Result<Option<PathBuf>>;
    /// Builds a store from the located file. No file yields an empty store.
    fn load(&self) -> Result<ConfigurationStore>;
}

/// Locates and reads the bootstrap properties file.
#[derive(Debug, Clone)]
pub struct ConfigurationLoader {
    override_path: Option<PathBuf>,
    search_start: PathBuf,
}

impl ConfigurationLoader {
    /// A loader searching upward from `search_start`.
    pub fn new(search_start: impl Into<PathBuf>) -> Self {
        Self {
            override_path: None,
            search_start: search_start.into(),
        }
    }

    /// Loads `path` instead of searching. A missing file is then a load error.
    pub fn with_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    /// A loader for the current process: the working directory as search start
    /// and `TESTSCOPE_PROPERTIES` as override.
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir().map_err(ConfigurationError::WorkingDirectory)?;
        let loader = Self::new(cwd);
        Ok(match std::env::var_os(PROPERTIES_OVERRIDE_ENV) {
            Some(path) if !path.is_empty() => loader.with_override(path),
            _ => loader,
        })
    }
}

impl ConfigurationSource for ConfigurationLoader {
    fn locate(&self) -> Result<Option<PathBuf>> {
        match &self.override_path {
            Some(path) => std::path::absolute(path)
                .map(Some)
                .map_err(|source| ConfigurationError::Load {
                    path: path.clone(),
                    source,
                }),
            None => Ok(find_upward(&self.search_start, PROPERTIES_FILENAME)),
        }
    }

    fn load(&self) -> Result<ConfigurationStore> {
        trace!("load configuration");
        let store = ConfigurationStore::new();

        match self.locate()? {
            Some(path) => {
                trace!("loading [{}]", path.display());
                let content =
                    fs::read_to_string(&path).map_err(|source| ConfigurationError::Load {
                        path: path.clone(),
                        source,
                    })?;
                trace!("loaded [{}]", path.display());

                let mut entries = store.entries.write();
                for (key, value) in parse_properties(&content) {
                    let key = key.trim();
                    if !key.is_empty() {
                        entries.insert(key.to_string(), value);
                    }
                }
                entries.insert(keys::PROPERTIES_PATH.to_string(), path.display().to_string());
            }
            None => trace!("no configuration properties file found"),
        }

        if tracing::enabled!(Level::TRACE) {
            for (key, value) in store.snapshot() {
                trace!("configuration property [{key}] = [{value}]");
            }
        }

        Ok(store)
    }
}

/// Looks for `filename` in `start` and then in each parent directory up to the
/// filesystem root. Returns the first readable regular file.
pub fn find_upward(start: &Path, filename: &str) -> Option<PathBuf> {
    let start = fs::canonicalize(start)
        .or_else(|_| std::path::absolute(start))
        .ok()?;
    let mut dir = start.as_path();

    loop {
        trace!("searching path [{}]", dir.display());
        let candidate = dir.join(filename);
        if candidate.is_file() && fs::File::open(&candidate).is_ok() {
            trace!("found [{}]", candidate.display());
            return Some(candidate);
        }

        match dir.parent() {
            Some(parent) => dir = parent,
            None => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_put_get_trims_key() {
        let store = ConfigurationStore::new();
        assert_eq!(store.put("  alpha ", " one ").unwrap(), None);
        assert_eq!(store.get("alpha").unwrap().as_deref(), Some(" one "));
        assert_eq!(store.get_optional(" alpha").unwrap().as_deref(), Some(" one "));
        assert_eq!(store.key_set().into_iter().collect::<Vec<_>>(), vec!["alpha"]);
    }

    #[test]
    fn test_size_counts_new_keys_only() {
        let store = ConfigurationStore::new();
        store.put("a", "1").unwrap();
        assert_eq!(store.size(), 1);
        assert_eq!(store.put("a", "2").unwrap().as_deref(), Some("1"));
        assert_eq!(store.size(), 1);
        store.put("b", "").unwrap();
        assert_eq!(store.size(), 2);
    }

    #[test]
    fn test_blank_key_is_rejected_without_mutation() {
        let store = ConfigurationStore::new();
        assert!(matches!(
            store.put("   ", "x"),
            Err(ConfigurationError::InvalidArgument(_))
        ));
        assert!(store.get("").is_err());
        assert!(store.contains_key(" ").is_err());
        assert!(store.remove("").is_err());
        assert!(store.compute_if_absent("", |_| Some("x".into())).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_compute_if_absent() {
        let store = ConfigurationStore::new();
        let value = store
            .compute_if_absent(" key ", |key| Some(format!("{key}-computed")))
            .unwrap();
        assert_eq!(value.as_deref(), Some("key-computed"));

        let value = store
            .compute_if_absent("key", |_| panic!("must not run for a present key"))
            .unwrap();
        assert_eq!(value.as_deref(), Some("key-computed"));

        assert_eq!(store.compute_if_absent("other", |_| None).unwrap(), None);
        assert!(!store.contains_key("other").unwrap());
    }

    #[test]
    fn test_compute_if_absent_transform_can_use_the_store() {
        let store = Arc::new(ConfigurationStore::with_entries([("base", "/opt/app")]));
        let (sender, receiver) = mpsc::channel();

        let worker = Arc::clone(&store);
        thread::spawn(move || {
            let value = worker.compute_if_absent("derived", |_| {
                let base = worker.get("base").ok().flatten()?;
                worker.put("touched", "yes").ok()?;
                Some(format!("{base}/lib"))
            });
            let _ = sender.send(value);
        });

        let value = receiver
            .recv_timeout(Duration::from_secs(5))
            .expect("transform blocked on the store lock")
            .unwrap();
        assert_eq!(value.as_deref(), Some("/opt/app/lib"));
        assert_eq!(store.get("derived").unwrap().as_deref(), Some("/opt/app/lib"));
        assert_eq!(store.get("touched").unwrap().as_deref(), Some("yes"));
    }

    #[test]
    fn test_compute_if_absent_keeps_a_value_stored_during_transform() {
        let store = ConfigurationStore::new();
        let value = store
            .compute_if_absent("key", |key| {
                store.put(key, "first").ok()?;
                Some("second".to_string())
            })
            .unwrap();
        assert_eq!(value.as_deref(), Some("first"));
        assert_eq!(store.get("key").unwrap().as_deref(), Some("first"));
    }

    #[test]
    fn test_remove_variants() {
        let store = ConfigurationStore::with_entries([("a", "1"), ("b", "2")]);
        assert_eq!(store.remove(" a ").unwrap().as_deref(), Some("1"));
        assert_eq!(store.remove_optional("a").unwrap(), None);
        assert_eq!(store.remove_optional("b").unwrap().as_deref(), Some("2"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_merge_map_skips_blank_entries() {
        let store = ConfigurationStore::new();
        store.merge_map([("a", "1"), ("", "2"), ("b", ""), ("  ", "3"), ("c", "   ")]);
        assert_eq!(store.snapshot(), BTreeMap::from([("a".to_string(), "1".to_string())]));
    }

    #[test]
    fn test_merge_map_trims_both_sides() {
        let store = ConfigurationStore::new();
        store.merge_map([(" key ", " value ")]);
        assert_eq!(store.get("key").unwrap().as_deref(), Some("value"));
    }

    #[test]
    fn test_merge_store_keeps_values_as_is() {
        let source = ConfigurationStore::new();
        source.put("a", " padded ").unwrap();
        let target = ConfigurationStore::with_entries([("b", "2")]);

        target.merge(&source);
        assert_eq!(target.size(), 2);
        assert_eq!(target.get("a").unwrap().as_deref(), Some(" padded "));

        // Merging a store into itself is a no-op.
        target.merge(&target);
        assert_eq!(target.size(), 2);
    }

    #[test]
    fn test_key_set_is_a_sorted_snapshot() {
        let store = ConfigurationStore::with_entries([("zeta", "1"), ("alpha", "2"), ("mid", "3")]);
        let keys = store.key_set();
        store.put("beta", "4").unwrap();
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_duplicate_is_independent() {
        let original = ConfigurationStore::with_entries([("a", "1")]);
        let copy = original.duplicate();
        assert_eq!(copy, original);

        copy.put("b", "2").unwrap();
        original.put("a", "changed").unwrap();
        assert!(!original.contains_key("b").unwrap());
        assert_eq!(copy.get("a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_replace_discards_prior_content() {
        let store = ConfigurationStore::with_entries([("old", "x"), ("a", "0")]);
        store.replace_map([("a", "1"), ("b", " ")]);
        assert_eq!(store.snapshot(), BTreeMap::from([("a".to_string(), "1".to_string())]));

        let other = ConfigurationStore::with_entries([("c", "3")]);
        store.replace(&other);
        assert_eq!(store, other);

        store.replace(&store);
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let store = ConfigurationStore::new();
        thread::scope(|scope| {
            for worker in 0..4 {
                let store = &store;
                scope.spawn(move || {
                    for i in 0..250 {
                        store.put(&format!("w{worker}.k{i}"), i.to_string()).unwrap();
                    }
                });
            }
            for _ in 0..4 {
                let store = &store;
                scope.spawn(move || {
                    for _ in 0..250 {
                        let keys = store.key_set();
                        assert!(keys.iter().all(|key| key == key.trim()));
                    }
                });
            }
        });
        assert_eq!(store.size(), 1000);
    }

    #[test]
    fn test_parameters_typed_access() {
        let store = ConfigurationStore::with_entries([("flag", "true"), ("other", "TRUE"), ("n", "42")]);
        let parameters = ConfigurationParameters::new(&store);
        assert_eq!(parameters.get_bool("flag").unwrap(), Some(true));
        assert_eq!(parameters.get_bool("other").unwrap(), Some(false));
        assert_eq!(parameters.get_bool("missing").unwrap(), None);
        assert_eq!(parameters.get_with("n", |v| v.parse::<u32>().ok()).unwrap(), Some(42));
        assert_eq!(parameters.size(), 3);
    }

    #[test]
    fn test_find_upward_in_grandparent() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(PROPERTIES_FILENAME), "key=value\n").unwrap();

        let loader = ConfigurationLoader::new(&nested);
        let store = loader.load().unwrap();
        assert_eq!(store.get("key").unwrap().as_deref(), Some("value"));

        let recorded = PathBuf::from(store.get(keys::PROPERTIES_PATH).unwrap().unwrap());
        assert!(recorded.is_absolute());
        assert_eq!(
            fs::canonicalize(recorded).unwrap(),
            fs::canonicalize(dir.path().join(PROPERTIES_FILENAME)).unwrap()
        );
    }

    #[test]
    fn test_directory_with_the_file_name_is_skipped() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("child");
        fs::create_dir_all(nested.join(PROPERTIES_FILENAME)).unwrap();
        fs::write(dir.path().join(PROPERTIES_FILENAME), "found=parent\n").unwrap();

        let store = ConfigurationLoader::new(&nested).load().unwrap();
        assert_eq!(store.get("found").unwrap().as_deref(), Some("parent"));
    }

    #[test]
    fn test_no_file_yields_empty_store() {
        let dir = tempdir().unwrap();
        let loader = ConfigurationLoader::new(dir.path());
        assert_eq!(loader.locate().unwrap(), None);
        assert!(loader.load().unwrap().is_empty());
    }

    #[test]
    fn test_override_path_wins() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(PROPERTIES_FILENAME), "source=search\n").unwrap();
        let explicit = dir.path().join("explicit.properties");
        fs::write(&explicit, "source=override\n").unwrap();

        let store = ConfigurationLoader::new(dir.path())
            .with_override(&explicit)
            .load()
            .unwrap();
        assert_eq!(store.get("source").unwrap().as_deref(), Some("override"));
    }

    #[test]
    fn test_locate_returns_override_without_checking_it_exists() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.properties");
        let loader = ConfigurationLoader::new(dir.path()).with_override(&missing);

        let located = loader.locate().unwrap().unwrap();
        assert!(located.is_absolute());
        assert!(located.ends_with("absent.properties"));
        assert!(!located.exists());
    }

    #[test]
    fn test_missing_override_is_a_load_error() {
        let dir = tempdir().unwrap();
        let result = ConfigurationLoader::new(dir.path())
            .with_override(dir.path().join("absent.properties"))
            .load();
        assert!(matches!(result, Err(ConfigurationError::Load { .. })));
    }
}
