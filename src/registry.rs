// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Cache of loaded classifiers keyed by weights path.
//!
//! A service that answers many requests against the same checkpoint loads it
//! once and shares the read-only classifier. [`ClassifierRegistry::global`]
//! is the process-wide instance; tests and embedders can build their own.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use lru::LruCache;

use crate::classifier::SignClassifier;
use crate::error::{Result, SignError};
use crate::inference::ClassifierConfig;
use crate::labels::LabelVocabulary;
use crate::verbose;

/// Classifiers kept by the global registry.
pub const DEFAULT_CAPACITY: usize = 4;

static GLOBAL_REGISTRY: OnceLock<ClassifierRegistry> = OnceLock::new();

/// Init-once store of classifiers, least recently used evicted first.
#[derive(Debug)]
pub struct ClassifierRegistry {
    cache: Mutex<LruCache<PathBuf, Arc<SignClassifier>>>,
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        Self::new(NonZeroUsize::MIN.saturating_add(DEFAULT_CAPACITY - 1))
    }
}

impl ClassifierRegistry {
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Process-wide registry, created on first use.
    pub fn global() -> &'static Self {
        GLOBAL_REGISTRY.get_or_init(Self::default)
    }

    /// Classifier for `weights`, loading it on first request.
    ///
    /// Later calls for the same path return the cached instance and ignore
    /// `config`. The load runs under the registry lock, so concurrent first
    /// requests load once.
    ///
    /// # Errors
    ///
    /// Returns the load error on first request, or [`SignError::ConfigError`]
    /// if the path is cached with a different vocabulary.
    pub fn get_or_load<P: AsRef<Path>>(
        &self,
        weights: P,
        labels: &LabelVocabulary,
        config: &ClassifierConfig,
    ) -> Result<Arc<SignClassifier>> {
        let key = Self::key(weights.as_ref());
        let mut cache = self.lock()?;
        if let Some(classifier) = cache.get(&key) {
            if classifier.labels() != labels {
                return Err(SignError::ConfigError(format!(
                    "{} is already loaded with a different vocabulary",
                    key.display()
                )));
            }
            return Ok(Arc::clone(classifier));
        }

        let classifier = Arc::new(SignClassifier::load(&key, labels.clone(), config.clone())?);
        if let Some((evicted, _)) = cache.push(key, Arc::clone(&classifier)) {
            verbose!("Evicted classifier {}", evicted.display());
        }
        Ok(classifier)
    }

    /// Register an already built classifier under `weights`, replacing any entry.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ConfigError`] if the registry lock is poisoned.
    pub fn insert<P: AsRef<Path>>(&self, weights: P, classifier: SignClassifier) -> Result<Arc<SignClassifier>> {
        let classifier = Arc::new(classifier);
        self.lock()?.put(Self::key(weights.as_ref()), Arc::clone(&classifier));
        Ok(classifier)
    }

    /// Whether `weights` is cached.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ConfigError`] if the registry lock is poisoned.
    pub fn contains<P: AsRef<Path>>(&self, weights: P) -> Result<bool> {
        Ok(self.lock()?.contains(&Self::key(weights.as_ref())))
    }

    /// Number of cached classifiers.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ConfigError`] if the registry lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// # Errors
    ///
    /// Returns [`SignError::ConfigError`] if the registry lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Drop every cached classifier.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ConfigError`] if the registry lock is poisoned.
    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, LruCache<PathBuf, Arc<SignClassifier>>>> {
        self.cache
            .lock()
            .map_err(|_| SignError::ConfigError("Classifier registry lock poisoned".to_string()))
    }

    fn key(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ModelConfig, StGcnModel};

    fn save_model(dir: &Path, name: &str, classes: usize) -> PathBuf {
        let path = dir.join(name);
        StGcnModel::random(ModelConfig::new(classes), 1, &candle_core::Device::Cpu)
            .unwrap()
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_model(dir.path(), "a.safetensors", 8);
        let registry = ClassifierRegistry::default();
        let labels = LabelVocabulary::police_words();

        let first = registry.get_or_load(&path, &labels, &ClassifierConfig::new()).unwrap();
        let second = registry.get_or_load(&path, &labels, &ClassifierConfig::new()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len().unwrap(), 1);
        assert!(registry.contains(&path).unwrap());

        let err = registry
            .get_or_load(&path, &LabelVocabulary::emergency_words(), &ClassifierConfig::new())
            .unwrap_err();
        assert!(matches!(err, SignError::ConfigError(_)));
    }

    #[test]
    fn test_lru_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let a = save_model(dir.path(), "a.safetensors", 8);
        let b = save_model(dir.path(), "b.safetensors", 8);
        let registry = ClassifierRegistry::new(NonZeroUsize::MIN);
        let labels = LabelVocabulary::police_words();

        registry.get_or_load(&a, &labels, &ClassifierConfig::new()).unwrap();
        registry.get_or_load(&b, &labels, &ClassifierConfig::new()).unwrap();
        assert!(!registry.contains(&a).unwrap());
        assert!(registry.contains(&b).unwrap());

        registry.clear().unwrap();
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let registry = ClassifierRegistry::default();
        let result = registry.get_or_load(
            "missing.safetensors",
            &LabelVocabulary::emergency_words(),
            &ClassifierConfig::new(),
        );
        assert!(result.is_err());
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn test_poisoned_lock_is_reported() {
        let registry = Arc::new(ClassifierRegistry::default());
        let holder = Arc::clone(&registry);
        let panicked = std::thread::spawn(move || {
            let _guard = holder.cache.lock().unwrap();
            panic!("classifier load crashed while holding the registry");
        })
        .join();
        assert!(panicked.is_err());

        assert!(matches!(registry.len(), Err(SignError::ConfigError(_))));
        assert!(matches!(registry.is_empty(), Err(SignError::ConfigError(_))));
        assert!(matches!(registry.contains("a.safetensors"), Err(SignError::ConfigError(_))));
        assert!(matches!(registry.clear(), Err(SignError::ConfigError(_))));
    }

    #[test]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(ClassifierRegistry::global(), ClassifierRegistry::global()));
    }
}
