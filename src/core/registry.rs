// LogTailer - core/registry.rs
//
// Severity scheme registry: the named schemes known to the engine plus the
// "current" scheme used for classification.
//
// Classification reads `current()` on every line without taking a lock; a
// scheme switch is a single pointer swap. Schemes are immutable, so a switch
// never alters lines that were already classified.

use crate::core::model::{DetectionWindow, SeverityScheme};
use crate::core::scheme;
use crate::util::constants;
use crate::util::error::SchemeError;
use arc_swap::ArcSwap;
use parking_lot::RwLock;
use std::sync::Arc;

pub struct SchemeRegistry {
    /// Registration order is preserved; index 0 is the fallback scheme.
    schemes: RwLock<Vec<Arc<SeverityScheme>>>,
    current: ArcSwap<SeverityScheme>,
}

impl SchemeRegistry {
    /// Create a registry holding `initial`, which also becomes current.
    ///
    /// `initial` must satisfy `scheme::validate_scheme`.
    pub fn new(initial: SeverityScheme) -> Result<Self, SchemeError> {
        scheme::validate_scheme(&initial)?;
        Ok(Self::holding(initial))
    }

    fn holding(initial: SeverityScheme) -> Self {
        let initial = Arc::new(initial);
        Self {
            schemes: RwLock::new(vec![Arc::clone(&initial)]),
            current: ArcSwap::new(initial),
        }
    }

    /// Create a registry holding the embedded built-in schemes.
    ///
    /// The first built-in is current. Falls back to a single plain scheme if
    /// none of the built-ins could be loaded.
    pub fn with_builtins() -> Self {
        let mut builtins = scheme::load_builtin_schemes().into_iter();
        let Some(first) = builtins.next() else {
            tracing::error!("No built-in schemes loaded; using plain classification");
            return Self::holding(SeverityScheme::plain());
        };
        // Built-ins were validated when compiled.
        let registry = Self::holding(first);
        for s in builtins {
            if let Err(e) = registry.register_scheme(s) {
                tracing::warn!(error = %e, "Skipping built-in scheme");
            }
        }
        registry
    }

    /// Build and store a scheme from `(tag, display name, colour)` triples.
    pub fn register(
        &self,
        name: &str,
        window: DetectionWindow,
        triples: &[(&str, &str, &str)],
    ) -> Result<Arc<SeverityScheme>, SchemeError> {
        let built = scheme::build_scheme(name, window.start, window.end, triples)?;
        self.register_scheme(built)
    }

    /// Validate and store an already-built scheme.
    ///
    /// A scheme with the same name as an existing one replaces it in place; if
    /// the replaced scheme was current, the replacement becomes current.
    pub fn register_scheme(&self, s: SeverityScheme) -> Result<Arc<SeverityScheme>, SchemeError> {
        scheme::validate_scheme(&s)?;
        let s = Arc::new(s);
        let mut schemes = self.schemes.write();

        if let Some(pos) = schemes.iter().position(|e| e.name == s.name) {
            let replaced = std::mem::replace(&mut schemes[pos], Arc::clone(&s));
            if Arc::ptr_eq(&self.current.load(), &replaced) {
                self.current.store(Arc::clone(&s));
            }
            tracing::info!(scheme = %s.name, "Scheme definition replaced");
            return Ok(s);
        }

        if schemes.len() >= constants::MAX_SCHEMES {
            return Err(SchemeError::RegistryFull {
                name: s.name.clone(),
                max: constants::MAX_SCHEMES,
            });
        }

        tracing::debug!(scheme = %s.name, levels = s.levels.len(), "Scheme registered");
        schemes.push(Arc::clone(&s));
        Ok(s)
    }

    /// Make the named scheme current.
    ///
    /// Unknown names fall back to the first registered scheme. Returns the
    /// scheme that is now current.
    pub fn set_current(&self, name: &str) -> Arc<SeverityScheme> {
        let chosen = {
            let schemes = self.schemes.read();
            match schemes.iter().find(|s| s.name == name) {
                Some(s) => Arc::clone(s),
                None => {
                    tracing::warn!(
                        requested = name,
                        fallback = %schemes[0].name,
                        "Unknown scheme; using the first registered scheme"
                    );
                    Arc::clone(&schemes[0])
                }
            }
        };
        self.current.store(Arc::clone(&chosen));
        chosen
    }

    /// Make `s` current directly, without a name lookup. `s` is not added
    /// to the named schemes.
    pub fn set_current_scheme(&self, s: Arc<SeverityScheme>) -> Result<(), SchemeError> {
        scheme::validate_scheme(&s)?;
        self.current.store(s);
        Ok(())
    }

    /// The scheme classification should use right now.
    pub fn current(&self) -> Arc<SeverityScheme> {
        self.current.load_full()
    }

    pub fn get(&self, name: &str) -> Option<Arc<SeverityScheme>> {
        self.schemes.read().iter().find(|s| s.name == name).cloned()
    }

    /// Scheme names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.schemes.read().iter().map(|s| s.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.schemes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.read().is_empty()
    }
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
