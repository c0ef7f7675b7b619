//! Memoization of element templates by structural signature.
//!
//! Templates are immutable, so every element with the same structure shares
//! one `Arc<ElementTemplate>`. Element-specific numbers (apex angles) live in
//! scale factor values, not in the template, which keeps the number of
//! distinct templates small: one per apex angular index pair and one per
//! junction side variant.
//!
//! # Example
//! ```ignore
//! let mut cache = TemplateCache::new();
//! let template = cache.get_or_build(TemplateKey::Standard, || Ok(ElementTemplate::standard()))?;
//! let stats = cache.stats();
//! println!("templates: {}, hits: {}", stats.entries, stats.hits);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::singular::{HangingCorner, Pole};
use super::template::{ElementTemplate, TemplateError};

/// Structural signature of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKey {
    Standard,
    /// Apex collapse; versions are the 1-based angular indices of the two
    /// element edges meeting the apex.
    Pole {
        pole: Pole,
        start_version: u32,
        end_version: u32,
    },
    /// Element touching a junction seam.
    Junction {
        end_reversed: bool,
        hanging: Option<HangingCorner>,
    },
}

/// Template cache statistics for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TemplateCacheStats {
    /// Number of distinct templates built.
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
}

impl TemplateCacheStats {
    /// Returns the cache hit rate as a value between 0.0 and 1.0.
    /// Returns 0.0 if no lookups have been made.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Template store keyed by [`TemplateKey`].
#[derive(Debug, Default)]
pub struct TemplateCache {
    templates: HashMap<TemplateKey, Arc<ElementTemplate>>,
    hits: usize,
    misses: usize,
}

impl TemplateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stats(&self) -> TemplateCacheStats {
        TemplateCacheStats {
            entries: self.templates.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }

    /// Clears all templates and resets hit/miss counters.
    pub fn clear(&mut self) {
        self.templates.clear();
        self.hits = 0;
        self.misses = 0;
    }

    /// Returns the cached template for `key`, building it with `make` on a
    /// miss. A failed build is not cached.
    ///
    /// # Errors
    /// Propagates the validation error from `make`.
    pub fn get_or_build(
        &mut self,
        key: TemplateKey,
        make: impl FnOnce() -> Result<ElementTemplate, TemplateError>,
    ) -> Result<Arc<ElementTemplate>, TemplateError> {
        if let Some(template) = self.templates.get(&key) {
            self.hits += 1;
            return Ok(Arc::clone(template));
        }
        self.misses += 1;
        let template = Arc::new(make()?);
        self.templates.insert(key, Arc::clone(&template));
        Ok(template)
    }
}
