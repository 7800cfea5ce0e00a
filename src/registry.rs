//! Name-keyed provider registries.
//!
//! # Overview
//!
//! Each capability (file enumerator, content hasher, perceptual hasher,
//! metadata reader, audio backend) has a [`Registry`] mapping a string name
//! to a factory. Names are insert-once: registering a name twice is an
//! error rather than a silent override. Lookups of unknown names report the
//! names that are available.
//!
//! [`Providers`] bundles one registry per capability. It is built once at
//! startup and shared as `Arc<Providers>`; there is no global state.
//!
//! # Example
//!
//! ```
//! use dupetrail::registry::Providers;
//!
//! let providers = Providers::with_defaults().unwrap();
//! let hasher = providers.hashers.get("streaming").unwrap();
//! assert_eq!(hasher.name(), "streaming");
//! assert!(providers.hashers.get("nonexistent").is_err());
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::enumerate::{FileEnumerator, WalkdirEnumerator};
use crate::error::format_names;
use crate::hasher::{ContentHasher, MmapHasher, StreamingHasher};
use crate::metadata::{AudioMetadataProvider, ImageCrateMetadata, ImageMetadataProvider, OcrProvider};
use crate::similarity::{
    AudioAnalyzer, AudioFingerprinter, AverageHasher, DifferenceHasher, PerceptualHasher,
};

/// Errors from registering or looking up providers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No provider is registered under the name.
    #[error("no {capability} provider named '{name}' (available: {})", format_names(.available))]
    NotFound {
        /// Capability that was queried
        capability: &'static str,
        /// Requested name
        name: String,
        /// Names registered for the capability, sorted
        available: Vec<String>,
    },

    /// The name is already taken for this capability.
    #[error("{capability} provider '{name}' is already registered")]
    AlreadyRegistered {
        /// Capability being registered
        capability: &'static str,
        /// The duplicate name
        name: String,
    },
}

type Factory<T> = Arc<dyn Fn() -> Arc<T> + Send + Sync>;

/// Name-keyed factory table for one capability.
///
/// Safe for concurrent registration and lookup.
pub struct Registry<T: ?Sized> {
    capability: &'static str,
    factories: RwLock<BTreeMap<String, Factory<T>>>,
}

impl<T: ?Sized> Registry<T> {
    /// Create an empty registry for `capability` (used in error messages).
    #[must_use]
    pub fn new(capability: &'static str) -> Self {
        Self {
            capability,
            factories: RwLock::new(BTreeMap::new()),
        }
    }

    /// Capability name of this registry.
    #[must_use]
    pub fn capability(&self) -> &'static str {
        self.capability
    }

    /// Register a factory under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyRegistered`] if the name is taken.
    pub fn register<F>(&self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut factories = self
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if factories.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered {
                capability: self.capability,
                name,
            });
        }
        log::trace!("Registered {} provider '{}'", self.capability, name);
        factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Construct the provider registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] listing the available names.
    pub fn get(&self, name: &str) -> Result<Arc<T>, RegistryError> {
        self.try_get(name).ok_or_else(|| RegistryError::NotFound {
            capability: self.capability,
            name: name.to_string(),
            available: self.names(),
        })
    }

    /// Construct the provider registered under `name`, if any.
    #[must_use]
    pub fn try_get(&self, name: &str) -> Option<Arc<T>> {
        // Clone the factory out so construction runs without the lock held
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()?;
        Some(factory())
    }

    /// Registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl<T: ?Sized> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("capability", &self.capability)
            .field("names", &self.names())
            .finish()
    }
}

/// Process-scoped set of provider registries.
#[derive(Debug)]
pub struct Providers {
    pub enumerators: Registry<dyn FileEnumerator>,
    pub hashers: Registry<dyn ContentHasher>,
    pub perceptual: Registry<dyn PerceptualHasher>,
    pub image_metadata: Registry<dyn ImageMetadataProvider>,
    pub audio_metadata: Registry<dyn AudioMetadataProvider>,
    pub fingerprinters: Registry<dyn AudioFingerprinter>,
    pub audio_analyzers: Registry<dyn AudioAnalyzer>,
    pub ocr: Registry<dyn OcrProvider>,
}

impl Default for Providers {
    fn default() -> Self {
        Self::new()
    }
}

impl Providers {
    /// Empty registries for every capability.
    #[must_use]
    pub fn new() -> Self {
        Self {
            enumerators: Registry::new("enumerator"),
            hashers: Registry::new("hasher"),
            perceptual: Registry::new("perceptual hasher"),
            image_metadata: Registry::new("image metadata"),
            audio_metadata: Registry::new("audio metadata"),
            fingerprinters: Registry::new("audio fingerprinter"),
            audio_analyzers: Registry::new("audio analyzer"),
            ocr: Registry::new("ocr"),
        }
    }

    /// Registries pre-populated with the built-in providers.
    ///
    /// Audio backends and OCR are external and start out empty.
    ///
    /// # Errors
    ///
    /// Never fails on a fresh container; the `Result` mirrors
    /// [`Providers::register_defaults`].
    pub fn with_defaults() -> Result<Self, RegistryError> {
        let providers = Self::new();
        providers.register_defaults()?;
        Ok(providers)
    }

    /// Register the built-in providers.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyRegistered`] if called twice.
    pub fn register_defaults(&self) -> Result<(), RegistryError> {
        self.enumerators
            .register(WalkdirEnumerator::NAME, || Arc::new(WalkdirEnumerator::new()))?;
        self.hashers
            .register(StreamingHasher::NAME, || Arc::new(StreamingHasher::new()))?;
        self.hashers
            .register(MmapHasher::NAME, || Arc::new(MmapHasher::new()))?;
        self.perceptual
            .register(DifferenceHasher.method().to_string(), || Arc::new(DifferenceHasher))?;
        self.perceptual
            .register(AverageHasher.method().to_string(), || Arc::new(AverageHasher))?;
        self.image_metadata
            .register(ImageCrateMetadata::NAME, || Arc::new(ImageCrateMetadata))?;
        Ok(())
    }
}
