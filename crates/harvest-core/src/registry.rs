//! Transport registry
//!
//! Maps a configuration-selected identifier to a transport constructor,
//! resolved once at startup. This is the explicit replacement for selecting
//! implementation classes by name at call time: every available transport is
//! registered up front, and an unknown identifier is a configuration error
//! that names the registered ones.

use harvest_common::{HarvestError, Result};
use std::collections::BTreeMap;

use crate::config::ExtractionConfig;
use crate::transport::Transport;

/// Constructor for one transport implementation
pub type TransportFactory =
    Box<dyn Fn(&ExtractionConfig) -> Result<Box<dyn Transport>> + Send + Sync>;

/// Identifier → constructor map, built once at startup
#[derive(Default)]
pub struct TransportRegistry {
    factories: BTreeMap<String, TransportFactory>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport constructor under `identifier`.
    ///
    /// Re-registering an identifier replaces the previous constructor.
    pub fn register<F>(&mut self, identifier: impl Into<String>, factory: F)
    where
        F: Fn(&ExtractionConfig) -> Result<Box<dyn Transport>> + Send + Sync + 'static,
    {
        self.factories.insert(identifier.into(), Box::new(factory));
    }

    /// Construct the transport the job configuration selects.
    pub fn build(&self, config: &ExtractionConfig) -> Result<Box<dyn Transport>> {
        match self.factories.get(&config.transport) {
            Some(factory) => factory(config),
            None => Err(HarvestError::Config(format!(
                "unknown transport '{}'; registered: {}",
                config.transport,
                self.identifiers().join(", ")
            ))),
        }
    }

    /// Registered identifiers, sorted
    pub fn identifiers(&self) -> Vec<&str> {
        self.factories.keys().map(|k| k.as_str()).collect()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.contains_key(identifier)
    }
}
