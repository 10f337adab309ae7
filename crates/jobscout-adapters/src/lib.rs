//! Per-site extraction adapters and the process-wide registry.
//!
//! Each supported career-site host gets one [`SiteAdapter`]
//! implementation; the pipeline only ever talks to the trait. The
//! registry is built once at startup from board specs and never
//! mutated afterwards.

pub mod ashby;
pub mod greenhouse;
pub mod html;
pub mod http;
pub mod lever;

use std::collections::HashMap;
use std::sync::Arc;

use jobscout_core::adapter::SiteAdapter;
use jobscout_core::{Error, Result};

use ashby::AshbyAdapter;
use greenhouse::GreenhouseAdapter;
use lever::LeverAdapter;

/// Read-only map from company tag to its adapter.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SiteAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a comma-separated board spec list of the
    /// form `company=kind:slug`, e.g.
    /// `acme=greenhouse:acmeco,globex=lever:globex,initech=ashby:initech`.
    pub fn from_board_specs(specs: &str) -> Result<Self> {
        let mut registry = Self::new();
        for spec in specs.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (company, board) = spec
                .split_once('=')
                .ok_or_else(|| Error::Format(format!("board spec `{spec}`: missing `=`")))?;
            let (kind, slug) = board
                .split_once(':')
                .ok_or_else(|| Error::Format(format!("board spec `{spec}`: missing `:`")))?;

            let adapter: Arc<dyn SiteAdapter> = match kind {
                "greenhouse" => Arc::new(GreenhouseAdapter::new(company, slug)),
                "lever" => Arc::new(LeverAdapter::new(company, slug)),
                "ashby" => Arc::new(AshbyAdapter::new(company, slug)),
                other => {
                    return Err(Error::Format(format!(
                        "board spec `{spec}`: unknown board kind `{other}`"
                    )));
                }
            };
            registry.register(adapter);
        }
        Ok(registry)
    }

    /// Registration happens during startup only.
    pub fn register(&mut self, adapter: Arc<dyn SiteAdapter>) {
        self.adapters
            .insert(adapter.company().to_string(), adapter);
    }

    pub fn get(&self, company: &str) -> Option<Arc<dyn SiteAdapter>> {
        self.adapters.get(company).cloned()
    }

    pub fn companies(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_board_specs() {
        let registry = AdapterRegistry::from_board_specs(
            "acme=greenhouse:acmeco, globex=lever:globex,initech=ashby:initech",
        )
        .unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get("acme").unwrap().company(), "acme");
        assert_eq!(registry.get("globex").unwrap().company(), "globex");
        assert!(registry.get("umbrella").is_none());
    }

    #[test]
    fn test_empty_specs_give_empty_registry() {
        let registry = AdapterRegistry::from_board_specs("").unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_malformed_specs_rejected() {
        assert!(AdapterRegistry::from_board_specs("acme-greenhouse").is_err());
        assert!(AdapterRegistry::from_board_specs("acme=greenhouse").is_err());
        assert!(AdapterRegistry::from_board_specs("acme=workday:acme").is_err());
    }
}
