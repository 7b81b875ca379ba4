//! Domain Catalog: column type resolution
//!
//! Execution engines report result columns as raw type tokens (`"INTEGER"`,
//! `"VARCHAR"`). The catalog translates those tokens into [`Domain`]
//! descriptors, the semantic column types the rest of the system stores and
//! serves. Resolution also runs in reverse on reload: stored domain names
//! must resolve again before a persisted query is considered found.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Semantic type descriptor for a result column
///
/// Opaque to this subsystem beyond its identifying name; richer typing
/// (value ranges, rendering hints) lives with the catalog owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
}

impl Domain {
    pub fn new(name: impl Into<String>) -> Self {
        Domain { name: name.into() }
    }
}

/// A named, typed column in a result schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub domain: Domain,
}

impl Column {
    pub fn new(name: impl Into<String>, domain: Domain) -> Self {
        Column {
            name: name.into(),
            domain,
        }
    }
}

/// Lookup service resolving type tokens to domains
pub trait DomainCatalog: Send + Sync {
    /// Resolves a raw column-type token; `None` when no registered domain
    /// matches.
    fn resolve(&self, token: &str) -> Option<Domain>;
}

/// In-memory catalog over a token-to-domain map
///
/// Every registered domain resolves from its own name, so domain names
/// written into metadata records always round-trip. Additional tokens can be
/// aliased onto a domain for the spellings engines actually report.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    domains: HashMap<String, Domain>,
}

impl MemoryCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        MemoryCatalog {
            domains: HashMap::new(),
        }
    }

    /// Catalog pre-populated with one domain per name
    pub fn with_domains<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut catalog = MemoryCatalog::new();
        for name in names {
            catalog.register(Domain::new(name));
        }
        catalog
    }

    /// Register a domain under its own name
    pub fn register(&mut self, domain: Domain) {
        self.domains.insert(domain.name.clone(), domain);
    }

    /// Register an extra token resolving to the given domain
    pub fn register_alias(&mut self, token: impl Into<String>, domain: Domain) {
        self.domains.insert(token.into(), domain);
    }

    /// Number of registered tokens
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl DomainCatalog for MemoryCatalog {
    fn resolve(&self, token: &str) -> Option<Domain> {
        if let Some(domain) = self.domains.get(token) {
            return Some(domain.clone());
        }
        // Engines commonly report tokens upper-cased
        self.domains.get(&token.to_lowercase()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_registered_domain() {
        let mut catalog = MemoryCatalog::new();
        catalog.register(Domain::new("int"));
        assert_eq!(catalog.resolve("int"), Some(Domain::new("int")));
    }

    #[test]
    fn test_resolve_unknown_token() {
        let catalog = MemoryCatalog::new();
        assert_eq!(catalog.resolve("int"), None);
    }

    #[test]
    fn test_resolve_is_case_insensitive_on_fallback() {
        let mut catalog = MemoryCatalog::new();
        catalog.register(Domain::new("varchar"));
        assert_eq!(catalog.resolve("VARCHAR"), Some(Domain::new("varchar")));
    }

    #[test]
    fn test_alias_resolves_to_target_domain() {
        let mut catalog = MemoryCatalog::new();
        let int = Domain::new("int");
        catalog.register(int.clone());
        catalog.register_alias("INTEGER", int.clone());
        catalog.register_alias("int4", int.clone());
        assert_eq!(catalog.resolve("INTEGER"), Some(int.clone()));
        assert_eq!(catalog.resolve("int4"), Some(int));
    }

    #[test]
    fn test_with_domains_registers_each_name() {
        let catalog = MemoryCatalog::with_domains(["int", "varchar", "bool"]);
        assert_eq!(catalog.len(), 3);
        assert!(catalog.resolve("bool").is_some());
    }

    #[test]
    fn test_exact_match_wins_over_case_fallback() {
        let mut catalog = MemoryCatalog::new();
        catalog.register(Domain::new("id"));
        catalog.register_alias("ID", Domain::new("loud_id"));
        assert_eq!(catalog.resolve("ID"), Some(Domain::new("loud_id")));
    }
}
