use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

use crate::core::requirement::Capability;
use crate::core::types::ProviderId;
use crate::utils::validation::{is_valid_identifier, MAX_CAPABILITIES};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Provider '{0}' appears more than once")]
    DuplicateProvider(ProviderId),

    #[error("Invalid provider id '{0}'")]
    InvalidProviderId(String),

    #[error("Provider '{provider}' declares {count} capabilities, exceeding the maximum of {MAX_CAPABILITIES}")]
    TooManyCapabilities { provider: ProviderId, count: usize },
}

/// Catalog version for compatibility checking
pub const CATALOG_VERSION: &str = "1.0.0";

/// A facility, kitchen or other party offering capabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,

    pub name: String,

    /// Domain the provider was extracted for, e.g. "manufacturing"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    pub capabilities: Vec<Capability>,

    /// Location, access policy and similar; carried into supply tree metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Provider {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ProviderId::new(id),
            name: name.into(),
            domain: None,
            capabilities: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Serializable catalog format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogData {
    pub version: String,
    #[serde(default)]
    pub created_at: String,
    pub providers: Vec<Provider>,
}

/// Providers available for matching, indexed by id
#[derive(Debug, Default)]
pub struct ProviderCatalog {
    /// All providers, in load order
    pub providers: Vec<Provider>,

    /// Index: provider ID -> index in providers vec
    id_to_index: HashMap<ProviderId, usize>,
}

impl ProviderCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Load catalog from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse catalog from JSON string
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let data: CatalogData = serde_json::from_str(json)?;

        // Version check (warn but don't fail)
        if data.version != CATALOG_VERSION {
            tracing::warn!(
                "Catalog version mismatch (expected {}, found {})",
                CATALOG_VERSION,
                data.version
            );
        }

        let mut catalog = Self::new();
        for provider in data.providers {
            catalog.add_provider(provider)?;
        }
        Ok(catalog)
    }

    /// Build a catalog from providers already in memory
    pub fn from_providers(providers: impl IntoIterator<Item = Provider>) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for provider in providers {
            catalog.add_provider(provider)?;
        }
        Ok(catalog)
    }

    /// Add a provider to the catalog
    pub fn add_provider(&mut self, provider: Provider) -> Result<(), CatalogError> {
        if !is_valid_identifier(provider.id.as_str()) {
            return Err(CatalogError::InvalidProviderId(provider.id.0));
        }
        if self.id_to_index.contains_key(&provider.id) {
            return Err(CatalogError::DuplicateProvider(provider.id));
        }
        if provider.capabilities.len() > MAX_CAPABILITIES {
            return Err(CatalogError::TooManyCapabilities {
                count: provider.capabilities.len(),
                provider: provider.id,
            });
        }

        self.id_to_index.insert(provider.id.clone(), self.providers.len());
        self.providers.push(provider);
        Ok(())
    }

    /// Get a provider by ID
    pub fn get(&self, id: &ProviderId) -> Option<&Provider> {
        self.id_to_index.get(id).map(|&idx| &self.providers[idx])
    }

    /// Total number of capabilities across providers
    pub fn capability_count(&self) -> usize {
        self.providers.iter().map(|p| p.capabilities.len()).sum()
    }

    /// Export catalog to JSON
    pub fn to_json(&self) -> Result<String, CatalogError> {
        let data = CatalogData {
            version: CATALOG_VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            providers: self.providers.clone(),
        };
        Ok(serde_json::to_string_pretty(&data)?)
    }

    /// Number of providers in catalog
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if catalog is empty
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fab_lab() -> Provider {
        Provider::new("fab-lab", "Community Fab Lab")
            .with_capability(Capability::new("CNC Machining"))
            .with_capability(Capability::new("Laser Cutting"))
            .with_metadata("location", "Berlin")
    }

    #[test]
    fn test_add_and_get() {
        let mut catalog = ProviderCatalog::new();
        assert!(catalog.is_empty());
        catalog.add_provider(fab_lab()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.capability_count(), 2);

        let provider = catalog.get(&ProviderId::new("fab-lab")).unwrap();
        assert_eq!(provider.name, "Community Fab Lab");
        assert!(catalog.get(&ProviderId::new("nonexistent")).is_none());
    }

    #[test]
    fn test_duplicate_provider_rejected() {
        let mut catalog = ProviderCatalog::new();
        catalog.add_provider(fab_lab()).unwrap();
        assert!(matches!(
            catalog.add_provider(fab_lab()),
            Err(CatalogError::DuplicateProvider(_))
        ));
    }

    #[test]
    fn test_invalid_provider_id_rejected() {
        let mut catalog = ProviderCatalog::new();
        assert!(matches!(
            catalog.add_provider(Provider::new("../etc", "Bad")),
            Err(CatalogError::InvalidProviderId(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let catalog = ProviderCatalog::from_providers([fab_lab(), Provider::new("kitchen", "Kitchen")]).unwrap();
        let json = catalog.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"providers\""));

        let loaded = ProviderCatalog::from_json(&json).unwrap();
        assert_eq!(loaded.providers, catalog.providers);
    }

    #[test]
    fn test_version_mismatch_still_loads() {
        let json = r#"{"version": "0.1.0", "providers": [
            {"id": "shop", "name": "Shop", "capabilities": [{"id": "welding", "name": "Welding"}]}
        ]}"#;
        let catalog = ProviderCatalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ProviderCatalog::from_json("{"),
            Err(CatalogError::ParseError(_))
        ));
    }
}
