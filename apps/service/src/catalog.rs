use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::CatalogError;
use crate::monitoring::validation::validate_http_target;

/// A named, URL-addressable service that is monitored for availability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub url: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self { name: name.into(), url: url.into() }
    }
}

/// The validated, immutable set of endpoints probed on every run
#[derive(Debug, Clone)]
pub struct EndpointCatalog {
    endpoints: Vec<Endpoint>,
}

impl EndpointCatalog {
    /// Build a catalog, rejecting empty or duplicate names and invalid URLs
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(endpoints.len());

        for endpoint in &endpoints {
            if endpoint.name.trim().is_empty() {
                return Err(CatalogError::EmptyName { url: endpoint.url.clone() });
            }
            if !seen.insert(endpoint.name.as_str()) {
                return Err(CatalogError::DuplicateName(endpoint.name.clone()));
            }
            validate_http_target(&endpoint.url).map_err(|source| CatalogError::InvalidUrl {
                name: endpoint.name.clone(),
                source,
            })?;
        }

        Ok(Self { endpoints })
    }

    /// Endpoints in configuration order
    pub fn list(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(|endpoint| endpoint.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Endpoints written into a freshly generated configuration file
pub fn default_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::new("tovarecom", "https://tovare.com/"),
        Endpoint::new("tovarecom-hybrids", "https://tovare.com/2020/hybrids-start/"),
        Endpoint::new("tovarecom-dashboard", "https://tovare.com/dashboard/"),
        Endpoint::new("alleyoop", "https://alleyoop.no/"),
        Endpoint::new("navno", "https://www.nav.no/"),
        Endpoint::new("arbeidsplassen", "https://arbeidsplassen.nav.no/"),
        Endpoint::new("idebanken", "http://idebanken.no"),
        Endpoint::new("navnofamilie", "http://familie.nav.no"),
        Endpoint::new("data.nav.no", "http://data.nav.no"),
        Endpoint::new("detsombetyrnoe", "http://detsombetyrnoe.no"),
        Endpoint::new("deterdinpensjon", "https://www.deterdinpensjon.no"),
        Endpoint::new("nais.io", "https://nais.io/"),
        Endpoint::new("memu.no", "https://memu.no"),
    ]
}
