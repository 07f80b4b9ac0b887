use anyhow::Context;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

const DEFAULT_CATALOG: &str = include_str!("../../data/catalog.json");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Spa {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub services: Vec<Service>,
}

impl Spa {
    /// Last comma-separated segment of the address, lowercased.
    pub fn city(&self) -> Option<String> {
        let parts: Vec<&str> = self.address.split(',').map(str::trim).collect();
        if parts.len() >= 2 {
            parts.last().map(|c| c.to_lowercase())
        } else {
            None
        }
    }
}

/// Static spa/service catalog, read-only after startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Catalog {
    pub spas: Vec<Spa>,
}

impl Catalog {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let catalog: Catalog = serde_json::from_str(json).context("invalid catalog JSON")?;
        anyhow::ensure!(!catalog.spas.is_empty(), "catalog has no spas");
        Ok(catalog)
    }

    pub fn embedded() -> anyhow::Result<Self> {
        Self::from_json(DEFAULT_CATALOG)
    }

    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read catalog file: {path}"))?;
                Self::from_json(&json)
            }
            None => Self::embedded(),
        }
    }

    pub fn spa(&self, name: &str) -> Option<&Spa> {
        self.spas.iter().find(|s| s.name == name)
    }

    pub fn spa_names(&self) -> impl Iterator<Item = &str> {
        self.spas.iter().map(|s| s.name.as_str())
    }

    pub fn services_of(&self, spa_name: &str) -> &[Service] {
        self.spa(spa_name).map(|s| s.services.as_slice()).unwrap_or(&[])
    }

    /// Every (spa, service) pair in catalog order.
    pub fn offerings(&self) -> impl Iterator<Item = (&Spa, &Service)> {
        self.spas
            .iter()
            .flat_map(|spa| spa.services.iter().map(move |svc| (spa, svc)))
    }

    /// Stable digest of the catalog contents, used to key cached indexes.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha1::digest(&bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
    }
}
