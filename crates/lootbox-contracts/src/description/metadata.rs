use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::rarity::{RarityLabel, SampledAttributes};

pub const TOKEN_ID_PLACEHOLDER: &str = "{id}";
pub const NAME_TEMPLATE: &str = "Advent Gift #{id}";
pub const IMAGE_PLACEHOLDER: &str = "<pending>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitEntry {
    pub trait_type: String,
    pub value: String,
}

impl TraitEntry {
    fn new(trait_type: &str, value: &str) -> Self {
        Self {
            trait_type: trait_type.to_string(),
            value: value.to_string(),
        }
    }
}

/// ERC-721 token metadata. Built once per claim as a template, then
/// instantiated per token id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub name: String,
    pub description: String,
    pub image: String,
    pub attributes: Vec<TraitEntry>,
}

impl MetadataRecord {
    pub fn build(attrs: &SampledAttributes, description: &str) -> Self {
        let attributes = attrs
            .traits()
            .into_iter()
            .filter_map(|(trait_type, value)| value.map(|value| TraitEntry::new(trait_type, value)))
            .collect();
        Self::template(description, attributes)
    }

    /// Metadata for a user-written prompt: the only trait is the rarity.
    pub fn custom(label: RarityLabel, description: &str) -> Self {
        Self::template(description, vec![TraitEntry::new("rarity", label.as_str())])
    }

    fn template(description: &str, attributes: Vec<TraitEntry>) -> Self {
        Self {
            name: NAME_TEMPLATE.to_string(),
            description: description.to_string(),
            image: IMAGE_PLACEHOLDER.to_string(),
            attributes,
        }
    }

    pub fn instantiate(&self, token_id: u64, image_uri: &str) -> Self {
        Self {
            name: self
                .name
                .replace(TOKEN_ID_PLACEHOLDER, &token_id.to_string()),
            description: self.description.clone(),
            image: image_uri.to_string(),
            attributes: self.attributes.clone(),
        }
    }

    pub fn rarity(&self) -> Option<&str> {
        self.attributes
            .iter()
            .find(|entry| entry.trait_type == "rarity")
            .map(|entry| entry.value.as_str())
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let payload = serde_json::to_string_pretty(self)?;
        fs::write(path, payload + "\n")
            .with_context(|| format!("failed to write metadata {}", path.display()))
    }
}

pub fn build_metadata(attrs: &SampledAttributes, description: &str) -> MetadataRecord {
    MetadataRecord::build(attrs, description)
}

pub fn custom_metadata(label: RarityLabel, description: &str) -> MetadataRecord {
    MetadataRecord::custom(label, description)
}

pub fn instantiate_metadata(
    record: &MetadataRecord,
    token_id: u64,
    image_uri: &str,
) -> MetadataRecord {
    record.instantiate(token_id, image_uri)
}
