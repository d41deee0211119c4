//! mintgate-metadata
//!
//! The per-token metadata document served to NFT marketplaces.
//!
//! The response shape is a compatibility contract: the field names `name`,
//! `description`, and `image`, and the convention that `image` is templated
//! from a base URL by the token identifier, are what marketplaces key on.
//! Changing them breaks existing listings, so they live here as one small,
//! well-tested surface rather than inline in whatever endpoint serves them.

use serde::{Deserialize, Serialize};

/// Static facts about the collection, fixed at deployment time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection display name; token names are `"<name> #<id>"`.
    pub name: String,
    /// Collection description, shared by every token.
    pub description: String,
    /// Base URL the per-token image is templated from.
    pub image_base_url: String,
    /// Image file extension, without the dot.
    pub image_extension: String,
}

impl CollectionInfo {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        image_base_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            image_base_url: image_base_url.into(),
            image_extension: "svg".to_string(),
        }
    }

    /// Override the image extension.
    pub fn with_image_extension(mut self, extension: impl Into<String>) -> Self {
        self.image_extension = extension.into();
        self
    }
}

/// The metadata document for one token.
///
/// Serializes to exactly `{ "name": ..., "description": ..., "image": ... }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub description: String,
    pub image: String,
}

impl TokenMetadata {
    /// Build the document for a token id under the given collection.
    pub fn for_token(collection: &CollectionInfo, token_id: u64) -> Self {
        let base = collection.image_base_url.trim_end_matches('/');
        Self {
            name: format!("{} #{}", collection.name, token_id),
            description: collection.description.clone(),
            image: format!("{}/{}.{}", base, token_id, collection.image_extension),
        }
    }
}
