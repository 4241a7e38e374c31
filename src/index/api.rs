//! PokeAPI client
//!
//! Two read-only endpoints:
//! - `/pokemon?limit=N` for the full list, where each entry only carries a
//!   name and a reference URL ending in the numeric id
//! - `/type/{name}` per category, merged client-side into name -> tags

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;

use super::{IndexProvider, TypeTags};
use crate::config::{DEFAULT_API_BASE_URL, DEFAULT_IMAGE_BASE_URL, SPECIES_LIST_LIMIT};
use crate::error::FetchError;
use crate::state::{SpeciesId, SpeciesRef};

/// The 18 battle types
pub const TYPE_NAMES: [&str; 18] = [
    "normal", "fire", "water", "grass", "electric", "ice", "fighting", "poison", "ground",
    "flying", "psychic", "bug", "rock", "ghost", "dragon", "steel", "dark", "fairy",
];

#[derive(Debug, Deserialize)]
struct NamedResource {
    name: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct SpeciesPage {
    results: Vec<NamedResource>,
}

#[derive(Debug, Deserialize)]
struct TypeMember {
    slot: u8,
    pokemon: NamedResource,
}

#[derive(Debug, Deserialize)]
struct TypeDetail {
    pokemon: Vec<TypeMember>,
}

/// HTTP client for the PokeAPI
#[derive(Debug, Clone)]
pub struct PokeApiClient {
    http: reqwest::Client,
    base_url: String,
    image_base_url: String,
}

impl Default for PokeApiClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL, DEFAULT_IMAGE_BASE_URL)
    }
}

impl PokeApiClient {
    /// Create a client for the given API and artwork roots
    pub fn new(base_url: impl Into<String>, image_base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            image_base_url: image_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        tracing::debug!(%url, "GET");
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    async fn fetch_type(&self, type_name: &str) -> Result<TypeDetail, FetchError> {
        self.get_json(&format!("{}/type/{}", self.base_url, type_name))
            .await
    }
}

#[async_trait]
impl IndexProvider for PokeApiClient {
    async fn fetch_species(&self) -> Result<Vec<SpeciesRef>, FetchError> {
        let url = format!("{}/pokemon?limit={}", self.base_url, SPECIES_LIST_LIMIT);
        let page: SpeciesPage = self.get_json(&url).await?;
        let species = species_from_page(page, &self.image_base_url);
        tracing::info!(count = species.len(), "Fetched species list");
        Ok(species)
    }

    async fn fetch_type_tags(&self) -> Result<TypeTags, FetchError> {
        let results = join_all(TYPE_NAMES.iter().map(|name| self.fetch_type(name))).await;

        let mut fetched = Vec::with_capacity(results.len());
        let mut last_error = None;
        for (type_name, result) in TYPE_NAMES.iter().zip(results) {
            match result {
                Ok(detail) => fetched.push((*type_name, detail)),
                Err(err) => {
                    tracing::warn!(type_name, error = %err, "Skipping type category");
                    last_error = Some(err);
                }
            }
        }

        // Only give up when every category failed
        match (fetched.is_empty(), last_error) {
            (true, Some(err)) => Err(err),
            _ => Ok(merge_type_members(fetched)),
        }
    }
}

/// Pull the numeric id out of a reference URL like `.../pokemon/25/`
pub fn species_id_from_url(url: &str) -> Option<SpeciesId> {
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

fn species_from_page(page: SpeciesPage, image_base_url: &str) -> Vec<SpeciesRef> {
    page.results
        .into_iter()
        .filter_map(|item| {
            let Some(id) = species_id_from_url(&item.url) else {
                tracing::warn!(name = %item.name, url = %item.url, "Species URL has no id; skipped");
                return None;
            };
            Some(SpeciesRef {
                id,
                image_url: format!("{}/{}.png", image_base_url, id),
                name: item.name,
                types: Vec::new(),
            })
        })
        .collect()
}

fn merge_type_members(categories: Vec<(&str, TypeDetail)>) -> TypeTags {
    let mut slotted: std::collections::HashMap<String, Vec<(u8, String)>> = Default::default();
    for (type_name, detail) in categories {
        for member in detail.pokemon {
            slotted
                .entry(member.pokemon.name)
                .or_default()
                .push((member.slot, type_name.to_string()));
        }
    }

    slotted
        .into_iter()
        .map(|(name, mut tags)| {
            tags.sort_by_key(|(slot, _)| *slot);
            (name, tags.into_iter().map(|(_, tag)| tag).collect())
        })
        .collect()
}
