//! Catalog entries in the player's plugin format.

use serde::{Deserialize, Serialize};

/// Preview of one catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Meta {
    pub fn movie(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "movie".to_string(),
            name: name.into(),
            poster: None,
            release_info: None,
            description: None,
        }
    }
}

/// A complete catalog result set, cached whole and sliced per request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogResult {
    pub metas: Vec<Meta>,
}

impl CatalogResult {
    pub fn new(metas: Vec<Meta>) -> Self {
        Self { metas }
    }

    /// Items `skip..skip + page_size`; empty once `skip` runs past the end.
    pub fn page(&self, skip: usize, page_size: usize) -> Vec<Meta> {
        self.metas.iter().skip(skip).take(page_size).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }
}
