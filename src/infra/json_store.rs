use std::path::{Path, PathBuf};

use crate::domain::model::catalog::Catalog;
use crate::domain::repository::CatalogRepository;

use super::document::{CatalogDocument, DocumentError};

#[derive(Debug, thiserror::Error)]
pub enum JsonStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document error: {0}")]
    Document(#[from] DocumentError),
}

/// JSONファイルによるCatalogRepository実装。
/// 1 Catalog = 1 JSONファイル。
pub struct JsonCatalogRepository {
    path: PathBuf,
}

impl JsonCatalogRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogRepository for JsonCatalogRepository {
    type Error = JsonStoreError;

    fn load(&self) -> Result<Option<Catalog>, Self::Error> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let document: CatalogDocument = serde_json::from_str(&content)?;
        let catalog = document.into_catalog()?;
        tracing::debug!(
            path = %self.path.display(),
            books = catalog.book_count(),
            members = catalog.member_count(),
            "catalog loaded"
        );
        Ok(Some(catalog))
    }

    fn save(&self, catalog: &Catalog) -> Result<(), Self::Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&CatalogDocument::from_catalog(catalog))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &content)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "catalog saved");
        Ok(())
    }
}
