//! Page context: the fingerprints and semantic index of the page the flow is
//! currently on. Rebuilt from scratch after every navigation.

use crate::driver::PageDriver;
use crate::embedding::EmbeddingProvider;
use crate::fingerprint::{fingerprint_page, ElementDescriptor};
use crate::index::SemanticIndex;

#[derive(Debug, Default)]
pub struct PageContext {
    descriptors: Vec<ElementDescriptor>,
    index: Option<SemanticIndex>,
}

impl PageContext {
    /// Fingerprint the current page and index it.
    ///
    /// Never fails: a fingerprinting or embedding error is logged and leaves
    /// the context without an index, which disables fallback recovery until
    /// the next navigation. Descriptors are kept even when indexing fails.
    pub async fn build<D, P>(driver: &D, provider: &P) -> Self
    where
        D: PageDriver,
        P: EmbeddingProvider + ?Sized,
    {
        let descriptors = match fingerprint_page(driver).await {
            Ok(descriptors) => descriptors,
            Err(e) => {
                log::warn!("Could not fingerprint page: {}", e);
                return Self::default();
            }
        };

        if descriptors.is_empty() {
            log::info!("No targetable interactive elements; fallback disabled for this page");
            return Self::default();
        }

        let index = match SemanticIndex::build(descriptors.clone(), provider).await {
            Ok(index) => {
                log::info!("Indexed {} interactive elements", descriptors.len());
                index
            }
            Err(e) => {
                log::warn!("Failed to build semantic index: {}", e);
                None
            }
        };

        Self { descriptors, index }
    }

    /// Number of fingerprinted (re-targetable) elements.
    pub fn element_count(&self) -> usize {
        self.descriptors.len()
    }

    pub fn index(&self) -> Option<&SemanticIndex> {
        self.index.as_ref()
    }

    /// Fingerprints of the page, in DOM order, whether or not it was indexed
    pub fn descriptors(&self) -> &[ElementDescriptor] {
        &self.descriptors
    }
}
