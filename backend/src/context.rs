use std::sync::Arc;

use crate::inference::Classifier;
use crate::models::ReferenceTable;
use crate::storage::BlobStore;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// État du processus, construit au démarrage et injecté dans les handlers.
#[derive(Clone)]
pub struct AppContext {
    pub classifier: Arc<dyn Classifier>,
    pub store: Arc<dyn BlobStore>,
    pub references: Arc<ReferenceTable>,
    pub max_upload_bytes: usize,
}

impl AppContext {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn BlobStore>,
        references: ReferenceTable,
    ) -> anyhow::Result<Self> {
        if let Some(classes) = classifier.num_classes() {
            if classes != references.len() {
                anyhow::bail!(
                    "le modèle prédit {} classes mais la table de référence en contient {}",
                    classes,
                    references.len()
                );
            }
        }

        Ok(Self {
            classifier,
            store,
            references: Arc::new(references),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        })
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }
}
