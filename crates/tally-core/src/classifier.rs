//! Transaction classifier
//!
//! Turns one raw transaction message into a [`CategoryResult`] by asking the
//! model. The only local logic is input validation, prompt assembly, and
//! normalization of the model's JSON.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::ai::parsing::normalize_classification;
use crate::ai::{GenerationRequest, ModelBackend, ModelClient, OutputSchema};
use crate::error::{Error, Result};
use crate::models::{CategoryResult, TransactionQuery};
use crate::prompts::{PromptId, PromptLibrary};
use crate::taxonomy::CategoryTaxonomy;

/// Classifies transaction messages through a [`ModelClient`]
#[derive(Clone)]
pub struct TransactionClassifier {
    client: ModelClient,
    taxonomy: CategoryTaxonomy,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl TransactionClassifier {
    pub fn new(
        client: ModelClient,
        taxonomy: CategoryTaxonomy,
        prompts: Arc<RwLock<PromptLibrary>>,
    ) -> Self {
        Self {
            client,
            taxonomy,
            prompts,
        }
    }

    /// Taxonomy rendered into the prompt
    pub fn taxonomy(&self) -> &CategoryTaxonomy {
        &self.taxonomy
    }

    /// Assemble the generation request for a validated description
    pub fn build_request(&self, description: &str) -> Result<GenerationRequest> {
        let categories = self.taxonomy.prompt_list();
        let mut vars = HashMap::new();
        vars.insert("categories", categories.as_str());
        vars.insert("fallback", self.taxonomy.fallback.as_str());
        vars.insert("description", description);

        let rendered = self
            .prompts
            .write()
            .map_err(|_| Error::Config("prompt library lock poisoned".into()))?
            .render(PromptId::ClassifyTransaction, &vars)?;

        Ok(GenerationRequest {
            system: rendered.system,
            user: rendered.user,
            schema: OutputSchema::Classification,
        })
    }

    /// Classify one transaction message
    ///
    /// Empty or whitespace-only input fails with `InvalidInput` before the
    /// model is called.
    pub async fn classify(&self, query: &TransactionQuery) -> Result<CategoryResult> {
        let description = query.validated()?;
        let request = self.build_request(description)?;

        let value = self.client.generate_json(&request).await?;
        let result = normalize_classification(&value)?;

        if !self.taxonomy.contains(&result.category) {
            warn!(
                category = %result.category,
                taxonomy_version = self.taxonomy.version,
                "Model returned a category outside the taxonomy"
            );
        }
        debug!(
            category = %result.category,
            merchant = ?result.merchant,
            transaction = result.transaction,
            "Classified transaction"
        );

        Ok(result)
    }
}
