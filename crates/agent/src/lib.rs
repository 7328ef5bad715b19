//! Network-facing VocalKart pipeline.
//!
//! - `suggest`: domestic alternatives for a stored product (retrieve, rank,
//!   generate, resolve, persist)
//! - `identify`: barcode identification through the lookup service with a
//!   generator fallback
//! - `search`: catalog search with lookup and generator fallbacks
//! - `pricing`: price backfill for catalog rows without a price
//! - `import`: bulk upsert of products and alternative links
//!
//! The generator is strictly a suggestion source. Vocabulary normalization,
//! score clamping and persistence decisions are deterministic and happen here.

pub mod identify;
pub mod import;
pub mod llm;
pub mod lookup;
pub mod pricing;
pub mod search;
pub mod suggest;

#[cfg(test)]
pub(crate) mod test_support;

use vocalkart_core::errors::ApplicationError;
use vocalkart_core::prompts::PromptError;
use vocalkart_db::RepositoryError;

pub use identify::{IdentifyOutcome, IdentifyRequest, ProductIdentifier};
pub use import::{CatalogImporter, ImportRequest, ImportSummary};
pub use llm::{ChatCompletionsClient, LlmClient, ScriptedLlmClient};
pub use lookup::{LookupProduct, OpenFoodFactsClient, ProductLookup};
pub use pricing::PriceBackfill;
pub use search::{ProductSearcher, SearchRequest};
pub use suggest::{AlternativeSuggester, SuggestRequest, SuggestionOutcome};

pub(crate) fn persistence_error(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

pub(crate) fn prompt_error(error: PromptError) -> ApplicationError {
    ApplicationError::Configuration(error.to_string())
}
