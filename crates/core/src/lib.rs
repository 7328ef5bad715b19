//! Domain model and pure logic for domestic-alternative suggestions.

pub mod alternatives;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod prompts;

pub use alternatives::{CandidateRanker, NutritionProfile, NutritionWeights, ScoredCandidate};
pub use domain::alternative::{
    AlternativeDetail, AlternativeId, AlternativeLink, NewAlternativeLink, PriceComparison,
    QualityComparison,
};
pub use domain::product::{ConfidenceTier, NewProduct, Product, ProductId, ProductSource};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use prompts::{PromptLibrary, PromptMode};
