use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use vocalkart_core::alternatives::{
    extract_json_array, CandidateRanker, RawAlternative, ScoredCandidate, CREATED_AVAILABILITY,
    CREATED_BARCODE_PREFIX, CREATED_CHANNELS, CREATED_RATING, DEFAULT_CANDIDATE_POOL,
    MAX_ALTERNATIVES, RANKED_CANDIDATE_LIMIT,
};
use vocalkart_core::config::RankingConfig;
use vocalkart_core::domain::alternative::{AlternativeLink, NewAlternativeLink};
use vocalkart_core::domain::product::{
    canonical_category, synthetic_barcode, NewProduct, Product, ProductId, ProductSource,
    DOMESTIC_COUNTRY,
};
use vocalkart_core::errors::ApplicationError;
use vocalkart_core::prompts::{PromptLibrary, PromptMode, SourceProductPrompt};
use vocalkart_db::repositories::{AlternativeRepository, ProductRepository, RepositoryError};

use crate::llm::LlmClient;
use crate::{persistence_error, prompt_error};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuggestRequest {
    pub product_id: String,
    pub product_name: String,
    pub product_category: String,
}

impl SuggestRequest {
    fn validate(&self) -> Result<(), ApplicationError> {
        let missing = [&self.product_id, &self.product_name, &self.product_category]
            .iter()
            .any(|field| field.trim().is_empty());
        if missing {
            return Err(ApplicationError::invalid_input(
                "productId, productName and productCategory are required",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SuggestionOutcome {
    pub mode: PromptMode,
    pub alternatives: Vec<AlternativeLink>,
}

/// Suggests domestic alternatives for a stored product.
///
/// Candidates come from the store and are ranked by nutrition distance. The
/// generator either ranks them or, when there are none, invents alternatives.
/// Each proposal is resolved to a product (matched candidate, existing row or
/// a newly created one) and linked. A failure on one proposal skips only that
/// proposal.
pub struct AlternativeSuggester {
    products: Arc<dyn ProductRepository>,
    alternatives: Arc<dyn AlternativeRepository>,
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    ranker: CandidateRanker,
    candidate_pool_limit: u32,
}

impl AlternativeSuggester {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        alternatives: Arc<dyn AlternativeRepository>,
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
    ) -> Self {
        Self {
            products,
            alternatives,
            llm,
            prompts,
            ranker: CandidateRanker::new(),
            candidate_pool_limit: DEFAULT_CANDIDATE_POOL,
        }
    }

    pub fn with_ranking(mut self, ranking: &RankingConfig) -> Self {
        self.ranker = CandidateRanker::with_weights(ranking.weights());
        self.candidate_pool_limit = ranking.candidate_pool_limit;
        self
    }

    pub async fn suggest(
        &self,
        request: &SuggestRequest,
    ) -> Result<SuggestionOutcome, ApplicationError> {
        request.validate()?;
        let product_id = request.product_id.trim();
        let product_name = request.product_name.trim();
        let product_category = request.product_category.trim();

        let source = self
            .products
            .find_by_id(&ProductId(product_id.to_string()))
            .await
            .map_err(persistence_error)?
            .ok_or_else(|| ApplicationError::product_not_found(product_id))?;

        info!(
            event_name = "pipeline.suggest.started",
            product_id,
            product_name,
            product_category,
            "suggesting alternatives"
        );

        let ranked = self.ranked_candidates(&source, product_category).await;

        let prompt = self
            .prompts
            .alternatives(
                &SourceProductPrompt {
                    name: product_name,
                    brand: &source.brand,
                    category: product_category,
                    price: source.price,
                },
                &ranked,
            )
            .map_err(prompt_error)?;

        let reply = self.llm.complete(&prompt.text).await.map_err(|error| {
            error!(
                event_name = "pipeline.generate.failed",
                product_id,
                error = %error,
                "generator call failed"
            );
            ApplicationError::Integration(format!("generator call failed: {error}"))
        })?;

        let entries = extract_json_array(&reply).map_err(|error| {
            error!(
                event_name = "pipeline.generate.malformed",
                product_id,
                error = %error,
                "generator reply carried no usable JSON array"
            );
            ApplicationError::MalformedOutput(error.to_string())
        })?;

        let proposals: Vec<RawAlternative> = entries
            .iter()
            .filter_map(|entry| match RawAlternative::from_value(entry) {
                Ok(proposal) => Some(proposal),
                Err(rejection) => {
                    warn!(
                        event_name = "pipeline.generate.rejected",
                        product_id,
                        reason = %rejection,
                        "skipping generated entry"
                    );
                    None
                }
            })
            .take(MAX_ALTERNATIVES)
            .collect();

        info!(
            event_name = "pipeline.generate.completed",
            product_id,
            mode = ?prompt.mode,
            entries = entries.len(),
            accepted = proposals.len(),
            "generator proposals received"
        );

        let mut saved = Vec::with_capacity(proposals.len());
        for proposal in proposals {
            match self.persist(&source.id, product_category, &ranked, &proposal).await {
                Ok(link) => saved.push(link),
                Err(error) => warn!(
                    event_name = "pipeline.persist.skipped",
                    product_id,
                    alternative = %proposal.name,
                    error = %error,
                    "failed to persist alternative, continuing"
                ),
            }
        }

        info!(
            event_name = "pipeline.suggest.completed",
            product_id,
            saved = saved.len(),
            "alternatives persisted"
        );

        Ok(SuggestionOutcome { mode: prompt.mode, alternatives: saved })
    }

    /// Domestic products in the request category, closest first. A store
    /// failure is treated as having no candidates.
    async fn ranked_candidates(&self, source: &Product, category: &str) -> Vec<ScoredCandidate> {
        let term = canonical_category(category);
        let candidates =
            match self.products.find_domestic_by_category(term, self.candidate_pool_limit).await {
                Ok(candidates) => candidates,
                Err(error) => {
                    warn!(
                        event_name = "pipeline.retrieve.failed",
                        category = term,
                        error = %error,
                        "candidate retrieval failed, falling back to generation"
                    );
                    Vec::new()
                }
            };

        let mut ranked = self.ranker.rank(&source.nutrition(), candidates);
        ranked.truncate(RANKED_CANDIDATE_LIMIT);

        debug!(
            event_name = "pipeline.retrieve.completed",
            category = term,
            candidates = ranked.len(),
            "candidates ranked"
        );
        ranked
    }

    async fn persist(
        &self,
        original: &ProductId,
        fallback_category: &str,
        ranked: &[ScoredCandidate],
        proposal: &RawAlternative,
    ) -> Result<AlternativeLink, RepositoryError> {
        let indian_product_id = self.resolve(fallback_category, ranked, proposal).await?;

        self.alternatives
            .insert(NewAlternativeLink {
                original_product_id: original.clone(),
                indian_product_id,
                match_score: proposal.match_score,
                reason: proposal.reason.clone(),
                quality_comparison: proposal.quality_comparison,
                price_comparison: proposal.price_comparison,
                reason_tags: proposal.reason_tags.clone(),
                confidence: Some(proposal.confidence),
                source_urls: proposal.source_urls.clone(),
            })
            .await
    }

    /// First match wins: a ranked candidate whose name overlaps the proposal,
    /// an existing product with the exact name and brand, or a new product.
    async fn resolve(
        &self,
        fallback_category: &str,
        ranked: &[ScoredCandidate],
        proposal: &RawAlternative,
    ) -> Result<ProductId, RepositoryError> {
        if let Some(candidate) =
            ranked.iter().find(|candidate| names_overlap(&candidate.product.name, &proposal.name))
        {
            debug!(candidate = %candidate.product.name, "matched ranked candidate");
            return Ok(candidate.product.id.clone());
        }

        if let Some(existing) =
            self.products.find_by_name_and_brand(&proposal.name, &proposal.brand).await?
        {
            return Ok(existing.id);
        }

        let created = self
            .products
            .insert(NewProduct {
                barcode: synthetic_barcode(CREATED_BARCODE_PREFIX),
                name: proposal.name.clone(),
                brand: proposal.brand.clone(),
                category: proposal
                    .category
                    .clone()
                    .unwrap_or_else(|| fallback_category.to_string()),
                country_of_origin: DOMESTIC_COUNTRY.to_string(),
                is_indian: true,
                description: Some(proposal.reason.clone()),
                image_url: None,
                price: proposal.price.unwrap_or(Decimal::ZERO),
                availability: CREATED_AVAILABILITY.to_string(),
                where_to_buy: CREATED_CHANNELS.iter().map(|channel| channel.to_string()).collect(),
                rating: Some(CREATED_RATING),
                source: Some(ProductSource::Llm),
                confidence: Some(proposal.confidence),
                verified: false,
                off_raw: None,
            })
            .await?;

        info!(
            event_name = "pipeline.resolve.created",
            product_id = %created.id,
            name = %created.name,
            "created product for generated alternative"
        );
        Ok(created.id)
    }
}

fn names_overlap(candidate: &str, proposed: &str) -> bool {
    let candidate = candidate.to_lowercase();
    let proposed = proposed.to_lowercase();
    candidate.contains(&proposed) || proposed.contains(&candidate)
}
