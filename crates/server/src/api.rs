use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;
use vocalkart_agent::{
    AlternativeSuggester, CatalogImporter, IdentifyOutcome, IdentifyRequest, ImportRequest,
    LlmClient, ProductIdentifier, ProductLookup, ProductSearcher, SearchRequest, SuggestRequest,
    SuggestionOutcome,
};
use vocalkart_core::config::RankingConfig;
use vocalkart_core::domain::alternative::AlternativeDetail;
use vocalkart_core::domain::product::{Product, ProductId};
use vocalkart_core::errors::{ApplicationError, InterfaceError};
use vocalkart_core::prompts::PromptLibrary;
use vocalkart_db::{AlternativeRepository, ProductRepository};

#[derive(Clone)]
pub struct ApiState {
    suggester: Arc<AlternativeSuggester>,
    identifier: Arc<ProductIdentifier>,
    searcher: Arc<ProductSearcher>,
    importer: Arc<CatalogImporter>,
    alternatives: Arc<dyn AlternativeRepository>,
}

impl ApiState {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        alternatives: Arc<dyn AlternativeRepository>,
        llm: Arc<dyn LlmClient>,
        lookup: Arc<dyn ProductLookup>,
        prompts: Arc<PromptLibrary>,
        ranking: &RankingConfig,
    ) -> Self {
        let suggester = AlternativeSuggester::new(
            products.clone(),
            alternatives.clone(),
            llm.clone(),
            prompts.clone(),
        )
        .with_ranking(ranking);
        let identifier =
            ProductIdentifier::new(products.clone(), lookup.clone(), llm.clone(), prompts.clone());
        let searcher = ProductSearcher::new(products.clone(), lookup, llm, prompts);
        let importer = CatalogImporter::new(products, alternatives.clone());

        Self {
            suggester: Arc::new(suggester),
            identifier: Arc::new(identifier),
            searcher: Arc::new(searcher),
            importer: Arc::new(importer),
            alternatives,
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/alternatives", post(suggest_alternatives))
        .route("/api/v1/products/{id}/alternatives", get(list_alternatives))
        .route("/api/v1/identify", post(identify_product))
        .route("/api/v1/search", post(search_products))
        .route("/api/v1/import", post(import_catalog))
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

/// Failure returned by every handler. Carries the mapped interface error so
/// the response status and body come from one place.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        let correlation_id = Uuid::new_v4().to_string();
        warn!(
            event_name = "api.request.failed",
            correlation_id = %correlation_id,
            error = %error,
            "request failed"
        );
        Self(error.into_interface(correlation_id))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: self.0.public_message(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct AlternativesResponse {
    pub alternatives: Vec<AlternativeDetail>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
}

async fn suggest_alternatives(
    State(state): State<ApiState>,
    Json(request): Json<SuggestRequest>,
) -> Result<Json<SuggestionOutcome>, ApiError> {
    let outcome = state.suggester.suggest(&request).await?;
    info!(
        event_name = "api.alternatives.completed",
        product_id = %request.product_id,
        alternatives = outcome.alternatives.len(),
        "alternatives returned"
    );
    Ok(Json(outcome))
}

async fn list_alternatives(
    State(state): State<ApiState>,
    Path(product_id): Path<String>,
) -> Result<Json<AlternativesResponse>, ApiError> {
    let alternatives = state
        .alternatives
        .list_for_product(&ProductId(product_id))
        .await
        .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
    Ok(Json(AlternativesResponse { alternatives }))
}

async fn identify_product(
    State(state): State<ApiState>,
    Json(request): Json<IdentifyRequest>,
) -> Result<Json<IdentifyOutcome>, ApiError> {
    Ok(Json(state.identifier.identify(&request).await?))
}

async fn search_products(
    State(state): State<ApiState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let products = state.searcher.search(&request).await?;
    Ok(Json(SearchResponse { products }))
}

async fn import_catalog(
    State(state): State<ApiState>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, ApiError> {
    let summary = state.importer.import(request).await?;
    Ok(Json(ImportResponse { success: true, message: summary.message() }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use vocalkart_agent::{LookupProduct, ProductLookup, ScriptedLlmClient};
    use vocalkart_core::config::AppConfig;
    use vocalkart_core::prompts::PromptLibrary;
    use vocalkart_db::repositories::{InMemoryAlternativeRepository, InMemoryProductRepository};
    use vocalkart_db::{DemoCatalog, ProductRepository};

    use super::{router, ApiState};

    struct NoLookup;

    #[async_trait]
    impl ProductLookup for NoLookup {
        async fn by_barcode(&self, _barcode: &str) -> Result<Option<LookupProduct>> {
            Ok(None)
        }

        async fn search(&self, _query: &str) -> Result<Vec<LookupProduct>> {
            Ok(Vec::new())
        }
    }

    struct Harness {
        app: Router,
        products: Arc<InMemoryProductRepository>,
    }

    async fn build(llm: ScriptedLlmClient) -> Harness {
        let products = Arc::new(InMemoryProductRepository::new());
        let alternatives = Arc::new(InMemoryAlternativeRepository::new(products.clone()));
        DemoCatalog::load(products.as_ref()).await.expect("seed demo catalog");

        let state = ApiState::new(
            products.clone(),
            alternatives,
            Arc::new(llm),
            Arc::new(NoLookup),
            Arc::new(PromptLibrary::new().expect("prompts")),
            &AppConfig::default().ranking,
        );
        Harness { app: router(state), products }
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |body| Body::from(body.to_string())))
            .expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, payload)
    }

    async fn coca_cola_id(products: &InMemoryProductRepository) -> String {
        products.find_by_barcode("5449000000996").await.expect("find").expect("seeded").id.0
    }

    #[tokio::test]
    async fn suggest_then_list_returns_the_persisted_link() {
        let llm = ScriptedLlmClient::new().with_reply(
            r#"Here you go: [{"name": "Thums Up", "brand": "Coca-Cola India", "match_score": 92,
                "reason": "Cola with a stronger fizz", "quality_comparison": "similar",
                "price_comparison": "cheaper", "reason_tags": ["same_category"]}]"#,
        );
        let harness = build(llm).await;
        let id = coca_cola_id(&harness.products).await;

        let (status, body) = call(
            &harness.app,
            "POST",
            "/api/v1/alternatives",
            Some(json!({
                "productId": id,
                "productName": "Coca-Cola",
                "productCategory": "Beverages, Sodas"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["alternatives"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["alternatives"][0]["match_score"], 92);

        let (status, body) =
            call(&harness.app, "GET", &format!("/api/v1/products/{id}/alternatives"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["alternatives"][0]["indian_product"]["name"], "Thums Up");
    }

    #[tokio::test]
    async fn missing_fields_are_rejected_with_a_correlation_id() {
        let harness = build(ScriptedLlmClient::new()).await;

        let (status, body) = call(
            &harness.app,
            "POST",
            "/api/v1/alternatives",
            Some(json!({ "productName": "Coca-Cola" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some_and(|message| !message.is_empty()));
        assert!(body["correlationId"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn unknown_products_map_to_not_found() {
        let harness = build(ScriptedLlmClient::new()).await;

        let (status, _) = call(
            &harness.app,
            "POST",
            "/api/v1/alternatives",
            Some(json!({
                "productId": "missing",
                "productName": "X",
                "productCategory": "Snacks"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn generator_outages_map_to_service_unavailable_and_garbage_to_internal() {
        let harness = build(ScriptedLlmClient::new().with_failure("gateway down")).await;
        let id = coca_cola_id(&harness.products).await;
        let request =
            json!({ "productId": id, "productName": "Coca-Cola", "productCategory": "Beverages" });

        let (status, body) =
            call(&harness.app, "POST", "/api/v1/alternatives", Some(request.clone())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!body["error"].as_str().unwrap_or_default().contains("gateway down"));

        let harness = build(ScriptedLlmClient::new().with_reply("no idea, sorry")).await;
        let id = coca_cola_id(&harness.products).await;
        let request =
            json!({ "productId": id, "productName": "Coca-Cola", "productCategory": "Beverages" });
        let (status, _) = call(&harness.app, "POST", "/api/v1/alternatives", Some(request)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn identify_returns_stored_products_without_external_calls() {
        let harness = build(ScriptedLlmClient::new()).await;

        let (status, body) = call(
            &harness.app,
            "POST",
            "/api/v1/identify",
            Some(json!({ "barcode": "5449000000996" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["product"]["barcode"], "5449000000996");
        assert_eq!(body["validation"], Value::Null);
    }

    #[tokio::test]
    async fn search_hits_the_catalog_first() {
        let harness = build(ScriptedLlmClient::new()).await;

        let (status, body) = call(
            &harness.app,
            "POST",
            "/api/v1/search",
            Some(json!({ "searchQuery": "thums", "indianOnly": true })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["products"][0]["name"], "Thums Up");
    }

    #[tokio::test]
    async fn import_reports_counts_and_rejects_empty_payloads() {
        let harness = build(ScriptedLlmClient::new()).await;

        let (status, body) = call(
            &harness.app,
            "POST",
            "/api/v1/import",
            Some(json!({
                "products": [
                    { "barcode": "8901234", "name": "Parle-G", "is_indian": true, "price": 10 }
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "success": true, "message": "Imported 1 products and 0 alternatives" })
        );

        let (status, _) = call(&harness.app, "POST", "/api/v1/import", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
