use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::{json, Value};
use tempfile::TempDir;
use vocalkart_cli::commands::{config, doctor, migrate, seed, suggest};
use vocalkart_db::{connect, ProductRepository, SqlProductRepository};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COCA_COLA_BARCODE: &str = "5449000000996";

#[test]
fn migrate_returns_success_with_valid_env() {
    let db = TempDb::new();
    with_env(&[("VOCALKART_DATABASE_URL", db.url.as_str())], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("VOCALKART_DATABASE_URL", "postgres://localhost/vocalkart")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let db = TempDb::new();
    with_env(&[("VOCALKART_DATABASE_URL", db.url.as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["command"], "seed");
        assert_eq!(
            first_payload["message"],
            "demo catalog loaded: 8 products (3 foreign, 5 domestic)"
        );

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        assert_eq!(first_payload, parse_payload(&second.output));
        assert_eq!(product_count(db.url.as_str()), 8);
    });
}

#[test]
fn config_attributes_sources_and_redacts_the_api_key() {
    with_env(
        &[
            ("VOCALKART_DATABASE_URL", "sqlite::memory:"),
            ("VOCALKART_LLM_API_KEY", "sk-very-secret"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);
            assert!(!result.output.contains("sk-very-secret"));

            let payload = parse_payload(&result.output);
            let fields = payload["details"]["fields"].as_array().expect("fields");
            let field = |key: &str| {
                fields.iter().find(|field| field["key"] == key).cloned().expect("field present")
            };

            assert_eq!(field("llm.api_key")["value"], "<redacted>");
            assert_eq!(field("llm.api_key")["source"], "env (VOCALKART_LLM_API_KEY)");
            assert_eq!(field("llm.model")["source"], "default");
            assert_eq!(field("ranking.candidate_pool_limit")["value"], "200");
        },
    );
}

#[test]
fn doctor_fails_until_migrations_are_applied() {
    let db = TempDb::new();
    with_env(&[("VOCALKART_DATABASE_URL", db.url.as_str())], || {
        let before = doctor::run(true);
        assert_eq!(before.exit_code, 1);
        let report = parse_payload(&before.output);
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(check_status(&report, "catalog_schema"), "fail");

        assert_eq!(migrate::run().exit_code, 0);

        let after = doctor::run(true);
        assert_eq!(after.exit_code, 0);
        let report = parse_payload(&after.output);
        assert_eq!(report["overall_status"], "warn");
        assert_eq!(check_status(&report, "database_connectivity"), "pass");
        assert_eq!(check_status(&report, "generator_credentials"), "warn");
    });
}

#[test]
fn doctor_human_output_lists_every_check() {
    with_env(&[("VOCALKART_DATABASE_URL", "postgres://nope")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.contains("- [fail] config_validation"));
        assert!(result.output.contains("- [skip] database_connectivity"));
    });
}

#[test]
fn suggest_reports_unknown_products() {
    let db = TempDb::new();
    with_env(&[("VOCALKART_DATABASE_URL", db.url.as_str())], || {
        let result = suggest::run("no-such-product");
        assert_eq!(result.exit_code, 7);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "not_found");
    });
}

#[test]
fn suggest_without_a_generator_key_is_an_upstream_failure() {
    let db = TempDb::new();
    with_env(&[("VOCALKART_DATABASE_URL", db.url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);
        let product_id = product_id_for(&db.url, COCA_COLA_BARCODE);

        let result = suggest::run(&product_id);
        assert_eq!(result.exit_code, 9);
        assert_eq!(parse_payload(&result.output)["error_class"], "generator_unavailable");
    });
}

#[test]
fn suggest_links_a_seeded_product_end_to_end() {
    let db = TempDb::new();
    let gateway = tokio::runtime::Runtime::new().expect("gateway runtime");
    let server = gateway.block_on(async {
        let server = MockServer::start().await;
        let reply = json!([{
            "name": "Thums Up",
            "brand": "Thums Up",
            "match_score": 90,
            "reason": "Domestic cola",
            "quality_comparison": "similar",
            "price_comparison": "cheaper",
            "reason_tags": ["same_category", "domestic_brand"]
        }]);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": reply.to_string() } }]
            })))
            .mount(&server)
            .await;
        server
    });
    let base_url = server.uri();

    with_env(
        &[
            ("VOCALKART_DATABASE_URL", db.url.as_str()),
            ("VOCALKART_LLM_BASE_URL", base_url.as_str()),
            ("VOCALKART_LLM_API_KEY", "test-key"),
        ],
        || {
            assert_eq!(seed::run().exit_code, 0);
            let product_id = product_id_for(&db.url, COCA_COLA_BARCODE);

            let result = suggest::run(&product_id);
            assert_eq!(result.exit_code, 0, "output: {}", result.output);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["message"], "1 alternatives recorded");
            let links = payload["details"]["alternatives"].as_array().expect("alternatives");
            assert_eq!(links.len(), 1);
            assert_eq!(links[0]["original_product_id"], product_id.as_str());
            assert_eq!(links[0]["price_comparison"], "cheaper");
        },
    );
}

struct TempDb {
    _dir: TempDir,
    url: String,
}

impl TempDb {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("vocalkart.db").display());
        Self { _dir: dir, url }
    }
}

fn product_id_for(url: &str, barcode: &str) -> String {
    block_on(async {
        let pool = connect(url).await.expect("connect");
        let product = SqlProductRepository::new(pool.clone())
            .find_by_barcode(barcode)
            .await
            .expect("query")
            .expect("seeded product");
        pool.close().await;
        product.id.0
    })
}

fn product_count(url: &str) -> u64 {
    block_on(async {
        let pool = connect(url).await.expect("connect");
        let count = SqlProductRepository::new(pool.clone()).count().await.expect("count");
        pool.close().await;
        count
    })
}

fn block_on<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
        .block_on(future)
}

fn check_status(report: &Value, name: &str) -> String {
    report["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .and_then(|check| check["status"].as_str())
        .unwrap_or_default()
        .to_string()
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "VOCALKART_DATABASE_URL",
        "VOCALKART_DATABASE_MAX_CONNECTIONS",
        "VOCALKART_DATABASE_TIMEOUT_SECS",
        "VOCALKART_LLM_PROVIDER",
        "VOCALKART_LLM_API_KEY",
        "VOCALKART_LLM_BASE_URL",
        "VOCALKART_LLM_MODEL",
        "VOCALKART_LLM_TIMEOUT_SECS",
        "VOCALKART_LLM_MAX_RETRIES",
        "VOCALKART_LOOKUP_BASE_URL",
        "VOCALKART_LOOKUP_TIMEOUT_SECS",
        "VOCALKART_LOOKUP_USER_AGENT",
        "VOCALKART_RANKING_CANDIDATE_POOL_LIMIT",
        "VOCALKART_RANKING_ENERGY_WEIGHT",
        "VOCALKART_RANKING_SUGAR_WEIGHT",
        "VOCALKART_RANKING_FAT_WEIGHT",
        "VOCALKART_SERVER_BIND_ADDRESS",
        "VOCALKART_SERVER_PORT",
        "VOCALKART_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "VOCALKART_LOGGING_LEVEL",
        "VOCALKART_LOGGING_FORMAT",
        "VOCALKART_LOG_LEVEL",
        "VOCALKART_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
