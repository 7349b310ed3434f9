use concierge_agent::embedding::provider_label as embedding_provider_label;
use concierge_agent::llm::provider_label as llm_provider_label;
use concierge_core::config::{AppConfig, LoadOptions};
use concierge_db::{connect_with_config, InventoryRepository, SqlInventoryRepository};
use serde::Serialize;

use crate::bootstrap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

const DEPENDENT_CHECKS: [&str; 4] =
    ["chat_model_readiness", "embedding_readiness", "database_connectivity", "inventory_schema"];

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            checks.push(check_chat_model(&config));
            checks.push(check_embedding_provider(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in DEPENDENT_CHECKS {
                checks.push(DoctorCheck::skipped(name, "skipped because configuration did not load"));
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Builds the client without calling it; credentials and endpoint shape are
/// checked, reachability is not.
fn check_chat_model(config: &AppConfig) -> DoctorCheck {
    match bootstrap::chat_model(config) {
        Ok(model) => DoctorCheck::pass(
            "chat_model_readiness",
            format!(
                "{} model `{}` configured",
                llm_provider_label(config.llm.provider),
                model.name()
            ),
        ),
        Err(failure) => DoctorCheck::fail("chat_model_readiness", format!("{:#}", failure.error)),
    }
}

fn check_embedding_provider(config: &AppConfig) -> DoctorCheck {
    match bootstrap::embedder(config) {
        Ok(_) => DoctorCheck::pass(
            "embedding_readiness",
            format!(
                "{} embeddings via `{}`",
                embedding_provider_label(config.embedding.provider),
                config.embedding.model
            ),
        ),
        Err(failure) => DoctorCheck::fail("embedding_readiness", format!("{:#}", failure.error)),
    }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("inventory_schema", "skipped because runtime did not start"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped(
                        "inventory_schema",
                        "skipped because database is unreachable",
                    ),
                ];
            }
        };

        let connectivity = DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        );
        let schema = match SqlInventoryRepository::new(pool.clone()).list().await {
            Ok(records) => DoctorCheck::pass(
                "inventory_schema",
                format!("room_inventory readable ({} records)", records.len()),
            ),
            Err(error) => DoctorCheck::fail(
                "inventory_schema",
                format!("room_inventory not readable ({error}); run `concierge migrate`"),
            ),
        };

        pool.close().await;
        vec![connectivity, schema]
    })
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
