use std::path::Path;

use anyhow::anyhow;
use concierge_agent::evaluation::{
    generate_dataset, score_dataset, write_jsonl, EvaluationSummary, TaskAdherenceEvaluator,
    SIMULATED_QUERIES,
};
use concierge_agent::skills;

use crate::bootstrap::{self, open_inventory, Failure};
use crate::commands::{async_runtime, load_config, CommandResult};

pub fn generate(output: &Path) -> CommandResult {
    const COMMAND: &str = "eval generate";

    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match async_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let inventory = open_inventory(&config).await?;
        let generated = match bootstrap::concierge(&config, inventory.repository.clone()) {
            Ok(agent) => generate_dataset(&agent, &SIMULATED_QUERIES)
                .await
                .map_err(|error| Failure::new("evaluation_execution", 5, anyhow!(error))),
            Err(failure) => Err(failure),
        };
        inventory.pool.close().await;

        let records = generated?;
        write_jsonl(output, &records)
            .map_err(|error| Failure::new("evaluation_execution", 5, anyhow!(error)))?;
        Ok::<usize, Failure>(records.len())
    });

    match result {
        Ok(count) => CommandResult::success(
            COMMAND,
            format!(
                "シミュレーション完了。{count}件の対話内容が{}にログされました。",
                output.display()
            ),
        ),
        Err(failure) => failure.into_result(COMMAND),
    }
}

/// Grades a dataset. Exits 1 when any line fails so CI can gate on it.
pub fn score(input: &Path) -> CommandResult {
    const COMMAND: &str = "eval score";

    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match async_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let judge = bootstrap::chat_model(&config)?;
        let evaluator = TaskAdherenceEvaluator::new(judge, skills::catalog());
        score_dataset(&evaluator, input)
            .await
            .map_err(|error| Failure::new("evaluation_input", 1, anyhow!(error)))
    });

    match result {
        Ok(summary) if summary.is_success() => {
            CommandResult::success(COMMAND, summary_message(&summary))
        }
        Ok(summary) => {
            CommandResult::failure(COMMAND, "evaluation_failed", summary_message(&summary), 1)
        }
        Err(failure) => failure.into_result(COMMAND),
    }
}

fn summary_message(summary: &EvaluationSummary) -> String {
    let mut lines = vec![format!(
        "総テスト数: {} / 成功: {} / 失敗: {}",
        summary.total,
        summary.passed,
        summary.failures.len()
    )];
    lines.extend(
        summary.failures.iter().map(|failure| format!("  - 行 {}: {}", failure.line, failure.reason)),
    );
    lines.join("\n")
}
