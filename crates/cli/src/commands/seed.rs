use anyhow::anyhow;
use concierge_db::fixtures::SEED_DATE;
use concierge_db::{SeedDataset, SeedResult, VerificationResult};

use crate::bootstrap::{embedder, open_inventory, Failure};
use crate::commands::{async_runtime, load_config, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match async_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let embedder = embedder(&config)?;
        let inventory = open_inventory(&config).await?;

        let loaded = SeedDataset::load(inventory.repository.as_ref(), embedder.as_ref())
            .await
            .map_err(|error| Failure::new("seed_execution", 5, anyhow!(error)));
        let verified = match loaded {
            Ok(loaded) => SeedDataset::verify(inventory.repository.as_ref())
                .await
                .map(|verification| (loaded, verification))
                .map_err(|error| Failure::new("seed_verification", 6, anyhow!(error))),
            Err(failure) => Err(failure),
        };

        inventory.pool.close().await;
        let (loaded, verification) = verified?;
        if !verification.all_present {
            let message = verification_message(&verification);
            return Err(Failure::new("seed_verification", 6, anyhow!(message)));
        }
        Ok::<_, Failure>(loaded)
    });

    match result {
        Ok(loaded) => CommandResult::success("seed", summary_message(&loaded)),
        Err(failure) => failure.into_result("seed"),
    }
}

fn summary_message(result: &SeedResult) -> String {
    let mut lines = vec![format!(
        "room inventory for {SEED_DATE}: {} inserted, {} already present",
        result.inserted.len(),
        result.already_present.len()
    )];
    lines.extend(result.inserted.iter().map(|id| format!("  + {id}")));
    lines.extend(result.already_present.iter().map(|id| format!("  = {id}")));
    lines.join("\n")
}

fn verification_message(verification: &VerificationResult) -> String {
    let failed_checks = verification
        .checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
        .collect::<Vec<_>>();

    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for rooms: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use concierge_db::{SeedResult, VerificationResult};

    use super::{summary_message, verification_message};

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let verification = VerificationResult {
            all_present: false,
            checks: vec![
                ("suite_2025-04-12".to_string(), true),
                ("loft_2025-04-12".to_string(), false),
                ("eco_2025-04-12".to_string(), false),
            ],
        };

        assert_eq!(
            verification_message(&verification),
            "Seed verification failed for rooms: loft_2025-04-12, eco_2025-04-12"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let verification = VerificationResult { all_present: false, checks: Vec::new() };
        assert_eq!(verification_message(&verification), "Some seed data failed to load");
    }

    #[test]
    fn summary_lists_inserted_and_existing_rooms() {
        let result = SeedResult {
            inserted: vec!["suite_2025-04-12".to_string()],
            already_present: vec!["loft_2025-04-12".to_string()],
        };

        assert_eq!(
            summary_message(&result),
            "room inventory for 2025-04-12: 1 inserted, 1 already present\n  + suite_2025-04-12\n  = loft_2025-04-12"
        );
    }
}
