use crate::bootstrap::{open_inventory, Failure};
use crate::commands::{async_runtime, load_config, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match async_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let inventory = open_inventory(&config).await?;
        inventory.pool.close().await;
        Ok::<(), Failure>(())
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => failure.into_result("migrate"),
    }
}
