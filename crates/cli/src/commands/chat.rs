use std::io::{self, BufRead, Write};

use concierge_agent::conversation::{
    format_event, format_reply, is_exit_command, EXIT_HINT, SESSION_CLOSED, TURN_FAILED,
    USER_PROMPT, WELCOME_BANNER,
};
use concierge_agent::{AgentRuntime, ConversationThread};
use tokio::runtime::Runtime;
use tracing::warn;

use crate::bootstrap::{self, open_inventory};
use crate::commands::{async_runtime, load_config, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("chat") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match async_runtime("chat") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let inventory = match runtime.block_on(open_inventory(&config)) {
        Ok(inventory) => inventory,
        Err(failure) => return failure.into_result("chat"),
    };
    let agent = match bootstrap::concierge(&config, inventory.repository.clone()) {
        Ok(agent) => agent,
        Err(failure) => return failure.into_result("chat"),
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let session = run_session(&runtime, &agent, stdin.lock(), stdout.lock());
    runtime.block_on(inventory.pool.close());

    match session {
        Ok(()) => CommandResult { exit_code: 0, output: SESSION_CLOSED.to_string() },
        Err(error) => {
            CommandResult::failure("chat", "io", format!("chat session failed: {error}"), 5)
        }
    }
}

/// Reads guest lines until an exit command or end of input. A failed turn is
/// reported and the session carries on with the thread as it was.
pub fn run_session<R, W>(
    runtime: &Runtime,
    agent: &AgentRuntime,
    mut input: R,
    mut output: W,
) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "{WELCOME_BANNER}")?;
    writeln!(output, "{EXIT_HINT}\n")?;

    let mut thread = ConversationThread::new();
    loop {
        write!(output, "{USER_PROMPT}")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if is_exit_command(text) {
            break;
        }

        let turn = runtime.block_on(agent.invoke(&mut thread, text, |event| {
            let _ = writeln!(output, "{}", format_event(event));
        }));

        match turn {
            Ok(reply) => writeln!(output, "{}", format_reply(agent.name(), &reply.content))?,
            Err(error) => {
                warn!(event_name = "agent.session.turn_failed", error = %error, "turn failed");
                writeln!(output, "{TURN_FAILED}\n")?;
            }
        }
    }

    Ok(())
}
