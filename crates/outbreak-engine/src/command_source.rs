//! Control commands read as JSON lines.
//!
//! Each non-blank line is one [`Command`], e.g.
//! `{"type":"apply_jurisdiction_policy","payload":{"jurisdiction_id":"E1","policy":{...}}}`.
//! Lines that do not parse are skipped with a warning. End of input sends
//! `Quit`, so piping a finite script into the engine ends the run.
//!
//! Reading is blocking and runs on its own thread, so a stdin read that
//! never completes does not hold up runtime shutdown.

use std::io::BufRead;
use std::thread::JoinHandle;

use outbreak_core::{CommandSender, KernelError};
use outbreak_types::{Command, CommandType};
use tracing::{debug, info, warn};

/// Forward commands from `reader` to the simulation until `Quit` or end of
/// input. Returns the number of commands delivered.
///
/// Each delivery waits until the kernel has taken the previous command.
pub fn forward_commands<R: BufRead>(reader: R, sender: &CommandSender) -> Result<u64, KernelError> {
    let mut forwarded: u64 = 0;

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "command input failed");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command: Command = match serde_json::from_str(line) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, line, "skipping unreadable command");
                continue;
            }
        };
        let is_quit = command.command_type == CommandType::Quit;
        debug!(command_type = %command.command_type, "forwarding command");
        sender.blocking_send(command)?;
        forwarded = forwarded.saturating_add(1);
        if is_quit {
            return Ok(forwarded);
        }
    }

    info!("command input closed, requesting quit");
    sender.blocking_send(Command::quit())?;
    Ok(forwarded.saturating_add(1))
}

/// Read commands from stdin on a detached thread.
pub fn spawn_stdin(sender: CommandSender) -> std::io::Result<JoinHandle<Result<u64, KernelError>>> {
    std::thread::Builder::new()
        .name("command-stdin".to_owned())
        .spawn(move || forward_commands(std::io::stdin().lock(), &sender))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use outbreak_core::{EndReason, Simulation, SimulationConfig, SimulationResult};

    use super::*;

    async fn run_script(script: &'static str) -> (u64, SimulationResult) {
        let mut sim = Simulation::new(&SimulationConfig::default()).unwrap();
        let sender = sim.command_sender();
        let reader =
            tokio::task::spawn_blocking(move || forward_commands(script.as_bytes(), &sender));
        let result = sim.start().await.unwrap();
        (reader.await.unwrap().unwrap(), result)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn end_of_input_sends_quit() {
        let (forwarded, result) =
            run_script("{\"type\":\"pause\"}\n\n{\"type\":\"resume\"}\n").await;
        assert_eq!(forwarded, 3);
        assert_eq!(result.end_reason, EndReason::Quit);
        assert_eq!(result.commands_processed, 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreadable_lines_are_skipped() {
        let (forwarded, result) = run_script("not json\n{\"type\":\"launch\"}\n").await;
        assert_eq!(forwarded, 1);
        assert_eq!(result.commands_processed, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn explicit_quit_stops_reading() {
        let (forwarded, result) =
            run_script("{\"type\":\"quit\"}\n{\"type\":\"pause\"}\n").await;
        assert_eq!(forwarded, 1);
        assert_eq!(result.commands_processed, 1);
    }
}
