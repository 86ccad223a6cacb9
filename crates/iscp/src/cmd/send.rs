use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use iscp_frame::Message;
use iscp_session::CommandTable;
use tracing::{debug, warn};

use crate::cmd::{load_commands, open_session, parse_duration, Globals, SendArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::print_message;

pub fn run(args: SendArgs, globals: &Globals) -> CliResult<i32> {
    let wait = parse_duration(&args.wait)?;
    let table = Arc::new(load_commands(globals.commands.as_ref())?);

    // Reject typos before touching the device.
    let messages = resolve_all(&table, &args.commands)?;

    let (mut session, label) = open_session(&args.device, table)?;

    let completed = Arc::new(AtomicUsize::new(0));
    for message in messages {
        let completed = Arc::clone(&completed);
        session
            .send(message, move || {
                completed.fetch_add(1, Ordering::SeqCst);
            })
            .map_err(|err| session_error("send failed", err))?;
    }

    let total = args.commands.len();
    let deadline = Instant::now() + wait;
    while completed.load(Ordering::SeqCst) < total {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match session.read(Some(remaining)) {
            Ok(Some(message)) => print_message(&message, &label, globals.format),
            Ok(None) => break,
            Err(err) => return Err(session_error("receive failed", err)),
        }
    }

    let done = completed.load(Ordering::SeqCst);
    debug!(done, total, "send finished");
    if done < total {
        warn!(pending = total - done, "receiver did not answer every command");
        return Err(CliError::new(
            TIMEOUT,
            format!(
                "{} of {total} commands unacknowledged after {wait:?}",
                total - done
            ),
        ));
    }

    Ok(SUCCESS)
}

fn resolve_all(table: &CommandTable, inputs: &[String]) -> CliResult<Vec<Message>> {
    inputs
        .iter()
        .map(|input| {
            table
                .resolve(input)
                .map_err(|err| session_error("cannot send", err))
        })
        .collect()
}
