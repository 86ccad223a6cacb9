use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cmd::{load_commands, open_session, Globals, ListenArgs};
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::print_message;

/// How often the read loop wakes to check for Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub fn run(args: ListenArgs, globals: &Globals) -> CliResult<i32> {
    let table = Arc::new(load_commands(globals.commands.as_ref())?);
    let (mut session, label) = open_session(&args.device, table)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let message = match session.read(Some(POLL_INTERVAL)) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(err) => return Err(session_error("receive failed", err)),
        };

        print_message(&message, &label, globals.format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                return Ok(SUCCESS);
            }
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
