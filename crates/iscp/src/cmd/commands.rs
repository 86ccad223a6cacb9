use crate::cmd::{load_commands, Globals};
use crate::exit::{CliResult, SUCCESS};
use crate::output::print_commands;

pub fn run(globals: &Globals) -> CliResult<i32> {
    let table = load_commands(globals.commands.as_ref())?;
    print_commands(&table, globals.format);
    Ok(SUCCESS)
}
