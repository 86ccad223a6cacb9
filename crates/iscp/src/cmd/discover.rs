use iscp_session::{discover_with_config, DiscoveryConfig};

use crate::cmd::{parse_duration, DiscoverArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_device, OutputFormat};

pub fn run(args: DiscoverArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = DiscoveryConfig {
        timeout: parse_duration(&args.timeout)?,
        ..DiscoveryConfig::default()
    };
    if let Some(target) = args.target {
        config.target = target;
    }

    let device = discover_with_config(&config).map_err(|err| session_error("discovery failed", err))?;
    print_device(&device, format);
    Ok(SUCCESS)
}
