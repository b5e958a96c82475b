use super::{commands, dispatch, telemetry};
use anyhow::Result;

/// Main orchestrator
///
/// 1. Parse: Extract CLI arguments
/// 2. Extract Verbosity: Convert flag count to logging level
/// 3. Initialize Telemetry: Set up structured logging on stderr
/// 4. Dispatch: Convert `ArgMatches` into typed Action enum
/// 5. Execute: Run the action's business logic
///
/// # Errors
///
/// Returns an error if any step in the flow fails
pub async fn start() -> Result<()> {
    let matches = commands::new().get_matches();

    let verbosity = extract_verbosity(&matches);

    telemetry::init(verbosity)?;

    let action = dispatch::handler(&matches)?;

    action.execute().await
}

/// `-v` is global, so it may be given before or after the subcommand
fn extract_verbosity(matches: &clap::ArgMatches) -> u8 {
    let top = matches.get_count("verbosity");
    let sub = matches
        .subcommand()
        .map_or(0, |(_, sub)| sub.get_count("verbosity"));
    top.max(sub)
}
