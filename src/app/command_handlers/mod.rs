use crate::app::cli::{help_text, parse_cli_verb, CliVerb};

pub mod automation;
pub mod cases;
pub mod export;
pub mod setup;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    if args.is_empty() {
        return Ok(help_text());
    }

    match parse_cli_verb(args[0].as_str()) {
        CliVerb::Setup => setup::cmd_setup(),
        CliVerb::Steps => cases::cmd_steps(),
        CliVerb::Cases => cases::cmd_cases(&args[1..]),
        CliVerb::Stats => cases::cmd_stats(),
        CliVerb::Questions => cases::cmd_questions(),
        CliVerb::Status => cases::cmd_status(&args[1..]),
        CliVerb::Run => automation::cmd_run(&args[1..]),
        CliVerb::Watch => automation::cmd_watch(&args[1..]),
        CliVerb::Cancel => automation::cmd_cancel(&args[1..]),
        CliVerb::Export => export::cmd_export(&args[1..]),
        CliVerb::Unknown => Err(format!("unknown command `{}`", args[0])),
    }
}
