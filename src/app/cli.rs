#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Setup,
    Steps,
    Cases,
    Stats,
    Questions,
    Status,
    Run,
    Watch,
    Cancel,
    Export,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "setup" => CliVerb::Setup,
        "steps" => CliVerb::Steps,
        "cases" => CliVerb::Cases,
        "stats" => CliVerb::Stats,
        "questions" => CliVerb::Questions,
        "status" => CliVerb::Status,
        "run" => CliVerb::Run,
        "watch" => CliVerb::Watch,
        "cancel" => CliVerb::Cancel,
        "export" => CliVerb::Export,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Commands:".to_string(),
        "  setup                                Write default config and create the state root"
            .to_string(),
        "  steps                                List the automation workflow steps".to_string(),
        "  cases [tab]                          List cases (all|pending|running|review|feedback|completed)"
            .to_string(),
        "  stats                                Show dashboard counters".to_string(),
        "  questions                            List form questions and follow-up triggers"
            .to_string(),
        "  status <case>                        Show the backend automation status for a case"
            .to_string(),
        "  run <case>... [--resume [<step>]]    Drive automation headless until done or gated"
            .to_string(),
        "  watch <case> [--resume [<step>]]     Drive one case in the terminal dashboard"
            .to_string(),
        "  cancel <case>                        Cancel a running automation".to_string(),
        "  export <case> <path.pdf>             Download the completed form as PDF".to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    cli_help_lines().join("\n")
}
