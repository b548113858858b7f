#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Project,
    Webhook,
    Extract,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "project" => CliVerb::Project,
        "webhook" => CliVerb::Webhook,
        "extract" => CliVerb::Extract,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Commands:".to_string(),
        "  project list                               List provisioned projects".to_string(),
        "  project provision <project> <brief.yaml>   Create the phase 1 task for a new project"
            .to_string(),
        "  project status <project>                   Show phase, status and completed phases"
            .to_string(),
        "  project ingest <project>                   Ingest the latest task result".to_string(),
        "  project ingest-file <project> <file.json>  Ingest a saved task payload".to_string(),
        "  project approve <project> [approver]       Approve the current phase's report"
            .to_string(),
        "  project advance <project> [extras.yaml]    Send the next phase's prompt".to_string(),
        "  project prompt <project> [extras.yaml]     Print the next phase's prompt".to_string(),
        "  project report <project> <phase>           Print a committed phase report".to_string(),
        "  webhook <body.json>                        Handle a saved task-service webhook body"
            .to_string(),
        "  extract <file.json>                        Print the report found in a payload"
            .to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    cli_help_lines().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_parse_and_unknown_falls_through() {
        assert_eq!(parse_cli_verb("project"), CliVerb::Project);
        assert_eq!(parse_cli_verb("--help"), CliVerb::Help);
        assert_eq!(parse_cli_verb("deploy"), CliVerb::Unknown);
        assert!(help_text().contains("project provision"));
    }
}
