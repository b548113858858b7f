use crate::app::cli::{help_text, parse_cli_verb, CliVerb};

pub mod payloads;
pub mod project;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    if args.is_empty() {
        return Ok(help_text());
    }

    match parse_cli_verb(args[0].as_str()) {
        CliVerb::Project => project::cmd_project(&args[1..]),
        CliVerb::Webhook => payloads::cmd_webhook(&args[1..]),
        CliVerb::Extract => payloads::cmd_extract(&args[1..]),
        CliVerb::Help => Ok(help_text()),
        CliVerb::Unknown => Err(format!("unknown command `{}`", args[0])),
    }
}
