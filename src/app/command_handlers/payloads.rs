use super::project::render_ingest;
use crate::app::command_support::{
    load_optional_settings, load_settings, map_app_err, open_project_service, read_json_file,
};
use crate::app::WebhookOutcome;
use crate::report::{select_best_message, HttpOutputFileFetcher, ReportExtractor};
use serde_json::Value;

pub fn cmd_webhook(args: &[String]) -> Result<String, String> {
    if args.len() != 1 {
        return Err("usage: webhook <body.json>".to_string());
    }
    let body = read_json_file(&args[0])?;
    let settings = load_settings()?;
    let service = open_project_service(&settings)?;
    match service.handle_webhook(&body).map_err(map_app_err)? {
        WebhookOutcome::Verified => Ok("webhook=verified".to_string()),
        WebhookOutcome::Ignored {
            task_id,
            event_type,
            stop_reason,
        } => Ok(format!(
            "webhook=ignored\ntask={}\nevent_type={}\nstop_reason={}",
            task_id,
            event_type.as_deref().unwrap_or("-"),
            stop_reason.as_deref().unwrap_or("-")
        )),
        WebhookOutcome::Ingested {
            project_id,
            outcome,
        } => Ok(format!(
            "webhook=ingested\nproject={}\n{}",
            project_id,
            render_ingest(&outcome)
        )),
    }
}

pub fn cmd_extract(args: &[String]) -> Result<String, String> {
    if args.len() != 1 {
        return Err("usage: extract <payload.json>".to_string());
    }
    let payload = read_json_file(&args[0])?;
    let fetcher = match load_optional_settings()? {
        Some(settings) => HttpOutputFileFetcher::from_settings(&settings.output_files),
        None => HttpOutputFileFetcher::default(),
    };
    let candidate = match &payload {
        Value::Array(messages) => select_best_message(messages).unwrap_or(&payload),
        other => other,
    };
    let extraction = ReportExtractor::new(fetcher).extract(candidate);

    let mut lines = extraction
        .notes
        .iter()
        .map(|note| format!("note={note}"))
        .collect::<Vec<_>>();
    match extraction.report {
        Some(report) => {
            lines.push(format!("report_kind={}", report.kind()));
            lines.push(
                serde_json::to_string_pretty(&report)
                    .map_err(|e| format!("failed to encode report: {e}"))?,
            );
            Ok(lines.join("\n"))
        }
        None => {
            lines.push("no report found".to_string());
            Err(lines.join("\n"))
        }
    }
}
