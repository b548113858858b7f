use crate::app::command_support::{
    default_approver, load_settings, map_app_err, open_project_service, parse_project_id,
    read_json_file, read_yaml_file,
};
use crate::app::{IngestOutcome, ProjectStatus};
use crate::shared::time::format_timestamp;
use crate::workflow::{CompanyBrief, Phase, PhaseExtras};

pub fn cmd_project(args: &[String]) -> Result<String, String> {
    if args.is_empty() {
        return Err(
            "usage: project <list|provision|status|ingest|ingest-file|approve|advance|prompt|report> ..."
                .to_string(),
        );
    }

    match args[0].as_str() {
        "list" => {
            if args.len() != 1 {
                return Err("usage: project list".to_string());
            }
            let settings = load_settings()?;
            let service = open_project_service(&settings)?;
            let records = service.store().list_projects().map_err(|e| e.to_string())?;
            if records.is_empty() {
                return Ok("no projects".to_string());
            }
            Ok(records
                .iter()
                .map(|record| {
                    format!(
                        "{} phase={} status={}",
                        record.project_id,
                        record.workflow_state.current_phase,
                        record.workflow_state.derived_status()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }
        "provision" => {
            if args.len() != 3 {
                return Err("usage: project provision <project_id> <brief.yaml>".to_string());
            }
            let project_id = parse_project_id(&args[1])?;
            let brief: CompanyBrief = read_yaml_file(&args[2])?;
            let settings = load_settings()?;
            let service = open_project_service(&settings)?;
            let provisioned = service
                .provision(&project_id, brief)
                .map_err(map_app_err)?;
            let mut lines = vec![
                "project provisioned".to_string(),
                format!("project={}", project_id),
                format!("task={}", provisioned.task.task_id),
                format!("phase={}", provisioned.record.workflow_state.current_phase),
            ];
            if let Some(url) = provisioned.task.task_url {
                lines.push(format!("task_url={url}"));
            }
            Ok(lines.join("\n"))
        }
        "status" => {
            if args.len() != 2 {
                return Err("usage: project status <project_id>".to_string());
            }
            let project_id = parse_project_id(&args[1])?;
            let settings = load_settings()?;
            let service = open_project_service(&settings)?;
            let status = service.status(&project_id).map_err(map_app_err)?;
            Ok(render_status(&status))
        }
        "ingest" => {
            if args.len() != 2 {
                return Err("usage: project ingest <project_id>".to_string());
            }
            let project_id = parse_project_id(&args[1])?;
            let settings = load_settings()?;
            let service = open_project_service(&settings)?;
            let outcome = service.ingest_latest(&project_id).map_err(map_app_err)?;
            Ok(render_ingest(&outcome))
        }
        "ingest-file" => {
            if args.len() != 3 {
                return Err("usage: project ingest-file <project_id> <payload.json>".to_string());
            }
            let project_id = parse_project_id(&args[1])?;
            let payload = read_json_file(&args[2])?;
            let settings = load_settings()?;
            let service = open_project_service(&settings)?;
            let outcome = service
                .ingest_payload(&project_id, &payload)
                .map_err(map_app_err)?;
            Ok(render_ingest(&outcome))
        }
        "approve" => {
            if !(2..=3).contains(&args.len()) {
                return Err("usage: project approve <project_id> [approver]".to_string());
            }
            let project_id = parse_project_id(&args[1])?;
            let approver = args.get(2).cloned().unwrap_or_else(default_approver);
            let settings = load_settings()?;
            let service = open_project_service(&settings)?;
            let state = service
                .approve(&project_id, &approver)
                .map_err(map_app_err)?;
            let approval = state.approval(state.current_phase);
            Ok(format!(
                "phase approved\nproject={}\nphase={}\napproved_by={}\nstatus={}",
                project_id,
                state.current_phase,
                approval.map(|a| a.approved_by.as_str()).unwrap_or("-"),
                state.derived_status()
            ))
        }
        "advance" => {
            if !(2..=3).contains(&args.len()) {
                return Err("usage: project advance <project_id> [extras.yaml]".to_string());
            }
            let project_id = parse_project_id(&args[1])?;
            let extras = read_extras(args.get(2))?;
            let settings = load_settings()?;
            let service = open_project_service(&settings)?;
            let advanced = service
                .advance(&project_id, extras)
                .map_err(map_app_err)?;
            let mut lines = vec![
                "phase advanced".to_string(),
                format!("project={}", project_id),
                format!("phase={}", advanced.next_phase),
                format!("status={}", advanced.derived_status),
            ];
            if let Some(task) = advanced.task {
                lines.push(format!("task={}", task.task_id));
            }
            Ok(lines.join("\n"))
        }
        "prompt" => {
            if !(2..=3).contains(&args.len()) {
                return Err("usage: project prompt <project_id> [extras.yaml]".to_string());
            }
            let project_id = parse_project_id(&args[1])?;
            let extras = read_extras(args.get(2))?;
            let settings = load_settings()?;
            let service = open_project_service(&settings)?;
            let (phase, prompt) = service
                .preview_next_prompt(&project_id, extras)
                .map_err(map_app_err)?;
            Ok(format!("phase={phase}\n\n{prompt}"))
        }
        "report" => {
            if args.len() != 3 {
                return Err("usage: project report <project_id> <phase>".to_string());
            }
            let project_id = parse_project_id(&args[1])?;
            let phase = Phase::parse(&args[2])?;
            let settings = load_settings()?;
            let service = open_project_service(&settings)?;
            let status = service.status(&project_id).map_err(map_app_err)?;
            let report = status
                .record
                .workflow_state
                .report(phase)
                .ok_or_else(|| format!("phase `{phase}` has no committed report"))?;
            serde_json::to_string_pretty(report)
                .map_err(|e| format!("failed to encode report: {e}"))
        }
        other => Err(format!("unknown project subcommand `{other}`")),
    }
}

fn read_extras(path: Option<&String>) -> Result<PhaseExtras, String> {
    match path {
        Some(path) => read_yaml_file(path),
        None => Ok(PhaseExtras::default()),
    }
}

fn render_status(status: &ProjectStatus) -> String {
    let record = &status.record;
    let state = &record.workflow_state;
    let completed = state
        .phases_completed
        .iter()
        .map(|phase| phase.as_str())
        .collect::<Vec<_>>();
    let approved = state
        .approvals
        .keys()
        .map(|phase| phase.as_str())
        .collect::<Vec<_>>();
    [
        format!("project={}", record.project_id),
        format!(
            "task={}",
            record
                .task_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string())
        ),
        format!("current_phase={}", state.current_phase),
        format!("status={}", status.derived_status),
        format!("phases_completed={}", completed.join(",")),
        format!("approved={}", approved.join(",")),
        format!("updated_at={}", format_timestamp(record.updated_at)),
    ]
    .join("\n")
}

pub(crate) fn render_ingest(outcome: &IngestOutcome) -> String {
    match outcome {
        IngestOutcome::Committed {
            phase,
            derived_status,
            report_kind,
        } => format!(
            "committed=true\nphase={phase}\nreport_kind={report_kind}\nstatus={derived_status}"
        ),
        IngestOutcome::Rejected { phase, error_kind } => {
            format!("committed=false\nphase={phase}\nerror_kind={error_kind}")
        }
        IngestOutcome::NotReady { task_status } => {
            format!("committed=false\ntask_status={task_status}")
        }
    }
}
