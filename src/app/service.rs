use super::error::AppError;
use crate::report::{OutputFileFetcher, ReportExtractor, ReportKind};
use crate::shared::ids::{ProjectId, TaskId};
use crate::shared::logging::{append_workflow_log, append_workflow_log_with, payload_digest};
use crate::shared::time::now_secs;
use crate::store::{ProjectRecord, WorkflowStateStore};
use crate::task_service::{
    parse_webhook, select_task_result, TaskHandle, TaskService, TaskState,
};
use crate::workflow::{
    approve_phase, ingest, phase_definition, prepare_advance, CompanyBrief, DisplayStatus,
    IngestErrorKind, Phase, PhaseExtras, PromptContext, WorkflowError, WorkflowState,
};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Committed {
        phase: Phase,
        derived_status: DisplayStatus,
        report_kind: ReportKind,
    },
    Rejected {
        phase: Phase,
        error_kind: IngestErrorKind,
    },
    /// The task has not finished; nothing was extracted.
    NotReady { task_status: TaskState },
}

impl IngestOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    /// Response shape of the "ingest latest result" operation.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Committed {
                phase,
                derived_status,
                ..
            } => json!({
                "committed": true,
                "phase": phase.as_str(),
                "derivedStatus": derived_status.as_str(),
            }),
            Self::Rejected { error_kind, .. } => json!({
                "committed": false,
                "errorKind": error_kind.as_str(),
            }),
            Self::NotReady { task_status } => json!({
                "committed": false,
                "errorKind": IngestErrorKind::NoReportFound.as_str(),
                "taskStatus": task_status.as_str(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Verified,
    Ignored {
        task_id: String,
        event_type: Option<String>,
        stop_reason: Option<String>,
    },
    Ingested {
        project_id: ProjectId,
        outcome: IngestOutcome,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Provisioned {
    pub record: ProjectRecord,
    pub task: TaskHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Advanced {
    pub next_phase: Phase,
    pub derived_status: DisplayStatus,
    pub task: Option<TaskHandle>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectStatus {
    pub record: ProjectRecord,
    pub derived_status: DisplayStatus,
}

/// Request-layer operations over one project store, one task service and
/// one output-file fetcher.
pub struct ProjectService<T, F> {
    store: WorkflowStateStore,
    tasks: T,
    extractor: ReportExtractor<F>,
    state_root: PathBuf,
    prompt_defaults: PhaseExtras,
}

impl<T: TaskService, F: OutputFileFetcher> ProjectService<T, F> {
    pub fn new(store: WorkflowStateStore, tasks: T, fetcher: F, state_root: &Path) -> Self {
        Self {
            store,
            tasks,
            extractor: ReportExtractor::new(fetcher),
            state_root: state_root.to_path_buf(),
            prompt_defaults: PhaseExtras::default(),
        }
    }

    /// Counts and criteria used when a request leaves them unset.
    pub fn with_prompt_defaults(mut self, defaults: PhaseExtras) -> Self {
        self.prompt_defaults = defaults;
        self
    }

    pub fn store(&self) -> &WorkflowStateStore {
        &self.store
    }

    pub fn tasks(&self) -> &T {
        &self.tasks
    }

    pub fn provision(
        &self,
        project_id: &ProjectId,
        brief: CompanyBrief,
    ) -> Result<Provisioned, AppError> {
        if self.store.exists(project_id)? {
            return Err(crate::store::StoreError::DuplicateProject {
                project_id: project_id.to_string(),
            }
            .into());
        }

        let extras = PhaseExtras {
            brief: Some(brief),
            ..PhaseExtras::default()
        };
        let phase_data = Default::default();
        let ctx = PromptContext::new(&phase_data, &extras);
        let prompt = (phase_definition(Phase::CompanyReport).build_prompt)(&ctx)?;

        let task = self.tasks.create_task(&prompt)?;
        let record = self
            .store
            .provision(project_id, Some(&task.task_id), now_secs())?;
        append_workflow_log(
            &self.state_root,
            "info",
            "project.provisioned",
            &format!("project={} task={}", project_id, task.task_id),
        );
        Ok(Provisioned { record, task })
    }

    pub fn status(&self, project_id: &ProjectId) -> Result<ProjectStatus, AppError> {
        let record = self.store.load(project_id)?;
        let derived_status = record.workflow_state.derived_status();
        Ok(ProjectStatus {
            record,
            derived_status,
        })
    }

    /// Polls the project's task and ingests its result once completed.
    pub fn ingest_latest(&self, project_id: &ProjectId) -> Result<IngestOutcome, AppError> {
        let record = self.store.load(project_id)?;
        ensure_ingestable(&record.workflow_state)?;
        let task_id = record
            .task_id
            .clone()
            .ok_or_else(|| AppError::MissingTask {
                project_id: project_id.to_string(),
            })?;

        let status = self.tasks.task_status(&task_id)?;
        if status.status != TaskState::Completed {
            append_workflow_log(
                &self.state_root,
                "info",
                "ingest.not_ready",
                &format!("project={} task={} status={}", project_id, task_id, status.status),
            );
            return Ok(IngestOutcome::NotReady {
                task_status: status.status,
            });
        }

        let payload = select_task_result(&status).cloned().unwrap_or(Value::Null);
        self.ingest_record(&record, &payload, "task_status")
    }

    pub fn ingest_payload(
        &self,
        project_id: &ProjectId,
        payload: &Value,
    ) -> Result<IngestOutcome, AppError> {
        let record = self.store.load(project_id)?;
        ensure_ingestable(&record.workflow_state)?;
        self.ingest_record(&record, payload, "payload")
    }

    pub fn handle_webhook(&self, body: &Value) -> Result<WebhookOutcome, AppError> {
        let event = parse_webhook(body);
        let Some(raw_task_id) = event.task_id.clone() else {
            append_workflow_log(&self.state_root, "info", "webhook.verified", "no task id");
            return Ok(WebhookOutcome::Verified);
        };
        if !event.is_completion() {
            append_workflow_log(
                &self.state_root,
                "info",
                "webhook.ignored",
                &format!(
                    "task={} event={} stop_reason={}",
                    raw_task_id,
                    event.event_type.as_deref().unwrap_or("-"),
                    event.stop_reason.as_deref().unwrap_or("-")
                ),
            );
            return Ok(WebhookOutcome::Ignored {
                task_id: raw_task_id,
                event_type: event.event_type,
                stop_reason: event.stop_reason,
            });
        }

        let task_id = TaskId::parse(&raw_task_id).map_err(AppError::InvalidInput)?;
        let record = self
            .store
            .find_by_task_id(&task_id)?
            .ok_or_else(|| AppError::UnknownTask {
                task_id: raw_task_id.clone(),
            })?;

        let outcome = match event.inline_result.as_ref() {
            Some(payload) => {
                ensure_ingestable(&record.workflow_state)?;
                self.ingest_record(&record, payload, "webhook")?
            }
            None => self.ingest_latest(&record.project_id)?,
        };
        Ok(WebhookOutcome::Ingested {
            project_id: record.project_id,
            outcome,
        })
    }

    /// Approves the current phase's committed report.
    pub fn approve(
        &self,
        project_id: &ProjectId,
        approver: &str,
    ) -> Result<WorkflowState, AppError> {
        let record = self.store.load(project_id)?;
        let phase = record.workflow_state.current_phase;
        let next = approve_phase(&record.workflow_state, phase, approver, now_secs())?;
        if next != record.workflow_state {
            self.store.save(project_id, &next, now_secs())?;
            append_workflow_log(
                &self.state_root,
                "info",
                "phase.approved",
                &format!("project={} phase={} by={}", project_id, phase, approver),
            );
        }
        Ok(next)
    }

    /// Renders the next phase's prompt without dispatching or saving.
    pub fn preview_next_prompt(
        &self,
        project_id: &ProjectId,
        extras: PhaseExtras,
    ) -> Result<(Phase, String), AppError> {
        let record = self.store.load(project_id)?;
        let extras = extras.or_defaults(&self.prompt_defaults);
        let advance = prepare_advance(&record.workflow_state, &extras)?;
        Ok((advance.next_phase, advance.prompt))
    }

    /// Moves the project to its next phase. The prompt is sent to the task
    /// service before the advanced state is saved, so a dispatch failure
    /// leaves the stored phase unchanged.
    pub fn advance(
        &self,
        project_id: &ProjectId,
        extras: PhaseExtras,
    ) -> Result<Advanced, AppError> {
        let record = self.store.load(project_id)?;
        let extras = extras.or_defaults(&self.prompt_defaults);
        let advance = prepare_advance(&record.workflow_state, &extras)?;

        let task = if advance.prompt.is_empty() {
            None
        } else {
            let task_id = record
                .task_id
                .as_ref()
                .ok_or_else(|| AppError::MissingTask {
                    project_id: project_id.to_string(),
                })?;
            let handle = self.tasks.continue_task(task_id, &advance.prompt)?;
            if &handle.task_id != task_id {
                self.store
                    .set_task_id(project_id, &handle.task_id, now_secs())?;
            }
            Some(handle)
        };

        self.store.save(project_id, &advance.state, now_secs())?;
        append_workflow_log(
            &self.state_root,
            "info",
            "phase.advanced",
            &format!(
                "project={} from={} to={}",
                project_id, record.workflow_state.current_phase, advance.next_phase
            ),
        );
        Ok(Advanced {
            next_phase: advance.next_phase,
            derived_status: advance.state.derived_status(),
            task,
        })
    }

    fn ingest_record(
        &self,
        record: &ProjectRecord,
        payload: &Value,
        source: &str,
    ) -> Result<IngestOutcome, AppError> {
        let phase = record.workflow_state.current_phase;
        let digest = payload_digest(payload);
        let fields = |extra: &[(&str, Value)]| {
            let mut map = Map::from_iter([
                ("project_id".to_string(), json!(record.project_id.as_str())),
                ("phase".to_string(), json!(phase.as_str())),
                ("payload_sha256".to_string(), json!(digest)),
                ("source".to_string(), json!(source)),
            ]);
            for (key, value) in extra {
                map.insert((*key).to_string(), value.clone());
            }
            map
        };

        let result = ingest(&record.workflow_state, payload, &self.extractor);
        for note in &result.notes {
            append_workflow_log_with(
                &self.state_root,
                "warn",
                "ingest.note",
                &note.to_string(),
                fields(&[]),
            );
        }

        if let Some(error_kind) = result.error {
            append_workflow_log_with(
                &self.state_root,
                "info",
                "ingest.rejected",
                error_kind.as_str(),
                fields(&[]),
            );
            return Ok(IngestOutcome::Rejected { phase, error_kind });
        }

        let Some(report_kind) = result.report_kind else {
            return Ok(IngestOutcome::Rejected {
                phase,
                error_kind: IngestErrorKind::NoReportFound,
            });
        };
        self.store
            .save(&record.project_id, &result.state, now_secs())?;
        append_workflow_log_with(
            &self.state_root,
            "info",
            "ingest.committed",
            report_kind.as_str(),
            fields(&[("derived_status", json!(result.derived_status.as_str()))]),
        );
        Ok(IngestOutcome::Committed {
            phase,
            derived_status: result.derived_status,
            report_kind,
        })
    }
}

fn ensure_ingestable(state: &WorkflowState) -> Result<(), WorkflowError> {
    if state.current_phase.is_terminal() {
        return Err(WorkflowError::WorkflowCompleted);
    }
    Ok(())
}
