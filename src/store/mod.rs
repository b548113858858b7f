use crate::shared::ids::{ProjectId, TaskId};
use crate::workflow::WorkflowState;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};

pub const DATABASE_FILE_NAME: &str = "phaseflow.sqlite3";

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRecord {
    pub project_id: ProjectId,
    pub task_id: Option<TaskId>,
    pub workflow_state: WorkflowState,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite open failed at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to create state database parent {path}: {source}")]
    CreateParent {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sqlite statement failed: {source}")]
    Sql {
        #[source]
        source: rusqlite::Error,
    },
    #[error("project `{project_id}` already exists")]
    DuplicateProject { project_id: String },
    #[error("project `{project_id}` not found")]
    UnknownProject { project_id: String },
    #[error("workflow state for `{project_id}` is not valid json: {source}")]
    DecodeState {
        project_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode workflow state for `{project_id}`: {source}")]
    EncodeState {
        project_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid id in database: {0}")]
    InvalidId(String),
}

/// Per-project workflow rows. `workflow_state` holds the whole
/// [`WorkflowState`] as json and is only ever replaced as a unit.
pub struct WorkflowStateStore {
    db_path: PathBuf,
}

impl WorkflowStateStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateParent {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_state_root(state_root: &Path) -> Result<Self, StoreError> {
        Self::open(&state_root.join(DATABASE_FILE_NAME))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let connection = self.connect()?;
        connection
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS projects (
                    project_id TEXT PRIMARY KEY,
                    task_id TEXT,
                    workflow_state TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_projects_task_id
                    ON projects(task_id);
                ",
            )
            .map_err(|source| StoreError::Sql { source })
    }

    /// Inserts a project at the initial workflow state.
    pub fn provision(
        &self,
        project_id: &ProjectId,
        task_id: Option<&TaskId>,
        now: i64,
    ) -> Result<ProjectRecord, StoreError> {
        let state = WorkflowState::new();
        let encoded = encode_state(project_id, &state)?;
        let connection = self.connect()?;
        let inserted = connection
            .execute(
                "
                INSERT OR IGNORE INTO projects
                    (project_id, task_id, workflow_state, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                ",
                params![
                    project_id.as_str(),
                    task_id.map(TaskId::as_str),
                    encoded,
                    now
                ],
            )
            .map_err(|source| StoreError::Sql { source })?;
        if inserted == 0 {
            return Err(StoreError::DuplicateProject {
                project_id: project_id.to_string(),
            });
        }

        Ok(ProjectRecord {
            project_id: project_id.clone(),
            task_id: task_id.cloned(),
            workflow_state: state,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn exists(&self, project_id: &ProjectId) -> Result<bool, StoreError> {
        let connection = self.connect()?;
        let exists = connection
            .query_row(
                "SELECT 1 FROM projects WHERE project_id = ?1 LIMIT 1",
                params![project_id.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(|source| StoreError::Sql { source })?
            .is_some();
        Ok(exists)
    }

    pub fn load(&self, project_id: &ProjectId) -> Result<ProjectRecord, StoreError> {
        let connection = self.connect()?;
        let row = connection
            .query_row(
                "
                SELECT project_id, task_id, workflow_state, created_at, updated_at
                FROM projects
                WHERE project_id = ?1
                ",
                params![project_id.as_str()],
                read_row,
            )
            .optional()
            .map_err(|source| StoreError::Sql { source })?;
        match row {
            Some(raw) => raw.into_record(),
            None => Err(StoreError::UnknownProject {
                project_id: project_id.to_string(),
            }),
        }
    }

    /// Replaces the whole workflow state. Concurrent writers are
    /// last-write-wins.
    pub fn save(
        &self,
        project_id: &ProjectId,
        state: &WorkflowState,
        now: i64,
    ) -> Result<(), StoreError> {
        let encoded = encode_state(project_id, state)?;
        let connection = self.connect()?;
        let updated = connection
            .execute(
                "
                UPDATE projects
                SET workflow_state = ?2, updated_at = ?3
                WHERE project_id = ?1
                ",
                params![project_id.as_str(), encoded, now],
            )
            .map_err(|source| StoreError::Sql { source })?;
        if updated == 0 {
            return Err(StoreError::UnknownProject {
                project_id: project_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn set_task_id(
        &self,
        project_id: &ProjectId,
        task_id: &TaskId,
        now: i64,
    ) -> Result<(), StoreError> {
        let connection = self.connect()?;
        let updated = connection
            .execute(
                "
                UPDATE projects
                SET task_id = ?2, updated_at = ?3
                WHERE project_id = ?1
                ",
                params![project_id.as_str(), task_id.as_str(), now],
            )
            .map_err(|source| StoreError::Sql { source })?;
        if updated == 0 {
            return Err(StoreError::UnknownProject {
                project_id: project_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn find_by_task_id(&self, task_id: &TaskId) -> Result<Option<ProjectRecord>, StoreError> {
        let connection = self.connect()?;
        let row = connection
            .query_row(
                "
                SELECT project_id, task_id, workflow_state, created_at, updated_at
                FROM projects
                WHERE task_id = ?1
                ORDER BY updated_at DESC
                LIMIT 1
                ",
                params![task_id.as_str()],
                read_row,
            )
            .optional()
            .map_err(|source| StoreError::Sql { source })?;
        row.map(RawProjectRow::into_record).transpose()
    }

    pub fn list_projects(&self) -> Result<Vec<ProjectRecord>, StoreError> {
        let connection = self.connect()?;
        let mut statement = connection
            .prepare(
                "
                SELECT project_id, task_id, workflow_state, created_at, updated_at
                FROM projects
                ORDER BY project_id ASC
                ",
            )
            .map_err(|source| StoreError::Sql { source })?;

        let rows = statement
            .query_map([], read_row)
            .map_err(|source| StoreError::Sql { source })?;

        let mut out = Vec::new();
        for row in rows {
            let raw = row.map_err(|source| StoreError::Sql { source })?;
            out.push(raw.into_record()?);
        }
        Ok(out)
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let connection = Connection::open(&self.db_path).map_err(|source| StoreError::Open {
            path: self.db_path.display().to_string(),
            source,
        })?;
        connection
            .execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|source| StoreError::Sql { source })?;
        Ok(connection)
    }
}

struct RawProjectRow {
    project_id: String,
    task_id: Option<String>,
    workflow_state: String,
    created_at: i64,
    updated_at: i64,
}

impl RawProjectRow {
    fn into_record(self) -> Result<ProjectRecord, StoreError> {
        let project_id = ProjectId::parse(&self.project_id).map_err(StoreError::InvalidId)?;
        let task_id = self
            .task_id
            .as_deref()
            .map(TaskId::parse)
            .transpose()
            .map_err(StoreError::InvalidId)?;
        let workflow_state = serde_json::from_str(&self.workflow_state).map_err(|source| {
            StoreError::DecodeState {
                project_id: self.project_id.clone(),
                source,
            }
        })?;
        Ok(ProjectRecord {
            project_id,
            task_id,
            workflow_state,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawProjectRow> {
    Ok(RawProjectRow {
        project_id: row.get(0)?,
        task_id: row.get(1)?,
        workflow_state: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn encode_state(project_id: &ProjectId, state: &WorkflowState) -> Result<String, StoreError> {
    serde_json::to_string(state).map_err(|source| StoreError::EncodeState {
        project_id: project_id.to_string(),
        source,
    })
}
