//! Tasks in `tasks.json`.

use super::{require_text, resolve_id, DataPaths};
use crate::errors::AppError;
use crate::models::{now_iso, CreateTaskRequest, Task, UpdateTaskRequest};
use crate::sync::{CollectionSync, PathLocks};

#[derive(Clone)]
pub struct TasksApi {
    sync: CollectionSync,
    locks: PathLocks,
    path: String,
}

impl TasksApi {
    pub fn new(sync: CollectionSync, locks: PathLocks, paths: &DataPaths) -> Self {
        Self {
            sync,
            locks,
            path: paths.tasks(),
        }
    }

    pub async fn list(&self) -> Result<Vec<Task>, AppError> {
        Ok(self.sync.read_or_cached::<Vec<Task>>(&self.path).await?.items)
    }

    pub async fn get(&self, id: &str) -> Result<Task, AppError> {
        self.list()
            .await?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found(id))
    }

    pub async fn create(&self, request: CreateTaskRequest) -> Result<Task, AppError> {
        require_text("title", &request.title)?;
        let id = resolve_id(request.id.as_deref())?;
        let now = now_iso();

        let task = Task {
            id,
            title: request.title.trim().to_string(),
            description: request.description,
            assignee_id: request.assignee_id,
            assignee: request.assignee,
            status: request.status.unwrap_or_default(),
            priority: request.priority.unwrap_or_default(),
            due: request.due,
            tags: request.tags.unwrap_or_default(),
            created_at: Some(now.clone()),
            updated_at: Some(now),
            extra: Default::default(),
        };

        let message = format!("feat(tasks): add {} ({})", task.title, task.id);
        let _guard = self.locks.lock(&self.path).await;
        let candidate = task.clone();
        self.sync
            .mutate(&self.path, &message, move |mut tasks: Vec<Task>| {
                if tasks.iter().any(|t| t.id == candidate.id) {
                    return Err(AppError::DuplicateId(format!("Duplicate id: {}", candidate.id)));
                }
                tasks.push(candidate.clone());
                Ok(tasks)
            })
            .await?;

        tracing::info!(id = %task.id, "task created");
        Ok(task)
    }

    pub async fn update(&self, id: &str, patch: UpdateTaskRequest) -> Result<Task, AppError> {
        if let Some(title) = &patch.title {
            require_text("title", title)?;
        }
        let now = now_iso();

        let message = format!("chore(tasks): update {id}");
        let _guard = self.locks.lock(&self.path).await;
        let outcome = self
            .sync
            .mutate(&self.path, &message, |mut tasks: Vec<Task>| {
                let task = tasks
                    .iter_mut()
                    .find(|t| t.id == id)
                    .ok_or_else(|| not_found(id))?;
                patch.apply(task);
                task.updated_at = Some(now.clone());
                Ok(tasks)
            })
            .await?;

        outcome
            .items
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found(id))
    }

    pub async fn remove(&self, id: &str) -> Result<(), AppError> {
        let message = format!("chore(tasks): remove {id}");
        let _guard = self.locks.lock(&self.path).await;
        self.sync
            .mutate(&self.path, &message, |mut tasks: Vec<Task>| {
                let before = tasks.len();
                tasks.retain(|t| t.id != id);
                if tasks.len() == before {
                    return Err(not_found(id));
                }
                Ok(tasks)
            })
            .await?;
        tracing::info!(id, "task removed");
        Ok(())
    }
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Task {id} not found"))
}
