//! Field tasks assigned by admins to employees.

use chrono::NaiveDate;
use rxd_ledger::check_task_transition;
use rxd_schemas::{Role, Task, TaskPriority, TaskStatus};
use serde::{Deserialize, Deserializer};
use tracing::info;
use uuid::Uuid;

use crate::{clean_opt, now, require_text, Actor, ServiceError, Store, TaskFilter};

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub assigned_to: Uuid,
    #[serde(default)]
    pub distributor_id: Option<Uuid>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<Uuid>,
    /// Absent leaves the link alone; `null` clears it.
    #[serde(deserialize_with = "present")]
    pub distributor_id: Option<Option<Uuid>>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
}

/// Wraps whatever was sent, `null` included, so an absent field (the
/// struct default) can be told apart from an explicit `null`.
fn present<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    /// Admin only.
    pub assigned_to: Option<Uuid>,
    pub distributor_id: Option<Uuid>,
}

async fn ensure_employee(store: &dyn Store, id: Uuid) -> Result<(), ServiceError> {
    match store.fetch_user(id).await? {
        Some(u) if u.role == Role::Employee && u.active => Ok(()),
        _ => Err(ServiceError::Validation(format!("{id} is not an active employee"))),
    }
}

async fn ensure_distributor(store: &dyn Store, id: Uuid) -> Result<(), ServiceError> {
    match store.fetch_user(id).await? {
        Some(u) if u.role == Role::Distributor => Ok(()),
        _ => Err(ServiceError::Validation(format!("{id} is not a distributor"))),
    }
}

pub async fn create_task(
    store: &dyn Store,
    actor: &Actor,
    new: NewTask,
) -> Result<Task, ServiceError> {
    actor.require_admin()?;
    let title = require_text("title", &new.title)?;
    ensure_employee(store, new.assigned_to).await?;
    if let Some(d) = new.distributor_id {
        ensure_distributor(store, d).await?;
    }

    let at = now();
    let task = Task {
        id: Uuid::new_v4(),
        title,
        description: clean_opt(new.description),
        assigned_to: new.assigned_to,
        assigned_by: actor.user_id,
        distributor_id: new.distributor_id,
        priority: new.priority,
        due_date: new.due_date,
        status: TaskStatus::Pending,
        created_at: at,
        updated_at: at,
        completed_at: None,
    };
    store.insert_task(&task).await?;
    info!(task_id = %task.id, assigned_to = %task.assigned_to, "task created");
    Ok(task)
}

pub async fn list_tasks(
    store: &dyn Store,
    actor: &Actor,
    query: TaskQuery,
) -> Result<Vec<Task>, ServiceError> {
    actor.require_role(&[Role::Admin, Role::Employee])?;
    let assigned_to = if actor.is_admin() {
        query.assigned_to
    } else {
        Some(actor.user_id)
    };
    let filter = TaskFilter {
        assigned_to,
        distributor_id: query.distributor_id,
        status: query.status,
    };
    Ok(store.list_tasks(&filter).await?)
}

/// Admins see every task; employees only their own.
pub async fn get_task(store: &dyn Store, actor: &Actor, id: Uuid) -> Result<Task, ServiceError> {
    actor.require_role(&[Role::Admin, Role::Employee])?;
    match store.fetch_task(id).await? {
        Some(t) if actor.is_admin() || t.assigned_to == actor.user_id => Ok(t),
        _ => Err(ServiceError::not_found("task", id)),
    }
}

pub async fn update_task(
    store: &dyn Store,
    actor: &Actor,
    id: Uuid,
    patch: TaskPatch,
) -> Result<Task, ServiceError> {
    actor.require_admin()?;
    let mut task = get_task(store, actor, id).await?;

    if let Some(title) = patch.title {
        task.title = require_text("title", &title)?;
    }
    if patch.description.is_some() {
        task.description = clean_opt(patch.description);
    }
    if let Some(assignee) = patch.assigned_to {
        if assignee != task.assigned_to {
            ensure_employee(store, assignee).await?;
            task.assigned_to = assignee;
            task.assigned_by = actor.user_id;
        }
    }
    match patch.distributor_id {
        Some(Some(d)) => {
            ensure_distributor(store, d).await?;
            task.distributor_id = Some(d);
        }
        Some(None) => task.distributor_id = None,
        None => {}
    }
    if let Some(p) = patch.priority {
        task.priority = p;
    }
    if patch.due_date.is_some() {
        task.due_date = patch.due_date;
    }
    task.updated_at = now();

    store.update_task(&task).await?;
    info!(task_id = %id, "task updated");
    Ok(task)
}

/// Assignees move their task between pending, in progress and completed;
/// only admins cancel.
pub async fn change_task_status(
    store: &dyn Store,
    actor: &Actor,
    id: Uuid,
    to: TaskStatus,
) -> Result<Task, ServiceError> {
    let mut task = get_task(store, actor, id).await?;
    if !actor.is_admin() && to == TaskStatus::Cancelled {
        return Err(ServiceError::forbidden("only admins may cancel tasks"));
    }
    check_task_transition(task.status, to)?;

    let at = now();
    let from = task.status;
    task.status = to;
    task.updated_at = at;
    if to == TaskStatus::Completed {
        task.completed_at = Some(at);
    }
    store.update_task(&task).await?;
    info!(
        task_id = %id,
        from = from.as_str(),
        to = to.as_str(),
        "task status changed"
    );
    Ok(task)
}

pub async fn delete_task(store: &dyn Store, actor: &Actor, id: Uuid) -> Result<(), ServiceError> {
    actor.require_admin()?;
    if !store.delete_task(id).await? {
        return Err(ServiceError::not_found("task", id));
    }
    info!(task_id = %id, "task deleted");
    Ok(())
}
