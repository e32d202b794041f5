//! Group Expander
//!
//! Fans a multi-provider task out into one child task per provider. Children
//! share the parent's row and prompt, take pairwise-distinct destination
//! columns, and carry the parent id as their group tag so downstream logging
//! can treat the fan-out as one writer identity when needed.

use tracing::debug;

use crate::models::task::Task;
use crate::utils::error::{EngineError, EngineResult};

/// Expand every multi-provider task in the sequence; single-provider tasks
/// pass through untouched.
///
/// A provider-list/column-list length mismatch is a fatal configuration
/// error, never retried.
pub fn expand_tasks(tasks: Vec<Task>) -> EngineResult<Vec<Task>> {
    let mut expanded = Vec::with_capacity(tasks.len());
    for task in tasks {
        match &task.group {
            Some(_) => expanded.extend(expand_one(task)?),
            None => expanded.push(task),
        }
    }
    Ok(expanded)
}

/// Expand one multi-provider task into exactly N children.
pub fn expand_one(parent: Task) -> EngineResult<Vec<Task>> {
    let group = parent
        .group
        .clone()
        .ok_or_else(|| EngineError::configuration("expand_one called without group info"))?;

    if group.providers.len() != group.columns.len() {
        return Err(EngineError::configuration(format!(
            "fan-out mismatch for task {}: {} providers vs {} columns",
            parent.id,
            group.providers.len(),
            group.columns.len()
        )));
    }
    if group.providers.len() != group.size {
        return Err(EngineError::configuration(format!(
            "fan-out mismatch for task {}: declared size {} vs {} providers",
            parent.id,
            group.size,
            group.providers.len()
        )));
    }

    let mut distinct = group.columns.clone();
    distinct.sort();
    distinct.dedup();
    if distinct.len() != group.columns.len() {
        return Err(EngineError::configuration(format!(
            "fan-out columns for task {} are not pairwise distinct",
            parent.id
        )));
    }

    debug!(
        task_id = %parent.id,
        size = group.size,
        "expanding multi-provider task"
    );

    let children = group
        .providers
        .iter()
        .zip(group.columns.iter())
        .map(|(provider, column)| {
            let mut child = parent.clone();
            child.id = uuid::Uuid::new_v4().to_string();
            child.provider = *provider;
            child.column = column.clone();
            child.group = None;
            child.original_group_tag = Some(parent.id.clone());
            child
        })
        .collect();

    Ok(children)
}
