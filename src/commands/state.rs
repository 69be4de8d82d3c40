// ABOUTME: State inspection commands: list, show, and forget.
// ABOUTME: Read records straight from the store; forget removes one under the scope lock.

use super::Project;
use kiln::error::{Error, Result};
use kiln::output::Output;
use kiln::types::ResourceId;

/// List recorded resources of the project's scope, in registration order.
pub async fn list(project: &Project, output: &Output) -> Result<()> {
    let records = project.store.load(&project.scope).await?;

    if output.data(&records) {
        return Ok(());
    }

    if records.is_empty() {
        output.success(&format!("No resources recorded in {}", project.scope));
        return Ok(());
    }

    output.progress(&format!(
        "{} resource(s) in {} (stage {})",
        records.len(),
        project.scope,
        project.config.stage
    ));
    for record in &records {
        output.line(&format!(
            "{:>4}  {:<24} {:<28} {:<7} {}",
            record.sequence,
            record.id.as_str(),
            record.resource_type.as_str(),
            record.phase.as_str(),
            record.updated_at.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    Ok(())
}

/// List every scope that has recorded state.
pub async fn list_scopes(project: &Project, output: &Output) -> Result<()> {
    let scopes = project.store.list_scopes().await?;

    if output.data(&scopes) {
        return Ok(());
    }

    if scopes.is_empty() {
        output.success("No scopes recorded");
        return Ok(());
    }
    for scope in &scopes {
        output.line(scope.as_str());
    }
    Ok(())
}

/// Print one record as pretty JSON.
pub async fn show(project: &Project, id: &str, output: &Output) -> Result<()> {
    let record = project
        .store
        .get(&project.scope, &parse_id(id)?)
        .await?
        .ok_or_else(|| not_found(project, id))?;

    if output.data(&record) {
        return Ok(());
    }

    output.line(&serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Remove a record without invoking its handler.
///
/// The external object, if any, is left alone; the next up run will create
/// the resource again if it is still declared.
pub async fn forget(project: &Project, id: &str, output: &Output) -> Result<()> {
    let id = parse_id(id)?;
    let lock = project.store.lock(&project.scope, false).await?;

    let removed = project.store.remove(&project.scope, &id).await?;
    lock.release();

    let record = removed.ok_or_else(|| not_found(project, id.as_str()))?;
    tracing::info!(scope = %project.scope, resource = %record.id, "Forgot resource");
    output.success(&format!(
        "Forgot {} {} in {}",
        record.resource_type, record.id, project.scope
    ));
    Ok(())
}

fn parse_id(id: &str) -> Result<ResourceId> {
    ResourceId::new(id).map_err(|e| Error::InvalidConfig(format!("invalid resource id: {e}")))
}

fn not_found(project: &Project, id: &str) -> Error {
    Error::RecordNotFound {
        scope: project.scope.to_string(),
        id: id.to_string(),
    }
}
