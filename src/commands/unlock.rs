// ABOUTME: Unlock command implementation.
// ABOUTME: Breaks a scope lock left behind by an interrupted run.

use super::Project;
use kiln::diagnostics::Warning;
use kiln::error::Result;
use kiln::output::Output;

/// Break the scope lock, whoever holds it.
pub async fn unlock(project: &Project, output: &Output) -> Result<()> {
    let lock = project.store.lock(&project.scope, true).await?;
    let broken = lock.broken().cloned();
    lock.release();

    match broken {
        Some(previous) => {
            output.warning(&Warning::lock_broken(&previous).message);
            output.success(&format!("Unlocked {}", project.scope));
        }
        None => output.success(&format!("{} was not locked", project.scope)),
    }
    Ok(())
}
