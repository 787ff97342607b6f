use super::CliContext;
use anyhow::{Context, Result, bail};
use forge_core::session::LoadOutcome;
use uuid::Uuid;

pub async fn list(context: &CliContext) -> Result<()> {
    let summaries = context.repository.list_summaries().await?;
    if summaries.is_empty() {
        println!("No saved sessions.");
        return Ok(());
    }

    for summary in summaries {
        println!(
            "{}  {}  {} messages  {}",
            summary.id,
            summary.last_modified.format("%Y-%m-%d %H:%M"),
            summary.message_count,
            summary.name
        );
    }
    Ok(())
}

pub async fn show(context: &CliContext, id: &str) -> Result<()> {
    let Some(session) = context.repository.find_by_id(id).await? else {
        bail!("Session '{}' not found", id);
    };
    let json = serde_json::to_string_pretty(&session).context("Failed to render session")?;
    println!("{}", json);
    Ok(())
}

pub async fn create(context: &CliContext, name: Option<&str>) -> Result<()> {
    let id = Uuid::new_v4().to_string();
    let store = context.store();
    store.load_session(&id).await?;

    match name {
        Some(name) => store.update_session_name(name).await?,
        None => {
            store.save_session().await?;
        }
    }

    println!("{}", id);
    Ok(())
}

pub async fn rename(context: &CliContext, id: &str, name: &str) -> Result<()> {
    let store = context.store();
    if store.load_session(id).await? == LoadOutcome::Created {
        bail!("Session '{}' not found", id);
    }
    store.update_session_name(name).await?;
    println!("Renamed '{}' to '{}'", id, name.trim());
    Ok(())
}

pub async fn delete(context: &CliContext, id: &str) -> Result<()> {
    context.repository.delete(id).await?;
    println!("Deleted '{}'", id);
    Ok(())
}
