use super::CliContext;
use anyhow::Result;
use forge_application::EditingSurface;
use forge_core::generation::GenerationResponse;
use forge_core::session::LoadOutcome;
use std::io::BufRead;
use tokio::sync::mpsc;

fn print_reply(response: &GenerationResponse) {
    println!("{}", response.response_text);
    if response.code.is_some() {
        println!("\n[component code updated]");
    }
}

fn print_loaded(id: &str, outcome: LoadOutcome) {
    match outcome {
        LoadOutcome::Restored => eprintln!("Opened session '{}'", id),
        LoadOutcome::Created => eprintln!("Started new session '{}'", id),
    }
}

pub async fn say(context: &CliContext, id: &str, message: &str) -> Result<()> {
    let surface = context.editing_surface()?;
    print_loaded(id, surface.load(id).await?);

    let reply = surface.send_chat(message).await;
    // The user message is kept even when generation fails.
    let saved = surface.close().await;

    print_reply(&reply?);
    saved?;
    Ok(())
}

pub async fn interactive(context: &CliContext, id: &str) -> Result<()> {
    let surface = context.editing_surface()?;
    print_loaded(id, surface.load(id).await?);
    eprintln!("Type a message, /rename <name>, /save or /quit.");

    let mut interrupted = surface.unload_guard().listen_for_ctrl_c();
    let mut lines = spawn_stdin_reader();

    loop {
        let line = tokio::select! {
            _ = &mut interrupted => break,
            line = lines.recv() => line,
        };
        let Some(line) = line else { break };

        match handle_line(&surface, line.trim()).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    interrupted.abort();
    surface.close().await?;
    eprintln!("Session '{}' saved", id);
    Ok(())
}

/// Reads stdin on a plain thread so a pending read never blocks shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Returns `Ok(false)` when the user asked to quit.
async fn handle_line(surface: &EditingSurface, line: &str) -> Result<bool> {
    if line.is_empty() {
        return Ok(true);
    }
    if line == "/quit" {
        return Ok(false);
    }
    if line == "/save" {
        let outcome = surface.save().await?;
        eprintln!("{:?}", outcome);
        return Ok(true);
    }
    if let Some(name) = line.strip_prefix("/rename ") {
        surface.rename(name).await?;
        eprintln!("Renamed to '{}'", name.trim());
        return Ok(true);
    }

    let reply = surface.send_chat(line).await?;
    print_reply(&reply);
    Ok(true)
}
