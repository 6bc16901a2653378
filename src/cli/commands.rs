use crate::app::{AppContext, Result};
use crate::pipeline::{run_once, RunOptions, RunOutcome};

/// Run one digest cycle and report what happened on stdout.
pub async fn run(ctx: &AppContext, dry_run: bool) -> Result<RunOutcome> {
    let outcome = run_once(ctx, RunOptions { dry_run }).await?;

    match &outcome {
        RunOutcome::NothingNew { skipped } => {
            println!("No new posts");
            if *skipped > 0 {
                eprintln!("  {} malformed records skipped", skipped);
            }
        }
        RunOutcome::Sent {
            posts,
            skipped,
            checkpoint,
        } => {
            println!("Sent {} posts to {}", posts, ctx.config.email.to);
            if *skipped > 0 {
                eprintln!("  {} malformed records skipped", skipped);
            }
            if let Some(id) = checkpoint {
                println!("Checkpoint: {}", id);
            }
        }
        RunOutcome::DryRun {
            posts,
            skipped,
            html,
            text,
        } => {
            println!("Dry run: {} posts ({} skipped), nothing sent\n", posts, skipped);
            println!("{}\n", text);
            println!("{}", html);
        }
    }

    Ok(outcome)
}
