use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const UPDATE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("could not read version of {program}: {reason}")]
    Version { program: String, reason: String },
    #[error("could not update {program}: {reason}")]
    Update { program: String, reason: String },
}

/// Updates the extractor now, then once a day in the background
pub async fn keep_extractor_updated(program: &str) -> Result<(), UpdateError> {
    update_extractor(program).await?;

    let program = program.to_owned();
    tokio::spawn(async move {
        let mut interval = interval(UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            if let Err(e) = update_extractor(&program).await {
                error!("{e}");
            }
        }
    });

    Ok(())
}

/// Runs the extractor's own updater, falling back to pip for installs that
/// refuse to update themselves
async fn update_extractor(program: &str) -> Result<(), UpdateError> {
    let old_version = extractor_version(program).await?;

    if let Err(reason) = run(Command::new(program).arg("--update")).await {
        warn!(program, "self-update failed, trying pip: {reason}");
        run(Command::new("pip").args(["install", "--upgrade", "yt-dlp"]))
            .await
            .map_err(|reason| UpdateError::Update {
                program: program.to_owned(),
                reason,
            })?;
    }

    let new_version = extractor_version(program).await?;
    if old_version != new_version {
        info!(program, from = %old_version, to = %new_version, "updated extractor");
    } else {
        debug!(program, version = %new_version, "extractor up to date");
    }
    Ok(())
}

async fn extractor_version(program: &str) -> Result<String, UpdateError> {
    let version_error = |reason: String| UpdateError::Version {
        program: program.to_owned(),
        reason,
    };
    let stdout = run(Command::new(program).arg("--version"))
        .await
        .map_err(version_error)?;
    parse_version(&stdout)
        .map(str::to_owned)
        .ok_or_else(|| version_error("empty output".to_owned()))
}

/// Stdout of a successful run, otherwise a description of what went wrong
async fn run(command: &mut Command) -> Result<String, String> {
    let output = command.output().await.map_err(|e| e.to_string())?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{}: {}", output.status, stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `--version` prints the version on the first line
fn parse_version(stdout: &str) -> Option<&str> {
    stdout.lines().map(str::trim).find(|line| !line.is_empty())
}
