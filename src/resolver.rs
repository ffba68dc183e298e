use std::time::Duration;

use serde::Deserialize;
use serenity::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{SessionError, SessionResult};
use crate::models::Track;
use crate::session::TrackResolver;

pub const UNKNOWN_TRACK_TITLE: &str = "UNKNOWN TRACK";

/// The subset of the `yt-dlp -j` document we care about.
#[derive(Deserialize)]
pub struct VideoInfo {
    pub title: Option<String>,
    pub webpage_url: Option<String>,
    pub duration: Option<f64>,
}

/// Looks tracks up by running `yt-dlp` without downloading anything.
pub struct YtDlpResolver {
    program: String,
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        YtDlpResolver { program: "yt-dlp".to_string() }
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> SessionResult<Track> {
        let target = lookup_target(query)?;

        info!("Resolving {target}");

        let output = Command::new(&self.program)
            .arg("-j")
            .arg("--no-playlist")
            .arg(&target)
            .output()
            .await
            .map_err(|why| SessionError::TrackResolution(format!("{} failed to start: {why}", self.program)))?;

        let result = String::from_utf8(output.stdout)
            .map_err(|_| SessionError::TrackResolution("Error reading stdout".to_string()))?;

        if !output.status.success() || result.trim().is_empty() {
            let error = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {error}");

            return Err(SessionError::TrackResolution(format!("no video found for {query}")));
        }

        track_from_json(&result, query)
    }
}

/// URLs go to yt-dlp as they are; anything else becomes a search for the
/// first match.
fn lookup_target(query: &str) -> SessionResult<String> {
    let query = query.trim();

    if query.is_empty() {
        return Err(SessionError::TrackResolution("empty query".to_string()));
    }

    if query.starts_with("http://") || query.starts_with("https://") {
        Ok(query.to_string())
    } else {
        Ok(format!("ytsearch1:{query}"))
    }
}

/// yt-dlp prints one document per line; the first one is the video.
fn track_from_json(output: &str, query: &str) -> SessionResult<Track> {
    let line = output.lines().find(|line| !line.trim().is_empty()).unwrap_or_default();

    let info: VideoInfo = serde_json::from_str(line)
        .map_err(|why| SessionError::TrackResolution(format!("unreadable metadata for {query}: {why}")))?;

    let duration = info.duration
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .map(Duration::from_secs_f64);

    Ok(Track {
        title: info.title.unwrap_or_else(|| UNKNOWN_TRACK_TITLE.to_string()),
        url: info.webpage_url.unwrap_or_else(|| query.trim().to_string()),
        duration,
    })
}
