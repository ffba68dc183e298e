use std::sync::Arc;

use serenity::http::Http;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};

use crate::commands::advance_messages;
use crate::session::{SessionManager, TrackEnded, TrackResolver, VoiceConnector};

/// Drives the queue forward: every stream end goes through
/// `track_finished`, and the outcome is posted where playback was started.
pub async fn playback_pump<C, R>(http: Arc<Http>, sessions: Arc<SessionManager<C, R>>, mut track_ends: UnboundedReceiver<TrackEnded>)
where
    C: VoiceConnector,
    R: TrackResolver,
{
    while let Some(ended) = track_ends.recv().await {
        let Some(finished) = sessions.track_finished(ended).await else {
            continue;
        };

        let Some(channel_id) = finished.announce else {
            continue;
        };

        for text in advance_messages(&finished.advance) {
            if let Err(why) = channel_id.say(&http, text).await {
                error!("Error sending message to {}: {why:?}", channel_id.0);
            }
        }
    }

    info!("Playback pump stopped");
}
