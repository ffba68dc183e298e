use std::sync::Arc;

use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::tracks::{TrackError, TrackHandle, TrackResult};
use songbird::TrackEvent::End;
use songbird::{create_player, ytdl, Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{SessionError, SessionResult};
use crate::models::Track;
use crate::session::{StreamControl, TrackEndSignal, VoiceConnector, VoiceLink};

pub struct SongbirdConnector {
    songbird: Arc<Songbird>,
}

impl SongbirdConnector {
    pub fn new(songbird: Arc<Songbird>) -> Self {
        SongbirdConnector { songbird }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    type Link = SongbirdLink;

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> SessionResult<SongbirdLink> {
        let (call, joined) = self.songbird.join(guild_id, channel_id).await;

        joined.map_err(|why| SessionError::VoiceConnection(why.to_string()))?;

        deafen(&call).await;

        Ok(SongbirdLink { call })
    }
}

async fn deafen(call: &Arc<Mutex<Call>>) {
    let mut handler = call.lock().await;

    if !handler.is_deaf() {
        if let Err(why) = handler.deafen(true).await {
            warn!("Could not deafen in guild voice: {why:?}");
        }
    }
}

#[derive(Clone)]
pub struct SongbirdLink {
    call: Arc<Mutex<Call>>,
}

#[async_trait]
impl VoiceLink for SongbirdLink {
    type Stream = SongbirdStream;

    async fn is_connected(&self) -> bool {
        self.call.lock().await.current_connection().is_some()
    }

    async fn play(&self, track: &Track, volume: f32, on_end: TrackEndSignal) -> SessionResult<SongbirdStream> {
        let source = ytdl(&track.url).await
            .map_err(|why| SessionError::Stream(format!("could not open {}: {why}", track.url)))?;

        let (mut player, track_handle) = create_player(source);
        player.set_volume(volume);

        track_handle.add_event(Event::Track(End), TrackEndNotifier { on_end })
            .map_err(stream_error)?;

        let mut handler = self.call.lock().await;

        handler.stop(); // Just in case something was playing before
        handler.play(player);

        Ok(SongbirdStream(track_handle))
    }

    /// Leaves the channel but keeps the call around, so later requests can
    /// tell a stale session from a missing one.
    async fn disconnect(&self) -> SessionResult<()> {
        self.call.lock().await.leave().await
            .map_err(|why| SessionError::VoiceConnection(why.to_string()))
    }
}

pub struct SongbirdStream(TrackHandle);

impl StreamControl for SongbirdStream {
    fn pause(&self) -> SessionResult<bool> {
        acted(self.0.pause())
    }

    fn resume(&self) -> SessionResult<bool> {
        acted(self.0.play())
    }

    fn stop(&self) -> SessionResult<bool> {
        acted(self.0.stop())
    }
}

/// A track that already ended refuses commands; that is nothing to act on
/// rather than a failure.
fn acted(result: TrackResult<()>) -> SessionResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(TrackError::Finished) => Ok(false),
        Err(why) => Err(stream_error(why)),
    }
}

fn stream_error(why: impl std::fmt::Display) -> SessionError {
    SessionError::Stream(why.to_string())
}

struct TrackEndNotifier {
    on_end: TrackEndSignal,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        info!("End notifier triggered");

        self.on_end.fire();

        Some(Event::Cancel)
    }
}
