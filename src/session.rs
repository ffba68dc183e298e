use std::collections::HashMap;
use std::sync::Arc;

use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::models::{GuildSession, Playback, Track};

/// Every stream is played at half of its nominal volume.
pub const VOLUME: f32 = 0.5;

#[async_trait]
pub trait VoiceConnector: Send + Sync {
    type Link: VoiceLink;

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> SessionResult<Self::Link>;
}

/// A joined voice channel. Clones share the same connection.
#[async_trait]
pub trait VoiceLink: Clone + Send + Sync + 'static {
    type Stream: StreamControl;

    async fn is_connected(&self) -> bool;

    /// Starts streaming `track` at `volume` from its first frame. `on_end`
    /// must be fired once the stream stops, whether it ran out or was
    /// stopped.
    async fn play(&self, track: &Track, volume: f32, on_end: TrackEndSignal) -> SessionResult<Self::Stream>;

    async fn disconnect(&self) -> SessionResult<()>;
}

/// Controls of a started stream. Each returns `Ok(false)` when the stream
/// has already ended and there was nothing to act on.
pub trait StreamControl: Send + Sync + 'static {
    fn pause(&self) -> SessionResult<bool>;
    fn resume(&self) -> SessionResult<bool>;
    fn stop(&self) -> SessionResult<bool>;
}

#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> SessionResult<Track>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackEnded {
    pub guild_id: GuildId,
    pub epoch: u64,
}

/// Handed to a stream when it starts; reports its end back to the manager.
#[derive(Clone)]
pub struct TrackEndSignal {
    sender: UnboundedSender<TrackEnded>,
    ended: TrackEnded,
}

impl TrackEndSignal {
    pub fn fire(&self) {
        if self.sender.send(self.ended).is_err() {
            warn!("Track end for guild {} dropped, playback pump is gone", self.ended.guild_id.0);
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Advance {
    /// `None` once the queue ran dry.
    pub started: Option<Track>,
    /// Tracks popped on the way that failed to open.
    pub unplayable: Vec<Track>,
}

#[derive(Debug, PartialEq)]
pub enum Enqueued {
    Started(Advance),
    Queued { track: Track, position: usize },
}

#[derive(Debug, PartialEq)]
pub struct Finished {
    pub announce: Option<ChannelId>,
    pub advance: Advance,
}

type LinkOf<C> = <C as VoiceConnector>::Link;
type StreamOf<C> = <LinkOf<C> as VoiceLink>::Stream;
type SessionOf<C> = GuildSession<LinkOf<C>, StreamOf<C>>;
type SharedSession<C> = Arc<Mutex<SessionOf<C>>>;

/// Per-guild playback state. Each guild's session sits behind its own lock.
/// State changes happen under that lock; the slow calls (track lookup and
/// stream opening) run with it released, so `leave`, `join` and the other
/// commands stay responsive while a lookup hangs.
pub struct SessionManager<C: VoiceConnector, R: TrackResolver> {
    connector: C,
    resolver: R,
    sessions: RwLock<HashMap<GuildId, SharedSession<C>>>,
    track_ends: UnboundedSender<TrackEnded>,
}

impl<C: VoiceConnector, R: TrackResolver> SessionManager<C, R> {
    pub fn new(connector: C, resolver: R) -> (Self, UnboundedReceiver<TrackEnded>) {
        let (track_ends, receiver) = mpsc::unbounded_channel();

        let manager = SessionManager {
            connector,
            resolver,
            sessions: RwLock::new(HashMap::new()),
            track_ends,
        };

        (manager, receiver)
    }

    async fn session(&self, guild_id: GuildId) -> Option<SharedSession<C>> {
        self.sessions.read().await.get(&guild_id).cloned()
    }

    pub async fn join(&self, guild_id: GuildId, member_channel: Option<ChannelId>) -> SessionResult<()> {
        let channel_id = member_channel.ok_or(SessionError::NotInVoiceChannel)?;

        let link = self.connector.connect(guild_id, channel_id).await?;

        let session = self.sessions.write().await
            .entry(guild_id)
            .or_default()
            .clone();

        // A re-join replaces the previous handle.
        session.lock().await.voice = Some(link);

        info!("JOIN - Joined channel {} in guild {}", channel_id.0, guild_id.0);

        Ok(())
    }

    pub async fn enqueue(&self, guild_id: GuildId, channel_id: ChannelId, query: &str) -> SessionResult<Enqueued> {
        let shared = self.session(guild_id).await.ok_or(SessionError::NoActiveVoiceSession)?;

        ensure_connected(&*shared.lock().await).await?;

        let track = self.resolver.resolve(query).await.map_err(|why| {
            warn!("ENQUEUE - Could not resolve {query}: {why}");
            why
        })?;

        let mut session = shared.lock().await;

        // The guild may have been left while the lookup ran.
        ensure_connected(&*session).await?;

        session.queue.push_back(track.clone());

        if session.is_playing() {
            let position = session.queue.len();
            info!("ENQUEUE - {} queued at position {position} in guild {}", track.title, guild_id.0);

            return Ok(Enqueued::Queued { track, position });
        }

        session.announce = Some(channel_id);

        self.advance(guild_id, &shared, session).await
            .map(Enqueued::Started)
            .ok_or(SessionError::SessionStale)
    }

    /// Pops the queue head into playback. A head that fails to open is
    /// dropped and the next one tried; an empty queue leaves the guild idle.
    /// Returns `None` when the session was cleared while a stream was
    /// opening.
    async fn advance<'a>(
        &self,
        guild_id: GuildId,
        shared: &'a SharedSession<C>,
        mut session: MutexGuard<'a, SessionOf<C>>,
    ) -> Option<Advance> {
        let mut unplayable = Vec::new();

        while let Some(track) = session.queue.pop_front() {
            let Some(voice) = session.voice.clone() else {
                unplayable.push(track);
                break;
            };

            let epoch = session.next_epoch();
            let on_end = TrackEndSignal {
                sender: self.track_ends.clone(),
                ended: TrackEnded { guild_id, epoch },
            };

            session.playback = Playback::Starting { epoch, current: track.clone(), ended: false };
            drop(session);

            let opened = voice.play(&track, VOLUME, on_end).await;

            session = shared.lock().await;

            let ended_early = match session.playback {
                Playback::Starting { epoch: starting, ended, .. } if starting == epoch => ended,
                _ => {
                    info!("ADVANCE - Session of guild {} was cleared while opening {}", guild_id.0, track.title);
                    stop_stream(opened.ok());

                    return None;
                }
            };

            match opened {
                Ok(_) if ended_early => {
                    info!("ADVANCE - {} ended before it was recorded as playing", track.title);
                }
                Ok(stream) => {
                    info!("ADVANCE - Playing {} - {} in guild {}", track.title, track.url, guild_id.0);

                    session.playback = Playback::Playing { epoch, current: track.clone(), stream };

                    return Some(Advance { started: Some(track), unplayable });
                }
                Err(why) => {
                    warn!("ADVANCE - Could not play {}: {why}", track.title);
                    unplayable.push(track);
                }
            }
        }

        info!("ADVANCE - Queue is empty in guild {}", guild_id.0);
        session.playback = Playback::Idle;

        Some(Advance { started: None, unplayable })
    }

    /// The transition taken when a stream ends, naturally or through a skip.
    /// Returns `None` when the signal belongs to a stream that is no longer
    /// the current one.
    pub async fn track_finished(&self, ended: TrackEnded) -> Option<Finished> {
        let shared = self.session(ended.guild_id).await?;
        let mut session = shared.lock().await;

        // Still opening: the stream's own advance picks this up.
        if let Playback::Starting { epoch, ended: early, .. } = &mut session.playback {
            if *epoch == ended.epoch {
                *early = true;
                return None;
            }
        }

        if session.playing_epoch() != Some(ended.epoch) {
            debug!("Ignoring end of stale stream {} in guild {}", ended.epoch, ended.guild_id.0);
            return None;
        }

        let announce = session.announce;
        let advance = self.advance(ended.guild_id, &shared, session).await?;

        Some(Finished { announce, advance })
    }

    /// Runs `control` on the current stream. `Ok(false)` when nothing plays.
    async fn with_stream<F>(&self, guild_id: GuildId, control: F) -> SessionResult<bool>
    where
        F: FnOnce(&StreamOf<C>) -> SessionResult<bool> + Send,
    {
        let Some(session) = self.session(guild_id).await else {
            return Ok(false);
        };
        let session = session.lock().await;

        match session.stream() {
            Some(stream) => control(stream),
            None => Ok(false),
        }
    }

    pub async fn pause(&self, guild_id: GuildId) -> SessionResult<bool> {
        self.with_stream(guild_id, |stream| stream.pause()).await
    }

    pub async fn resume(&self, guild_id: GuildId) -> SessionResult<bool> {
        self.with_stream(guild_id, |stream| stream.resume()).await
    }

    /// Ends the current stream; the queue moves on through `track_finished`.
    pub async fn skip(&self, guild_id: GuildId) -> SessionResult<bool> {
        self.with_stream(guild_id, |stream| stream.stop()).await
    }

    pub async fn queue(&self, guild_id: GuildId) -> Vec<Track> {
        match self.session(guild_id).await {
            Some(session) => session.lock().await.queue.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Option<Track> {
        let session = self.session(guild_id).await?;
        let session = session.lock().await;

        session.current().cloned()
    }

    pub async fn leave(&self, guild_id: GuildId) -> SessionResult<()> {
        let session = self.session(guild_id).await.ok_or(SessionError::NotJoined)?;
        let mut session = session.lock().await;

        let connected = match session.voice.as_ref() {
            Some(voice) => voice.is_connected().await,
            None => false,
        };

        if !connected {
            return Err(SessionError::NotJoined);
        }

        stop_stream(session.clear());
        session.announce = None;

        if let Some(voice) = session.voice.as_ref() {
            voice.disconnect().await?;
        }

        info!("LEAVE - Left voice in guild {}", guild_id.0);

        Ok(())
    }

    /// Drops queue and stream but keeps the voice handle, for when the bot
    /// was pulled out of the channel by someone else.
    pub async fn reset(&self, guild_id: GuildId) {
        if let Some(session) = self.session(guild_id).await {
            let mut session = session.lock().await;

            stop_stream(session.clear());
            info!("RESET - Cleared session of guild {}", guild_id.0);
        }
    }
}

async fn ensure_connected<L: VoiceLink, S>(session: &GuildSession<L, S>) -> SessionResult<()> {
    let voice = session.voice.as_ref().ok_or(SessionError::NoActiveVoiceSession)?;

    if voice.is_connected().await {
        Ok(())
    } else {
        Err(SessionError::SessionStale)
    }
}

fn stop_stream<S: StreamControl>(stream: Option<S>) {
    if let Some(stream) = stream {
        if let Err(why) = stream.stop() {
            warn!("Could not stop stream: {why}");
        }
    }
}
