use std::collections::VecDeque;
use std::time::Duration;

use serenity::model::id::ChannelId;

#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub title: String,
    pub url: String,
    pub duration: Option<Duration>,
}

impl Track {
    pub fn duration_text(&self) -> Option<String> {
        let seconds = self.duration?.as_secs();
        let minutes = seconds / 60;

        Some(format!("{}:{:0>2}", minutes, seconds % 60))
    }
}

/// What the guild is streaming right now.
pub enum Playback<S> {
    Idle,
    /// A track was popped and its stream is being opened with the guild
    /// unlocked. `ended` is set if the stream's end arrives first.
    Starting {
        epoch: u64,
        current: Track,
        ended: bool,
    },
    Playing {
        epoch: u64,
        current: Track,
        stream: S,
    },
}

/// Everything the bot knows about one guild. The queue holds the tracks
/// that have not started yet; the one streaming lives in `playback`.
pub struct GuildSession<L, S> {
    pub voice: Option<L>,
    pub queue: VecDeque<Track>,
    pub playback: Playback<S>,
    pub announce: Option<ChannelId>,
    epoch: u64,
}

impl<L, S> Default for GuildSession<L, S> {
    fn default() -> Self {
        GuildSession {
            voice: None,
            queue: VecDeque::new(),
            playback: Playback::Idle,
            announce: None,
            epoch: 0,
        }
    }
}

impl<L, S> GuildSession<L, S> {
    /// True from the moment a track is popped for playback, including
    /// while its stream is still opening.
    pub fn is_playing(&self) -> bool {
        !matches!(self.playback, Playback::Idle)
    }

    pub fn stream(&self) -> Option<&S> {
        match &self.playback {
            Playback::Playing { stream, .. } => Some(stream),
            _ => None,
        }
    }

    pub fn current(&self) -> Option<&Track> {
        match &self.playback {
            Playback::Starting { current, .. } | Playback::Playing { current, .. } => Some(current),
            Playback::Idle => None,
        }
    }

    pub fn playing_epoch(&self) -> Option<u64> {
        match &self.playback {
            Playback::Starting { epoch, .. } | Playback::Playing { epoch, .. } => Some(*epoch),
            Playback::Idle => None,
        }
    }

    /// Hands out the epoch for the next stream start. Completion signals
    /// carrying an older epoch are stale.
    pub fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// Drops the queue and the stream, returning the stream so the caller
    /// can stop it.
    pub fn clear(&mut self) -> Option<S> {
        self.queue.clear();

        match std::mem::replace(&mut self.playback, Playback::Idle) {
            Playback::Playing { stream, .. } => Some(stream),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str) -> Track {
        Track {
            title: title.to_string(),
            url: format!("https://www.youtube.com/watch?v={title}"),
            duration: None,
        }
    }

    #[test]
    fn duration_text_pads_seconds() {
        let mut song = track("a");
        assert_eq!(song.duration_text(), None);

        song.duration = Some(Duration::from_secs(185));
        assert_eq!(song.duration_text().as_deref(), Some("3:05"));
    }

    #[test]
    fn clear_returns_stream_and_goes_idle() {
        let mut session: GuildSession<(), &str> = GuildSession::default();
        session.queue.push_back(track("a"));
        let epoch = session.next_epoch();
        session.playback = Playback::Playing { epoch, current: track("b"), stream: "stream" };

        assert!(session.is_playing());
        assert_eq!(session.clear(), Some("stream"));
        assert!(!session.is_playing());
        assert!(session.queue.is_empty());
        assert_eq!(session.clear(), None);
    }

    #[test]
    fn starting_counts_as_playing_without_a_stream() {
        let mut session: GuildSession<(), &str> = GuildSession::default();
        let epoch = session.next_epoch();
        session.playback = Playback::Starting { epoch, current: track("a"), ended: false };

        assert!(session.is_playing());
        assert_eq!(session.playing_epoch(), Some(epoch));
        assert_eq!(session.stream(), None);
        assert_eq!(session.current().map(|track| track.title.as_str()), Some("a"));

        assert_eq!(session.clear(), None);
        assert_eq!(session.playing_epoch(), None);
    }

    #[test]
    fn epochs_increase() {
        let mut session: GuildSession<(), ()> = GuildSession::default();
        let first = session.next_epoch();
        assert!(session.next_epoch() > first);
    }
}
