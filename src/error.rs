use thiserror::Error;

/// Failures of a playback command. Each one ends that single command and is
/// answered with a chat reply; none of them take the process down.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("member is not in a voice channel")]
    NotInVoiceChannel,

    #[error("no voice session for this guild")]
    NoActiveVoiceSession,

    #[error("voice session is disconnected")]
    SessionStale,

    #[error("could not resolve track: {0}")]
    TrackResolution(String),

    #[error("not joined to any voice channel")]
    NotJoined,

    #[error("voice connection failed: {0}")]
    VoiceConnection(String),

    #[error("stream error: {0}")]
    Stream(String),
}

pub type SessionResult<T> = Result<T, SessionError>;
