use std::sync::Arc;

use serenity::client::Context;
use serenity::framework::standard::macros::{command, group};
use serenity::framework::standard::{Args, CommandError, CommandResult};
use serenity::model::channel::Message;
use serenity::model::channel::ReactionType::Unicode;
use serenity::model::guild::Guild;
use serenity::model::id::{ChannelId, GuildId};
use serenity::prelude::TypeMapKey;
use serenity::Result as SerenityResult;
use tracing::{info, warn};

use crate::error::SessionError;
use crate::models::Track;
use crate::resolver::YtDlpResolver;
use crate::session::{Advance, Enqueued, SessionManager};
use crate::voice::SongbirdConnector;

pub type Sessions = SessionManager<SongbirdConnector, YtDlpResolver>;

pub struct SessionsKey;

impl TypeMapKey for SessionsKey {
    type Value = Arc<Sessions>;
}

pub struct PrefixKey;

impl TypeMapKey for PrefixKey {
    type Value = String;
}

const MAX_LISTED_TRACKS: usize = 20;

#[group]
#[commands(join, play, pause, resume, skip, queue, leave, help)]
pub struct General;

#[command]
#[only_in(guilds)]
async fn join(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = get_guild_id(msg)?;
    let channel_id = member_voice_channel(ctx, msg)?;
    let sessions = get_sessions(ctx).await?;

    match sessions.join(guild_id, channel_id).await {
        Ok(()) => {
            msg.react(&ctx.http, Unicode("👍".to_string())).await?;
        }
        Err(why) => report(ctx, msg, &why).await,
    }

    Ok(())
}

#[command]
#[aliases("p")]
#[only_in(guilds)]
async fn play(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    let guild_id = get_guild_id(msg)?;

    if member_voice_channel(ctx, msg)?.is_none() {
        check_msg(msg.reply(ctx, "How do you listen if you don't join 😥").await);

        return Ok(());
    }

    let user_input = args.rest().trim();

    if user_input.is_empty() {
        let prefix = get_prefix(ctx).await;
        check_msg(msg.channel_id.say(&ctx.http, format!("Usage: `{prefix}p <url>`")).await);

        return Ok(());
    }

    info!("User input is {user_input}");

    let sessions = get_sessions(ctx).await?;

    match sessions.enqueue(guild_id, msg.channel_id, user_input).await {
        Ok(Enqueued::Started(advance)) => announce(ctx, msg.channel_id, &advance).await,
        Ok(Enqueued::Queued { track, position }) => {
            check_msg(msg.channel_id.say(&ctx.http, format!("🎵 Joined the queue at [{position}]: {}", track.title)).await)
        }
        Err(why) => report(ctx, msg, &why).await,
    }

    Ok(())
}

#[command]
#[only_in(guilds)]
async fn pause(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = get_guild_id(msg)?;
    let sessions = get_sessions(ctx).await?;

    acknowledge(ctx, msg, sessions.pause(guild_id).await, "⏸ Paused").await;

    Ok(())
}

#[command]
#[only_in(guilds)]
async fn resume(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = get_guild_id(msg)?;
    let sessions = get_sessions(ctx).await?;

    acknowledge(ctx, msg, sessions.resume(guild_id).await, "▶️ Resumed").await;

    Ok(())
}

#[command]
#[aliases("s")]
#[only_in(guilds)]
async fn skip(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = get_guild_id(msg)?;
    let sessions = get_sessions(ctx).await?;

    // The next track, if any, is started by the playback pump once the
    // stopped stream reports its end.
    acknowledge(ctx, msg, sessions.skip(guild_id).await, "⏩ Skipped 👍").await;

    Ok(())
}

#[command]
#[only_in(guilds)]
async fn queue(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = get_guild_id(msg)?;
    let sessions = get_sessions(ctx).await?;

    let now_playing = sessions.now_playing(guild_id).await;
    let tracks = sessions.queue(guild_id).await;

    check_msg(msg.channel_id.say(&ctx.http, queue_listing(now_playing.as_ref(), &tracks)).await);

    Ok(())
}

#[command]
#[only_in(guilds)]
async fn leave(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = get_guild_id(msg)?;
    let sessions = get_sessions(ctx).await?;

    match sessions.leave(guild_id).await {
        Ok(()) => check_msg(msg.channel_id.say(&ctx.http, "👋 Left voice channel").await),
        Err(why) => report(ctx, msg, &why).await,
    }

    Ok(())
}

#[command]
async fn help(ctx: &Context, msg: &Message) -> CommandResult {
    let prefix = get_prefix(ctx).await;

    check_msg(msg.channel_id.say(&ctx.http, help_text(&prefix)).await);

    Ok(())
}

async fn acknowledge(ctx: &Context, msg: &Message, result: Result<bool, SessionError>, text: &str) {
    match result {
        Ok(true) => check_msg(msg.channel_id.say(&ctx.http, text).await),
        Ok(false) => info!("Nothing is playing in channel {}", msg.channel_id.0),
        Err(why) => report(ctx, msg, &why).await,
    }
}

async fn announce(ctx: &Context, channel_id: ChannelId, advance: &Advance) {
    for text in advance_messages(advance) {
        check_msg(channel_id.say(&ctx.http, text).await);
    }
}

async fn report(ctx: &Context, msg: &Message, why: &SessionError) {
    warn!("Command {} failed: {why}", msg.content);

    let prefix = get_prefix(ctx).await;
    check_msg(msg.channel_id.say(&ctx.http, error_reply(why, &prefix)).await);
}

pub fn error_reply(why: &SessionError, prefix: &str) -> String {
    match why {
        SessionError::NotInVoiceChannel => "Please join the channel first 😉".to_string(),
        SessionError::NoActiveVoiceSession => format!("Please use `{prefix}join` to add me to the channel 😘"),
        SessionError::SessionStale => format!("Please use `{prefix}join` to rejoin the channel 😘"),
        SessionError::TrackResolution(why) => format!("Could not load that track 😣 ({why})"),
        SessionError::NotJoined => "I haven't joined any channels 😶".to_string(),
        SessionError::VoiceConnection(why) => format!("Could not connect to the voice channel: {why}"),
        SessionError::Stream(why) => format!("Playback failed: {why}"),
    }
}

/// What a channel is told after the queue moved.
pub fn advance_messages(advance: &Advance) -> Vec<String> {
    let mut messages: Vec<String> = advance.unplayable
        .iter()
        .map(|track| format!("Could not play {}, skipping it", track.title))
        .collect();

    match &advance.started {
        Some(track) => messages.push(format!("🎶 Playing: {}", describe(track))),
        None => messages.push("♫♪ No music, please add music 😆".to_string()),
    }

    messages
}

fn describe(track: &Track) -> String {
    match track.duration_text() {
        Some(duration) => format!("[{}]({}) `{duration}`", track.title, track.url),
        None => format!("[{}]({})", track.title, track.url),
    }
}

pub fn queue_listing(now_playing: Option<&Track>, tracks: &[Track]) -> String {
    let mut lines = Vec::with_capacity(tracks.len().min(MAX_LISTED_TRACKS) + 2);

    if let Some(track) = now_playing {
        lines.push(format!("Now playing: {}", track.title));
    }

    if tracks.is_empty() {
        lines.push("No songs in the queue 😣".to_string());
    } else {
        for (index, track) in tracks.iter().take(MAX_LISTED_TRACKS).enumerate() {
            lines.push(format!("[{}] {}", index + 1, track.title));
        }

        if tracks.len() > MAX_LISTED_TRACKS {
            lines.push(format!("...and {} more", tracks.len() - MAX_LISTED_TRACKS));
        }
    }

    lines.join("\n")
}

pub fn help_text(prefix: &str) -> String {
    format!(
        r#"
**Commands:**
    **{prefix}join** - Joins your current voice channel.
    **{prefix}p [URL|Title]** - Plays (or adds to the queue) a track.
    **{prefix}pause** - Pauses the current track.
    **{prefix}resume** - Resumes the paused track.
    **{prefix}s** - Skips to the next track.
    **{prefix}queue** - Shows the queue of tracks.
    **{prefix}leave** - Clears the queue and leaves the voice channel.
"#
    )
}

/// Checks that a message successfully sent; if not, then logs why.
pub fn check_msg(result: SerenityResult<Message>) {
    if let Err(why) = result {
        warn!("Error sending message: {why:?}");
    }
}

async fn get_sessions(ctx: &Context) -> Result<Arc<Sessions>, CommandError> {
    let data = ctx.data.read().await;

    data.get::<SessionsKey>()
        .cloned()
        .ok_or(CommandError::from("Session manager not initialised"))
}

async fn get_prefix(ctx: &Context) -> String {
    let data = ctx.data.read().await;

    data.get::<PrefixKey>()
        .cloned()
        .unwrap_or_else(|| crate::config::DEFAULT_PREFIX.to_string())
}

fn get_guild(ctx: &Context, msg: &Message) -> CommandResult<Guild> {
    msg.guild(&ctx.cache).ok_or(CommandError::from("Guild not found"))
}

fn get_guild_id(msg: &Message) -> CommandResult<GuildId> {
    msg.guild_id.ok_or(CommandError::from("Guild not found"))
}

/// The voice channel the author is currently in, if any.
fn member_voice_channel(ctx: &Context, msg: &Message) -> CommandResult<Option<ChannelId>> {
    let channel_id = get_guild(ctx, msg)?
        .voice_states.get(&msg.author.id)
        .and_then(|voice_state| voice_state.channel_id);

    Ok(channel_id)
}
