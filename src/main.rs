use std::sync::Arc;

use dotenvy::dotenv;
use serenity::{
    async_trait,
    client::{Client, Context, EventHandler},
    framework::StandardFramework,
    model::{channel::Message, gateway::Ready, prelude::VoiceState},
    prelude::GatewayIntents,
};
use songbird::{SerenityInit, Songbird};
use tracing::{info, info_span};
use tracing_futures::Instrument;
use tracing_subscriber::EnvFilter;

use crate::commands::{check_msg, PrefixKey, Sessions, SessionsKey, GENERAL_GROUP};
use crate::config::Config;
use crate::replies::Style;
use crate::resolver::YtDlpResolver;
use crate::session::SessionManager;
use crate::voice::SongbirdConnector;

mod commands;
mod config;
mod error;
mod models;
mod pump;
mod replies;
mod resolver;
mod session;
mod voice;

struct Handler;

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || msg.guild_id.is_none() {
            return;
        }

        for keyword in replies::matching(&msg.content) {
            let sent = match keyword.style {
                Style::Say => msg.channel_id.say(&ctx.http, keyword.text).await,
                Style::Reply => msg.reply(&ctx, keyword.text).await,
            };

            check_msg(sent);
        }
    }

    async fn ready(&self, _: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);
    }

    async fn voice_state_update(&self, ctx: Context, _: Option<VoiceState>, new: VoiceState) {
        if new.channel_id.is_some() || new.user_id != ctx.cache.current_user_id() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        info!("Bot was disconnected from voice in guild {}", guild_id.0);

        let sessions = {
            let data = ctx.data.read().await;
            data.get::<SessionsKey>().cloned()
        };

        if let Some(sessions) = sessions {
            sessions.reset(guild_id).await;
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().expect("Invalid configuration");

    let framework = StandardFramework::new()
        .configure(|c| c.prefix(config.prefix.as_str()))
        .group(&GENERAL_GROUP);

    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_VOICE_STATES;

    let songbird = Songbird::serenity();
    let (sessions, track_ends) = SessionManager::new(SongbirdConnector::new(songbird.clone()), YtDlpResolver::default());
    let sessions: Arc<Sessions> = Arc::new(sessions);

    let mut client = Client::builder(&config.token, intents)
        .event_handler(Handler)
        .framework(framework)
        .register_songbird_with(songbird)
        .await
        .expect("Err creating client");

    {
        let mut data = client.data.write().await;

        data.insert::<SessionsKey>(sessions.clone());
        data.insert::<PrefixKey>(config.prefix.clone());
    }

    let http = client.cache_and_http.http.clone();
    tokio::spawn(pump::playback_pump(http, sessions, track_ends).instrument(info_span!("playback_pump")));

    tokio::spawn(async move {
        let _ = client.start().await.map_err(|why| info!("Client ended: {why:?}"));
    });

    tokio::signal::ctrl_c().await.expect("Control-C interruption failed!");

    info!("Received Ctrl-C, shutting down.");
}
