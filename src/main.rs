mod api;
mod config;
mod context;
mod cooldown;
mod event;
mod feed_ledger;
mod handler;
mod helper;
mod logging;
mod loot;
mod persistent_state;
mod plugin;
mod scheduler;
mod volatile_state;

use serenity::{all::GatewayIntents, Client};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = crate::config::Config::load().await?;
    let token = cfg.general.discord_token.clone();
    let web = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.general.http_timeout_seconds))
        .user_agent(concat!("cogbot/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let pstate = crate::persistent_state::PersistentState::load().await?;
    let vstate = crate::volatile_state::VolatileState::new()?;
    let handler = handler::Handler::new(cfg, pstate, vstate, web);

    // Things we want discord to tell us about.
    let intents = GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::MESSAGE_CONTENT;

    Client::builder(&token, intents)
        .event_handler(handler)
        .await?
        .start()
        .await
        .map_err(Into::into)
}
