use crate::event::{Event, EventHandled};
use anyhow::Result;

pub use crate::context::Context;

pub mod achievements;
pub mod antiforward;
pub mod chest;
pub mod counting;
mod debug;
pub mod earthquake;
pub mod easter;
pub mod heist;
mod help;
mod holidays;
mod ignore_bots;
mod movies;
mod nba;
pub mod pokemon;
mod privacy;
mod reload;
pub mod roleplay;
pub mod watchlist;

#[serenity::async_trait]
pub trait Plugin: Sync + Send {
    /// Plugin name.  Doubles as the main command name where the plugin has one.
    fn name(&self) -> &'static str;
    /// Help message lines.  None if no help message
    async fn usage(&self, ctx: &Context) -> Option<String>;
    /// Potentially handle event.  Returns:
    /// - Ok(EventHandled::Yes) if the event has been handled and no other plugin should attempt to
    ///   handle it
    /// - Ok(EventHandled::No) if another plugin should attempt to handle the event
    /// - Err if an error occurred
    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled>;
}

/// Ordered list of available plugins
pub fn plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        // Core bot operations
        Box::new(ignore_bots::IgnoreBots),
        Box::new(debug::Debug),
        // Passive listeners.  These see every message before any command runs.
        Box::new(achievements::Achievements),
        Box::new(antiforward::AntiForward),
        Box::new(counting::Counting),
        Box::new(pokemon::Pokemon),
        // Commands
        Box::new(help::Help),
        Box::new(reload::Reload),
        Box::new(privacy::Privacy),
        Box::new(chest::Chest),
        Box::new(easter::Easter),
        Box::new(heist::Heist),
        Box::new(roleplay::Roleplay),
        Box::new(movies::Movies),
        Box::new(watchlist::Watchlist),
        Box::new(earthquake::Earthquake),
        Box::new(holidays::Holidays),
        Box::new(nba::Nba),
    ]
}

/// Prefix each usage line with the configured command prefix.
pub async fn usage_lines(ctx: &Context<'_>, lines: &[&str]) -> String {
    let prefix = ctx.cfg.read().await.general.command_prefix.clone();
    lines
        .iter()
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<String>>()
        .join("\n")
}
