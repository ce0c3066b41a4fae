use crate::{
    feed_ledger::FeedLedger,
    plugin::{chest::ActiveChest, pokemon::Quiz},
};
use anyhow::Result;
use serenity::all::{ChannelId, GuildId};
use std::collections::HashMap;
use tokio::time::Instant;

/// State which is lost across sessions
pub struct VolatileState {
    /// Chests currently waiting to be claimed
    pub chests: HashMap<GuildId, ActiveChest>,
    /// Running "who's that Pokémon" rounds, one per channel
    pub quizzes: HashMap<ChannelId, Quiz>,
    pub quake_polled_at: Option<Instant>,
    pub quake_ledger: FeedLedger,
}

impl VolatileState {
    pub fn new() -> Result<Self> {
        Ok(Self {
            chests: HashMap::new(),
            quizzes: HashMap::new(),
            quake_polled_at: None,
            quake_ledger: FeedLedger::open()?,
        })
    }
}
