use crate::{
    config::Config, context::Context, event::Event, persistent_state::PersistentState,
    volatile_state::VolatileState,
};
use serenity::all::{Message, Reaction, Ready};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::RwLock;

/// State owned by the bot for its whole lifetime.  Shared with the scheduler task.
pub struct Shared {
    cfg: RwLock<Config>,
    pstate: RwLock<PersistentState>,
    vstate: RwLock<VolatileState>,
    web: reqwest::Client,
}

impl<'a> Shared {
    pub fn ctx(&'a self, discord_ctx: &'a serenity::all::Context) -> Context<'a> {
        Context {
            cfg: &self.cfg,
            pstate: &self.pstate,
            vstate: &self.vstate,
            web: &self.web,
            cache: &discord_ctx.cache,
            http: &discord_ctx.http,
            cache_http: discord_ctx,
        }
    }
}

/// Discord event handler
pub struct Handler {
    shared: Arc<Shared>,
    scheduler_started: AtomicBool,
}

impl Handler {
    pub fn new(
        cfg: Config,
        pstate: PersistentState,
        vstate: VolatileState,
        web: reqwest::Client,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                cfg: RwLock::new(cfg),
                pstate: RwLock::new(pstate),
                vstate: RwLock::new(vstate),
                web,
            }),
            scheduler_started: AtomicBool::new(false),
        }
    }
}

#[serenity::async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, discord_ctx: serenity::all::Context, ready: Ready) {
        // `ready` fires again on reconnect.  One scheduler is enough.
        if !self.scheduler_started.swap(true, Ordering::SeqCst) {
            crate::scheduler::start(Arc::clone(&self.shared), discord_ctx.clone());
        }

        Event::Ready(ready)
            .handle(self.shared.ctx(&discord_ctx))
            .await;
    }

    async fn message(&self, discord_ctx: serenity::all::Context, msg: Message) {
        Event::Message(msg)
            .handle(self.shared.ctx(&discord_ctx))
            .await;
    }

    async fn reaction_add(&self, discord_ctx: serenity::all::Context, reaction: Reaction) {
        Event::ReactionAdd(reaction)
            .handle(self.shared.ctx(&discord_ctx))
            .await;
    }
}
