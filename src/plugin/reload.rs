use crate::{event::*, helper::MessageHelper, log_internal, plugin::*};
use anyhow::Result;

pub struct Reload;

#[serenity::async_trait]
impl Plugin for Reload {
    fn name(&self) -> &'static str {
        "reload"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(usage_lines(ctx, &["reload - reload config (bot owner only)"]).await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let response = if !msg.is_from_owner(ctx).await {
            "Only the bot's owners can reload its configuration.".to_owned()
        } else {
            match ctx.cfg.write().await.reload().await {
                Ok(()) => {
                    log_internal!("Configuration reloaded by {}", msg.author.name);
                    "Configuration reloaded successfully".to_owned()
                }
                Err(e) => format!("Configuration unchanged: {}", e),
            }
        };

        msg.reply(ctx.cache_http, response).await?;
        Ok(EventHandled::Yes)
    }
}
