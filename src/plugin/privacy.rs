use crate::{event::*, log_internal, persistent_state::UserData, plugin::*};
use anyhow::Result;

/// Lets members erase everything the bot has stored about them
pub struct Privacy;

#[serenity::async_trait]
impl Plugin for Privacy {
    fn name(&self) -> &'static str {
        "forgetme"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_lines(
                ctx,
                &["forgetme confirm - delete all of your data from every plugin"],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        if args.first() != Some(&"confirm") {
            let usage = usage_lines(ctx, &["forgetme confirm"]).await;
            msg.reply(
                ctx.cache_http,
                format!(
                    "This erases your scores, inventories, wallets and watchlist everywhere. \
                     Type `{}` to go ahead.",
                    usage
                ),
            )
            .await?;
            return Ok(EventHandled::Yes);
        }

        let forgot = {
            let mut pstate = ctx.pstate.write().await;
            let forgot = pstate.forget_user(msg.author.id);
            if forgot {
                pstate.save().await?;
            }
            forgot
        };

        let reply = if forgot {
            log_internal!("Erased stored data for user {}", msg.author.id);
            "Done. Everything stored about you has been deleted."
        } else {
            "I wasn't storing anything about you."
        };
        msg.reply(ctx.cache_http, reply).await?;
        Ok(EventHandled::Yes)
    }
}
