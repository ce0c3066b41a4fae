use crate::{event::*, helper::*, log_event, logging::*, plugin::*};
use anyhow::Result;
use std::borrow::Cow;

/// Prints debug information about event to stdout
pub struct Debug;

#[serenity::async_trait]
impl Plugin for Debug {
    fn name(&self) -> &'static str {
        "debug"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        match event {
            Event::Ready(ready) => {
                log_event!(
                    "Connected to {} server(s) as {}",
                    ready.guilds.len(),
                    ready.user.color(),
                );
            }
            Event::Message(msg) => {
                log_event!(
                    "{}{}{}{}{}{} {}",
                    msg.guild_id.color(ctx.http).await,
                    Glue.color(),
                    msg.channel_id.color(ctx.http).await,
                    Glue.color(),
                    msg.author.color(),
                    Glue.color(),
                    msg.human_format_content(ctx).await?,
                );
            }
            Event::ReactionAdd(reaction) => {
                let emoji = match &reaction.emoji {
                    serenity::all::ReactionType::Custom { name, .. } => {
                        Cow::Owned(name.clone().unwrap_or("<unknown-emoji>".to_owned()))
                    }
                    serenity::all::ReactionType::Unicode(s) => Cow::Borrowed(s.as_str()),
                    _ => Cow::Borrowed("<unknown-emoji>"),
                };

                log_event!(
                    "{} reacted in \"{}\" with \"{}\"",
                    reaction.user_id.color(ctx.http).await,
                    reaction.channel_id.color(ctx.http).await,
                    emoji
                );
            }
            // Far too noisy to log
            Event::Tick => {}
        }

        Ok(EventHandled::No)
    }
}
