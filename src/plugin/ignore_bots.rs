use crate::{event::*, plugin::*};
use anyhow::Result;

pub struct IgnoreBots;

#[serenity::async_trait]
impl Plugin for IgnoreBots {
    fn name(&self) -> &'static str {
        "ignore_bots"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, _ctx: &Context, event: &Event) -> Result<EventHandled> {
        let bot = match event {
            Event::Message(msg) => msg.author.bot,
            Event::ReactionAdd(reaction) => reaction
                .member
                .as_ref()
                .is_some_and(|member| member.user.bot),
            _ => false,
        };

        if bot {
            Ok(EventHandled::Yes)
        } else {
            Ok(EventHandled::No)
        }
    }
}
