//! Discord callbacks, plus the scheduler's ticks, translated into a single enum the plugins can
//! match on.

use crate::{context::Context, log_error};
use serenity::all::{Message, Reaction, Ready};

/// Something a plugin may want to react to
pub enum Event {
    Ready(Ready),
    Message(Message),
    ReactionAdd(Reaction),
    /// Periodic wake-up from the scheduler.  Plugins check their deadlines here.
    Tick,
}

pub enum EventHandled {
    Yes,
    No,
}

impl Event {
    /// When an event occurs, iterate over all the plugins to see if any can/should handle it.
    ///
    /// `Ready` and `Tick` go to every plugin no matter what each one answers.
    pub async fn handle(self, ctx: Context<'_>) {
        let broadcast = matches!(self, Event::Ready(_) | Event::Tick);

        for plugin in crate::plugin::plugins() {
            match plugin.handle(&ctx, &self).await {
                Ok(EventHandled::Yes) if !broadcast => return,
                Ok(_) => continue,
                Err(err) => log_error!("Error in plugin {}: {:#}", plugin.name(), err),
            }
        }
    }

    /// Check if a message is a bot command with the given name, e.g. `;cmd foo bar baz`.
    /// Returns the message and its arguments.
    pub async fn is_bot_cmd(&self, ctx: &Context<'_>, cmd: &str) -> Option<(&Message, Vec<&str>)> {
        let (msg, name, args) = self.bot_cmd(ctx).await?;
        name.eq_ignore_ascii_case(cmd).then_some((msg, args))
    }

    /// Split any prefixed message into command name and arguments.
    pub async fn bot_cmd(&self, ctx: &Context<'_>) -> Option<(&Message, &str, Vec<&str>)> {
        let Event::Message(msg) = self else {
            return None;
        };
        let prefix = ctx.cfg.read().await.general.command_prefix.clone();
        let (name, args) = split_bot_cmd(&msg.content, &prefix)?;
        Some((msg, name, args))
    }
}

/// `;cmd foo bar` with prefix `;` becomes `("cmd", ["foo", "bar"])`.
pub fn split_bot_cmd<'c>(content: &'c str, prefix: &str) -> Option<(&'c str, Vec<&'c str>)> {
    let mut words = content.split_whitespace();
    let name = words.next()?.strip_prefix(prefix)?;
    if name.is_empty() {
        return None;
    }
    Some((name, words.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_prefixed_commands() {
        assert_eq!(
            split_bot_cmd("  ;chest interval 5 10", ";"),
            Some(("chest", vec!["interval", "5", "10"]))
        );
        assert_eq!(split_bot_cmd("!!hunt", "!!"), Some(("hunt", vec![])));
    }

    #[test]
    fn ignores_plain_chatter() {
        assert_eq!(split_bot_cmd("hello ;chest", ";"), None);
        assert_eq!(split_bot_cmd("; chest", ";"), None);
        assert_eq!(split_bot_cmd("", ";"), None);
    }
}
