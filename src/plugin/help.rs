use crate::{event::*, helper::*, plugin::*};
use anyhow::Result;

pub struct Help;

#[serenity::async_trait]
impl Plugin for Help {
    fn name(&self) -> &'static str {
        "help"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_lines(
                ctx,
                &[
                    "help - list plugins and their main command",
                    "help <plugin> - show every command of one plugin",
                ],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let mut body = String::new();
        match args.first() {
            Some(wanted) => {
                for plugin in crate::plugin::plugins() {
                    if !plugin.name().eq_ignore_ascii_case(wanted) {
                        continue;
                    }
                    if let Some(usage) = plugin.usage(ctx).await {
                        body = usage;
                    }
                }
                if body.is_empty() {
                    msg.reply(ctx.cache_http, format!("No plugin named `{}`.", wanted))
                        .await?;
                    return Ok(EventHandled::Yes);
                }
            }
            None => {
                body.push_str("Plugins:\n");
                for plugin in crate::plugin::plugins() {
                    if let Some(usage) = plugin.usage(ctx).await {
                        let first = usage.lines().next().unwrap_or_default();
                        body.push_str(&format!("{:<13} {}\n", plugin.name(), first));
                    }
                }
            }
        }

        for chunk in fenced_chunks(&body) {
            msg.channel_id.say(ctx.http, chunk).await?;
        }
        Ok(EventHandled::Yes)
    }
}

/// Split `text` to fit the message limit, each piece in its own code block
fn fenced_chunks(text: &str) -> Vec<String> {
    const FENCE: &str = "```";
    let room = MESSAGE_LIMIT - 2 * (FENCE.len() + 1);
    chunk_message(text.trim_end(), room)
        .into_iter()
        .map(|chunk| format!("{}\n{}\n{}", FENCE, chunk.trim_end(), FENCE))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_chunk_is_a_closed_code_block() {
        let text = "plugin - some usage line\n".repeat(300);
        let chunks = fenced_chunks(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= MESSAGE_LIMIT);
            assert!(chunk.starts_with("```\n"));
            assert!(chunk.ends_with("\n```"));
            assert_eq!(chunk.matches("```").count(), 2);
        }
    }

    #[test]
    fn short_help_is_one_block() {
        assert_eq!(fenced_chunks("help - this\n"), ["```\nhelp - this\n```"]);
    }
}
