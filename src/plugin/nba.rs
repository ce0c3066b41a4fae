use crate::{api::nba, event::*, helper::*, log_error, plugin::*};
use anyhow::Result;

/// Today's NBA games
pub struct Nba;

#[serenity::async_trait]
impl Plugin for Nba {
    fn name(&self) -> &'static str {
        "nba"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(usage_lines(ctx, &["nba - today's NBA scoreboard"]).await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let reply = match nba::scoreboard(ctx.web).await {
            Ok(board) if board.games.is_empty() => {
                format!("No NBA games on {}.", board.game_date)
            }
            Ok(board) => {
                let mut reply = format!("🏀 **NBA, {}**\n", board.game_date);
                for game in &board.games {
                    reply.push_str(&game.summary());
                    reply.push('\n');
                }
                reply
            }
            Err(e) => {
                log_error!("NBA scoreboard unavailable: {}", e);
                "The NBA scoreboard is unavailable right now.".to_owned()
            }
        };
        msg.reply_quiet(ctx, &reply).await?;
        Ok(EventHandled::Yes)
    }
}
