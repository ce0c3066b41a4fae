use crate::{event::*, helper::*, persistent_state::UserData, plugin::*};
use anyhow::Result;
use serenity::all::{ChannelId, GuildId, Message, UserId};
use std::collections::{BTreeSet, HashMap};

/// Tracks member activity and hands out achievements at fixed thresholds
pub struct Achievements;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Metric {
    Messages,
    Reactions,
}

pub struct Achievement {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub metric: Metric,
    pub threshold: u64,
}

pub const CATALOGUE: &[Achievement] = &[
    Achievement {
        key: "first_words",
        name: "First Words",
        description: "Send your first message",
        metric: Metric::Messages,
        threshold: 1,
    },
    Achievement {
        key: "chatterbox",
        name: "Chatterbox",
        description: "Send 100 messages",
        metric: Metric::Messages,
        threshold: 100,
    },
    Achievement {
        key: "regular",
        name: "Regular",
        description: "Send 1,000 messages",
        metric: Metric::Messages,
        threshold: 1_000,
    },
    Achievement {
        key: "legend",
        name: "Legend",
        description: "Send 10,000 messages",
        metric: Metric::Messages,
        threshold: 10_000,
    },
    Achievement {
        key: "first_reaction",
        name: "Expressive",
        description: "React to a message",
        metric: Metric::Reactions,
        threshold: 1,
    },
    Achievement {
        key: "reactor",
        name: "Reactor",
        description: "React 100 times",
        metric: Metric::Reactions,
        threshold: 100,
    },
];

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AchievementsState {
    pub guilds: HashMap<GuildId, GuildAchievements>,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GuildAchievements {
    pub enabled: bool,
    pub announce_channel: Option<ChannelId>,
    pub members: HashMap<UserId, MemberProgress>,
}

impl Default for GuildAchievements {
    fn default() -> Self {
        Self {
            enabled: true,
            announce_channel: None,
            members: HashMap::new(),
        }
    }
}

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MemberProgress {
    pub messages: u64,
    pub reactions: u64,
    pub unlocked: BTreeSet<String>,
}

impl MemberProgress {
    fn count(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Messages => self.messages,
            Metric::Reactions => self.reactions,
        }
    }

    /// Count one more of `metric` and return whatever that unlocked.
    pub fn record(&mut self, metric: Metric) -> Vec<&'static Achievement> {
        match metric {
            Metric::Messages => self.messages = self.messages.saturating_add(1),
            Metric::Reactions => self.reactions = self.reactions.saturating_add(1),
        }

        let count = self.count(metric);
        let mut unlocked = Vec::new();
        for achievement in CATALOGUE {
            if achievement.metric == metric
                && count >= achievement.threshold
                && self.unlocked.insert(achievement.key.to_owned())
            {
                unlocked.push(achievement);
            }
        }
        unlocked
    }
}

impl UserData for AchievementsState {
    fn forget_user(&mut self, user_id: UserId) -> bool {
        let mut forgot = false;
        for guild in self.guilds.values_mut() {
            forgot |= guild.members.remove(&user_id).is_some();
        }
        forgot
    }
}

#[serenity::async_trait]
impl Plugin for Achievements {
    fn name(&self) -> &'static str {
        "achievements"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_lines(
                ctx,
                &[
                    "achievements [@user] - show unlocked achievements",
                    "achievements list - every achievement there is",
                    "achievements top - members with the most achievements",
                    "achievements toggle - turn tracking on/off (managers)",
                    "achievements channel <#channel|off> - where to announce (managers)",
                    "achievements reset @user - wipe a member's progress (managers)",
                ],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        if let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await {
            return command(ctx, msg, &args).await;
        }

        match event {
            Event::Message(msg) => {
                if let Some(guild_id) = msg.guild_id {
                    track(ctx, guild_id, msg.author.id, Metric::Messages, msg.channel_id).await?;
                }
            }
            Event::ReactionAdd(reaction) => {
                if let (Some(guild_id), Some(user_id)) = (reaction.guild_id, reaction.user_id) {
                    track(ctx, guild_id, user_id, Metric::Reactions, reaction.channel_id).await?;
                }
            }
            _ => {}
        }

        // Tracking never consumes the event
        Ok(EventHandled::No)
    }
}

async fn track(
    ctx: &Context<'_>,
    guild_id: GuildId,
    user_id: UserId,
    metric: Metric,
    fallback_channel: ChannelId,
) -> Result<()> {
    let (unlocked, channel) = {
        let mut pstate = ctx.pstate.write().await;
        let guild = pstate.achievements.guilds.entry(guild_id).or_default();
        if !guild.enabled {
            return Ok(());
        }
        let unlocked = guild.members.entry(user_id).or_default().record(metric);
        let channel = guild.announce_channel.unwrap_or(fallback_channel);
        pstate.save().await?;
        (unlocked, channel)
    };

    for achievement in unlocked {
        channel
            .say(
                ctx.http,
                format!(
                    "🏆 <@{}> unlocked **{}**: {}",
                    user_id, achievement.name, achievement.description
                ),
            )
            .await?;
    }
    Ok(())
}

async fn command(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<EventHandled> {
    let Some(guild_id) = msg.require_guild(ctx).await? else {
        return Ok(EventHandled::Yes);
    };

    match args.first().copied() {
        Some("list") => {
            let mut reply = String::from("**Achievements**\n");
            for achievement in CATALOGUE {
                reply.push_str(&format!(
                    "**{}** - {}\n",
                    achievement.name, achievement.description
                ));
            }
            msg.reply(ctx.cache_http, reply).await?;
        }
        Some("top") => {
            let ranking = {
                let pstate = ctx.pstate.read().await;
                let mut ranking: Vec<(UserId, usize, u64)> = pstate
                    .achievements
                    .guilds
                    .get(&guild_id)
                    .map(|guild| {
                        guild
                            .members
                            .iter()
                            .map(|(id, p)| (*id, p.unlocked.len(), p.messages))
                            .collect()
                    })
                    .unwrap_or_default();
                ranking.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)));
                ranking.truncate(10);
                ranking
            };

            if ranking.is_empty() {
                msg.reply(ctx.cache_http, "Nobody has unlocked anything yet.")
                    .await?;
                return Ok(EventHandled::Yes);
            }
            let mut reply = String::from("**Most decorated members**\n");
            for (rank, (user_id, unlocked, _)) in ranking.iter().enumerate() {
                reply.push_str(&format!(
                    "{} <@{}> - {} of {}\n",
                    ordinal(rank + 1),
                    user_id,
                    unlocked,
                    CATALOGUE.len()
                ));
            }
            msg.reply_quiet(ctx, &reply).await?;
        }
        Some("toggle") => {
            if !msg.require_admin(ctx).await? {
                return Ok(EventHandled::Yes);
            }
            let enabled = {
                let mut pstate = ctx.pstate.write().await;
                let guild = pstate.achievements.guilds.entry(guild_id).or_default();
                guild.enabled = !guild.enabled;
                let enabled = guild.enabled;
                pstate.save().await?;
                enabled
            };
            let reply = if enabled {
                "Achievement tracking is now on."
            } else {
                "Achievement tracking is now off."
            };
            msg.reply(ctx.cache_http, reply).await?;
        }
        Some("channel") => {
            if !msg.require_admin(ctx).await? {
                return Ok(EventHandled::Yes);
            }
            let channel = match args.get(1).copied() {
                Some("off") => None,
                Some(arg) => match parse_channel_mention(arg) {
                    Some(channel) => Some(channel),
                    None => {
                        msg.reply(ctx.cache_http, "Mention a channel, e.g. `#general`.")
                            .await?;
                        return Ok(EventHandled::Yes);
                    }
                },
                None => Some(msg.channel_id),
            };
            {
                let mut pstate = ctx.pstate.write().await;
                pstate
                    .achievements
                    .guilds
                    .entry(guild_id)
                    .or_default()
                    .announce_channel = channel;
                pstate.save().await?;
            }
            let reply = match channel {
                Some(channel) => format!("Achievements will be announced in <#{}>.", channel),
                None => "Achievements will be announced where they happen.".to_owned(),
            };
            msg.reply(ctx.cache_http, reply).await?;
        }
        Some("reset") => {
            if !msg.require_admin(ctx).await? {
                return Ok(EventHandled::Yes);
            }
            let Some(user_id) = msg
                .mentions
                .first()
                .map(|u| u.id)
                .or_else(|| args.get(1).and_then(|arg| parse_user_mention(arg)))
            else {
                msg.reply(ctx.cache_http, "Whose progress should I reset?")
                    .await?;
                return Ok(EventHandled::Yes);
            };
            {
                let mut pstate = ctx.pstate.write().await;
                if let Some(guild) = pstate.achievements.guilds.get_mut(&guild_id) {
                    guild.members.remove(&user_id);
                }
                pstate.save().await?;
            }
            msg.reply_quiet(ctx, &format!("Progress for <@{}> was reset.", user_id))
                .await?;
        }
        _ => {
            let user_id = target_user(msg, args);
            let progress = ctx
                .pstate
                .read()
                .await
                .achievements
                .guilds
                .get(&guild_id)
                .and_then(|guild| guild.members.get(&user_id))
                .cloned()
                .unwrap_or_default();
            let name = user_id.nick_in_guild(ctx, Some(guild_id)).await;

            let mut reply = format!(
                "**{}** - {} messages, {} reactions\n",
                name, progress.messages, progress.reactions
            );
            for achievement in CATALOGUE {
                let mark = if progress.unlocked.contains(achievement.key) {
                    "🏆"
                } else {
                    "🔒"
                };
                reply.push_str(&format!(
                    "{} **{}** - {}\n",
                    mark, achievement.name, achievement.description
                ));
            }
            msg.reply(ctx.cache_http, reply).await?;
        }
    }

    Ok(EventHandled::Yes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlocks_once_at_threshold() {
        let mut progress = MemberProgress::default();
        let first = progress.record(Metric::Messages);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].key, "first_words");

        for _ in 0..98 {
            assert!(progress.record(Metric::Messages).is_empty());
        }
        let hundredth = progress.record(Metric::Messages);
        assert_eq!(hundredth.len(), 1);
        assert_eq!(hundredth[0].key, "chatterbox");
        assert!(progress.record(Metric::Messages).is_empty());
        assert_eq!(progress.messages, 101);
    }

    #[test]
    fn metrics_are_independent() {
        let mut progress = MemberProgress::default();
        let unlocked = progress.record(Metric::Reactions);
        assert_eq!(unlocked.len(), 1);
        assert_eq!(unlocked[0].key, "first_reaction");
        assert_eq!(progress.messages, 0);
        assert!(!progress.unlocked.contains("first_words"));
    }

    #[test]
    fn guilds_track_by_default_and_forget_members() {
        let user = UserId::new(3);
        let mut state = AchievementsState::default();
        let guild = state.guilds.entry(GuildId::new(1)).or_default();
        assert!(guild.enabled);
        guild.members.entry(user).or_default().record(Metric::Messages);

        assert!(state.forget_user(user));
        assert!(!state.forget_user(user));
    }
}
