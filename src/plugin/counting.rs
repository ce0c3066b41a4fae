use crate::{
    cooldown, event::*, helper::*, log_error, log_internal, persistent_state::UserData, plugin::*,
};
use anyhow::Result;
use serenity::all::{ChannelId, GuildId, Message, RoleId, UserId};
use std::collections::HashMap;

/// Counting game: members count up one at a time in a dedicated channel
pub struct Counting;

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CountingState {
    pub guilds: HashMap<GuildId, CountingGuild>,
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CountingGuild {
    pub channel: Option<ChannelId>,
    pub current: u64,
    pub last_user: Option<UserId>,
    pub high_score: u64,
    /// Given to whoever ruins the count
    pub ruin_role: Option<RoleId>,
    /// Overrides `counting.default_ruin_minutes`
    pub ruin_minutes: Option<u64>,
    /// Members holding a ruin role
    pub ruined: HashMap<UserId, RuinedMember>,
}

/// The role a member was given for ruining the count, and when it comes off
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub struct RuinedMember {
    pub role: RoleId,
    pub expires_at: i64,
}

#[derive(PartialEq, Eq, Debug)]
pub enum Verdict {
    Accepted,
    WrongNumber { expected: u64 },
    CountedTwice { expected: u64 },
}

impl CountingGuild {
    pub fn judge(&self, user_id: UserId, n: i64) -> Verdict {
        let expected = self.current + 1;
        if i64::try_from(expected).ok() != Some(n) {
            Verdict::WrongNumber { expected }
        } else if self.last_user == Some(user_id) {
            Verdict::CountedTwice { expected }
        } else {
            Verdict::Accepted
        }
    }

    /// Record a correct count.  Returns whether it set a new high score.
    pub fn accept(&mut self, user_id: UserId) -> bool {
        self.current += 1;
        self.last_user = Some(user_id);
        if self.current > self.high_score {
            self.high_score = self.current;
            true
        } else {
            false
        }
    }

    /// Reset the count.  Returns the role to hand out and when it expires, if one is configured.
    pub fn ruin(
        &mut self,
        user_id: UserId,
        now: i64,
        default_minutes: u64,
    ) -> Option<(RoleId, i64)> {
        self.current = 0;
        self.last_user = None;

        let role = self.ruin_role?;
        let minutes = self.ruin_minutes.unwrap_or(default_minutes);
        let seconds = i64::try_from(minutes.saturating_mul(60)).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(seconds);
        self.ruined.insert(user_id, RuinedMember { role, expires_at });
        Some((role, expires_at))
    }

    /// Members whose ruin role should come off now, with the role they were given
    pub fn take_expired(&mut self, now: i64) -> Vec<(UserId, RoleId)> {
        let expired: Vec<(UserId, RoleId)> = self
            .ruined
            .iter()
            .filter(|(_, ruined)| cooldown::is_ready(ruined.expires_at, now))
            .map(|(user_id, ruined)| (*user_id, ruined.role))
            .collect();
        for (user_id, _) in &expired {
            self.ruined.remove(user_id);
        }
        expired
    }
}

/// The number a message counts, if its first word is one
pub fn parse_count(content: &str) -> Option<i64> {
    content.split_whitespace().next()?.parse().ok()
}

impl UserData for CountingState {
    fn forget_user(&mut self, user_id: UserId) -> bool {
        let mut forgot = false;
        for guild in self.guilds.values_mut() {
            forgot |= guild.ruined.remove(&user_id).is_some();
            if guild.last_user == Some(user_id) {
                guild.last_user = None;
                forgot = true;
            }
        }
        forgot
    }
}

#[serenity::async_trait]
impl Plugin for Counting {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_lines(
                ctx,
                &[
                    "counting status - current count and high score",
                    "counting channel <#channel|off> - where to count (managers)",
                    "counting role <@role|off> - role given for ruining the count (managers)",
                    "counting duration <minutes> - how long the ruin role lasts (managers)",
                    "counting reset - start over from zero (managers)",
                ],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        match event {
            Event::Tick => {
                expire_ruin_roles(ctx).await?;
                Ok(EventHandled::No)
            }
            Event::Message(msg) => {
                if let Some((msg, name, args)) = event.bot_cmd(ctx).await {
                    if name.eq_ignore_ascii_case(self.name()) {
                        return command(ctx, msg, &args).await;
                    }
                    return Ok(EventHandled::No);
                }
                count(ctx, msg).await
            }
            _ => Ok(EventHandled::No),
        }
    }
}

async fn count(ctx: &Context<'_>, msg: &Message) -> Result<EventHandled> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(EventHandled::No);
    };
    let Some(n) = parse_count(&msg.content) else {
        return Ok(EventHandled::No);
    };
    let default_minutes = ctx.cfg.read().await.counting.default_ruin_minutes;

    let (verdict, new_high, ruin_role) = {
        let mut pstate = ctx.pstate.write().await;
        let Some(guild) = pstate.counting.guilds.get_mut(&guild_id) else {
            return Ok(EventHandled::No);
        };
        if guild.channel != Some(msg.channel_id) {
            return Ok(EventHandled::No);
        }

        let verdict = guild.judge(msg.author.id, n);
        let (new_high, ruin_role) = match verdict {
            Verdict::Accepted => (guild.accept(msg.author.id), None),
            _ => (
                false,
                guild.ruin(msg.author.id, cooldown::now(), default_minutes),
            ),
        };
        pstate.save().await?;
        (verdict, new_high, ruin_role)
    };

    match verdict {
        Verdict::Accepted => {
            msg.react(ctx.cache_http, if new_high { '🏆' } else { '✅' })
                .await?;
        }
        Verdict::WrongNumber { expected } => {
            msg.react(ctx.cache_http, '❌').await?;
            msg.reply_quiet(
                ctx,
                &format!(
                    "<@{}> ruined it! The next number was **{}**. Start again from 1.",
                    msg.author.id, expected
                ),
            )
            .await?;
        }
        Verdict::CountedTwice { expected } => {
            msg.react(ctx.cache_http, '❌').await?;
            msg.reply_quiet(
                ctx,
                &format!(
                    "<@{}> ruined it by counting twice in a row! The next number was **{}**. \
                     Start again from 1.",
                    msg.author.id, expected
                ),
            )
            .await?;
        }
    }

    if let Some((role_id, _)) = ruin_role {
        if let Err(e) = ctx
            .http
            .add_member_role(guild_id, msg.author.id, role_id, Some("Ruined the count"))
            .await
        {
            log_error!("Could not give ruin role to {}: {}", msg.author.id, e);
        }
    }

    Ok(EventHandled::Yes)
}

async fn expire_ruin_roles(ctx: &Context<'_>) -> Result<()> {
    let now = cooldown::now();
    let mut expired: Vec<(GuildId, UserId, RoleId)> = Vec::new();
    {
        let mut pstate = ctx.pstate.write().await;
        for (guild_id, guild) in pstate.counting.guilds.iter_mut() {
            for (user_id, role_id) in guild.take_expired(now) {
                expired.push((*guild_id, user_id, role_id));
            }
        }
        if expired.is_empty() {
            return Ok(());
        }
        pstate.save().await?;
    }

    for (guild_id, user_id, role_id) in expired {
        log_internal!("Lifting ruin role from {} in {}", user_id, guild_id);
        if let Err(e) = ctx
            .http
            .remove_member_role(guild_id, user_id, role_id, Some("Ruin role expired"))
            .await
        {
            log_error!("Could not lift ruin role from {}: {}", user_id, e);
        }
    }
    Ok(())
}

async fn command(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<EventHandled> {
    let Some(guild_id) = msg.require_guild(ctx).await? else {
        return Ok(EventHandled::Yes);
    };

    let sub = args.first().copied().unwrap_or("status");
    if sub != "status" && !msg.require_admin(ctx).await? {
        return Ok(EventHandled::Yes);
    }

    let reply = match (sub, args.get(1).copied()) {
        ("status", _) => {
            let default_minutes = ctx.cfg.read().await.counting.default_ruin_minutes;
            let pstate = ctx.pstate.read().await;
            match pstate.counting.guilds.get(&guild_id) {
                Some(guild) => {
                    let channel = guild
                        .channel
                        .map(|c| format!("<#{}>", c))
                        .unwrap_or_else(|| "not set".to_owned());
                    let role = guild
                        .ruin_role
                        .map(|r| format!("<@&{}>", r))
                        .unwrap_or_else(|| "none".to_owned());
                    format!(
                        "Channel: {}\nCurrent count: **{}**\nHigh score: **{}**\nRuin role: {} for {} minutes",
                        channel,
                        guild.current,
                        guild.high_score,
                        role,
                        guild.ruin_minutes.unwrap_or(default_minutes)
                    )
                }
                None => "Counting isn't set up here yet.".to_owned(),
            }
        }
        ("channel", Some(arg)) => {
            let channel = if arg == "off" {
                None
            } else {
                match parse_channel_mention(arg) {
                    Some(channel) => Some(channel),
                    None => {
                        msg.reply(ctx.cache_http, "Mention a channel, e.g. `#counting`.")
                            .await?;
                        return Ok(EventHandled::Yes);
                    }
                }
            };
            let mut pstate = ctx.pstate.write().await;
            let guild = pstate.counting.guilds.entry(guild_id).or_default();
            guild.channel = channel;
            guild.current = 0;
            guild.last_user = None;
            pstate.save().await?;
            match channel {
                Some(channel) => format!("Counting now happens in <#{}>. Start from 1!", channel),
                None => "Counting is off.".to_owned(),
            }
        }
        ("role", Some(arg)) => {
            let role = if arg == "off" {
                None
            } else {
                match msg.mention_roles.first().copied().or_else(|| parse_role_mention(arg)) {
                    Some(role) => Some(role),
                    None => {
                        msg.reply(ctx.cache_http, "Mention a role, or say `off`.")
                            .await?;
                        return Ok(EventHandled::Yes);
                    }
                }
            };
            let mut pstate = ctx.pstate.write().await;
            pstate.counting.guilds.entry(guild_id).or_default().ruin_role = role;
            pstate.save().await?;
            match role {
                Some(role) => format!("Whoever ruins the count gets <@&{}>.", role),
                None => "No role for ruining the count.".to_owned(),
            }
        }
        ("duration", Some(arg)) => match arg.parse::<u64>() {
            Ok(minutes) if minutes > 0 => {
                let mut pstate = ctx.pstate.write().await;
                pstate.counting.guilds.entry(guild_id).or_default().ruin_minutes = Some(minutes);
                pstate.save().await?;
                format!("The ruin role now lasts {} minutes.", minutes)
            }
            _ => "Give the duration as a whole number of minutes.".to_owned(),
        },
        ("reset", _) => {
            let mut pstate = ctx.pstate.write().await;
            let guild = pstate.counting.guilds.entry(guild_id).or_default();
            guild.current = 0;
            guild.last_user = None;
            pstate.save().await?;
            "The count is back to zero.".to_owned()
        }
        _ => Counting.usage(ctx).await.unwrap_or_default(),
    };

    msg.reply_quiet(ctx, &reply).await?;
    Ok(EventHandled::Yes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: UserId = UserId::new(1);
    const BOB: UserId = UserId::new(2);

    #[test]
    fn accepts_the_next_number_from_someone_new() {
        let mut guild = CountingGuild::default();
        assert_eq!(guild.judge(ALICE, 1), Verdict::Accepted);
        assert!(guild.accept(ALICE));
        assert_eq!(guild.judge(BOB, 2), Verdict::Accepted);
        assert!(guild.accept(BOB));
        assert_eq!(guild.current, 2);
        assert_eq!(guild.high_score, 2);
    }

    #[test]
    fn rejects_wrong_numbers_and_double_counts() {
        let mut guild = CountingGuild::default();
        guild.accept(ALICE);
        assert_eq!(guild.judge(BOB, 3), Verdict::WrongNumber { expected: 2 });
        assert_eq!(guild.judge(BOB, -2), Verdict::WrongNumber { expected: 2 });
        assert_eq!(guild.judge(ALICE, 2), Verdict::CountedTwice { expected: 2 });
    }

    #[test]
    fn ruin_resets_and_schedules_role_removal() {
        let mut guild = CountingGuild {
            current: 10,
            high_score: 10,
            last_user: Some(ALICE),
            ..Default::default()
        };
        assert_eq!(guild.ruin(BOB, 1000, 60), None);
        assert_eq!(guild.current, 0);
        assert_eq!(guild.last_user, None);
        assert_eq!(guild.high_score, 10);

        guild.ruin_role = Some(RoleId::new(7));
        guild.ruin_minutes = Some(5);
        assert_eq!(guild.ruin(BOB, 1000, 60), Some((RoleId::new(7), 1300)));
        assert!(guild.take_expired(1299).is_empty());
        assert_eq!(guild.take_expired(1300), vec![(BOB, RoleId::new(7))]);
        assert!(guild.ruined.is_empty());
    }

    #[test]
    fn expiry_lifts_the_role_that_was_granted() {
        let mut guild = CountingGuild {
            ruin_role: Some(RoleId::new(7)),
            ..Default::default()
        };
        guild.ruin(BOB, 1000, 1);

        guild.ruin_role = Some(RoleId::new(8));
        guild.ruin(ALICE, 1000, 1);
        guild.ruin_role = None;

        let mut expired = guild.take_expired(2000);
        expired.sort();
        assert_eq!(expired, vec![(ALICE, RoleId::new(8)), (BOB, RoleId::new(7))]);
    }

    #[test]
    fn forgetting_clears_last_counter_and_ruin_entry() {
        let mut state = CountingState::default();
        let guild = state.guilds.entry(GuildId::new(1)).or_default();
        guild.ruin_role = Some(RoleId::new(7));
        guild.accept(ALICE);
        guild.ruin(BOB, 1000, 1);
        guild.accept(BOB);

        assert!(state.forget_user(BOB));
        let guild = &state.guilds[&GuildId::new(1)];
        assert_eq!(guild.last_user, None);
        assert!(guild.ruined.is_empty());
        assert_eq!(guild.current, 1);
        assert!(!state.forget_user(BOB));
    }

    #[test]
    fn only_leading_integers_count() {
        assert_eq!(parse_count("42"), Some(42));
        assert_eq!(parse_count("  7 is next"), Some(7));
        assert_eq!(parse_count("hello 7"), None);
        assert_eq!(parse_count(""), None);
    }
}
