use crate::{
    cooldown, event::*, helper::*, log_error, log_internal, loot::WeightedTable,
    persistent_state::UserData, plugin::*,
};
use anyhow::Result;
use rand::Rng;
use serenity::all::{ChannelId, GuildId, Message, UserId};
use std::collections::HashMap;

/// Treasure chests that spawn at random intervals for the quickest member to claim
pub struct Chest;

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ChestState {
    pub guilds: HashMap<GuildId, GuildChest>,
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GuildChest {
    pub enabled: bool,
    pub channel: Option<ChannelId>,
    /// Spawn interval bounds.  `None` falls back to the configured defaults.
    pub min_minutes: Option<u64>,
    pub max_minutes: Option<u64>,
    pub next_spawn_at: Option<i64>,
    pub members: HashMap<UserId, Hoard>,
}

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Hoard {
    pub coins: u64,
    pub gems: u64,
    pub relics: u64,
    pub claims: u64,
}

/// A chest waiting to be claimed
pub struct ActiveChest {
    pub channel: ChannelId,
    pub expires_at: i64,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Prize {
    SmallCoins,
    BigCoins,
    Gem,
    Relic,
    Mimic,
}

const MIMIC_BITE: u64 = 25;

#[derive(PartialEq, Eq, Debug)]
pub enum Loot {
    Coins(u64),
    Gem,
    Relic,
    /// Coins the mimic tries to eat
    Mimic(u64),
}

fn prize_table() -> WeightedTable<Prize> {
    WeightedTable::new()
        .with(Prize::SmallCoins, 60.0)
        .with(Prize::BigCoins, 25.0)
        .with(Prize::Gem, 10.0)
        .with(Prize::Relic, 4.0)
        .with(Prize::Mimic, 1.0)
}

pub fn roll_loot<R: Rng + ?Sized>(rng: &mut R) -> Loot {
    match prize_table().choose(rng).copied().unwrap_or(Prize::SmallCoins) {
        Prize::SmallCoins => Loot::Coins(rng.gen_range(10..=50)),
        Prize::BigCoins => Loot::Coins(rng.gen_range(100..=250)),
        Prize::Gem => Loot::Gem,
        Prize::Relic => Loot::Relic,
        Prize::Mimic => Loot::Mimic(MIMIC_BITE),
    }
}

impl Hoard {
    /// Add the loot to the hoard.  Returns a line describing what happened.
    pub fn apply(&mut self, loot: &Loot) -> String {
        self.claims = self.claims.saturating_add(1);
        match loot {
            Loot::Coins(n) => {
                self.coins = self.coins.saturating_add(*n);
                format!("found **{} coins** 🪙", n)
            }
            Loot::Gem => {
                self.gems = self.gems.saturating_add(1);
                "found a **gem** 💎".to_owned()
            }
            Loot::Relic => {
                self.relics = self.relics.saturating_add(1);
                "found an ancient **relic** 🏺".to_owned()
            }
            Loot::Mimic(bite) => {
                let lost = (*bite).min(self.coins);
                self.coins -= lost;
                format!("opened a **mimic**! It ate {} coins 🦷", lost)
            }
        }
    }
}

/// One week
pub const MAX_INTERVAL_MINUTES: u64 = 10_080;

/// Deadline of the next spawn, uniformly between `min` and `max` minutes from `now`
pub fn next_spawn<R: Rng + ?Sized>(rng: &mut R, now: i64, min: u64, max: u64) -> i64 {
    let (min, max) = (min.max(1), max.max(min.max(1)));
    let minutes = rng.gen_range(min..=max);
    now.saturating_add(i64::try_from(minutes.saturating_mul(60)).unwrap_or(i64::MAX))
}

impl UserData for ChestState {
    fn forget_user(&mut self, user_id: UserId) -> bool {
        let mut forgot = false;
        for guild in self.guilds.values_mut() {
            forgot |= guild.members.remove(&user_id).is_some();
        }
        forgot
    }
}

#[serenity::async_trait]
impl Plugin for Chest {
    fn name(&self) -> &'static str {
        "chest"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_lines(
                ctx,
                &[
                    "claim - open the chest that just appeared",
                    "chest inventory [@user] - coins, gems and relics collected",
                    "chest top - richest members",
                    "chest enable|disable - turn chest spawns on/off (managers)",
                    "chest channel <#channel> - where chests appear (managers)",
                    "chest interval <min> <max> - minutes between chests (managers)",
                    "chest spawn - drop a chest right now (managers)",
                ],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        if let Event::Tick = event {
            tick(ctx).await?;
            return Ok(EventHandled::No);
        }

        let Some((msg, name, args)) = event.bot_cmd(ctx).await else {
            return Ok(EventHandled::No);
        };
        match name.to_lowercase().as_str() {
            "claim" => claim(ctx, msg).await?,
            "chest" => command(ctx, msg, &args).await?,
            _ => return Ok(EventHandled::No),
        }
        Ok(EventHandled::Yes)
    }
}

async fn tick(ctx: &Context<'_>) -> Result<()> {
    let now = cooldown::now();
    let (default_min, default_max, window) = {
        let cfg = ctx.cfg.read().await;
        (
            cfg.chest.default_min_minutes,
            cfg.chest.default_max_minutes,
            cfg.chest.claim_window_seconds,
        )
    };

    let mut spawned: Vec<ChannelId> = Vec::new();
    let mut vanished: Vec<ChannelId> = Vec::new();
    {
        let mut pstate = ctx.pstate.write().await;
        let mut vstate = ctx.vstate.write().await;

        vstate.chests.retain(|_, chest| {
            let keep = !cooldown::is_ready(chest.expires_at, now);
            if !keep {
                vanished.push(chest.channel);
            }
            keep
        });

        let mut dirty = false;
        for (guild_id, guild) in pstate.chest.guilds.iter_mut() {
            let Some(channel) = guild.channel.filter(|_| guild.enabled) else {
                continue;
            };
            let (min, max) = (
                guild.min_minutes.unwrap_or(default_min),
                guild.max_minutes.unwrap_or(default_max),
            );
            match guild.next_spawn_at {
                None => {
                    guild.next_spawn_at = Some(next_spawn(&mut rand::thread_rng(), now, min, max));
                    dirty = true;
                }
                Some(at) if cooldown::is_ready(at, now) && !vstate.chests.contains_key(guild_id) => {
                    vstate.chests.insert(
                        *guild_id,
                        ActiveChest {
                            channel,
                            expires_at: now + window,
                        },
                    );
                    guild.next_spawn_at = Some(next_spawn(&mut rand::thread_rng(), now, min, max));
                    spawned.push(channel);
                    dirty = true;
                }
                Some(_) => {}
            }
        }
        if dirty {
            pstate.save().await?;
        }
    }

    let prefix = ctx.cfg.read().await.general.command_prefix.clone();
    for channel in vanished {
        if let Err(e) = channel
            .say(ctx.http, "💨 Nobody claimed the chest and it vanished.")
            .await
        {
            log_error!("Could not announce vanished chest in {}: {}", channel, e);
        }
    }
    for channel in spawned {
        log_internal!("Chest spawned in {}", channel);
        if let Err(e) = channel.say(ctx.http, spawn_text(&prefix, window)).await {
            log_error!("Could not announce chest in {}: {}", channel, e);
        }
    }
    Ok(())
}

fn spawn_text(prefix: &str, window: i64) -> String {
    format!(
        "🎁 A treasure chest appeared! Type `{}claim` within {} to open it.",
        prefix,
        cooldown::human_duration(std::time::Duration::from_secs(window.unsigned_abs()))
    )
}

async fn claim(ctx: &Context<'_>, msg: &Message) -> Result<()> {
    let Some(guild_id) = msg.require_guild(ctx).await? else {
        return Ok(());
    };

    let claimed = {
        let mut vstate = ctx.vstate.write().await;
        let here = vstate
            .chests
            .get(&guild_id)
            .is_some_and(|chest| chest.channel == msg.channel_id);
        if here {
            vstate.chests.remove(&guild_id)
        } else {
            None
        }
    };
    if claimed.is_none() {
        msg.reply(ctx.cache_http, "There's no chest here to claim.")
            .await?;
        return Ok(());
    }

    let loot = roll_loot(&mut rand::thread_rng());
    let line = {
        let mut pstate = ctx.pstate.write().await;
        let line = pstate
            .chest
            .guilds
            .entry(guild_id)
            .or_default()
            .members
            .entry(msg.author.id)
            .or_default()
            .apply(&loot);
        pstate.save().await?;
        line
    };

    let name = msg.author.nick_in_guild(ctx, msg.guild_id).await;
    msg.reply(ctx.cache_http, format!("{} {}", name, line))
        .await?;
    Ok(())
}

async fn command(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<()> {
    let Some(guild_id) = msg.require_guild(ctx).await? else {
        return Ok(());
    };
    let sub = args.first().map(|s| s.to_lowercase()).unwrap_or_default();

    match sub.as_str() {
        "inventory" | "inv" => {
            let user_id = target_user(msg, &args[1..]);
            let hoard = ctx
                .pstate
                .read()
                .await
                .chest
                .guilds
                .get(&guild_id)
                .and_then(|guild| guild.members.get(&user_id))
                .cloned()
                .unwrap_or_default();
            let name = user_id.nick_in_guild(ctx, Some(guild_id)).await;
            msg.reply(
                ctx.cache_http,
                format!(
                    "**{}**: 🪙 {} coins, 💎 {} gems, 🏺 {} relics from {} chests",
                    name, hoard.coins, hoard.gems, hoard.relics, hoard.claims
                ),
            )
            .await?;
        }
        "top" => {
            let mut ranking: Vec<(UserId, u64)> = ctx
                .pstate
                .read()
                .await
                .chest
                .guilds
                .get(&guild_id)
                .map(|guild| guild.members.iter().map(|(id, h)| (*id, h.coins)).collect())
                .unwrap_or_default();
            ranking.sort_by(|a, b| b.1.cmp(&a.1));
            ranking.truncate(10);

            if ranking.is_empty() {
                msg.reply(ctx.cache_http, "Nobody has claimed a chest yet.")
                    .await?;
                return Ok(());
            }
            let mut reply = String::from("**Richest treasure hunters**\n");
            for (rank, (user_id, coins)) in ranking.iter().enumerate() {
                reply.push_str(&format!(
                    "{} <@{}> - {} coins\n",
                    ordinal(rank + 1),
                    user_id,
                    coins
                ));
            }
            msg.reply_quiet(ctx, &reply).await?;
        }
        "enable" | "disable" | "channel" | "interval" | "spawn" => {
            if msg.require_admin(ctx).await? {
                admin_command(ctx, msg, guild_id, &sub, &args[1..]).await?;
            }
        }
        _ => {
            let usage = Chest.usage(ctx).await.unwrap_or_default();
            msg.reply(ctx.cache_http, usage).await?;
        }
    }
    Ok(())
}

async fn admin_command(
    ctx: &Context<'_>,
    msg: &Message,
    guild_id: GuildId,
    sub: &str,
    args: &[&str],
) -> Result<()> {
    let reply = match sub {
        "enable" | "disable" => {
            let enabled = sub == "enable";
            let mut pstate = ctx.pstate.write().await;
            let guild = pstate.chest.guilds.entry(guild_id).or_default();
            guild.enabled = enabled;
            guild.next_spawn_at = None;
            if guild.channel.is_none() {
                guild.channel = Some(msg.channel_id);
            }
            let channel = guild.channel;
            pstate.save().await?;
            match (enabled, channel) {
                (true, Some(channel)) => format!("Chests will appear in <#{}>.", channel),
                _ => "Chests will no longer appear.".to_owned(),
            }
        }
        "channel" => match args.first().and_then(|arg| parse_channel_mention(arg)) {
            Some(channel) => {
                let mut pstate = ctx.pstate.write().await;
                pstate.chest.guilds.entry(guild_id).or_default().channel = Some(channel);
                pstate.save().await?;
                format!("Chests will appear in <#{}>.", channel)
            }
            None => "Mention a channel, e.g. `#general`.".to_owned(),
        },
        "interval" => {
            let bounds = match args {
                [min, max, ..] => min.parse::<u64>().ok().zip(max.parse::<u64>().ok()),
                _ => None,
            };
            match bounds {
                Some((min, max)) if 1 <= min && min <= max && max <= MAX_INTERVAL_MINUTES => {
                    let mut pstate = ctx.pstate.write().await;
                    let guild = pstate.chest.guilds.entry(guild_id).or_default();
                    guild.min_minutes = Some(min);
                    guild.max_minutes = Some(max);
                    guild.next_spawn_at = None;
                    pstate.save().await?;
                    format!("Chests will appear every {} to {} minutes.", min, max)
                }
                _ => format!(
                    "Give two whole numbers of minutes up to {}, smallest first, e.g. `30 120`.",
                    MAX_INTERVAL_MINUTES
                ),
            }
        }
        "spawn" => {
            let window = ctx.cfg.read().await.chest.claim_window_seconds;
            let channel = ctx
                .pstate
                .read()
                .await
                .chest
                .guilds
                .get(&guild_id)
                .and_then(|guild| guild.channel)
                .unwrap_or(msg.channel_id);

            let spawned = {
                let mut vstate = ctx.vstate.write().await;
                if vstate.chests.contains_key(&guild_id) {
                    false
                } else {
                    vstate.chests.insert(
                        guild_id,
                        ActiveChest {
                            channel,
                            expires_at: cooldown::now() + window,
                        },
                    );
                    true
                }
            };
            if !spawned {
                msg.reply(ctx.cache_http, "A chest is already waiting to be claimed.")
                    .await?;
                return Ok(());
            }
            let prefix = ctx.cfg.read().await.general.command_prefix.clone();
            channel.say(ctx.http, spawn_text(&prefix, window)).await?;
            return Ok(());
        }
        _ => return Ok(()),
    };

    msg.reply(ctx.cache_http, reply).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn loot_stays_in_its_ranges() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen_gem = false;
        for _ in 0..2000 {
            match roll_loot(&mut rng) {
                Loot::Coins(n) => assert!((10..=50).contains(&n) || (100..=250).contains(&n)),
                Loot::Gem => seen_gem = true,
                Loot::Relic => {}
                Loot::Mimic(bite) => assert_eq!(bite, MIMIC_BITE),
            }
        }
        assert!(seen_gem);
    }

    #[test]
    fn mimic_never_takes_coins_you_do_not_have() {
        let mut hoard = Hoard {
            coins: 10,
            ..Default::default()
        };
        hoard.apply(&Loot::Mimic(25));
        assert_eq!(hoard.coins, 0);
        assert_eq!(hoard.claims, 1);

        hoard.apply(&Loot::Coins(40));
        hoard.apply(&Loot::Mimic(25));
        assert_eq!(hoard.coins, 15);
    }

    #[test]
    fn spawns_are_scheduled_within_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let at = next_spawn(&mut rng, 1000, 5, 10);
            assert!((1000 + 300..=1000 + 600).contains(&at));
        }
        assert_eq!(next_spawn(&mut rng, 0, 0, 0), 60);
    }

    #[test]
    fn huge_intervals_saturate_instead_of_overflowing() {
        let mut rng = StdRng::seed_from_u64(1);
        let at = next_spawn(&mut rng, 1_000, 1, u64::MAX);
        assert!(at >= 1_000 + 60);
        assert_eq!(next_spawn(&mut rng, 1_000, u64::MAX, u64::MAX), i64::MAX);
    }
}
