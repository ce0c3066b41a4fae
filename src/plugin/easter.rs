use crate::{
    cooldown, event::*, helper::*, log_error,
    loot::{advance_pity, boosted, WeightedTable},
    persistent_state::UserData,
    plugin::*,
};
use anyhow::Result;
use rand::Rng;
use serenity::all::{ChannelId, GuildId, Message, UserId};
use std::{collections::HashMap, time::Duration};

/// Easter egg hunt.  A hunt takes a while; the result arrives on a later tick.
pub struct Easter;

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EasterState {
    pub guilds: HashMap<GuildId, HashMap<UserId, EggBasket>>,
}

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EggBasket {
    pub common: u64,
    pub silver: u64,
    pub golden: u64,
    pub rotten: u64,
    pub hunts: u64,
    /// Hunts since the last golden egg
    pub golden_pity: u32,
    /// Set while a hunt is underway
    pub hunt_ends_at: Option<i64>,
    pub hunt_channel: Option<ChannelId>,
    pub next_hunt_at: Option<i64>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HuntOutcome {
    Nothing,
    Common,
    Silver,
    Rotten,
    Golden,
}

const GOLDEN_BASE_WEIGHT: f64 = 2.0;

pub fn roll_hunt<R: Rng + ?Sized>(rng: &mut R, pity: u32, pity_bonus: f64) -> HuntOutcome {
    let table = WeightedTable::new()
        .with(HuntOutcome::Nothing, 30.0)
        .with(HuntOutcome::Common, 45.0)
        .with(HuntOutcome::Silver, 18.0)
        .with(HuntOutcome::Rotten, 5.0)
        .with(
            HuntOutcome::Golden,
            boosted(GOLDEN_BASE_WEIGHT, pity, pity_bonus),
        );
    table.choose(rng).copied().unwrap_or(HuntOutcome::Nothing)
}

#[derive(PartialEq, Eq, Debug)]
pub enum HuntRefusal {
    /// A hunt is already underway
    Busy(Duration),
    Cooldown(Duration),
}

impl EggBasket {
    /// Start a hunt lasting `hunt_seconds`.  Returns when it ends.
    pub fn start_hunt(
        &mut self,
        now: i64,
        channel: ChannelId,
        hunt_seconds: i64,
    ) -> Result<i64, HuntRefusal> {
        if let Some(left) = self.hunt_ends_at.and_then(|at| cooldown::remaining(at, now)) {
            return Err(HuntRefusal::Busy(left));
        }
        if self.hunt_ends_at.is_some() {
            // Ended but not yet resolved by the scheduler
            return Err(HuntRefusal::Busy(Duration::ZERO));
        }
        if let Some(left) = self.next_hunt_at.and_then(|at| cooldown::remaining(at, now)) {
            return Err(HuntRefusal::Cooldown(left));
        }

        let ends_at = now + hunt_seconds;
        self.hunt_ends_at = Some(ends_at);
        self.hunt_channel = Some(channel);
        Ok(ends_at)
    }

    /// Finish the pending hunt with `outcome` and start the cooldown.  Returns a description.
    pub fn apply(&mut self, outcome: HuntOutcome, now: i64, cooldown_seconds: i64) -> String {
        self.hunt_ends_at = None;
        self.next_hunt_at = Some(now + cooldown_seconds);
        self.hunts = self.hunts.saturating_add(1);
        advance_pity(&mut self.golden_pity, outcome == HuntOutcome::Golden);

        match outcome {
            HuntOutcome::Nothing => "searched everywhere but found nothing.".to_owned(),
            HuntOutcome::Common => {
                self.common = self.common.saturating_add(1);
                "found a painted egg 🥚".to_owned()
            }
            HuntOutcome::Silver => {
                self.silver = self.silver.saturating_add(1);
                "found a **silver egg** 🥈".to_owned()
            }
            HuntOutcome::Golden => {
                self.golden = self.golden.saturating_add(1);
                "found a **GOLDEN EGG** 🌟".to_owned()
            }
            HuntOutcome::Rotten => {
                self.rotten = self.rotten.saturating_add(1);
                if self.common > 0 {
                    self.common -= 1;
                    "found a rotten egg 🤢 and it spoiled one of their painted eggs.".to_owned()
                } else {
                    "found a rotten egg 🤢".to_owned()
                }
            }
        }
    }

    pub fn score(&self) -> u64 {
        self.common
            .saturating_add(self.silver.saturating_mul(5))
            .saturating_add(self.golden.saturating_mul(25))
    }
}

impl UserData for EasterState {
    fn forget_user(&mut self, user_id: UserId) -> bool {
        let mut forgot = false;
        for members in self.guilds.values_mut() {
            forgot |= members.remove(&user_id).is_some();
        }
        forgot
    }
}

#[serenity::async_trait]
impl Plugin for Easter {
    fn name(&self) -> &'static str {
        "easter"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_lines(
                ctx,
                &[
                    "hunt - go looking for eggs",
                    "eggs [@user] - show an egg basket",
                    "eggs top - best egg hunters",
                    "eggs reset @user - empty a basket (managers)",
                ],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        if let Event::Tick = event {
            resolve_hunts(ctx).await?;
            return Ok(EventHandled::No);
        }

        let Some((msg, name, args)) = event.bot_cmd(ctx).await else {
            return Ok(EventHandled::No);
        };
        match name.to_lowercase().as_str() {
            "hunt" => hunt(ctx, msg).await?,
            "eggs" => eggs(ctx, msg, &args).await?,
            _ => return Ok(EventHandled::No),
        }
        Ok(EventHandled::Yes)
    }
}

async fn hunt(ctx: &Context<'_>, msg: &Message) -> Result<()> {
    let Some(guild_id) = msg.require_guild(ctx).await? else {
        return Ok(());
    };
    let hunt_seconds = ctx.cfg.read().await.easter.hunt_seconds;

    let started = {
        let mut pstate = ctx.pstate.write().await;
        let started = pstate
            .easter
            .guilds
            .entry(guild_id)
            .or_default()
            .entry(msg.author.id)
            .or_default()
            .start_hunt(cooldown::now(), msg.channel_id, hunt_seconds);
        if started.is_ok() {
            pstate.save().await?;
        }
        started
    };

    let reply = match started {
        Ok(ends_at) => format!(
            "🐰 You set off into the meadow. Results <t:{}:R>.",
            ends_at
        ),
        Err(HuntRefusal::Busy(_)) => "You're already out hunting. Be patient!".to_owned(),
        Err(HuntRefusal::Cooldown(left)) => format!(
            "You're tired from the last hunt. Try again in {}.",
            cooldown::human_duration(left)
        ),
    };
    msg.reply(ctx.cache_http, reply).await?;
    Ok(())
}

async fn resolve_hunts(ctx: &Context<'_>) -> Result<()> {
    let now = cooldown::now();
    let (cooldown_seconds, pity_bonus) = {
        let cfg = ctx.cfg.read().await;
        (cfg.easter.cooldown_seconds, cfg.easter.golden_pity_bonus)
    };

    let mut results: Vec<(Option<ChannelId>, UserId, String)> = Vec::new();
    {
        let mut pstate = ctx.pstate.write().await;
        for members in pstate.easter.guilds.values_mut() {
            for (user_id, basket) in members.iter_mut() {
                if !basket
                    .hunt_ends_at
                    .is_some_and(|at| cooldown::is_ready(at, now))
                {
                    continue;
                }
                let outcome = roll_hunt(&mut rand::thread_rng(), basket.golden_pity, pity_bonus);
                let line = basket.apply(outcome, now, cooldown_seconds);
                results.push((basket.hunt_channel.take(), *user_id, line));
            }
        }
        if results.is_empty() {
            return Ok(());
        }
        pstate.save().await?;
    }

    for (channel, user_id, line) in results {
        let Some(channel) = channel else {
            continue;
        };
        if let Err(e) = channel
            .say(ctx.http, format!("🧺 <@{}> {}", user_id, line))
            .await
        {
            log_error!("Could not announce hunt result in {}: {}", channel, e);
        }
    }
    Ok(())
}

async fn eggs(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<()> {
    let Some(guild_id) = msg.require_guild(ctx).await? else {
        return Ok(());
    };

    match args.first().copied() {
        Some("top") => {
            let mut ranking: Vec<(UserId, u64)> = ctx
                .pstate
                .read()
                .await
                .easter
                .guilds
                .get(&guild_id)
                .map(|members| members.iter().map(|(id, b)| (*id, b.score())).collect())
                .unwrap_or_default();
            ranking.retain(|(_, score)| *score > 0);
            ranking.sort_by(|a, b| b.1.cmp(&a.1));
            ranking.truncate(10);

            if ranking.is_empty() {
                msg.reply(ctx.cache_http, "No eggs have been found yet.")
                    .await?;
                return Ok(());
            }
            let mut reply = String::from("**Best egg hunters**\n");
            for (rank, (user_id, score)) in ranking.iter().enumerate() {
                reply.push_str(&format!(
                    "{} <@{}> - {} points\n",
                    ordinal(rank + 1),
                    user_id,
                    score
                ));
            }
            msg.reply_quiet(ctx, &reply).await?;
        }
        Some("reset") => {
            if !msg.require_admin(ctx).await? {
                return Ok(());
            }
            let Some(user_id) = msg
                .mentions
                .first()
                .map(|u| u.id)
                .or_else(|| args.get(1).and_then(|arg| parse_user_mention(arg)))
            else {
                msg.reply(ctx.cache_http, "Whose basket should I empty?")
                    .await?;
                return Ok(());
            };
            {
                let mut pstate = ctx.pstate.write().await;
                if let Some(members) = pstate.easter.guilds.get_mut(&guild_id) {
                    members.remove(&user_id);
                }
                pstate.save().await?;
            }
            msg.reply_quiet(ctx, &format!("Emptied the basket of <@{}>.", user_id))
                .await?;
        }
        _ => {
            let user_id = target_user(msg, args);
            let basket = ctx
                .pstate
                .read()
                .await
                .easter
                .guilds
                .get(&guild_id)
                .and_then(|members| members.get(&user_id))
                .cloned()
                .unwrap_or_default();
            let name = user_id.nick_in_guild(ctx, Some(guild_id)).await;
            msg.reply(
                ctx.cache_http,
                format!(
                    "**{}**'s basket: 🥚 {} · 🥈 {} · 🌟 {} · 🤢 {} ({} hunts, {} points)",
                    name,
                    basket.common,
                    basket.silver,
                    basket.golden,
                    basket.rotten,
                    basket.hunts,
                    basket.score()
                ),
            )
            .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    const CHANNEL: ChannelId = ChannelId::new(9);

    #[test]
    fn busy_until_resolved_then_cooldown() {
        let mut basket = EggBasket::default();
        assert_eq!(basket.start_hunt(100, CHANNEL, 60), Ok(160));
        assert_eq!(
            basket.start_hunt(110, CHANNEL, 60),
            Err(HuntRefusal::Busy(Duration::from_secs(50)))
        );
        // Past the deadline but the tick hasn't resolved it yet
        assert_eq!(
            basket.start_hunt(170, CHANNEL, 60),
            Err(HuntRefusal::Busy(Duration::ZERO))
        );

        basket.apply(HuntOutcome::Common, 170, 300);
        assert_eq!(basket.hunt_ends_at, None);
        assert_eq!(
            basket.start_hunt(200, CHANNEL, 60),
            Err(HuntRefusal::Cooldown(Duration::from_secs(270)))
        );
        assert_eq!(basket.start_hunt(470, CHANNEL, 60), Ok(530));
    }

    #[test]
    fn rotten_eggs_spoil_without_underflow() {
        let mut basket = EggBasket::default();
        basket.apply(HuntOutcome::Rotten, 0, 0);
        assert_eq!(basket.common, 0);
        assert_eq!(basket.rotten, 1);

        basket.apply(HuntOutcome::Common, 0, 0);
        basket.apply(HuntOutcome::Common, 0, 0);
        basket.apply(HuntOutcome::Rotten, 0, 0);
        assert_eq!(basket.common, 1);
        assert_eq!(basket.hunts, 4);
    }

    #[test]
    fn golden_eggs_reset_pity() {
        let mut basket = EggBasket::default();
        basket.apply(HuntOutcome::Nothing, 0, 0);
        basket.apply(HuntOutcome::Silver, 0, 0);
        assert_eq!(basket.golden_pity, 2);
        basket.apply(HuntOutcome::Golden, 0, 0);
        assert_eq!(basket.golden_pity, 0);
        assert_eq!(basket.score(), 5 + 25);
    }

    #[test]
    fn pity_makes_golden_eggs_likelier() {
        let golden = |pity| {
            let mut rng = StdRng::seed_from_u64(5);
            (0..5000)
                .filter(|_| roll_hunt(&mut rng, pity, 1.0) == HuntOutcome::Golden)
                .count()
        };
        assert!(golden(200) > golden(0) * 3);
    }
}
