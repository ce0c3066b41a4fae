use crate::{
    api::usgs::{self, Feature, FeatureCollection},
    event::*,
    helper::*,
    log_error, log_internal,
    plugin::*,
};
use anyhow::Result;
use serenity::all::{ChannelId, CreateEmbed, CreateEmbedFooter, CreateMessage, GuildId, Message};
use std::{collections::HashMap, time::Duration};
use tokio::time::Instant;

/// Ledger key for the USGS feed
const FEED_KEY: &str = "usgs";
const DEFAULT_MIN_MAGNITUDE: f64 = 4.5;
const RECENT_COUNT: usize = 5;

/// Earthquake alerts from the USGS real-time feed
pub struct Earthquake;

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EarthquakeState {
    pub guilds: HashMap<GuildId, QuakeSubscription>,
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct QuakeSubscription {
    pub channel: ChannelId,
    #[serde(default = "default_min_magnitude")]
    pub min_magnitude: f64,
}

fn default_min_magnitude() -> f64 {
    DEFAULT_MIN_MAGNITUDE
}

/// What to post where after a poll, plus where the cursor should end up.
///
/// With no cursor yet, nothing is announced and the cursor jumps to the newest event, so the
/// first poll after setup never floods channels with the feed's backlog.
pub fn plan_announcements<'f>(
    feed: &'f FeatureCollection,
    cursor: Option<i64>,
    subscriptions: &[QuakeSubscription],
) -> (Vec<(ChannelId, &'f Feature)>, Option<i64>) {
    let Some(cursor) = cursor else {
        return (Vec::new(), feed.newest_time());
    };

    let newer = feed.newer_than(cursor);
    let mut posts = Vec::new();
    for feature in &newer {
        for sub in subscriptions {
            if feature.magnitude() >= sub.min_magnitude {
                posts.push((sub.channel, *feature));
            }
        }
    }
    let advanced = newer.last().map(|f| f.properties.time);
    (posts, advanced)
}

fn magnitude_color(magnitude: f64) -> u32 {
    match magnitude {
        m if m >= 7.0 => 0x992D22,
        m if m >= 6.0 => 0xE74C3C,
        m if m >= 5.0 => 0xE67E22,
        _ => 0xF1C40F,
    }
}

fn quake_embed(feature: &Feature) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(format!("M{:.1} - {}", feature.magnitude(), feature.place()))
        .url(&feature.properties.url)
        .color(magnitude_color(feature.magnitude()));
    if let Some(at) = feature.occurred_at() {
        let unix = at.timestamp();
        embed = embed.field("Time", format!("<t:{}:F> (<t:{}:R>)", unix, unix), false);
    }
    if feature.properties.tsunami != 0 {
        embed = embed.field("⚠️ Tsunami", "A tsunami warning may be in effect.", false);
    }
    embed.footer(CreateEmbedFooter::new("USGS"))
}

#[serenity::async_trait]
impl Plugin for Earthquake {
    fn name(&self) -> &'static str {
        "quake"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_lines(
                ctx,
                &[
                    "quake status - where alerts go and the magnitude threshold",
                    "quake recent [min magnitude] - the latest earthquakes",
                    "quake channel <#channel> - post alerts there (managers)",
                    "quake minmag <0-10> - only alert at or above this magnitude (managers)",
                    "quake off - stop alerts (managers)",
                ],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        if let Event::Tick = event {
            poll(ctx).await?;
            return Ok(EventHandled::No);
        }

        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };
        command(ctx, msg, &args).await?;
        Ok(EventHandled::Yes)
    }
}

async fn poll(ctx: &Context<'_>) -> Result<()> {
    let (feed_url, poll_seconds, max_retries) = {
        let cfg = ctx.cfg.read().await;
        (
            cfg.earthquake.feed_url.clone(),
            cfg.earthquake.poll_seconds,
            cfg.earthquake.max_retries,
        )
    };
    {
        let mut vstate = ctx.vstate.write().await;
        let due = vstate
            .quake_polled_at
            .map_or(true, |at| at.elapsed() >= Duration::from_secs(poll_seconds));
        if !due {
            return Ok(());
        }
        vstate.quake_polled_at = Some(Instant::now());
    }

    let feed = usgs::fetch(ctx.web, &feed_url, max_retries).await?;
    let subscriptions: Vec<QuakeSubscription> = ctx
        .pstate
        .read()
        .await
        .earthquake
        .guilds
        .values()
        .cloned()
        .collect();

    let cursor = ctx.vstate.read().await.quake_ledger.cursor(FEED_KEY)?;
    let (posts, advanced) = plan_announcements(&feed, cursor, &subscriptions);

    for (channel, feature) in posts {
        log_internal!("Announcing earthquake {} in {}", feature.id, channel);
        if let Err(e) = channel
            .send_message(ctx.http, CreateMessage::new().embed(quake_embed(feature)))
            .await
        {
            log_error!("Could not announce earthquake in {}: {}", channel, e);
        }
    }

    if let Some(advanced) = advanced {
        ctx.vstate
            .read()
            .await
            .quake_ledger
            .advance(FEED_KEY, advanced)?;
    }
    Ok(())
}

async fn command(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<()> {
    let sub = args.first().map(|s| s.to_lowercase()).unwrap_or_default();

    if sub == "recent" {
        let min_magnitude = args.get(1).and_then(|a| a.parse::<f64>().ok()).unwrap_or(0.0);
        return recent(ctx, msg, min_magnitude).await;
    }

    let Some(guild_id) = msg.require_guild(ctx).await? else {
        return Ok(());
    };
    if matches!(sub.as_str(), "channel" | "minmag" | "off") && !msg.require_admin(ctx).await? {
        return Ok(());
    }

    let reply = match sub.as_str() {
        "channel" => match args.get(1).and_then(|arg| parse_channel_mention(arg)) {
            Some(channel) => {
                let mut pstate = ctx.pstate.write().await;
                pstate
                    .earthquake
                    .guilds
                    .entry(guild_id)
                    .and_modify(|existing| existing.channel = channel)
                    .or_insert(QuakeSubscription {
                        channel,
                        min_magnitude: DEFAULT_MIN_MAGNITUDE,
                    });
                pstate.save().await?;
                format!("Earthquake alerts will be posted in <#{}>.", channel)
            }
            None => "Mention a channel, e.g. `#alerts`.".to_owned(),
        },
        "minmag" => match args.get(1).and_then(|a| a.parse::<f64>().ok()) {
            Some(min) if (0.0..=10.0).contains(&min) => {
                let mut pstate = ctx.pstate.write().await;
                match pstate.earthquake.guilds.get_mut(&guild_id) {
                    Some(sub) => {
                        sub.min_magnitude = min;
                        pstate.save().await?;
                        format!(
                            "Only earthquakes of magnitude {:.1} or more will be posted.",
                            min
                        )
                    }
                    None => "Set an alert channel first with `quake channel`.".to_owned(),
                }
            }
            _ => "Give a magnitude between 0 and 10.".to_owned(),
        },
        "off" => {
            let mut pstate = ctx.pstate.write().await;
            pstate.earthquake.guilds.remove(&guild_id);
            pstate.save().await?;
            "Earthquake alerts are off.".to_owned()
        }
        "status" | "" => match ctx.pstate.read().await.earthquake.guilds.get(&guild_id) {
            Some(sub) => format!(
                "Alerts for magnitude {:.1} and up go to <#{}>.",
                sub.min_magnitude, sub.channel
            ),
            None => "Earthquake alerts are off.".to_owned(),
        },
        _ => Earthquake.usage(ctx).await.unwrap_or_default(),
    };

    msg.reply(ctx.cache_http, reply).await?;
    Ok(())
}

async fn recent(ctx: &Context<'_>, msg: &Message, min_magnitude: f64) -> Result<()> {
    let (feed_url, max_retries) = {
        let cfg = ctx.cfg.read().await;
        (cfg.earthquake.feed_url.clone(), cfg.earthquake.max_retries)
    };

    let feed = match usgs::fetch(ctx.web, &feed_url, max_retries).await {
        Ok(feed) => feed,
        Err(e) => {
            msg.reply(ctx.cache_http, format!("Couldn't reach USGS: {}.", e))
                .await?;
            return Ok(());
        }
    };

    let recent = feed.recent(min_magnitude, RECENT_COUNT);
    if recent.is_empty() {
        msg.reply(ctx.cache_http, "No recent earthquakes match.")
            .await?;
        return Ok(());
    }

    let mut text = String::new();
    for feature in recent {
        let when = feature
            .occurred_at()
            .map(|at| format!("<t:{}:R>", at.timestamp()))
            .unwrap_or_default();
        text.push_str(&format!(
            "**M{:.1}** [{}]({}) {}\n",
            feature.magnitude(),
            feature.place(),
            feature.properties.url,
            when
        ));
    }
    let embed = CreateEmbed::new()
        .title("Recent earthquakes")
        .description(text)
        .color(magnitude_color(0.0));
    msg.channel_id
        .send_message(ctx.cache_http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::usgs::tests::sample, feed_ledger::FeedLedger};

    fn sub(channel: u64, min_magnitude: f64) -> QuakeSubscription {
        QuakeSubscription {
            channel: ChannelId::new(channel),
            min_magnitude,
        }
    }

    #[test]
    fn first_poll_only_sets_the_cursor() {
        let feed = sample();
        let (posts, cursor) = plan_announcements(&feed, None, &[sub(1, 0.0)]);
        assert!(posts.is_empty());
        assert_eq!(cursor, Some(3000));
    }

    #[test]
    fn announces_newer_events_per_threshold() {
        let feed = sample();
        let subs = [sub(1, 0.0), sub(2, 5.0)];
        let (posts, cursor) = plan_announcements(&feed, Some(1000), &subs);
        let posted: Vec<(u64, &str)> = posts
            .iter()
            .map(|(channel, f)| (channel.get(), f.id.as_str()))
            .collect();
        assert_eq!(posted, [(1, "b"), (2, "b"), (1, "c")]);
        assert_eq!(cursor, Some(3000));
    }

    #[test]
    fn nothing_new_leaves_cursor_alone() {
        let feed = sample();
        let (posts, cursor) = plan_announcements(&feed, Some(3000), &[sub(1, 0.0)]);
        assert!(posts.is_empty());
        assert_eq!(cursor, None);
    }

    #[test]
    fn restart_does_not_reannounce() {
        let feed = sample();
        let ledger = FeedLedger::in_memory().unwrap();
        let (_, cursor) = plan_announcements(&feed, ledger.cursor(FEED_KEY).unwrap(), &[]);
        ledger.advance(FEED_KEY, cursor.unwrap()).unwrap();

        let cursor = ledger.cursor(FEED_KEY).unwrap();
        let (posts, _) = plan_announcements(&feed, cursor, &[sub(1, 0.0)]);
        assert!(posts.is_empty());
    }

    #[test]
    fn stronger_quakes_are_redder() {
        assert_eq!(magnitude_color(4.0), 0xF1C40F);
        assert_eq!(magnitude_color(7.2), 0x992D22);
    }
}
