use crate::{api::nekos, event::*, helper::*, log_error, persistent_state::UserData, plugin::*};
use anyhow::Result;
use serenity::all::{CreateEmbed, CreateEmbedFooter, CreateMessage, GuildId, Message, UserId};
use std::collections::{BTreeMap, HashMap};

const EMBED_PINK: u32 = 0xFF8FAB;

/// Anime-style reaction commands aimed at another member
pub struct Roleplay;

pub struct Action {
    /// Command name
    pub name: &'static str,
    /// Image category on nekos.best
    pub category: &'static str,
    pub verb: &'static str,
    pub plural: &'static str,
}

pub const ACTIONS: &[Action] = &[
    Action { name: "hug", category: "hug", verb: "hugs", plural: "hugs" },
    Action { name: "pat", category: "pat", verb: "pats", plural: "pats" },
    Action { name: "slap", category: "slap", verb: "slaps", plural: "slaps" },
    Action { name: "kiss", category: "kiss", verb: "kisses", plural: "kisses" },
    Action { name: "poke", category: "poke", verb: "pokes", plural: "pokes" },
    Action { name: "cuddle", category: "cuddle", verb: "cuddles", plural: "cuddles" },
    Action { name: "bite", category: "bite", verb: "bites", plural: "bites" },
    Action { name: "highfive", category: "highfive", verb: "high-fives", plural: "high fives" },
    Action { name: "bonk", category: "punch", verb: "bonks", plural: "bonks" },
    Action { name: "tickle", category: "tickle", verb: "tickles", plural: "tickles" },
    Action { name: "wave", category: "wave", verb: "waves at", plural: "waves" },
];

pub fn find_action(name: &str) -> Option<&'static Action> {
    ACTIONS
        .iter()
        .find(|action| action.name.eq_ignore_ascii_case(name))
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RoleplayState {
    pub guilds: HashMap<GuildId, HashMap<UserId, RoleplayStats>>,
}

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RoleplayStats {
    pub given: BTreeMap<String, u64>,
    pub received: BTreeMap<String, u64>,
    /// Per target, how often each action was given to them
    pub pairs: HashMap<UserId, BTreeMap<String, u64>>,
}

fn bump(counts: &mut BTreeMap<String, u64>, action: &str) -> u64 {
    let count = counts.entry(action.to_owned()).or_default();
    *count = count.saturating_add(1);
    *count
}

impl RoleplayState {
    /// Count one action from `giver` to `target`.  Returns how often this pair has done it.
    pub fn record(
        &mut self,
        guild_id: GuildId,
        giver: UserId,
        target: UserId,
        action: &str,
    ) -> u64 {
        let members = self.guilds.entry(guild_id).or_default();
        bump(&mut members.entry(target).or_default().received, action);
        let giver = members.entry(giver).or_default();
        bump(&mut giver.given, action);
        bump(giver.pairs.entry(target).or_default(), action)
    }
}

impl UserData for RoleplayState {
    fn forget_user(&mut self, user_id: UserId) -> bool {
        let mut forgot = false;
        for members in self.guilds.values_mut() {
            forgot |= members.remove(&user_id).is_some();
            for stats in members.values_mut() {
                forgot |= stats.pairs.remove(&user_id).is_some();
            }
        }
        forgot
    }
}

fn summarize(counts: &BTreeMap<String, u64>) -> String {
    if counts.is_empty() {
        return "nothing yet".to_owned();
    }
    counts
        .iter()
        .map(|(action, n)| {
            let label = find_action(action).map_or(action.as_str(), |a| a.plural);
            format!("{} {}", n, label)
        })
        .collect::<Vec<String>>()
        .join(", ")
}

/// Pair counter, plus the anime the image came from when known
fn footer_text(
    action: &Action,
    giver: &str,
    receiver: &str,
    count: u64,
    anime: Option<&str>,
) -> String {
    let mut footer = format!("{} from {} to {}: {}", action.plural, giver, receiver, count);
    if let Some(anime) = anime {
        footer.push_str(&format!(" | {}", anime));
    }
    footer
}

#[serenity::async_trait]
impl Plugin for Roleplay {
    fn name(&self) -> &'static str {
        "roleplay"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let actions = ACTIONS
            .iter()
            .map(|action| action.name)
            .collect::<Vec<&str>>()
            .join("|");
        let action_line = format!("{} <@user> - send some affection (or not)", actions);
        Some(
            usage_lines(
                ctx,
                &[action_line.as_str(), "rpstats [@user] - given and received actions"],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, name, args)) = event.bot_cmd(ctx).await else {
            return Ok(EventHandled::No);
        };
        if name.eq_ignore_ascii_case("rpstats") {
            stats(ctx, msg, &args).await?;
            return Ok(EventHandled::Yes);
        }
        let Some(action) = find_action(name) else {
            return Ok(EventHandled::No);
        };
        act(ctx, msg, &args, action).await?;
        Ok(EventHandled::Yes)
    }
}

async fn act(ctx: &Context<'_>, msg: &Message, args: &[&str], action: &Action) -> Result<()> {
    let Some(guild_id) = msg.require_guild(ctx).await? else {
        return Ok(());
    };
    let target = target_user(msg, args);
    if target == msg.author.id {
        msg.reply(
            ctx.cache_http,
            format!("You can't {} yourself. Mention someone!", action.name),
        )
        .await?;
        return Ok(());
    }

    let api_url = ctx.cfg.read().await.roleplay.api_url.clone();
    let image = nekos::fetch(ctx.web, &api_url, action.category).await;

    let count = {
        let mut pstate = ctx.pstate.write().await;
        let count = pstate
            .roleplay
            .record(guild_id, msg.author.id, target, action.name);
        pstate.save().await?;
        count
    };

    let giver = msg.author.nick_in_guild(ctx, Some(guild_id)).await;
    let receiver = target.nick_in_guild(ctx, Some(guild_id)).await;
    let mut embed = CreateEmbed::new()
        .description(format!("**{}** {} **{}**", giver, action.verb, receiver))
        .color(EMBED_PINK);
    let anime = match image {
        Ok(image) => {
            embed = embed.image(image.url);
            image.anime_name
        }
        Err(e) => {
            log_error!("nekos.best lookup for {} failed: {}", action.category, e);
            None
        }
    };
    let footer = footer_text(action, &giver, &receiver, count, anime.as_deref());
    let embed = embed.footer(CreateEmbedFooter::new(footer));

    msg.channel_id
        .send_message(ctx.cache_http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

async fn stats(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<()> {
    let Some(guild_id) = msg.require_guild(ctx).await? else {
        return Ok(());
    };
    let user_id = target_user(msg, args);
    let stats = ctx
        .pstate
        .read()
        .await
        .roleplay
        .guilds
        .get(&guild_id)
        .and_then(|members| members.get(&user_id))
        .cloned()
        .unwrap_or_default();
    let name = user_id.nick_in_guild(ctx, Some(guild_id)).await;

    let embed = CreateEmbed::new()
        .title(format!("{}'s roleplay stats", name))
        .color(EMBED_PINK)
        .field("Given", summarize(&stats.given), false)
        .field("Received", summarize(&stats.received), false);
    msg.channel_id
        .send_message(ctx.cache_http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: GuildId = GuildId::new(1);
    const A: UserId = UserId::new(2);
    const B: UserId = UserId::new(3);

    #[test]
    fn actions_are_found_case_insensitively() {
        assert_eq!(find_action("HUG").map(|a| a.verb), Some("hugs"));
        assert!(find_action("punch").is_none());
        assert_eq!(ACTIONS.len(), 11);
    }

    #[test]
    fn records_both_sides_and_the_pair() {
        let mut state = RoleplayState::default();
        assert_eq!(state.record(GUILD, A, B, "hug"), 1);
        assert_eq!(state.record(GUILD, A, B, "hug"), 2);
        assert_eq!(state.record(GUILD, B, A, "hug"), 1);

        let members = &state.guilds[&GUILD];
        assert_eq!(members[&A].given["hug"], 2);
        assert_eq!(members[&A].received["hug"], 1);
        assert_eq!(members[&B].received["hug"], 2);
        assert_eq!(summarize(&members[&A].given), "2 hugs");
    }

    #[test]
    fn footer_credits_the_anime_when_known() {
        let hug = find_action("hug").unwrap();
        assert_eq!(footer_text(hug, "A", "B", 3, None), "hugs from A to B: 3");
        assert_eq!(
            footer_text(hug, "A", "B", 1, Some("K-On!")),
            "hugs from A to B: 1 | K-On!"
        );
    }

    #[test]
    fn forgetting_removes_pairs_aimed_at_the_user() {
        let mut state = RoleplayState::default();
        state.record(GUILD, A, B, "pat");
        assert!(state.forget_user(B));
        assert!(state.guilds[&GUILD][&A].pairs.is_empty());
        assert!(!state.guilds[&GUILD].contains_key(&B));
    }
}
