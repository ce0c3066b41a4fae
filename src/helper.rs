//! Miscellaneous convenience methods

use crate::context::Context;
use anyhow::Result;
use serenity::all::{
    Cache, ChannelId, CreateAllowedMentions, CreateMessage, GuildId, Message, RoleId, UserId,
};
use std::collections::HashMap;

/// Discord rejects messages longer than this
pub const MESSAGE_LIMIT: usize = 2000;

#[serenity::async_trait]
pub trait UserIdHelper {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String;
}

#[serenity::async_trait]
impl UserIdHelper for UserId {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String {
        let user = match self.to_user(ctx.cache_http).await {
            Ok(user) => user,
            Err(_) => return format!("<unknown-user-{}>", *self),
        };

        user.nick_in_guild(ctx, guild_id).await
    }
}

#[serenity::async_trait]
pub trait UserHelper {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String;
}

#[serenity::async_trait]
impl UserHelper for serenity::all::User {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String {
        let nick_in_guild = match guild_id {
            Some(guild_id) => self.nick_in(ctx.cache_http, guild_id).await,
            None => None,
        };

        // May not be in a guild, e.g. DM.  Fall back to global name.
        match nick_in_guild {
            Some(nick_in_guild) => nick_in_guild,
            None => self.global_name.clone().unwrap_or_else(|| self.name.clone()),
        }
    }
}

#[serenity::async_trait]
pub trait MessageHelper {
    async fn human_format_content(&self, ctx: &Context) -> Result<String>;
    async fn is_from_owner(&self, ctx: &Context) -> bool;
    async fn is_from_admin(&self, ctx: &Context) -> bool;
    /// Reply with a refusal unless the author may change guild settings.
    async fn require_admin(&self, ctx: &Context) -> Result<bool>;
    /// Reply with a refusal when sent outside a guild.
    async fn require_guild(&self, ctx: &Context) -> Result<Option<GuildId>>;
    /// Reply without pinging anyone named in `content`, split to fit the message limit.
    async fn reply_quiet(&self, ctx: &Context, content: &str) -> Result<()>;
}

#[serenity::async_trait]
impl MessageHelper for Message {
    /// Convert discord-formatted message content, which may contain non-user-friendly markup, to a
    /// human-friendly format.
    ///
    /// Serenity provides a message.content_safe() method which uses global discord names rather
    /// than our preferred per-server names.  Thus, we're reimplementing the logic here with the
    /// preferred name.
    async fn human_format_content(&self, ctx: &Context) -> Result<String> {
        let mut content = self.content.clone();

        // Create a mapping from mention strings to their names
        let mut mention_map: HashMap<String, String> = HashMap::new();

        for user in &self.mentions {
            let name = user.nick_in_guild(ctx, self.guild_id).await;
            mention_map.insert(format!("<@!{}>", user.id), format!("@{}", name));
            mention_map.insert(format!("<@{}>", user.id), format!("@{}", name));
        }

        if let Some(guild) = self.guild(ctx.cache) {
            for role_id in &self.mention_roles {
                let name = guild
                    .roles
                    .get(role_id)
                    .map(|role| format!("@{}", role.name))
                    .unwrap_or_else(|| "@UnknownRole".to_owned());
                mention_map.insert(format!("<@&{}>", role_id), name);
            }

            // Channel mentions are only listed by Discord for cross-guild channels, so scan the
            // content instead.
            for token in self.content.split_whitespace() {
                if let Some(channel_id) = parse_channel_mention(token) {
                    let name = guild
                        .channels
                        .get(&channel_id)
                        .map(|channel| format!("#{}", channel.name))
                        .unwrap_or_else(|| "#UnknownChannel".to_owned());
                    mention_map.insert(format!("<#{}>", channel_id), name);
                }
            }
        }

        // Replace all mentions with their human-facing names
        for (mention, name) in mention_map {
            content = content.replace(&mention, &name);
        }

        Ok(content)
    }

    async fn is_from_owner(&self, ctx: &Context) -> bool {
        let owners = &ctx.cfg.read().await.general.bot_owners;
        let author_global_name = &self.author.name;

        owners.contains(author_global_name)
    }

    async fn is_from_admin(&self, ctx: &Context) -> bool {
        if self.is_from_owner(ctx).await {
            return true;
        }
        let Some(guild_id) = self.guild_id else {
            return false;
        };
        let Ok(member) = guild_id.member(ctx.cache_http, self.author.id).await else {
            return false;
        };
        ctx.cache
            .guild(guild_id)
            .map(|guild| guild.member_permissions(&member).manage_guild())
            .unwrap_or(false)
    }

    async fn require_admin(&self, ctx: &Context) -> Result<bool> {
        if self.is_from_admin(ctx).await {
            return Ok(true);
        }
        self.reply(
            ctx.cache_http,
            "Only server managers can change that setting.",
        )
        .await?;
        Ok(false)
    }

    async fn require_guild(&self, ctx: &Context) -> Result<Option<GuildId>> {
        if self.guild_id.is_none() {
            self.reply(ctx.cache_http, "That command only works in a server.")
                .await?;
        }
        Ok(self.guild_id)
    }

    async fn reply_quiet(&self, ctx: &Context, content: &str) -> Result<()> {
        for chunk in chunk_message(content, MESSAGE_LIMIT) {
            let builder = CreateMessage::new()
                .content(chunk)
                .allowed_mentions(CreateAllowedMentions::new())
                .reference_message(self);
            self.channel_id.send_message(ctx.cache_http, builder).await?;
        }
        Ok(())
    }
}

/// Whether the bot itself holds `MANAGE_MESSAGES` in a guild channel.  `None` when the cache
/// can't tell, e.g. for threads or an uncached member list.
pub fn bot_can_manage_messages(
    cache: &Cache,
    guild_id: GuildId,
    channel_id: ChannelId,
) -> Option<bool> {
    let my_id = cache.current_user().id;
    let guild = cache.guild(guild_id)?;
    let channel = guild.channels.get(&channel_id)?;
    let me = guild.members.get(&my_id)?;
    Some(guild.user_permissions_in(channel, me).manage_messages())
}

fn parse_mention(token: &str, sigils: &[&str]) -> Option<u64> {
    let raw = match token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        Some(inner) => sigils.iter().find_map(|sigil| inner.strip_prefix(sigil))?,
        None => token,
    };
    raw.parse::<u64>().ok().filter(|id| *id != 0)
}

/// `<@123>`, `<@!123>` or a bare id
pub fn parse_user_mention(token: &str) -> Option<UserId> {
    // `!` first so `<@!123>` isn't read as the `@` sigil followed by `!123`
    parse_mention(token, &["@!", "@"]).map(UserId::new)
}

/// `<#123>` or a bare id
pub fn parse_channel_mention(token: &str) -> Option<ChannelId> {
    parse_mention(token, &["#"]).map(ChannelId::new)
}

/// `<@&123>` or a bare id
pub fn parse_role_mention(token: &str) -> Option<RoleId> {
    parse_mention(token, &["@&"]).map(RoleId::new)
}

/// The user a command is aimed at: the first mention, then the first argument, then the author.
pub fn target_user(msg: &Message, args: &[&str]) -> UserId {
    msg.mentions
        .first()
        .map(|user| user.id)
        .or_else(|| args.iter().find_map(|arg| parse_user_mention(arg)))
        .unwrap_or(msg.author.id)
}

/// Shorten to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Split a long reply on line boundaries into pieces Discord will accept.
pub fn chunk_message(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        let line = truncate(line, max);
        if !current.is_empty() && current.chars().count() + line.chars().count() + 1 > max {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// `1st`, `2nd`, `3rd`, `4th`… for leaderboards
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mentions_and_bare_ids() {
        assert_eq!(parse_user_mention("<@42>"), Some(UserId::new(42)));
        assert_eq!(parse_user_mention("<@!42>"), Some(UserId::new(42)));
        assert_eq!(parse_user_mention("42"), Some(UserId::new(42)));
        assert_eq!(parse_channel_mention("<#7>"), Some(ChannelId::new(7)));
        assert_eq!(parse_role_mention("<@&9>"), Some(RoleId::new(9)));
    }

    #[test]
    fn rejects_wrong_sigils_and_garbage() {
        assert_eq!(parse_user_mention("<#42>"), None);
        assert_eq!(parse_channel_mention("<@42>"), None);
        assert_eq!(parse_role_mention("<@42>"), None);
        assert_eq!(parse_user_mention("bob"), None);
        assert_eq!(parse_user_mention("0"), None);
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 3), "éé…");
    }

    #[test]
    fn chunks_stay_under_limit() {
        let text = (0..100)
            .map(|i| format!("line number {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = chunk_message(&text, 120);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 120));
        assert_eq!(chunks.join("\n"), text);
    }

    #[test]
    fn ordinals() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(22), "22nd");
    }
}
