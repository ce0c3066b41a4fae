use crate::{event::*, helper::*, log_error, log_event, plugin::*};
use anyhow::Result;
use serenity::all::{ChannelId, GuildId, Message, MessageReferenceKind, RoleId};
use std::collections::{BTreeSet, HashMap};

const DEFAULT_WARNING: &str = "{user}, forwarded messages aren't allowed here.";

/// Deletes messages forwarded from other channels
pub struct AntiForward;

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AntiForwardState {
    pub guilds: HashMap<GuildId, AntiForwardGuild>,
}

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AntiForwardGuild {
    pub enabled: bool,
    pub exempt_roles: BTreeSet<RoleId>,
    pub log_channel: Option<ChannelId>,
    /// `{user}` is replaced with a mention of the author
    pub warn_message: Option<String>,
}

impl AntiForwardGuild {
    pub fn is_exempt(&self, roles: &[RoleId]) -> bool {
        roles.iter().any(|role| self.exempt_roles.contains(role))
    }

    pub fn warning_template(&self) -> &str {
        self.warn_message.as_deref().unwrap_or(DEFAULT_WARNING)
    }
}

pub fn render_warning(template: &str, user_mention: &str) -> String {
    template.replace("{user}", user_mention)
}

pub fn is_forward(msg: &Message) -> bool {
    msg.message_reference
        .as_ref()
        .is_some_and(|reference| reference.kind == MessageReferenceKind::Forward)
}

#[serenity::async_trait]
impl Plugin for AntiForward {
    fn name(&self) -> &'static str {
        "antiforward"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_lines(
                ctx,
                &[
                    "antiforward status - current settings",
                    "antiforward on|off - delete forwarded messages (managers)",
                    "antiforward exempt|unexempt <@role> - let a role forward (managers)",
                    "antiforward log <#channel|off> - report deletions there (managers)",
                    "antiforward message <text> - warning to post, {user} is the author (managers)",
                ],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        if let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await {
            command(ctx, msg, &args).await?;
            return Ok(EventHandled::Yes);
        }

        let Event::Message(msg) = event else {
            return Ok(EventHandled::No);
        };
        match msg.guild_id {
            Some(guild_id) if is_forward(msg) => enforce(ctx, msg, guild_id).await,
            _ => Ok(EventHandled::No),
        }
    }
}

async fn enforce(ctx: &Context<'_>, msg: &Message, guild_id: GuildId) -> Result<EventHandled> {
    let guild = match ctx.pstate.read().await.antiforward.guilds.get(&guild_id) {
        Some(guild) if guild.enabled => guild.clone(),
        _ => return Ok(EventHandled::No),
    };

    let roles = match &msg.member {
        Some(member) => member.roles.clone(),
        None => guild_id
            .member(ctx.cache_http, msg.author.id)
            .await
            .map(|member| member.roles)
            .unwrap_or_default(),
    };
    if guild.is_exempt(&roles) {
        return Ok(EventHandled::No);
    }

    if bot_can_manage_messages(ctx.cache, guild_id, msg.channel_id) == Some(false) {
        log_error!(
            "Can't delete forwarded message in {}: missing Manage Messages",
            msg.channel_id
        );
        return Ok(EventHandled::No);
    }

    if let Err(e) = msg.delete(ctx.cache_http).await {
        log_error!("Could not delete forwarded message {}: {}", msg.id, e);
        return Ok(EventHandled::No);
    }
    log_event!("Deleted forwarded message from {} in {}", msg.author.id, msg.channel_id);

    let mention = format!("<@{}>", msg.author.id);
    msg.channel_id
        .say(ctx.http, render_warning(guild.warning_template(), &mention))
        .await?;
    if let Some(log_channel) = guild.log_channel {
        log_channel
            .say(
                ctx.http,
                format!(
                    "🗑️ Deleted a forwarded message from {} in <#{}>.",
                    mention, msg.channel_id
                ),
            )
            .await?;
    }
    Ok(EventHandled::Yes)
}

async fn command(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<()> {
    let Some(guild_id) = msg.require_guild(ctx).await? else {
        return Ok(());
    };
    let sub = args.first().map(|s| s.to_lowercase()).unwrap_or_default();
    if sub != "status" && !sub.is_empty() && !msg.require_admin(ctx).await? {
        return Ok(());
    }

    let mut pstate = ctx.pstate.write().await;
    let guild = pstate.antiforward.guilds.entry(guild_id).or_default();
    let reply = match sub.as_str() {
        "on" | "off" => {
            guild.enabled = sub == "on";
            if guild.enabled {
                "Forwarded messages will be deleted.".to_owned()
            } else {
                "Forwarded messages are allowed.".to_owned()
            }
        }
        "exempt" | "unexempt" => {
            match msg
                .mention_roles
                .first()
                .copied()
                .or_else(|| args.get(1).and_then(|arg| parse_role_mention(arg)))
            {
                Some(role) if sub == "exempt" => {
                    guild.exempt_roles.insert(role);
                    format!("<@&{}> may forward messages.", role)
                }
                Some(role) => {
                    guild.exempt_roles.remove(&role);
                    format!("<@&{}> may no longer forward messages.", role)
                }
                None => "Mention a role.".to_owned(),
            }
        }
        "log" => match args.get(1).copied() {
            Some("off") => {
                guild.log_channel = None;
                "Deletions will not be logged.".to_owned()
            }
            Some(arg) => match parse_channel_mention(arg) {
                Some(channel) => {
                    guild.log_channel = Some(channel);
                    format!("Deletions will be logged in <#{}>.", channel)
                }
                None => "Mention a channel, or say `off`.".to_owned(),
            },
            None => "Mention a channel, or say `off`.".to_owned(),
        },
        "message" => {
            let text = args
                .first()
                .and_then(|word| msg.content.split_once(word))
                .map(|(_, rest)| rest.trim())
                .unwrap_or_default();
            if text.is_empty() {
                guild.warn_message = None;
                format!("Warning reset to: {}", DEFAULT_WARNING)
            } else {
                guild.warn_message = Some(truncate(text, 500));
                format!("Warning set to: {}", text)
            }
        }
        _ => {
            let exempt = guild
                .exempt_roles
                .iter()
                .map(|role| format!("<@&{}>", role))
                .collect::<Vec<String>>();
            let reply = format!(
                "Anti-forward is **{}**.\nExempt roles: {}\nLog channel: {}\nWarning: {}",
                if guild.enabled { "on" } else { "off" },
                if exempt.is_empty() {
                    "none".to_owned()
                } else {
                    exempt.join(", ")
                },
                guild
                    .log_channel
                    .map(|c| format!("<#{}>", c))
                    .unwrap_or_else(|| "none".to_owned()),
                guild.warning_template()
            );
            drop(pstate);
            msg.reply_quiet(ctx, &reply).await?;
            return Ok(());
        }
    };
    pstate.save().await?;
    drop(pstate);

    msg.reply_quiet(ctx, &reply).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_substitutes_the_author() {
        assert_eq!(
            render_warning("{user}, no forwards! Really, {user}.", "<@1>"),
            "<@1>, no forwards! Really, <@1>."
        );
        let guild = AntiForwardGuild::default();
        assert_eq!(guild.warning_template(), DEFAULT_WARNING);
    }

    #[test]
    fn exempt_roles_are_respected() {
        let mut guild = AntiForwardGuild::default();
        guild.exempt_roles.insert(RoleId::new(5));
        assert!(guild.is_exempt(&[RoleId::new(1), RoleId::new(5)]));
        assert!(!guild.is_exempt(&[RoleId::new(1)]));
        assert!(!guild.is_exempt(&[]));
    }
}
