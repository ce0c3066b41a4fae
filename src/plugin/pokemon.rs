use crate::{
    api::{
        pokeapi::{self, MAX_DEX},
        ApiError,
    },
    cooldown, event::*, helper::*, log_error,
    persistent_state::UserData,
    plugin::*,
};
use anyhow::Result;
use rand::Rng;
use serenity::all::{ChannelId, CreateEmbed, CreateMessage, GuildId, Message, UserId};
use std::collections::{hash_map::Entry, HashMap};

const POKEDEX_RED: u32 = 0xE3350D;

/// Pokédex lookups and "who's that Pokémon" rounds
pub struct Pokemon;

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PokemonState {
    /// Quiz points per guild per member
    pub guilds: HashMap<GuildId, HashMap<UserId, u64>>,
}

/// A quiz round waiting for the right answer
pub struct Quiz {
    /// Normalized with [`normalize_guess`]
    pub answer: String,
    pub display: String,
    pub sprite: Option<String>,
    pub expires_at: i64,
    pub guild_id: Option<GuildId>,
}

/// Lowercase letters and digits only, so `Mr. Mime` matches `mr mime` and `mrmime`
pub fn normalize_guess(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// `Pikachu` becomes `P _ _ _ _ _ _`
pub fn hint(display: &str) -> String {
    display
        .split(' ')
        .map(|word| {
            word.chars()
                .enumerate()
                .map(|(i, c)| if i == 0 { c.to_string() } else { "_".to_owned() })
                .collect::<Vec<String>>()
                .join(" ")
        })
        .collect::<Vec<String>>()
        .join("   ")
}

impl UserData for PokemonState {
    fn forget_user(&mut self, user_id: UserId) -> bool {
        let mut forgot = false;
        for points in self.guilds.values_mut() {
            forgot |= points.remove(&user_id).is_some();
        }
        forgot
    }
}

#[serenity::async_trait]
impl Plugin for Pokemon {
    fn name(&self) -> &'static str {
        "pokemon"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_lines(
                ctx,
                &[
                    "pokemon <name|number> - look up a Pokémon",
                    "pokequiz - start a round of who's that Pokémon",
                    "pokequiz top - best Pokémon trainers",
                ],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        match event {
            Event::Tick => {
                expire_quizzes(ctx).await?;
                Ok(EventHandled::No)
            }
            Event::Message(msg) => match event.bot_cmd(ctx).await {
                Some((msg, name, args)) => match name.to_lowercase().as_str() {
                    "pokemon" | "pokedex" => {
                        lookup(ctx, msg, &args.join(" ")).await?;
                        Ok(EventHandled::Yes)
                    }
                    "pokequiz" => {
                        if args.first() == Some(&"top") {
                            leaderboard(ctx, msg).await?;
                        } else {
                            start_quiz(ctx, msg).await?;
                        }
                        Ok(EventHandled::Yes)
                    }
                    _ => Ok(EventHandled::No),
                },
                None => check_answer(ctx, msg).await,
            },
            _ => Ok(EventHandled::No),
        }
    }
}

fn lookup_error(query: &str, e: &ApiError) -> String {
    match e {
        ApiError::NotFound => format!("No Pokémon called `{}`.", truncate(query, 40)),
        e => format!("The Pokédex is unavailable: {}.", e),
    }
}

async fn lookup(ctx: &Context<'_>, msg: &Message, query: &str) -> Result<()> {
    if query.trim().is_empty() {
        msg.reply(ctx.cache_http, "Which Pokémon? Give a name or a Pokédex number.")
            .await?;
        return Ok(());
    }
    let api_url = ctx.cfg.read().await.pokemon.api_url.clone();

    let pokemon = match pokeapi::fetch(ctx.web, &api_url, query).await {
        Ok(pokemon) => pokemon,
        Err(e) => {
            msg.reply(ctx.cache_http, lookup_error(query, &e)).await?;
            return Ok(());
        }
    };

    let abilities = pokemon
        .abilities
        .iter()
        .map(|a| {
            let name = pokeapi::display_name(&a.ability.name);
            if a.is_hidden {
                format!("{} (hidden)", name)
            } else {
                name
            }
        })
        .collect::<Vec<String>>()
        .join(", ");
    let stats = pokemon
        .stats
        .iter()
        .map(|s| format!("{}: {}", pokeapi::display_name(&s.stat.name), s.base_stat))
        .collect::<Vec<String>>()
        .join("\n");

    let mut embed = CreateEmbed::new()
        .title(format!("#{:04} {}", pokemon.id, pokemon.display_name()))
        .url(format!(
            "https://www.pokemon.com/us/pokedex/{}",
            pokemon.species.name
        ))
        .color(POKEDEX_RED)
        .field("Type", pokemon.type_names().join(" / "), true)
        .field("Height", format!("{:.1} m", pokemon.height_m()), true)
        .field("Weight", format!("{:.1} kg", pokemon.weight_kg()), true)
        .field("Abilities", abilities, false)
        .field(
            format!("Base stats ({})", pokemon.stat_total()),
            stats,
            false,
        );
    if let Some(sprite) = &pokemon.sprites.front_default {
        embed = embed.thumbnail(sprite);
    }

    msg.channel_id
        .send_message(ctx.cache_http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

async fn start_quiz(ctx: &Context<'_>, msg: &Message) -> Result<()> {
    if ctx.vstate.read().await.quizzes.contains_key(&msg.channel_id) {
        msg.reply(ctx.cache_http, "A round is already running in this channel!")
            .await?;
        return Ok(());
    }
    let (api_url, quiz_seconds) = {
        let cfg = ctx.cfg.read().await;
        (cfg.pokemon.api_url.clone(), cfg.pokemon.quiz_seconds)
    };

    let dex_number = rand::thread_rng().gen_range(1..=MAX_DEX);
    let pokemon = match pokeapi::fetch(ctx.web, &api_url, &dex_number.to_string()).await {
        Ok(pokemon) => pokemon,
        Err(e) => {
            msg.reply(ctx.cache_http, lookup_error(&dex_number.to_string(), &e))
                .await?;
            return Ok(());
        }
    };

    let display = pokemon.display_name();
    let expires_at = cooldown::now() + quiz_seconds;
    {
        let mut vstate = ctx.vstate.write().await;
        // Someone may have started a round while the lookup was in flight
        let Entry::Vacant(slot) = vstate.quizzes.entry(msg.channel_id) else {
            return Ok(());
        };
        slot.insert(Quiz {
            answer: normalize_guess(&display),
            display: display.clone(),
            sprite: pokemon.sprites.front_default.clone(),
            expires_at,
            guild_id: msg.guild_id,
        });
    }

    let embed = CreateEmbed::new()
        .title("Who's that Pokémon?")
        .color(POKEDEX_RED)
        .field("Type", pokemon.type_names().join(" / "), true)
        .field("Hint", format!("`{}`", hint(&display)), true)
        .description(format!("Type the name before <t:{}:R>!", expires_at));
    msg.channel_id
        .send_message(ctx.cache_http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

async fn check_answer(ctx: &Context<'_>, msg: &Message) -> Result<EventHandled> {
    let guess = normalize_guess(&msg.content);
    if guess.is_empty() {
        return Ok(EventHandled::No);
    }

    let solved = {
        let mut vstate = ctx.vstate.write().await;
        let correct = vstate
            .quizzes
            .get(&msg.channel_id)
            .is_some_and(|quiz| quiz.answer == guess);
        if !correct {
            return Ok(EventHandled::No);
        }
        vstate.quizzes.remove(&msg.channel_id)
    };
    let Some(quiz) = solved else {
        return Ok(EventHandled::No);
    };

    let mut reply = format!("🎉 Correct, it's **{}**!", quiz.display);
    if let Some(guild_id) = quiz.guild_id {
        let points = {
            let mut pstate = ctx.pstate.write().await;
            let points = pstate
                .pokemon
                .guilds
                .entry(guild_id)
                .or_default()
                .entry(msg.author.id)
                .or_default();
            *points = points.saturating_add(1);
            let points = *points;
            pstate.save().await?;
            points
        };
        reply.push_str(&format!(" You now have {} points.", points));
    }

    let mut embed = CreateEmbed::new().description(reply).color(POKEDEX_RED);
    if let Some(sprite) = &quiz.sprite {
        embed = embed.thumbnail(sprite);
    }
    msg.channel_id
        .send_message(
            ctx.cache_http,
            CreateMessage::new().embed(embed).reference_message(msg),
        )
        .await?;
    Ok(EventHandled::Yes)
}

async fn expire_quizzes(ctx: &Context<'_>) -> Result<()> {
    let now = cooldown::now();
    let expired: Vec<(ChannelId, Quiz)> = {
        let mut vstate = ctx.vstate.write().await;
        let channels: Vec<ChannelId> = vstate
            .quizzes
            .iter()
            .filter(|(_, quiz)| cooldown::is_ready(quiz.expires_at, now))
            .map(|(channel, _)| *channel)
            .collect();
        channels
            .into_iter()
            .filter_map(|channel| vstate.quizzes.remove(&channel).map(|q| (channel, q)))
            .collect()
    };

    for (channel, quiz) in expired {
        let mut embed = CreateEmbed::new()
            .description(format!("⏰ Time's up! It was **{}**.", quiz.display))
            .color(POKEDEX_RED);
        if let Some(sprite) = &quiz.sprite {
            embed = embed.thumbnail(sprite);
        }
        if let Err(e) = channel
            .send_message(ctx.http, CreateMessage::new().embed(embed))
            .await
        {
            log_error!("Could not reveal quiz answer in {}: {}", channel, e);
        }
    }
    Ok(())
}

async fn leaderboard(ctx: &Context<'_>, msg: &Message) -> Result<()> {
    let Some(guild_id) = msg.require_guild(ctx).await? else {
        return Ok(());
    };
    let mut ranking: Vec<(UserId, u64)> = ctx
        .pstate
        .read()
        .await
        .pokemon
        .guilds
        .get(&guild_id)
        .map(|points| points.iter().map(|(id, p)| (*id, *p)).collect())
        .unwrap_or_default();
    ranking.sort_by(|a, b| b.1.cmp(&a.1));
    ranking.truncate(10);

    if ranking.is_empty() {
        msg.reply(ctx.cache_http, "Nobody has guessed a Pokémon yet.")
            .await?;
        return Ok(());
    }
    let mut reply = String::from("**Best Pokémon trainers**\n");
    for (rank, (user_id, points)) in ranking.iter().enumerate() {
        reply.push_str(&format!(
            "{} <@{}> - {} points\n",
            ordinal(rank + 1),
            user_id,
            points
        ));
    }
    msg.reply_quiet(ctx, &reply).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_ignore_case_and_punctuation() {
        assert_eq!(normalize_guess("Mr. Mime"), "mrmime");
        assert_eq!(normalize_guess("  PIKACHU!! "), "pikachu");
        assert_eq!(normalize_guess("Farfetch’d"), "farfetchd");
        assert_eq!(normalize_guess("?!"), "");
    }

    #[test]
    fn hints_show_first_letters() {
        assert_eq!(hint("Pikachu"), "P _ _ _ _ _ _");
        assert_eq!(hint("Mr Mime"), "M _   M _ _ _");
    }

    #[test]
    fn forgetting_drops_points() {
        let user = UserId::new(4);
        let mut state = PokemonState::default();
        state.guilds.entry(GuildId::new(1)).or_default().insert(user, 12);
        assert!(state.forget_user(user));
        assert!(state.guilds[&GuildId::new(1)].is_empty());
    }
}
