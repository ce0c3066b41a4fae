use crate::{
    config, cooldown, event::*, helper::*, log_error, log_internal, loot::WeightedTable,
    persistent_state::UserData, plugin::*,
};
use anyhow::Result;
use rand::Rng;
use serenity::all::{ChannelId, GuildId, Message, UserId};
use std::{collections::HashMap, time::Duration};

/// Crew heists against a shared vault, plus a couple of ways to gamble credits away
pub struct Heist;

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HeistState {
    pub guilds: HashMap<GuildId, GuildHeist>,
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GuildHeist {
    /// `None` until first touched, then seeded from `heist.starting_vault`
    pub vault: Option<u64>,
    pub next_heist_at: Option<i64>,
    pub lobby: Option<Lobby>,
    pub wallets: HashMap<UserId, Wallet>,
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct Lobby {
    pub channel: ChannelId,
    pub crew: Vec<UserId>,
    pub starts_at: i64,
}

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Wallet {
    pub credits: u64,
    pub jailed_until: Option<i64>,
    pub next_payday_at: Option<i64>,
}

#[derive(PartialEq, Eq, Debug)]
pub enum Refusal {
    Jailed(Duration),
    LobbyOpen,
    NoLobby,
    AlreadyInCrew,
    Cooldown(Duration),
    InsufficientCredits { needed: u64, have: u64 },
    InvalidBet,
    PaydayCooldown(Duration),
    NotJailed,
}

impl std::fmt::Display for Refusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let human = |d: &Duration| cooldown::human_duration(*d);
        match self {
            Refusal::Jailed(left) => write!(f, "You're in jail for another {}.", human(left)),
            Refusal::LobbyOpen => write!(f, "A crew is already being assembled. Join it instead!"),
            Refusal::NoLobby => write!(f, "Nobody is planning a heist right now."),
            Refusal::AlreadyInCrew => write!(f, "You're already in the crew."),
            Refusal::Cooldown(left) => write!(
                f,
                "The guards are still on alert. Next heist possible in {}.",
                human(left)
            ),
            Refusal::InsufficientCredits { needed, have } => write!(
                f,
                "That needs {} credits but you only have {}.",
                needed, have
            ),
            Refusal::InvalidBet => write!(f, "Bets must be a positive whole number of credits."),
            Refusal::PaydayCooldown(left) => {
                write!(f, "Payday comes again in {}.", human(left))
            }
            Refusal::NotJailed => write!(f, "You're not in jail."),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Fate {
    Escaped,
    Apprehended,
    Injured,
}

/// Outcome of a resolved heist
#[derive(Default, Debug)]
pub struct Report {
    pub channel: Option<ChannelId>,
    pub take: u64,
    pub share: u64,
    pub escaped: Vec<UserId>,
    pub apprehended: Vec<UserId>,
    pub injured: Vec<UserId>,
}

/// Odds of getting away, growing with crew size
pub fn success_chance(crew_size: usize) -> f64 {
    let extra = crew_size.saturating_sub(1) as f64;
    (0.35 + 0.08 * extra).min(0.85)
}

/// Fraction of the vault a crew of this size can carry
pub fn take_fraction(crew_size: usize) -> f64 {
    (0.1 * crew_size as f64).min(0.5)
}

pub fn roll_fate<R: Rng + ?Sized>(rng: &mut R, chance: f64) -> Fate {
    WeightedTable::new()
        .with(Fate::Escaped, chance)
        .with(Fate::Apprehended, 0.75 * (1.0 - chance))
        .with(Fate::Injured, 0.25 * (1.0 - chance))
        .choose(rng)
        .copied()
        .unwrap_or(Fate::Injured)
}

impl GuildHeist {
    pub fn vault(&self, rules: &config::Heist) -> u64 {
        self.vault.unwrap_or(rules.starting_vault)
    }

    pub fn wallet(&self, user_id: UserId, rules: &config::Heist) -> Wallet {
        self.wallets.get(&user_id).cloned().unwrap_or(Wallet {
            credits: rules.starting_credits,
            ..Default::default()
        })
    }

    fn wallet_mut(&mut self, user_id: UserId, rules: &config::Heist) -> &mut Wallet {
        self.wallets.entry(user_id).or_insert_with(|| Wallet {
            credits: rules.starting_credits,
            ..Default::default()
        })
    }

    fn check_free(&self, user_id: UserId, now: i64) -> Result<(), Refusal> {
        let jailed = self
            .wallets
            .get(&user_id)
            .and_then(|w| w.jailed_until)
            .and_then(|at| cooldown::remaining(at, now));
        match jailed {
            Some(left) => Err(Refusal::Jailed(left)),
            None => Ok(()),
        }
    }

    /// Take `amount` from a wallet
    pub fn charge(
        &mut self,
        user_id: UserId,
        amount: u64,
        rules: &config::Heist,
    ) -> Result<(), Refusal> {
        let wallet = self.wallet_mut(user_id, rules);
        if wallet.credits < amount {
            return Err(Refusal::InsufficientCredits {
                needed: amount,
                have: wallet.credits,
            });
        }
        wallet.credits -= amount;
        Ok(())
    }

    pub fn credit(&mut self, user_id: UserId, amount: u64, rules: &config::Heist) -> u64 {
        let wallet = self.wallet_mut(user_id, rules);
        wallet.credits = wallet.credits.saturating_add(amount);
        wallet.credits
    }

    fn pay_fee(&mut self, user_id: UserId, rules: &config::Heist) -> Result<(), Refusal> {
        self.charge(user_id, rules.entry_fee, rules)?;
        self.vault = Some(self.vault(rules).saturating_add(rules.entry_fee));
        Ok(())
    }

    /// Open a lobby.  Returns when the heist starts.
    pub fn plan(
        &mut self,
        user_id: UserId,
        channel: ChannelId,
        now: i64,
        rules: &config::Heist,
    ) -> Result<i64, Refusal> {
        self.check_free(user_id, now)?;
        if self.lobby.is_some() {
            return Err(Refusal::LobbyOpen);
        }
        if let Some(left) = self.next_heist_at.and_then(|at| cooldown::remaining(at, now)) {
            return Err(Refusal::Cooldown(left));
        }
        self.pay_fee(user_id, rules)?;

        let starts_at = now + rules.lobby_seconds;
        self.lobby = Some(Lobby {
            channel,
            crew: vec![user_id],
            starts_at,
        });
        Ok(starts_at)
    }

    /// Join the open lobby.  Returns the crew size.
    pub fn join(&mut self, user_id: UserId, now: i64, rules: &config::Heist) -> Result<usize, Refusal> {
        self.check_free(user_id, now)?;
        match &self.lobby {
            None => return Err(Refusal::NoLobby),
            Some(lobby) if lobby.crew.contains(&user_id) => return Err(Refusal::AlreadyInCrew),
            Some(_) => {}
        }
        self.pay_fee(user_id, rules)?;

        let lobby = self.lobby.as_mut().ok_or(Refusal::NoLobby)?;
        lobby.crew.push(user_id);
        Ok(lobby.crew.len())
    }

    /// Whether the lobby is ready to go
    pub fn lobby_due(&self, now: i64) -> bool {
        self.lobby
            .as_ref()
            .is_some_and(|lobby| cooldown::is_ready(lobby.starts_at, now))
    }

    /// Settle the heist given each member's fate.
    pub fn resolve(&mut self, fates: &[(UserId, Fate)], now: i64, rules: &config::Heist) -> Report {
        let mut report = Report {
            channel: self.lobby.take().map(|lobby| lobby.channel),
            ..Default::default()
        };
        for (user_id, fate) in fates {
            match fate {
                Fate::Escaped => report.escaped.push(*user_id),
                Fate::Apprehended => report.apprehended.push(*user_id),
                Fate::Injured => report.injured.push(*user_id),
            }
        }

        let vault = self.vault(rules);
        if !report.escaped.is_empty() {
            let take = (vault as f64 * take_fraction(fates.len())) as u64;
            report.share = take / report.escaped.len() as u64;
            report.take = report.share * report.escaped.len() as u64;
        }
        self.vault = Some(vault - report.take);

        for user_id in report.escaped.clone() {
            self.credit(user_id, report.share, rules);
        }
        for user_id in &report.apprehended {
            self.wallet_mut(*user_id, rules).jailed_until = Some(now + rules.jail_seconds);
        }
        self.next_heist_at = Some(now + rules.cooldown_seconds);
        report
    }

    /// Claim the daily credits.  Returns the new balance.
    pub fn payday(&mut self, user_id: UserId, now: i64, rules: &config::Heist) -> Result<u64, Refusal> {
        let wallet = self.wallet_mut(user_id, rules);
        if let Some(left) = wallet.next_payday_at.and_then(|at| cooldown::remaining(at, now)) {
            return Err(Refusal::PaydayCooldown(left));
        }
        wallet.next_payday_at = Some(now + rules.payday_cooldown_seconds);
        wallet.credits = wallet.credits.saturating_add(rules.payday_amount);
        Ok(wallet.credits)
    }

    /// Pay to leave jail early.  Returns the new balance.
    pub fn bail(&mut self, user_id: UserId, now: i64, rules: &config::Heist) -> Result<u64, Refusal> {
        if self.check_free(user_id, now).is_ok() {
            return Err(Refusal::NotJailed);
        }
        self.charge(user_id, rules.bail_cost, rules)?;
        let wallet = self.wallet_mut(user_id, rules);
        wallet.jailed_until = None;
        Ok(wallet.credits)
    }
}

/// Parse and validate a wager against the member's balance, then take it.
pub fn place_bet(
    heist: &mut GuildHeist,
    user_id: UserId,
    arg: Option<&str>,
    rules: &config::Heist,
) -> Result<u64, Refusal> {
    let bet = arg
        .and_then(|arg| arg.parse::<u64>().ok())
        .filter(|bet| *bet > 0)
        .ok_or(Refusal::InvalidBet)?;
    heist.charge(user_id, bet, rules)?;
    Ok(bet)
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Symbol {
    Cherry,
    Lemon,
    Bell,
    Seven,
    Diamond,
}

impl Symbol {
    const ALL: [(Symbol, f64); 5] = [
        (Symbol::Cherry, 40.0),
        (Symbol::Lemon, 30.0),
        (Symbol::Bell, 18.0),
        (Symbol::Seven, 8.0),
        (Symbol::Diamond, 4.0),
    ];

    fn emoji(self) -> &'static str {
        match self {
            Symbol::Cherry => "🍒",
            Symbol::Lemon => "🍋",
            Symbol::Bell => "🔔",
            Symbol::Seven => "7️⃣",
            Symbol::Diamond => "💎",
        }
    }

    /// Payout multiplier for three of a kind
    fn multiplier(self) -> u64 {
        match self {
            Symbol::Cherry => 5,
            Symbol::Lemon => 10,
            Symbol::Bell => 20,
            Symbol::Seven => 50,
            Symbol::Diamond => 100,
        }
    }
}

pub fn spin<R: Rng + ?Sized>(rng: &mut R) -> [Symbol; 3] {
    let table: WeightedTable<Symbol> = Symbol::ALL.into_iter().collect();
    let mut reel = || table.choose(rng).copied().unwrap_or(Symbol::Cherry);
    [reel(), reel(), reel()]
}

/// Credits won on `reels` for `bet`.  Zero means the bet is lost.
pub fn slots_payout(reels: &[Symbol; 3], bet: u64) -> u64 {
    let cherries = reels.iter().filter(|s| **s == Symbol::Cherry).count();
    if reels[0] == reels[1] && reels[1] == reels[2] {
        bet.saturating_mul(reels[0].multiplier())
    } else if cherries == 2 {
        bet.saturating_mul(2)
    } else {
        0
    }
}

impl UserData for HeistState {
    fn forget_user(&mut self, user_id: UserId) -> bool {
        let mut forgot = false;
        for guild in self.guilds.values_mut() {
            forgot |= guild.wallets.remove(&user_id).is_some();
            if let Some(lobby) = guild.lobby.as_mut() {
                let before = lobby.crew.len();
                lobby.crew.retain(|id| *id != user_id);
                forgot |= lobby.crew.len() != before;
                if lobby.crew.is_empty() {
                    guild.lobby = None;
                }
            }
        }
        forgot
    }
}

#[serenity::async_trait]
impl Plugin for Heist {
    fn name(&self) -> &'static str {
        "heist"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_lines(
                ctx,
                &[
                    "heist plan - assemble a crew to rob the vault",
                    "heist join - join the crew being assembled",
                    "heist status - vault, crew and cooldown",
                    "heist balance [@user] - credits and jail time",
                    "heist payday - collect your daily credits",
                    "heist bail - pay your way out of jail",
                    "heist vault <amount> - refill the vault (managers)",
                    "slots <bet> - spin the slot machine",
                    "coinflip <bet> <heads|tails> - double or nothing",
                ],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        if let Event::Tick = event {
            resolve_due(ctx).await?;
            return Ok(EventHandled::No);
        }

        let Some((msg, name, args)) = event.bot_cmd(ctx).await else {
            return Ok(EventHandled::No);
        };
        match name.to_lowercase().as_str() {
            "heist" => heist(ctx, msg, &args).await?,
            "slots" => slots(ctx, msg, &args).await?,
            "coinflip" => coinflip(ctx, msg, &args).await?,
            _ => return Ok(EventHandled::No),
        }
        Ok(EventHandled::Yes)
    }
}

async fn resolve_due(ctx: &Context<'_>) -> Result<()> {
    let now = cooldown::now();
    let rules = ctx.cfg.read().await.heist.clone();

    let mut reports = Vec::new();
    {
        let mut pstate = ctx.pstate.write().await;
        for (guild_id, guild) in pstate.heist.guilds.iter_mut() {
            if !guild.lobby_due(now) {
                continue;
            }
            let crew = guild.lobby.as_ref().map(|l| l.crew.clone()).unwrap_or_default();
            let chance = success_chance(crew.len());
            let fates: Vec<(UserId, Fate)> = {
                let mut rng = rand::thread_rng();
                crew.iter()
                    .map(|user_id| (*user_id, roll_fate(&mut rng, chance)))
                    .collect()
            };
            log_internal!("Heist in {} resolved for a crew of {}", guild_id, crew.len());
            reports.push(guild.resolve(&fates, now, &rules));
        }
        if reports.is_empty() {
            return Ok(());
        }
        pstate.save().await?;
    }

    for report in reports {
        let Some(channel) = report.channel else {
            continue;
        };
        if let Err(e) = channel.say(ctx.http, describe(&report)).await {
            log_error!("Could not announce heist in {}: {}", channel, e);
        }
    }
    Ok(())
}

fn mention_list(users: &[UserId]) -> String {
    users
        .iter()
        .map(|id| format!("<@{}>", id))
        .collect::<Vec<String>>()
        .join(", ")
}

fn describe(report: &Report) -> String {
    let mut text = String::from("🚨 **The heist is over!**\n");
    if report.escaped.is_empty() {
        text.push_str("Nobody made it out with the loot.\n");
    } else {
        text.push_str(&format!(
            "💰 {} escaped with {} credits, {} each.\n",
            mention_list(&report.escaped),
            report.take,
            report.share
        ));
    }
    if !report.apprehended.is_empty() {
        text.push_str(&format!(
            "🚓 {} got caught and went to jail.\n",
            mention_list(&report.apprehended)
        ));
    }
    if !report.injured.is_empty() {
        text.push_str(&format!(
            "🩹 {} got hurt and limped home empty-handed.\n",
            mention_list(&report.injured)
        ));
    }
    text
}

async fn heist(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<()> {
    let Some(guild_id) = msg.require_guild(ctx).await? else {
        return Ok(());
    };
    let rules = ctx.cfg.read().await.heist.clone();
    let now = cooldown::now();
    let sub = args.first().map(|s| s.to_lowercase()).unwrap_or_default();

    if sub == "vault" && !msg.require_admin(ctx).await? {
        return Ok(());
    }

    let reply = {
        let mut pstate = ctx.pstate.write().await;
        let guild = pstate.heist.guilds.entry(guild_id).or_default();

        let (reply, changed) = match sub.as_str() {
            "plan" => match guild.plan(msg.author.id, msg.channel_id, now, &rules) {
                Ok(starts_at) => (
                    format!(
                        "🕶️ A heist is being planned! Join with `heist join` (fee {} credits). The crew moves out <t:{}:R>.",
                        rules.entry_fee, starts_at
                    ),
                    true,
                ),
                Err(refusal) => (refusal.to_string(), false),
            },
            "join" => match guild.join(msg.author.id, now, &rules) {
                Ok(size) => (
                    format!(
                        "You're in. The crew is {} strong, with a {:.0}% chance of success.",
                        size,
                        success_chance(size) * 100.0
                    ),
                    true,
                ),
                Err(refusal) => (refusal.to_string(), false),
            },
            "status" => {
                let mut text = format!("🏦 The vault holds **{}** credits.\n", guild.vault(&rules));
                match &guild.lobby {
                    Some(lobby) => text.push_str(&format!(
                        "A crew of {} moves out <t:{}:R>.\n",
                        lobby.crew.len(),
                        lobby.starts_at
                    )),
                    None => match guild.next_heist_at.and_then(|at| cooldown::remaining(at, now)) {
                        Some(left) => text.push_str(&format!(
                            "Guards on alert for another {}.\n",
                            cooldown::human_duration(left)
                        )),
                        None => text.push_str("Ready for a new heist.\n"),
                    },
                }
                (text, false)
            }
            "balance" | "bal" => {
                let user_id = target_user(msg, &args[1..]);
                let wallet = guild.wallet(user_id, &rules);
                let mut text = format!("<@{}> has **{}** credits.", user_id, wallet.credits);
                if let Some(left) = wallet.jailed_until.and_then(|at| cooldown::remaining(at, now)) {
                    text.push_str(&format!(
                        " In jail for another {}.",
                        cooldown::human_duration(left)
                    ));
                }
                (text, false)
            }
            "payday" => match guild.payday(msg.author.id, now, &rules) {
                Ok(balance) => (
                    format!(
                        "💵 You collected {} credits. Balance: {}.",
                        rules.payday_amount, balance
                    ),
                    true,
                ),
                Err(refusal) => (refusal.to_string(), false),
            },
            "bail" => match guild.bail(msg.author.id, now, &rules) {
                Ok(balance) => (
                    format!(
                        "🔓 You paid {} credits bail and walked free. Balance: {}.",
                        rules.bail_cost, balance
                    ),
                    true,
                ),
                Err(refusal) => (refusal.to_string(), false),
            },
            "vault" => match args.get(1).and_then(|a| a.parse::<u64>().ok()) {
                Some(amount) => {
                    guild.vault = Some(amount);
                    (format!("The vault now holds {} credits.", amount), true)
                }
                None => ("Give the new vault size in credits.".to_owned(), false),
            },
            _ => (Heist.usage(ctx).await.unwrap_or_default(), false),
        };

        if changed {
            pstate.save().await?;
        }
        reply
    };

    msg.reply_quiet(ctx, &reply).await?;
    Ok(())
}

async fn slots(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<()> {
    let Some(guild_id) = msg.require_guild(ctx).await? else {
        return Ok(());
    };
    let rules = ctx.cfg.read().await.heist.clone();

    let reply = {
        let mut pstate = ctx.pstate.write().await;
        let guild = pstate.heist.guilds.entry(guild_id).or_default();
        match place_bet(guild, msg.author.id, args.first().copied(), &rules) {
            Ok(bet) => {
                let reels = spin(&mut rand::thread_rng());
                let won = slots_payout(&reels, bet);
                let balance = guild.credit(msg.author.id, won, &rules);
                pstate.save().await?;

                let shown: Vec<&str> = reels.iter().map(|s| s.emoji()).collect();
                let verdict = if won > 0 {
                    format!("You win **{}** credits!", won)
                } else {
                    format!("You lose {} credits.", bet)
                };
                format!("🎰 | {} |\n{} Balance: {}.", shown.join(" "), verdict, balance)
            }
            Err(refusal) => refusal.to_string(),
        }
    };

    msg.reply(ctx.cache_http, reply).await?;
    Ok(())
}

async fn coinflip(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<()> {
    let Some(guild_id) = msg.require_guild(ctx).await? else {
        return Ok(());
    };
    let call = match args.get(1).map(|s| s.to_lowercase()).as_deref() {
        Some("heads" | "h") => true,
        Some("tails" | "t") => false,
        _ => {
            msg.reply(ctx.cache_http, "Call it: `coinflip <bet> heads` or `coinflip <bet> tails`.")
                .await?;
            return Ok(());
        }
    };
    let rules = ctx.cfg.read().await.heist.clone();

    let reply = {
        let mut pstate = ctx.pstate.write().await;
        let guild = pstate.heist.guilds.entry(guild_id).or_default();
        match place_bet(guild, msg.author.id, args.first().copied(), &rules) {
            Ok(bet) => {
                let heads = rand::thread_rng().gen_bool(0.5);
                let won = if heads == call { bet.saturating_mul(2) } else { 0 };
                let balance = guild.credit(msg.author.id, won, &rules);
                pstate.save().await?;

                let side = if heads { "heads" } else { "tails" };
                if won > 0 {
                    format!("🪙 It's {}! You win {} credits. Balance: {}.", side, won, balance)
                } else {
                    format!("🪙 It's {}. You lose {} credits. Balance: {}.", side, bet, balance)
                }
            }
            Err(refusal) => refusal.to_string(),
        }
    };

    msg.reply(ctx.cache_http, reply).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    const CH: ChannelId = ChannelId::new(1);
    const A: UserId = UserId::new(10);
    const B: UserId = UserId::new(11);

    fn rules() -> config::Heist {
        config::Heist::default()
    }

    #[test]
    fn chance_grows_with_crew_and_caps() {
        assert!((success_chance(1) - 0.35).abs() < 1e-9);
        assert!((success_chance(3) - 0.51).abs() < 1e-9);
        assert!((success_chance(20) - 0.85).abs() < 1e-9);
        assert!((take_fraction(2) - 0.2).abs() < 1e-9);
        assert!((take_fraction(9) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn lobby_guards() {
        let rules = rules();
        let mut heist = GuildHeist::default();
        assert_eq!(heist.join(A, 0, &rules), Err(Refusal::NoLobby));
        assert_eq!(heist.plan(A, CH, 0, &rules), Ok(rules.lobby_seconds));
        assert_eq!(heist.plan(B, CH, 0, &rules), Err(Refusal::LobbyOpen));
        assert_eq!(heist.join(A, 0, &rules), Err(Refusal::AlreadyInCrew));
        assert_eq!(heist.join(B, 0, &rules), Ok(2));

        // Fees go straight into the vault
        assert_eq!(heist.vault(&rules), rules.starting_vault + 2 * rules.entry_fee);
        assert_eq!(
            heist.wallet(A, &rules).credits,
            rules.starting_credits - rules.entry_fee
        );
    }

    #[test]
    fn forgetting_leaves_the_crew_and_drops_an_empty_lobby() {
        let rules = rules();
        let guild = GuildId::new(1);
        let mut state = HeistState::default();
        let heist = state.guilds.entry(guild).or_default();
        heist.plan(A, CH, 0, &rules).unwrap();
        heist.join(B, 0, &rules).unwrap();

        assert!(state.forget_user(A));
        let heist = &state.guilds[&guild];
        assert!(!heist.wallets.contains_key(&A));
        assert_eq!(heist.lobby.as_ref().map(|l| l.crew.clone()), Some(vec![B]));

        assert!(state.forget_user(B));
        assert!(state.guilds[&guild].lobby.is_none());
        assert!(!state.forget_user(B));
    }

    #[test]
    fn broke_members_cannot_plan() {
        let rules = rules();
        let mut heist = GuildHeist::default();
        heist.wallets.insert(A, Wallet::default());
        assert_eq!(
            heist.plan(A, CH, 0, &rules),
            Err(Refusal::InsufficientCredits {
                needed: rules.entry_fee,
                have: 0
            })
        );
        assert!(heist.lobby.is_none());
    }

    #[test]
    fn resolve_pays_escapees_and_jails_the_caught() {
        let rules = rules();
        let mut heist = GuildHeist::default();
        heist.plan(A, CH, 0, &rules).unwrap();
        heist.join(B, 0, &rules).unwrap();
        let vault = heist.vault(&rules);

        let report = heist.resolve(&[(A, Fate::Escaped), (B, Fate::Apprehended)], 100, &rules);
        assert_eq!(report.channel, Some(CH));
        assert_eq!(report.take, (vault as f64 * 0.2) as u64);
        assert_eq!(report.share, report.take);
        assert_eq!(heist.vault(&rules), vault - report.take);
        assert_eq!(
            heist.wallet(A, &rules).credits,
            rules.starting_credits - rules.entry_fee + report.share
        );
        assert!(heist.lobby.is_none());
        assert_eq!(heist.next_heist_at, Some(100 + rules.cooldown_seconds));

        assert!(matches!(heist.plan(B, CH, 101, &rules), Err(Refusal::Jailed(_))));
        assert!(matches!(heist.plan(A, CH, 101, &rules), Err(Refusal::Cooldown(_))));
    }

    #[test]
    fn failed_heist_leaves_the_vault_alone() {
        let rules = rules();
        let mut heist = GuildHeist::default();
        heist.plan(A, CH, 0, &rules).unwrap();
        let vault = heist.vault(&rules);
        let report = heist.resolve(&[(A, Fate::Injured)], 100, &rules);
        assert_eq!(report.take, 0);
        assert_eq!(heist.vault(&rules), vault);
    }

    #[test]
    fn payday_and_bail() {
        let rules = rules();
        let mut heist = GuildHeist::default();
        assert_eq!(
            heist.payday(A, 0, &rules),
            Ok(rules.starting_credits + rules.payday_amount)
        );
        assert!(matches!(heist.payday(A, 10, &rules), Err(Refusal::PaydayCooldown(_))));
        assert!(heist.payday(A, rules.payday_cooldown_seconds, &rules).is_ok());

        assert_eq!(heist.bail(A, 0, &rules), Err(Refusal::NotJailed));
        heist.wallets.get_mut(&A).unwrap().jailed_until = Some(1000);
        let before = heist.wallet(A, &rules).credits;
        assert_eq!(heist.bail(A, 10, &rules), Ok(before - rules.bail_cost));
        assert_eq!(heist.wallet(A, &rules).jailed_until, None);
    }

    #[test]
    fn bets_must_be_positive_and_covered() {
        let rules = rules();
        let mut heist = GuildHeist::default();
        assert_eq!(place_bet(&mut heist, A, None, &rules), Err(Refusal::InvalidBet));
        assert_eq!(place_bet(&mut heist, A, Some("0"), &rules), Err(Refusal::InvalidBet));
        assert_eq!(place_bet(&mut heist, A, Some("-5"), &rules), Err(Refusal::InvalidBet));
        assert!(matches!(
            place_bet(&mut heist, A, Some("100000"), &rules),
            Err(Refusal::InsufficientCredits { .. })
        ));
        assert_eq!(place_bet(&mut heist, A, Some("100"), &rules), Ok(100));
        assert_eq!(heist.wallet(A, &rules).credits, rules.starting_credits - 100);
    }

    #[test]
    fn slot_payouts() {
        use Symbol::*;
        assert_eq!(slots_payout(&[Diamond, Diamond, Diamond], 10), 1000);
        assert_eq!(slots_payout(&[Cherry, Cherry, Cherry], 10), 50);
        assert_eq!(slots_payout(&[Cherry, Lemon, Cherry], 10), 20);
        assert_eq!(slots_payout(&[Cherry, Lemon, Bell], 10), 0);
        assert_eq!(slots_payout(&[Seven, Seven, Bell], 10), 0);
    }

    #[test]
    fn fates_follow_the_odds() {
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..100 {
            assert_eq!(roll_fate(&mut rng, 1.0), Fate::Escaped);
        }
        let reels = spin(&mut rng);
        assert_eq!(reels.len(), 3);
    }
}
