use crate::{cooldown, event::*, helper::*, persistent_state::UserData, plugin::*};
use anyhow::Result;
use serenity::all::{Message, UserId};
use std::{collections::HashMap, str::FromStr};

pub const CAPACITY: usize = 200;
const TITLE_MAX: usize = 200;

/// Personal list of things to watch.  Follows the user across servers and DMs.
pub struct Watchlist;

#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchStatus {
    Planned,
    Watching,
    Completed,
    Dropped,
}

impl FromStr for WatchStatus {
    type Err = WatchlistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "planned" | "plan" => Ok(WatchStatus::Planned),
            "watching" => Ok(WatchStatus::Watching),
            "completed" | "done" => Ok(WatchStatus::Completed),
            "dropped" => Ok(WatchStatus::Dropped),
            _ => Err(WatchlistError::UnknownStatus(s.to_owned())),
        }
    }
}

impl std::fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            WatchStatus::Planned => "planned",
            WatchStatus::Watching => "watching",
            WatchStatus::Completed => "completed",
            WatchStatus::Dropped => "dropped",
        })
    }
}

impl WatchStatus {
    fn emoji(self) -> &'static str {
        match self {
            WatchStatus::Planned => "📋",
            WatchStatus::Watching => "▶️",
            WatchStatus::Completed => "✅",
            WatchStatus::Dropped => "🗑️",
        }
    }
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct WatchEntry {
    pub title: String,
    pub status: WatchStatus,
    #[serde(default)]
    pub rating: Option<u8>,
    pub added_at: i64,
}

#[derive(PartialEq, Eq, Debug)]
pub enum WatchlistError {
    EmptyTitle,
    Duplicate(String),
    Full,
    /// 1-based position that doesn't exist
    NoSuchEntry(usize),
    InvalidRating,
    UnknownStatus(String),
}

impl std::fmt::Display for WatchlistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchlistError::EmptyTitle => write!(f, "Give a title."),
            WatchlistError::Duplicate(title) => write!(f, "**{}** is already on your list.", title),
            WatchlistError::Full => write!(f, "Your list is full ({} entries).", CAPACITY),
            WatchlistError::NoSuchEntry(n) => write!(f, "There's no entry #{} on your list.", n),
            WatchlistError::InvalidRating => write!(f, "Ratings go from 1 to 10."),
            WatchlistError::UnknownStatus(s) => write!(
                f,
                "`{}` isn't a status. Use planned, watching, completed or dropped.",
                s
            ),
        }
    }
}

impl std::error::Error for WatchlistError {}

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WatchlistState {
    pub lists: HashMap<UserId, Vec<WatchEntry>>,
}

impl WatchlistState {
    /// Append a title as planned.  Returns its 1-based position.
    pub fn add(&mut self, user_id: UserId, title: &str, now: i64) -> Result<usize, WatchlistError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(WatchlistError::EmptyTitle);
        }
        let title = truncate(title, TITLE_MAX);

        let list = self.lists.entry(user_id).or_default();
        if let Some(existing) = list
            .iter()
            .find(|entry| entry.title.to_lowercase() == title.to_lowercase())
        {
            return Err(WatchlistError::Duplicate(existing.title.clone()));
        }
        if list.len() >= CAPACITY {
            return Err(WatchlistError::Full);
        }
        list.push(WatchEntry {
            title,
            status: WatchStatus::Planned,
            rating: None,
            added_at: now,
        });
        Ok(list.len())
    }

    fn entry_mut(&mut self, user_id: UserId, n: usize) -> Result<&mut WatchEntry, WatchlistError> {
        n.checked_sub(1)
            .and_then(|i| self.lists.get_mut(&user_id)?.get_mut(i))
            .ok_or(WatchlistError::NoSuchEntry(n))
    }

    pub fn remove(&mut self, user_id: UserId, n: usize) -> Result<WatchEntry, WatchlistError> {
        let list = self
            .lists
            .get_mut(&user_id)
            .ok_or(WatchlistError::NoSuchEntry(n))?;
        if n == 0 || n > list.len() {
            return Err(WatchlistError::NoSuchEntry(n));
        }
        let removed = list.remove(n - 1);
        if list.is_empty() {
            self.lists.remove(&user_id);
        }
        Ok(removed)
    }

    pub fn set_status(
        &mut self,
        user_id: UserId,
        n: usize,
        status: WatchStatus,
    ) -> Result<&WatchEntry, WatchlistError> {
        let entry = self.entry_mut(user_id, n)?;
        entry.status = status;
        Ok(entry)
    }

    pub fn rate(&mut self, user_id: UserId, n: usize, rating: u8) -> Result<&WatchEntry, WatchlistError> {
        if !(1..=10).contains(&rating) {
            return Err(WatchlistError::InvalidRating);
        }
        let entry = self.entry_mut(user_id, n)?;
        entry.rating = Some(rating);
        Ok(entry)
    }

    /// Empty the list.  Returns how many entries were dropped.
    pub fn clear(&mut self, user_id: UserId) -> usize {
        self.lists.remove(&user_id).map_or(0, |list| list.len())
    }

    /// Entries with their 1-based positions, optionally only those with `status`
    pub fn list(&self, user_id: UserId, status: Option<WatchStatus>) -> Vec<(usize, &WatchEntry)> {
        self.lists
            .get(&user_id)
            .map(|list| {
                list.iter()
                    .enumerate()
                    .filter(|(_, entry)| status.map_or(true, |s| entry.status == s))
                    .map(|(i, entry)| (i + 1, entry))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl UserData for WatchlistState {
    fn forget_user(&mut self, user_id: UserId) -> bool {
        self.clear(user_id) > 0
    }
}

fn format_entry(n: usize, entry: &WatchEntry) -> String {
    let rating = entry
        .rating
        .map(|r| format!(" ⭐ {}/10", r))
        .unwrap_or_default();
    format!("`{:>3}` {} {}{}", n, entry.status.emoji(), entry.title, rating)
}

#[serenity::async_trait]
impl Plugin for Watchlist {
    fn name(&self) -> &'static str {
        "watchlist"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_lines(
                ctx,
                &[
                    "watchlist list [status] - show your list",
                    "watchlist add <title> - add something to watch",
                    "watchlist remove <n> - remove entry n",
                    "watchlist status <n> <planned|watching|completed|dropped> - update progress",
                    "watchlist rate <n> <1-10> - rate entry n",
                    "watchlist clear - empty your list",
                ],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };
        command(ctx, msg, &args).await?;
        Ok(EventHandled::Yes)
    }
}

async fn command(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<()> {
    let user_id = msg.author.id;
    let sub = args.first().map(|s| s.to_lowercase()).unwrap_or_default();
    let position = args.get(1).and_then(|a| a.parse::<usize>().ok());

    let filter = match (sub.as_str(), args.get(1)) {
        ("list", Some(status)) => match status.parse::<WatchStatus>() {
            Ok(status) => Some(status),
            Err(e) => {
                msg.reply(ctx.cache_http, e.to_string()).await?;
                return Ok(());
            }
        },
        _ => None,
    };

    let reply = {
        let mut pstate = ctx.pstate.write().await;
        let watchlist = &mut pstate.watchlist;

        let (reply, changed) = match (sub.as_str(), position) {
            ("add", _) => {
                let title = args.get(1..).map(|words| words.join(" ")).unwrap_or_default();
                match watchlist.add(user_id, &title, cooldown::now()) {
                    Ok(n) => (format!("Added #{}: **{}**", n, title.trim()), true),
                    Err(e) => (e.to_string(), false),
                }
            }
            ("remove", Some(n)) => match watchlist.remove(user_id, n) {
                Ok(entry) => (format!("Removed **{}**.", entry.title), true),
                Err(e) => (e.to_string(), false),
            },
            ("status", Some(n)) => {
                let status = args
                    .get(2)
                    .map_or(Err(WatchlistError::UnknownStatus(String::new())), |s| s.parse());
                match status.and_then(|status| watchlist.set_status(user_id, n, status)) {
                    Ok(entry) => (format!("**{}** is now {}.", entry.title, entry.status), true),
                    Err(e) => (e.to_string(), false),
                }
            }
            ("rate", Some(n)) => {
                let rating = args
                    .get(2)
                    .and_then(|r| r.parse::<u8>().ok())
                    .ok_or(WatchlistError::InvalidRating);
                match rating.and_then(|rating| watchlist.rate(user_id, n, rating)) {
                    Ok(entry) => (
                        format!("Rated **{}** {}/10.", entry.title, entry.rating.unwrap_or_default()),
                        true,
                    ),
                    Err(e) => (e.to_string(), false),
                }
            }
            ("clear", _) => {
                let n = watchlist.clear(user_id);
                (format!("Cleared {} entries.", n), n > 0)
            }
            ("list", _) | ("", _) => {
                let entries = watchlist.list(user_id, filter);
                let reply = if entries.is_empty() {
                    "Nothing here yet. Add something with `watchlist add <title>`.".to_owned()
                } else {
                    let mut text = format!("**{}'s watchlist**\n", msg.author.name);
                    for (n, entry) in entries {
                        text.push_str(&format_entry(n, entry));
                        text.push('\n');
                    }
                    text
                };
                (reply, false)
            }
            _ => (Watchlist.usage(ctx).await.unwrap_or_default(), false),
        };

        if changed {
            pstate.save().await?;
        }
        reply
    };

    msg.reply_quiet(ctx, &reply).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: UserId = UserId::new(1);

    #[test]
    fn duplicates_are_rejected_case_insensitively() {
        let mut state = WatchlistState::default();
        assert_eq!(state.add(USER, "Akira", 0), Ok(1));
        assert_eq!(
            state.add(USER, "  aKIRA ", 0),
            Err(WatchlistError::Duplicate("Akira".to_owned()))
        );
        assert_eq!(state.add(USER, "   ", 0), Err(WatchlistError::EmptyTitle));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut state = WatchlistState::default();
        for i in 0..CAPACITY {
            state.add(USER, &format!("Show {}", i), 0).unwrap();
        }
        assert_eq!(state.add(USER, "One more", 0), Err(WatchlistError::Full));
    }

    #[test]
    fn positions_are_one_based() {
        let mut state = WatchlistState::default();
        state.add(USER, "Akira", 0).unwrap();
        state.add(USER, "Paprika", 0).unwrap();

        assert_eq!(state.set_status(USER, 0, WatchStatus::Dropped).err(), Some(WatchlistError::NoSuchEntry(0)));
        assert_eq!(state.set_status(USER, 3, WatchStatus::Dropped).err(), Some(WatchlistError::NoSuchEntry(3)));
        state.set_status(USER, 2, WatchStatus::Completed).unwrap();
        state.rate(USER, 2, 9).unwrap();
        assert_eq!(state.rate(USER, 2, 11).err(), Some(WatchlistError::InvalidRating));

        let completed = state.list(USER, Some(WatchStatus::Completed));
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].0, 2);
        assert_eq!(completed[0].1.rating, Some(9));
    }

    #[test]
    fn emptied_lists_disappear() {
        let mut state = WatchlistState::default();
        state.add(USER, "Akira", 0).unwrap();
        assert_eq!(state.remove(USER, 1).map(|e| e.title), Ok("Akira".to_owned()));
        assert!(state.lists.is_empty());
        assert_eq!(state.remove(USER, 1).err(), Some(WatchlistError::NoSuchEntry(1)));
        assert_eq!(state.clear(USER), 0);
    }

    #[test]
    fn statuses_parse_and_serialize_lowercase() {
        assert_eq!("Watching".parse::<WatchStatus>(), Ok(WatchStatus::Watching));
        assert!("soon".parse::<WatchStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&WatchStatus::Completed).unwrap(),
            "\"completed\""
        );
    }
}
