use crate::plugin::{
    achievements::AchievementsState, antiforward::AntiForwardState, chest::ChestState,
    counting::CountingState, earthquake::EarthquakeState, easter::EasterState, heist::HeistState,
    pokemon::PokemonState, roleplay::RoleplayState, watchlist::WatchlistState,
};
use anyhow::{anyhow, Result};
use serenity::all::UserId;
use std::path::{Path, PathBuf};

const PSTATE_PATH_REL_HOME: &str = ".config/cogbot/state.json";

/// State which persists across sessions
///
/// One section per plugin.  Missing sections load as empty so adding a plugin never breaks an
/// existing state file.
#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PersistentState {
    pub achievements: AchievementsState,
    pub antiforward: AntiForwardState,
    pub chest: ChestState,
    pub counting: CountingState,
    pub earthquake: EarthquakeState,
    pub easter: EasterState,
    pub heist: HeistState,
    pub pokemon: PokemonState,
    pub roleplay: RoleplayState,
    pub watchlist: WatchlistState,
}

/// Per-user data that must be removable on request
pub trait UserData {
    /// Drop everything stored about `user_id`.  Returns whether anything was removed.
    fn forget_user(&mut self, user_id: UserId) -> bool;
}

impl PersistentState {
    pub fn state_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|p| p.join(PSTATE_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        Self::load_from(&Self::state_path()?).await
    }

    pub async fn save(&self) -> Result<()> {
        self.save_to(&Self::state_path()?).await
    }

    /// Load state, treating a missing file as a fresh start.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let contents = match tokio::fs::read(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(anyhow!(
                    "Could not read state at `{}`: {}",
                    path.to_string_lossy(),
                    e
                ))
            }
        };

        serde_json::from_slice(&contents).map_err(|e| {
            anyhow!(
                "Could not parse state at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        let pstate_str = serde_json::to_string_pretty(&self)
            .map_err(|e| anyhow!("Could not serialize state: {}", e))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                anyhow!(
                    "Could not create directory `{}`: {}",
                    parent.to_string_lossy(),
                    e
                )
            })?;
        }

        // Create a temporary file in the same directory.
        let tmp_path = path.with_extension("json.new");

        tokio::fs::write(&tmp_path, pstate_str).await.map_err(|e| {
            anyhow!(
                "Could not write state to temporary file `{}`: {}",
                tmp_path.to_string_lossy(),
                e
            )
        })?;

        // Atomically rename the temporary file over the target file.
        tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
            anyhow!(
                "Could not rename temporary file `{}` to `{}`: {}",
                tmp_path.to_string_lossy(),
                path.to_string_lossy(),
                e
            )
        })?;

        Ok(())
    }
}

impl UserData for PersistentState {
    fn forget_user(&mut self, user_id: UserId) -> bool {
        // Not short-circuiting: every section must be visited.
        [
            self.achievements.forget_user(user_id),
            self.chest.forget_user(user_id),
            self.counting.forget_user(user_id),
            self.easter.forget_user(user_id),
            self.heist.forget_user(user_id),
            self.pokemon.forget_user(user_id),
            self.roleplay.forget_user(user_id),
            self.watchlist.forget_user(user_id),
        ]
        .into_iter()
        .any(|forgot| forgot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::watchlist::WatchStatus;
    use serenity::all::GuildId;

    #[tokio::test]
    async fn missing_file_is_a_fresh_start() {
        let dir = tempfile::tempdir().unwrap();
        let pstate = PersistentState::load_from(&dir.path().join("state.json"))
            .await
            .unwrap();
        assert!(pstate.watchlist.lists.is_empty());
    }

    #[tokio::test]
    async fn survives_a_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let guild = GuildId::new(10);
        let user = UserId::new(20);

        let mut pstate = PersistentState::default();
        pstate
            .watchlist
            .add(user, "Cowboy Bebop", 0)
            .unwrap();
        pstate.watchlist.set_status(user, 1, WatchStatus::Watching).unwrap();
        pstate.counting.guilds.entry(guild).or_default().high_score = 77;
        pstate.save_to(&path).await.unwrap();

        let loaded = PersistentState::load_from(&path).await.unwrap();
        assert_eq!(loaded.counting.guilds[&guild].high_score, 77);
        let list = &loaded.watchlist.lists[&user];
        assert_eq!(list[0].title, "Cowboy Bebop");
        assert_eq!(list[0].status, WatchStatus::Watching);
        assert!(!path.with_extension("json.new").exists());
    }

    #[tokio::test]
    async fn unknown_sections_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, r#"{"retired_plugin": {"x": 1}}"#)
            .await
            .unwrap();
        assert!(PersistentState::load_from(&path).await.is_ok());
    }

    #[test]
    fn forgetting_reaches_every_section() {
        let user = UserId::new(5);
        let mut pstate = PersistentState::default();
        pstate.watchlist.add(user, "Akira", 0).unwrap();
        pstate
            .easter
            .guilds
            .entry(GuildId::new(1))
            .or_default()
            .entry(user)
            .or_default()
            .common = 3;

        assert!(pstate.forget_user(user));
        assert!(pstate.watchlist.lists.is_empty());
        assert!(pstate.easter.guilds[&GuildId::new(1)].is_empty());
        assert!(!pstate.forget_user(user));
    }
}
