//! NBA live scoreboard

use super::{get_json, ApiError};

const SCOREBOARD_URL: &str =
    "https://cdn.nba.com/static/json/liveData/scoreboard/todaysScoreboard_00.json";

#[derive(serde::Deserialize)]
struct Envelope {
    scoreboard: Scoreboard,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scoreboard {
    pub game_date: String,
    pub games: Vec<Game>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub game_status_text: String,
    pub home_team: Team,
    pub away_team: Team,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub team_tricode: String,
    #[serde(default)]
    pub score: u32,
}

impl Game {
    /// `BOS 101 @ LAL 99 (Final)`
    pub fn summary(&self) -> String {
        format!(
            "{} {} @ {} {} ({})",
            self.away_team.team_tricode,
            self.away_team.score,
            self.home_team.team_tricode,
            self.home_team.score,
            self.game_status_text.trim()
        )
    }
}

pub async fn scoreboard(web: &reqwest::Client) -> Result<Scoreboard, ApiError> {
    let envelope: Envelope = get_json(web, SCOREBOARD_URL, &[]).await?;
    Ok(envelope.scoreboard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_scoreboard() {
        let envelope: Envelope = crate::api::decode(
            br#"{"meta": {}, "scoreboard": {"gameDate": "2026-10-19", "leagueId": "00",
                "games": [{"gameId": "1", "gameStatusText": "Final ",
                    "homeTeam": {"teamTricode": "LAL", "teamName": "Lakers", "score": 99},
                    "awayTeam": {"teamTricode": "BOS", "teamName": "Celtics", "score": 101}}]}}"#,
        )
        .unwrap();
        assert_eq!(envelope.scoreboard.game_date, "2026-10-19");
        assert_eq!(
            envelope.scoreboard.games[0].summary(),
            "BOS 101 @ LAL 99 (Final)"
        );
    }
}
