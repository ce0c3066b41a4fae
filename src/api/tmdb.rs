//! The Movie Database search API

use super::{get_json, ApiError};

const SEARCH_URL: &str = "https://api.themoviedb.org/3/search";
const POSTER_URL: &str = "https://image.tmdb.org/t/p/w500";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    fn path(self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

#[derive(serde::Deserialize)]
struct SearchResults {
    results: Vec<SearchHit>,
}

/// One search result.  Movies and shows name their fields differently.
#[derive(serde::Deserialize)]
pub struct SearchHit {
    pub id: u64,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(alias = "first_air_date", default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u64,
    pub poster_path: Option<String>,
}

impl SearchHit {
    pub fn year(&self) -> Option<&str> {
        self.release_date
            .as_deref()
            .and_then(|date| date.get(..4))
            .filter(|year| year.chars().all(|c| c.is_ascii_digit()))
    }

    pub fn poster_url(&self) -> Option<String> {
        self.poster_path
            .as_ref()
            .map(|path| format!("{}{}", POSTER_URL, path))
    }

    pub fn page_url(&self, kind: MediaKind) -> String {
        format!("https://www.themoviedb.org/{}/{}", kind.path(), self.id)
    }
}

/// Best match for `query`, if any
pub async fn search(
    web: &reqwest::Client,
    api_key: &str,
    kind: MediaKind,
    query: &str,
) -> Result<Option<SearchHit>, ApiError> {
    let url = format!("{}/{}", SEARCH_URL, kind.path());
    let results: SearchResults = get_json(
        web,
        &url,
        &[("api_key", api_key), ("query", query), ("include_adult", "false")],
    )
    .await?;
    Ok(results.results.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_movie_and_tv_hits() {
        let movies: SearchResults = crate::api::decode(
            br#"{"page": 1, "results": [{"id": 603, "title": "The Matrix",
                "release_date": "1999-03-30", "overview": "Neo.", "vote_average": 8.2,
                "vote_count": 25000, "poster_path": "/m.jpg"}]}"#,
        )
        .unwrap();
        let hit = &movies.results[0];
        assert_eq!(hit.title, "The Matrix");
        assert_eq!(hit.year(), Some("1999"));
        assert_eq!(hit.poster_url().unwrap(), "https://image.tmdb.org/t/p/w500/m.jpg");
        assert_eq!(
            hit.page_url(MediaKind::Movie),
            "https://www.themoviedb.org/movie/603"
        );

        let shows: SearchResults = crate::api::decode(
            br#"{"results": [{"id": 1396, "name": "Breaking Bad",
                "first_air_date": "2008-01-20", "poster_path": null}]}"#,
        )
        .unwrap();
        let hit = &shows.results[0];
        assert_eq!(hit.title, "Breaking Bad");
        assert_eq!(hit.year(), Some("2008"));
        assert!(hit.poster_url().is_none());
        assert_eq!(hit.vote_count, 0);
    }

    #[test]
    fn blank_dates_have_no_year() {
        let hit: SearchHit =
            crate::api::decode(br#"{"id": 1, "title": "Untitled", "release_date": ""}"#).unwrap();
        assert_eq!(hit.year(), None);
    }
}
