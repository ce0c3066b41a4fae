//! nekos.best, anime reaction images by category

use super::{get_json, ApiError};

#[derive(serde::Deserialize)]
struct Response {
    results: Vec<Image>,
}

#[derive(serde::Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub anime_name: Option<String>,
}

pub async fn fetch(
    web: &reqwest::Client,
    api_url: &str,
    category: &str,
) -> Result<Image, ApiError> {
    let response: Response = get_json(web, &format!("{}/{}", api_url, category), &[]).await?;
    response.results.into_iter().next().ok_or(ApiError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_gif_results() {
        let response: Response = crate::api::decode(
            br#"{"results": [{"anime_name": "K-On!", "url": "https://nekos.best/a.gif"}]}"#,
        )
        .unwrap();
        assert_eq!(response.results[0].url, "https://nekos.best/a.gif");
        assert_eq!(response.results[0].anime_name.as_deref(), Some("K-On!"));
    }
}
