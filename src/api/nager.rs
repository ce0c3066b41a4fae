//! Nager.Date public holiday calendar

use super::{get_json, ApiError};
use chrono::NaiveDate;

const API_URL: &str = "https://date.nager.at/api/v3/NextPublicHolidays";

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holiday {
    pub date: NaiveDate,
    pub local_name: String,
    pub name: String,
}

/// ISO 3166-1 alpha-2, upper-cased; `None` for anything else
pub fn normalize_country(code: &str) -> Option<String> {
    let code = code.trim();
    (code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| code.to_ascii_uppercase())
}

pub async fn next_holidays(
    web: &reqwest::Client,
    country: &str,
) -> Result<Vec<Holiday>, ApiError> {
    let country = normalize_country(country).ok_or(ApiError::NotFound)?;
    get_json(web, &format!("{}/{}", API_URL, country), &[]).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_holidays() {
        let holidays: Vec<Holiday> = crate::api::decode(
            br#"[{"date": "2026-12-25", "localName": "Christmas Day", "name": "Christmas Day",
                  "countryCode": "US", "fixed": false, "global": true, "counties": null,
                  "launchYear": null, "types": ["Public"]}]"#,
        )
        .unwrap();
        assert_eq!(holidays[0].date, NaiveDate::from_ymd_opt(2026, 12, 25).unwrap());
        assert_eq!(holidays[0].local_name, "Christmas Day");
    }

    #[test]
    fn normalizes_country_codes() {
        assert_eq!(normalize_country(" de "), Some("DE".to_owned()));
        assert_eq!(normalize_country("USA"), None);
        assert_eq!(normalize_country("1a"), None);
    }
}
