use crate::{
    api::{nager, ApiError},
    event::*,
    plugin::*,
};
use anyhow::Result;
use chrono::NaiveDate;

const SHOWN: usize = 5;

/// Upcoming public holidays for a country
pub struct Holidays;

fn format_holiday(holiday: &nager::Holiday, today: NaiveDate) -> String {
    let days = (holiday.date - today).num_days();
    let when = match days {
        0 => "today".to_owned(),
        1 => "tomorrow".to_owned(),
        n if n > 1 => format!("in {} days", n),
        _ => "recently".to_owned(),
    };
    let name = if holiday.local_name == holiday.name {
        holiday.name.clone()
    } else {
        format!("{} ({})", holiday.name, holiday.local_name)
    };
    format!("**{}** {}, {}", holiday.date.format("%a %d %b %Y"), name, when)
}

#[serenity::async_trait]
impl Plugin for Holidays {
    fn name(&self) -> &'static str {
        "holidays"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_lines(
                ctx,
                &["holidays [country code] - next public holidays, e.g. `holidays DE`"],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let requested = match args.first() {
            Some(code) => code.to_string(),
            None => ctx.cfg.read().await.holidays.default_country.clone(),
        };
        let Some(country) = nager::normalize_country(&requested) else {
            msg.reply(
                ctx.cache_http,
                "Use a two-letter country code, like `US` or `DE`.",
            )
            .await?;
            return Ok(EventHandled::Yes);
        };

        let reply = match nager::next_holidays(ctx.web, &country).await {
            Ok(holidays) if holidays.is_empty() => {
                format!("No upcoming holidays known for {}.", country)
            }
            Ok(holidays) => {
                let today = chrono::Utc::now().date_naive();
                let mut reply = format!("**Upcoming holidays in {}**\n", country);
                for holiday in holidays.iter().take(SHOWN) {
                    reply.push_str(&format_holiday(holiday, today));
                    reply.push('\n');
                }
                reply
            }
            Err(ApiError::NotFound) => format!("No holiday calendar for {}.", country),
            Err(e) => format!("Couldn't fetch holidays: {}.", e),
        };
        msg.reply(ctx.cache_http, reply).await?;
        Ok(EventHandled::Yes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holiday(date: &str, local_name: &str, name: &str) -> nager::Holiday {
        nager::Holiday {
            date: date.parse().unwrap(),
            local_name: local_name.to_owned(),
            name: name.to_owned(),
        }
    }

    #[test]
    fn formats_relative_dates() {
        let today = NaiveDate::from_ymd_opt(2026, 12, 24).unwrap();
        assert_eq!(
            format_holiday(&holiday("2026-12-25", "Erster Weihnachtstag", "Christmas Day"), today),
            "**Fri 25 Dec 2026** Christmas Day (Erster Weihnachtstag), tomorrow"
        );
        assert_eq!(
            format_holiday(&holiday("2026-12-24", "Christmas Eve", "Christmas Eve"), today),
            "**Thu 24 Dec 2026** Christmas Eve, today"
        );
        assert!(format_holiday(&holiday("2027-01-01", "Neujahr", "New Year's Day"), today)
            .ends_with("in 8 days"));
    }
}
