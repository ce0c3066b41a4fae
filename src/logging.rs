//! Logging to the terminal with colors

use serenity::all::Http;
use std::borrow::Cow;
use std::io::IsTerminal;
use std::sync::{Arc, LazyLock};

const DEFAULT: &str = "\x1b[0m";
const FG_BLUE: &str = "\x1b[38;5;33m";
const FG_CYAN: &str = "\x1b[36m";
const FG_GRAY: &str = "\x1b[90m";
const FG_GREEN: &str = "\x1b[32m";
const FG_MAGENTA: &str = "\x1b[35m";
const FG_RED: &str = "\x1b[31m";
const FG_YELLOW: &str = "\x1b[33m";

pub enum Color {
    Default,
    Event,
    Internal,
    Error,
    User,
    Channel,
    Guild,
    Glue,
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        // Only print colors when printing to a terminal.  This won't change during the program's
        // execution, so we can cache it.
        static STDOUT_IS_TERMINAL: LazyLock<bool> =
            LazyLock::new(|| std::io::stdout().is_terminal());

        if !*STDOUT_IS_TERMINAL {
            return Ok(());
        }

        f.write_str(match self {
            Color::Default => DEFAULT,
            Color::Event => FG_YELLOW,
            Color::Internal => FG_MAGENTA,
            Color::Error => FG_RED,
            Color::User => FG_GREEN,
            Color::Channel => FG_CYAN,
            Color::Guild => FG_BLUE,
            Color::Glue => FG_GRAY,
        })
    }
}

/// Shared body of the `log_*` macros: a colored sigil, then the formatted line.
#[doc(hidden)]
#[macro_export]
macro_rules! __log_line {
    ($print:ident, $sigil:literal, $color:ident, $fmtstr:expr $(, $args:expr)* $(,)?) => {{
        $print!(
            concat!("{}", $sigil, "{} ", $fmtstr),
            $crate::logging::Color::$color,
            $crate::logging::Color::Default
            $(, $args)*
        )
    }};
}

/// Something happened on Discord
#[macro_export]
macro_rules! log_event {
    ($fmtstr:expr $(, $args:expr)* $(,)?) => {
        $crate::__log_line!(println, "*", Event, $fmtstr $(, $args)*)
    };
}

/// Something happened inside the bot, e.g. a scheduled action or an outbound request
#[macro_export]
macro_rules! log_internal {
    ($fmtstr:expr $(, $args:expr)* $(,)?) => {
        $crate::__log_line!(println, "+", Internal, $fmtstr $(, $args)*)
    };
}

/// Something went wrong but the bot carries on
#[macro_export]
macro_rules! log_error {
    ($fmtstr:expr $(, $args:expr)* $(,)?) => {
        $crate::__log_line!(eprintln, "!", Error, $fmtstr $(, $args)*)
    };
}

pub trait PrintColor {
    fn color(&self) -> String;
}

#[serenity::async_trait]
pub trait AsyncPrintColor {
    async fn color(&self, http: &Arc<Http>) -> String;
}

fn paint(color: Color, text: &str) -> String {
    format!("{}{}{}", color, text, Color::Default)
}

// Field separator
pub struct Glue;
impl PrintColor for Glue {
    fn color(&self) -> String {
        paint(Color::Glue, ":")
    }
}

impl PrintColor for serenity::all::CurrentUser {
    fn color(&self) -> String {
        paint(Color::User, &self.name)
    }
}

impl PrintColor for serenity::all::User {
    fn color(&self) -> String {
        paint(Color::User, &self.name)
    }
}

#[serenity::async_trait]
impl AsyncPrintColor for Option<serenity::all::UserId> {
    async fn color(&self, http: &Arc<Http>) -> String {
        let name = match self {
            Some(user_id) => match user_id.to_user(http).await {
                Ok(user) => Cow::Owned(user.name),
                Err(_) => Cow::Borrowed("<unknown-user>"),
            },
            None => Cow::Borrowed("<unknown-user>"),
        };

        paint(Color::User, &name)
    }
}

#[serenity::async_trait]
impl AsyncPrintColor for serenity::all::ChannelId {
    async fn color(&self, http: &Arc<Http>) -> String {
        match self.name(http).await {
            Ok(name) => paint(Color::Channel, &name),
            Err(_) => paint(Color::Channel, "<unknown-channel>"),
        }
    }
}

#[serenity::async_trait]
impl AsyncPrintColor for Option<serenity::all::GuildId> {
    async fn color(&self, http: &Arc<Http>) -> String {
        let name = match self {
            Some(guild_id) => match guild_id.to_partial_guild(http).await {
                Ok(guild) => Cow::Owned(guild.name),
                Err(_) => Cow::Borrowed("<unknown-guild>"),
            },
            None => Cow::Borrowed("<direct-message>"),
        };

        paint(Color::Guild, &name)
    }
}
