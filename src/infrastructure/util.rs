use std::fmt::Debug;

use poise::{CreateReply, serenity_prelude::CreateEmbed};
use tracing::trace;

use crate::{Context as ButlerContext, Error, infrastructure::colors};

/// Creates a lazily initialized static regex variable with a constant regex expression.
#[macro_export]
macro_rules! lazy_regex {
    ($name:ident, $value:expr) => {
        static $name: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($value).expect("Regex contains body"));
    };
}

/// Discord's limit for embed descriptions.
pub const EMBED_DESCRIPTION_LIMIT: usize = 4096;

pub struct DebuggableReply(CreateReply);

impl DebuggableReply {
    pub fn new(value: &CreateReply) -> Self {
        Self(value.clone())
    }
}

impl Debug for DebuggableReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateReply")
            .field("content", &self.0.content)
            .field("embeds", &self.0.embeds)
            .field("ephemeral", &self.0.ephemeral)
            .field("components", &self.0.components)
            .finish()
    }
}

/// Sends `reply` in response to the invoking command.
pub async fn send_reply(ctx: ButlerContext<'_>, reply: CreateReply) -> Result<(), Error> {
    trace!("Sending reply: {:?}", DebuggableReply::new(&reply));
    ctx.send(reply).await?;
    Ok(())
}

pub fn error_embed(message: impl Into<String>) -> CreateEmbed {
    CreateEmbed::new()
        .title("Error")
        .description(message)
        .color(colors::red())
}

/// Ephemeral red embed for failures the user should see.
pub fn error_reply(message: impl Into<String>) -> CreateReply {
    CreateReply::default()
        .embed(error_embed(message))
        .ephemeral(true)
}

/// Ephemeral plain confirmation message.
pub fn ok_reply(message: impl Into<String>) -> CreateReply {
    CreateReply::default().content(message).ephemeral(true)
}

/// Ephemeral embed listing `items` as bullet points.
pub fn list_reply<I, S>(title: &str, items: I) -> CreateReply
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let body: String = items
        .into_iter()
        .map(|item| format!("• {}\n", item.as_ref()))
        .collect();
    let body = if body.is_empty() {
        "*none*".to_string()
    } else {
        truncate(&body, EMBED_DESCRIPTION_LIMIT)
    };
    CreateReply::default()
        .embed(
            CreateEmbed::new()
                .title(title)
                .description(body)
                .color(colors::slate()),
        )
        .ephemeral(true)
}

/// Shortens `text` to at most `max` characters, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
