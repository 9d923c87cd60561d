use std::time::{Duration, Instant};

use poise::{
    CreateReply,
    serenity_prelude::{
        self as serenity, ButtonStyle, CreateActionRow, CreateButton, CreateEmbed,
        CreateEmbedFooter, MessageId, UserId,
    },
};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    Context, Error,
    infrastructure::{
        colors,
        util::{EMBED_DESCRIPTION_LIMIT, error_reply, send_reply, truncate},
    },
    lazy_regex,
    piston::{PistonClient, PistonError, resolve_runtime},
};

lazy_regex! { CODE_BLOCK_REGEX, r"(?s)```(?P<language>\w+)\n(?P<code>.+?)```" }

const RERUN_PREFIX: &str = "eval-rerun";
const DELETE_PREFIX: &str = "eval-delete";

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("No code block with a language found in this message")]
    NoCodeBlock,
    #[error("Language {0} is not supported")]
    Unsupported(String),
    #[error("Failed to fetch runtimes: {0}")]
    Runtimes(#[from] PistonError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock<'a> {
    pub language: &'a str,
    pub code: &'a str,
}

/// Extracts the first fenced code block that carries a language tag.
pub fn parse_code_block(content: &str) -> Option<CodeBlock<'_>> {
    let captures = CODE_BLOCK_REGEX.captures(content)?;
    Some(CodeBlock {
        language: captures.name("language")?.as_str(),
        code: captures.name("code")?.as_str(),
    })
}

/// Code ready to be sent to Piston under its canonical language name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalSource {
    pub language: String,
    pub code: String,
}

/// Parses `content` and resolves its language tag against the runtimes Piston offers.
pub async fn prepare(piston: &PistonClient, content: &str) -> Result<EvalSource, EvalError> {
    let block = parse_code_block(content).ok_or(EvalError::NoCodeBlock)?;
    let runtimes = piston.runtimes().await?;
    let runtime = resolve_runtime(&runtimes, block.language)
        .ok_or_else(|| EvalError::Unsupported(block.language.to_string()))?;
    trace!("Resolved {} to {}", block.language, runtime.language);
    Ok(EvalSource {
        language: runtime.language.clone(),
        code: block.code.to_string(),
    })
}

fn format_duration(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}

fn result_embed(success: bool, body: &str, duration: Duration) -> CreateEmbed {
    let body = if body.trim().is_empty() {
        "*no output*".to_string()
    } else {
        // Leaves room for the code fence around the output.
        format!("```\n{}\n```", truncate(body, EMBED_DESCRIPTION_LIMIT - 8))
    };
    CreateEmbed::new()
        .title("Eval")
        .description(body)
        .field("Status", if success { "Success" } else { "Error" }, true)
        .field("Duration", format_duration(duration), true)
        .color(if success { colors::green() } else { colors::red() })
}

/// Executes `source` and renders the outcome. Execution failures are rendered, not returned.
pub async fn run(piston: &PistonClient, source: &EvalSource) -> CreateEmbed {
    let started = Instant::now();
    let result = piston.execute(&source.language, &source.code).await;
    let elapsed = started.elapsed();
    match result {
        Ok(execution) => {
            debug!("Eval of {} finished in {:?}", source.language, elapsed);
            result_embed(true, execution.output(), elapsed).footer(CreateEmbedFooter::new(
                format!("{} {}", execution.language, execution.version),
            ))
        }
        Err(e) => {
            debug!("Eval of {} failed: {}", source.language, e);
            result_embed(false, &e.to_string(), elapsed)
        }
    }
}

/// Button actions attached to an eval result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalAction {
    Rerun { source: MessageId, owner: UserId },
    Delete { owner: UserId },
}

impl EvalAction {
    pub fn owner(&self) -> UserId {
        match self {
            Self::Rerun { owner, .. } | Self::Delete { owner } => *owner,
        }
    }

    pub fn custom_id(&self) -> String {
        match self {
            Self::Rerun { source, owner } => format!("{RERUN_PREFIX}:{source}:{owner}"),
            Self::Delete { owner } => format!("{DELETE_PREFIX}:{owner}"),
        }
    }

    /// Parses a component custom id. Returns `None` for ids that do not belong to eval.
    pub fn parse(custom_id: &str) -> Option<Self> {
        let mut parts = custom_id.split(':');
        let action = match parts.next()? {
            RERUN_PREFIX => Self::Rerun {
                source: MessageId::new(parts.next()?.parse().ok().filter(|id| *id != 0)?),
                owner: UserId::new(parts.next()?.parse().ok().filter(|id| *id != 0)?),
            },
            DELETE_PREFIX => Self::Delete {
                owner: UserId::new(parts.next()?.parse().ok().filter(|id| *id != 0)?),
            },
            _ => return None,
        };
        parts.next().is_none().then_some(action)
    }
}

pub fn eval_buttons(source: MessageId, owner: UserId) -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![
        CreateButton::new(EvalAction::Rerun { source, owner }.custom_id())
            .label("Rerun")
            .style(ButtonStyle::Primary),
        CreateButton::new(EvalAction::Delete { owner }.custom_id())
            .label("Delete")
            .style(ButtonStyle::Danger),
    ])]
}

/// Runs the code block in a message
#[poise::command(context_menu_command = "Eval", category = "Eval")]
pub async fn eval(ctx: Context<'_>, message: serenity::Message) -> Result<(), Error> {
    trace!("eval executed on message {}", message.id);
    let piston = &ctx.data().piston;
    let source = match prepare(piston, &message.content).await {
        Ok(source) => source,
        Err(e) => return send_reply(ctx, error_reply(e.to_string())).await,
    };

    ctx.defer().await?;
    let embed = run(piston, &source).await;
    let reply = CreateReply::default()
        .embed(embed)
        .components(eval_buttons(message.id, ctx.author().id));
    send_reply(ctx, reply).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_code_block() {
        let content = "look at this\n```go\npackage main\n\nfunc main() {}\n```\nneat";
        assert_eq!(
            parse_code_block(content),
            Some(CodeBlock {
                language: "go",
                code: "package main\n\nfunc main() {}\n",
            })
        );
    }

    #[test]
    fn takes_first_of_several_blocks() {
        let content = "```py\nprint(1)\n```\n```rs\nfn main() {}\n```";
        let block = parse_code_block(content).unwrap();
        assert_eq!(block.language, "py");
        assert_eq!(block.code, "print(1)\n");
    }

    #[test]
    fn requires_language_tag() {
        assert_eq!(parse_code_block("```\nprint(1)\n```"), None);
        assert_eq!(parse_code_block("no code here"), None);
    }

    #[test]
    fn custom_ids_round_trip() {
        let rerun = EvalAction::Rerun {
            source: MessageId::new(11),
            owner: UserId::new(22),
        };
        assert_eq!(rerun.custom_id(), "eval-rerun:11:22");
        assert_eq!(EvalAction::parse(&rerun.custom_id()), Some(rerun));

        let delete = EvalAction::Delete {
            owner: UserId::new(22),
        };
        assert_eq!(EvalAction::parse("eval-delete:22"), Some(delete));
        assert_eq!(delete.owner(), UserId::new(22));
    }

    #[test]
    fn ignores_foreign_custom_ids() {
        assert_eq!(EvalAction::parse("paginator:next"), None);
        assert_eq!(EvalAction::parse("eval-rerun:11"), None);
        assert_eq!(EvalAction::parse("eval-delete:0"), None);
        assert_eq!(EvalAction::parse("eval-delete:22:33"), None);
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::from_millis(1234)), "1.23s");
    }
}
