use poise::{CreateReply, serenity_prelude::CreateEmbed};
use tracing::{trace, warn};

use crate::{
    Context, Error,
    contributors::CycleReport,
    infrastructure::{
        colors,
        util::{error_reply, send_reply},
    },
};

fn report_embed(report: &CycleReport) -> CreateEmbed {
    CreateEmbed::new()
        .title("Contributor sync")
        .field("Users", report.users.to_string(), true)
        .field("Published", report.published.to_string(), true)
        .field("Failed", report.failed.to_string(), true)
        .color(if report.failed > 0 {
            colors::orange()
        } else {
            colors::green()
        })
}

/// Refreshes contributor roles of all linked users now.
#[poise::command(
    slash_command,
    prefix_command,
    rename = "contributor-sync",
    owners_only,
    hide_in_help,
    category = "Management"
)]
pub async fn contributor_sync(ctx: Context<'_>) -> Result<(), Error> {
    trace!("contributor sync triggered by {}", ctx.author().id);
    ctx.defer_ephemeral().await?;
    match ctx.data().contributor_sync.run_cycle().await {
        Ok(report) => {
            send_reply(
                ctx,
                CreateReply::default()
                    .embed(report_embed(&report))
                    .ephemeral(true),
            )
            .await
        }
        Err(e) => {
            warn!("Manual contributor sync failed: {}", e);
            send_reply(ctx, error_reply(e.to_string())).await
        }
    }
}
