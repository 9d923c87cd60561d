/*!

Handles the Rerun and Delete buttons attached to eval results.

*/

use poise::serenity_prelude::{
    ComponentInteraction, Context, CreateInteractionResponse, CreateInteractionResponseMessage,
    EditInteractionResponse, UserId,
};
use tracing::{debug, trace};

use crate::{
    Error,
    commands::eval::{EvalAction, prepare, run},
    infrastructure::{botdata::Data, util::error_embed},
};

async fn respond_ephemeral(
    ctx: &Context,
    component: &ComponentInteraction,
    message: CreateInteractionResponseMessage,
) -> Result<(), Error> {
    component
        .create_response(
            ctx,
            CreateInteractionResponse::Message(message.ephemeral(true)),
        )
        .await?;
    Ok(())
}

/// Refusal shown when `user` presses a button on someone else's eval.
pub fn ownership_refusal(action: &EvalAction, user: UserId) -> Option<&'static str> {
    if action.owner() == user {
        return None;
    }
    Some(match action {
        EvalAction::Rerun { .. } => "You can only rerun your own evals",
        EvalAction::Delete { .. } => "You can only delete your own evals",
    })
}

/// Returns `Ok(false)` when the component does not belong to an eval result.
pub async fn on_eval_component(
    ctx: &Context,
    data: &Data,
    component: &ComponentInteraction,
) -> Result<bool, Error> {
    let Some(action) = EvalAction::parse(&component.data.custom_id) else {
        return Ok(false);
    };
    trace!("Eval component {:?} pressed by {}", action, component.user.id);

    if let Some(refusal) = ownership_refusal(&action, component.user.id) {
        respond_ephemeral(
            ctx,
            component,
            CreateInteractionResponseMessage::new().content(refusal),
        )
        .await?;
        return Ok(true);
    }

    match action {
        EvalAction::Rerun { source, .. } => {
            let message = match component.channel_id.message(ctx, source).await {
                Ok(message) => message,
                Err(e) => {
                    debug!("Failed to fetch eval source {}: {}", source, e);
                    respond_ephemeral(
                        ctx,
                        component,
                        CreateInteractionResponseMessage::new()
                            .embed(error_embed("The original message could not be found")),
                    )
                    .await?;
                    return Ok(true);
                }
            };
            let source = match prepare(&data.piston, &message.content).await {
                Ok(source) => source,
                Err(e) => {
                    respond_ephemeral(
                        ctx,
                        component,
                        CreateInteractionResponseMessage::new().embed(error_embed(e.to_string())),
                    )
                    .await?;
                    return Ok(true);
                }
            };
            component
                .create_response(ctx, CreateInteractionResponse::Acknowledge)
                .await?;
            let embed = run(&data.piston, &source).await;
            component
                .edit_response(ctx, EditInteractionResponse::new().embed(embed))
                .await?;
            debug!("Reran eval of message {}", message.id);
        }
        EvalAction::Delete { .. } => {
            component
                .create_response(ctx, CreateInteractionResponse::Acknowledge)
                .await?;
            component.message.delete(ctx).await?;
            debug!("Deleted eval result {}", component.message.id);
        }
    }
    Ok(true)
}
