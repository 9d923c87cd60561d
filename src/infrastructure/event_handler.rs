use poise::serenity_prelude::{Context, FullEvent, Interaction};
use tracing::{debug, info, warn};

use crate::{Error, events::eval_components::on_eval_component, infrastructure::botdata::Data};

pub async fn event_handler(
    ctx: &Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot, .. } => {
            info!(
                "Bot is ready. Logged in as {} in {} guilds",
                data_about_bot.user.name,
                data_about_bot.guilds.len()
            );
        }
        FullEvent::InteractionCreate {
            interaction: Interaction::Component(component),
        } => match on_eval_component(ctx, data, component).await {
            Ok(true) => {}
            Ok(false) => debug!("Ignoring component {}", component.data.custom_id),
            Err(e) => warn!("Component handler produced an error: {:?}", e),
        },
        _ => {}
    }
    Ok(())
}
