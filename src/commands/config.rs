use poise::serenity_prelude::{self as serenity, CreateWebhook, WebhookId};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::{
    Context, Error,
    config::{ConfigError, ConfigService, MAX_TRACKED_REPOS, ReleaseBinding, RepoRef, RepoRefError},
    contributors::schema_entries,
    infrastructure::util::{error_reply, list_reply, ok_reply, send_reply},
    role_connections::{PublishError, RoleConnectionPublisher},
};

/// Failures of `/config` edits that are shown to the invoking user.
#[derive(Debug, Error)]
pub enum ConfigCommandError {
    #[error("`{0}` does not exist")]
    DoesNotExist(String),
    #[error("`{0}` already exists")]
    AlreadyExists(String),
    #[error("At most {MAX_TRACKED_REPOS} repositories can be tracked")]
    TooManyRepos,
    #[error("{0}")]
    InvalidRepo(#[from] RepoRefError),
    #[error("Failed to save config: {0}")]
    Config(#[from] ConfigError),
    #[error("Saved, but failed to register role metadata: {0}")]
    Schema(#[from] PublishError),
}

async fn register_schema(
    publisher: &dyn RoleConnectionPublisher,
    repos: &[RepoRef],
) -> Result<(), ConfigCommandError> {
    publisher
        .register_metadata_schema(&schema_entries(repos))
        .await?;
    info!("Registered role metadata for {} repositories", repos.len());
    Ok(())
}

/// Starts tracking `repo` and registers the resulting metadata schema.
pub async fn add_tracked_repo(
    config: &ConfigService,
    publisher: &dyn RoleConnectionPublisher,
    repo: &str,
) -> Result<RepoRef, ConfigCommandError> {
    let repo: RepoRef = repo.parse()?;
    let _sequence = config.lock_sequence().await;
    let repos = config
        .mutate(|config| {
            if config.tracks_repo(&repo) {
                return Err(ConfigCommandError::AlreadyExists(repo.to_string()));
            }
            if config.contributor_repos.len() >= MAX_TRACKED_REPOS {
                return Err(ConfigCommandError::TooManyRepos);
            }
            config.contributor_repos.push(repo.clone());
            Ok(config.contributor_repos.clone())
        })
        .await?;
    register_schema(publisher, &repos).await?;
    Ok(repo)
}

/// Stops tracking `repo` and registers the resulting metadata schema.
pub async fn remove_tracked_repo(
    config: &ConfigService,
    publisher: &dyn RoleConnectionPublisher,
    repo: &str,
) -> Result<RepoRef, ConfigCommandError> {
    let missing = || ConfigCommandError::DoesNotExist(repo.to_string());
    let repo: RepoRef = repo.parse().map_err(|_| missing())?;
    let _sequence = config.lock_sequence().await;
    let repos = config
        .mutate(|config| {
            let before = config.contributor_repos.len();
            config.contributor_repos.retain(|tracked| *tracked != repo);
            if config.contributor_repos.len() == before {
                return Err(missing());
            }
            Ok(config.contributor_repos.clone())
        })
        .await?;
    register_schema(publisher, &repos).await?;
    Ok(repo)
}

/// Points `alias` at `module`, replacing any previous target.
pub async fn add_alias(
    config: &ConfigService,
    module: &str,
    alias: &str,
) -> Result<Option<String>, ConfigCommandError> {
    config
        .mutate(|config| Ok(config.aliases.insert(alias.to_string(), module.to_string())))
        .await
}

pub async fn remove_alias(config: &ConfigService, alias: &str) -> Result<String, ConfigCommandError> {
    config
        .mutate(|config| {
            config
                .aliases
                .remove(alias)
                .ok_or_else(|| ConfigCommandError::DoesNotExist(alias.to_string()))
        })
        .await
}

pub async fn remove_release(
    config: &ConfigService,
    name: &str,
) -> Result<ReleaseBinding, ConfigCommandError> {
    config
        .mutate(|config| {
            config
                .releases
                .remove(name)
                .ok_or_else(|| ConfigCommandError::DoesNotExist(name.to_string()))
        })
        .await
}

async fn reply_result<T>(
    ctx: Context<'_>,
    result: Result<T, ConfigCommandError>,
    success: impl FnOnce(T) -> String,
) -> Result<(), Error> {
    match result {
        Ok(value) => send_reply(ctx, ok_reply(success(value))).await,
        Err(e) => {
            debug!("Config edit rejected: {}", e);
            send_reply(ctx, error_reply(e.to_string())).await
        }
    }
}

/// Manages the bot configuration.
#[poise::command(
    slash_command,
    required_permissions = "ADMINISTRATOR",
    default_member_permissions = "ADMINISTRATOR",
    guild_only,
    category = "Management",
    subcommands("aliases", "releases", "contributor_repos"),
    subcommand_required
)]
pub async fn config(_: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Manages module aliases.
///
/// Aliases are only stored in the config file here. The documentation lookup service reads
/// them from there to resolve short module names.
#[poise::command(
    slash_command,
    required_permissions = "ADMINISTRATOR",
    guild_only,
    subcommands("aliases_add", "aliases_remove", "aliases_list"),
    subcommand_required
)]
pub async fn aliases(_: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Adds an alias for a module.
#[poise::command(slash_command, rename = "add", required_permissions = "ADMINISTRATOR", guild_only)]
pub async fn aliases_add(
    ctx: Context<'_>,
    #[description = "Module the alias points to"] module: String,
    #[description = "Alias name"] alias: String,
) -> Result<(), Error> {
    trace!("adding alias {} -> {}", alias, module);
    let result = add_alias(&ctx.data().config, &module, &alias).await;
    reply_result(ctx, result, |previous| match previous {
        Some(previous) => format!("Alias `{alias}` now points to `{module}` instead of `{previous}`"),
        None => format!("Added alias `{alias}` for `{module}`"),
    })
    .await
}

/// Removes a module alias.
#[poise::command(slash_command, rename = "remove", required_permissions = "ADMINISTRATOR", guild_only)]
pub async fn aliases_remove(
    ctx: Context<'_>,
    #[description = "Alias name"] alias: String,
) -> Result<(), Error> {
    trace!("removing alias {}", alias);
    let result = remove_alias(&ctx.data().config, &alias).await;
    reply_result(ctx, result, |module| {
        format!("Removed alias `{alias}` for `{module}`")
    })
    .await
}

/// Lists module aliases.
#[poise::command(slash_command, rename = "list", required_permissions = "ADMINISTRATOR", guild_only)]
pub async fn aliases_list(ctx: Context<'_>) -> Result<(), Error> {
    let config = ctx.data().config.get().await;
    let items = config
        .aliases
        .iter()
        .map(|(alias, module)| format!("`{alias}` → `{module}`"));
    send_reply(ctx, list_reply("Aliases", items)).await
}

/// Manages release announcement webhooks.
#[poise::command(
    slash_command,
    required_permissions = "ADMINISTRATOR",
    guild_only,
    subcommands("releases_add", "releases_remove", "releases_list"),
    subcommand_required
)]
pub async fn releases(_: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Announces releases in a channel through a new webhook.
#[poise::command(slash_command, rename = "add", required_permissions = "ADMINISTRATOR", guild_only)]
pub async fn releases_add(
    ctx: Context<'_>,
    #[description = "Name of the release feed"] name: String,
    #[description = "Channel to announce releases in"]
    #[channel_types("Text", "News")]
    channel: serenity::GuildChannel,
    #[description = "Role to ping on new releases"] ping_role: serenity::Role,
) -> Result<(), Error> {
    trace!("adding release {} in {}", name, channel.id);
    let data = ctx.data();
    if data.config.get().await.releases.contains_key(&name) {
        let e = ConfigCommandError::AlreadyExists(name);
        return send_reply(ctx, error_reply(e.to_string())).await;
    }

    ctx.defer_ephemeral().await?;
    let webhook = channel
        .id
        .create_webhook(ctx, CreateWebhook::new(format!("{name} releases")))
        .await?;
    let binding = ReleaseBinding {
        webhook_id: webhook.id.get(),
        webhook_url: webhook.url()?,
        ping_role: ping_role.id.get(),
    };

    let result = data
        .config
        .mutate(|config| {
            if config.releases.contains_key(&name) {
                return Err(ConfigCommandError::AlreadyExists(name.clone()));
            }
            config.releases.insert(name.clone(), binding);
            Ok(())
        })
        .await;
    if result.is_err() {
        delete_webhook(ctx, webhook.id).await;
    }
    reply_result(ctx, result, |_| {
        format!("Releases for `{name}` will be announced in <#{}>", channel.id)
    })
    .await
}

async fn delete_webhook(ctx: Context<'_>, webhook_id: WebhookId) {
    match ctx
        .http()
        .delete_webhook(webhook_id, Some("Release feed removed"))
        .await
    {
        Ok(()) => debug!("Deleted webhook {}", webhook_id),
        Err(e) => warn!("Failed to delete webhook {}: {}", webhook_id, e),
    }
}

/// Stops announcing releases and deletes the webhook.
#[poise::command(slash_command, rename = "remove", required_permissions = "ADMINISTRATOR", guild_only)]
pub async fn releases_remove(
    ctx: Context<'_>,
    #[description = "Name of the release feed"] name: String,
) -> Result<(), Error> {
    trace!("removing release {}", name);
    let result = remove_release(&ctx.data().config, &name).await;
    if let Ok(binding) = &result {
        delete_webhook(ctx, WebhookId::new(binding.webhook_id)).await;
    }
    reply_result(ctx, result, |_| format!("Removed release feed `{name}`")).await
}

/// Lists release feeds.
#[poise::command(slash_command, rename = "list", required_permissions = "ADMINISTRATOR", guild_only)]
pub async fn releases_list(ctx: Context<'_>) -> Result<(), Error> {
    let config = ctx.data().config.get().await;
    let items = config
        .releases
        .iter()
        .map(|(name, binding)| format!("`{name}` pings <@&{}>", binding.ping_role));
    send_reply(ctx, list_reply("Release feeds", items)).await
}

/// Manages repositories whose contributors get linked role metadata.
#[poise::command(
    slash_command,
    rename = "contributor-repos",
    required_permissions = "ADMINISTRATOR",
    guild_only,
    subcommands("repos_add", "repos_remove", "repos_list"),
    subcommand_required
)]
pub async fn contributor_repos(_: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Tracks contributions to a GitHub repository.
#[poise::command(slash_command, rename = "add", required_permissions = "ADMINISTRATOR", guild_only)]
pub async fn repos_add(
    ctx: Context<'_>,
    #[description = "Repository as owner/name"] repo: String,
) -> Result<(), Error> {
    trace!("adding contributor repo {}", repo);
    ctx.defer_ephemeral().await?;
    let data = ctx.data();
    let result = add_tracked_repo(&data.config, data.role_connections.as_ref(), &repo).await;
    reply_result(ctx, result, |repo| {
        format!("Now tracking contributions to `{repo}`")
    })
    .await
}

/// Stops tracking contributions to a GitHub repository.
#[poise::command(slash_command, rename = "remove", required_permissions = "ADMINISTRATOR", guild_only)]
pub async fn repos_remove(
    ctx: Context<'_>,
    #[description = "Repository as owner/name"] repo: String,
) -> Result<(), Error> {
    trace!("removing contributor repo {}", repo);
    ctx.defer_ephemeral().await?;
    let data = ctx.data();
    let result = remove_tracked_repo(&data.config, data.role_connections.as_ref(), &repo).await;
    reply_result(ctx, result, |repo| {
        format!("No longer tracking contributions to `{repo}`")
    })
    .await
}

/// Lists tracked repositories.
#[poise::command(slash_command, rename = "list", required_permissions = "ADMINISTRATOR", guild_only)]
pub async fn repos_list(ctx: Context<'_>) -> Result<(), Error> {
    let config = ctx.data().config.get().await;
    let items = config
        .contributor_repos
        .iter()
        .map(|repo| format!("`{repo}`"));
    send_reply(ctx, list_reply("Contributor repositories", items)).await
}
