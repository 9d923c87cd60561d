use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context as _;
use butler::{
    config::ConfigService,
    contributors::{ContributorSync, SyncScheduler, schema_entries},
    github::GithubClient,
    infrastructure::{
        botdata::Data,
        environment::{
            self, env_var_with_context, get_discord_api_url, get_github_api_url,
            get_piston_api_url, optional_env_var,
        },
    },
    piston::PistonClient,
    role_connections::{DiscordRoleConnections, RoleConnectionPublisher},
};
use poise::serenity_prelude::{self as serenity, ActivityData, GatewayIntents, OnlineStatus, UserId};
use sea_orm::DatabaseConnection;
use tracing::{debug, error, info, warn};

pub async fn create_serenity_client(
    db: DatabaseConnection,
    config: ConfigService,
    scheduler: Arc<SyncScheduler>,
) -> anyhow::Result<serenity::Client> {
    let token = env_var_with_context(environment::DISCORD_TOKEN)?;
    info!("{} variable found.", environment::DISCORD_TOKEN);
    let intents = serenity::GatewayIntents::non_privileged().union(GatewayIntents::MESSAGE_CONTENT);
    let framework = create_poise_framework(db, config, scheduler, token.clone());

    serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .context("Failed to create serenity client")
}

fn create_poise_framework(
    pool: DatabaseConnection,
    config: ConfigService,
    scheduler: Arc<SyncScheduler>,
    token: String,
) -> poise::Framework<Data, butler::Error> {
    let (initialize_owners, owners) = match try_get_owners_env() {
        Ok(owners) => (false, HashSet::from_iter(owners)),
        Err(error) => {
            if let OwnerParseError::UserIdParseError(e) = error {
                warn!("Invalid UserId in {}: {}", environment::OWNERS, e);
            }
            (true, HashSet::new())
        }
    };
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: get_enabled_commands(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some("!".into()),
                mention_as_prefix: true,
                edit_tracker: Some(Arc::new(poise::EditTracker::for_timespan(
                    Duration::from_secs(3600),
                ))),
                ..Default::default()
            },
            initialize_owners,
            owners,
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Executing Command: {:?} for {} ({})",
                        ctx.command().qualified_name,
                        ctx.author()
                            .clone()
                            .member
                            .and_then(|m| m.nick)
                            .unwrap_or(ctx.author().display_name().to_string()),
                        ctx.author().name,
                    );

                    if let Ok(mut invoc_time) = ctx.data().invoc_time.write() {
                        invoc_time.insert(ctx.id(), Instant::now());
                    }
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    if let Ok(mut invoc_time_map) = ctx.data().invoc_time.write() {
                        match invoc_time_map.remove(&ctx.id()) {
                            Some(start_time) => {
                                debug!(
                                    "Command {} finished in {:?}",
                                    ctx.command().qualified_name,
                                    start_time.elapsed()
                                );
                            }
                            None => {
                                error!(
                                    "Post-command hook called for command without a start-time set."
                                );
                            }
                        }
                    }
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    if let Err(e) = poise::builtins::on_error(error).await {
                        error!("{:?}", e);
                    }
                })
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(butler::infrastructure::event_handler::event_handler(
                    ctx, event, framework, data,
                ))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, _framework| {
            Box::pin(async move {
                let http = reqwest::Client::new();
                let role_connections: Arc<dyn RoleConnectionPublisher> =
                    Arc::new(DiscordRoleConnections::new(
                        http.clone(),
                        get_discord_api_url(),
                        token,
                        ready.application.id,
                    ));

                let repos = config.get().await.contributor_repos;
                match role_connections
                    .register_metadata_schema(&schema_entries(&repos))
                    .await
                {
                    Ok(()) => info!("Registered role metadata for {} repositories", repos.len()),
                    Err(e) => error!("Failed to register role metadata: {}", e),
                }

                let github = GithubClient::new(
                    http.clone(),
                    get_github_api_url(),
                    optional_env_var(environment::GITHUB_TOKEN),
                );
                let contributor_sync = Arc::new(ContributorSync::new(
                    config.clone(),
                    Arc::new(github),
                    Arc::new(pool),
                    role_connections.clone(),
                ));
                scheduler.start(contributor_sync.clone()).await;

                ctx.set_presence(
                    Some(ActivityData::listening("your contributions")),
                    OnlineStatus::Online,
                );

                Ok(Data {
                    config,
                    piston: PistonClient::new(http, get_piston_api_url()),
                    role_connections,
                    contributor_sync,
                    invoc_time: Default::default(),
                })
            })
        })
        .build();

    for cmd in framework.options().commands.iter() {
        info!("Loaded command: {:#?}", cmd.name);
    }

    framework
}

fn get_enabled_commands() -> Vec<poise::Command<Data, butler::Error>> {
    let default_commands = vec![
        butler::commands::builtins::help(),
        butler::commands::builtins::register(),
        butler::commands::config::config(),
        butler::commands::contributor_sync::contributor_sync(),
        butler::commands::eval::eval(),
    ];

    // Get the list of commands disabled by environment variable
    let disable_commands_env = optional_env_var(environment::COMMAND_DISABLE_LIST).unwrap_or_default();
    let disabled_commands: HashSet<String> = disable_commands_env
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let (known, unknown): (Vec<&String>, Vec<&String>) = disabled_commands
        .iter()
        .partition(|s| default_commands.iter().any(|cmd| cmd.name.to_lowercase() == **s));
    if !unknown.is_empty() {
        warn!(
            "Unknown commands in {}: {:?}",
            environment::COMMAND_DISABLE_LIST,
            unknown
        );
    }
    if known.is_empty() {
        info!("Loading default commands");
    } else {
        info!("Disabled commands: {:?}", known);
    }

    // Return the enabled commands
    default_commands
        .into_iter()
        .filter(|cmd| !disabled_commands.contains(&cmd.name.to_lowercase()))
        .collect()
}

enum OwnerParseError {
    MissingEnvVar,
    UserIdParseError(String),
}

fn try_get_owners_env() -> Result<Vec<UserId>, OwnerParseError> {
    let env_var =
        optional_env_var(environment::OWNERS).ok_or(OwnerParseError::MissingEnvVar)?;
    env_var
        .split(',')
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map(UserId::new)
                .map_err(|e| OwnerParseError::UserIdParseError(e.to_string()))
        })
        .collect()
}
