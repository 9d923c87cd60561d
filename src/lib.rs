use crate::infrastructure::botdata;

pub mod config;
pub mod contributors;
pub mod entities;
pub mod github;
pub mod linked_accounts;
pub mod piston;
pub mod role_connections;

pub mod commands {
    pub mod builtins;
    pub mod config;
    pub mod contributor_sync;
    pub mod eval;
}

pub mod infrastructure {
    pub mod botdata;
    pub mod colors;
    pub mod environment;
    pub mod event_handler;
    pub mod ids;
    pub mod util;
}

pub mod events {
    pub mod eval_components;
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, botdata::Data, Error>;
