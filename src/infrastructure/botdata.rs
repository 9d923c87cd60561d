use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Instant,
};

use crate::{
    config::ConfigService, contributors::ContributorSync, piston::PistonClient,
    role_connections::RoleConnectionPublisher,
};

pub struct Data {
    pub config: ConfigService,
    pub piston: PistonClient,
    pub role_connections: Arc<dyn RoleConnectionPublisher>,
    pub contributor_sync: Arc<ContributorSync>,
    /// Start time of in-flight commands, keyed by invocation id.
    pub invoc_time: RwLock<HashMap<u64, Instant>>,
}
