pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use config::Config;
use gateway::fanout::GatewayBroadcast;
use gateway::rooms::RoomRegistry;
use store::{MembershipStore, UserDirectory};

/// Shared application state available to all connection handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MembershipStore>,
    pub users: Arc<dyn UserDirectory>,
    pub config: Arc<Config>,
    pub rooms: Arc<RoomRegistry>,
    pub broadcast: Arc<GatewayBroadcast>,
}
