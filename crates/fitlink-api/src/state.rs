use std::sync::Arc;

use fitlink_db::Database;
use fitlink_gateway::auth::JwtVerifier;
use fitlink_gateway::presence::PresenceRegistry;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub verifier: JwtVerifier,
    pub presence: PresenceRegistry,
}
