use std::sync::Arc;

use flowboard_db::Database;

use crate::email::Mailer;
use crate::session::SessionSigner;

pub type AppState = Arc<AppStateInner>;

/// Process-wide dependencies, assembled once at startup and injected
/// everywhere. Read-only after construction.
pub struct AppStateInner {
    pub db: Database,
    pub signer: SessionSigner,
    pub mailer: Arc<dyn Mailer>,
    /// Base URL embedded in magic-link emails.
    pub public_url: String,
    /// Non-production mode: login responses echo the magic token and
    /// the seed endpoint is enabled.
    pub dev_mode: bool,
}
