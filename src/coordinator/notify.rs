use tracing::{debug, info};

use crate::domain::{PartyId, TradeSession};

/// Observer seam for the view layer (chat interface or interactive grid).
/// Called synchronously after each state-mutating operation so the view can
/// re-render without polling.
pub trait TradeNotifier: Send + Sync {
    /// Human-readable notification for one participant
    fn notify(&self, party: &PartyId, message: &str);

    /// The session changed; the argument is a consistent snapshot
    fn session_changed(&self, session: &TradeSession);
}

/// Default notifier that writes to the operational log. Hosts replace this
/// with a chat/GUI-backed implementation.
pub struct LogNotifier;

impl TradeNotifier for LogNotifier {
    fn notify(&self, party: &PartyId, message: &str) {
        info!("[to {}] {}", party, message);
    }

    fn session_changed(&self, session: &TradeSession) {
        debug!("Session {} changed (state: {})", session.id, session.state());
    }
}
