//! Bringing the in-memory session back in line with persisted credentials.

use crate::{credentials::Credentials, session::SessionStore};

/// Rebuild the session from whatever credential is persisted, then mark the
/// session as checked.
///
/// A partial or corrupted credential is cleared so the two cookies can't
/// drift apart any further. Returns `true` if somebody is logged in.
pub fn reconcile(credentials: &Credentials, session: &SessionStore) -> bool {
    let logged_in = match credentials.resolve() {
        Some(credential) => {
            session.login(credential.user);
            true
        },
        None => {
            if credentials.has_entries() {
                log::warn!("Discarding an incomplete credential");

                if let Err(e) = credentials.clear() {
                    log::warn!("Unable to clear the stored credential: {}", e);
                }
            }

            session.logout();
            false
        },
    };

    session.mark_checked();
    logged_in
}
