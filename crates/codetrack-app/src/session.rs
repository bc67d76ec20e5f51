//! # Session
//!
//! The signed-in identity. Owner-scoped domains are fetched for it and every
//! mutation is issued on its behalf.

use parking_lot::RwLock;
use std::sync::Arc;

use codetrack_core::records::{ApprovalStatus, Role, User};
use codetrack_core::{SyncError, SyncResult, UserId};
use codetrack_sync::{ChangeKind, LocalChangeBus};

/// Signed-in identity shared by every view binding.
///
/// Changes are announced as [`ChangeKind::Session`] on the bus.
#[derive(Clone)]
pub struct Session {
    current: Arc<RwLock<Option<User>>>,
    bus: LocalChangeBus,
}

impl Session {
    /// Create a signed-out session announcing changes on `bus`.
    pub fn new(bus: LocalChangeBus) -> Self {
        Self {
            current: Arc::new(RwLock::new(None)),
            bus,
        }
    }

    /// Sign `user` in, replacing any previous identity.
    ///
    /// Accounts that are not approved are refused.
    pub fn sign_in(&self, user: User) -> SyncResult<()> {
        match user.status {
            ApprovalStatus::Approved => {}
            ApprovalStatus::Pending => {
                return Err(SyncError::rejected(format!(
                    "account {} is awaiting approval",
                    user.id
                )))
            }
            ApprovalStatus::Rejected => {
                return Err(SyncError::rejected(format!("account {} was rejected", user.id)))
            }
        }

        tracing::info!(user = %user.id, role = ?user.role, "Signed in");
        *self.current.write() = Some(user);
        self.bus.publish(ChangeKind::Session);
        Ok(())
    }

    /// Sign out. Returns the identity that was signed in, if any.
    pub fn sign_out(&self) -> Option<User> {
        let previous = self.current.write().take();
        if let Some(user) = &previous {
            tracing::info!(user = %user.id, "Signed out");
            self.bus.publish(ChangeKind::Session);
        }
        previous
    }

    /// Signed-in user, if any.
    pub fn current(&self) -> Option<User> {
        self.current.read().clone()
    }

    /// Identifier of the signed-in user, if any.
    pub fn user_id(&self) -> Option<UserId> {
        self.current.read().as_ref().map(|user| user.id.clone())
    }

    /// Role of the signed-in user, if any.
    pub fn role(&self) -> Option<Role> {
        self.current.read().as_ref().map(|user| user.role)
    }

    /// Identifier of the signed-in user, or `NotAuthenticated`.
    pub fn require(&self) -> SyncResult<UserId> {
        self.user_id().ok_or(SyncError::NotAuthenticated)
    }

    /// Whether anyone is signed in.
    pub fn is_signed_in(&self) -> bool {
        self.current.read().is_some()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn sign_in_and_out_publish_session_changes() {
        let bus = LocalChangeBus::new();
        let changes = Arc::new(AtomicUsize::new(0));
        let counter = changes.clone();
        let _sub = bus.subscribe(ChangeKind::Session, move |_: ChangeKind| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let session = Session::new(bus);
        assert_eq!(session.require(), Err(SyncError::NotAuthenticated));

        session
            .sign_in(User::new("t1", "Grace", Role::Teacher))
            .unwrap();
        assert_eq!(session.user_id(), Some(UserId::new("t1")));
        assert_eq!(session.role(), Some(Role::Teacher));

        assert!(session.sign_out().is_some());
        assert!(session.sign_out().is_none());
        assert_eq!(changes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn pending_accounts_cannot_sign_in() {
        let session = Session::new(LocalChangeBus::new());
        let pending = User::new("s9", "New", Role::Student).with_status(ApprovalStatus::Pending);

        let err = session.sign_in(pending).unwrap_err();
        assert!(matches!(err, SyncError::Rejected { .. }));
        assert!(!session.is_signed_in());
    }
}
