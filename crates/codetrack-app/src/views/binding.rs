//! Generic view binding
//!
//! A [`ViewBinding`] adapts the store and polling controller for one domain
//! into what presentation code needs: the cached snapshot, change
//! subscriptions, an on-demand refresh, and writes through the remote.

use std::marker::PhantomData;
use std::sync::Arc;

use codetrack_core::{Mutation, MutationAck, RemoteService, Snapshot, SyncError, SyncResult};
use codetrack_sync::{
    fetch_fn, ChangeKind, FetchFn, LocalChangeBus, PollingController, SubscriberToken, SyncRecord,
    SyncStore,
};

use crate::session::Session;

/// Fetch function for `T`'s domain that reads through `remote`.
///
/// Owner-scoped domains are fetched for the identity signed in when the
/// fetch starts; a result that arrives after the identity changed is
/// discarded.
pub fn remote_fetch<T: SyncRecord>(remote: Arc<dyn RemoteService>, session: Session) -> FetchFn<T> {
    fetch_fn(move || {
        let remote = remote.clone();
        let session = session.clone();
        async move {
            let domain = T::DOMAIN;
            let owner = if domain.is_owner_scoped() {
                Some(session.require()?)
            } else {
                None
            };

            let payload = remote.fetch_all(domain, owner.as_ref()).await?;
            if owner.is_some() && session.user_id() != owner {
                return Err(match session.user_id() {
                    None => SyncError::NotAuthenticated,
                    Some(_) => SyncError::transient(domain, "signed-in identity changed during fetch"),
                });
            }
            T::from_payload(payload)
        }
    })
}

/// Handle to one domain's synchronized data.
#[derive(Clone)]
pub struct ViewBinding<T: SyncRecord> {
    store: SyncStore,
    polling: PollingController,
    bus: LocalChangeBus,
    session: Session,
    remote: Arc<dyn RemoteService>,
    fetch: FetchFn<T>,
    _record: PhantomData<fn() -> T>,
}

impl<T: SyncRecord> ViewBinding<T> {
    /// Bind `T`'s domain to the shared engine components.
    pub fn new(
        store: SyncStore,
        polling: PollingController,
        bus: LocalChangeBus,
        session: Session,
        remote: Arc<dyn RemoteService>,
    ) -> Self {
        let fetch = remote_fetch::<T>(remote.clone(), session.clone());
        Self {
            store,
            polling,
            bus,
            session,
            remote,
            fetch,
            _record: PhantomData,
        }
    }

    /// Latest cached snapshot; never waits on the remote.
    pub fn current_snapshot(&self) -> Snapshot<T> {
        self.store.snapshot::<T>()
    }

    /// Call `callback` with every new snapshot until the returned
    /// subscription is dropped.
    pub fn subscribe<F>(&self, callback: F) -> ViewSubscription
    where
        F: Fn(&Snapshot<T>) + Send + Sync + 'static,
    {
        let token = SubscriberToken::new();
        self.store.subscribe::<T, _>(token.clone(), callback);
        ViewSubscription {
            store: self.store.clone(),
            domain: T::DOMAIN,
            token,
        }
    }

    /// Fetch now, joining a fetch already in flight.
    pub async fn refresh(&self) -> SyncResult<Snapshot<T>> {
        self.polling.refresh_now::<T>(self.fetch.clone()).await
    }

    /// Queue a refresh that observes every write made before this call.
    pub fn schedule_refresh(&self) {
        self.polling.schedule_refresh::<T>(self.fetch.clone());
    }

    /// Start the recurring refresh timer for this domain.
    ///
    /// Fails with a config error for a zero interval.
    pub fn start_polling(&self, interval: std::time::Duration) -> SyncResult<()> {
        self.polling.start_polling::<T>(interval, self.fetch.clone())
    }

    /// Write through the remote as the signed-in user.
    ///
    /// On success a refresh of this binding's domain is scheduled when the
    /// write touched it, and the changed domain is announced on the bus for
    /// every other listener. Requests that arrive while that refresh is in
    /// flight collapse into one follow-up fetch. The acknowledgment does not
    /// mean the refreshed snapshot has landed.
    pub async fn mutate(&self, mutation: Mutation) -> SyncResult<MutationAck> {
        let actor = self.session.require()?;
        let operation = mutation.name();
        let target = mutation.domain();

        let ack = match self.remote.mutate(&actor, &mutation).await {
            Ok(ack) => ack,
            Err(error) => {
                tracing::warn!(domain = %target, operation, actor = %actor, %error, "Mutation failed");
                return Err(error);
            }
        };
        if ack.domain != target {
            tracing::debug!(expected = %target, acknowledged = %ack.domain, "Remote acknowledged a different domain");
        }

        tracing::info!(
            domain = %ack.domain,
            operation,
            actor = %actor,
            record = ?ack.record_id,
            "Mutation applied"
        );
        if ack.domain == T::DOMAIN {
            self.schedule_refresh();
        }
        self.bus.publish(ChangeKind::Data(ack.domain));
        Ok(ack)
    }

    /// Session the binding acts for.
    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl<T: SyncRecord> std::fmt::Debug for ViewBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewBinding")
            .field("domain", &T::DOMAIN)
            .field("version", &self.store.version(T::DOMAIN))
            .finish()
    }
}

/// Registration made by [`ViewBinding::subscribe`]; unsubscribes on drop.
#[must_use = "dropping a ViewSubscription unsubscribes immediately"]
pub struct ViewSubscription {
    store: SyncStore,
    domain: codetrack_core::Domain,
    token: SubscriberToken,
}

impl ViewSubscription {
    /// Token the callback is registered under.
    pub fn token(&self) -> &SubscriberToken {
        &self.token
    }

    /// Unsubscribe now.
    pub fn cancel(self) {}
}

impl Drop for ViewSubscription {
    fn drop(&mut self) {
        // Unknown tokens are a no-op, so teardown never fails.
        self.store.unsubscribe(self.domain, &self.token);
    }
}

impl std::fmt::Debug for ViewSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewSubscription")
            .field("domain", &self.domain)
            .field("token", &self.token)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LocalStorageRemote, SharedStorage};
    use codetrack_core::records::User;
    use codetrack_core::{Domain, UserId};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn mutate_refreshes_its_own_domain_without_a_core() {
        let storage = SharedStorage::demo();
        let store = SyncStore::new();
        let bus = LocalChangeBus::new();
        let session = Session::new(bus.clone());
        let users = ViewBinding::<User>::new(
            store.clone(),
            PollingController::new(store.clone(), Duration::from_secs(5)),
            bus,
            session.clone(),
            Arc::new(LocalStorageRemote::new(storage.clone())),
        );
        session
            .sign_in(storage.user(&UserId::new("a1")).unwrap())
            .unwrap();
        users.refresh().await.unwrap();
        let before = store.version(Domain::Users);

        users.approve(UserId::new("s3")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(store.version(Domain::Users) > before);
        assert!(users.find(&UserId::new("s3")).unwrap().is_approved());
    }

    #[tokio::test]
    async fn zero_interval_polling_is_refused() {
        let storage = SharedStorage::demo();
        let store = SyncStore::new();
        let bus = LocalChangeBus::new();
        let polling = PollingController::new(store.clone(), Duration::from_secs(5));
        let users = ViewBinding::<User>::new(
            store,
            polling.clone(),
            bus.clone(),
            Session::new(bus),
            Arc::new(LocalStorageRemote::new(storage)),
        );

        assert!(matches!(
            users.start_polling(Duration::ZERO),
            Err(SyncError::Config { .. })
        ));
        assert_eq!(polling.interval(Domain::Users), None);
    }
}
