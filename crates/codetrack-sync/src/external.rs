//! Bridge for changes made in other execution contexts
//!
//! Another context (a second tab, a second process sharing storage) signals
//! that a domain's backing data changed. The bridge republishes each signal
//! on the [`LocalChangeBus`] exactly as a local write would.

use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::broadcast;

use codetrack_core::{Domain, ExternalChangeSource};

use crate::bus::{ChangeKind, LocalChangeBus};
use crate::tasks::TaskRegistry;

type Classifier<M> = Box<dyn Fn(&M) -> Option<Domain> + Send + Sync>;

/// [`ExternalChangeSource`] over a Tokio broadcast channel.
///
/// `classify` maps each message to the domain it invalidates, or `None` to
/// ignore it (for example, a message this context published itself).
pub struct BroadcastChangeSource<M> {
    rx: broadcast::Receiver<M>,
    classify: Classifier<M>,
    backlog: VecDeque<Domain>,
}

impl<M: Clone + Send + 'static> BroadcastChangeSource<M> {
    /// Wrap `rx`.
    pub fn new<F>(rx: broadcast::Receiver<M>, classify: F) -> Self
    where
        F: Fn(&M) -> Option<Domain> + Send + Sync + 'static,
    {
        Self {
            rx,
            classify: Box::new(classify),
            backlog: VecDeque::new(),
        }
    }
}

#[async_trait]
impl<M: Clone + Send + 'static> ExternalChangeSource for BroadcastChangeSource<M> {
    async fn next_change(&mut self) -> Option<Domain> {
        loop {
            if let Some(domain) = self.backlog.pop_front() {
                return Some(domain);
            }
            match self.rx.recv().await {
                Ok(message) => {
                    if let Some(domain) = (self.classify)(&message) {
                        return Some(domain);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Missed messages could have touched any domain.
                    tracing::warn!(skipped, "External change stream lagged; invalidating every domain");
                    self.backlog.extend(Domain::ALL);
                }
            }
        }
    }
}

/// Forward every change from `source` to `bus` until the source ends or
/// `tasks` shuts down.
pub fn spawn_external_bridge(
    mut source: Box<dyn ExternalChangeSource>,
    bus: LocalChangeBus,
    tasks: &TaskRegistry,
) {
    tasks.spawn_cancellable("external-change-bridge", async move {
        while let Some(domain) = source.next_change().await {
            tracing::debug!(domain = %domain, "External change received");
            bus.publish(ChangeKind::Data(domain));
        }
        tracing::debug!("External change source closed");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn classifier_filters_messages() {
        let (tx, rx) = broadcast::channel::<(u8, Domain)>(8);
        let mut source = BroadcastChangeSource::new(rx, |(origin, domain): &(u8, Domain)| {
            (*origin != 1).then_some(*domain)
        });

        tx.send((1, Domain::Users)).unwrap();
        tx.send((2, Domain::Notifications)).unwrap();
        drop(tx);

        assert_eq!(source.next_change().await, Some(Domain::Notifications));
        assert_eq!(source.next_change().await, None);
    }

    #[tokio::test]
    async fn lagging_invalidates_every_domain() {
        let (tx, rx) = broadcast::channel::<Domain>(1);
        let mut source = BroadcastChangeSource::new(rx, |domain: &Domain| Some(*domain));

        tx.send(Domain::Users).unwrap();
        tx.send(Domain::Announcements).unwrap();

        let mut seen = Vec::new();
        for _ in 0..Domain::ALL.len() {
            seen.push(source.next_change().await.unwrap());
        }
        assert_eq!(seen, Domain::ALL.to_vec());
        assert_eq!(source.next_change().await, Some(Domain::Announcements));
    }

    #[tokio::test]
    async fn bridge_publishes_on_bus() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let bus = LocalChangeBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let _sub = bus.subscribe(ChangeKind::Data(Domain::TeacherRecords), move |_: ChangeKind| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let (tx, rx) = broadcast::channel::<Domain>(8);
        let tasks = TaskRegistry::new();
        spawn_external_bridge(
            Box::new(BroadcastChangeSource::new(rx, |d: &Domain| Some(*d))),
            bus.clone(),
            &tasks,
        );

        tx.send(Domain::TeacherRecords).unwrap();
        drop(tx);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        tasks.shutdown();
    }
}
