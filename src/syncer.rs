use crate::comms::{Resource, ToSyncerMessage};
use crate::error::{Error, ErrorKind};
use crate::service::Service;
use crate::settings::MIN_POLL_INTERVAL_MS;
use crate::snapshot::{Fetched, Snapshot};
use crate::status::Notifications;
use crate::RunState;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

// Bookkeeping for one resource
#[derive(Debug, Default)]
struct Slot {
    /// A request is out and has not come back
    in_flight: bool,

    /// Someone asked for fresh data while a request was out. The request
    /// may predate whatever they changed, so fetch again when it lands.
    rerun: bool,

    /// Sequence number of the last request issued
    issued: u64,

    /// Sequence number of the response currently in the snapshot
    applied: u64,

    /// The latest response was an error (so we only notify once per outage)
    failing: bool,
}

// Someone waiting for each of `targets` to settle a response at least
// that new
#[derive(Debug)]
struct Waiter {
    targets: Vec<(Resource, u64)>,
    done: oneshot::Sender<()>,
}

#[derive(Debug)]
struct Completion {
    resource: Resource,
    seq: u64,
    result: Result<Fetched, Error>,
}

/// The synchronization engine.
///
/// It fetches the timeline, our own key, our subscriptions and our
/// subscribers from the node at a fixed interval, and publishes the results
/// as a [`Snapshot`]. It is the only writer of that snapshot. Request tasks
/// report back to it over a channel and it applies their results one at a
/// time.
///
/// A resource never has two requests out at once. A tick that finds one
/// still out skips that resource; a resync that finds one still out has it
/// fetched again as soon as it lands. Requests are numbered and a response
/// is only applied over an older one.
pub struct Syncer {
    service: Arc<dyn Service>,
    interval: Duration,
    slots: [Slot; 4],
    waiters: Vec<Waiter>,

    inbox: mpsc::UnboundedReceiver<ToSyncerMessage>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,

    write_snapshot: watch::Sender<Arc<Snapshot>>,
    read_runstate: watch::Receiver<RunState>,
    notifications: Notifications,
}

impl Syncer {
    /// Start polling. The first fetch of every resource goes out
    /// immediately, then again every `interval` (at least
    /// `MIN_POLL_INTERVAL_MS`).
    pub fn start(
        service: Arc<dyn Service>,
        interval: Duration,
        notifications: Notifications,
    ) -> SyncHandle {
        let (syncer, handle) = Syncer::new(service, interval, notifications);
        tracing::info!(
            "Starting syncer, polling every {}ms",
            syncer.interval.as_millis()
        );
        let task = tokio::spawn(syncer.run());
        *handle.task.lock() = Some(task);
        handle
    }

    fn new(
        service: Arc<dyn Service>,
        interval: Duration,
        notifications: Notifications,
    ) -> (Syncer, SyncHandle) {
        let interval = interval.max(Duration::from_millis(MIN_POLL_INTERVAL_MS));

        let (to_syncer, inbox) = mpsc::unbounded_channel();
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (write_snapshot, read_snapshot) = watch::channel(Arc::new(Snapshot::default()));
        let (write_runstate, read_runstate) = watch::channel(RunState::Initializing);

        let syncer = Syncer {
            service,
            interval,
            slots: Default::default(),
            waiters: Vec::new(),
            inbox,
            completions_tx,
            completions,
            write_snapshot,
            read_runstate,
            notifications,
        };

        write_runstate.send_replace(RunState::Online);

        let handle = SyncHandle {
            to_syncer,
            read_snapshot,
            write_runstate: Arc::new(write_runstate),
            task: Arc::new(Mutex::new(None)),
        };
        (syncer, handle)
    }

    async fn run(mut self) {
        let mut read_runstate = self.read_runstate.clone();
        read_runstate.mark_unchanged();

        self.issue(&Resource::ALL, false);

        let sleep_future = tokio::time::sleep(self.interval);
        tokio::pin!(sleep_future);

        loop {
            tokio::select! {
                biased;
                _ = read_runstate.wait_for(|runstate| *runstate == RunState::ShuttingDown) => break,
                message = self.inbox.recv() => {
                    match message {
                        Some(ToSyncerMessage::Resync(resources, done)) => self.resync(&resources, done),
                        // every handle is gone
                        None => break,
                    }
                },
                Some(completion) = self.completions.recv() => {
                    self.complete(completion);
                },
                _ = &mut sleep_future => {
                    sleep_future.as_mut().reset(Instant::now() + self.interval);
                    tracing::trace!("poll tick");
                    self.issue(&Resource::ALL, false);
                },
            }
        }

        tracing::info!("Syncer stopped");
    }

    fn issue(&mut self, resources: &[Resource], out_of_cycle: bool) {
        for &resource in resources {
            let slot = &mut self.slots[resource.index()];
            if slot.in_flight {
                if out_of_cycle {
                    tracing::debug!("{} in flight, will refetch when it lands", resource);
                    slot.rerun = true;
                } else {
                    tracing::debug!("{} still in flight, skipping this tick", resource);
                }
                continue;
            }

            slot.in_flight = true;
            slot.issued += 1;
            let seq = slot.issued;

            let service = self.service.clone();
            let completions = self.completions_tx.clone();
            tokio::spawn(async move {
                let result = fetch(service.as_ref(), resource).await;
                // If the syncer has stopped, nobody wants this
                let _ = completions.send(Completion {
                    resource,
                    seq,
                    result,
                });
            });
        }
    }

    fn resync(&mut self, resources: &[Resource], done: Option<oneshot::Sender<()>>) {
        self.issue(resources, true);

        let done = match done {
            Some(done) => done,
            None => return,
        };
        // Either a request just went out, or the one in flight predates this
        // resync and its rerun will be the next number
        let targets: Vec<(Resource, u64)> = resources
            .iter()
            .map(|&resource| {
                let slot = &self.slots[resource.index()];
                if slot.rerun {
                    (resource, slot.issued + 1)
                } else {
                    (resource, slot.issued)
                }
            })
            .collect();
        if targets.is_empty() {
            let _ = done.send(());
        } else {
            self.waiters.push(Waiter { targets, done });
        }
    }

    fn settle_waiters(&mut self, resource: Resource, seq: u64) {
        for waiter in self.waiters.iter_mut() {
            waiter
                .targets
                .retain(|&(r, target)| r != resource || seq < target);
        }
        let (ready, waiting): (Vec<Waiter>, Vec<Waiter>) = std::mem::take(&mut self.waiters)
            .into_iter()
            .partition(|w| w.targets.is_empty());
        self.waiters = waiting;
        for waiter in ready {
            // The waiter may have given up
            let _ = waiter.done.send(());
        }
    }

    fn complete(&mut self, completion: Completion) {
        if *self.read_runstate.borrow() == RunState::ShuttingDown {
            return;
        }

        let Completion {
            resource,
            seq,
            result,
        } = completion;
        let idx = resource.index();

        if seq == self.slots[idx].issued {
            self.slots[idx].in_flight = false;
        }

        match result {
            Ok(fetched) if seq > self.slots[idx].applied => {
                self.slots[idx].applied = seq;
                if self.slots[idx].failing {
                    self.slots[idx].failing = false;
                    tracing::info!("Refreshing {} works again", resource);
                }
                self.write_snapshot
                    .send_modify(|snapshot| Arc::make_mut(snapshot).apply(seq, fetched));
            }
            Ok(_) => {
                tracing::debug!("Discarding stale {} response #{}", resource, seq);
                self.write_snapshot
                    .send_modify(|snapshot| Arc::make_mut(snapshot).discard(resource));
            }
            Err(e) => {
                tracing::warn!("Could not refresh {}: {}", resource, e);
                let message = e.user_message();
                if !self.slots[idx].failing {
                    self.slots[idx].failing = true;
                    self.notifications
                        .error(format!("Could not refresh {}: {}", resource, message));
                }
                self.write_snapshot
                    .send_modify(|snapshot| Arc::make_mut(snapshot).fail(resource, message));
            }
        }

        self.settle_waiters(resource, seq);

        if self.slots[idx].rerun {
            self.slots[idx].rerun = false;
            self.issue(&[resource], true);
        }
    }
}

async fn fetch(service: &dyn Service, resource: Resource) -> Result<Fetched, Error> {
    Ok(match resource {
        Resource::Timeline => Fetched::Timeline(service.timeline().await?),
        Resource::OwnIdentity => Fetched::OwnIdentity(service.own_identity().await?),
        Resource::Subscriptions => Fetched::Subscriptions(service.subscriptions().await?),
        Resource::Subscribed => Fetched::Subscribed(service.subscribed().await?),
    })
}

/// A handle on a running [`Syncer`]. Cheap to clone.
#[derive(Clone, Debug)]
pub struct SyncHandle {
    to_syncer: mpsc::UnboundedSender<ToSyncerMessage>,
    read_snapshot: watch::Receiver<Arc<Snapshot>>,
    write_runstate: Arc<watch::Sender<RunState>>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SyncHandle {
    /// What we currently know
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.read_snapshot.borrow().clone()
    }

    /// A receiver that wakes whenever the snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.read_snapshot.clone()
    }

    /// Fetch these resources now rather than at the next tick
    pub fn resync(&self, resources: &[Resource]) -> Result<(), Error> {
        self.to_syncer
            .send(ToSyncerMessage::Resync(resources.to_vec(), None))
            .map_err(|_| ErrorKind::ShuttingDown.into())
    }

    /// Fetch these resources now, and wait until each has settled a
    /// response to a request made after this call. The snapshot already
    /// holds those responses when this returns (or their errors, if they
    /// failed).
    pub async fn refresh(&self, resources: &[Resource]) -> Result<(), Error> {
        let (done, settled) = oneshot::channel();
        if self
            .to_syncer
            .send(ToSyncerMessage::Resync(resources.to_vec(), Some(done)))
            .is_err()
        {
            return Err(ErrorKind::ShuttingDown.into());
        }
        match settled.await {
            Ok(()) => Ok(()),
            Err(_) => Err(ErrorKind::ShuttingDown.into()),
        }
    }

    pub fn resync_all(&self) -> Result<(), Error> {
        self.resync(&Resource::ALL)
    }

    pub fn runstate(&self) -> RunState {
        *self.write_runstate.borrow()
    }

    /// Wait until the snapshot satisfies `f`, for at most `timeout`
    pub async fn wait_until<F>(&self, timeout: Duration, mut f: F) -> Result<Arc<Snapshot>, Error>
    where
        F: FnMut(&Snapshot) -> bool,
    {
        let mut rx = self.read_snapshot.clone();
        let waited = tokio::time::timeout(timeout, rx.wait_for(|s| f(s.as_ref()))).await?;
        match waited {
            Ok(snapshot) => Ok(Arc::clone(&snapshot)),
            Err(_) => Err(ErrorKind::ShuttingDown.into()),
        }
    }

    /// Stop polling. Requests already out are left to finish, but nothing
    /// they return is applied.
    pub async fn stop(&self) -> Result<(), Error> {
        self.write_runstate.send_replace(RunState::ShuttingDown);
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::people::{OwnIdentity, SubscriberRecord, SubscriptionRecord};
    use crate::post::{NewPost, Post};
    use crate::pubkey::PublicKey;
    use crate::service::Detail;
    use async_trait::async_trait;

    // Never called: these tests feed completions in by hand
    struct Unreachable;

    #[async_trait]
    impl Service for Unreachable {
        async fn timeline(&self) -> Result<Vec<Post>, Error> {
            Err("unreachable".into())
        }
        async fn own_identity(&self) -> Result<OwnIdentity, Error> {
            Err("unreachable".into())
        }
        async fn subscriptions(&self) -> Result<Vec<SubscriptionRecord>, Error> {
            Err("unreachable".into())
        }
        async fn subscribed(&self) -> Result<Vec<SubscriberRecord>, Error> {
            Err("unreachable".into())
        }
        async fn subscribe(&self, _: &PublicKey, _: &str) -> Result<Detail, Error> {
            Err("unreachable".into())
        }
        async fn unsubscribe(&self, _: &PublicKey) -> Result<Detail, Error> {
            Err("unreachable".into())
        }
        async fn post(&self, _: &NewPost) -> Result<(), Error> {
            Err("unreachable".into())
        }
    }

    fn subs(keys: &[&str]) -> Fetched {
        Fetched::Subscriptions(
            keys.iter()
                .map(|k| SubscriptionRecord {
                    pubkey: PublicKey::try_from_str(k).unwrap(),
                    alias: String::new(),
                })
                .collect(),
        )
    }

    fn completion(seq: u64, fetched: Fetched) -> Completion {
        Completion {
            resource: fetched.resource(),
            seq,
            result: Ok(fetched),
        }
    }

    #[test]
    fn test_older_response_never_replaces_newer() {
        let (mut syncer, handle) =
            Syncer::new(Arc::new(Unreachable), Duration::from_secs(60), Notifications::new());
        let idx = Resource::Subscriptions.index();
        syncer.slots[idx].issued = 2;
        syncer.slots[idx].in_flight = true;

        syncer.complete(completion(2, subs(&["new"])));
        syncer.complete(completion(1, subs(&["old"])));

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.subscriptions[0].pubkey.as_str(), "new");
        let status = snapshot.status(Resource::Subscriptions);
        assert_eq!(status.applied_seq, 2);
        assert_eq!(status.settled, 2);
        assert!(!syncer.slots[idx].in_flight);
    }

    #[test]
    fn test_waiter_needs_a_response_issued_after_it() {
        let (mut syncer, _handle) =
            Syncer::new(Arc::new(Unreachable), Duration::from_secs(60), Notifications::new());
        let (done, mut settled) = oneshot::channel();
        syncer.waiters.push(Waiter {
            targets: vec![(Resource::Subscriptions, 2)],
            done,
        });

        syncer.settle_waiters(Resource::Subscriptions, 1);
        assert!(settled.try_recv().is_err());
        syncer.settle_waiters(Resource::Timeline, 2);
        assert!(settled.try_recv().is_err());
        syncer.settle_waiters(Resource::Subscriptions, 2);
        assert!(settled.try_recv().is_ok());
        assert!(syncer.waiters.is_empty());
    }
}
