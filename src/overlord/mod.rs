use crate::comms::{Resource, ToOverlordMessage};
use crate::error::{Error, ErrorKind};
use crate::people::{FollowState, Pending, PendingAction};
use crate::post::NewPost;
use crate::pubkey::PublicKey;
use crate::qr::QrDecoder;
use crate::service::{Detail, Service};
use crate::settings::Settings;
use crate::status::Notifications;
use crate::syncer::SyncHandle;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;

/// Carries out what the user asks for: follow, unfollow and post.
///
/// Each action is one request to the service. The outcome is reported as a
/// notification and the affected resources are resynced, so whatever the
/// service now says becomes visible in the snapshot. Nothing is changed
/// locally ahead of the service.
#[derive(Clone)]
pub struct Overlord {
    service: Arc<dyn Service>,
    syncer: SyncHandle,
    pending: Arc<Pending>,
    notifications: Notifications,
    strict_scanned_keys: bool,
}

impl Overlord {
    pub fn new(
        service: Arc<dyn Service>,
        syncer: SyncHandle,
        notifications: Notifications,
        settings: &Settings,
    ) -> Overlord {
        Overlord {
            service,
            syncer,
            pending: Arc::new(Pending::new()),
            notifications,
            strict_scanned_keys: settings.strict_scanned_keys,
        }
    }

    /// Handle messages until told to shut down or every sender is gone.
    /// Actions run concurrently with each other; the ones still running at
    /// shutdown are finished before this returns.
    pub async fn run(&self, mut inbox: UnboundedReceiver<ToOverlordMessage>) {
        tracing::debug!("Overlord listening");
        let mut actions: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                message = inbox.recv() => {
                    let message = match message {
                        None | Some(ToOverlordMessage::Shutdown) => break,
                        Some(message) => message,
                    };
                    let overlord = self.clone();
                    actions.spawn(async move {
                        if let Err(e) = overlord.handle_message(message).await {
                            tracing::error!("{}", e);
                        }
                    });
                },
                Some(joined) = actions.join_next() => {
                    if let Err(e) = joined {
                        tracing::error!("{}", e);
                    }
                },
            }
        }

        if !actions.is_empty() {
            tracing::info!("Waiting for {} actions to finish", actions.len());
        }
        while let Some(joined) = actions.join_next().await {
            if let Err(e) = joined {
                tracing::error!("{}", e);
            }
        }
        tracing::info!("Overlord stopped");
    }

    async fn handle_message(&self, message: ToOverlordMessage) -> Result<(), Error> {
        match message {
            ToOverlordMessage::Follow { pubkey, alias } => {
                self.follow(&pubkey, &alias).await?;
            }
            ToOverlordMessage::FollowScanned(payload) => {
                self.follow_scanned(&payload).await?;
            }
            ToOverlordMessage::Unfollow(pubkey) => {
                self.unfollow(&pubkey).await?;
            }
            ToOverlordMessage::Post(text) => {
                self.post(&text).await?;
            }
            ToOverlordMessage::ResyncAll => {
                self.syncer.resync_all()?;
            }
            ToOverlordMessage::Shutdown => {}
        }
        Ok(())
    }

    pub fn syncer(&self) -> &SyncHandle {
        &self.syncer
    }

    /// Where we stand with this key, counting requests still in flight
    pub fn follow_state(&self, pubkey: &PublicKey) -> FollowState {
        self.syncer.snapshot().follow_state(pubkey, &self.pending)
    }

    /// Follow a key typed in by the user. The alias may be empty.
    pub async fn follow(&self, pubkey: &str, alias: &str) -> Result<Detail, Error> {
        let pubkey = self.report(PublicKey::try_from_str(pubkey))?;
        self.follow_pubkey(&pubkey, alias).await
    }

    /// Follow whatever key a QR code carried. Scanned follows take no alias.
    pub async fn follow_scanned(&self, payload: &str) -> Result<Detail, Error> {
        let pubkey = self.report(PublicKey::try_from_scan(
            payload.trim(),
            self.strict_scanned_keys,
        ))?;
        tracing::info!("Scanned key {}", pubkey.abbreviated());
        self.follow_pubkey(&pubkey, "").await
    }

    /// Decode a QR code from an image, then follow the key in it
    pub async fn follow_scanned_image(
        &self,
        decoder: &dyn QrDecoder,
        image: &[u8],
    ) -> Result<Detail, Error> {
        let payload = self.report(decoder.decode(image))?;
        self.follow_scanned(&payload).await
    }

    pub async fn follow_pubkey(&self, pubkey: &PublicKey, alias: &str) -> Result<Detail, Error> {
        self.claim(pubkey, PendingAction::Follow)?;

        tracing::info!("Following {} as {:?}", pubkey.abbreviated(), alias);
        let result = self.service.subscribe(pubkey, alias).await;
        self.settle(pubkey).await;

        let detail = self.report(result)?;
        self.notifications.info(detail.detail.clone());
        Ok(detail)
    }

    /// Stop following a key typed in by the user. Unfollowing someone we
    /// do not follow is up to the service to answer; whatever it says is
    /// reported.
    pub async fn unfollow(&self, pubkey: &str) -> Result<Detail, Error> {
        let pubkey = self.report(PublicKey::try_from_str(pubkey))?;
        self.unfollow_pubkey(&pubkey).await
    }

    pub async fn unfollow_pubkey(&self, pubkey: &PublicKey) -> Result<Detail, Error> {
        self.claim(pubkey, PendingAction::Unfollow)?;

        tracing::info!("Unfollowing {}", pubkey.abbreviated());
        let result = self.service.unsubscribe(pubkey).await;
        self.settle(pubkey).await;

        let detail = self.report(result)?;
        self.notifications.info(detail.detail.clone());
        Ok(detail)
    }

    /// Publish a post. The timeline is resynced whether or not it worked.
    pub async fn post(&self, text: &str) -> Result<(), Error> {
        let new_post = self.report(NewPost::new(text))?;

        tracing::info!("Posting {} characters", new_post.text.chars().count());
        let result = self.service.post(&new_post).await;
        self.resync(&[Resource::Timeline]);

        self.report(result)?;
        self.notifications.info("Posted");
        Ok(())
    }

    fn claim(&self, pubkey: &PublicKey, action: PendingAction) -> Result<(), Error> {
        if self.pending.begin(pubkey, action) {
            Ok(())
        } else {
            self.report(Err(ErrorKind::ActionPending(pubkey.abbreviated()).into()))
        }
    }

    // The key stays pending until the lists fetched after the answer are in
    // the snapshot, so its state goes straight from pending to the outcome
    async fn settle(&self, pubkey: &PublicKey) {
        if let Err(e) = self.syncer.refresh(&Resource::PEOPLE).await {
            tracing::debug!("Not resyncing: {}", e);
        }
        self.pending.finish(pubkey);
    }

    fn resync(&self, resources: &[Resource]) {
        if let Err(e) = self.syncer.resync(resources) {
            tracing::debug!("Not resyncing: {}", e);
        }
    }

    // Push failures to the user before handing them back
    fn report<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(e) = &result {
            tracing::warn!("{}", e);
            self.notifications.error(e.user_message());
        }
        result
    }
}
