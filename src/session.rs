use crate::comms::ToOverlordMessage;
use crate::error::Error;
use crate::fetcher::Fetcher;
use crate::overlord::Overlord;
use crate::service::Service;
use crate::settings::Settings;
use crate::status::Notifications;
use crate::syncer::{SyncHandle, Syncer};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

/// Everything a front end needs, wired together: a running Syncer, an
/// Overlord listening on `to_overlord`, and the shared notifications.
pub struct Session {
    pub settings: Settings,
    pub syncer: SyncHandle,
    pub overlord: Overlord,
    pub notifications: Notifications,
    pub to_overlord: UnboundedSender<ToOverlordMessage>,
    overlord_task: JoinHandle<()>,
}

impl Session {
    /// Connect to the node named in the settings, or in `MURMUR_ORIGIN` if
    /// that is set. Must be called inside a tokio runtime.
    pub fn start(settings: Settings) -> Result<Session, Error> {
        let settings = settings.with_env_overrides();
        let fetcher = Fetcher::new(&settings)?;
        tracing::info!("Node service at {}", fetcher.origin());
        Ok(Session::with_service(Arc::new(fetcher), settings))
    }

    pub fn with_service(service: Arc<dyn Service>, settings: Settings) -> Session {
        let notifications = Notifications::new();
        let syncer = Syncer::start(
            service.clone(),
            settings.poll_interval(),
            notifications.clone(),
        );
        let overlord = Overlord::new(service, syncer.clone(), notifications.clone(), &settings);

        let (to_overlord, inbox) = mpsc::unbounded_channel();
        let overlord_task = {
            let overlord = overlord.clone();
            tokio::spawn(async move { overlord.run(inbox).await })
        };

        Session {
            settings,
            syncer,
            overlord,
            notifications,
            to_overlord,
            overlord_task,
        }
    }

    /// Stop the Overlord and the Syncer, and wait for both
    pub async fn shutdown(self) -> Result<(), Error> {
        tracing::info!("Shutting down");
        // The overlord may already be gone
        let _ = self.to_overlord.send(ToOverlordMessage::Shutdown);
        self.overlord_task.await?;
        self.syncer.stop().await
    }
}
