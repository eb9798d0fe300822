//! Command channel in front of a [`Harvester`].
//!
//! The [`Controller`] owns the harvester and serves [`Command`]s from an mpsc
//! channel, answering each over a oneshot. While a session runs, the
//! controller keeps serving commands, so `stop` and `getState` reach the
//! session at its next decision point.
//!
//! Snapshot documents are not `Send`, so the controller is meant to be
//! driven on the same task as its client, for example with `tokio::join!`.

use tokio::sync::{mpsc, oneshot};

use crate::document::DocumentSource;
use crate::harvest::{EventSender, HarvestEvent, Harvester, HarvesterHandle, SessionStatus};
use crate::settings::HarvestSettings;
use crate::store::StorageBackend;
use crate::{HarvestError, Result};

/// Requests understood by the [`Controller`].
#[derive(Debug)]
pub enum Command {
    Start { settings: HarvestSettings, reply: oneshot::Sender<Result<()>> },
    Stop { reply: oneshot::Sender<Result<()>> },
    GetState { reply: oneshot::Sender<SessionStatus> },
    Shutdown,
}

/// Creates a client and the receiving end for [`Controller::serve`].
pub fn control_channel(buffer: usize) -> (ControlClient, mpsc::Receiver<Command>) {
    let (tx, rx) = mpsc::channel(buffer);
    (ControlClient { tx }, rx)
}

/// Sending side of the command channel.
#[derive(Debug, Clone)]
pub struct ControlClient {
    tx: mpsc::Sender<Command>,
}

impl ControlClient {
    pub async fn start(&self, settings: HarvestSettings) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start { settings, reply }).await?;
        rx.await.map_err(|_| HarvestError::ChannelClosed)?
    }

    pub async fn stop(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stop { reply }).await?;
        rx.await.map_err(|_| HarvestError::ChannelClosed)?
    }

    pub async fn state(&self) -> Result<SessionStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::GetState { reply }).await?;
        rx.await.map_err(|_| HarvestError::ChannelClosed)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).await.map_err(|_| HarvestError::ChannelClosed)
    }
}

/// Serves commands for one harvester.
pub struct Controller<D: DocumentSource, B: StorageBackend> {
    harvester: Harvester<D, B>,
}

impl<D: DocumentSource, B: StorageBackend> Controller<D, B> {
    pub fn new(harvester: Harvester<D, B>) -> Self {
        Self { harvester }
    }

    /// Serves until `Shutdown` or until every client is dropped.
    ///
    /// A session running at shutdown is stopped and flushed before this
    /// returns. The harvester is handed back so its store can be inspected.
    pub async fn serve(mut self, mut commands: mpsc::Receiver<Command>, events: EventSender) -> Harvester<D, B> {
        let handle = self.harvester.handle();

        while let Some(command) = commands.recv().await {
            match command {
                Command::Start { settings, reply } => {
                    let started = self.harvester.start(settings);
                    let running = started.is_ok();
                    let _ = reply.send(started);
                    if running && self.run_session(&handle, &mut commands, &events).await {
                        break;
                    }
                }
                Command::Stop { reply } => {
                    let _ = reply.send(handle.stop());
                }
                Command::GetState { reply } => {
                    let _ = reply.send(handle.status());
                }
                Command::Shutdown => break,
            }
        }

        tracing::debug!("Controller shut down");
        self.harvester
    }

    /// Runs the started session while answering commands. Returns true when
    /// a shutdown arrived during the session.
    async fn run_session(
        &mut self, handle: &HarvesterHandle, commands: &mut mpsc::Receiver<Command>, events: &EventSender,
    ) -> bool {
        let mut run = std::pin::pin!(self.harvester.run(events));

        loop {
            tokio::select! {
                result = &mut run => {
                    if let Err(e) = result {
                        let _ = events.send(HarvestEvent::Error { context: "run".to_string(), message: e.to_string() });
                    }
                    return false;
                }
                command = commands.recv() => match command {
                    Some(Command::Start { reply, .. }) => {
                        let _ = reply.send(Err(HarvestError::AlreadyActive));
                    }
                    Some(Command::Stop { reply }) => {
                        let _ = reply.send(handle.stop());
                    }
                    Some(Command::GetState { reply }) => {
                        let _ = reply.send(handle.status());
                    }
                    Some(Command::Shutdown) | None => {
                        let _ = handle.stop();
                        if let Err(e) = (&mut run).await {
                            let _ = events.send(HarvestEvent::Error { context: "run".to_string(), message: e.to_string() });
                        }
                        return true;
                    }
                }
            }
        }
    }
}
