// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Rundown service.
//!
//! A [`RundownService`] owns one rundown and serializes every operation on
//! it through a command queue. Operators, ingest and timeline readers hold
//! a cloneable [`RundownHandle`] and await replies.
//!
//! Mutations run against a draft copy. The draft replaces the live rundown
//! only after the operation and the store write both succeed, so a failed
//! command leaves playout state untouched.
//!
//! ```ignore
//! let (service, handle) = RundownService::new(rundown, studio);
//! tokio::spawn(service.run());
//!
//! handle.activate().await?;
//! handle.take_next().await?;
//! let timeline = handle.build_timeline().await?;
//! handle.shutdown().await;
//! ```

use std::collections::BTreeSet;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{Result, RundownError};
use crate::rundown::{diff_segments, ChangeEvent, Owner, Piece, Rundown, Segment};
use crate::store::RundownStore;
use crate::studio::Studio;
use crate::timeline::{self, Timeline};

/// Command queue depth
const COMMAND_BUFFER_SIZE: usize = 64;

type Reply<T> = oneshot::Sender<Result<T>>;

/// Commands accepted by the service
#[derive(Debug)]
pub enum RundownCommand {
    Activate { reply: Reply<()> },
    EnterRehearsal { reply: Reply<()> },
    Deactivate { reply: Reply<()> },
    Reset { reply: Reply<()> },
    TakeNext { reply: Reply<()> },
    SetNext {
        segment_id: String,
        part_id: String,
        reply: Reply<()>,
    },
    Apply {
        event: ChangeEvent,
        reply: Reply<()>,
    },
    /// Diff against a full segment list and apply the differences
    Sync {
        segments: Vec<Segment>,
        reply: Reply<usize>,
    },
    InsertAdlib {
        piece: Piece,
        reply: Reply<()>,
    },
    StopLayers {
        layers: BTreeSet<String>,
        reply: Reply<()>,
    },
    SetStudio {
        studio: Studio,
        reply: Reply<()>,
    },
    BuildTimeline { reply: Reply<Timeline> },
    Snapshot { reply: oneshot::Sender<Rundown> },
    Shutdown,
}

/// Single-writer owner of a rundown
pub struct RundownService {
    rundown: Rundown,
    studio: Studio,
    store: Option<RundownStore>,
    command_rx: mpsc::Receiver<RundownCommand>,
}

impl RundownService {
    /// Create a service and a handle for sending it commands
    #[must_use]
    pub fn new(rundown: Rundown, studio: Studio) -> (Self, RundownHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let service = Self {
            rundown,
            studio,
            store: None,
            command_rx: rx,
        };
        (service, RundownHandle { tx })
    }

    /// Persist the rundown after every successful mutation
    #[must_use]
    pub fn with_store(mut self, store: RundownStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Process commands until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        info!(rundown = %self.rundown.id(), "rundown service started");

        while let Some(cmd) = self.command_rx.recv().await {
            if matches!(cmd, RundownCommand::Shutdown) {
                info!(rundown = %self.rundown.id(), "rundown service received shutdown");
                break;
            }
            self.handle(cmd).await;
        }

        info!(rundown = %self.rundown.id(), "rundown service stopped");
    }

    async fn handle(&mut self, cmd: RundownCommand) {
        match cmd {
            RundownCommand::Activate { reply } => {
                let result = self.mutate("activate", Rundown::activate).await;
                let _ = reply.send(result);
            }
            RundownCommand::EnterRehearsal { reply } => {
                let result = self.mutate("rehearsal", Rundown::enter_rehearsal).await;
                let _ = reply.send(result);
            }
            RundownCommand::Deactivate { reply } => {
                let result = self.mutate("deactivate", Rundown::deactivate).await;
                let _ = reply.send(result);
            }
            RundownCommand::Reset { reply } => {
                let result = self.mutate("reset", Rundown::reset).await;
                let _ = reply.send(result);
            }
            RundownCommand::TakeNext { reply } => {
                let result = self.mutate("take", Rundown::take_next).await;
                let _ = reply.send(result);
            }
            RundownCommand::SetNext {
                segment_id,
                part_id,
                reply,
            } => {
                let result = self
                    .mutate("set next", |r| r.set_next(&segment_id, &part_id, Owner::External))
                    .await;
                let _ = reply.send(result);
            }
            RundownCommand::Apply { event, reply } => {
                let result = self.mutate("apply", |r| r.apply_change(event)).await;
                let _ = reply.send(result);
            }
            RundownCommand::Sync { segments, reply } => {
                let events = diff_segments(self.rundown.segments(), &segments);
                let count = events.len();
                let result = if count == 0 {
                    Ok(0)
                } else {
                    self.mutate("sync", |r| {
                        events.into_iter().try_for_each(|event| r.apply_change(event))
                    })
                    .await
                    .map(|()| count)
                };
                debug!(rundown = %self.rundown.id(), changes = count, "sync");
                let _ = reply.send(result);
            }
            RundownCommand::InsertAdlib { piece, reply } => {
                let result = self.mutate("adlib", |r| r.insert_adlib_piece(piece)).await;
                let _ = reply.send(result);
            }
            RundownCommand::StopLayers { layers, reply } => {
                let result = self
                    .mutate("stop layers", |r| r.stop_pieces_on_layers(&layers))
                    .await;
                let _ = reply.send(result);
            }
            RundownCommand::SetStudio { studio, reply } => {
                let result = match &self.store {
                    Some(store) => store.put_studio(studio.clone()).await,
                    None => Ok(()),
                };
                if result.is_ok() {
                    self.studio = studio;
                }
                let _ = reply.send(result);
            }
            RundownCommand::BuildTimeline { reply } => {
                let _ = reply.send(timeline::build(&self.rundown, Some(&self.studio)));
            }
            RundownCommand::Snapshot { reply } => {
                let _ = reply.send(self.rundown.clone());
            }
            RundownCommand::Shutdown => {}
        }
    }

    /// Run `op` on a draft, persist it, then swap it in
    async fn mutate<F>(&mut self, name: &str, op: F) -> Result<()>
    where
        F: FnOnce(&mut Rundown) -> Result<()>,
    {
        let mut draft = self.rundown.clone();
        if let Err(e) = op(&mut draft) {
            if e.is_fatal() {
                warn!(rundown = %self.rundown.id(), op = name, error = %e, "command failed");
            } else {
                debug!(rundown = %self.rundown.id(), op = name, error = %e, "command rejected");
            }
            return Err(e);
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&draft).await {
                warn!(rundown = %self.rundown.id(), op = name, error = %e, "persist failed");
                return Err(e);
            }
        }
        self.rundown = draft;
        Ok(())
    }
}

/// Cloneable handle to a running service
#[derive(Debug, Clone)]
pub struct RundownHandle {
    tx: mpsc::Sender<RundownCommand>,
}

impl RundownHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> RundownCommand) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| RundownError::ServiceStopped)?;
        rx.await.map_err(|_| RundownError::ServiceStopped)?
    }

    pub async fn activate(&self) -> Result<()> {
        self.request(|reply| RundownCommand::Activate { reply }).await
    }

    pub async fn enter_rehearsal(&self) -> Result<()> {
        self.request(|reply| RundownCommand::EnterRehearsal { reply }).await
    }

    pub async fn deactivate(&self) -> Result<()> {
        self.request(|reply| RundownCommand::Deactivate { reply }).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.request(|reply| RundownCommand::Reset { reply }).await
    }

    pub async fn take_next(&self) -> Result<()> {
        self.request(|reply| RundownCommand::TakeNext { reply }).await
    }

    /// Point the next cursor at a part, as an operator would
    pub async fn set_next(&self, segment_id: &str, part_id: &str) -> Result<()> {
        self.request(|reply| RundownCommand::SetNext {
            segment_id: segment_id.to_string(),
            part_id: part_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn apply(&self, event: ChangeEvent) -> Result<()> {
        self.request(|reply| RundownCommand::Apply { event, reply }).await
    }

    /// Bring the live segments in line with `segments`; returns the number of changes
    pub async fn sync(&self, segments: Vec<Segment>) -> Result<usize> {
        self.request(|reply| RundownCommand::Sync { segments, reply }).await
    }

    pub async fn insert_adlib(&self, piece: Piece) -> Result<()> {
        self.request(|reply| RundownCommand::InsertAdlib { piece, reply }).await
    }

    pub async fn stop_layers(&self, layers: BTreeSet<String>) -> Result<()> {
        self.request(|reply| RundownCommand::StopLayers { layers, reply }).await
    }

    pub async fn set_studio(&self, studio: Studio) -> Result<()> {
        self.request(|reply| RundownCommand::SetStudio { studio, reply }).await
    }

    pub async fn build_timeline(&self) -> Result<Timeline> {
        self.request(|reply| RundownCommand::BuildTimeline { reply }).await
    }

    /// Copy of the current rundown state
    pub async fn snapshot(&self) -> Result<Rundown> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RundownCommand::Snapshot { reply })
            .await
            .map_err(|_| RundownError::ServiceStopped)?;
        rx.await.map_err(|_| RundownError::ServiceStopped)
    }

    /// Ask the service to stop; a no-op if it already has
    pub async fn shutdown(&self) {
        let _ = self.tx.send(RundownCommand::Shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rundown::{Part, RundownMode};
    use crate::studio::{LookaheadMode, StudioLayer};
    use crate::timeline::active_group_id;

    fn rundown() -> Rundown {
        Rundown::new("r1", "Morning")
            .with_segment(
                Segment::new("s1", 1.0)
                    .with_part(Part::new("p1", 1.0).with_piece(Piece::new("cam", "camera")))
                    .with_part(Part::new("p2", 2.0)),
            )
            .with_segment(Segment::new("s2", 2.0).with_part(Part::new("p3", 1.0)))
    }

    fn studio() -> Studio {
        Studio::new("main").with_layer(StudioLayer::new("camera", LookaheadMode::WhenClear))
    }

    #[tokio::test]
    async fn test_take_and_build() {
        let (service, handle) = RundownService::new(rundown(), studio());
        let task = tokio::spawn(service.run());

        handle.activate().await.unwrap();
        handle.take_next().await.unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.mode(), RundownMode::Active);
        assert_eq!(snapshot.active_part().map(Part::id), Some("p1"));
        assert_eq!(snapshot.next_part().map(Part::id), Some("p2"));

        let timeline = handle.build_timeline().await.unwrap();
        assert!(timeline.group(&active_group_id("p1")).is_some());

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_command_keeps_state() {
        let (service, handle) = RundownService::new(rundown(), studio());
        let task = tokio::spawn(service.run());

        assert!(matches!(
            handle.take_next().await,
            Err(RundownError::NotActivated(_))
        ));
        handle.activate().await.unwrap();
        assert!(matches!(
            handle.activate().await,
            Err(RundownError::AlreadyActivated(_))
        ));
        handle.take_next().await.unwrap();
        assert!(matches!(
            handle.set_next("s1", "p1").await,
            Err(RundownError::OnAir(_))
        ));

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.next_part().map(Part::id), Some("p2"));

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_persists_mutations() {
        let store = RundownStore::in_memory();
        let (service, handle) = RundownService::new(rundown(), studio());
        let task = tokio::spawn(service.with_store(store.clone()).run());

        handle.activate().await.unwrap();
        handle.take_next().await.unwrap();
        handle.set_next("s2", "p3").await.unwrap();

        let loaded = store.load("r1").await.unwrap();
        assert_eq!(loaded.active_part().map(Part::id), Some("p1"));
        assert_eq!(loaded.next_part().map(Part::id), Some("p3"));

        handle.set_studio(Studio::new("backup")).await.unwrap();
        assert!(store.studio("backup").await.unwrap().is_some());

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_sync_applies_diff() {
        let (service, handle) = RundownService::new(rundown(), studio());
        let task = tokio::spawn(service.run());
        handle.activate().await.unwrap();
        handle.take_next().await.unwrap();

        let current = handle.snapshot().await.unwrap().segments().to_vec();
        assert_eq!(handle.sync(current.clone()).await.unwrap(), 0);

        let incoming: Vec<Segment> = current
            .into_iter()
            .filter(|s| s.id() != "s2")
            .chain(std::iter::once(
                Segment::new("s3", 3.0).with_part(Part::new("p4", 1.0)),
            ))
            .collect();
        assert_eq!(handle.sync(incoming).await.unwrap(), 2);

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.segment("s2").is_none());
        assert!(snapshot.segment("s3").is_some());

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_service() {
        let (service, handle) = RundownService::new(rundown(), studio());
        let task = tokio::spawn(service.run());
        handle.shutdown().await;
        task.await.unwrap();

        assert_eq!(handle.activate().await, Err(RundownError::ServiceStopped));
        assert!(matches!(handle.snapshot().await, Err(RundownError::ServiceStopped)));
    }
}
