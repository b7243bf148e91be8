// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! A [`Listener`] that forwards events into a tokio channel.

use codeckit_core::error::CodecError;
use codeckit_core::{DrainMode, Listener, WorkItem};
use tokio::sync::mpsc;

/// Something a component reported.
#[derive(Debug)]
pub enum ListenerEvent {
    WorkDone(WorkItem),
    DrainFailed { mode: DrainMode, error: CodecError },
    Error { error: CodecError, abandoned: Vec<WorkItem> },
}

/// Forwards completions to an async consumer. Never blocks the processing thread.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<ListenerEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ListenerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Listener for ChannelListener {
    fn on_work_done(&self, items: Vec<WorkItem>) {
        for work in items {
            if self.tx.send(ListenerEvent::WorkDone(work)).is_err() {
                tracing::debug!("Listener receiver dropped, discarding completion");
                return;
            }
        }
    }

    fn on_drain_error(&self, mode: DrainMode, error: &CodecError) {
        tracing::warn!(mode = mode.as_str(), %error, "Component reported a failed drain");
        let _ = self.tx.send(ListenerEvent::DrainFailed { mode, error: error.clone() });
    }

    fn on_error(&self, error: &CodecError, abandoned: Vec<WorkItem>) {
        tracing::error!(%error, abandoned = abandoned.len(), "Component reported a fatal error");
        let _ = self.tx.send(ListenerEvent::Error { error: error.clone(), abandoned });
    }
}
