//! Shared UI event bus.
//!
//! Peers sharing a facility + sector replicate UI operations, not state: each
//! event is re-applied through the same reducer the local action used. Events
//! received from a peer are always applied with [`Broadcast::Suppress`] so a
//! receive never produces an outbound emission.

use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};
use thiserror::Error;
use tracing::{debug, warn};

use crate::windows::{Asel, EdstWindow, WindowPosition};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum SharedUiEvent {
    SetAsel(Option<Asel>),
    #[serde(rename_all = "camelCase")]
    OpenWindow {
        window: EdstWindow,
        opened_by: Option<EdstWindow>,
    },
    CloseWindow(Vec<EdstWindow>),
    PushZStack(EdstWindow),
    CloseAllMenus,
    CloseAircraftMenus,
    #[serde(rename_all = "camelCase")]
    SetWindowPosition {
        window: EdstWindow,
        position: Option<WindowPosition>,
    },
    RouteMenuSetTrialPlan(bool),
    RouteMenuClickAppendStar,
    RouteMenuClickAppendOplus,
    SetSelectedPlanIndex(Option<usize>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Broadcast {
    Emit,
    Suppress,
}

/// Channel key: peers only exchange events within the same facility + sector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub artcc_id: String,
    pub sector_id: String,
}

impl Room {
    pub fn new(artcc_id: &str, sector_id: &str) -> Self {
        Self {
            artcc_id: artcc_id.trim().to_ascii_uppercase(),
            sector_id: sector_id.trim().to_ascii_uppercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub room: Room,
    pub origin: String,
    pub event: SharedUiEvent,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("peer channel closed")]
    Closed,
    #[error("peer io: {0}")]
    Io(#[from] std::io::Error),
    #[error("envelope encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait PeerChannel: Send {
    fn send(&mut self, envelope: &Envelope) -> Result<(), ChannelError>;
}

#[derive(Default)]
pub struct SharedUiBus {
    room: Option<Room>,
    origin: String,
    channel: Option<Box<dyn PeerChannel>>,
    emitted: u64,
    dropped: u64,
}

impl std::fmt::Debug for SharedUiBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedUiBus")
            .field("room", &self.room)
            .field("origin", &self.origin)
            .field("attached", &self.channel.is_some())
            .field("emitted", &self.emitted)
            .finish()
    }
}

impl SharedUiBus {
    pub fn new(room: Room, origin: impl Into<String>) -> Self {
        Self {
            room: Some(room),
            origin: origin.into(),
            ..Self::default()
        }
    }

    /// A bus with no room never emits.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, channel: Box<dyn PeerChannel>) {
        self.channel = Some(channel);
    }

    pub fn is_attached(&self) -> bool {
        self.channel.is_some()
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Outbound emissions attempted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Inbound envelopes rejected by `accepts`.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Fire-and-forget; transport errors are logged, never surfaced.
    pub fn emit(&mut self, event: &SharedUiEvent) {
        let (Some(room), Some(channel)) = (self.room.as_ref(), self.channel.as_mut()) else {
            return;
        };
        let envelope = Envelope {
            room: room.clone(),
            origin: self.origin.clone(),
            event: event.clone(),
        };
        self.emitted += 1;
        if let Err(err) = channel.send(&envelope) {
            warn!("shared ui emit failed: {err}");
        }
    }

    /// Whether an inbound envelope belongs to this room and came from a peer.
    pub fn accepts(&mut self, envelope: &Envelope) -> bool {
        let ok = self.room.as_ref() == Some(&envelope.room) && envelope.origin != self.origin;
        if !ok {
            self.dropped += 1;
            debug!(
                "dropping envelope from {} for {:?}",
                envelope.origin, envelope.room
            );
        }
        ok
    }
}

/// In-process transport: sends land in the paired peer's inbox.
#[derive(Debug)]
pub struct LoopbackChannel {
    tx: Sender<Envelope>,
}

impl PeerChannel for LoopbackChannel {
    fn send(&mut self, envelope: &Envelope) -> Result<(), ChannelError> {
        self.tx.send(envelope.clone()).map_err(|_| ChannelError::Closed)
    }
}

#[derive(Debug)]
pub struct LoopbackEnd {
    pub channel: LoopbackChannel,
    pub inbox: Receiver<Envelope>,
}

/// Two connected ends; what one end sends the other receives.
pub fn loopback_pair() -> (LoopbackEnd, LoopbackEnd) {
    let (a_tx, a_rx) = mpsc::channel();
    let (b_tx, b_rx) = mpsc::channel();
    (
        LoopbackEnd {
            channel: LoopbackChannel { tx: b_tx },
            inbox: a_rx,
        },
        LoopbackEnd {
            channel: LoopbackChannel { tx: a_tx },
            inbox: b_rx,
        },
    )
}
