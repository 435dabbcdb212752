//! # Vircadia Client
//!
//! The session layer of the Vircadia protocol stack: packet dispatch, the
//! domain connection state machine with its once-per-second check-in, and
//! the directory of remote service nodes.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ NodeList     check-in timer, inbound pump, node directory    │
//! ├──────────────────┬──────────────────┬────────────────────────┤
//! │ DomainHandler    │ PacketReceiver   │ Node                   │
//! │ (state machine)  │ (type dispatch)  │ (service endpoints)    │
//! ├──────────────────┴──────────────────┴────────────────────────┤
//! │ vircadia-transport            (multiplexed WebRTC socket)    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Consumers (audio, avatar, entity, message subsystems) register with the
//! [`PacketReceiver`] for the packet types they handle and send through the
//! [`NodeList`]; connection state reaches them through the signals on the
//! [`DomainHandler`] and [`NodeList`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod domain_handler;
pub mod node;
pub mod node_list;
pub mod protocol;
pub mod receiver;
pub mod signal;

pub use config::ClientConfig;
pub use domain_handler::{DomainHandler, DomainState};
pub use node_list::NodeList;
pub use node::Node;
pub use protocol::{ConnectReason, DomainList, DomainListNode};
pub use receiver::{Listener, ListenerCallback, PacketReceiver};
pub use signal::Signal;

/// Nominal period of the domain check-in timer.
pub const CHECKIN_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// Consecutive unanswered check-ins before the domain connection is
/// considered timed out.
pub const MAX_SILENT_CHECKINS: u32 = 6;
