//! Peer-to-peer wire protocol (§4.9/§6.2).
//!
//! `PeerSession` is the sync engine's only dependency on the network: it
//! multiplexes the typed message set in [`messages`] over an injected
//! [`traits::SecureChannel`], the same trait-object separation the
//! teacher's deleted `SyncProtocol` trait used to keep sync logic free
//! of transport-specific detail.

pub mod messages;
pub mod session;
pub mod traits;
pub mod types;

pub use messages::Message;
pub use session::PeerSession;
pub use traits::SecureChannel;

// vim: ts=4
