//! `SecureChannel` (C9): the injected transport `PeerSession` sits atop.
//!
//! Grounded on the teacher's `SyncProtocol` trait — a trait object so
//! the concrete transport is swappable, the same shape the teacher used
//! to separate sync logic from protocol-specific plumbing, narrowed to
//! one authenticated/ordered/reliable byte-stream abstraction plus a
//! way to enqueue typed messages rather than three hand-rolled phases.

use async_trait::async_trait;

use crate::error::SyncError;
use crate::protocol::messages::Message;

/// One inbound frame: the decoded message plus the nonce the channel
/// attached, used by [`PeerSession`](super::session::PeerSession) for
/// replay detection.
#[derive(Debug, Clone)]
pub struct InboundFrame {
	pub nonce: u64,
	pub message: Message,
}

/// An authenticated, confidential, ordered, reliable channel between two
/// paired peers. Implementations own the actual transport (TLS socket,
/// in-process pipe for tests, etc.); `PeerSession` only depends on this
/// trait.
#[async_trait]
pub trait SecureChannel: Send + Sync {
	async fn send(&mut self, message: Message) -> Result<(), SyncError>;

	/// Returns `None` when the channel has closed cleanly.
	async fn recv(&mut self) -> Result<Option<InboundFrame>, SyncError>;
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::VecDeque;
	use tokio::sync::Mutex;

	/// An in-process loopback channel for exercising `PeerSession`
	/// without a real transport.
	pub struct LoopbackChannel {
		inbox: Mutex<VecDeque<InboundFrame>>,
		pub sent: Mutex<Vec<Message>>,
	}

	impl LoopbackChannel {
		pub fn new() -> Self {
			LoopbackChannel { inbox: Mutex::new(VecDeque::new()), sent: Mutex::new(Vec::new()) }
		}

		pub async fn push_inbound(&self, nonce: u64, message: Message) {
			self.inbox.lock().await.push_back(InboundFrame { nonce, message });
		}
	}

	#[async_trait]
	impl SecureChannel for LoopbackChannel {
		async fn send(&mut self, message: Message) -> Result<(), SyncError> {
			self.sent.lock().await.push(message);
			Ok(())
		}

		async fn recv(&mut self) -> Result<Option<InboundFrame>, SyncError> {
			Ok(self.inbox.lock().await.pop_front())
		}
	}

	#[tokio::test]
	async fn loopback_channel_delivers_pushed_frames_in_order() {
		let mut channel = LoopbackChannel::new();
		channel.push_inbound(1, Message::Heartbeat { peer_id: "p1".to_string() }).await;
		channel.push_inbound(2, Message::HeartbeatAck { peer_id: "p1".to_string() }).await;
		let first = channel.recv().await.unwrap().unwrap();
		assert_eq!(first.nonce, 1);
		let second = channel.recv().await.unwrap().unwrap();
		assert_eq!(second.nonce, 2);
	}
}

// vim: ts=4
