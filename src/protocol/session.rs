//! PeerSession (C9): multiplexes the three request/reply pairs of
//! §4.9/§6.2 over an injected [`SecureChannel`].

use crate::error::SyncError;
use crate::protocol::messages::{Message, RemoteFileEntry};
use crate::protocol::traits::SecureChannel;
use crate::protocol::types::{ReplayDetector, TokenBucket};

pub struct PeerSession {
	peer_id: String,
	channel: Box<dyn SecureChannel>,
	bucket: TokenBucket,
	replay: ReplayDetector,
}

impl PeerSession {
	pub fn new(peer_id: String, channel: Box<dyn SecureChannel>) -> Self {
		PeerSession { peer_id, channel, bucket: TokenBucket::default(), replay: ReplayDetector::new() }
	}

	pub fn peer_id(&self) -> &str {
		&self.peer_id
	}

	pub async fn request_file_list(&mut self, folder_id: &str) -> Result<Vec<RemoteFileEntry>, SyncError> {
		self.channel
			.send(Message::FileListRequest { peer_id: self.peer_id.clone(), folder_id: folder_id.to_string() })
			.await?;
		match self.recv_authenticated().await? {
			Message::FileListResponse { files, .. } => Ok(files),
			Message::FileListError { error, .. } => Err(SyncError::protocol_violation(error)),
			other => Err(SyncError::protocol_violation(format!(
				"unexpected reply to file-list-request: {other:?}"
			))),
		}
	}

	pub async fn send_heartbeat(&mut self) -> Result<(), SyncError> {
		self.channel.send(Message::Heartbeat { peer_id: self.peer_id.clone() }).await
	}

	pub async fn send_message(&mut self, message: Message) -> Result<(), SyncError> {
		self.channel.send(message).await
	}

	/// Receives the next frame, applying the token-bucket and replay
	/// checks every inbound frame must pass (§4.9) before the payload is
	/// handed to the caller.
	pub async fn recv_authenticated(&mut self) -> Result<Message, SyncError> {
		let frame = self
			.channel
			.recv()
			.await?
			.ok_or_else(|| SyncError::network("secure channel closed"))?;
		if frame.message.peer_id() != self.peer_id {
			return Err(SyncError::protocol_violation(format!(
				"frame claims peerId {} on a session paired with {}",
				frame.message.peer_id(),
				self.peer_id
			)));
		}
		if !self.bucket.take() {
			return Err(SyncError::policy(format!("rate limit exceeded for peer {}", self.peer_id)));
		}
		if !self.replay.check(frame.nonce) {
			return Err(SyncError::policy(format!("replayed frame from peer {}", self.peer_id)));
		}
		Ok(frame.message)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::protocol::traits::InboundFrame;
	use async_trait::async_trait;
	use std::collections::VecDeque;
	use tokio::sync::Mutex;

	struct LoopbackChannel {
		inbox: Mutex<VecDeque<InboundFrame>>,
	}

	impl LoopbackChannel {
		fn new(frames: Vec<InboundFrame>) -> Self {
			LoopbackChannel { inbox: Mutex::new(frames.into()) }
		}
	}

	#[async_trait]
	impl SecureChannel for LoopbackChannel {
		async fn send(&mut self, _message: Message) -> Result<(), SyncError> {
			Ok(())
		}

		async fn recv(&mut self) -> Result<Option<InboundFrame>, SyncError> {
			Ok(self.inbox.lock().await.pop_front())
		}
	}

	#[tokio::test]
	async fn request_file_list_returns_files_from_response() {
		let channel = LoopbackChannel::new(vec![InboundFrame {
			nonce: 1,
			message: Message::FileListResponse {
				peer_id: "peer1".to_string(),
				folder_id: "f1".to_string(),
				files: vec![RemoteFileEntry {
					relative_path: "a.txt".to_string(),
					entry_type: crate::types::EntryKind::File,
					size: 10,
					hash: Some("h1".to_string()),
					modified_at: 100,
				}],
			},
		}]);
		let mut session = PeerSession::new("peer1".to_string(), Box::new(channel));
		let files = session.request_file_list("f1").await.unwrap();
		assert_eq!(files.len(), 1);
		assert_eq!(files[0].relative_path, "a.txt");
	}

	#[tokio::test]
	async fn replayed_nonce_is_rejected() {
		let channel = LoopbackChannel::new(vec![
			InboundFrame { nonce: 7, message: Message::HeartbeatAck { peer_id: "peer1".to_string() } },
			InboundFrame { nonce: 7, message: Message::HeartbeatAck { peer_id: "peer1".to_string() } },
		]);
		let mut session = PeerSession::new("peer1".to_string(), Box::new(channel));
		assert!(session.recv_authenticated().await.is_ok());
		assert!(session.recv_authenticated().await.is_err());
	}

	#[tokio::test]
	async fn frame_from_wrong_peer_id_is_a_protocol_violation() {
		let channel = LoopbackChannel::new(vec![InboundFrame {
			nonce: 1,
			message: Message::HeartbeatAck { peer_id: "someone-else".to_string() },
		}]);
		let mut session = PeerSession::new("peer1".to_string(), Box::new(channel));
		let err = session.recv_authenticated().await.unwrap_err();
		assert_eq!(err.kind, crate::error::ErrorKind::ProtocolViolation);
	}
}

// vim: ts=4
