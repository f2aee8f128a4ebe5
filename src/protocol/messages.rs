//! Wire protocol message types (§6.2).
//!
//! Replaces the teacher's internal-protocol `ProtocolCommand`/
//! `ProtocolResponse` enums with the exact message set named in the
//! specification. `data` in `TransferChunk` is base64 on the wire, the
//! convention the teacher's deleted v3 protocol used over JSON5.

use serde::{Deserialize, Serialize};

use crate::types::{EntryKind, Millis};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileEntry {
	pub relative_path: String,
	#[serde(rename = "type")]
	pub entry_type: EntryKind,
	pub size: u64,
	pub hash: Option<String>,
	pub modified_at: Millis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferFileInfo {
	pub relative_path: String,
	pub size: u64,
	pub hash: String,
	pub mtime: Millis,
}

mod base64_bytes {
	use base64::Engine;
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
		s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
		let text = String::deserialize(d)?;
		base64::engine::general_purpose::STANDARD
			.decode(text.as_bytes())
			.map_err(serde::de::Error::custom)
	}
}

/// One typed envelope of the wire protocol. `peerId` identifies the
/// sender; `PeerSession` fills it in on send and validates it on
/// receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Message {
	FileListRequest {
		peer_id: String,
		folder_id: String,
	},
	FileListResponse {
		peer_id: String,
		folder_id: String,
		files: Vec<RemoteFileEntry>,
	},
	FileListError {
		peer_id: String,
		error: String,
	},
	TransferInit {
		peer_id: String,
		transfer_id: String,
		file: TransferFileInfo,
		total_chunks: u32,
		chunk_size: u32,
		compressed: bool,
	},
	TransferInitAck {
		peer_id: String,
		transfer_id: String,
	},
	TransferChunk {
		peer_id: String,
		transfer_id: String,
		chunk_index: u32,
		#[serde(with = "base64_bytes")]
		data: Vec<u8>,
		hash: String,
	},
	ChunkAck {
		peer_id: String,
		transfer_id: String,
		chunk_index: u32,
	},
	ChunkError {
		peer_id: String,
		transfer_id: String,
		chunk_index: u32,
		message: String,
	},
	TransferComplete {
		peer_id: String,
		transfer_id: String,
		file_hash: String,
	},
	TransferError {
		peer_id: String,
		transfer_id: String,
		error: String,
	},
	RequestFile {
		peer_id: String,
		transfer_id: String,
		folder_id: String,
		relative_path: String,
		hash: Option<String>,
	},
	Heartbeat {
		peer_id: String,
	},
	HeartbeatAck {
		peer_id: String,
	},
}

impl Message {
	pub fn peer_id(&self) -> &str {
		match self {
			Message::FileListRequest { peer_id, .. }
			| Message::FileListResponse { peer_id, .. }
			| Message::FileListError { peer_id, .. }
			| Message::TransferInit { peer_id, .. }
			| Message::TransferInitAck { peer_id, .. }
			| Message::TransferChunk { peer_id, .. }
			| Message::ChunkAck { peer_id, .. }
			| Message::ChunkError { peer_id, .. }
			| Message::TransferComplete { peer_id, .. }
			| Message::TransferError { peer_id, .. }
			| Message::RequestFile { peer_id, .. }
			| Message::Heartbeat { peer_id }
			| Message::HeartbeatAck { peer_id } => peer_id,
		}
	}
}


// vim: ts=4
