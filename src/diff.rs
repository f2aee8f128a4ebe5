//! DiffEngine (C6): fixed-block delta between a base file and a target
//! file.
//!
//! Grounded on `hasher.rs`'s block hashing (the block index comparison
//! reuses `hasher::block_hash` so a base block and a target block are
//! considered equal under exactly the same digest the rest of the crate
//! already trusts for content identity).

use std::path::Path;

use crate::error::SyncError;
use crate::hasher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOp {
	/// Copy `length` bytes from the base file starting at `src_offset`,
	/// writing them to the output starting at `dst_offset`. The two
	/// offsets coincide only when the matching base block never moved;
	/// a block relocated to a different position needs both.
	Copy { src_offset: u64, dst_offset: u64, length: u64 },
	/// Write `bytes` at `dst_offset` in the output.
	Insert { dst_offset: u64, bytes: Vec<u8> },
	/// A hole to be zero-filled at `dst_offset`; only emitted when the
	/// target is explicitly shorter than a straightforward copy/insert
	/// sequence would produce.
	Delete { dst_offset: u64, length: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct Delta {
	pub ops: Vec<DeltaOp>,
	pub target_length: u64,
}

/// Computes the delta that turns `base_path` into `target_path`, blocked
/// at `block_size`.
pub fn diff(base_path: &Path, target_path: &Path, block_size: usize) -> Result<Delta, SyncError> {
	let base_blocks = read_blocks(base_path, block_size)?;
	let target_blocks = read_blocks(target_path, block_size)?;

	let base_index: std::collections::HashMap<String, u64> = base_blocks
		.iter()
		.enumerate()
		.map(|(i, b)| (hasher::block_hash(b), i as u64 * block_size as u64))
		.collect();

	let mut ops = Vec::new();
	let mut dst_offset: u64 = 0;
	for block in &target_blocks {
		let digest = hasher::block_hash(block);
		if let Some(&src_offset) = base_index.get(&digest) {
			ops.push(DeltaOp::Copy { src_offset, dst_offset, length: block.len() as u64 });
		} else {
			ops.push(DeltaOp::Insert { dst_offset, bytes: block.clone() });
		}
		dst_offset += block.len() as u64;
	}

	Ok(Delta { ops, target_length: dst_offset })
}

fn read_blocks(path: &Path, block_size: usize) -> Result<Vec<Vec<u8>>, SyncError> {
	let bytes = std::fs::read(path)?;
	if bytes.is_empty() {
		return Ok(Vec::new());
	}
	Ok(bytes.chunks(block_size).map(|c| c.to_vec()).collect())
}

/// Applies `delta` against `base_path`, producing the target bytes.
/// The output buffer is sized to `delta.target_length` and truncated to
/// it regardless of how far a `copy`/`insert` op writes.
pub fn apply(base_path: &Path, delta: &Delta) -> Result<Vec<u8>, SyncError> {
	let base = std::fs::read(base_path)?;
	let mut out = vec![0u8; delta.target_length as usize];
	for op in &delta.ops {
		match op {
			DeltaOp::Copy { src_offset, dst_offset, length } => {
				let start = *src_offset as usize;
				let end = (start + *length as usize).min(base.len());
				let dst_start = out.len().min(*dst_offset as usize);
				let copy_len = end.saturating_sub(start).min(out.len() - dst_start);
				out[dst_start..dst_start + copy_len].copy_from_slice(&base[start..start + copy_len]);
			}
			DeltaOp::Insert { dst_offset, bytes } => {
				let start = *dst_offset as usize;
				let end = (start + bytes.len()).min(out.len());
				if end > start {
					out[start..end].copy_from_slice(&bytes[..end - start]);
				}
			}
			DeltaOp::Delete { .. } => {}
		}
	}
	out.truncate(delta.target_length as usize);
	Ok(out)
}


// vim: ts=4
