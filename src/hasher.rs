//! Block and whole-file content hashing (C1).
//!
//! The canonical whole-file `contentHash` is the digest of the
//! concatenation of the ordered raw block digest *bytes* — not the hash
//! of the file bytes, and not a concatenation of hex strings. Both
//! halves of a peer exchange must agree on this; see the design notes on
//! the raw-bytes-vs-hex-string ambiguity this specification resolves.

use std::io::Read;
use std::path::Path;

use crate::error::SyncError;

/// Default block size, 64 KiB. Folders may override this; the engine
/// always treats it as a parameter, never a hardcoded constant.
pub const DEFAULT_BLOCK_SIZE: u32 = 64 * 1024;

/// Result of hashing a whole file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHash {
	pub size: u64,
	/// Ordered, hex-encoded block digests.
	pub blocks: Vec<String>,
	/// Hex-encoded digest of the concatenated raw block digest bytes.
	pub content_hash: String,
}

/// Hash `bytes` with BLAKE3, returning the lowercase hex digest.
pub fn block_hash(bytes: &[u8]) -> String {
	blake3::hash(bytes).to_hex().to_string()
}

/// Derive the canonical whole-file content hash from ordered block
/// digests, per the §4.1/§9 raw-bytes rule.
pub fn content_hash_of_blocks(block_digests: &[String]) -> Result<String, SyncError> {
	let mut hasher = blake3::Hasher::new();
	for digest in block_digests {
		let raw = hex::decode(digest)
			.map_err(|e| SyncError::integrity(format!("malformed block digest: {e}")))?;
		hasher.update(&raw);
	}
	Ok(hasher.finalize().to_hex().to_string())
}

/// Hash `path` in fixed-size blocks of `block_size` bytes, computing both
/// the per-block digests and the canonical whole-file content hash. A
/// short final block is included as-is.
pub fn hash_file(path: &Path, block_size: u32) -> Result<FileHash, SyncError> {
	let mut file = std::fs::File::open(path)?;
	hash_reader(&mut file, block_size)
}

/// Hash `bytes` in fixed-size blocks of `block_size` bytes, the same way
/// `hash_file` does for a path. Used where the data is already in memory
/// (e.g. `VersionStore::snapshot`) and re-reading it from disk would be
/// redundant.
pub fn hash_bytes(bytes: &[u8], block_size: u32) -> Result<FileHash, SyncError> {
	let block_size = block_size.max(1) as usize;
	let blocks: Vec<String> = bytes.chunks(block_size).map(block_hash).collect();
	let content_hash = content_hash_of_blocks(&blocks)?;
	Ok(FileHash { size: bytes.len() as u64, blocks, content_hash })
}

fn hash_reader(reader: &mut impl Read, block_size: u32) -> Result<FileHash, SyncError> {
	let mut buf = vec![0u8; block_size as usize];
	let mut blocks = Vec::new();
	let mut size = 0u64;

	loop {
		let n = read_up_to(reader, &mut buf)?;
		if n == 0 {
			break;
		}
		blocks.push(block_hash(&buf[..n]));
		size += n as u64;
		if n < buf.len() {
			break;
		}
	}

	let content_hash = content_hash_of_blocks(&blocks)?;
	Ok(FileHash { size, blocks, content_hash })
}

/// Content-defined chunk boundaries, via `rollsum`'s `Bup` rolling
/// checksum (C1): unlike `hash_file`'s fixed-size blocks, a boundary here
/// is wherever the rolling checksum's low `chunk_bits` bits go to zero,
/// so an insertion upstream of a chunk shifts only that chunk, not every
/// fixed-offset block after it. Grounded on the teacher's `serve.rs`
/// chunk-upload loop, which drives `Bup::new_with_chunk_bits` +
/// `find_chunk_edge` over a capped read buffer the same way.
pub fn rolling_hash(stream: &mut impl Read, chunk_bits: u32) -> Result<Vec<String>, SyncError> {
	let max_chunk_size = (1usize << chunk_bits) * 16;
	let mut buf = vec![0u8; max_chunk_size];
	let mut digests = Vec::new();
	let mut pending = Vec::new();

	loop {
		let n = read_up_to(stream, &mut buf)?;
		if n == 0 {
			break;
		}
		pending.extend_from_slice(&buf[..n]);

		let mut start = 0;
		while start < pending.len() {
			let end = (start + max_chunk_size).min(pending.len());
			let mut bup = rollsum::Bup::new_with_chunk_bits(chunk_bits);
			match bup.find_chunk_edge(&pending[start..end]) {
				Some((count, _)) => {
					digests.push(block_hash(&pending[start..start + count]));
					start += count;
				}
				None if end - start == max_chunk_size => {
					digests.push(block_hash(&pending[start..end]));
					start = end;
				}
				None => break,
			}
		}
		pending.drain(..start);
	}
	if !pending.is_empty() {
		digests.push(block_hash(&pending));
	}
	Ok(digests)
}

/// Read up to `buf.len()` bytes, looping over short reads, returning the
/// number of bytes actually read (0 at EOF).
fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
	let mut total = 0;
	while total < buf.len() {
		match reader.read(&mut buf[total..]) {
			Ok(0) => break,
			Ok(n) => total += n,
			Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
			Err(e) => return Err(e),
		}
	}
	Ok(total)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::NamedTempFile;

	fn write_temp(bytes: &[u8]) -> NamedTempFile {
		use std::io::Write;
		let mut f = NamedTempFile::new().unwrap();
		f.write_all(bytes).unwrap();
		f.flush().unwrap();
		f
	}

	#[test]
	fn identical_bytes_produce_identical_hash_and_blocks() {
		let f1 = write_temp(b"hello world, this is a test of block hashing");
		let f2 = write_temp(b"hello world, this is a test of block hashing");
		let h1 = hash_file(f1.path(), 8).unwrap();
		let h2 = hash_file(f2.path(), 8).unwrap();
		assert_eq!(h1.content_hash, h2.content_hash);
		assert_eq!(h1.blocks, h2.blocks);
	}

	#[test]
	fn content_hash_is_not_the_hash_of_raw_bytes() {
		let f = write_temp(b"abcdefgh");
		let h = hash_file(f.path(), 4).unwrap();
		let naive = block_hash(b"abcdefgh");
		assert_ne!(h.content_hash, naive);
	}

	#[test]
	fn one_byte_difference_shares_a_block_prefix() {
		let f1 = write_temp(b"AAAABBBBCCCCDDDD");
		let f2 = write_temp(b"AAAABBBBXCCCDDDD");
		let h1 = hash_file(f1.path(), 4).unwrap();
		let h2 = hash_file(f2.path(), 4).unwrap();
		assert_eq!(h1.blocks[0], h2.blocks[0]);
		assert_eq!(h1.blocks[1], h2.blocks[1]);
		assert_ne!(h1.blocks[2], h2.blocks[2]);
	}

	#[test]
	fn hash_bytes_matches_hash_file_for_the_same_content() {
		let f = write_temp(b"AAAABBBBCCCCDDDD");
		let from_file = hash_file(f.path(), 4).unwrap();
		let from_bytes = hash_bytes(b"AAAABBBBCCCCDDDD", 4).unwrap();
		assert_eq!(from_file, from_bytes);
	}

	#[test]
	fn rolling_hash_is_deterministic_and_splits_large_input_into_multiple_chunks() {
		let mut bytes = vec![0u8; 20_000];
		for (i, b) in bytes.iter_mut().enumerate() {
			*b = (i % 251) as u8;
		}
		let chunks_a = rolling_hash(&mut std::io::Cursor::new(&bytes), 8).unwrap();
		let chunks_b = rolling_hash(&mut std::io::Cursor::new(&bytes), 8).unwrap();
		assert_eq!(chunks_a, chunks_b);
		assert!(chunks_a.len() > 1);
	}

	#[test]
	fn rolling_hash_tail_edit_leaves_leading_chunks_unchanged() {
		let mut bytes = vec![0u8; 20_000];
		for (i, b) in bytes.iter_mut().enumerate() {
			*b = (i % 251) as u8;
		}
		let mut edited = bytes.clone();
		let last = edited.len() - 1;
		edited[last] ^= 0xFF;

		let chunks = rolling_hash(&mut std::io::Cursor::new(&bytes), 8).unwrap();
		let chunks_edited = rolling_hash(&mut std::io::Cursor::new(&edited), 8).unwrap();
		assert!(chunks.len() > 1);
		assert_eq!(chunks[..chunks.len() - 1], chunks_edited[..chunks_edited.len() - 1]);
		assert_ne!(chunks.last(), chunks_edited.last());
	}

	#[test]
	fn rolling_hash_of_empty_stream_is_empty() {
		let chunks = rolling_hash(&mut std::io::Cursor::new(&[] as &[u8]), 8).unwrap();
		assert!(chunks.is_empty());
	}

	#[test]
	fn zero_byte_file_has_a_defined_stable_hash() {
		let f = write_temp(b"");
		let h = hash_file(f.path(), 64 * 1024).unwrap();
		assert_eq!(h.size, 0);
		assert!(h.blocks.is_empty());
		assert_eq!(h.content_hash, content_hash_of_blocks(&[]).unwrap());
	}

	#[test]
	fn short_final_block_is_included_as_is() {
		let f = write_temp(b"AAAABB");
		let h = hash_file(f.path(), 4).unwrap();
		assert_eq!(h.blocks.len(), 2);
		assert_eq!(h.size, 6);
	}
}

// vim: ts=4
