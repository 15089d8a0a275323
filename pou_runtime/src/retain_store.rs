//! Durable storage for retain images.
//!
//! File format: one frame per file.
//!   [4-byte LE length][protobuf RetainFrame][32-byte SHA-256 of the protobuf bytes]
//!
//! Rules:
//!   - Saves replace the whole file: write `<path>.tmp`, fsync, rename
//!   - A frame that fails its length or digest check is `Corrupt`, never
//!     partially applied
//!   - A missing file means "nothing retained yet"
//!   - Images whose protobuf body exceeds 1 MiB are refused at save time

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use prost::Message;
use sha2::{Digest, Sha256};

use pou_kernel::retain::RetainImage;

use crate::error::StoreError;
use crate::proto_bridge::{image_to_proto, proto_to_image};
use crate::proto_types::ProtoRetainFrame;

const MAX_FRAME: usize = 1024 * 1024;
const DIGEST_LEN: usize = 32;

/// Where retained values go between power cycles.
pub trait RetainStore: Send {
    /// Most recently saved image, if any.
    fn load(&mut self) -> Result<Option<RetainImage>, StoreError>;

    fn save(&mut self, image: &RetainImage, cycle: u64) -> Result<(), StoreError>;
}

/// Single-file store.
#[derive(Debug, Clone)]
pub struct FileRetainStore {
    path: PathBuf,
}

impl FileRetainStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

/// Fails with `Oversized` for images that `decode_frame` would refuse.
pub fn encode_frame(image: &RetainImage, cycle: u64) -> Result<Vec<u8>, StoreError> {
    let body = image_to_proto(image, cycle).encode_to_vec();
    if body.len() > MAX_FRAME {
        return Err(StoreError::Oversized {
            len: body.len(),
            max: MAX_FRAME,
        });
    }
    let len = u32::try_from(body.len()).map_err(|_| StoreError::Oversized {
        len: body.len(),
        max: MAX_FRAME,
    })?;

    let mut out = Vec::with_capacity(4 + body.len() + DIGEST_LEN);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&body);
    out.extend_from_slice(&Sha256::digest(&body));
    Ok(out)
}

/// Returns the image and the cycle count it was saved at.
pub fn decode_frame(bytes: &[u8]) -> Result<(RetainImage, u64), StoreError> {
    let (len_bytes, rest) = bytes
        .split_first_chunk::<4>()
        .ok_or_else(|| StoreError::Corrupt(format!("frame too short: {} bytes", bytes.len())))?;

    let len = u32::from_le_bytes(*len_bytes) as usize;
    if len > MAX_FRAME || rest.len() != len + DIGEST_LEN {
        return Err(StoreError::Corrupt(format!(
            "frame length {} does not match file size {}",
            len,
            bytes.len()
        )));
    }

    let (body, digest) = rest.split_at(len);
    if Sha256::digest(body).as_slice() != digest {
        return Err(StoreError::Corrupt("digest mismatch".to_string()));
    }

    let frame = ProtoRetainFrame::decode(body).map_err(|e| StoreError::Decode(e.to_string()))?;
    Ok((proto_to_image(&frame)?, frame.cycle))
}

impl RetainStore for FileRetainStore {
    fn load(&mut self) -> Result<Option<RetainImage>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        let (image, cycle) = decode_frame(&bytes)?;
        tracing::debug!(path = ?self.path, cycle, vars = image.vars.len(), "loaded retain frame");
        Ok(Some(image))
    }

    fn save(&mut self, image: &RetainImage, cycle: u64) -> Result<(), StoreError> {
        let frame = encode_frame(image, cycle)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.tmp_path();
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&frame)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        tracing::trace!(path = ?self.path, cycle, "saved retain frame");
        Ok(())
    }
}

/// In-memory store. Clones share the same slot, so a handle kept by the
/// caller outlives the scheduler that owns the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryRetainStore {
    slot: Arc<Mutex<Slot>>,
}

#[derive(Debug, Default)]
struct Slot {
    image: Option<RetainImage>,
    cycle: u64,
    saves: u64,
}

impl MemoryRetainStore {
    pub fn image(&self) -> Option<RetainImage> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).image.clone()
    }

    /// Cycle count of the last save.
    pub fn cycle(&self) -> u64 {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).cycle
    }

    pub fn saves(&self) -> u64 {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).saves
    }
}

impl RetainStore for MemoryRetainStore {
    fn load(&mut self) -> Result<Option<RetainImage>, StoreError> {
        Ok(self.image())
    }

    fn save(&mut self, image: &RetainImage, cycle: u64) -> Result<(), StoreError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.image = Some(image.clone());
        slot.cycle = cycle;
        slot.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pou_kernel::programs::BatchCounter;
    use pou_kernel::retain::RetainedVar;
    use pou_kernel::Value;

    fn image() -> RetainImage {
        RetainImage::capture(&BatchCounter { total: 41, ..BatchCounter::default() })
    }

    #[test]
    fn missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileRetainStore::new(dir.path().join("retain.bin"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_replaces_previous_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("retain.bin");
        let mut store = FileRetainStore::new(&path);

        store.save(&image(), 10).unwrap();
        let mut newer = image();
        newer.vars[0].value = Value::Lint(42);
        store.save(&newer, 20).unwrap();

        assert_eq!(store.load().unwrap(), Some(newer));
        assert!(!store.tmp_path().exists());
        let (_, cycle) = decode_frame(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(cycle, 20);
    }

    #[test]
    fn flipped_byte_is_corrupt() {
        let mut bytes = encode_frame(&image(), 3).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xff;
        assert!(matches!(decode_frame(&bytes), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn truncated_frame_is_corrupt() {
        let bytes = encode_frame(&image(), 3).unwrap();
        assert!(matches!(decode_frame(&bytes[..bytes.len() - 1]), Err(StoreError::Corrupt(_))));
        assert!(matches!(decode_frame(&bytes[..2]), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn memory_store_handles_share_state() {
        let handle = MemoryRetainStore::default();
        let mut boxed: Box<dyn RetainStore> = Box::new(handle.clone());
        boxed.save(&image(), 7).unwrap();
        assert_eq!(handle.image(), Some(image()));
        assert_eq!((handle.cycle(), handle.saves()), (7, 1));
    }

    #[test]
    fn oversized_image_is_refused_and_nothing_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retain.bin");
        let mut store = FileRetainStore::new(&path);
        store.save(&image(), 1).unwrap();

        let mut huge = image();
        huge.vars = (0..100_000)
            .map(|i| RetainedVar {
                name: format!("accumulator_{:06}", i),
                value: Value::Lreal(i as f64),
            })
            .collect();

        let err = store.save(&huge, 2).unwrap_err();
        assert!(matches!(err, StoreError::Oversized { len, max: MAX_FRAME } if len > MAX_FRAME));
        assert!(!store.tmp_path().exists());
        assert_eq!(store.load().unwrap(), Some(image()), "previous frame is untouched");
    }
}
