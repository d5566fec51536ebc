// ============================================================
// Layer 4 — CIFAR-10 Loader
// ============================================================
// Reads the binary distribution of CIFAR-10
// (cifar-10-batches-bin) from a directory.
//
// File layout:
//   data_batch_1.bin .. data_batch_5.bin  → 50 000 training images
//   test_batch.bin                        → 10 000 held-out images
//
// Every file is a plain sequence of 3073-byte records:
//   byte 0        → label (0..9)
//   bytes 1..1025 → red plane   (32x32, row-major)
//   bytes 1025..  → green plane
//   bytes 2049..  → blue plane
//
// The planes are stored channel-first (CHW). The rest of the
// system uses NHWC, so each record is transposed while decoding
// and the bytes are widened to f32 in [0, 255].
//
// Reference: https://www.cs.toronto.edu/~kriz/cifar.html
//            Rust Book §9 (Error Handling)

use anyhow::{ensure, Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::image::{ImageSet, IMAGE_CHANNELS, IMAGE_HEIGHT, IMAGE_LEN, IMAGE_WIDTH};
use crate::domain::traits::DatasetSource;

/// Training batch files, in the order they are concatenated
pub const TRAIN_FILES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];

/// Held-out evaluation file
pub const TEST_FILE: &str = "test_batch.bin";

/// One label byte followed by one image
const RECORD_LEN: usize = 1 + IMAGE_LEN;

/// Loads CIFAR-10 from a directory of binary batch files.
/// Implements the DatasetSource trait from Layer 3.
pub struct Cifar10Loader {
    /// Directory containing the *.bin batch files
    dir: PathBuf,
}

impl Cifar10Loader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn load_files(&self, names: &[&str]) -> Result<ImageSet> {
        ensure!(
            self.dir.is_dir(),
            "dataset directory '{}' does not exist. Download and extract \
             cifar-10-binary.tar.gz from https://www.cs.toronto.edu/~kriz/cifar.html",
            self.dir.display()
        );

        let mut pixels = Vec::new();
        let mut labels = Vec::new();

        for name in names {
            let set = load_batch_file(&self.dir.join(name))?;
            tracing::debug!("Loaded {} images from {}", set.len(), name);
            pixels.extend(set.pixels);
            labels.extend(set.labels);
        }

        ImageSet::new(pixels, labels)
    }
}

impl DatasetSource for Cifar10Loader {
    fn load_train(&self) -> Result<ImageSet> {
        let set = self.load_files(&TRAIN_FILES)?;
        tracing::info!("Loaded {} training images from '{}'", set.len(), self.dir.display());
        Ok(set)
    }

    fn load_test(&self) -> Result<ImageSet> {
        let set = self.load_files(&[TEST_FILE])?;
        tracing::info!("Loaded {} held-out images from '{}'", set.len(), self.dir.display());
        Ok(set)
    }
}

/// Read and decode one batch file
fn load_batch_file(path: &Path) -> Result<ImageSet> {
    let bytes = fs::read(path)
        .with_context(|| format!("Cannot read CIFAR-10 batch '{}'", path.display()))?;
    decode_records(&bytes)
        .with_context(|| format!("Malformed CIFAR-10 batch '{}'", path.display()))
}

/// Decode a buffer of 3073-byte records into an NHWC ImageSet.
pub fn decode_records(bytes: &[u8]) -> Result<ImageSet> {
    ensure!(
        bytes.len() % RECORD_LEN == 0,
        "length {} is not a multiple of the {RECORD_LEN}-byte record size",
        bytes.len()
    );

    let count      = bytes.len() / RECORD_LEN;
    let plane      = IMAGE_HEIGHT * IMAGE_WIDTH;
    let mut pixels = vec![0.0f32; count * IMAGE_LEN];
    let mut labels = Vec::with_capacity(count);

    for (i, record) in bytes.chunks_exact(RECORD_LEN).enumerate() {
        labels.push(record[0]);
        let chw = &record[1..];
        let out = &mut pixels[i * IMAGE_LEN..(i + 1) * IMAGE_LEN];

        // CHW → HWC
        for c in 0..IMAGE_CHANNELS {
            for p in 0..plane {
                out[p * IMAGE_CHANNELS + c] = chw[c * plane + p] as f32;
            }
        }
    }

    ImageSet::new(pixels, labels)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    /// Build one record whose red plane is 1, green 2, blue 3,
    /// except pixel (0, 1) which carries 10/20/30.
    fn record(label: u8) -> Vec<u8> {
        let plane = IMAGE_HEIGHT * IMAGE_WIDTH;
        let mut r = vec![label];
        for c in 0..3u8 {
            let mut ch = vec![c + 1; plane];
            ch[1] = (c + 1) * 10;
            r.extend(ch);
        }
        r
    }

    #[test]
    fn test_decodes_label_and_channel_order() {
        let set = decode_records(&record(6)).unwrap();
        assert_eq!(set.labels, vec![6]);
        // pixel (0,0) → [1,2,3], pixel (0,1) → [10,20,30]
        assert_eq!(&set.pixels[0..3], &[1.0, 2.0, 3.0]);
        assert_eq!(&set.pixels[3..6], &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_decodes_multiple_records() {
        let mut bytes = record(1);
        bytes.extend(record(8));
        let set = decode_records(&bytes).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.labels, vec![1, 8]);
    }

    #[test]
    fn test_truncated_buffer_is_an_error() {
        let mut bytes = record(1);
        bytes.pop();
        assert!(decode_records(&bytes).is_err());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let loader = Cifar10Loader::new("/definitely/not/here");
        assert!(loader.load_test().is_err());
    }

    #[test]
    fn test_loads_test_file_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = record(3);
        bytes.extend(record(4));
        fs::write(dir.path().join(TEST_FILE), bytes).unwrap();

        let set = Cifar10Loader::new(dir.path()).load_test().unwrap();
        assert_eq!(set.labels, vec![3, 4]);
    }
}
