// ============================================================
// Layer 3 — Image Set Domain Type
// ============================================================
// A batch of images and their class ids, stored the way the
// rest of the system thinks about them:
//
//   pixels: flat Vec<f32> in [N, 32, 32, 3] (NHWC) order
//   labels: one class id per image, in [0, 10)
//
// Image i occupies pixels[i * IMAGE_LEN .. (i + 1) * IMAGE_LEN]
// and inside one image the index of (y, x, c) is
//   (y * IMAGE_WIDTH + x) * IMAGE_CHANNELS + c
//
// Reference: Rust Book §5 (Structs and Methods)
//            Rust Book §8 (Vectors)

use anyhow::{ensure, Result};

/// Image height in pixels
pub const IMAGE_HEIGHT: usize = 32;

/// Image width in pixels
pub const IMAGE_WIDTH: usize = 32;

/// Colour channels per pixel (RGB)
pub const IMAGE_CHANNELS: usize = 3;

/// Number of f32 values in one image
pub const IMAGE_LEN: usize = IMAGE_HEIGHT * IMAGE_WIDTH * IMAGE_CHANNELS;

/// Number of target classes
pub const NUM_CLASSES: usize = 10;

/// Human-readable CIFAR-10 class names, indexed by label
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "airplane", "automobile", "bird", "cat", "deer",
    "dog", "frog", "horse", "ship", "truck",
];

/// Paired image and label arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSet {
    /// Pixel values, NHWC, `len() * IMAGE_LEN` entries
    pub pixels: Vec<f32>,

    /// Class ids, one per image
    pub labels: Vec<u8>,
}

impl ImageSet {
    /// Build an ImageSet, checking that pixel count and labels agree
    /// and every label is a valid class id.
    pub fn new(pixels: Vec<f32>, labels: Vec<u8>) -> Result<Self> {
        ensure!(
            pixels.len() == labels.len() * IMAGE_LEN,
            "pixel buffer holds {} values, expected {} for {} images of {}x{}x{}",
            pixels.len(),
            labels.len() * IMAGE_LEN,
            labels.len(),
            IMAGE_HEIGHT,
            IMAGE_WIDTH,
            IMAGE_CHANNELS,
        );
        if let Some(bad) = labels.iter().find(|&&l| l as usize >= NUM_CLASSES) {
            anyhow::bail!("label {bad} is outside [0, {NUM_CLASSES})");
        }
        Ok(Self { pixels, labels })
    }

    /// Number of images
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Tensor shape of the whole set: [N, H, W, C]
    pub fn shape(&self) -> [usize; 4] {
        [self.len(), IMAGE_HEIGHT, IMAGE_WIDTH, IMAGE_CHANNELS]
    }

    /// Borrow the pixels of image `index`
    pub fn image(&self, index: usize) -> &[f32] {
        &self.pixels[index * IMAGE_LEN..(index + 1) * IMAGE_LEN]
    }

    /// How many images belong to each class
    pub fn class_counts(&self) -> [usize; NUM_CLASSES] {
        let mut counts = [0usize; NUM_CLASSES];
        for &l in &self.labels {
            counts[l as usize] += 1;
        }
        counts
    }
}

/// One-hot encode a class id into a length-10 vector.
pub fn one_hot(label: u8) -> [f32; NUM_CLASSES] {
    let mut v = [0.0f32; NUM_CLASSES];
    v[label as usize] = 1.0;
    v
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_mismatched_lengths() {
        let result = ImageSet::new(vec![0.0; IMAGE_LEN + 1], vec![3]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_out_of_range_label() {
        let result = ImageSet::new(vec![0.0; IMAGE_LEN], vec![10]);
        assert!(result.is_err());
    }

    #[test]
    fn test_image_slices_follow_nhwc() {
        let mut pixels = vec![0.0; 2 * IMAGE_LEN];
        pixels[IMAGE_LEN] = 7.0;
        let set = ImageSet::new(pixels, vec![1, 2]).unwrap();
        assert_eq!(set.shape(), [2, 32, 32, 3]);
        assert_eq!(set.image(1)[0], 7.0);
        assert_eq!(set.image(0)[0], 0.0);
    }

    #[test]
    fn test_one_hot() {
        let v = one_hot(4);
        assert_eq!(v.iter().sum::<f32>(), 1.0);
        assert_eq!(v[4], 1.0);
    }

    #[test]
    fn test_class_counts() {
        let set = ImageSet::new(vec![0.0; 3 * IMAGE_LEN], vec![0, 9, 9]).unwrap();
        let counts = set.class_counts();
        assert_eq!(counts[0], 1);
        assert_eq!(counts[9], 2);
    }
}
