use burn::data::dataset::Dataset;

use crate::domain::image::ImageSet;

/// One image with its class id.
/// `pixels` is a single NHWC image (IMAGE_LEN floats). `index` is the
/// image's position in its set; augmentation seeds are derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSample {
    pub pixels: Vec<f32>,
    pub label:  u8,
    pub index:  usize,
}

/// An ImageSet exposed through Burn's Dataset trait so the
/// DataLoader can call .get(index) and .len() on it.
pub struct ImageDataset {
    set: ImageSet,
}

impl ImageDataset {
    pub fn new(set: ImageSet) -> Self { Self { set } }
}

impl Dataset<ImageSample> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageSample> {
        if index >= self.set.len() {
            return None;
        }
        Some(ImageSample {
            pixels: self.set.image(index).to_vec(),
            label:  self.set.labels[index],
            index,
        })
    }

    fn len(&self) -> usize {
        self.set.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::image::IMAGE_LEN;

    #[test]
    fn test_get_returns_image_label_and_index() {
        let mut pixels = vec![0.0; 2 * IMAGE_LEN];
        pixels[IMAGE_LEN + 1] = 9.0;
        let ds = ImageDataset::new(ImageSet::new(pixels, vec![4, 5]).unwrap());

        let s = ds.get(1).unwrap();
        assert_eq!(s.label, 5);
        assert_eq!(s.index, 1);
        assert_eq!(s.pixels.len(), IMAGE_LEN);
        assert_eq!(s.pixels[1], 9.0);
        assert!(ds.get(2).is_none());
        assert_eq!(ds.len(), 2);
    }
}
