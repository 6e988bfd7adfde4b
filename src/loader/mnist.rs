use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::{Error, Result};
use crate::tensor::BitTensor;

const IMAGE_MAGIC: u32 = 0x0000_0803;
const LABEL_MAGIC: u32 = 0x0000_0801;

/// Largest image the loader accepts, in pixels.
const MAX_IMAGE_PIXELS: usize = 1 << 20;
/// Upper bound on buffer space reserved from an untrusted header count.
const MAX_PREALLOC: usize = 65_536;

/// Default binarization cut-off: pixels brighter than this become 1.
pub const DEFAULT_THRESHOLD: u8 = 127;

fn open(path: &Path) -> Result<Box<dyn Read>> {
    let file = BufReader::new(File::open(path)?);
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut buf4 = [0u8; 4];
    reader.read_exact(&mut buf4)?;
    Ok(u32::from_be_bytes(buf4))
}

/// Binarized MNIST image dataset.
///
/// Reads the IDX3 image format (optionally gzip-compressed) and thresholds every
/// pixel into one bit.
pub struct BinaryMnist {
    imgs: Vec<BitTensor>,
    rows: usize,
    cols: usize,
}

impl BinaryMnist {
    pub fn new(path: impl AsRef<Path>, threshold: u8) -> Result<Self> {
        let path = path.as_ref();
        let mnist = Self::from_reader(&mut open(path)?, threshold)?;
        tracing::info!(
            path = %path.display(),
            images = mnist.len(),
            rows = mnist.rows,
            cols = mnist.cols,
            "loaded MNIST images"
        );
        Ok(mnist)
    }

    pub fn from_reader(reader: &mut impl Read, threshold: u8) -> Result<Self> {
        let magic_number = read_u32(reader)?;
        if magic_number != IMAGE_MAGIC {
            return Err(Error::InvalidDataset(format!(
                "expected MNIST image magic {:#010x}, got {:#010x}",
                IMAGE_MAGIC, magic_number
            )));
        }
        let num_imgs = read_u32(reader)? as usize;
        let rows = read_u32(reader)? as usize;
        let cols = read_u32(reader)? as usize;

        let pixel_count = rows.checked_mul(cols).filter(|&n| n <= MAX_IMAGE_PIXELS);
        let Some(pixel_count) = pixel_count else {
            return Err(Error::InvalidDataset(format!(
                "MNIST image size {}x{} exceeds {} pixels",
                rows, cols, MAX_IMAGE_PIXELS
            )));
        };

        let mut pixels = vec![0u8; pixel_count];
        let mut imgs = Vec::with_capacity(num_imgs.min(MAX_PREALLOC));
        for _ in 0..num_imgs {
            reader.read_exact(&mut pixels)?;
            imgs.push(BitTensor::from_fn(1, rows, cols, |_, h, w| {
                pixels[h * cols + w] > threshold
            }));
        }
        Ok(BinaryMnist { imgs, rows, cols })
    }

    pub fn at(&self, idx: usize) -> &BitTensor {
        &self.imgs[idx]
    }

    /// Image `idx` resampled to `width x width`.
    pub fn at_resized(&self, idx: usize, width: usize) -> BitTensor {
        self.imgs[idx].resize_nearest(width, width)
    }

    pub fn len(&self) -> usize {
        self.imgs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.imgs.is_empty()
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// ASCII rendering of image `idx`.
    pub fn render(&self, idx: usize) -> String {
        let img = self.at(idx);
        let mut out = String::with_capacity((img.w + 1) * img.h);
        for h in 0..img.h {
            for w in 0..img.w {
                out.push(if img.get(0, h, w) { 'x' } else { ' ' });
            }
            out.push('\n');
        }
        out
    }
}

/// MNIST label dataset loader.
///
/// Reads the IDX1 label format (optionally gzip-compressed).
pub struct MnistLabels {
    labels: Vec<u8>,
}

impl MnistLabels {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_reader(&mut open(path.as_ref())?)
    }

    pub fn from_reader(reader: &mut impl Read) -> Result<Self> {
        let magic = read_u32(reader)?;
        if magic != LABEL_MAGIC {
            return Err(Error::InvalidDataset(format!(
                "expected MNIST label magic {:#010x}, got {:#010x}",
                LABEL_MAGIC, magic
            )));
        }
        let num_labels = read_u32(reader)? as usize;
        let mut labels = Vec::with_capacity(num_labels.min(MAX_PREALLOC));
        reader.take(num_labels as u64).read_to_end(&mut labels)?;
        if labels.len() != num_labels {
            return Err(Error::InvalidDataset(format!(
                "MNIST label file declares {} labels but holds {}",
                num_labels,
                labels.len()
            )));
        }
        Ok(MnistLabels { labels })
    }

    pub fn at(&self, idx: usize) -> u8 {
        self.labels[idx]
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
