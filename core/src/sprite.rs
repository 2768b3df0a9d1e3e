//! Sprites, images and animation sequences loaded by the module loader
//! (feeds component E, consumed by the compositor in component J).
//!
//! Grounded on `gamos.h`'s `Sprite`/`Image`/`ImagePos` structures: a sprite
//! is a small catalogue of direction-keyed animation sequences, each a list
//! of frame placements. Images are loaded lazily — a frame can sit "cold"
//! in the archive (an offset plus a compressed size) until the first time
//! it's actually drawn.

use crate::archive::Archive;
use crate::codec;
use crate::error::FormatError;

/// One decoded (or not-yet-decoded) image.
#[derive(Debug, Clone, Default)]
pub struct Image {
    /// `None` until the pixels have been materialized from the archive.
    pub pixels: Option<Vec<u8>>,
    /// Archive byte offset of the compressed (or raw) source; `None` means
    /// there is no backing data at all (a placeholder frame).
    pub offset: Option<u64>,
    pub width: u32,
    pub height: u32,
    /// Compressed size in the archive; 0 means the source is stored raw.
    pub compressed_size: u32,
}

impl Image {
    pub fn is_loaded(&self) -> bool {
        self.pixels.is_some()
    }

    /// Materializes `pixels` from `raw` (exactly as read from the archive
    /// at `self.offset`), decompressing first if `compressed_size != 0`.
    /// A no-op if already loaded or there is no backing data.
    pub fn load(&mut self, raw: &[u8]) -> Result<(), FormatError> {
        if self.pixels.is_some() || self.offset.is_none() {
            return Ok(());
        }
        if self.compressed_size == 0 {
            self.pixels = Some(raw.to_vec());
        } else {
            let mut out = vec![0u8; (self.width * self.height) as usize];
            codec::decompress(raw, &mut out)?;
            self.pixels = Some(out);
        }
        Ok(())
    }
}

/// A background image plus its accompanying 256-entry RGB palette.
#[derive(Debug, Clone, Default)]
pub struct BackgroundImage {
    pub image: Image,
    pub palette: [[u8; 3]; 256],
}

/// Placement of one frame within a sequence: an offset from the sprite's
/// anchor point plus the image to draw there.
#[derive(Debug, Clone)]
pub struct ImagePos {
    pub dx: i32,
    pub dy: i32,
    pub image_index: usize,
}

/// One direction-keyed animation: index 0 is the static pose, 1..8 are the
/// cardinal/diagonal walk cycles.
pub type ImageSeq = Vec<ImagePos>;

/// A catalogue of frames addressed by `(sequence, frame)`.
#[derive(Debug, Clone, Default)]
pub struct Sprite {
    pub images: Vec<Image>,
    pub sequences: [ImageSeq; 9],
}

impl Sprite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self, seq: usize, frame: usize) -> Option<&ImagePos> {
        self.sequences.get(seq).and_then(|s| s.get(frame))
    }

    pub fn image(&self, index: usize) -> Option<&Image> {
        self.images.get(index)
    }

    /// Loads the image at `index` by seeking `archive` directly to its
    /// recorded archive offset, reading exactly its source byte length (the
    /// compressed size if the source is compressed, otherwise the raw
    /// `width * height` pixel count).
    pub fn load_image<R: std::io::Read + std::io::Seek>(
        &mut self,
        index: usize,
        archive: &mut Archive<R>,
    ) -> Result<(), FormatError> {
        let Some(img) = self.images.get(index) else {
            return Ok(());
        };
        let Some(offset) = img.offset else {
            return Ok(());
        };
        if img.is_loaded() {
            return Ok(());
        }
        let len = if img.compressed_size != 0 {
            img.compressed_size as usize
        } else {
            (img.width * img.height) as usize
        };
        archive.seek_to(offset)?;
        let raw = archive.read_bytes(len)?;
        self.images[index].load(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompressed_image_loads_verbatim() {
        let mut img = Image {
            offset: Some(0),
            width: 2,
            height: 2,
            compressed_size: 0,
            ..Default::default()
        };
        img.load(&[1, 2, 3, 4]).unwrap();
        assert_eq!(img.pixels.unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn image_with_no_offset_stays_unloaded() {
        let mut img = Image::default();
        img.load(&[1, 2, 3]).unwrap();
        assert!(!img.is_loaded());
    }

    #[test]
    fn loading_twice_is_a_no_op() {
        let mut img = Image {
            offset: Some(0),
            width: 1,
            height: 1,
            compressed_size: 0,
            ..Default::default()
        };
        img.load(&[9]).unwrap();
        img.load(&[5]).unwrap();
        assert_eq!(img.pixels.unwrap(), vec![9]);
    }
}
