use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use sha2::{Digest, Sha256};

use super::write_atomic;
use crate::error::LedgerError;

/// Storage for the plate crop of each accepted reading, keyed by plate text.
pub trait CropStore: Send {
    /// Persist `crop` for `plate_text`, replacing any previous image.
    fn save(&mut self, plate_text: &str, crop: &RgbImage) -> Result<PathBuf, LedgerError>;

    /// Location of the stored crop, if any.
    fn locate(&self, plate_text: &str) -> Option<PathBuf>;
}

/// One JPEG per plate text under a directory.
pub struct FilesystemCropStore {
    root: PathBuf,
}

impl FilesystemCropStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, plate_text: &str) -> PathBuf {
        self.root.join(format!("{}.jpg", crop_key(plate_text)))
    }
}

impl CropStore for FilesystemCropStore {
    fn save(&mut self, plate_text: &str, crop: &RgbImage) -> Result<PathBuf, LedgerError> {
        let path = self.path_for(plate_text);
        let mut encoded = Cursor::new(Vec::new());
        crop.write_to(&mut encoded, ImageFormat::Jpeg)?;
        write_atomic(&path, encoded.get_ref())?;
        Ok(path)
    }

    fn locate(&self, plate_text: &str) -> Option<PathBuf> {
        let path = self.path_for(plate_text);
        path.is_file().then_some(path)
    }
}

/// File stem for a plate text: the text itself when it is `[A-Za-z0-9_-]+`,
/// otherwise a hash prefix so arbitrary OCR output cannot escape the directory.
pub fn crop_key(plate_text: &str) -> String {
    let safe = !plate_text.is_empty()
        && plate_text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if safe {
        plate_text.to_string()
    } else {
        let digest = Sha256::digest(plate_text.as_bytes());
        format!("plate-{}", &hex::encode(digest)[..16])
    }
}
