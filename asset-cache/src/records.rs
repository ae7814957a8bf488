/// Persisted asset payloads and their request descriptors
use crate::error::{CacheError, StoreResult};
use crate::medium::StoredRecord;
use pcd_decoder::DecodedPointCloud;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRequest {
    pub name: String,
    pub url: String,
}

impl AssetRequest {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Image request. Missing dimensions are read from the image header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub name: String,
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageRequest {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            width: None,
            height: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub name: String,
    pub url: String,
    pub cloud: DecodedPointCloud,
}

impl PointRecord {
    pub fn to_stored(&self) -> StoreResult<StoredRecord> {
        Ok(StoredRecord::new(self.name.clone(), bincode::serialize(self)?))
    }

    pub fn from_stored(record: &StoredRecord) -> StoreResult<Self> {
        Ok(bincode::deserialize(&record.bytes)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub name: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl ImageRecord {
    /// Build a record from fetched bytes, probing the size when the request lacks it.
    pub fn from_fetched(request: &ImageRequest, bytes: Vec<u8>) -> Result<Self, CacheError> {
        let (width, height) = match (request.width, request.height) {
            (Some(w), Some(h)) => (w, h),
            _ => image::io::Reader::new(Cursor::new(&bytes))
                .with_guessed_format()
                .map_err(|e| CacheError::CorruptData(e.to_string()))?
                .into_dimensions()
                .map_err(|e| CacheError::CorruptData(format!("{}: {e}", request.name)))?,
        };
        Ok(Self {
            name: request.name.clone(),
            url: request.url.clone(),
            width,
            height,
            bytes,
        })
    }

    pub fn to_stored(&self) -> StoreResult<StoredRecord> {
        Ok(StoredRecord::new(self.name.clone(), bincode::serialize(self)?)
            .with_index("width", self.width as u64)
            .with_index("height", self.height as u64))
    }

    pub fn from_stored(record: &StoredRecord) -> StoreResult<Self> {
        Ok(bincode::deserialize(&record.bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_size_is_read_when_missing() {
        let mut png = Vec::new();
        image::RgbImage::new(7, 3)
            .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
            .unwrap();

        let record = ImageRecord::from_fetched(&ImageRequest::new("cam0", "cam0.png"), png).unwrap();
        assert_eq!((record.width, record.height), (7, 3));

        let stored = record.to_stored().unwrap();
        assert_eq!(stored.indices.get("width"), Some(&7));
        assert_eq!(ImageRecord::from_stored(&stored).unwrap(), record);
    }

    #[test]
    fn undecodable_image_without_size_is_corrupt() {
        let err = ImageRecord::from_fetched(&ImageRequest::new("x", "x.bin"), vec![1, 2, 3]);
        assert!(matches!(err, Err(CacheError::CorruptData(_))));
    }
}
