//! Bake documents on disk: `{ "meta": {...}, "data": "<base64>" }`.
//!
//! `data` is standard base64 of the packed buffer as little-endian `u16`s.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::encoder::{BakeMetadata, BakeResult};
use crate::error::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BakeFile {
    pub meta: BakeMetadata,
    pub data: String,
}

impl BakeFile {
    pub fn from_result(result: &BakeResult) -> Self {
        Self {
            meta: result.metadata.clone(),
            data: encode_data(&result.packed),
        }
    }

    /// Decode `data` and check it against the header.
    pub fn into_result(self) -> Result<BakeResult, PipelineError> {
        if self.meta.quantization_factor == 0 {
            return Err(PipelineError::InvalidBake(
                "quantizationFactor must be a positive integer".to_string(),
            ));
        }
        let packed = decode_data(&self.data)?;
        if packed.len() != self.meta.expected_len() {
            return Err(PipelineError::InvalidBake(format!(
                "buffer holds {} values, header implies {} ({} frames × {} grains × 2)",
                packed.len(),
                self.meta.expected_len(),
                self.meta.frames,
                self.meta.grains
            )));
        }
        Ok(BakeResult {
            metadata: self.meta,
            packed,
        })
    }
}

pub fn encode_data(packed: &[u16]) -> String {
    let bytes: Vec<u8> = packed.iter().flat_map(|v| v.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}

pub fn decode_data(data: &str) -> Result<Vec<u16>, PipelineError> {
    let bytes = STANDARD
        .decode(data)
        .map_err(|e| PipelineError::InvalidBake(format!("data is not base64: {e}")))?;
    if bytes.len() % 2 != 0 {
        return Err(PipelineError::InvalidBake(format!(
            "data has odd byte length {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Write `result` as `dir/file_name`, creating `dir` if needed.
pub fn write_bake(
    dir: &Path,
    file_name: &str,
    result: &BakeResult,
) -> Result<PathBuf, PipelineError> {
    std::fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
    let path = dir.join(file_name);
    let json = serde_json::to_vec(&BakeFile::from_result(result))?;
    std::fs::write(&path, json).map_err(|e| PipelineError::io(&path, e))?;
    tracing::info!(path = %path.display(), bytes = result.packed.len() * 2, "Bake written");
    Ok(path)
}

pub fn read_bake(path: &Path) -> Result<BakeResult, PipelineError> {
    let raw = std::fs::read(path).map_err(|e| PipelineError::io(path, e))?;
    let file: BakeFile = serde_json::from_slice(&raw)?;
    file.into_result()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn data_is_little_endian_base64() {
        // 0x0102, 0xFFFF -> bytes 02 01 FF FF
        assert_eq!(encode_data(&[0x0102, 0xFFFF]), "AgH//w==");
        assert_eq!(decode_data("AgH//w==").unwrap(), vec![0x0102, 0xFFFF]);
    }

    #[test]
    fn odd_byte_length_is_rejected() {
        assert_matches!(decode_data("AQ=="), Err(PipelineError::InvalidBake(_)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_matches!(decode_data("not base64!"), Err(PipelineError::InvalidBake(_)));
    }
}
