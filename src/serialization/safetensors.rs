//! `SafeTensors` reader and writer for network state dicts.
//!
//! Writing always produces F32. Reading accepts F32, F16 and BF16 and
//! widens everything to F32.

use crate::error::{AapsoError, Result};
use crate::primitives::Tensor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Named tensors, sorted by name.
pub type StateDict = BTreeMap<String, Tensor>;

/// Metadata for a single tensor in `SafeTensors` format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorMetadata {
    /// Data type of the tensor (e.g., "F32").
    pub dtype: String,
    /// Shape of the tensor.
    pub shape: Vec<usize>,
    /// Data offsets `[start, end]` in the raw data section.
    pub data_offsets: [usize; 2],
}

/// Element types this reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DType {
    F32,
    F16,
    BF16,
}

impl DType {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "F32" => Some(Self::F32),
            "F16" => Some(Self::F16),
            "BF16" => Some(Self::BF16),
            _ => None,
        }
    }

    fn bytes_per_element(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F16 | Self::BF16 => 2,
        }
    }

    fn decode(self, bytes: &[u8]) -> Vec<f32> {
        match self {
            Self::F32 => bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
            Self::F16 => bytes
                .chunks_exact(2)
                .map(|c| half::f16::from_le_bytes([c[0], c[1]]).to_f32())
                .collect(),
            Self::BF16 => bytes
                .chunks_exact(2)
                .map(|c| half::bf16::from_le_bytes([c[0], c[1]]).to_f32())
                .collect(),
        }
    }
}

fn format_error(path: &Path, message: impl Into<String>) -> AapsoError {
    AapsoError::Serialization(format!("{}: {}", path.display(), message.into()))
}

/// Saves a state dict to `path` as F32 `SafeTensors`.
///
/// # Errors
///
/// Returns an error if JSON serialization or the file write fails.
pub fn save_safetensors<P: AsRef<Path>>(path: P, tensors: &StateDict) -> Result<()> {
    let mut metadata = BTreeMap::new();
    let mut raw_data = Vec::new();

    for (name, tensor) in tensors {
        let start = raw_data.len();
        for &value in tensor.data() {
            raw_data.extend_from_slice(&value.to_le_bytes());
        }
        metadata.insert(
            name.clone(),
            TensorMetadata {
                dtype: "F32".to_string(),
                shape: tensor.shape().to_vec(),
                data_offsets: [start, raw_data.len()],
            },
        );
    }

    let metadata_json = serde_json::to_string(&metadata)?;
    let metadata_bytes = metadata_json.as_bytes();

    let mut output = Vec::with_capacity(8 + metadata_bytes.len() + raw_data.len());
    output.extend_from_slice(&(metadata_bytes.len() as u64).to_le_bytes());
    output.extend_from_slice(metadata_bytes);
    output.extend_from_slice(&raw_data);

    fs::write(path, output)?;
    Ok(())
}

/// Loads every tensor of a `SafeTensors` file.
///
/// Header entries starting with `__` (such as `__metadata__`) are skipped.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the header is malformed,
/// a dtype is unsupported, or offsets disagree with shapes.
pub fn load_safetensors<P: AsRef<Path>>(path: P) -> Result<StateDict> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let (metadata, data) = split_header(path, &bytes)?;

    let mut tensors = StateDict::new();
    for (name, meta) in metadata {
        let dtype = DType::parse(&meta.dtype)
            .ok_or_else(|| format_error(path, format!("{name}: unsupported dtype {}", meta.dtype)))?;
        let [start, end] = meta.data_offsets;
        let byte_len = meta
            .shape
            .iter()
            .try_fold(dtype.bytes_per_element(), |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| {
                format_error(path, format!("{name}: shape {:?} overflows usize", meta.shape))
            })?;
        if start > end || end > data.len() || end - start != byte_len {
            return Err(format_error(
                path,
                format!("{name}: offsets [{start}, {end}] do not match shape {:?}", meta.shape),
            ));
        }
        let tensor = Tensor::new(dtype.decode(&data[start..end]), &meta.shape)?;
        tensors.insert(name, tensor);
    }
    Ok(tensors)
}

fn split_header<'a>(
    path: &Path,
    bytes: &'a [u8],
) -> Result<(BTreeMap<String, TensorMetadata>, &'a [u8])> {
    let header: [u8; 8] = bytes
        .get(..8)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| format_error(path, "file shorter than the 8-byte header"))?;
    let metadata_len = usize::try_from(u64::from_le_bytes(header))
        .map_err(|_| format_error(path, "metadata length overflows usize"))?;
    if metadata_len == 0 || metadata_len > bytes.len() - 8 {
        return Err(format_error(
            path,
            format!("metadata length {metadata_len} is invalid for a {}-byte file", bytes.len()),
        ));
    }

    let json = std::str::from_utf8(&bytes[8..8 + metadata_len])
        .map_err(|e| format_error(path, format!("metadata is not UTF-8: {e}")))?;
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)?;

    let mut metadata = BTreeMap::new();
    for (key, value) in raw {
        if key.starts_with("__") {
            continue;
        }
        let meta: TensorMetadata = serde_json::from_value(value)
            .map_err(|e| format_error(path, format!("{key}: {e}")))?;
        metadata.insert(key, meta);
    }
    Ok((metadata, &bytes[8 + metadata_len..]))
}
