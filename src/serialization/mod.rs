//! Model weight serialization.
//!
//! Network weights are exchanged as `SafeTensors` files:
//! ```text
//! [8-byte header: u64 metadata length (little-endian)]
//! [JSON metadata: tensor names, dtypes, shapes, data_offsets]
//! [Raw tensor data: little-endian values]
//! ```
//!
//! Parameter names follow the torchvision layout (`features.0.weight`,
//! `classifier.3.bias`, ...) so converted ImageNet checkpoints load directly.

pub mod safetensors;

pub use safetensors::{load_safetensors, save_safetensors, StateDict};
