//! 中间件模块
//!
//! 请求级别的校验 extractor

pub mod signature;

pub use signature::{verify_signature, SignatureError, SignedPayload};
