//! # eventscope-core
//!
//! Classification and decoding engine shared by every eventscope transport.
//!
//! - [`registry::SignatureRegistry`] maps a topic-0 hash to the event declaration it came from
//! - [`transfer`] recognises ERC-20 `Transfer` logs and extracts sender, receiver and amount
//! - [`classify::Classifier`] is the single decision point every log record is routed through
//! - [`node`] and [`metadata`] describe the external collaborators (node connection,
//!   in-process log bus, token metadata) as traits so transports can be driven by fakes

pub mod classify;
pub mod error;
pub mod log;
pub mod metadata;
pub mod node;
pub mod registry;
pub mod signature;
pub mod transfer;

pub use classify::{classify_with_decimals, ClassificationResult, Classifier};
pub use error::{DecodeError, MetadataError, RegistryError, TransportError};
pub use log::{LogFilter, LogRecord};
pub use metadata::{NoMetadata, TokenMetadataProvider};
pub use node::{ListenerHandle, LogBus, LogCallback, LogStream, LogSubscription, NodeClient};
pub use registry::SignatureRegistry;
pub use signature::{event_signature_hash, transfer_signature, TRANSFER_EVENT};
pub use transfer::DecodedTransfer;

pub use alloy_primitives::{Address, Bytes, B256, U256};
