//! Shared wire types and protocol errors for the pushduck upload core.
//!
//! Everything in this crate is serialization-facing: the JSON shapes the
//! upload handlers speak, the protocol-level error taxonomy, and the
//! human-readable file size notation used by schema constraints.

pub mod errors;
pub mod size;
pub mod types;

pub use errors::{ErrorResponse, ProtocolError};
pub use size::{format_size, parse_size, SizeParseError};
pub use types::{
    CompletionRecord, CompletionResponse, CompletionResult, FileDescriptor, FileInfo,
    ImageDimensions, Metadata, PresignResponse, PresignedFile, RouteDescriptor, RoutesResponse,
    SchemaSummary, UploadAction, UploadRequestBody,
};
