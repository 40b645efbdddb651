//! Marginalia Core - pipeline logic (no IO)
//!
//! Contains the lexer, the parser, the commentary transform, the bytecode
//! compiler, the VM and the compiled-artifact codec. Only operates on
//! in-memory data; reading sources and writing caches is the job of
//! `marginalia-api`.
//!
//! Configuration is passed explicitly via parameters, not via global state.

pub mod binary;
pub mod compiler;
pub mod kit;
pub mod runtime;
pub mod transform;

pub use binary::{decode_artifact, encode_artifact, ArtifactError, ArtifactHeader, CacheKey};
pub use compiler::parser::{parse, ParserError};
pub use runtime::compiler::{compile, compile_source, CompileError, SourceError};
pub use runtime::value::Value;
pub use runtime::vm::{ImportHost, RuntimeError, Thrown, VM};
pub use runtime::{Program, Proto};
pub use transform::{transform, CommentMarker, TransformError, Transformation, TRANSFORM_VERSION};

pub use marginalia_config::{LimitConfig, LoaderConfig, Phase};

/// Runtime implementation name, part of the cache tag
pub const RUNTIME_IMPL: &str = "marginalia";

/// Runtime version, part of the cache tag
pub const RUNTIME_VERSION: &str = env!("CARGO_PKG_VERSION");
