//! Error taxonomy shared by the whole crate.
//!
//! Every variant is fatal to the operation that raised it. Nothing in the
//! crate retries; callers decide what to do with a failed frame or load.

use thiserror::Error;

/// Errors surfaced by the rendering core.
#[derive(Debug, Error)]
pub enum Error {
    /// A native GPU object could not be created from its descriptor.
    #[error("could not create {what}: {reason}")]
    ResourceCreation { what: String, reason: String },

    /// A shader stage failed to parse.
    #[error("could not compile {stage} shader: {log}\n\"{shader_source}\"")]
    Compile {
        stage: &'static str,
        log: String,
        shader_source: String,
    },

    /// The stages parsed but do not form a valid program.
    #[error("could not link shader program: {log}")]
    Link { log: String },

    /// Reflection found a uniform or attribute type the bindings do not implement.
    #[error("unsupported type for \"{name}\": {ty}")]
    UnsupportedType { name: String, ty: String },

    /// A setter was called that does not match the binding's kind.
    #[error("unsupported value for \"{name}\": expected {expected}, got {got}")]
    UnsupportedValue {
        name: String,
        expected: String,
        got: String,
    },

    /// The program declares more samplers than the target has texture units.
    #[error("sampler \"{name}\" needs texture unit {unit} but only {max} are supported")]
    UnsupportedTextureUnits { name: String, unit: u32, max: u32 },

    /// An invariant of the descriptor or shader model was violated by the caller.
    #[error("{0}")]
    Configuration(String),

    /// An asset could not be fetched or decoded.
    #[error("could not load \"{source_id}\": {reason}")]
    Load { source_id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn load(source_id: &str, reason: impl std::fmt::Display) -> Self {
        Self::Load {
            source_id: source_id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn resource(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResourceCreation {
            what: what.into(),
            reason: reason.into(),
        }
    }
}
