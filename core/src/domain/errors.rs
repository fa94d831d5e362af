//! Error taxonomy.
//!
//! Every module exposes its own leaf error enum; each converts into
//! [`MeridianError`] via `#[from]`, mirroring the layered error chain used
//! throughout this crate's predecessor (leaf errors funnel into one umbrella
//! type at the boundary a caller actually sees).

use thiserror::Error;

/// Top-level error kind, matching the taxonomy every public operation maps
/// into. Library code should prefer returning the more specific leaf errors
/// below; `MeridianError` is what crosses crate boundaries (CLI, admin API).
#[derive(Debug, Error)]
pub enum MeridianError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Exists(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("is a directory: {0}")]
    IsDirectory(String),

    #[error("not a directory: {0}")]
    NotDirectory(String),

    #[error("too many symlinks resolving {0}")]
    TooManySymlinks(String),

    #[error("operation invalid on current working directory")]
    IsCwd,

    #[error("no usable replica for {0}")]
    NoReplicas(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("internal invariant violation: {0}")]
    Internal(String),

    #[error("plugin api version mismatch: expected {expected}, got {got}")]
    ApiVersionMismatch { expected: u32, got: u32 },

    #[error("unknown config option: {0}")]
    UnknownOption(String),

    #[error(transparent)]
    Acl(#[from] AclError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Mapfile(#[from] MapfileError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

#[derive(Debug, Error)]
pub enum AclError {
    #[error("malformed acl entry: {0}")]
    Malformed(String),
    #[error("acl fails §3 invariants: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signature mismatch")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token grants insufficient mode for this request")]
    WrongMode,
    #[error("malformed token: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum MapfileError {
    #[error("mapfile not found: {0}")]
    NoSuchFile(String),
    #[error("no VO mapping for DN {0:?}")]
    NoUserMapping(String),
    #[error("malformed mapfile {path} at line {line}")]
    Malformed { path: String, line: usize },
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no such entry: {0}")]
    NoSuchFile(String),
    #[error("name already exists: {0}")]
    FileExists(String),
    #[error("is a directory: {0}")]
    IsDirectory(String),
    #[error("not a directory: {0}")]
    NotDirectory(String),
    #[error("malformed acl: {0}")]
    InvalidAcl(String),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("too many symlinks resolving {0}")]
    TooManySymlinks(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("directory not empty: {0}")]
    NotEmpty(String),
    #[error("cannot move a directory into its own descendant")]
    WouldCreateCycle,
    #[error("no such user: {0}")]
    NoSuchUser(String),
    #[error("no such group: {0}")]
    NoSuchGroup(String),
    #[error(transparent)]
    Backend(#[from] IoError),
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no such pool: {0}")]
    NoSuchPool(String),
    #[error("pool unavailable: {0}")]
    Unavailable(String),
    #[error("no usable replica for {0}")]
    NoReplicas(String),
    #[error(transparent)]
    Io(#[from] IoError),
}

#[derive(Debug, Error)]
pub enum IoError {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("std io error: {0}")]
    Std(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("(de)serialization failure: {0}")]
    Serialization(String),
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("api version mismatch: expected {expected}, got {got}")]
    ApiVersionMismatch { expected: u32, got: u32 },
    #[error("unknown config option: {0}")]
    UnknownOption(String),
    #[error("failed to load library {path}: {source}")]
    LoadFailure {
        path: String,
        #[source]
        source: libloading::Error,
    },
    #[error("missing entry symbol {0} in plugin")]
    MissingSymbol(String),
    #[error("no factory registered for interface {0}")]
    NoFactory(String),
    #[error("malformed config {path} at line {line}: {reason}")]
    MalformedConfig { path: String, line: usize, reason: String },
}
