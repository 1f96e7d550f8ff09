//! Worker descriptor.

use url::Url;

/// One registered backend instance.
///
/// Identified by the full registry path of its registration entry; immutable
/// once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerDescriptor {
    /// Registry path of the registration entry (unique key).
    pub key: String,

    /// Target base URL requests are forwarded to.
    pub url: Url,

    /// Whether the worker is publicly visible. Carried, not enforced.
    pub public: bool,

    /// Opaque auth token. Carried, not enforced.
    pub auth: String,
}

impl WorkerDescriptor {
    pub fn new(key: impl Into<String>, url: Url, public: bool, auth: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url,
            public,
            auth: auth.into(),
        }
    }
}
