use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::state::runtime::live::live_state_store::StorePhase;
use crate::core::state::runtime::live::resource_kind::ResourceKind;

/// Failures while locating, reading or interpreting a kubeconfig.
///
/// These are never retried; every variant carries a remediation line via
/// [`ConfigError::hint`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("kubeconfig not found or empty: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("kubeconfig {} is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("context '{profile}' not found in kubeconfig")]
    ProfileNotFound { profile: String },

    #[error("no context requested and kubeconfig has no current-context")]
    NoCurrentProfile,

    #[error("failed to read kubeconfig {}: {reason}", path.display())]
    ReadFailure { path: PathBuf, reason: String },

    #[error("failed to load kubeconfig: {0}")]
    Load(String),
}

impl ConfigError {
    pub fn hint(&self) -> &'static str {
        match self {
            ConfigError::NotFound { .. } => {
                "set --kubeconfig or the KUBECONFIG environment variable"
            }
            ConfigError::Malformed { .. } => {
                "fix the YAML in the kubeconfig or point --kubeconfig at another file"
            }
            ConfigError::ProfileNotFound { .. } => {
                "pick one of the names printed by `kubedeck contexts`"
            }
            ConfigError::NoCurrentProfile => {
                "pass --context (or KUBEDECK_CONTEXT) or set current-context in the kubeconfig"
            }
            ConfigError::ReadFailure { .. } => {
                "check that the kubeconfig file is readable by this user"
            }
            ConfigError::Load(_) => "inspect the kubeconfig with `kubectl config view`",
        }
    }
}

/// Which of the two bundle clients failed to initialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientHandle {
    Typed,
    Dynamic,
}

impl fmt::Display for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientHandle::Typed => f.write_str("typed"),
            ClientHandle::Dynamic => f.write_str("dynamic"),
        }
    }
}

/// Failures while building a connection bundle or talking to the API server.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to initialize {handle} client: {source}")]
    ClientInit {
        handle: ClientHandle,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("authentication failed: {detail}")]
    Unauthenticated { detail: String },

    #[error("TLS validation failed: {detail}")]
    TlsValidationFailed { detail: String },

    #[error("cannot reach the Kubernetes API endpoint: {detail}")]
    Unreachable { detail: String },

    #[error("cluster connection timed out")]
    TimedOut,

    #[error("failed to connect to the Kubernetes API: {detail}")]
    Connect { detail: String },
}

impl ConnectionError {
    pub fn hint(&self) -> &'static str {
        match self {
            ConnectionError::Config(err) => err.hint(),
            ConnectionError::ClientInit { .. } => {
                "check the credential settings of the selected context"
            }
            ConnectionError::Unauthenticated { .. } => {
                "refresh credentials for the selected context"
            }
            ConnectionError::TlsValidationFailed { .. } => {
                "verify the cluster certificate authority in the kubeconfig"
            }
            ConnectionError::Unreachable { .. } => "verify the server URL and network access",
            ConnectionError::TimedOut => "check network/VPN and API server reachability",
            ConnectionError::Connect { .. } => "retry with KUBEDECK_LOG=debug for details",
        }
    }
}

/// Failures of the live state store. None of these reach the end user; the
/// dashboard feed falls back to polling instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("initial sync did not finish within {0:?}")]
    SyncTimeout(Duration),

    #[error("watch for {kind} ended before the initial list completed")]
    WatchEnded { kind: ResourceKind },

    #[error("store cannot start from state {0}")]
    InvalidState(StorePhase),

    #[error("unsupported resource type '{0}'")]
    UnsupportedKind(String),
}

/// Flattens an error and its source chain into one `a: b: c` line.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        source = inner.source();
    }
    parts.join(": ")
}

/// Maps a failure raised while the client library interprets a kubeconfig
/// onto the configuration taxonomy.
pub fn classify_config_failure(path: &Path, profile: &str, message: &str) -> ConfigError {
    let msg = message.to_lowercase();
    if msg.contains("no configuration has been provided") || msg.contains("not found or empty") {
        ConfigError::NotFound {
            path: path.to_path_buf(),
        }
    } else if msg.contains("context")
        && (msg.contains("not found")
            || msg.contains("no context exists")
            || msg.contains("failed to find"))
    {
        ConfigError::ProfileNotFound {
            profile: profile.to_string(),
        }
    } else if msg.contains("unable to read") || msg.contains("failed to read") {
        ConfigError::ReadFailure {
            path: path.to_path_buf(),
            reason: message.to_string(),
        }
    } else {
        ConfigError::Load(message.to_string())
    }
}

/// Maps a transport failure onto the connectivity taxonomy by inspecting the
/// flattened message.
pub fn classify_connect_failure(message: &str) -> ConnectionError {
    let msg = message.to_lowercase();
    let detail = message.to_string();
    if msg.contains("unauthorized") || msg.contains("forbidden") {
        ConnectionError::Unauthenticated { detail }
    } else if msg.contains("x509") || msg.contains("certificate") || msg.contains("tls handshake") {
        ConnectionError::TlsValidationFailed { detail }
    } else if msg.contains("timed out") || msg.contains("deadline exceeded") {
        ConnectionError::TimedOut
    } else if [
        "connection refused",
        "no such host",
        "dns error",
        "failed to lookup address",
        "network is unreachable",
        "tcp connect",
        "client error (connect)",
        "dial tcp",
    ]
    .iter()
    .any(|needle| msg.contains(needle))
    {
        ConnectionError::Unreachable { detail }
    } else {
        ConnectionError::Connect { detail }
    }
}
