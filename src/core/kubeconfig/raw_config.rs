use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::errors::ConfigError;

/// Namespace used when a context does not declare one.
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub certificate_authority: Option<String>,
    #[serde(default)]
    pub certificate_authority_data: Option<String>,
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

/// A kubeconfig context: the unit users select with `--context`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthProvider {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExecPlugin {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Option<Vec<String>>,
    #[serde(default, rename = "apiVersion")]
    pub api_version: Option<String>,
}

/// Credential material declared for a kubeconfig user.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserCredentials {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, rename = "tokenFile")]
    pub token_file: Option<String>,
    #[serde(default, rename = "client-certificate")]
    pub client_certificate: Option<String>,
    #[serde(default, rename = "client-certificate-data")]
    pub client_certificate_data: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, rename = "as")]
    pub impersonate: Option<String>,
    #[serde(default, rename = "auth-provider")]
    pub auth_provider: Option<AuthProvider>,
    #[serde(default)]
    pub exec: Option<ExecPlugin>,
}

// Secrets stay out of logs: only report which fields are set.
impl fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredentials")
            .field("token", &self.token.is_some())
            .field("token_file", &self.token_file)
            .field("client_certificate", &self.client_certificate)
            .field("client_certificate_data", &self.client_certificate_data.is_some())
            .field("username", &self.username)
            .field("password", &self.password.is_some())
            .field("impersonate", &self.impersonate)
            .field("auth_provider", &self.auth_provider)
            .field("exec", &self.exec)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct Named<T> {
    #[serde(default)]
    name: String,
    #[serde(alias = "cluster", alias = "context", alias = "user", default = "Option::default")]
    body: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct KubeconfigDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    clusters: Vec<Named<Cluster>>,
    #[serde(default, deserialize_with = "null_as_default")]
    contexts: Vec<Named<Profile>>,
    #[serde(default, deserialize_with = "null_as_default")]
    users: Vec<Named<UserCredentials>>,
    #[serde(default)]
    current_context: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn into_map<T>(items: Vec<Named<T>>) -> BTreeMap<String, T>
where
    T: Default,
{
    items
        .into_iter()
        .filter_map(|item| {
            let name = item.name.trim().to_string();
            (!name.is_empty()).then(|| (name, item.body.unwrap_or_default()))
        })
        .collect()
}

/// Connection parameters for one resolved profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub profile: String,
    pub cluster: String,
    pub server: Option<String>,
    pub user: String,
    pub namespace: String,
}

/// Parsed kubeconfig. Immutable; a reload produces a new value.
#[derive(Debug, Clone)]
pub struct RawConfig {
    source: PathBuf,
    yaml: String,
    current_profile: String,
    profiles: BTreeMap<String, Profile>,
    clusters: BTreeMap<String, Cluster>,
    users: BTreeMap<String, UserCredentials>,
}

impl RawConfig {
    /// Parses kubeconfig YAML read from `source`. Blank input counts as a
    /// missing file.
    pub fn parse(source: impl Into<PathBuf>, yaml: &str) -> Result<Self, ConfigError> {
        let source = source.into();
        if yaml.trim().is_empty() {
            return Err(ConfigError::NotFound { path: source });
        }

        let document: KubeconfigDocument =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Malformed {
                path: source.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            current_profile: document
                .current_context
                .map(|c| c.trim().to_string())
                .unwrap_or_default(),
            profiles: into_map(document.contexts),
            clusters: into_map(document.clusters),
            users: into_map(document.users),
            yaml: yaml.to_string(),
            source,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The YAML as read from disk, for handing to the client library.
    pub fn yaml(&self) -> &str {
        &self.yaml
    }

    pub fn current_profile(&self) -> &str {
        &self.current_profile
    }

    /// Profile names in sorted order.
    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name.trim())
    }

    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.get(name.trim())
    }

    pub fn user(&self, name: &str) -> Option<&UserCredentials> {
        self.users.get(name.trim())
    }

    /// The explicit override when given, otherwise the current-context
    /// pointer. The chosen profile must exist.
    pub fn resolve_profile_name(&self, profile_override: &str) -> Result<String, ConfigError> {
        let requested = profile_override.trim();
        let name = if requested.is_empty() {
            self.current_profile.as_str()
        } else {
            requested
        };
        if name.is_empty() {
            return Err(ConfigError::NoCurrentProfile);
        }
        if !self.profiles.contains_key(name) {
            return Err(ConfigError::ProfileNotFound {
                profile: name.to_string(),
            });
        }
        Ok(name.to_string())
    }

    pub fn connection_params(&self, profile: &str) -> Result<ConnectionParams, ConfigError> {
        let name = profile.trim();
        let context = self.profile(name).ok_or_else(|| ConfigError::ProfileNotFound {
            profile: name.to_string(),
        })?;

        Ok(ConnectionParams {
            profile: name.to_string(),
            cluster: context.cluster.clone(),
            server: self.cluster(&context.cluster).and_then(|c| c.server.clone()),
            user: context.user.clone(),
            namespace: context
                .namespace
                .as_deref()
                .map(str::trim)
                .filter(|ns| !ns.is_empty())
                .unwrap_or(DEFAULT_NAMESPACE)
                .to_string(),
        })
    }
}
