use std::fmt;

use crate::core::kubeconfig::raw_config::{RawConfig, UserCredentials};

/// Credential mechanisms a kubeconfig user can declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Token,
    ClientCertificate,
    ExecPlugin,
    AuthProvider(String),
    BasicAuth,
    Impersonation,
    Unknown,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Token => f.write_str("token"),
            AuthMethod::ClientCertificate => f.write_str("client-cert"),
            AuthMethod::ExecPlugin => f.write_str("exec-plugin"),
            AuthMethod::AuthProvider(name) => write!(f, "auth-provider:{name}"),
            AuthMethod::BasicAuth => f.write_str("basic-auth"),
            AuthMethod::Impersonation => f.write_str("impersonation"),
            AuthMethod::Unknown => f.write_str("unknown"),
        }
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn methods_of(user: &UserCredentials) -> Vec<AuthMethod> {
    let mut methods = Vec::new();
    if is_set(&user.token) || is_set(&user.token_file) {
        methods.push(AuthMethod::Token);
    }
    if is_set(&user.client_certificate) || is_set(&user.client_certificate_data) {
        methods.push(AuthMethod::ClientCertificate);
    }
    // Any exec block counts, even one whose command is still blank.
    if user.exec.is_some() {
        methods.push(AuthMethod::ExecPlugin);
    }
    if let Some(provider) = &user.auth_provider {
        let name = provider.name.trim();
        if !name.is_empty() {
            methods.push(AuthMethod::AuthProvider(name.to_string()));
        }
    }
    if is_set(&user.username) || is_set(&user.password) {
        methods.push(AuthMethod::BasicAuth);
    }
    if is_set(&user.impersonate) {
        methods.push(AuthMethod::Impersonation);
    }
    methods
}

/// Auth mechanisms configured for `profile` (the current profile when
/// blank), in fixed precedence order. Never empty: anything undeterminable
/// yields `["unknown"]`.
pub fn detect_auth_methods(raw: &RawConfig, profile: &str) -> Vec<String> {
    let name = match profile.trim() {
        "" => raw.current_profile(),
        explicit => explicit,
    };

    let methods = raw
        .profile(name)
        .and_then(|ctx| raw.user(&ctx.user))
        .map(methods_of)
        .unwrap_or_default();

    if methods.is_empty() {
        return vec![AuthMethod::Unknown.to_string()];
    }
    methods.iter().map(ToString::to_string).collect()
}
