//! Connection descriptor parsing.
//!
//! Descriptors use the storage-account connection-string shape:
//! `Key=Value` pairs separated by `;`. Parsing only checks that the pieces
//! needed to build a backend are present and well-formed; whether the
//! credentials are actually accepted is up to the service.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::{Result, StowageError};

const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Keys we recognise but do not use (other storage services in the account).
const IGNORED_KEYS: &[&str] = &["queueendpoint", "tableendpoint", "fileendpoint"];

/// Parsed form of a connection descriptor.
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectionDescriptor {
    /// Shared-key account credentials.
    AccountKey {
        account: String,
        key: String,
        endpoint: Endpoint,
    },
    /// Shared access signature scoped to an account.
    Sas {
        account: String,
        sas: String,
        endpoint: Endpoint,
    },
    /// The local storage emulator with its well-known account.
    Emulator,
    /// Filesystem-backed storage rooted at a directory.
    Local { root: PathBuf },
}

/// Where the blob service lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `{protocol}://{account}.blob.{suffix}`
    Derived { protocol: String, suffix: String },
    /// Explicit `BlobEndpoint=` URI.
    Explicit(String),
}

impl Endpoint {
    /// Returns a URI only when the default public cloud endpoint does not apply.
    pub fn custom_uri(&self, account: &str) -> Option<String> {
        match self {
            Endpoint::Explicit(uri) => Some(uri.trim_end_matches('/').to_string()),
            Endpoint::Derived { protocol, suffix }
                if protocol != DEFAULT_PROTOCOL || suffix != DEFAULT_ENDPOINT_SUFFIX =>
            {
                Some(format!("{protocol}://{account}.blob.{suffix}"))
            }
            Endpoint::Derived { .. } => None,
        }
    }
}

impl ConnectionDescriptor {
    pub fn parse(raw: &str) -> Result<Self> {
        let pairs = split_pairs(raw)?;
        if pairs.is_empty() {
            return Err(StowageError::config("connection descriptor is empty"));
        }

        if flag(&pairs, "uselocalstorage")? {
            let root = pairs.get("localroot").ok_or_else(|| {
                StowageError::config("UseLocalStorage requires LocalRoot=<directory>")
            })?;
            return Ok(ConnectionDescriptor::Local {
                root: PathBuf::from(root),
            });
        }

        if flag(&pairs, "usedevelopmentstorage")? {
            return Ok(ConnectionDescriptor::Emulator);
        }

        let account = pairs
            .get("accountname")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| StowageError::config("missing AccountName"))?
            .clone();

        let endpoint = match pairs.get("blobendpoint") {
            Some(uri) => Endpoint::Explicit(uri.clone()),
            None => Endpoint::Derived {
                protocol: pairs
                    .get("defaultendpointsprotocol")
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
                suffix: pairs
                    .get("endpointsuffix")
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_ENDPOINT_SUFFIX.to_string()),
            },
        };
        if let Endpoint::Derived { protocol, .. } = &endpoint {
            if protocol != "https" && protocol != "http" {
                return Err(StowageError::config(format!(
                    "unsupported DefaultEndpointsProtocol: {protocol}"
                )));
            }
        }

        match (pairs.get("accountkey"), pairs.get("sharedaccesssignature")) {
            (Some(key), _) => {
                if key.is_empty() || STANDARD.decode(key).is_err() {
                    return Err(StowageError::config("AccountKey is not valid base64"));
                }
                Ok(ConnectionDescriptor::AccountKey {
                    account,
                    key: key.clone(),
                    endpoint,
                })
            }
            (None, Some(sas)) if !sas.is_empty() => Ok(ConnectionDescriptor::Sas {
                account,
                sas: sas.trim_start_matches('?').to_string(),
                endpoint,
            }),
            _ => Err(StowageError::config(
                "missing credentials: expected AccountKey or SharedAccessSignature",
            )),
        }
    }

    /// Short human-readable label, safe to log.
    pub fn label(&self) -> String {
        match self {
            ConnectionDescriptor::AccountKey { account, .. } => format!("azure:{account}"),
            ConnectionDescriptor::Sas { account, .. } => format!("azure-sas:{account}"),
            ConnectionDescriptor::Emulator => "azure-emulator".to_string(),
            ConnectionDescriptor::Local { root } => format!("local:{}", root.display()),
        }
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionDescriptor::AccountKey {
                account, endpoint, ..
            } => f
                .debug_struct("AccountKey")
                .field("account", account)
                .field("key", &"[REDACTED]")
                .field("endpoint", endpoint)
                .finish(),
            ConnectionDescriptor::Sas {
                account, endpoint, ..
            } => f
                .debug_struct("Sas")
                .field("account", account)
                .field("sas", &"[REDACTED]")
                .field("endpoint", endpoint)
                .finish(),
            ConnectionDescriptor::Emulator => write!(f, "Emulator"),
            ConnectionDescriptor::Local { root } => {
                f.debug_struct("Local").field("root", root).finish()
            }
        }
    }
}

fn split_pairs(raw: &str) -> Result<HashMap<String, String>> {
    let mut pairs = HashMap::new();
    for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, value) = segment.split_once('=').ok_or_else(|| {
            StowageError::config(format!("malformed segment (expected Key=Value): {segment}"))
        })?;
        let key = key.trim().to_ascii_lowercase();
        if !is_known_key(&key) {
            return Err(StowageError::config(format!(
                "unknown connection key: {}",
                segment.split('=').next().unwrap_or_default()
            )));
        }
        pairs.insert(key, value.trim().to_string());
    }
    Ok(pairs)
}

fn is_known_key(key: &str) -> bool {
    matches!(
        key,
        "defaultendpointsprotocol"
            | "accountname"
            | "accountkey"
            | "endpointsuffix"
            | "blobendpoint"
            | "sharedaccesssignature"
            | "usedevelopmentstorage"
            | "uselocalstorage"
            | "localroot"
    ) || IGNORED_KEYS.contains(&key)
}

fn flag(pairs: &HashMap<String, String>, key: &str) -> Result<bool> {
    match pairs.get(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if v == "true" => Ok(true),
        Some(v) if v == "false" => Ok(false),
        Some(v) => Err(StowageError::config(format!(
            "expected true or false for {key}, got {v}"
        ))),
    }
}
