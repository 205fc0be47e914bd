use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// The backend kind a [`StorageUri`] addresses. Doubles as the registry key
/// in `storage::registry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    File,
    Url,
    Oss,
    S3,
    Cuc,
    Obs,
    Cos,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceType::File => "file",
            ResourceType::Url => "url",
            ResourceType::Oss => "oss",
            ResourceType::S3 => "s3",
            ResourceType::Cuc => "cuc",
            ResourceType::Obs => "obs",
            ResourceType::Cos => "cos",
        };
        f.write_str(s)
    }
}

impl FromStr for ResourceType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "file" => ResourceType::File,
            "url" => ResourceType::Url,
            "oss" => ResourceType::Oss,
            "s3" => ResourceType::S3,
            "cuc" => ResourceType::Cuc,
            "obs" => ResourceType::Obs,
            "cos" => ResourceType::Cos,
            other => {
                return Err(SyncError::invalid_uri(format!(
                    "unknown storage type {other:?}"
                )))
            }
        })
    }
}

/// A parsed storage endpoint: `<access>:<secret>@<type>://<bucketDomain>`.
///
/// Two URIs with equal `(resource_type, bucket_domain)` address the same
/// storage handle: `storage::registry::Registry` caches backend instances
/// keyed on exactly that pair, matching the contract of the design
/// doc.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageUri {
    pub resource_type: ResourceType,
    pub bucket_domain: String,
    pub access_key: String,
    pub secret_key: String,
}

impl StorageUri {
    pub fn cache_key(&self) -> (ResourceType, String) {
        (self.resource_type, self.bucket_domain.clone())
    }
}

impl FromStr for StorageUri {
    type Err = SyncError;

    /// Parses `<access>:<secret>@<type>://<bucketDomain>`.
    ///
    /// `access`/`secret` are optional for backends that need none (`file`,
    /// `url`): `file:///var/data` and `url:///path/to/list.txt` are both
    /// accepted with empty credentials.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (credentials, rest) = match s.split_once('@') {
            Some((c, r)) => (Some(c), r),
            None => (None, s),
        };
        let (scheme, domain) = rest.split_once("://").ok_or_else(|| {
            SyncError::invalid_uri(format!("missing '://' in storage uri {s:?}"))
        })?;
        let resource_type: ResourceType = scheme.parse()?;

        let (access_key, secret_key) = match credentials {
            Some(c) => match c.split_once(':') {
                Some((a, s)) => (a.to_string(), s.to_string()),
                None => (c.to_string(), String::new()),
            },
            None => (String::new(), String::new()),
        };

        Ok(StorageUri {
            resource_type,
            bucket_domain: domain.to_string(),
            access_key,
            secret_key,
        })
    }
}

impl fmt::Display for StorageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:***@{}://{}",
            self.access_key, self.resource_type, self.bucket_domain
        )
    }
}

/// An account-level endpoint, as accepted by the `sync` CLI command and the
/// `Sync` RPC: `<access>:<secret>@<type>://<region>`. Distinct from
/// [`StorageUri`], which already addresses one bucket — this is the
/// credential the coordinator uses to *enumerate* the buckets an account
/// holds before any per-bucket `StorageUri` exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountUri {
    pub resource_type: ResourceType,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

impl FromStr for AccountUri {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (credentials, rest) = match s.split_once('@') {
            Some((c, r)) => (Some(c), r),
            None => (None, s),
        };
        let (scheme, region) = rest.split_once("://").ok_or_else(|| {
            SyncError::invalid_uri(format!("missing '://' in account uri {s:?}"))
        })?;
        let resource_type: ResourceType = scheme.parse()?;
        let (access_key, secret_key) = match credentials {
            Some(c) => match c.split_once(':') {
                Some((a, s)) => (a.to_string(), s.to_string()),
                None => (c.to_string(), String::new()),
            },
            None => (String::new(), String::new()),
        };
        Ok(AccountUri {
            resource_type,
            region: region.to_string(),
            access_key,
            secret_key,
        })
    }
}

impl fmt::Display for AccountUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:***@{}://{}", self.access_key, self.resource_type, self.region)
    }
}

/// Synthesizes a bucket domain for a provider that doesn't yet have an
/// inventory entry, following the fixed per-provider templates.
pub fn synthesize_domain(resource_type: ResourceType, name: &str, region: &str) -> String {
    match resource_type {
        ResourceType::Cos => format!("{name}.cos.{region}.myqcloud.com"),
        ResourceType::Cuc => format!("{name}.obs-{region}-internal.cucloud.cn"),
        ResourceType::Obs => format!("{name}.obs.{region}.myhuaweicloud.com"),
        ResourceType::Oss => format!("{name}.{region}.aliyuncs.com"),
        ResourceType::S3 => format!("{name}.{region}.amazonaws.com"),
        ResourceType::File | ResourceType::Url => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_uri() {
        let uri: StorageUri = "AK123:SK456@s3://my-bucket.us-east-1.amazonaws.com"
            .parse()
            .unwrap();
        assert_eq!(uri.resource_type, ResourceType::S3);
        assert_eq!(uri.access_key, "AK123");
        assert_eq!(uri.secret_key, "SK456");
        assert_eq!(uri.bucket_domain, "my-bucket.us-east-1.amazonaws.com");
    }

    #[test]
    fn parses_credential_free_uri() {
        let uri: StorageUri = "file:///var/data".parse().unwrap();
        assert_eq!(uri.resource_type, ResourceType::File);
        assert_eq!(uri.access_key, "");
        assert_eq!(uri.bucket_domain, "/var/data");
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!("a:b@ftp://host".parse::<StorageUri>().is_err());
    }

    #[test]
    fn parses_account_uri() {
        let account: AccountUri = "AK:SK@oss://cn-north-1".parse().unwrap();
        assert_eq!(account.resource_type, ResourceType::Oss);
        assert_eq!(account.region, "cn-north-1");
    }

    #[test]
    fn domain_templates_match_spec() {
        assert_eq!(
            synthesize_domain(ResourceType::Oss, "bkt", "cn-north-1"),
            "bkt.cn-north-1.aliyuncs.com"
        );
        assert_eq!(
            synthesize_domain(ResourceType::Cos, "bkt", "ap-guangzhou"),
            "bkt.cos.ap-guangzhou.myqcloud.com"
        );
    }
}
