use serde::{Deserialize, Serialize};

/// Canned ACL, approximating per-grant permissions across providers.
///
/// `Default` on `Put` means "inherit the bucket's effective canned ACL";
/// backends map their own grant model onto this set, and coerce
/// unsupported values (e.g. COS rejecting `PublicReadWrite`) back to
/// `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CannedAcl {
    #[default]
    Default,
    Private,
    PublicRead,
    AuthenticatedRead,
    PublicReadWrite,
}

impl CannedAcl {
    /// Maps a set of ACL grants (as `(grantee, permission)` pairs, using the
    /// provider-neutral grantee names `AllUsers` / `AuthenticatedUsers`)
    /// into the canned set.
    pub fn from_grants<'a>(grants: impl IntoIterator<Item = (&'a str, &'a str)>) -> CannedAcl {
        let mut all_read = false;
        let mut all_write = false;
        let mut auth_read = false;
        for (grantee, permission) in grants {
            match (grantee, permission) {
                ("AllUsers", "READ") => all_read = true,
                ("AllUsers", "WRITE") => all_write = true,
                ("AuthenticatedUsers", "READ") => auth_read = true,
                _ => {}
            }
        }
        if all_read && all_write {
            CannedAcl::PublicReadWrite
        } else if all_read {
            CannedAcl::PublicRead
        } else if auth_read {
            CannedAcl::AuthenticatedRead
        } else {
            CannedAcl::Private
        }
    }

    /// Coerces a value a backend cannot express down to `Default`.
    pub fn coerce_if_unsupported(self, supported: impl Fn(CannedAcl) -> bool) -> CannedAcl {
        if supported(self) {
            self
        } else {
            CannedAcl::Default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_public_read() {
        let acl = CannedAcl::from_grants([("AllUsers", "READ")]);
        assert_eq!(acl, CannedAcl::PublicRead);
    }

    #[test]
    fn maps_public_read_write() {
        let acl = CannedAcl::from_grants([("AllUsers", "READ"), ("AllUsers", "WRITE")]);
        assert_eq!(acl, CannedAcl::PublicReadWrite);
    }

    #[test]
    fn coerces_unsupported_public_read_write() {
        let acl = CannedAcl::PublicReadWrite;
        let coerced = acl.coerce_if_unsupported(|a| a != CannedAcl::PublicReadWrite);
        assert_eq!(coerced, CannedAcl::Default);
    }
}
