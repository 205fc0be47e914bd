//! Bucket pairing: turns two bucket-name inventories into directional
//! [`BucketPairing`] records.

use std::collections::HashSet;

use sync_api::uri::synthesize_domain;
use sync_api::{BucketInfo, BucketPairing, Orientation, ResourceType};

/// Computes the pairing plan for one (source-type, dest-type) combination,
/// given each side's bucket inventory and the region to synthesize a
/// missing counterpart's domain from.
pub fn compute_pairing(
    src_buckets: &[BucketInfo],
    dest_buckets: &[BucketInfo],
    src_type: ResourceType,
    dest_type: ResourceType,
    dest_region: &str,
    src_region: &str,
) -> Vec<BucketPairing> {
    if src_buckets.is_empty() {
        return dest_buckets
            .iter()
            .map(|b| BucketPairing {
                name: b.name.clone(),
                src_bucket_domain: synthesize_domain(src_type, &b.name, src_region),
                dest_bucket_domain: b.domain.clone(),
                orientation: Orientation::From,
            })
            .collect();
    }
    if dest_buckets.is_empty() {
        return src_buckets
            .iter()
            .map(|b| BucketPairing {
                name: b.name.clone(),
                src_bucket_domain: b.domain.clone(),
                dest_bucket_domain: synthesize_domain(dest_type, &b.name, dest_region),
                orientation: Orientation::To,
            })
            .collect();
    }

    let src_by_name: std::collections::HashMap<&str, &BucketInfo> =
        src_buckets.iter().map(|b| (b.name.as_str(), b)).collect();
    let mut consumed: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(src_buckets.len() + dest_buckets.len());

    for dest in dest_buckets {
        if let Some(src) = src_by_name.get(dest.name.as_str()) {
            consumed.insert(dest.name.as_str());
            out.push(BucketPairing {
                name: dest.name.clone(),
                src_bucket_domain: src.domain.clone(),
                dest_bucket_domain: dest.domain.clone(),
                orientation: Orientation::With,
            });
        } else {
            out.push(BucketPairing {
                name: dest.name.clone(),
                src_bucket_domain: synthesize_domain(src_type, &dest.name, src_region),
                dest_bucket_domain: dest.domain.clone(),
                orientation: Orientation::From,
            });
        }
    }

    for src in src_buckets {
        if !consumed.contains(src.name.as_str()) {
            out.push(BucketPairing {
                name: src.name.clone(),
                src_bucket_domain: src.domain.clone(),
                dest_bucket_domain: synthesize_domain(dest_type, &src.name, dest_region),
                orientation: Orientation::To,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, domain: &str) -> BucketInfo {
        BucketInfo {
            name: name.to_string(),
            domain: domain.to_string(),
        }
    }

    #[test]
    fn empty_destination_yields_to_for_every_source_bucket() {
        let src = vec![info("a", "a.src.com"), info("b", "b.src.com")];
        let out = compute_pairing(&src, &[], ResourceType::S3, ResourceType::Oss, "cn-north-1", "us-east-1");
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|p| matches!(p.orientation, Orientation::To)));
    }

    #[test]
    fn shared_name_yields_with_others_split_to_from() {
        let src = vec![info("shared", "shared.src.com"), info("only-src", "os.src.com")];
        let dest = vec![info("shared", "shared.dst.com"), info("only-dst", "od.dst.com")];
        let out = compute_pairing(&src, &dest, ResourceType::S3, ResourceType::Oss, "cn-north-1", "us-east-1");

        let with = out.iter().find(|p| p.name == "shared").unwrap();
        assert!(matches!(with.orientation, Orientation::With));

        let to = out.iter().find(|p| p.name == "only-src").unwrap();
        assert!(matches!(to.orientation, Orientation::To));

        let from = out.iter().find(|p| p.name == "only-dst").unwrap();
        assert!(matches!(from.orientation, Orientation::From));
    }
}
