//! Account-level bucket inventory listing ("given source and
//! destination bucket inventories"): a capability distinct from the
//! per-object [`crate::Storage`] contract, since it operates above any
//! single bucket. The `sync` CLI command's `AccountUri` is resolved
//! here into the `Vec<BucketInfo>` that `pairing::compute_pairing` pairs
//! up.
//!
//! Not part of the `Storage` trait itself: every concrete `Storage`
//! instance already addresses one bucket (via its `(type, bucketDomain)`
//! cache key), so "list the buckets in this account" has no natural `&self`
//! receiver there. This module is the account-level counterpart, used only
//! once per `Sync` RPC rather than per transfer.

use sync_api::{AccountUri, BucketInfo, ResourceType, SyncError};

use crate::backends::s3compat::{
    derive_signing_key, extract_xml_tag, format_amz_date, hmac_sha256, profile_for, sha256_hex,
};

/// Enumerates the buckets visible to `account`. `file` lists immediate
/// subdirectories of `account.region` (treated as a filesystem root) as
/// buckets; `url` has no multi-bucket notion and reports a single
/// synthetic bucket named after the list file; the cloud providers make a
/// real account-level listing call.
pub async fn list_buckets(account: &AccountUri) -> Result<Vec<BucketInfo>, SyncError> {
    match account.resource_type {
        ResourceType::File => list_file_buckets(&account.region).await,
        ResourceType::Url => Ok(vec![single_file_bucket(&account.region)]),
        ResourceType::S3 => list_s3_buckets(account).await,
        ResourceType::Obs | ResourceType::Oss | ResourceType::Cos | ResourceType::Cuc => {
            list_s3compat_buckets(account).await
        }
    }
}

async fn list_file_buckets(root: &str) -> Result<Vec<BucketInfo>, SyncError> {
    let mut out = Vec::new();
    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let domain = entry.path().to_string_lossy().into_owned();
            out.push(BucketInfo { name, domain });
        }
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

fn single_file_bucket(path: &str) -> BucketInfo {
    let name = std::path::Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    BucketInfo {
        name,
        domain: path.to_string(),
    }
}

async fn list_s3_buckets(account: &AccountUri) -> Result<Vec<BucketInfo>, SyncError> {
    let credentials = aws_credential_types::Credentials::new(
        &account.access_key,
        &account.secret_key,
        None,
        None,
        "sync-inventory",
    );
    let config = aws_sdk_s3::config::Builder::new()
        .region(aws_types::region::Region::new(account.region.clone()))
        .credentials_provider(credentials)
        .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
        .build();
    let client = aws_sdk_s3::Client::from_conf(config);
    let resp = client
        .list_buckets()
        .send()
        .await
        .map_err(|e| SyncError::Transient(e.to_string()))?;
    Ok(resp
        .buckets()
        .iter()
        .filter_map(|b| b.name())
        .map(|name| BucketInfo {
            domain: sync_api::uri::synthesize_domain(ResourceType::S3, name, &account.region),
            name: name.to_string(),
        })
        .collect())
}

fn service_endpoint(resource_type: ResourceType, region: &str) -> String {
    match resource_type {
        ResourceType::Cos => format!("cos.{region}.myqcloud.com"),
        ResourceType::Cuc => format!("obs-{region}-internal.cucloud.cn"),
        ResourceType::Obs => format!("obs.{region}.myhuaweicloud.com"),
        ResourceType::Oss => format!("{region}.aliyuncs.com"),
        other => unreachable!("service_endpoint does not cover {other:?}"),
    }
}

/// `GET /` against the provider's service root (not a bucket host), signed
/// with the same SigV4-shaped scheme `S3CompatStorage` uses for object
/// operations, listing every bucket owned by the account.
async fn list_s3compat_buckets(account: &AccountUri) -> Result<Vec<BucketInfo>, SyncError> {
    let host = service_endpoint(account.resource_type, &account.region);
    let profile = profile_for(account.resource_type);
    let empty_sha = sha256_hex(b"");
    let amz_date = format_amz_date(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
    );
    let date_stamp = &amz_date[..8];

    let canonical_headers = format!(
        "host:{host}\nx-amz-content-sha256:{empty_sha}\nx-amz-date:{amz_date}\n"
    );
    let signed_headers = "host;x-amz-content-sha256;x-amz-date";
    let canonical_request =
        format!("GET\n/\n\n{canonical_headers}\n{signed_headers}\n{empty_sha}");
    let credential_scope = format!("{date_stamp}/{}/{}/aws4_request", account.region, profile.service);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{credential_scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );
    let signing_key = derive_signing_key(&account.secret_key, date_stamp, &account.region, profile.service);
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));
    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
        account.access_key
    );

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("https://{host}/"))
        .header("host", host.clone())
        .header("x-amz-date", amz_date)
        .header("x-amz-content-sha256", empty_sha)
        .header("authorization", authorization)
        .send()
        .await
        .map_err(|e| SyncError::Transient(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(SyncError::Transient(format!(
            "GET service returned {}",
            resp.status()
        )));
    }
    let body = resp.text().await.map_err(|e| SyncError::Transient(e.to_string()))?;
    Ok(parse_list_all_my_buckets(&body, account.resource_type, &account.region))
}

/// Scrapes `<Bucket><Name>...</Name></Bucket>` entries out of a
/// `ListAllMyBucketsResult`-shaped body, the same "small tag scraper"
/// approach `s3compat`'s object listing uses rather than a full XML parser.
fn parse_list_all_my_buckets(body: &str, resource_type: ResourceType, region: &str) -> Vec<BucketInfo> {
    let mut out = Vec::new();
    for bucket in body.split("<Bucket>").skip(1) {
        let entry = bucket.split("</Bucket>").next().unwrap_or_default();
        let Some(name) = extract_xml_tag(entry, "Name") else {
            continue;
        };
        let domain = sync_api::uri::synthesize_domain(resource_type, &name, region);
        out.push(BucketInfo { name, domain });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_all_my_buckets_xml() {
        let xml = "<ListAllMyBucketsResult><Buckets><Bucket><Name>alpha</Name></Bucket><Bucket><Name>beta</Name></Bucket></Buckets></ListAllMyBucketsResult>";
        let buckets = parse_list_all_my_buckets(xml, ResourceType::Oss, "cn-north-1");
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].name, "alpha");
        assert_eq!(buckets[0].domain, "alpha.cn-north-1.aliyuncs.com");
    }

    #[tokio::test]
    async fn file_inventory_lists_subdirectories_as_buckets() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("bucket-a")).await.unwrap();
        tokio::fs::create_dir(dir.path().join("bucket-b")).await.unwrap();
        tokio::fs::write(dir.path().join("not-a-bucket.txt"), b"x").await.unwrap();

        let account = AccountUri {
            resource_type: ResourceType::File,
            region: dir.path().to_string_lossy().into_owned(),
            access_key: String::new(),
            secret_key: String::new(),
        };
        let buckets = list_buckets(&account).await.unwrap();
        let names: Vec<_> = buckets.into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["bucket-a".to_string(), "bucket-b".to_string()]);
    }
}
