//! Utility functions for creating s3 clients and the object operations the fetcher needs
use anyhow::Result;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::Client;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Client for public buckets; requests go out unsigned.
pub async fn anon_client(region: &str) -> Client {
    let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .no_credentials()
        .region(Region::new(region.to_string()))
        .load()
        .await;
    Client::new(&config)
}

pub trait S3ObjOps {
    /// All keys under `prefix`, in the order the store lists them.
    async fn list_keys(self: &Self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    async fn head_object(self: &Self, bucket: &str, key: &str) -> Result<HeadObjectOutput>;

    async fn get_object(self: &Self, bucket: &str, key: &str) -> Result<GetObjectOutput>;
}

pub struct Store {
    client: Client,
}

impl Store {
    pub async fn as_anon(region: &str) -> Self {
        let client = anon_client(region).await;
        Self { client }
    }
}

impl S3ObjOps for Store {
    async fn list_keys(self: &Self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = vec![];
        while let Some(page) = pages.next().await {
            let page = page?;
            keys.extend(page.contents().iter().filter_map(|o| o.key().map(str::to_string)));
        }
        Ok(keys)
    }

    async fn head_object(self: &Self, bucket: &str, key: &str) -> Result<HeadObjectOutput> {
        let head = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;
        Ok(head)
    }

    async fn get_object(self: &Self, bucket: &str, key: &str) -> Result<GetObjectOutput> {
        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;
        Ok(object)
    }
}
