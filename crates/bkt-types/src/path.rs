//! Bucket path parsing.
//!
//! A bucket path is a slash-delimited sequence of names starting with the
//! bucket name: `mybuck/path/to/file2.jpg`. A path with no segments after
//! the bucket name denotes the bucket's top-level directory.
//!
//! Rules:
//! - Leading and trailing `/` are ignored
//! - The bucket name must be non-empty and must not contain whitespace
//! - Interior segments must be non-empty (`a//b` is rejected)
//! - `.` and `..` segments are rejected; paths never escape their bucket
//! - NUL bytes are rejected anywhere

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A parsed, validated path into a bucket.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketPath {
    bucket: String,
    segments: Vec<String>,
}

impl BucketPath {
    /// Parse a `bucket/seg/...` string.
    ///
    /// # Examples
    ///
    /// ```
    /// use bkt_types::BucketPath;
    ///
    /// let path = BucketPath::parse("mybuck/path/to/file2.jpg").unwrap();
    /// assert_eq!(path.bucket(), "mybuck");
    /// assert_eq!(path.segments(), ["path", "to", "file2.jpg"]);
    /// assert!(BucketPath::parse("mybuck/../etc").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.contains('\0') {
            return Err(invalid("contains a NUL byte"));
        }

        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(invalid("bucket name must not be empty"));
        }

        let mut parts = trimmed.split('/');
        let bucket = parts.next().unwrap_or_default();
        if bucket.chars().any(char::is_whitespace) {
            return Err(invalid("bucket name must not contain whitespace"));
        }

        let mut segments = Vec::new();
        for segment in parts {
            validate_segment(segment).map_err(|reason| invalid(&reason))?;
            segments.push(segment.to_string());
        }
        validate_segment(bucket).map_err(|reason| invalid(&reason))?;

        Ok(Self {
            bucket: bucket.to_string(),
            segments,
        })
    }

    /// Path to a bucket's top-level directory.
    pub fn bucket_root(bucket: impl Into<String>) -> Result<Self, TypeError> {
        Self::parse(&bucket.into())
    }

    /// The bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Segments below the bucket's top-level directory.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns `true` if this path names the bucket's top-level directory.
    pub fn is_bucket_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The final segment, or `None` for the bucket root.
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The parent path, or `None` for the bucket root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            bucket: self.bucket.clone(),
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Append a single segment.
    pub fn join(&self, name: &str) -> Result<Self, TypeError> {
        validate_segment(name).map_err(|reason| TypeError::InvalidPath {
            path: format!("{self}/{name}"),
            reason,
        })?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(Self {
            bucket: self.bucket.clone(),
            segments,
        })
    }

    /// The path below the bucket, joined with `/` (empty for the bucket root).
    pub fn inner_path(&self) -> String {
        self.segments.join("/")
    }
}

fn validate_segment(segment: &str) -> Result<(), String> {
    match segment {
        "" => Err("path segments must not be empty".into()),
        "." | ".." => Err(format!("segment {segment:?} is not allowed")),
        _ => Ok(()),
    }
}

impl fmt::Display for BucketPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bucket)?;
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for BucketPath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
