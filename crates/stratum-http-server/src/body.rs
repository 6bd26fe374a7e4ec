//! Bounded request body reads.

use std::fmt::Display;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use http_body::Body;
use http_body_util::BodyExt;

use crate::{HttpRpcError, Result};

/// Limits applied while reading a request body.
///
/// How much hyper pulls off the socket per read is set on the connection
/// (`ServerConfig::max_chunk_size`); these limits apply to the collected body.
#[derive(Debug, Clone)]
pub struct BodyLimits {
    /// Largest body accepted in total
    pub max_body_size: usize,
    /// Deadline for the whole body
    pub read_timeout: Duration,
}

impl Default for BodyLimits {
    fn default() -> Self {
        Self {
            max_body_size: 64 * 1024 * 1024,
            read_timeout: Duration::from_secs(30),
        }
    }
}

/// Read a body to the end under `limits`.
///
/// With a declared length the body must be exactly that long; without one it
/// is read until the stream ends.
pub async fn read_body<B>(
    body: B,
    declared: Option<usize>,
    limits: &BodyLimits,
) -> Result<Bytes>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    if let Some(declared) = declared
        && declared > limits.max_body_size
    {
        return Err(HttpRpcError::PayloadTooLarge {
            limit: limits.max_body_size,
        });
    }

    tokio::time::timeout(limits.read_timeout, read_frames(body, declared, limits))
        .await
        .map_err(|_| HttpRpcError::BodyTimeout)?
}

async fn read_frames<B>(
    body: B,
    declared: Option<usize>,
    limits: &BodyLimits,
) -> Result<Bytes>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let mut body = std::pin::pin!(body);
    let mut buffer = BytesMut::with_capacity(declared.unwrap_or(0));

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|err| HttpRpcError::BodyRead(err.to_string()))?;
        let Ok(data) = frame.into_data() else {
            continue; // trailers
        };

        let total = buffer.len() + data.len();
        if total > limits.max_body_size {
            return Err(HttpRpcError::PayloadTooLarge {
                limit: limits.max_body_size,
            });
        }
        if let Some(declared) = declared
            && total > declared
        {
            return Err(HttpRpcError::BodyRead(format!(
                "body is longer than the declared {declared} bytes"
            )));
        }

        buffer.extend_from_slice(&data);
    }

    if let Some(declared) = declared
        && buffer.len() < declared
    {
        return Err(HttpRpcError::BodyRead(format!(
            "body ended after {} of {} declared bytes",
            buffer.len(),
            declared
        )));
    }

    Ok(buffer.freeze())
}
