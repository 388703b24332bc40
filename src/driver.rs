//! Newline-delimited JSON front end for the engine service.
//!
//! Each input line is one request tagged by `type`:
//!
//! ```text
//! {"type":"order","side":"bid","price":100,"quantity":3,"userId":"2"}
//! {"type":"depth","levels":10}
//! {"type":"balance","userId":"1"}
//! {"type":"quote"}
//! ```
//!
//! and produces exactly one JSON response line.

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::engine::{EngineHandle, ServiceError};
use crate::matching::SubmitError;
use crate::models::{NewOrder, OrderRequest, UserId};

pub const NOT_ENOUGH_DATA: &str = "Not enough market data";

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Order(OrderRequest),
    Depth {
        #[serde(default)]
        levels: Option<usize>,
    },
    Balance {
        #[serde(rename = "userId")]
        user_id: UserId,
    },
    Quote,
}

fn rejection(err: &SubmitError) -> Value {
    json!({ "error": err.reason(), "message": err.to_string() })
}

pub async fn handle_request(handle: &EngineHandle, request: Request) -> anyhow::Result<Value> {
    let response = match request {
        Request::Order(order) => {
            let order = match NewOrder::try_from(order) {
                Ok(order) => order,
                Err(err) => return Ok(rejection(&err)),
            };
            match handle.submit(order).await {
                Ok(report) => serde_json::to_value(report)?,
                Err(ServiceError::Rejected(err)) => rejection(&err),
                Err(err) => return Err(err.into()),
            }
        }
        Request::Depth { levels } => serde_json::to_value(handle.depth(levels).await?)?,
        Request::Balance { user_id } => serde_json::to_value(handle.balances(user_id).await?)?,
        Request::Quote => match handle.quote().await? {
            Some(quote) => serde_json::to_value(quote)?,
            None => json!({ "message": NOT_ENOUGH_DATA }),
        },
    };
    Ok(response)
}

pub async fn handle_line(handle: &EngineHandle, line: &str) -> anyhow::Result<Value> {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => handle_request(handle, request).await,
        Err(err) => {
            warn!(%err, "malformed request");
            Ok(json!({ "error": "malformed request", "message": err.to_string() }))
        }
    }
}

/// Answers every non-blank line of `reader` on `writer`. Returns the number of
/// requests served.
pub async fn run<R, W>(handle: &EngineHandle, reader: R, mut writer: W) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = LinesStream::new(reader.lines());
    let mut served = 0;
    while let Some(line) = lines.next().await {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(handle, &line).await?;
        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        served += 1;
    }
    writer.flush().await?;
    Ok(served)
}
