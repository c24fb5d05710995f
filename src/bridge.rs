//! Line-delimited JSON bridge to the external voice runtime.
//!
//! Each request line is `{"id": ..., "name": "...", "arguments": {...}}`
//! and gets exactly one reply line `{"id": ..., "result": <envelope>}`.

use crate::context::ToolContext;
use crate::error::ErrorKind;
use crate::tools::{ToolRegistry, ToolResult};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
pub struct BridgeRequest {
    #[serde(default)]
    pub id: Value,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Serialize)]
pub struct BridgeReply {
    pub id: Value,
    pub result: ToolResult,
}

/// Handles one request line. Blank lines produce no reply.
pub async fn handle_line(
    registry: &ToolRegistry,
    ctx: &Arc<ToolContext>,
    line: &str,
) -> Option<BridgeReply> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let reply = match serde_json::from_str::<BridgeRequest>(line) {
        Ok(request) => BridgeReply {
            result: registry.dispatch(ctx, &request.name, request.arguments).await,
            id: request.id,
        },
        Err(e) => {
            warn!("Malformed request: {}", e);
            BridgeReply {
                id: Value::Null,
                result: ToolResult::failure(
                    format!("Malformed request: {}", e),
                    Some(ErrorKind::InvalidInput),
                ),
            }
        }
    };
    Some(reply)
}

/// Serves requests until input ends or `shutdown` resolves. A call still
/// running at shutdown is dropped, which terminates its child process.
pub async fn serve<R, W, S>(
    registry: &ToolRegistry,
    ctx: &Arc<ToolContext>,
    reader: R,
    mut writer: W,
    shutdown: S,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut lines = reader.lines();
    info!("🎙️  Bridge ready with {} tools", registry.len());

    loop {
        let line = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => {
                    debug!("Input closed");
                    break;
                }
            },
        };

        let reply = tokio::select! {
            _ = &mut shutdown => {
                warn!("Shutdown requested while a tool was running; cancelling it");
                break;
            }
            reply = handle_line(registry, ctx, &line) => reply,
        };

        if let Some(reply) = reply {
            let mut encoded = serde_json::to_string(&reply)?;
            encoded.push('\n');
            writer.write_all(encoded.as_bytes()).await?;
            writer.flush().await?;
        }
    }

    Ok(())
}
