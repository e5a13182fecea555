//! Stdio transport: newline-delimited JSON-RPC on stdin/stdout
//!
//! Exactly one client, one implicit session, no framing beyond the
//! newline. Malformed lines are logged and skipped; the loop ends cleanly
//! at EOF. Nothing but JSON-RPC ever reaches stdout - diagnostics belong
//! on stderr (see [`crate::init_stderr_logging`]).

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tern_mcp_json_rpc_server::{
    IncomingItem, JsonRpcDispatcher, JsonRpcMessage, SessionContext, parse_message,
};
use tern_mcp_protocol::McpError;

use crate::bridge::ClientBridge;
use crate::session::{STDIO_SESSION_ID, SessionManager};

/// Run the stdio loop over arbitrary reader/writer pairs (testable); the
/// public entry point wires in the process stdin/stdout.
pub async fn run_lines<R, W>(
    reader: R,
    writer: W,
    dispatcher: Arc<JsonRpcDispatcher<McpError>>,
    sessions: Arc<SessionManager>,
    bridge: Arc<ClientBridge>,
    shutdown: CancellationToken,
) -> crate::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut incoming = FramedRead::new(reader, LinesCodec::new());
    let mut outgoing = FramedWrite::new(writer, LinesCodec::new());

    let session = sessions.create_stdio();
    let mut outbound = session
        .take_stream()
        .expect("stdio session stream already taken");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("stdio transport shutting down");
                break;
            }
            message = outbound.recv() => {
                if let Some(message) = message {
                    write_message(&mut outgoing, &message).await?;
                }
            }
            line = incoming.next() => {
                match line {
                    None => {
                        debug!("stdin closed, stdio transport ending");
                        break;
                    }
                    Some(Err(err)) => {
                        warn!("stdin read error: {}", err);
                        continue;
                    }
                    Some(Ok(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        handle_line(&line, &dispatcher, &bridge, &mut outgoing).await?;
                    }
                }
            }
        }
    }

    sessions.remove(STDIO_SESSION_ID);
    Ok(())
}

async fn handle_line<W>(
    line: &str,
    dispatcher: &JsonRpcDispatcher<McpError>,
    bridge: &ClientBridge,
    outgoing: &mut FramedWrite<W, LinesCodec>,
) -> crate::Result<()>
where
    W: AsyncWrite + Unpin,
{
    // Local recovery: malformed lines log to stderr and the loop continues
    let parsed = match parse_message(line) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!("skipping malformed stdio line: {}", err.error.message);
            return Ok(());
        }
    };

    for item in parsed.into_items() {
        match item {
            IncomingItem::Request(request) => {
                let response = dispatcher
                    .dispatch(request, Some(SessionContext::new(STDIO_SESSION_ID)))
                    .await;
                write_message(outgoing, &response).await?;
            }
            IncomingItem::Notification(notification) => {
                if let Err(err) = dispatcher
                    .dispatch_notification(
                        &notification.method,
                        notification.params,
                        Some(SessionContext::new(STDIO_SESSION_ID)),
                    )
                    .await
                {
                    warn!("notification handler failed: {}", err);
                }
            }
            IncomingItem::Reply(reply) => {
                bridge.complete(reply);
            }
        }
    }
    Ok(())
}

async fn write_message<W>(
    outgoing: &mut FramedWrite<W, LinesCodec>,
    message: &JsonRpcMessage,
) -> crate::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = serde_json::to_string(message)
        .map_err(|e| crate::FrameworkError::Config(format!("unserializable message: {e}")))?;
    outgoing
        .send(line)
        .await
        .map_err(|e| crate::FrameworkError::Io(std::io::Error::other(e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ClientBridge;
    use crate::dispatcher::{KernelDispatcher, ServerSettings};
    use crate::normalize::ToolOutput;
    use crate::registry::Registry;
    use crate::tool::FnTool;
    use crate::uires::UiCompiler;
    use std::sync::RwLock;
    use tern_mcp_protocol::initialize::Implementation;
    use tern_mcp_protocol::schema::ObjectSchema;

    fn rpc_dispatcher() -> Arc<JsonRpcDispatcher<McpError>> {
        let mut registry = Registry::new();
        registry
            .insert_tool(Arc::new(FnTool::new(
                "echo",
                ObjectSchema::new().property(
                    "text",
                    tern_mcp_protocol::schema::JsonSchema::string(),
                    true,
                ),
                |args, _ctx| async move {
                    Ok(ToolOutput::text(
                        args["text"].as_str().unwrap_or_default().to_string(),
                    ))
                },
            )))
            .unwrap();

        let sessions = Arc::new(SessionManager::default());
        let settings = Arc::new(ServerSettings::default());
        let kernel = KernelDispatcher::new(
            Implementation::new("stdio-test", "0.0.0"),
            None,
            Arc::new(RwLock::new(registry)),
            sessions,
            Arc::new(ClientBridge::new()),
            settings.clone(),
            Arc::new(UiCompiler::new(settings.base_path.clone(), Default::default())),
        );
        let mut dispatcher = JsonRpcDispatcher::new();
        dispatcher.register(kernel);
        Arc::new(dispatcher)
    }

    #[tokio::test]
    async fn test_request_response_on_pipes() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"echo","arguments":{"text":"hi"}}}"#,
            "\n",
            "this is not json\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
            "\n",
        );
        let mut output: Vec<u8> = Vec::new();

        run_lines(
            input.as_bytes(),
            &mut output,
            rpc_dispatcher(),
            Arc::new(SessionManager::default()),
            Arc::new(ClientBridge::new()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        // The malformed line is skipped; both requests answer in order
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["id"], 1);
        assert_eq!(first["result"]["content"][0]["text"], "hi");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["id"], 2);
    }

    #[tokio::test]
    async fn test_eof_ends_cleanly_and_releases_session() {
        let sessions = Arc::new(SessionManager::default());
        let mut output: Vec<u8> = Vec::new();
        run_lines(
            &b""[..],
            &mut output,
            rpc_dispatcher(),
            sessions.clone(),
            Arc::new(ClientBridge::new()),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(output.is_empty());
        assert!(sessions.get(STDIO_SESSION_ID).is_none());
    }
}
