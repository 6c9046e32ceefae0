use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::http::parser::{ParseError, parse_http_request};
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::server::router::Router;
use crate::server::handlers::ApiResponse;

const READ_CHUNK: usize = 4096;

pub struct Connection<S> {
    stream: S,
    buffer: BytesMut,
    router: Arc<Router>,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(ResponseWriter, bool), // bool = keep_alive?
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, router: Arc<Router>) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            router,
            state: ConnectionState::Reading,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => match self.read_request().await {
                    Ok(Some(req)) => {
                        self.state = ConnectionState::Processing(req);
                    }
                    Ok(None) => {
                        self.state = ConnectionState::Closed;
                    }
                    Err(e) => {
                        // The stream position is lost, so answer and close.
                        tracing::warn!(error = %e, "Rejecting unparseable request");
                        let response = rejection(&e).with_connection_close();
                        self.state = ConnectionState::Writing(ResponseWriter::new(&response), false);
                    }
                },

                ConnectionState::Processing(req) => {
                    let keep_alive = req.keep_alive();
                    let mut response = self.router.dispatch(&req).await;
                    if !keep_alive {
                        response = response.with_connection_close();
                    }

                    let writer = ResponseWriter::new(&response);
                    self.state = ConnectionState::Writing(writer, keep_alive);
                }

                ConnectionState::Writing(mut writer, keep_alive) => {
                    writer.write_to_stream(&mut self.stream).await?;

                    if keep_alive {
                        self.state = ConnectionState::Reading;
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Reads until one full request is buffered.
    ///
    /// `Ok(None)` means the peer closed the connection between requests.
    pub async fn read_request(&mut self) -> Result<Option<Request>, ParseError> {
        loop {
            match parse_http_request(&self.buffer) {
                Ok((request, consumed)) => {
                    self.buffer.advance(consumed);
                    return Ok(Some(request));
                }

                Err(ParseError::Incomplete) => {}

                Err(e) => return Err(e),
            }

            self.buffer.reserve(READ_CHUNK);
            let n = match self.stream.read_buf(&mut self.buffer).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!(error = %e, "Read failed, closing connection");
                    return Ok(None);
                }
            };

            if n == 0 {
                if !self.buffer.is_empty() {
                    tracing::debug!(pending = self.buffer.len(), "Peer closed mid-request");
                }
                return Ok(None);
            }
        }
    }
}

/// Response for a request that could not be parsed.
fn rejection(error: &ParseError) -> Response {
    match error {
        ParseError::TooLarge => Response::json(
            StatusCode::PayloadTooLarge,
            &ApiResponse::error("Request is too large"),
        ),
        other => Response::json(
            StatusCode::BadRequest,
            &ApiResponse::error(format!("Malformed request: {}", other)),
        ),
    }
}
