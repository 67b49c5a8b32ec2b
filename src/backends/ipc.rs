//! # Wire frames between the executor and its worker processes.
//!
//! Format: 4-byte length (u32 LE) + body. Bodies are a one-byte tag followed
//! by tag-specific fields:
//!
//! ```text
//! request  RUN      = [0x01][u32 LE handler id][payload bytes]
//! request  SHUTDOWN = [0x02]
//! response OK       = [0x01][result bytes]
//! response ERR      = [0x02][utf-8 handler error]
//! response INTERNAL = [0x03][utf-8 worker error]
//! ```
//!
//! Payload and result bytes are opaque; their codec belongs to the
//! [`ProcessRoutine`](crate::ProcessRoutine). `ERR` carries a failure the
//! handler itself reported (including a caught panic), `INTERNAL` a dispatch
//! problem inside the worker (unknown handler id, wrong backend).
//!
//! The worker reads frames synchronously from stdin; the parent writes and
//! reads asynchronously over the child's pipes.

use std::io::{self, Read, Write};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reject frames larger than this; nothing sane crosses this boundary at
/// that size.
const MAX_FRAME: usize = 64 * 1024 * 1024;

const TAG_RUN: u8 = 0x01;
const TAG_SHUTDOWN: u8 = 0x02;

const TAG_OK: u8 = 0x01;
const TAG_ERR: u8 = 0x02;
const TAG_INTERNAL: u8 = 0x03;

/// Parent → worker.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Request {
    /// Execute handler `handler` on `payload`.
    Run { handler: u32, payload: Vec<u8> },
    /// Exit the worker loop cleanly.
    Shutdown,
}

/// Worker → parent.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Response {
    /// Handler produced result bytes.
    Ok(Vec<u8>),
    /// Handler reported a failure (or panicked).
    Err(String),
    /// The worker could not dispatch the request.
    Internal(String),
}

impl Request {
    fn encode(&self) -> Vec<u8> {
        match self {
            Request::Run { handler, payload } => {
                let mut body = Vec::with_capacity(5 + payload.len());
                body.push(TAG_RUN);
                body.extend_from_slice(&handler.to_le_bytes());
                body.extend_from_slice(payload);
                body
            }
            Request::Shutdown => vec![TAG_SHUTDOWN],
        }
    }

    fn decode(body: Vec<u8>) -> io::Result<Self> {
        match body.split_first() {
            Some((&TAG_RUN, rest)) => {
                if rest.len() < 4 {
                    return Err(invalid("truncated run request"));
                }
                let (id, payload) = rest.split_at(4);
                let handler = u32::from_le_bytes([id[0], id[1], id[2], id[3]]);
                Ok(Request::Run {
                    handler,
                    payload: payload.to_vec(),
                })
            }
            Some((&TAG_SHUTDOWN, [])) => Ok(Request::Shutdown),
            _ => Err(invalid("malformed request frame")),
        }
    }
}

impl Response {
    fn encode(&self) -> Vec<u8> {
        let (tag, bytes): (u8, &[u8]) = match self {
            Response::Ok(bytes) => (TAG_OK, bytes),
            Response::Err(msg) => (TAG_ERR, msg.as_bytes()),
            Response::Internal(msg) => (TAG_INTERNAL, msg.as_bytes()),
        };
        let mut body = Vec::with_capacity(1 + bytes.len());
        body.push(tag);
        body.extend_from_slice(bytes);
        body
    }

    fn decode(body: Vec<u8>) -> io::Result<Self> {
        match body.split_first() {
            Some((&TAG_OK, rest)) => Ok(Response::Ok(rest.to_vec())),
            Some((&TAG_ERR, rest)) => Ok(Response::Err(utf8(rest)?)),
            Some((&TAG_INTERNAL, rest)) => Ok(Response::Internal(utf8(rest)?)),
            _ => Err(invalid("malformed response frame")),
        }
    }
}

/// Reads one request frame from the worker's stdin.
///
/// Returns `None` on clean EOF (parent closed the pipe).
pub(crate) fn read_request(reader: &mut impl Read) -> io::Result<Option<Request>> {
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let body = read_body(reader, len_bytes)?;
    Request::decode(body).map(Some)
}

/// Writes one response frame to the worker's stdout.
pub(crate) fn write_response(writer: &mut impl Write, response: &Response) -> io::Result<()> {
    let body = response.encode();
    writer.write_all(&(body.len() as u32).to_le_bytes())?;
    writer.write_all(&body)?;
    writer.flush()
}

/// Writes one request frame to a child's stdin.
pub(crate) async fn write_request(
    writer: &mut (impl AsyncWrite + Unpin),
    request: &Request,
) -> io::Result<()> {
    let body = request.encode();
    writer.write_all(&(body.len() as u32).to_le_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await
}

/// Reads one response frame from a child's stdout.
pub(crate) async fn read_response(reader: &mut (impl AsyncRead + Unpin)) -> io::Result<Response> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = checked_len(len_bytes)?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Response::decode(body)
}

fn read_body(reader: &mut impl Read, len_bytes: [u8; 4]) -> io::Result<Vec<u8>> {
    let len = checked_len(len_bytes)?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(body)
}

fn checked_len(len_bytes: [u8; 4]) -> io::Result<usize> {
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len == 0 || len > MAX_FRAME {
        return Err(invalid("frame length out of bounds"));
    }
    Ok(len)
}

fn utf8(bytes: &[u8]) -> io::Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| invalid("non-utf8 error frame"))
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn request_roundtrip(req: Request) -> Request {
        let mut buf = Vec::new();
        // Parent writes async; drive it on the current thread.
        futures::executor::block_on(write_request(&mut buf, &req)).unwrap();
        let mut cursor = Cursor::new(buf);
        read_request(&mut cursor).unwrap().unwrap()
    }

    #[test]
    fn run_request_roundtrip() {
        let decoded = request_roundtrip(Request::Run {
            handler: 3,
            payload: vec![1, 2, 3, 4, 5],
        });
        assert_eq!(
            decoded,
            Request::Run {
                handler: 3,
                payload: vec![1, 2, 3, 4, 5],
            }
        );
    }

    #[test]
    fn empty_payload_roundtrip() {
        let decoded = request_roundtrip(Request::Run {
            handler: 0,
            payload: Vec::new(),
        });
        assert_eq!(
            decoded,
            Request::Run {
                handler: 0,
                payload: Vec::new(),
            }
        );
    }

    #[test]
    fn shutdown_roundtrip() {
        assert_eq!(request_roundtrip(Request::Shutdown), Request::Shutdown);
    }

    #[tokio::test]
    async fn response_roundtrip() {
        for resp in [
            Response::Ok(vec![9, 8, 7]),
            Response::Err("division by zero".to_string()),
            Response::Internal("unknown handler id 42".to_string()),
        ] {
            let mut buf = Vec::new();
            write_response(&mut buf, &resp).unwrap();
            let mut cursor = Cursor::new(buf);
            assert_eq!(read_response(&mut cursor).await.unwrap(), resp);
        }
    }

    #[test]
    fn clean_eof_is_none() {
        let mut cursor = Cursor::new(Vec::new());
        assert!(read_request(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(u32::MAX).to_le_bytes());
        buf.push(0x01);
        let mut cursor = Cursor::new(buf);
        assert!(read_request(&mut cursor).is_err());
    }
}
