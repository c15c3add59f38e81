use crate::command::Conn;
use crate::error::{ClusterError, Result};
use crate::protocol::{encode_command, parse_frame, RespValue};
use bytes::{Buf, BytesMut};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// One TCP connection to a node, speaking RESP.
pub struct TcpConn {
    addr: String,
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: BytesMut,
    closed: bool,
}

impl TcpConn {
    /// Dial `addr`, giving up after `connect_timeout`.
    pub async fn connect(addr: &str, connect_timeout: Duration) -> Result<Self> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {} timed out after {:?}", addr, connect_timeout),
                )
            })??;

        // Disable Nagle's algorithm
        stream.set_nodelay(true)?;

        Ok(Self {
            addr: addr.to_string(),
            stream,
            read_buf: BytesMut::with_capacity(READ_BUFFER_SIZE),
            write_buf: BytesMut::with_capacity(256),
            closed: false,
        })
    }

    /// Peer address as given to `connect`
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Check if the connection was closed and must not be reused
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Conn for TcpConn {
    async fn encode(&mut self, parts: &[&[u8]]) -> Result<()> {
        if self.closed {
            return Err(ClusterError::Closed);
        }
        self.write_buf.clear();
        encode_command(parts, &mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        Ok(())
    }

    async fn decode(&mut self) -> Result<RespValue> {
        if self.closed {
            return Err(ClusterError::Closed);
        }
        loop {
            if let Some((value, used)) = parse_frame(&self.read_buf)? {
                self.read_buf.advance(used);
                return Ok(value);
            }
            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(ClusterError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("connection to {} closed by peer", self.addr),
                )));
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.read_buf.clear();
        let _ = self.stream.shutdown().await;
    }
}
