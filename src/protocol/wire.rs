//! Framed send/recv over async byte streams.
//!
//! Both directions move whole 32-byte records: short reads and partial
//! writes are looped by `read_exact`/`write_all` until the frame is complete
//! or the peer is gone.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{Frame, FRAME_LEN};
use crate::error::{Error, Result};

/// Write one frame, looping partial writes. EOF/EPIPE-class failures map to
/// [`Error::PeerGone`], everything else to [`Error::Io`].
pub async fn send_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let buf = frame.encode();
    writer.write_all(&buf).await.map_err(Error::from_transport)?;
    writer.flush().await.map_err(Error::from_transport)?;
    Ok(())
}

/// Read exactly one frame, looping short reads. A clean EOF maps to
/// [`Error::PeerGone`]; an unknown tag or bad padding to [`Error::Malformed`].
pub async fn recv_frame<R>(reader: &mut R) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; FRAME_LEN];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(Error::from_transport)?;
    Frame::decode(&buf)
}
