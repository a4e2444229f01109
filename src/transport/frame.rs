// Frame Codec - Length-prefixed messages over a byte stream
//
// Each frame is a 4-byte big-endian length followed by the postcard
// encoding of one Message.

use crate::sync::Message;
use crate::transport::TransportError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Write one message as a frame
pub async fn write_frame<W>(
    writer: &mut W,
    message: &Message,
    max_frame_size: usize,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = message
        .to_bytes()
        .map_err(|e| TransportError::SerializationError(e.to_string()))?;
    if bytes.len() > max_frame_size || bytes.len() > u32::MAX as usize {
        return Err(TransportError::PayloadTooLarge(bytes.len()));
    }

    writer
        .write_all(&(bytes.len() as u32).to_be_bytes())
        .await
        .map_err(|e| TransportError::SendFailed(e.to_string()))?;
    writer
        .write_all(&bytes)
        .await
        .map_err(|e| TransportError::SendFailed(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::SendFailed(e.to_string()))?;
    Ok(())
}

/// Read one frame; `None` when the stream ends cleanly between frames
pub async fn read_frame<R>(
    reader: &mut R,
    max_frame_size: usize,
) -> Result<Option<Message>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(TransportError::ReceiveFailed(e.to_string())),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_frame_size {
        return Err(TransportError::PayloadTooLarge(len));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::ConnectionClosed
        } else {
            TransportError::ReceiveFailed(e.to_string())
        }
    })?;

    Message::from_bytes(&buf)
        .map(Some)
        .map_err(|e| TransportError::SerializationError(e.to_string()))
}
