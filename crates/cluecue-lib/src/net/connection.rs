//! Length-prefixed bincode framing over a split TCP socket. Each frame is a
//! big-endian u16 byte count followed by one serialized [`Message`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use super::{FrameError, Message};

pub fn from_socket(socket: TcpStream) -> (ConnectionTx, ConnectionRx) {
    let (read_stream, write_stream) = socket.into_split();

    (
        ConnectionTx {
            write_stream: BufWriter::new(write_stream),
        },
        ConnectionRx {
            read_stream,
            buffer: BytesMut::with_capacity(256),
        },
    )
}

#[derive(Debug)]
pub struct ConnectionTx {
    write_stream: BufWriter<OwnedWriteHalf>,
}

pub struct ConnectionRx {
    read_stream: OwnedReadHalf,
    buffer: BytesMut,
}

impl ConnectionTx {
    pub async fn write_frame(&mut self, frame: &Message) -> Result<(), FrameError> {
        let bytes = encode(frame)?;
        self.write_stream.write_all(&bytes).await?;
        self.write_stream.flush().await?;
        Ok(())
    }
}

impl ConnectionRx {
    /// Read the next complete frame. `None` means the remote cleanly closed
    /// the connection.
    pub async fn read_frame(&mut self) -> Result<Option<Message>, FrameError> {
        loop {
            if let Some(frame) = decode(&mut self.buffer)? {
                return Ok(Some(frame));
            }

            if self.read_stream.read_buf(&mut self.buffer).await? == 0 {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(FrameError::ConnectionReset)
                };
            }
        }
    }
}

fn encode(frame: &Message) -> Result<Bytes, FrameError> {
    let body = bincode::serialize(frame)?;
    let len = u16::try_from(body.len()).map_err(|_| FrameError::FrameLength)?;

    let mut buf = BytesMut::with_capacity(body.len() + 2);
    buf.put_u16(len);
    buf.extend_from_slice(&body);
    Ok(buf.freeze())
}

/// Consume one frame from `buffer` if a complete one has arrived.
fn decode(buffer: &mut BytesMut) -> Result<Option<Message>, FrameError> {
    if buffer.len() < 2 {
        return Ok(None);
    }

    let body_len = usize::from(u16::from_be_bytes([buffer[0], buffer[1]]));
    if buffer.len() < body_len + 2 {
        return Ok(None);
    }

    buffer.advance(2);
    let frame = bincode::deserialize(&buffer[..body_len])?;
    buffer.advance(body_len);

    Ok(Some(frame))
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::{decode, encode};
    use crate::net::Message;

    #[test]
    fn encode_decode_round_trip() {
        let frame = Message::Version {
            version: "0.1.0".to_owned(),
        };
        let bytes = encode(&frame).unwrap();

        let mut buffer = BytesMut::from(&bytes[..]);
        let Some(Message::Version { version }) = decode(&mut buffer).unwrap() else {
            panic!("frame did not decode");
        };
        assert_eq!(version, "0.1.0");
        assert!(buffer.is_empty());
    }

    #[test]
    fn decode_waits_for_complete_frame() {
        let frame = Message::Room(crate::net::RoomRequest::Guess);
        let bytes = encode(&frame).unwrap();

        // Feed all but the last byte; no frame should be produced.
        let mut buffer = BytesMut::from(&bytes[..bytes.len() - 1]);
        assert!(decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(&bytes[bytes.len() - 1..]);
        assert!(decode(&mut buffer).unwrap().is_some());
    }

    #[test]
    fn decode_leaves_following_frame_intact() {
        let first = encode(&Message::Room(crate::net::RoomRequest::Skip)).unwrap();
        let second = encode(&Message::Room(crate::net::RoomRequest::EndTurn)).unwrap();

        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&first);
        buffer.extend_from_slice(&second);

        assert!(matches!(
            decode(&mut buffer).unwrap(),
            Some(Message::Room(crate::net::RoomRequest::Skip))
        ));
        assert!(matches!(
            decode(&mut buffer).unwrap(),
            Some(Message::Room(crate::net::RoomRequest::EndTurn))
        ));
        assert!(buffer.is_empty());
    }
}
