use std::io::{ErrorKind, Read, Write};

use crate::error::{Result, TransportError};

/// Write all of `buf`, looping over partial writes.
///
/// Interrupted writes are retried. A zero-length write means the peer is gone.
/// Timeouts surface as `TransportError::Io` like any other failure.
pub fn send_all<W: Write + ?Sized>(dst: &mut W, buf: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < buf.len() {
        match dst.write(&buf[offset..]) {
            Ok(0) => {
                return Err(TransportError::ConnectionClosed {
                    transferred: offset,
                    expected: buf.len(),
                })
            }
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }

    loop {
        match dst.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
}

/// Fill all of `buf`, looping over partial reads.
///
/// A zero-byte read before `buf` is full is reported as
/// [`TransportError::ConnectionClosed`].
pub fn recv_all<R: Read + ?Sized>(src: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < buf.len() {
        match src.read(&mut buf[offset..]) {
            Ok(0) => {
                return Err(TransportError::ConnectionClosed {
                    transferred: offset,
                    expected: buf.len(),
                })
            }
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    struct ByteByByte {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByte {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptEveryOther {
        bytes: Vec<u8>,
        pos: usize,
        interrupt: bool,
    }

    impl Read for InterruptEveryOther {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = (self.bytes.len() - self.pos).min(buf.len()).min(3);
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    impl Write for InterruptEveryOther {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = buf.len().min(2);
            self.bytes.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct TimesOut;

    impl Read for TimesOut {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn recv_all_assembles_partial_reads() {
        let mut src = ByteByByte {
            bytes: b"fragmented".to_vec(),
            pos: 0,
        };
        let mut buf = [0u8; 10];
        recv_all(&mut src, &mut buf).unwrap();
        assert_eq!(&buf, b"fragmented");
    }

    #[test]
    fn recv_all_retries_interrupted() {
        let mut src = InterruptEveryOther {
            bytes: (0u8..32).collect(),
            pos: 0,
            interrupt: false,
        };
        let mut buf = [0u8; 32];
        recv_all(&mut src, &mut buf).unwrap();
        assert_eq!(buf.to_vec(), (0u8..32).collect::<Vec<_>>());
    }

    #[test]
    fn recv_all_short_read_is_connection_closed() {
        let mut src = Cursor::new(vec![1u8, 2, 3]);
        let mut buf = [0u8; 8];
        let err = recv_all(&mut src, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            TransportError::ConnectionClosed {
                transferred: 3,
                expected: 8
            }
        ));
    }

    #[test]
    fn recv_all_timeout_is_io_error() {
        let mut buf = [0u8; 4];
        let err = recv_all(&mut TimesOut, &mut buf).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn recv_all_empty_buffer_is_noop() {
        let mut buf = [0u8; 0];
        recv_all(&mut TimesOut, &mut buf).unwrap();
    }

    #[test]
    fn send_all_retries_interrupted_and_partial_writes() {
        let mut dst = InterruptEveryOther {
            bytes: Vec::new(),
            pos: 0,
            interrupt: false,
        };
        send_all(&mut dst, b"hello worker").unwrap();
        assert_eq!(dst.bytes, b"hello worker");
    }

    #[test]
    fn send_all_zero_write_is_connection_closed() {
        let err = send_all(&mut ZeroWriter, b"abc").unwrap_err();
        assert!(matches!(
            err,
            TransportError::ConnectionClosed {
                transferred: 0,
                expected: 3
            }
        ));
    }
}
