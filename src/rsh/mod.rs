// Remote shell wire format: a request is the raw command line followed by one
// 0x00 byte; a response is any number of output bytes followed by one 0x04 byte.
use std::io::{self, ErrorKind, Read, Write};

use crate::limits::{RDSH_EOF_CHAR, RDSH_REQ_END};

pub mod client;
pub mod server;

#[derive(Debug, PartialEq, Eq)]
pub enum Request {
    /// Bytes before the first 0x00.
    Line(Vec<u8>),
    /// `cap` bytes arrived without a terminator.
    TooLong,
    /// Peer closed the connection.
    Closed,
}

fn read_some<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match r.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Accumulates reads until a 0x00 shows up or `cap` bytes are buffered. Bytes
/// after the terminator in the same read are dropped.
pub fn read_request<R: Read>(r: &mut R, cap: usize) -> io::Result<Request> {
    let mut buf = vec![0u8; cap];
    let mut total = 0;
    while total < cap {
        let n = read_some(r, &mut buf[total..])?;
        if n == 0 { return Ok(Request::Closed); }
        if let Some(pos) = buf[total..total + n].iter().position(|&b| b == RDSH_REQ_END) {
            buf.truncate(total + pos);
            return Ok(Request::Line(buf));
        }
        total += n;
    }
    Ok(Request::TooLong)
}

/// Skips input through the next 0x00. Returns false when the peer closed first.
pub fn discard_request<R: Read>(r: &mut R) -> io::Result<bool> {
    let mut chunk = [0u8; 4096];
    loop {
        let n = read_some(r, &mut chunk)?;
        if n == 0 { return Ok(false); }
        if chunk[..n].contains(&RDSH_REQ_END) { return Ok(true); }
    }
}

pub fn write_request<W: Write>(w: &mut W, line: &[u8]) -> io::Result<()> {
    w.write_all(line)?;
    w.write_all(&[RDSH_REQ_END])?;
    w.flush()
}

pub fn send_message_eof<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(&[RDSH_EOF_CHAR])?;
    w.flush()
}

pub fn send_message_string<W: Write>(w: &mut W, msg: &str) -> io::Result<()> {
    w.write_all(msg.as_bytes())?;
    send_message_eof(w)
}

/// Copies response bytes to `out` until a read ends with 0x04. Returns false
/// when the peer closed before the sentinel.
pub fn read_response<R: Read, W: Write>(r: &mut R, out: &mut W) -> io::Result<bool> {
    let mut chunk = [0u8; 4096];
    loop {
        let n = read_some(r, &mut chunk)?;
        if n == 0 { out.flush()?; return Ok(false); }
        if chunk[n - 1] == RDSH_EOF_CHAR {
            out.write_all(&chunk[..n - 1])?;
            out.flush()?;
            return Ok(true);
        }
        out.write_all(&chunk[..n])?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Hands out one scripted chunk per read.
    struct Chunked(Vec<Vec<u8>>);

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() { return Ok(0); }
            let mut c = self.0.remove(0);
            let n = c.len().min(buf.len());
            buf[..n].copy_from_slice(&c[..n]);
            if n < c.len() { self.0.insert(0, c.split_off(n)); }
            Ok(n)
        }
    }

    #[test]
    fn request_spans_several_reads() {
        let mut r = Chunked(vec![b"ls ".to_vec(), b"-l | w".to_vec(), b"c\0junk".to_vec()]);
        assert_eq!(read_request(&mut r, 1024).unwrap(), Request::Line(b"ls -l | wc".to_vec()));
    }

    #[test]
    fn closed_peer_and_overflow() {
        assert_eq!(read_request(&mut Cursor::new(Vec::new()), 16).unwrap(), Request::Closed);
        let mut r = Cursor::new(vec![b'a'; 40]);
        assert_eq!(read_request(&mut r, 16).unwrap(), Request::TooLong);
        assert!(!discard_request(&mut r).unwrap());
        let mut r = Cursor::new(b"aaaa\0next".to_vec());
        assert!(discard_request(&mut r).unwrap());
    }

    #[test]
    fn response_stops_at_sentinel() {
        let mut r = Chunked(vec![b"hello ".to_vec(), b"world\n\x04".to_vec()]);
        let mut out = Vec::new();
        assert!(read_response(&mut r, &mut out).unwrap());
        assert_eq!(out, b"hello world\n");

        let mut out = Vec::new();
        assert!(!read_response(&mut Cursor::new(b"partial".to_vec()), &mut out).unwrap());
        assert_eq!(out, b"partial");
    }

    #[test]
    fn framing_bytes() {
        let mut w = Vec::new();
        write_request(&mut w, b"echo hi").unwrap();
        assert_eq!(w, b"echo hi\0");
        let mut w = Vec::new();
        send_message_string(&mut w, "msg\n").unwrap();
        assert_eq!(w, b"msg\n\x04");
    }
}
