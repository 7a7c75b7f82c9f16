use crate::rng::Rng;
use socket2::{SockRef, TcpKeepalive};
use std::error::Error;
use std::fmt;
use std::io::{self, Read};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

pub const READBUF_LEN: usize = 4096;
/// How many random ports to try before giving up on a port-0 request.
pub const PORT_ATTEMPTS: usize = 10;

const KEEPALIVE_IDLE: Duration = Duration::from_secs(60);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);
const KEEPALIVE_RETRIES: u32 = 2;

#[derive(Debug)]
pub enum ReadError {
    Eof,
    TimedOut,
    Io(io::Error),
}

impl Error for ReadError {}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Eof => write!(f, "peer closed the connection"),
            ReadError::TimedOut => write!(f, "timed out waiting for a line"),
            ReadError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl From<io::Error> for ReadError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ReadError::TimedOut,
            _ => ReadError::Io(e),
        }
    }
}

/// Bind a listener on the requested port, or on a random port in
/// `[1024, 65535]` when asked for port 0. The random draws come from a
/// dedicated generator so port churn never disturbs the deal sequence.
pub fn listen(desired_port: u16, rng: &mut Rng) -> io::Result<(TcpListener, u16)> {
    if desired_port != 0 {
        let listener = TcpListener::bind(("0.0.0.0", desired_port))?;
        return Ok((listener, desired_port));
    }
    let mut last_err = io::Error::new(io::ErrorKind::AddrInUse, "no port found");
    for _ in 0..PORT_ATTEMPTS {
        let port = 1024 + (rng.next_u32() % 64512) as u16;
        match TcpListener::bind(("0.0.0.0", port)) {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

/// Accept one peer, optionally bounded by an absolute deadline shared with
/// the other seats' accepts.
pub fn accept_within(listener: &TcpListener, deadline: Option<Instant>) -> io::Result<TcpStream> {
    let stream = match deadline {
        None => listener.accept()?.0,
        Some(deadline) => {
            listener.set_nonblocking(true)?;
            loop {
                match listener.accept() {
                    Ok((stream, _)) => break stream,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        if Instant::now() >= deadline {
                            return Err(io::Error::new(
                                io::ErrorKind::TimedOut,
                                "timed out waiting for connection",
                            ));
                        }
                        std::thread::sleep(Duration::from_millis(10));
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(e),
                }
            }
        }
    };
    stream.set_nonblocking(false)?;
    configure_peer(&stream)?;
    Ok(stream)
}

/// Outbound connection for player agents; same socket options as the
/// dealer side.
pub fn connect_to(host: &str, port: u16) -> io::Result<TcpStream> {
    let stream = TcpStream::connect((host, port))?;
    configure_peer(&stream)?;
    Ok(stream)
}

/// Keep-alive so a silently dead peer eventually surfaces as an error, and
/// no Nagle delay on our one-line-at-a-time protocol.
pub fn configure_peer(stream: &TcpStream) -> io::Result<()> {
    stream.set_nodelay(true)?;
    let keepalive = TcpKeepalive::new()
        .with_time(KEEPALIVE_IDLE)
        .with_interval(KEEPALIVE_INTERVAL)
        .with_retries(KEEPALIVE_RETRIES);
    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}

/// Line-buffered reader over one peer socket. Partial lines persist in the
/// buffer across calls, and the timeout is an absolute deadline over the
/// whole call, however many reads it takes.
pub struct LineReader {
    stream: TcpStream,
    buf: [u8; READBUF_LEN],
    start: usize,
    end: usize,
}

impl LineReader {
    pub fn new(stream: TcpStream) -> Self {
        LineReader { stream, buf: [0; READBUF_LEN], start: 0, end: 0 }
    }

    /// Read one `\n`-terminated line of at most `max_len` bytes. A line
    /// that hits `max_len` is returned unterminated; the rest stays
    /// buffered for the next call.
    pub fn read_line(&mut self, max_len: usize, timeout: Option<Duration>) -> Result<String, ReadError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut line = Vec::new();
        while line.len() < max_len {
            if self.start >= self.end {
                match deadline {
                    Some(deadline) => {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        if remaining.is_zero() {
                            return Err(ReadError::TimedOut);
                        }
                        self.stream.set_read_timeout(Some(remaining)).map_err(ReadError::Io)?;
                    }
                    None => self.stream.set_read_timeout(None).map_err(ReadError::Io)?,
                }
                match self.stream.read(&mut self.buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        self.start = 0;
                        self.end = n;
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            }
            let c = self.buf[self.start];
            self.start += 1;
            line.push(c);
            if c == b'\n' {
                break;
            }
        }
        if line.is_empty() {
            return Err(ReadError::Eof);
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}
