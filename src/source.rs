//! Transports supplying the raw NMEA bytes.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use err::SourceError;

/// A connectable byte stream, e.g. a GPS receiver on a serial to TCP bridge.
///
/// `input_stream` is only called after `connect` succeeded. Disconnecting
/// must make a reader blocked on the input stream return.
pub trait ByteSource: Send {
    fn connect(&mut self) -> Result<(), SourceError>;
    fn disconnect(&mut self) -> Result<(), SourceError>;
    fn input_stream(&mut self) -> Result<Box<dyn Read + Send>, SourceError>;
    fn output_stream(&mut self) -> Result<Box<dyn Write + Send>, SourceError>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn connect(&mut self) -> Result<(), SourceError> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> Result<(), SourceError> {
        (**self).disconnect()
    }

    fn input_stream(&mut self) -> Result<Box<dyn Read + Send>, SourceError> {
        (**self).input_stream()
    }

    fn output_stream(&mut self) -> Result<Box<dyn Write + Send>, SourceError> {
        (**self).output_stream()
    }
}

/// NMEA over a TCP connection.
#[derive(Debug)]
pub struct TcpSource {
    addr: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpSource {
    /// `read_timeout` bounds each blocking read, so a reader thread notices
    /// a stop request within that time.
    pub fn new<A: Into<String>>(addr: A, read_timeout: Duration) -> Self {
        TcpSource {
            addr: addr.into(),
            connect_timeout: Duration::from_secs(5),
            read_timeout,
            stream: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn stream(&self) -> Result<&TcpStream, SourceError> {
        self.stream.as_ref().ok_or(SourceError::NotConnected)
    }
}

impl ByteSource for TcpSource {
    fn connect(&mut self) -> Result<(), SourceError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let mut last_err = None;
        for addr in self.addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.read_timeout))?;
                    stream.set_nodelay(true)?;
                    info!("Connected to NMEA source {}", addr);
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(err) => {
                    debug!("Connecting to {} failed: {}", addr, err);
                    last_err = Some(err);
                }
            }
        }

        Err(SourceError::Io(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} did not resolve to any address", self.addr),
            )
        })))
    }

    fn disconnect(&mut self) -> Result<(), SourceError> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => return Ok(()),
        };
        match stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(ref err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn input_stream(&mut self) -> Result<Box<dyn Read + Send>, SourceError> {
        Ok(Box::new(self.stream()?.try_clone()?))
    }

    fn output_stream(&mut self) -> Result<Box<dyn Write + Send>, SourceError> {
        Ok(Box::new(self.stream()?.try_clone()?))
    }
}

/// Replays a recorded NMEA log.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    file: Option<File>,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FileSource {
            path: path.as_ref().to_path_buf(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn connect(&mut self) -> Result<(), SourceError> {
        self.file = Some(File::open(&self.path)?);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), SourceError> {
        self.file = None;
        Ok(())
    }

    fn input_stream(&mut self) -> Result<Box<dyn Read + Send>, SourceError> {
        match self.file {
            Some(ref file) => Ok(Box::new(file.try_clone()?)),
            None => Err(SourceError::NotConnected),
        }
    }

    fn output_stream(&mut self) -> Result<Box<dyn Write + Send>, SourceError> {
        Ok(Box::new(io::sink()))
    }
}

/// Wraps an arbitrary reader, e.g. stdin. The reader can be handed out once.
pub struct StreamSource {
    input: Option<Box<dyn Read + Send>>,
    connected: bool,
}

impl StreamSource {
    pub fn new<R: Read + Send + 'static>(input: R) -> Self {
        StreamSource {
            input: Some(Box::new(input)),
            connected: false,
        }
    }
}

impl ByteSource for StreamSource {
    fn connect(&mut self) -> Result<(), SourceError> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), SourceError> {
        self.connected = false;
        Ok(())
    }

    fn input_stream(&mut self) -> Result<Box<dyn Read + Send>, SourceError> {
        if !self.connected {
            return Err(SourceError::NotConnected);
        }
        self.input.take().ok_or(SourceError::StreamTaken)
    }

    fn output_stream(&mut self) -> Result<Box<dyn Write + Send>, SourceError> {
        Ok(Box::new(io::sink()))
    }
}
