//! Serial transport used for the single request/response exchange

use std::fmt;
use std::io::{self, Read, Write};
use std::ops::{Deref, DerefMut};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort as _, StopBits, TTYPort};

use crate::check::Config;
use crate::Error;

/// Something that can send a request to the module and collect its reply.
pub trait Transport {
    /// Sends `request` and returns the bytes received in reply.
    ///
    /// An empty reply is not an error; it means the module did not answer in time.
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, Error>;
}

/// Serial connection with an open serial port.
pub struct SerialPort {
    inner_port: TTYPort,
    read_timeout: Duration,
    settle_delay: Duration,
    read_cap: usize,
    debug: bool,
}

impl fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialPort")
            .field("name", &self.inner_port.name())
            .field("baud_rate", &self.inner_port.baud_rate().ok())
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

impl SerialPort {
    /// Opens the device named in `config` with 8N1 framing and the configured baud rate and read
    /// timeout.
    pub fn open(config: &Config) -> Result<SerialPort, Error> {
        let name = config.device.to_string_lossy().into_owned();

        debug!("Opening serial port {:?}", name);
        debug!(
            "Setting baud rate to {} and timeout to {:?}",
            config.baud_rate, config.read_timeout
        );

        let inner_port = serialport::new(name.clone(), config.baud_rate)
            .data_bits(DataBits::Eight)
            .flow_control(FlowControl::None)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(config.read_timeout)
            .open_native()
            .map_err(|err| Error::SerialOpen(name, err))?;

        Ok(SerialPort {
            inner_port,
            read_timeout: config.read_timeout,
            settle_delay: config.settle_delay,
            read_cap: config.read_cap,
            debug: config.debug,
        })
    }

    /// Takes exclusive access to the device until the returned guard is dropped.
    ///
    /// This sets `TIOCEXCL`, which fails immediately rather than blocking when the device cannot
    /// be claimed.
    pub fn lock(&mut self) -> Result<ExclusiveGuard<'_>, Error> {
        self.inner_port.set_exclusive(true)?;

        trace!("Acquired exclusive access to {:?}", self.inner_port.name());

        Ok(ExclusiveGuard {
            port: &mut self.inner_port,
        })
    }
}

/// Exclusive access to a serial port, released when dropped.
pub struct ExclusiveGuard<'a> {
    port: &'a mut TTYPort,
}

impl Deref for ExclusiveGuard<'_> {
    type Target = TTYPort;

    fn deref(&self) -> &Self::Target {
        self.port
    }
}

impl DerefMut for ExclusiveGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.port
    }
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        match self.port.set_exclusive(false) {
            Ok(()) => trace!("Released exclusive access to {:?}", self.port.name()),
            Err(err) => warn!("Could not release exclusive access: {}", err),
        }
    }
}

impl Transport for SerialPort {
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, Error> {
        let read_timeout = self.read_timeout;
        let settle_delay = self.settle_delay;
        let read_cap = self.read_cap;
        let dump = self.debug;

        let mut port = self.lock()?;

        // Drop anything the module sent before we asked
        port.clear(ClearBuffer::Input)?;

        if dump {
            debug!("Sending command: {}", hex::encode(request));
        }

        port.write_all(request)?;
        port.flush()?;

        thread::sleep(settle_delay);

        let pending = port.bytes_to_read()? as usize;
        let len = if pending > 0 { pending } else { read_cap };

        trace!("{} bytes pending, reading up to {}", pending, len);

        let response = read_until(&mut *port, len, read_timeout)?;

        if dump {
            debug!("Raw response received: {}", hex::encode(&response));
        }

        Ok(response)
    }
}

/// Reads from `reader` until `len` bytes were read, the reader times out or `timeout` elapses.
pub fn read_until<R: Read>(mut reader: R, len: usize, timeout: Duration) -> io::Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut buf = vec![0u8; len];
    let mut filled = 0;

    while filled < len {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref err) if err.kind() == io::ErrorKind::TimedOut => break,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }

        if Instant::now() >= deadline {
            break;
        }
    }

    buf.truncate(filled);

    Ok(buf)
}
