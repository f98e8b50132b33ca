//! Transport layer abstraction for EEPROG communication
//!
//! The transport moves raw bytes only. Line framing and response matching
//! live in [`crate::line`].

use std::time::Duration;

use crate::error::Result;

/// Transport trait for reading and writing bytes
pub trait Transport {
    /// Write all bytes to the transport
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read available bytes into `buf`
    ///
    /// Blocks until at least one byte is available and returns the number of
    /// bytes read. Returns [`EeprogError::Timeout`](crate::EeprogError::Timeout)
    /// if nothing arrives within the transport timeout.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<()>;

    /// Bound how long the next [`read`](Self::read) may block
    ///
    /// Transports that never block can ignore this.
    fn set_read_timeout(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        (**self).set_read_timeout(timeout)
    }
}

pub mod serial {
    //! Serial port transport implementation

    use super::*;
    use crate::error::EeprogError;
    use crate::protocol::SERIAL_SPEED;
    use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
    use std::io::{Read, Write};
    use std::path::Path;
    use std::time::Duration;

    /// Serial port transport
    ///
    /// The port is closed when the transport is dropped.
    pub struct SerialTransport {
        port: Box<dyn SerialPort>,
    }

    impl SerialTransport {
        /// Open a serial port with the specified baud rate and read timeout
        ///
        /// If `baud` is `None`, uses the programmer default of 115200.
        pub fn open(device: &str, baud: Option<u32>, timeout: Duration) -> Result<Self> {
            let baud_rate = baud.unwrap_or(SERIAL_SPEED);

            if !Path::new(device).exists() {
                return Err(EeprogError::ConnectionFailed(format!(
                    "device path not found ({})",
                    device
                )));
            }

            let port = serialport::new(device, baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(timeout)
                .open()
                .map_err(|e| {
                    EeprogError::ConnectionFailed(format!(
                        "cannot open {} at {} baud: {}",
                        device, baud_rate, e
                    ))
                })?;

            log::info!("Opened serial port {} at {} baud", device, baud_rate);

            Ok(Self { port })
        }
    }

    impl Transport for SerialTransport {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            self.port.write_all(data)?;
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            match self.port.read(buf) {
                Ok(0) => Err(EeprogError::Timeout),
                Ok(n) => Ok(n),
                Err(e) => Err(EeprogError::from(e)),
            }
        }

        fn flush(&mut self) -> Result<()> {
            self.port.flush()?;
            Ok(())
        }

        fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
            self.port.set_timeout(timeout)?;
            Ok(())
        }
    }
}
