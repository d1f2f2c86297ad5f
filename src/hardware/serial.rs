//! USB CDC-ACM console transport.
//!
//! The console reaches the transport exclusively through the
//! [`embedded_io`] traits; only USB housekeeping (`process`, suspend
//! state) is exposed inherently.

use super::UsbBus;

pub struct SerialInterface {
    usb_device: usb_device::device::UsbDevice<'static, UsbBus>,
    usb_serial: usbd_serial::SerialPort<'static, UsbBus>,
}

#[derive(Debug)]
pub struct Error(usb_device::UsbError);

impl From<usb_device::UsbError> for Error {
    fn from(e: usb_device::UsbError) -> Self {
        Self(e)
    }
}

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        embedded_io::ErrorKind::Other
    }
}

impl embedded_io::ErrorType for SerialInterface {
    type Error = Error;
}

impl embedded_io::Read for SerialInterface {
    /// Zero-timeout read: `Ok(0)` means no data is pending, not EOF. The
    /// console polls this once per idle pass.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.usb_serial.read(buf) {
            Ok(n) => Ok(n),
            Err(usb_device::UsbError::WouldBlock) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl embedded_io::Write for SerialInterface {
    /// Bounded-blocking write.
    ///
    /// The class buffer is much smaller than a deck dump, so the device is
    /// polled while the endpoint is full. If the host stops draining it the
    /// write fails after a bounded number of stalls; a wedged terminal must
    /// not wedge the idle loop.
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut stalls: u32 = 0;
        loop {
            match self.usb_serial.write(buf) {
                Ok(written) => return Ok(written),
                Err(usb_device::UsbError::WouldBlock) => {
                    self.process();
                    stalls += 1;
                    if stalls > 100_000 {
                        return Err(usb_device::UsbError::WouldBlock.into());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        match self.usb_serial.flush() {
            Ok(()) | Err(usb_device::UsbError::WouldBlock) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl SerialInterface {
    pub fn new(
        usb_device: usb_device::device::UsbDevice<'static, UsbBus>,
        usb_serial: usbd_serial::SerialPort<'static, UsbBus>,
    ) -> Self {
        Self {
            usb_device,
            usb_serial,
        }
    }

    pub fn usb_is_suspended(&self) -> bool {
        self.usb_device.state() == usb_device::device::UsbDeviceState::Suspend
    }

    /// Service the USB device state machine.
    pub fn process(&mut self) {
        self.usb_device.poll(&mut [&mut self.usb_serial]);
    }
}
