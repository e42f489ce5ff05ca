//! Linux evdev input node and the compass control node

use super::{DelayControl, InputEventSource, RawInputRecord, SamplingPeriod};
use crate::sensor::{PhysicalKind, SensorError};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::mem;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use tracing::{debug, info, warn};

const INPUT_EVENT_SIZE: usize = mem::size_of::<libc::input_event>();

// _IOR('E', 0x40 + abs, struct input_absinfo)
const EVIOCGABS_BASE: u32 = 0x8018_4540;
// _IOW(AKMIO, 0x18, short)
const ECS_IOCTL_APP_SET_DELAY: u32 = 0x4002_a118;

/// Non-blocking reader over an evdev node
#[derive(Debug)]
pub struct EvdevSource {
    file: File,
    buffer: Vec<u8>,
}

impl EvdevSource {
    pub fn open(path: &Path) -> Result<Self, SensorError> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;
        info!("Opened input node {}", path.display());
        Ok(Self {
            file,
            buffer: Vec::new(),
        })
    }
}

fn decode(chunk: &[u8]) -> RawInputRecord {
    // SAFETY: `chunk` is exactly one input_event, which is plain old data.
    let event: libc::input_event =
        unsafe { std::ptr::read_unaligned(chunk.as_ptr() as *const libc::input_event) };
    RawInputRecord {
        event_type: event.type_,
        code: event.code,
        value: event.value,
        time_ns: event.time.tv_sec as i64 * 1_000_000_000 + event.time.tv_usec as i64 * 1_000,
    }
}

impl InputEventSource for EvdevSource {
    fn read_records(
        &mut self,
        out: &mut VecDeque<RawInputRecord>,
        max: usize,
    ) -> Result<usize, SensorError> {
        if max == 0 {
            return Ok(0);
        }
        self.buffer.resize(max * INPUT_EVENT_SIZE, 0);

        let n = match self.file.read(&mut self.buffer) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(0),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        if n % INPUT_EVENT_SIZE != 0 {
            warn!("Short read of {} bytes from input node", n);
            return Err(io::Error::new(io::ErrorKind::InvalidData, "partial input_event").into());
        }

        let count = n / INPUT_EVENT_SIZE;
        out.extend(self.buffer[..n].chunks_exact(INPUT_EVENT_SIZE).map(decode));
        debug!("Read {} raw records", count);
        Ok(count)
    }

    fn current_value(&self, code: u16) -> Option<i32> {
        // SAFETY: input_absinfo is plain integers; all-zero is valid.
        let mut info: libc::input_absinfo = unsafe { mem::zeroed() };
        let request = EVIOCGABS_BASE + code as u32;
        // SAFETY: EVIOCGABS writes one input_absinfo into `info`.
        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                request as _,
                &mut info as *mut libc::input_absinfo,
            )
        };
        if ret == 0 {
            Some(info.value)
        } else {
            debug!("EVIOCGABS({}) failed: {}", code, io::Error::last_os_error());
            None
        }
    }
}

/// Control node of the compass daemon, accepts the sampling period in ms
#[derive(Debug)]
pub struct AkmControlDevice {
    file: File,
}

impl AkmControlDevice {
    pub fn open(path: &Path) -> Result<Self, SensorError> {
        let file = OpenOptions::new().read(true).open(path)?;
        info!("Opened control node {}", path.display());
        Ok(Self { file })
    }
}

impl DelayControl for AkmControlDevice {
    fn apply(
        &mut self,
        period: SamplingPeriod,
        _active: &[PhysicalKind],
    ) -> Result<(), SensorError> {
        let mut delay: libc::c_short = period.millis;
        // SAFETY: the ioctl reads one short from `delay`.
        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                ECS_IOCTL_APP_SET_DELAY as _,
                &mut delay as *mut libc::c_short,
            )
        };
        if ret != 0 {
            return Err(io::Error::last_os_error().into());
        }
        debug!("Control node sampling period set to {} ms", period.millis);
        Ok(())
    }
}
