//! USB transport seam: trait pair + in-memory mock.
//!
//! [`Transport`] enumerates and opens candidate devices; [`UsbHandle`] is one
//! opened device. Dropping a handle disposes it (releases the interface and
//! closes the device), so release happens on every exit path.

use std::fmt;
use std::time::Duration;

// ── Error type ──

/// Transport-level failures.
///
/// String payloads follow the convention **"context: details"**, e.g.
/// `"claim interface 0: Device or resource busy"`.
#[derive(Debug)]
pub enum TransportError {
    /// The write or read did not complete within its timeout.
    Timeout(String),
    /// Device was unplugged or became unreachable mid-exchange.
    Disconnected(String),
    /// Any other open/claim/configure/transfer failure.
    Failed(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout(e) => write!(f, "USB timeout: {e}"),
            TransportError::Disconnected(e) => write!(f, "USB device disconnected: {e}"),
            TransportError::Failed(e) => write!(f, "USB transfer failed: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Endpoint addresses of a claimed interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    pub out_addr: u8,
    pub in_addr: u8,
}

// ── Traits ──

/// One opened USB device.
pub trait UsbHandle {
    /// Detach a kernel driver bound to the relay interface.
    fn detach_kernel_driver(&mut self) -> Result<()>;
    /// Activate the device's configuration.
    fn set_configuration(&mut self) -> Result<()>;
    /// Claim the relay interface and locate its OUT/IN endpoints.
    fn claim(&mut self) -> Result<Endpoints>;
    /// Write `data` to `endpoint`; returns the number of bytes sent.
    fn write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize>;
    /// Read up to `max_len` bytes from `endpoint`.
    fn read(&mut self, endpoint: u8, max_len: usize, timeout: Duration) -> Result<Vec<u8>>;
}

/// Source of USB devices.
pub trait Transport {
    /// A discovered but unopened device.
    type Candidate;
    /// An opened device.
    type Handle: UsbHandle;

    fn enumerate(&self, vendor_id: u16, product_id: u16) -> Result<Vec<Self::Candidate>>;
    fn open(&self, candidate: Self::Candidate) -> Result<Self::Handle>;
}

// ── Mock transport for testing ──

/// Scripted relay firmware for unit and integration tests.
///
/// Always compiled (zero runtime cost), hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex, MutexGuard};

    use crate::protocol::*;

    pub const MOCK_EP_OUT: u8 = 0x01;
    pub const MOCK_EP_IN: u8 = 0x81;

    /// One simulated unit on the bus.
    #[derive(Debug, Clone)]
    pub struct MockUnit {
        pub vendor_id: u16,
        pub product_id: u16,
        pub serial: String,
        pub model: String,
        /// `open()` fails.
        pub fail_open: bool,
        /// Kernel-driver detach fails (should be ignored by callers).
        pub fail_detach: bool,
        /// `set_configuration()` fails (device already claimed elsewhere).
        pub fail_configuration: bool,
        /// Serial/model replies fill the whole frame with no NUL terminator.
        pub unterminated_strings: bool,
        /// Every read times out.
        pub silent: bool,
    }

    impl MockUnit {
        pub fn new(serial: &str, model: &str) -> Self {
            MockUnit {
                vendor_id: MINICIRCUITS_VID,
                product_id: MINICIRCUITS_RELAY_PID,
                serial: serial.into(),
                model: model.into(),
                fail_open: false,
                fail_detach: false,
                fail_configuration: false,
                unterminated_strings: false,
                silent: false,
            }
        }

        /// Mechanical boxes interpret opcodes 1..=8 as per-relay sets.
        fn is_mechanical(&self) -> bool {
            self.model.starts_with("RC-")
        }
    }

    /// Counters shared by the transport and every handle it opened.
    #[derive(Debug, Clone, Default)]
    pub struct MockStats {
        pub enumerations: usize,
        pub opens: usize,
        pub disposes: usize,
        /// Handles currently alive.
        pub open_now: usize,
        /// Highest value `open_now` ever reached.
        pub max_open: usize,
        /// Every frame written, in order.
        pub writes: Vec<Vec<u8>>,
        pub reads: usize,
    }

    impl MockStats {
        /// Number of written frames whose first byte is `opcode`.
        pub fn writes_with_opcode(&self, opcode: u8) -> usize {
            self.writes.iter().filter(|w| w.first() == Some(&opcode)).count()
        }
    }

    #[derive(Debug, Default)]
    struct UnitState {
        relay_mask: u8,
        scpi_values: HashMap<String, String>,
        scpi_log: Vec<String>,
    }

    pub struct MockTransport {
        units: Vec<MockUnit>,
        states: Vec<Arc<Mutex<UnitState>>>,
        stats: Arc<Mutex<MockStats>>,
    }

    fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
        m.lock().unwrap_or_else(|e| e.into_inner())
    }

    impl MockTransport {
        pub fn new(units: Vec<MockUnit>) -> Self {
            let states = units
                .iter()
                .map(|_| Arc::new(Mutex::new(UnitState::default())))
                .collect();
            MockTransport {
                units,
                states,
                stats: Arc::new(Mutex::new(MockStats::default())),
            }
        }

        /// Snapshot of the shared counters.
        pub fn stats(&self) -> MockStats {
            lock(&self.stats).clone()
        }

        /// Forget recorded writes/reads (counters for opens/disposes are kept).
        pub fn clear_io(&self) {
            let mut stats = lock(&self.stats);
            stats.writes.clear();
            stats.reads = 0;
        }

        pub fn relay_mask(&self, unit: usize) -> u8 {
            lock(&self.states[unit]).relay_mask
        }

        pub fn set_relay_mask(&self, unit: usize, mask: u8) {
            lock(&self.states[unit]).relay_mask = mask;
        }

        /// SCPI commands received by `unit`, in order.
        pub fn scpi_log(&self, unit: usize) -> Vec<String> {
            lock(&self.states[unit]).scpi_log.clone()
        }

        /// Preload the value returned by `<root>?` on `unit`.
        pub fn set_scpi_value(&self, unit: usize, root: &str, value: &str) {
            lock(&self.states[unit])
                .scpi_values
                .insert(root.into(), value.into());
        }
    }

    impl Transport for MockTransport {
        type Candidate = usize;
        type Handle = MockHandle;

        fn enumerate(&self, vendor_id: u16, product_id: u16) -> Result<Vec<usize>> {
            lock(&self.stats).enumerations += 1;
            Ok(self
                .units
                .iter()
                .enumerate()
                .filter(|(_, u)| u.vendor_id == vendor_id && u.product_id == product_id)
                .map(|(i, _)| i)
                .collect())
        }

        fn open(&self, candidate: usize) -> Result<MockHandle> {
            let unit = self
                .units
                .get(candidate)
                .ok_or_else(|| TransportError::Failed(format!("mock: no unit {candidate}")))?;
            if unit.fail_open {
                return Err(TransportError::Failed("mock: open failure injected".into()));
            }
            {
                let mut stats = lock(&self.stats);
                stats.opens += 1;
                stats.open_now += 1;
                stats.max_open = stats.max_open.max(stats.open_now);
            }
            Ok(MockHandle {
                unit: unit.clone(),
                state: Arc::clone(&self.states[candidate]),
                stats: Arc::clone(&self.stats),
                pending: VecDeque::new(),
                claimed: false,
            })
        }
    }

    pub struct MockHandle {
        unit: MockUnit,
        state: Arc<Mutex<UnitState>>,
        stats: Arc<Mutex<MockStats>>,
        pending: VecDeque<Vec<u8>>,
        claimed: bool,
    }

    impl MockHandle {
        fn string_reply(&self, opcode: u8, text: &str) -> Vec<u8> {
            let mut frame = vec![0u8; FRAME_SIZE];
            frame[0] = opcode;
            if self.unit.unterminated_strings {
                for (dst, src) in frame[1..].iter_mut().zip(text.bytes().cycle()) {
                    *dst = src;
                }
            } else {
                let n = text.len().min(MAX_PAYLOAD - 1);
                frame[1..1 + n].copy_from_slice(&text.as_bytes()[..n]);
            }
            frame
        }

        fn scpi(&self, data: &[u8]) -> String {
            let body = &data[1..];
            let end = body.iter().position(|&b| b == 0).unwrap_or(body.len());
            let cmd = String::from_utf8_lossy(&body[..end]).to_string();
            let mut state = lock(&self.state);
            state.scpi_log.push(cmd.clone());
            if let Some(root) = cmd.strip_suffix('?') {
                return state
                    .scpi_values
                    .get(root)
                    .cloned()
                    .unwrap_or_else(|| "0".into());
            }
            match cmd.rsplit_once(':') {
                Some((root, value)) if value.parse::<u32>().is_ok() => {
                    state.scpi_values.insert(root.into(), value.into());
                    "1".into()
                }
                _ => "0".into(),
            }
        }

        fn respond(&self, data: &[u8]) -> Vec<u8> {
            let opcode = data.first().copied().unwrap_or(0);
            let arg = data.get(1).copied().unwrap_or(0);
            match opcode {
                OP_GET_SERIAL => self.string_reply(opcode, &self.unit.serial),
                OP_GET_MODEL => self.string_reply(opcode, &self.unit.model),
                OP_SET_ALL_RELAYS => {
                    lock(&self.state).relay_mask = arg;
                    self.string_reply(opcode, "")
                }
                OP_GET_ALL_RELAYS => {
                    let mut frame = vec![0u8; FRAME_SIZE];
                    frame[0] = opcode;
                    frame[1] = lock(&self.state).relay_mask;
                    frame
                }
                1..=8 if self.unit.is_mechanical() => {
                    let bit = 1u8 << (opcode - 1);
                    let mut state = lock(&self.state);
                    if arg != 0 {
                        state.relay_mask |= bit;
                    } else {
                        state.relay_mask &= !bit;
                    }
                    drop(state);
                    self.string_reply(opcode, "")
                }
                OP_SCPI => {
                    let reply = self.scpi(data);
                    self.string_reply(opcode, &reply)
                }
                _ => self.string_reply(opcode, ""),
            }
        }
    }

    impl UsbHandle for MockHandle {
        fn detach_kernel_driver(&mut self) -> Result<()> {
            if self.unit.fail_detach {
                return Err(TransportError::Failed(
                    "mock: no kernel driver to detach".into(),
                ));
            }
            Ok(())
        }

        fn set_configuration(&mut self) -> Result<()> {
            if self.unit.fail_configuration {
                return Err(TransportError::Failed(
                    "mock: set_configuration failure injected".into(),
                ));
            }
            Ok(())
        }

        fn claim(&mut self) -> Result<Endpoints> {
            self.claimed = true;
            Ok(Endpoints {
                out_addr: MOCK_EP_OUT,
                in_addr: MOCK_EP_IN,
            })
        }

        fn write(&mut self, endpoint: u8, data: &[u8], _timeout: Duration) -> Result<usize> {
            if !self.claimed || endpoint != MOCK_EP_OUT {
                return Err(TransportError::Failed(format!(
                    "mock: bad write endpoint 0x{endpoint:02X}"
                )));
            }
            lock(&self.stats).writes.push(data.to_vec());
            let reply = self.respond(data);
            self.pending.push_back(reply);
            Ok(data.len())
        }

        fn read(&mut self, endpoint: u8, max_len: usize, _timeout: Duration) -> Result<Vec<u8>> {
            lock(&self.stats).reads += 1;
            if endpoint != MOCK_EP_IN {
                return Err(TransportError::Failed(format!(
                    "mock: bad read endpoint 0x{endpoint:02X}"
                )));
            }
            if self.unit.silent {
                return Err(TransportError::Timeout("mock: unit is silent".into()));
            }
            let mut reply = self
                .pending
                .pop_front()
                .ok_or_else(|| TransportError::Timeout("mock: no reply queued".into()))?;
            reply.truncate(max_len);
            Ok(reply)
        }
    }

    impl Drop for MockHandle {
        fn drop(&mut self) {
            let mut stats = lock(&self.stats);
            stats.disposes += 1;
            stats.open_now -= 1;
        }
    }
}
