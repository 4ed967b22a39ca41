//! Protocol constants for Mini-Circuits USB relay and switch units.
//!
//! Every exchange is one fixed 64-byte frame out followed by one fixed
//! 64-byte frame back. The first byte of a request is either a built-in
//! opcode or the SCPI passthrough opcode followed by ASCII text.
//!
//! ## Firmware quirk
//!
//! State-mutating opcodes (per-relay set, bulk set) and the bulk read leave a
//! trailing acknowledgement in the device's reply queue. Each of them must be
//! followed by exactly one serial-number query whose reply is thrown away,
//! otherwise the next command receives the wrong reply.

// ── Framing ──

/// Size of every frame, in both directions.
pub const FRAME_SIZE: usize = 64;

/// Largest payload that still leaves room for the NUL terminator.
pub const MAX_PAYLOAD: usize = FRAME_SIZE - 1;

/// Offset of the first payload byte in a reply (byte 0 echoes the opcode).
pub const REPLY_PAYLOAD_OFFSET: usize = 1;

/// Timeout per USB write or read, in milliseconds.
pub const USB_TIMEOUT_MS: u64 = 1000;

// ── Opcodes ──

/// SCPI passthrough: `[1, ascii command...]`.
pub const OP_SCPI: u8 = 1;

/// Bulk relay set: `[9, mask]`.
pub const OP_SET_ALL_RELAYS: u8 = 9;

/// Bulk relay read: `[15]`; reply byte 1 is the mask.
pub const OP_GET_ALL_RELAYS: u8 = 15;

/// Model name query: `[40]`.
pub const OP_GET_MODEL: u8 = 40;

/// Serial number query: `[41]`. Also used as the discard read.
pub const OP_GET_SERIAL: u8 = 41;

/// Per-relay set opcode for a 0-based relay index: `[index + 1, state]`.
///
/// Relay 0 shares its opcode with [`OP_SCPI`]; mechanical boxes have no SCPI
/// interpreter, so the firmware tells the two apart by model.
pub const fn op_set_relay(relay: u8) -> u8 {
    relay + 1
}

// ── Model string heuristics ──

/// Character position in the model string holding the relay count digit
/// (e.g. `RC-2SPDT-A18` → `2`).
pub const MODEL_RELAY_COUNT_INDEX: usize = 3;

// ── USB identifiers ──

/// Mini-Circuits vendor ID.
pub const MINICIRCUITS_VID: u16 = 0x20CE;

/// Product ID shared by the Mini-Circuits relay/switch family.
pub const MINICIRCUITS_RELAY_PID: u16 = 0x0022;

/// Interface claimed on every unit.
pub const RELAY_INTERFACE: u8 = 0;
