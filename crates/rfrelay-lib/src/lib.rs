//! rfrelay: USB RF relay and switch units over a 64-byte frame protocol.

pub mod config;
pub mod error;
pub mod frame;
pub mod matcher;
pub mod models;
pub mod protocol;
pub mod relay;
pub mod switch;
pub mod transport;
pub mod usb;

pub use error::RelayError;
pub use relay::{Backend, RelayBank, RelayDevice};
pub use switch::{RelaySwitch, SwitchBox};
