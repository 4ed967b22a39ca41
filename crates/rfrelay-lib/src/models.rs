//! Model profiles: how each known unit is driven as a logical switch.
//!
//! Solid-state units take SCPI text; mechanical SPDT boxes are driven one
//! relay per switch letter. Unknown models get `None` from
//! [`detect_model`], which callers must treat as unsupported.

use crate::error::{RelayError, Result};
use crate::protocol::MODEL_RELAY_COUNT_INDEX;

/// Hardware family of a known model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// SCPI switch. `command_root` may contain `{}`, replaced by the
    /// upper-case switch letter on multi-output units.
    SolidState { command_root: &'static str },
    /// Mechanical relays, one relay per switch letter.
    Mechanical,
}

#[derive(Debug)]
pub struct ModelProfile {
    pub name: &'static str,
    pub family: ModelFamily,
}

static USB_1SP8T_63H: ModelProfile = ModelProfile {
    name: "USB-1SP8T-63H",
    family: ModelFamily::SolidState {
        command_root: ":SP8T:STATE",
    },
};

static USB_2SP4T_63H: ModelProfile = ModelProfile {
    name: "USB-2SP4T-63H",
    family: ModelFamily::SolidState {
        command_root: ":SP4T:{}:STATE",
    },
};

static RC_2SPDT_A18: ModelProfile = ModelProfile {
    name: "RC-2SPDT-A18",
    family: ModelFamily::Mechanical,
};

static ALL_PROFILES: &[&ModelProfile] = &[&USB_1SP8T_63H, &USB_2SP4T_63H, &RC_2SPDT_A18];

/// Switch letters a mechanical box can address, in relay order.
pub const MECHANICAL_SELECTORS: &str = "ABCDEF";

/// Look up a model profile by exact model string.
pub fn detect_model(model: &str) -> Option<&'static ModelProfile> {
    ALL_PROFILES.iter().find(|p| p.name == model).copied()
}

/// Relay count from the model string's 4th character.
///
/// Not every model encodes a count there (`USB-1SP8T-63H` has `-`); those
/// report 0 and bulk relay operations on them become no-ops.
pub fn relay_count_from_model(model: &str) -> u8 {
    model
        .chars()
        .nth(MODEL_RELAY_COUNT_INDEX)
        .and_then(|c| c.to_digit(10))
        .map_or(0, |d| d as u8)
}

/// Logical-switch strategy for one output of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchKind {
    /// Positions are set with `"<root>:<n>"` and read with `"<root>?"`.
    SolidState { command_root: String },
    /// Position `n` maps to relay `relay_index` engaged when `n > 1`.
    Mechanical { relay_index: u8 },
}

/// Choose the strategy for `model`, output `selector`.
///
/// `selector` is case-insensitive. Fails with `UnknownModel` for models
/// outside the profile table.
pub fn resolve_switch_kind(model: &str, selector: char) -> Result<SwitchKind> {
    let profile = detect_model(model).ok_or_else(|| RelayError::UnknownModel(model.into()))?;
    let letter = selector.to_ascii_uppercase();
    if !letter.is_ascii_alphabetic() {
        return Err(RelayError::InvalidArgument(format!(
            "switch selector must be a letter, got {selector:?}"
        )));
    }
    match profile.family {
        ModelFamily::SolidState { command_root } => Ok(SwitchKind::SolidState {
            command_root: command_root.replace("{}", &letter.to_string()),
        }),
        ModelFamily::Mechanical => {
            let relay_index = MECHANICAL_SELECTORS.find(letter).ok_or_else(|| {
                RelayError::InvalidArgument(format!(
                    "{model} has no switch {letter} (expected one of {MECHANICAL_SELECTORS})"
                ))
            })?;
            Ok(SwitchKind::Mechanical {
                relay_index: relay_index as u8,
            })
        }
    }
}
