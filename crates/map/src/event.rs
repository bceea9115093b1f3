use thiserror::Error;

use sfas_asm::Invocation;

/// Control codes of the runtime level-script byte format. Wait has two
/// codings: delays with a clear low nibble are stored pre-shifted under
/// `CONTROL_WAIT2` so larger values fit in fewer operand bits.
pub const CONTROL_END: u8 = 0x00;
pub const CONTROL_WAIT: u8 = 0x01;
pub const CONTROL_WAIT2: u8 = 0x02;
pub const CONTROL_OBJECT: u8 = 0x03;
pub const CONTROL_VARIABLE: u8 = 0x04;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("macro '{name}' is not compatible with {variant} events")]
    Incompatible { name: String, variant: &'static str },
    #[error("unknown wait control code {code:#04x}")]
    UnknownControl { code: u8 },
}

/// Where an event came from: the chunk index of its callsite in the owning
/// file plus the macro name exactly as written there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callsite {
    pub chunk_index: usize,
    pub macro_name: String,
}

impl Callsite {
    fn from_invocation(chunk_index: usize, invocation: &Invocation) -> Self {
        Self {
            chunk_index,
            macro_name: invocation.name.clone(),
        }
    }
}

/// One decoded level-script event. The variant set is closed; each variant
/// is constructible only from an invocation of one of the macros in its
/// compatibility list.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Wait(WaitEvent),
    End(EndEvent),
    PathObject(PathObjectEvent),
    VariableSet(VariableSetEvent),
}

impl Event {
    pub fn callsite(&self) -> &Callsite {
        match self {
            Event::Wait(event) => &event.callsite,
            Event::End(event) => &event.callsite,
            Event::PathObject(event) => &event.callsite,
            Event::VariableSet(event) => &event.callsite,
        }
    }

    /// Delay contributed by this event, in frames.
    pub fn delay(&self) -> u32 {
        match self {
            Event::Wait(event) => event.frames,
            _ => 0,
        }
    }

    /// Attempts each variant's compatibility list in fixed order; the first
    /// matching variant wins. Matching is case-sensitive on the macro name
    /// as written.
    pub fn from_invocation(chunk_index: usize, invocation: &Invocation) -> Option<Event> {
        WaitEvent::from_invocation(chunk_index, invocation)
            .map(Event::Wait)
            .or_else(|_| EndEvent::from_invocation(chunk_index, invocation).map(Event::End))
            .or_else(|_| {
                PathObjectEvent::from_invocation(chunk_index, invocation).map(Event::PathObject)
            })
            .or_else(|_| {
                VariableSetEvent::from_invocation(chunk_index, invocation).map(Event::VariableSet)
            })
            .ok()
    }
}

fn check_compatible(
    invocation: &Invocation,
    compatible: &'static [&'static str],
    variant: &'static str,
) -> Result<(), EventError> {
    if compatible.contains(&invocation.name.as_str()) {
        Ok(())
    } else {
        Err(EventError::Incompatible {
            name: invocation.name.clone(),
            variant,
        })
    }
}

fn argument_text(invocation: &Invocation, index: usize) -> &str {
    invocation
        .args
        .get(index)
        .map(|arg| arg.text.as_str())
        .unwrap_or("")
}

/// Numeric event field: `$`/`0x` hex or decimal, with a fallback of zero on
/// anything unparsable. Event decoding never fails on bad operand text.
pub(crate) fn parse_number(text: &str) -> i32 {
    let trimmed = text.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let value = if let Some(hex) = unsigned.strip_prefix('$') {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = unsigned.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = unsigned.strip_prefix('%') {
        i64::from_str_radix(bin, 2).ok()
    } else {
        unsigned.parse::<i64>().ok()
    };

    let Some(value) = value else {
        return 0;
    };
    let value = if negative { -value } else { value };
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Pause the script for a frame count before the next event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitEvent {
    pub frames: u32,
    pub callsite: Callsite,
}

impl WaitEvent {
    pub const COMPATIBLE: &'static [&'static str] = &["mapwait"];

    pub fn from_invocation(
        chunk_index: usize,
        invocation: &Invocation,
    ) -> Result<Self, EventError> {
        check_compatible(invocation, Self::COMPATIBLE, "wait")?;
        Ok(Self {
            frames: parse_number(argument_text(invocation, 0)).max(0) as u32,
            callsite: Callsite::from_invocation(chunk_index, invocation),
        })
    }

    /// Native control coding. A nonzero delay whose low nibble is clear is
    /// stored right-shifted by 4 under the alternate wait-2 code; everything
    /// else is stored raw under the plain wait code. Both codings are
    /// format-compatible with the original runtime and invert exactly.
    pub fn control_word(&self) -> (u8, u16) {
        if self.frames != 0 && self.frames & 0xF == 0 {
            (CONTROL_WAIT2, (self.frames >> 4) as u16)
        } else {
            (CONTROL_WAIT, self.frames as u16)
        }
    }

    /// Inverse of `control_word`.
    pub fn frames_from_control(code: u8, operand: u16) -> Result<u32, EventError> {
        match code {
            CONTROL_WAIT => Ok(u32::from(operand)),
            CONTROL_WAIT2 => Ok(u32::from(operand) << 4),
            other => Err(EventError::UnknownControl { code: other }),
        }
    }
}

/// Terminates the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndEvent {
    pub callsite: Callsite,
}

impl EndEvent {
    pub const COMPATIBLE: &'static [&'static str] = &["mapend"];

    pub fn from_invocation(
        chunk_index: usize,
        invocation: &Invocation,
    ) -> Result<Self, EventError> {
        check_compatible(invocation, Self::COMPATIBLE, "end")?;
        Ok(Self {
            callsite: Callsite::from_invocation(chunk_index, invocation),
        })
    }
}

/// Spawns an object on a movement path. Fields are extracted positionally:
/// x, y, z, shape, path, hp, ap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathObjectEvent {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub shape: String,
    pub path: String,
    pub hp: i32,
    pub ap: i32,
    pub callsite: Callsite,
}

impl PathObjectEvent {
    pub const COMPATIBLE: &'static [&'static str] = &["mapobj", "mapsobj"];

    pub fn from_invocation(
        chunk_index: usize,
        invocation: &Invocation,
    ) -> Result<Self, EventError> {
        check_compatible(invocation, Self::COMPATIBLE, "path-object")?;
        Ok(Self {
            x: parse_number(argument_text(invocation, 0)),
            y: parse_number(argument_text(invocation, 1)),
            z: parse_number(argument_text(invocation, 2)),
            shape: argument_text(invocation, 3).to_string(),
            path: argument_text(invocation, 4).to_string(),
            hp: parse_number(argument_text(invocation, 5)),
            ap: parse_number(argument_text(invocation, 6)),
            callsite: Callsite::from_invocation(chunk_index, invocation),
        })
    }
}

/// Assigns a value to a script variable slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSetEvent {
    pub slot: String,
    pub value: i32,
    pub callsite: Callsite,
}

impl VariableSetEvent {
    pub const COMPATIBLE: &'static [&'static str] = &["mapvar"];

    pub fn from_invocation(
        chunk_index: usize,
        invocation: &Invocation,
    ) -> Result<Self, EventError> {
        check_compatible(invocation, Self::COMPATIBLE, "variable-set")?;
        Ok(Self {
            slot: argument_text(invocation, 0).to_string(),
            value: parse_number(argument_text(invocation, 1)),
            callsite: Callsite::from_invocation(chunk_index, invocation),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfas_asm::{Argument, Origin};

    fn invocation(name: &str, args: &[&str]) -> Invocation {
        let origin = Origin::new("test.asm".into(), 0, 0, 1);
        Invocation {
            name: name.to_string(),
            args: args
                .iter()
                .map(|text| Argument {
                    text: text.to_string(),
                    origin: origin.clone(),
                })
                .collect(),
            origin,
        }
    }

    #[test]
    fn wait_requires_a_compatible_macro() {
        let err = WaitEvent::from_invocation(0, &invocation("mapend", &[]))
            .expect_err("expected incompatibility");
        assert!(matches!(err, EventError::Incompatible { .. }));
    }

    #[test]
    fn wait_matching_is_case_sensitive() {
        assert!(Event::from_invocation(0, &invocation("MAPWAIT", &["8"])).is_none());
        assert!(Event::from_invocation(0, &invocation("mapwait", &["8"])).is_some());
    }

    #[test]
    fn numeric_fields_fall_back_to_zero() {
        let event = WaitEvent::from_invocation(0, &invocation("mapwait", &["bogus"]))
            .expect("wait event");
        assert_eq!(event.frames, 0);

        let event =
            PathObjectEvent::from_invocation(0, &invocation("mapobj", &["$10", "nope"]))
                .expect("object event");
        assert_eq!(event.x, 0x10);
        assert_eq!(event.y, 0);
        assert_eq!(event.z, 0);
    }

    #[test]
    fn path_object_extracts_fields_positionally() {
        let event = PathObjectEvent::from_invocation(
            0,
            &invocation("mapsobj", &["10", "-20", "30", "arwing", "path3", "8", "2"]),
        )
        .expect("object event");
        assert_eq!((event.x, event.y, event.z), (10, -20, 30));
        assert_eq!(event.shape, "arwing");
        assert_eq!(event.path, "path3");
        assert_eq!((event.hp, event.ap), (8, 2));
        assert_eq!(event.callsite.macro_name, "mapsobj");
    }

    #[test]
    fn wait_control_coding_shifts_clear_low_nibbles() {
        let origin_callsite = Callsite {
            chunk_index: 0,
            macro_name: "mapwait".to_string(),
        };
        let shifted = WaitEvent {
            frames: 0x120,
            callsite: origin_callsite.clone(),
        };
        assert_eq!(shifted.control_word(), (CONTROL_WAIT2, 0x12));

        let raw = WaitEvent {
            frames: 0x25,
            callsite: origin_callsite.clone(),
        };
        assert_eq!(raw.control_word(), (CONTROL_WAIT, 0x25));

        let zero = WaitEvent {
            frames: 0,
            callsite: origin_callsite,
        };
        assert_eq!(zero.control_word(), (CONTROL_WAIT, 0));
    }

    #[test]
    fn wait_control_coding_round_trips() {
        for frames in [0u32, 1, 0x10, 0x25, 0x120, 0xFF0] {
            let event = WaitEvent {
                frames,
                callsite: Callsite {
                    chunk_index: 0,
                    macro_name: "mapwait".to_string(),
                },
            };
            let (code, operand) = event.control_word();
            assert_eq!(
                WaitEvent::frames_from_control(code, operand).expect("decode"),
                frames
            );
        }
    }

    #[test]
    fn unknown_control_code_is_an_error() {
        let err = WaitEvent::frames_from_control(0x7F, 1).expect_err("expected error");
        assert!(matches!(err, EventError::UnknownControl { code: 0x7F }));
    }

    #[test]
    fn parse_number_accepts_hex_prefixes() {
        assert_eq!(parse_number("$1F"), 0x1F);
        assert_eq!(parse_number("0x20"), 0x20);
        assert_eq!(parse_number("%101"), 5);
        assert_eq!(parse_number("-8"), -8);
        assert_eq!(parse_number(""), 0);
        assert_eq!(parse_number("shape"), 0);
    }
}
