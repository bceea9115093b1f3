mod event;

use thiserror::Error;

use sfas_asm::{AsmFile, Chunk, text};

pub use event::{
    CONTROL_END, CONTROL_OBJECT, CONTROL_VARIABLE, CONTROL_WAIT, CONTROL_WAIT2, Callsite,
    EndEvent, Event, EventError, PathObjectEvent, VariableSetEvent, WaitEvent,
};

/// A single-word line starting with this prefix opens a script section.
pub const SECTION_PREFIX: &str = "map";

/// The single word that switches the source into rendering mode. Reaching
/// it is the decoder's only normal exit besides end of input.
pub const RENDER_START_WORD: &str = "renderstart";

/// Every level-script macro name the decoder interprets. Imports register
/// these with their session so callsites classify as invocations even when
/// the runtime provides the definitions.
pub const SCRIPT_MACRO_NAMES: &[&str] = &["mapwait", "mapend", "mapobj", "mapsobj", "mapvar"];

#[derive(Debug, Error)]
pub enum MapError {
    /// The event list and delay map have diverged. Decoding produced from a
    /// single pass cannot hit this; loaded or merged data can, and must not
    /// be used with a possibly misaligned mapping.
    #[error("event count {events} does not match delay map count {delays}")]
    Misaligned { events: usize, delays: usize },
}

/// A decoded level script: time-ordered events plus the delay recorded at
/// each event index. `delays[i]` is the delay *at* event `i`, not a running
/// total; use `cumulative_delay` for elapsed time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapData {
    events: Vec<Event>,
    delays: Vec<u32>,
}

impl MapData {
    /// Walks the ordered chunks of an already-imported file and decodes the
    /// script events found in its map sections. Never fails: unknown
    /// invocations and malformed operands degrade, they do not abort.
    pub fn decode(file: &AsmFile) -> MapData {
        let mut data = MapData::default();
        let mut in_section = false;

        for (index, chunk) in file.chunks().iter().enumerate() {
            if let Some(word) = section_word(chunk) {
                if word == RENDER_START_WORD {
                    break;
                }
                if word.starts_with(SECTION_PREFIX) {
                    in_section = true;
                }
                continue;
            }

            if !in_section {
                continue;
            }

            if let Chunk::Invocation(invocation) = chunk {
                if let Some(event) = Event::from_invocation(index, invocation) {
                    let delay = event.delay();
                    data.events.push(event);
                    data.delays.push(delay);
                }
            }
        }

        data
    }

    /// Rebuilds a script from separately loaded parts, enforcing the
    /// event/delay alignment invariant.
    pub fn from_parts(events: Vec<Event>, delays: Vec<u32>) -> Result<MapData, MapError> {
        if events.len() != delays.len() {
            return Err(MapError::Misaligned {
                events: events.len(),
                delays: delays.len(),
            });
        }
        Ok(MapData { events, delays })
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Delay recorded at `index`.
    pub fn delay_at(&self, index: usize) -> Option<u32> {
        self.delays.get(index).copied()
    }

    /// Total delay accumulated through event `index`, inclusive.
    pub fn cumulative_delay(&self, index: usize) -> u64 {
        self.delays
            .iter()
            .take(index + 1)
            .map(|&delay| u64::from(delay))
            .sum()
    }

    /// Combines two decoded scripts. Each side keeps its internal event
    /// order; the child's delay-map keys are rebased past the parent's
    /// event count. Either side arriving misaligned is fatal; no partial
    /// aggregate is produced.
    pub fn merge(parent: &MapData, child: &MapData) -> Result<MapData, MapError> {
        for side in [parent, child] {
            if side.events.len() != side.delays.len() {
                return Err(MapError::Misaligned {
                    events: side.events.len(),
                    delays: side.delays.len(),
                });
            }
        }

        let mut events = Vec::with_capacity(parent.events.len() + child.events.len());
        events.extend(parent.events.iter().cloned());
        events.extend(child.events.iter().cloned());
        let mut delays = Vec::with_capacity(parent.delays.len() + child.delays.len());
        delays.extend(parent.delays.iter().copied());
        delays.extend(child.delays.iter().copied());

        Ok(MapData { events, delays })
    }
}

/// The normalized single word of a chunk, when the chunk is one. Plain
/// lines and labels both qualify; a label's word is its symbol.
fn section_word(chunk: &Chunk) -> Option<String> {
    match chunk {
        Chunk::Label(label) => Some(label.symbol.clone()),
        Chunk::Line(line) => {
            let normalized = text::normalize(&line.text);
            if normalized.is_empty() || normalized.contains(' ') {
                None
            } else {
                Some(normalized)
            }
        }
        _ => None,
    }
}

/// A level-script file derived from an already-imported assembly file. The
/// seed file is taken over as-is; no re-tokenization happens.
#[derive(Debug, Clone)]
pub struct MapFile {
    file: AsmFile,
    data: MapData,
}

impl MapFile {
    pub fn derive(file: AsmFile) -> MapFile {
        let data = MapData::decode(&file);
        MapFile { file, data }
    }

    pub fn file(&self) -> &AsmFile {
        &self.file
    }

    pub fn data(&self) -> &MapData {
        &self.data
    }
}
