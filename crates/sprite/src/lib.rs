use indexmap::IndexMap;

use sfas_asm::{AsmFile, Chunk, Invocation};
use sfas_gfx::{ATLAS_HEIGHT, ATLAS_WIDTH, CHAR_CELL};

/// Every sprite-definition macro name the layout walker interprets. Imports
/// register these with their session so callsites classify as invocations.
pub const SPRITE_MACRO_NAMES: &[&str] = &[
    "sprbank",
    "defspr",
    "defspr_hi",
    "defsprdoub",
    "defsprdoub_hi",
    "defspr64",
    "defspr64_hi",
    "defsprabs",
    "defsprabs_hi",
];

/// One sprite rectangle on the shared texture atlas, in pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    /// True when the sprite lives in the high sub-bank.
    pub hi: bool,
}

/// A named collection of sprite rectangles. Within a bank the first
/// definition of a name wins; later collisions are dropped silently.
#[derive(Debug, Clone, Default)]
pub struct SpriteBank {
    pub name: String,
    sprites: IndexMap<String, Sprite>,
}

impl SpriteBank {
    pub fn sprites(&self) -> impl Iterator<Item = &Sprite> {
        self.sprites.values()
    }

    pub fn get(&self, name: &str) -> Option<&Sprite> {
        self.sprites.get(name)
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }
}

/// All sprite banks laid out from one definition file, in definition order.
#[derive(Debug, Clone, Default)]
pub struct SpriteSheet {
    banks: IndexMap<String, SpriteBank>,
}

impl SpriteSheet {
    /// Walks the invocation chunks of an already-imported definition file
    /// and lays out every sprite on the atlas. Unknown macros and malformed
    /// operands are skipped, never fatal.
    pub fn layout(file: &AsmFile) -> SpriteSheet {
        let mut walker = Walker::default();
        for chunk in file.chunks() {
            if let Chunk::Invocation(invocation) = chunk {
                walker.step(invocation);
            }
        }
        walker.sheet
    }

    pub fn banks(&self) -> impl Iterator<Item = &SpriteBank> {
        self.banks.values()
    }

    pub fn bank(&self, name: &str) -> Option<&SpriteBank> {
        self.banks.get(name)
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }
}

/// Cell-grid cursor of one sub-bank.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    x: u32,
    y: u32,
}

/// Low and high sub-bank cursors of one bank.
#[derive(Debug, Clone, Copy, Default)]
struct SubCursors {
    low: Cursor,
    high: Cursor,
}

#[derive(Debug)]
struct Walker {
    sheet: SpriteSheet,
    bank: String,
    cursors: IndexMap<String, SubCursors>,
}

impl Default for Walker {
    fn default() -> Self {
        Self {
            sheet: SpriteSheet::default(),
            bank: "default".to_string(),
            cursors: IndexMap::new(),
        }
    }
}

/// Sprite footprint in char cells, derived from the macro name.
fn cell_size(stem: &str) -> u32 {
    match stem {
        "defsprdoub" => 4,
        "defspr64" => 8,
        _ => 2,
    }
}

impl Walker {
    fn step(&mut self, invocation: &Invocation) {
        let name = invocation.name.as_str();
        if name == "sprbank" {
            self.open_bank(invocation);
            return;
        }

        if !SPRITE_MACRO_NAMES.contains(&name) {
            return;
        }
        let hi = name.ends_with("_hi");
        let stem = name.strip_suffix("_hi").unwrap_or(name);

        if stem == "defsprabs" {
            let cursor = self.cursor_mut(hi);
            cursor.x = argument_number(invocation, 1);
            cursor.y = argument_number(invocation, 2);
        }

        self.place(invocation, cell_size(stem), hi);
    }

    fn open_bank(&mut self, invocation: &Invocation) {
        let name = invocation
            .args
            .first()
            .map(|arg| arg.text.clone())
            .unwrap_or_default();
        if name.is_empty() {
            return;
        }
        self.bank = name.clone();
        self.sheet
            .banks
            .entry(name.clone())
            .or_insert_with(|| SpriteBank {
                name,
                sprites: IndexMap::new(),
            });
    }

    /// Cursor of the current bank's chosen sub-bank. Reopening a bank
    /// resumes where its layout left off.
    fn cursor_mut(&mut self, hi: bool) -> &mut Cursor {
        let cursors = self.cursors.entry(self.bank.clone()).or_default();
        if hi { &mut cursors.high } else { &mut cursors.low }
    }

    fn place(&mut self, invocation: &Invocation, cells: u32, hi: bool) {
        let Some(name) = invocation.args.first().map(|arg| arg.text.clone()) else {
            return;
        };
        if name.is_empty() {
            return;
        }

        let atlas_cells = ATLAS_WIDTH / CHAR_CELL;
        let cursor = self.cursor_mut(hi);
        if cursor.x + cells > atlas_cells {
            cursor.x = 0;
            cursor.y += cells;
        }

        let x = cursor.x * CHAR_CELL;
        let y = cursor.y * CHAR_CELL;
        let size = cells * CHAR_CELL;
        // Clamp at the atlas edge instead of overflowing.
        let w = size.min(ATLAS_WIDTH.saturating_sub(x));
        let h = size.min(ATLAS_HEIGHT.saturating_sub(y));
        cursor.x += cells;

        let bank_name = self.bank.clone();
        let bank = self
            .sheet
            .banks
            .entry(bank_name.clone())
            .or_insert_with(|| SpriteBank {
                name: bank_name,
                sprites: IndexMap::new(),
            });
        bank.sprites.entry(name.clone()).or_insert(Sprite {
            name,
            x,
            y,
            w,
            h,
            hi,
        });
    }
}

fn argument_number(invocation: &Invocation, index: usize) -> u32 {
    invocation
        .args
        .get(index)
        .and_then(|arg| arg.text.trim().parse::<u32>().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfas_asm::{Importer, Session};

    fn layout(source: &str) -> SpriteSheet {
        let mut session = Session::new();
        session.register_names(SPRITE_MACRO_NAMES.iter().copied());
        let file = Importer::with_session(session)
            .import_source("sprites.asm", source)
            .expect("import")
            .file;
        SpriteSheet::layout(&file)
    }

    #[test]
    fn places_sprites_left_to_right() {
        let sheet = layout("sprbank ships\ndefspr a\ndefspr b\n");
        let bank = sheet.bank("ships").expect("bank");
        let a = bank.get("a").expect("sprite");
        assert_eq!((a.x, a.y, a.w, a.h), (0, 0, 16, 16));
        let b = bank.get("b").expect("sprite");
        assert_eq!((b.x, b.y), (16, 0));
        assert!(!b.hi);
    }

    #[test]
    fn wraps_to_the_next_row_past_the_atlas_width() {
        let mut source = String::from("sprbank ships\n");
        for index in 0..9 {
            source.push_str(&format!("defspr s{index}\n"));
        }
        let sheet = layout(&source);
        let bank = sheet.bank("ships").expect("bank");
        let last = bank.get("s8").expect("sprite");
        assert_eq!((last.x, last.y), (0, 16));
    }

    #[test]
    fn double_and_large_variants_scale_the_cell_multiplier() {
        let sheet = layout("sprbank ships\ndefsprdoub big\ndefspr64 huge\n");
        let bank = sheet.bank("ships").expect("bank");
        assert_eq!(bank.get("big").expect("sprite").w, 32);
        let huge = bank.get("huge").expect("sprite");
        assert_eq!((huge.x, huge.w, huge.h), (32, 64, 64));
    }

    #[test]
    fn high_sub_bank_keeps_an_independent_cursor() {
        let sheet = layout("sprbank ships\ndefspr low0\ndefspr_hi high0\ndefspr low1\n");
        let bank = sheet.bank("ships").expect("bank");
        let high = bank.get("high0").expect("sprite");
        assert_eq!((high.x, high.y), (0, 0));
        assert!(high.hi);
        let low = bank.get("low1").expect("sprite");
        assert_eq!((low.x, low.y), (16, 0));
    }

    #[test]
    fn absolute_variants_move_the_cursor_before_placing() {
        let sheet = layout("sprbank ships\ndefspr a\ndefsprabs far, 10, 12\ndefspr next\n");
        let bank = sheet.bank("ships").expect("bank");
        let far = bank.get("far").expect("sprite");
        assert_eq!((far.x, far.y), (80, 96));
        // Placement falls through to the normal cursor advance.
        let next = bank.get("next").expect("sprite");
        assert_eq!((next.x, next.y), (96, 96));
    }

    #[test]
    fn sprites_clamp_at_the_atlas_edge() {
        let sheet = layout("sprbank ships\ndefsprabs edge, 14, 15\n");
        let bank = sheet.bank("ships").expect("bank");
        let edge = bank.get("edge").expect("sprite");
        assert_eq!((edge.x, edge.y), (112, 120));
        assert_eq!((edge.w, edge.h), (16, 8));
    }

    #[test]
    fn name_collisions_keep_the_first_definition() {
        let sheet = layout("sprbank ships\ndefspr twin\ndefspr twin\n");
        let bank = sheet.bank("ships").expect("bank");
        assert_eq!(bank.len(), 1);
        assert_eq!(bank.get("twin").expect("sprite").x, 0);
    }

    #[test]
    fn each_bank_keeps_its_own_cursor() {
        let sheet = layout("sprbank a\ndefspr one\nsprbank b\ndefspr two\n");
        assert_eq!(sheet.len(), 2);
        let two = sheet.bank("b").expect("bank").get("two").expect("sprite");
        assert_eq!((two.x, two.y), (0, 0));
    }

    #[test]
    fn reopening_a_bank_resumes_its_cursor() {
        let sheet = layout(
            "sprbank a\ndefspr one\nsprbank b\ndefspr two\nsprbank a\ndefspr three\n",
        );
        let bank = sheet.bank("a").expect("bank");
        assert_eq!(bank.len(), 2);
        let three = bank.get("three").expect("sprite");
        assert_eq!((three.x, three.y), (16, 0));
    }
}
