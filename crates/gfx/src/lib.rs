mod cgx;
mod scr;

use anyhow::{Result, bail};

pub use cgx::{CgxFile, Tile, decode_tile, encode_tile};
pub use scr::{
    CELLS_PER_QUADRANT, QUADRANT_BYTES, QUADRANT_COUNT, SCR_FILE_BYTES, ScrFile, TileMapping,
};

/// Shared character atlas geometry. One sub-bank is a 128x128-pixel sheet
/// of 8-pixel character cells; sprite layout and external renderers both
/// address it in these units.
pub const ATLAS_WIDTH: u32 = 128;
pub const ATLAS_HEIGHT: u32 = 128;
pub const CHAR_CELL: u32 = 8;

/// Planar pixel depth of a graphics file. The console stores one bit of
/// each pixel per plane, `bits_per_pixel` planes per 8x8 tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    Two,
    Four,
    Eight,
}

impl BitDepth {
    /// `bits_per_pixel = 2 << format_index` for format indices 0..=2.
    pub fn from_format_index(format_index: u8) -> Result<BitDepth> {
        match format_index {
            0 => Ok(BitDepth::Two),
            1 => Ok(BitDepth::Four),
            2 => Ok(BitDepth::Eight),
            other => bail!("invalid graphics format index: {other}"),
        }
    }

    pub fn try_from_bits_per_pixel(bits: u8) -> Result<BitDepth> {
        match bits {
            2 => Ok(BitDepth::Two),
            4 => Ok(BitDepth::Four),
            8 => Ok(BitDepth::Eight),
            other => bail!("unsupported bit depth: {other} bpp"),
        }
    }

    pub fn bits_per_pixel(self) -> u8 {
        match self {
            BitDepth::Two => 2,
            BitDepth::Four => 4,
            BitDepth::Eight => 8,
        }
    }

    pub fn plane_count(self) -> usize {
        usize::from(self.bits_per_pixel())
    }

    /// Bytes per 8x8 tile: one byte per plane row.
    pub fn bytes_per_tile(self) -> usize {
        8 * self.plane_count()
    }

    /// Palette stride of the tile-map color-select field at this depth.
    pub fn palette_step(self) -> u16 {
        match self {
            BitDepth::Two => 4,
            BitDepth::Four => 16,
            BitDepth::Eight => 128,
        }
    }
}

/// How the caller arrived at a file's bit depth. Stored as provenance only:
/// the codec never re-derives depth internally, so `GuessDepth` and
/// `AskDepth` record that the ambiguity was resolved externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingStrategy {
    Standard,
    GuessDepth,
    AskDepth,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_index_maps_to_bit_depths() {
        assert_eq!(BitDepth::from_format_index(0).expect("depth"), BitDepth::Two);
        assert_eq!(BitDepth::from_format_index(1).expect("depth"), BitDepth::Four);
        assert_eq!(
            BitDepth::from_format_index(2).expect("depth"),
            BitDepth::Eight
        );
        assert!(BitDepth::from_format_index(3).is_err());
    }

    #[test]
    fn rejects_out_of_range_bit_depths() {
        let err = BitDepth::try_from_bits_per_pixel(6).expect_err("expected error");
        assert!(err.to_string().contains("unsupported bit depth"));
    }

    #[test]
    fn palette_steps_follow_depth() {
        assert_eq!(BitDepth::Two.palette_step(), 4);
        assert_eq!(BitDepth::Four.palette_step(), 16);
        assert_eq!(BitDepth::Eight.palette_step(), 128);
    }

    #[test]
    fn tile_sizes_follow_depth() {
        assert_eq!(BitDepth::Two.bytes_per_tile(), 16);
        assert_eq!(BitDepth::Four.bytes_per_tile(), 32);
        assert_eq!(BitDepth::Eight.bytes_per_tile(), 64);
    }
}
