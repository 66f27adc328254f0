use serde::ser::{Serialize, SerializeSeq, Serializer};

/// Number of bytes the memory panel covers.
pub const DISPLAY_BYTES: usize = 256;
pub const ROW_COUNT: usize = 16;
pub const ROW_STRIDE: usize = 16;
pub const GROUPS_PER_ROW: usize = 4;

/// Last memory buffer reported by the engine, capped at the display window.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryImage {
    data: Vec<u8>,
}

impl MemoryImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most the first 256 bytes of an engine buffer.
    pub fn from_engine(mut data: Vec<u8>) -> Self {
        data.truncate(DISPLAY_BYTES);
        Self { data }
    }

    // Positions past the reported buffer read as zero; nothing is stored for them.
    pub fn read(&self, address: usize) -> u8 {
        self.data.get(address).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// One line of the memory panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRow {
    pub address: u16,
    pub groups: [(u8, u8); GROUPS_PER_ROW],
    pub ascii: String,
}

impl MemoryRow {
    pub fn address_label(&self) -> String {
        format!("0x{:04X}", self.address)
    }

    pub fn group_label(&self, group: usize) -> String {
        let (hi, lo) = self.groups[group];
        format!("{:02x} {:02x}", hi, lo)
    }

    /// Cells left to right: address, the four groups, ASCII.
    pub fn cells(&self) -> Vec<String> {
        let mut cells = Vec::with_capacity(GROUPS_PER_ROW + 2);
        cells.push(self.address_label());
        for group in 0..GROUPS_PER_ROW {
            cells.push(self.group_label(group));
        }
        cells.push(self.ascii.clone());
        cells
    }
}

impl Serialize for MemoryRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let cells = self.cells();
        let mut seq = serializer.serialize_seq(Some(cells.len()))?;
        for cell in &cells {
            seq.serialize_element(cell)?;
        }
        seq.end()
    }
}

fn printable(byte: u8) -> char {
    if (32..127).contains(&byte) {
        byte as char
    } else {
        '.'
    }
}

/// Project the first 256 bytes of `image` into 16 rows of 16-byte stride.
///
/// Each row renders only its first 8 bytes: group `j` holds row offsets
/// `2j` and `2j + 1`, and the ASCII column covers the same 8 bytes. Reports
/// exported by earlier versions of the console use this layout.
pub fn project(image: &MemoryImage) -> [MemoryRow; ROW_COUNT] {
    std::array::from_fn(|row| {
        let base = row * ROW_STRIDE;
        let window: Vec<u8> = (base..base + ROW_STRIDE).map(|addr| image.read(addr)).collect();

        let mut ascii = String::with_capacity(GROUPS_PER_ROW * 2);
        let groups = std::array::from_fn(|j| {
            let pair = (window[j * 2], window[j * 2 + 1]);
            ascii.push(printable(pair.0));
            ascii.push(printable(pair.1));
            pair
        });

        MemoryRow {
            address: base as u16,
            groups,
            ascii,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_image_projects_sixteen_zero_rows() {
        let rows = project(&MemoryImage::new());
        assert_eq!(rows.len(), 16);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.address as usize, i * 16);
            assert_eq!(row.groups, [(0, 0); 4]);
            assert_eq!(row.ascii, "........");
            assert_eq!(row.group_label(3), "00 00");
        }
    }

    #[test]
    fn test_address_labels() {
        let rows = project(&MemoryImage::new());
        assert_eq!(rows[0].address_label(), "0x0000");
        assert_eq!(rows[1].address_label(), "0x0010");
        assert_eq!(rows[15].address_label(), "0x00F0");
    }

    #[test]
    fn test_hello_renders_in_eight_byte_window() {
        let image = MemoryImage::from_engine(vec![72, 101, 108, 108, 111]);
        let rows = project(&image);

        assert_eq!(rows[0].ascii, "Hello...");
        assert_eq!(rows[0].groups, [(72, 101), (108, 108), (111, 0), (0, 0)]);
        assert_eq!(rows[0].group_label(0), "48 65");
        assert_eq!(rows[0].group_label(2), "6f 00");
        assert_eq!(rows[1].ascii, "........");
    }

    #[test]
    fn test_offsets_eight_to_fifteen_are_not_rendered() {
        let mut data = vec![0u8; 32];
        for byte in data.iter_mut().take(16).skip(8) {
            *byte = b'Z';
        }
        data[16] = b'A';
        let rows = project(&MemoryImage::from_engine(data));

        assert_eq!(rows[0].ascii, "........");
        assert_eq!(rows[0].groups, [(0, 0); 4]);
        assert_eq!(rows[1].ascii, "A.......");
    }

    #[test]
    fn test_short_image_never_indexes_out_of_bounds() {
        for len in [0, 1, 7, 15, 17, 100, 255] {
            let image = MemoryImage::from_engine(vec![0x41; len]);
            let rows = project(&image);
            assert_eq!(rows.len(), 16);
            let last = &rows[15];
            if len <= 240 {
                assert_eq!(last.ascii, "........");
            }
        }
    }

    #[test]
    fn test_bytes_past_display_window_are_dropped() {
        let mut data = vec![0u8; 300];
        data[256] = 0xAA;
        data[240] = 0x7E;
        let image = MemoryImage::from_engine(data);
        assert_eq!(image.len(), 256);
        assert_eq!(image.read(256), 0);

        let rows = project(&image);
        assert_eq!(rows[15].groups[0], (0x7E, 0));
        assert_eq!(rows[15].ascii, "~.......");
    }

    #[test]
    fn test_non_printable_bytes_become_dots() {
        let image = MemoryImage::from_engine(vec![31, 32, 126, 127, 0xFF, b'a', 10, 0]);
        let rows = project(&image);
        assert_eq!(rows[0].ascii, ". ~..a..");
    }

    #[test]
    fn test_projection_is_deterministic() {
        let image = MemoryImage::from_engine((0..=255).collect());
        assert_eq!(project(&image), project(&image));
    }

    #[test]
    fn test_row_serializes_as_cells() {
        let rows = project(&MemoryImage::from_engine(vec![0x48, 0x69]));
        let json = serde_json::to_string(&rows[0]).unwrap();
        assert_eq!(json, r#"["0x0000","48 69","00 00","00 00","00 00","Hi......"]"#);
    }
}
