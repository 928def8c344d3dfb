const TAG_COLORS: [&str; 10] = [
    "#e57373", "#64b5f6", "#81c784", "#ffb74d", "#ba68c8", "#4db6ac", "#f06292", "#a1887f",
    "#7986cb", "#dce775",
];

/// Hands out display colors for tags, one after the other, starting over
/// once every color has been used.
#[derive(Debug, Clone, Default)]
pub struct TagPalette {
    cursor: usize,
}

impl TagPalette {
    pub fn new() -> TagPalette {
        TagPalette { cursor: 0 }
    }

    pub fn next_color(&mut self) -> &'static str {
        let color = TAG_COLORS[self.cursor];

        self.cursor = (self.cursor + 1) % TAG_COLORS.len();

        color
    }
}
