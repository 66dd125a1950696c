//! Layered G-code document.

/// A sliced print as an ordered list of text blocks, one per layer.
///
/// Cura hands post-processors a list of strings: a header block, the start
/// G-code, then one block per `;LAYER:` marker. Lines inside a block are
/// joined with `\n`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcodeDocument {
    blocks: Vec<String>,
}

impl GcodeDocument {
    /// Wrap already-split blocks.
    pub fn from_blocks(blocks: Vec<String>) -> Self {
        Self { blocks }
    }

    /// Split a whole G-code file in front of every `;LAYER:` line.
    ///
    /// Text before the first marker forms its own block. Joining the blocks
    /// with `\n` reproduces `text` exactly.
    pub fn parse(text: &str) -> Self {
        let mut blocks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for line in text.split('\n') {
            if line.starts_with(";LAYER:") && !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
            current.push(line);
        }
        blocks.push(current.join("\n"));
        Self { blocks }
    }

    /// The blocks in print order.
    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// True when the document holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Replace block `index` in place.
    pub(crate) fn replace_block(&mut self, index: usize, text: String) {
        if let Some(slot) = self.blocks.get_mut(index) {
            *slot = text;
        }
    }

    /// Consume the document, returning its blocks.
    pub fn into_blocks(self) -> Vec<String> {
        self.blocks
    }

    /// The whole file.
    pub fn to_text(&self) -> String {
        self.blocks.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = ";FLAVOR:Marlin\n;LAYER_COUNT:2\nG28\n;LAYER:0\nG0 Z0.2\n;LAYER:1\nG0 Z0.4\n";

    #[test]
    fn test_parse_splits_before_layer_markers() {
        let doc = GcodeDocument::parse(SAMPLE);
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.blocks()[0], ";FLAVOR:Marlin\n;LAYER_COUNT:2\nG28");
        assert_eq!(doc.blocks()[1], ";LAYER:0\nG0 Z0.2");
        assert_eq!(doc.blocks()[2], ";LAYER:1\nG0 Z0.4\n");
    }

    #[test]
    fn test_parse_then_join_is_identity() {
        for text in [SAMPLE, "", ";LAYER:0", "G28\r\n;LAYER:0\r\nG1 X1\r\n"] {
            assert_eq!(GcodeDocument::parse(text).to_text(), text);
        }
    }

    #[test]
    fn test_layer_count_marker_is_not_a_split_point() {
        let doc = GcodeDocument::parse(";LAYER_COUNT:5\n;LAYER:0");
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_replace_block() {
        let mut doc = GcodeDocument::from_blocks(vec!["a".into(), "b".into()]);
        doc.replace_block(1, "c".into());
        doc.replace_block(7, "ignored".into());
        assert_eq!(doc.into_blocks(), vec!["a".to_string(), "c".to_string()]);
    }
}
