//! Transactional block-by-block rewriting.
//!
//! Rewriters never touch the document they are reading: each block is
//! streamed into a fresh output buffer and staged. The staged blocks are
//! committed only once every block has been processed without error, so a
//! failed pass leaves the document exactly as it was.

use serde::Serialize;
use tracing::{debug, info};

use crate::compress::CompressRewriter;
use crate::document::GcodeDocument;
use crate::duplicate::DuplicateRewriter;
use crate::error::Result;
use crate::line::Line;
use crate::settings::BrimMode;

/// Summary of a rewrite pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewriteReport {
    /// Brim replays inserted (duplicate mode).
    pub replays: usize,
    /// Skirt sections squashed (compress mode).
    pub sections_compressed: usize,
    /// Flow percentage applied to compressed sections.
    pub flow_percent: Option<u32>,
    /// Blocks whose text changed.
    pub blocks_changed: usize,
}

/// A streaming rewriter fed one block at a time, in document order.
pub trait BlockRewriter {
    /// Process one line, appending whatever should replace it to `out`.
    fn rewrite_line(&mut self, line: &Line<'_>, out: &mut BlockWriter) -> Result<()>;

    /// Called once after the last block.
    fn finish(self) -> RewriteReport;
}

/// Output buffer for one block.
#[derive(Debug, Default)]
pub struct BlockWriter {
    lines: Vec<String>,
    changed: bool,
}

impl BlockWriter {
    /// Pass an input line through untouched.
    pub fn keep(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }

    /// Emit a line in place of the input line.
    pub fn replace(&mut self, text: String) {
        self.lines.push(text);
        self.changed = true;
    }

    /// Emit an extra line.
    pub fn insert(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
        self.changed = true;
    }

    fn into_text(self) -> Option<String> {
        self.changed.then(|| self.lines.join("\n"))
    }
}

/// Run `rewriter` over every block, committing only if all blocks succeed.
pub fn run<R: BlockRewriter>(doc: &mut GcodeDocument, mut rewriter: R) -> Result<RewriteReport> {
    let mut staged = Vec::new();
    for (index, block) in doc.blocks().iter().enumerate() {
        let mut out = BlockWriter::default();
        for (line_no, text) in block.split('\n').enumerate() {
            let line = Line::parse(text).map_err(|e| e.at(index, line_no))?;
            rewriter
                .rewrite_line(&line, &mut out)
                .map_err(|e| e.at(index, line_no))?;
        }
        if let Some(text) = out.into_text() {
            debug!(block = index, "Staged rewritten block");
            staged.push((index, text));
        }
    }

    let mut report = rewriter.finish();
    report.blocks_changed = staged.len();
    for (index, text) in staged {
        doc.replace_block(index, text);
    }
    Ok(report)
}

/// Apply a brim rewrite to `doc`.
///
/// On error the document is left unmodified.
pub fn rewrite(doc: &mut GcodeDocument, mode: &BrimMode) -> Result<RewriteReport> {
    mode.validate()?;
    let report = match mode {
        BrimMode::Duplicate(settings) => run(doc, DuplicateRewriter::new(*settings))?,
        BrimMode::Compress(settings) => run(doc, CompressRewriter::new(*settings))?,
    };
    info!(
        replays = report.replays,
        sections_compressed = report.sections_compressed,
        blocks_changed = report.blocks_changed,
        "Brim rewrite complete"
    );
    Ok(report)
}

/// Rewrite a whole G-code file.
pub fn rewrite_text(text: &str, mode: &BrimMode) -> Result<(String, RewriteReport)> {
    let mut doc = GcodeDocument::parse(text);
    let report = rewrite(&mut doc, mode)?;
    Ok((doc.to_text(), report))
}
