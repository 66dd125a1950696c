//! Brim squashing ("compress" mode).
//!
//! The first skirt section of layer 0 is printed at `reduce` instead of the
//! nominal first-layer height, with flow scaled by `reduce / layer_height_0`
//! so the deposited volume per millimetre is unchanged.

use tabplus_math::Tolerance;
use tracing::debug;

use crate::duplicate::{BEGIN_MARKER, END_MARKER};
use crate::error::Result;
use crate::line::{display_message, flow_percent, travel_z, Axis, Line, LineKind};
use crate::rewrite::{BlockRewriter, BlockWriter, RewriteReport};
use crate::settings::CompressSettings;

const FULL_FLOW: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Inside layer 0, waiting for the selected extruder's skirt.
    Armed,
    InBrim,
}

/// Squashes the layer-0 brim of one extruder.
#[derive(Debug)]
pub struct CompressRewriter {
    settings: CompressSettings,
    phase: Phase,
    tool: u32,
    hop_seen: bool,
    /// Rewrite the next nominal-height Z move of this layer.
    pending_restore: bool,
    sections: usize,
}

impl CompressRewriter {
    /// Create a rewriter.
    pub fn new(settings: CompressSettings) -> Self {
        Self {
            settings,
            phase: Phase::Idle,
            tool: 0,
            hop_seen: false,
            pending_restore: false,
            sections: 0,
        }
    }

    fn is_nominal(&self, z: f64) -> bool {
        Tolerance::GCODE.values_equal(z, self.settings.layer_height_0)
    }

    fn enter_brim(&mut self, out: &mut BlockWriter) {
        out.insert(BEGIN_MARKER);
        if self.settings.lcd_feedback {
            out.insert(display_message("Brim compression"));
        }
        out.insert(travel_z(self.settings.reduce));
        out.insert(flow_percent(self.settings.flow_percent()));
        self.phase = Phase::InBrim;
        self.hop_seen = false;
        self.sections += 1;
        debug!(
            tool = self.tool,
            z = self.settings.reduce,
            flow = self.settings.flow_percent(),
            "Compressing brim"
        );
    }

    fn leave_brim(&mut self, out: &mut BlockWriter) {
        out.insert(flow_percent(FULL_FLOW));
        if self.hop_seen {
            out.insert(travel_z(self.settings.layer_height_0));
        } else {
            self.pending_restore = true;
        }
        if self.settings.lcd_feedback {
            out.insert(display_message("Layer 0"));
        }
        out.insert(END_MARKER);
        self.phase = Phase::Idle;
    }
}

impl BlockRewriter for CompressRewriter {
    fn rewrite_line(&mut self, line: &Line<'_>, out: &mut BlockWriter) -> Result<()> {
        let ends_section =
            line.is_section_change() || matches!(line.kind, LineKind::Layer(_));
        if self.phase == Phase::InBrim && ends_section {
            self.leave_brim(out);
        }

        match &line.kind {
            LineKind::Layer(n) => {
                self.pending_restore = false;
                self.phase = if *n == 0 { Phase::Armed } else { Phase::Idle };
            }
            LineKind::ToolChange(t) => self.tool = *t,
            LineKind::Motion(m) => match m.z {
                Some(z) if self.phase == Phase::InBrim => {
                    if self.is_nominal(z) {
                        out.replace(line.with_axis(Axis::Z, self.settings.reduce));
                        return Ok(());
                    }
                    if z > self.settings.layer_height_0 {
                        self.hop_seen = true;
                    }
                }
                Some(z) if self.pending_restore && self.is_nominal(z) => {
                    self.pending_restore = false;
                    out.replace(line.with_axis(Axis::Z, self.settings.reduce));
                    return Ok(());
                }
                _ => {}
            },
            _ => {}
        }

        out.keep(line.text);
        if self.phase == Phase::Armed && line.is_skirt() && self.tool == self.settings.tool() {
            self.enter_brim(out);
        }
        Ok(())
    }

    fn finish(self) -> RewriteReport {
        RewriteReport {
            sections_compressed: self.sections,
            flow_percent: (self.sections > 0).then(|| self.settings.flow_percent()),
            ..Default::default()
        }
    }
}
