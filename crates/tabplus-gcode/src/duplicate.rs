//! Brim replay ("duplicate" mode).
//!
//! The skirt/brim printed on layer 0 is captured line by line. Each layer
//! `1..=layers` then gets a copy of it inserted right after its `;LAYER:`
//! marker, shifted up by one first-layer height per replay, so the brim
//! grows with the part instead of being a single fragile layer.
//!
//! In absolute extrusion mode the extruder position is reset around each
//! replay with `G92 E`, and a retraction pending at the layer change is
//! undone before the replay and re-applied after it.

use tabplus_math::Tolerance;
use tracing::{debug, warn};

use crate::error::Result;
use crate::line::{
    extruder_move, format_coord, replace_axis, set_extruder_position, travel_z, Axis,
    ExtrusionMode, Line, LineKind,
};
use crate::rewrite::{BlockRewriter, BlockWriter, RewriteReport};
use crate::settings::DuplicateSettings;

/// Opens an inserted block.
pub const BEGIN_MARKER: &str = ";BEGIN_OF_MODIFICATION";

/// Closes an inserted block.
pub const END_MARKER: &str = ";END_OF_MODIFICATION";

/// Feedrate assumed for retractions until one is seen (mm/min).
const DEFAULT_RETRACT_FEEDRATE: f64 = 3000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitingSkirt,
    Capturing,
}

/// A line of the captured brim and the Z it carries.
#[derive(Debug, Clone)]
struct CapturedLine {
    text: String,
    z: Option<f64>,
}

#[derive(Debug)]
struct BrimCapture {
    start: CapturedLine,
    start_z: f64,
    lines: Vec<CapturedLine>,
    hop_z: Option<f64>,
    /// Extruder position when the skirt marker was reached.
    e_at_start: Option<f64>,
    initial_e: Option<f64>,
    end_e: Option<f64>,
    reached_xy: bool,
}

impl BrimCapture {
    fn push(&mut self, line: &Line<'_>) {
        let motion = line.motion();
        if let Some(m) = motion {
            if !self.reached_xy {
                if m.has_xy() {
                    self.reached_xy = true;
                } else if m.is_z_only() {
                    self.hop_z = m.z;
                } else if self.initial_e.is_none() {
                    self.initial_e = m.e;
                }
            }
            if m.e.is_some() {
                self.end_e = m.e;
            }
        }
        self.lines.push(CapturedLine {
            text: line.text.to_string(),
            z: motion.and_then(|m| m.z),
        });
    }

    fn finish(self) -> BrimRecord {
        let base_z = self.hop_z.unwrap_or(self.start_z);
        let initial_e = self.initial_e.or(self.e_at_start);
        BrimRecord {
            start: self.start,
            base_z,
            initial_e,
            end_e: self.end_e.or(initial_e),
            lines: self.lines,
        }
    }
}

/// The captured layer-0 brim, ready to be replayed.
#[derive(Debug)]
struct BrimRecord {
    start: CapturedLine,
    /// Height the brim was printed at.
    base_z: f64,
    initial_e: Option<f64>,
    end_e: Option<f64>,
    lines: Vec<CapturedLine>,
}

#[derive(Debug, Clone, Copy)]
struct Retraction {
    from: f64,
    distance: f64,
    feedrate: f64,
}

/// Replays the layer-0 brim on the following layers.
#[derive(Debug)]
pub struct DuplicateRewriter {
    settings: DuplicateSettings,
    phase: Phase,
    mode: ExtrusionMode,
    capture: Option<BrimCapture>,
    record: Option<BrimRecord>,
    /// Z shift of the next replay.
    offset: f64,
    last_motion: Option<String>,
    last_travel: Option<String>,
    current_x: Option<f64>,
    current_y: Option<f64>,
    current_z: Option<f64>,
    extruder_position: Option<f64>,
    retract_feedrate: f64,
    retraction: Option<Retraction>,
    replays: usize,
}

impl DuplicateRewriter {
    /// Create a rewriter.
    pub fn new(settings: DuplicateSettings) -> Self {
        Self {
            settings,
            phase: Phase::Idle,
            mode: ExtrusionMode::Absolute,
            capture: None,
            record: None,
            offset: 0.0,
            last_motion: None,
            last_travel: None,
            current_x: None,
            current_y: None,
            current_z: None,
            extruder_position: None,
            retract_feedrate: DEFAULT_RETRACT_FEEDRATE,
            retraction: None,
            replays: 0,
        }
    }

    /// Start recording the brim at the skirt marker.
    ///
    /// The brim starts where the nozzle is. When the last move carries both
    /// X and Y it is replayed as is; otherwise (a Z-only move or a bare
    /// retraction) a travel to the last known XY is synthesized and the Z
    /// comes from the current layer height.
    fn begin_capture(&mut self) -> Result<()> {
        let (Some(x), Some(y)) = (self.current_x, self.current_y) else {
            warn!("No XY position before the layer 0 skirt, brim not replayed");
            self.phase = Phase::Idle;
            return Ok(());
        };

        let last = match self.last_motion.as_deref() {
            Some(text) => Some(Line::parse(text)?),
            None => None,
        };
        let direct = last.as_ref().and_then(|line| {
            let m = line.motion()?;
            (m.x.is_some() && m.y.is_some()).then(|| (line.text.to_string(), m.z))
        });
        let (start_text, start_line_z) = direct.unwrap_or_else(|| {
            (format!("G0 X{} Y{}", format_coord(x), format_coord(y)), None)
        });

        let Some(start_z) = start_line_z.or(self.current_z) else {
            warn!(start = %start_text, "No Z height before the layer 0 skirt, brim not replayed");
            self.phase = Phase::Idle;
            return Ok(());
        };

        self.capture = Some(BrimCapture {
            start: CapturedLine {
                text: start_text,
                z: start_line_z,
            },
            start_z,
            lines: Vec::new(),
            hop_z: None,
            e_at_start: self.extruder_position,
            initial_e: None,
            end_e: None,
            reached_xy: false,
        });
        self.phase = Phase::Capturing;
        Ok(())
    }

    fn end_capture(&mut self) {
        if let Some(capture) = self.capture.take() {
            let record = capture.finish();
            debug!(
                lines = record.lines.len(),
                base_z = record.base_z,
                "Captured layer 0 brim"
            );
            self.offset = record.base_z;
            self.record = Some(record);
        }
        self.phase = Phase::Idle;
    }

    fn replay(&mut self, layer: i64, out: &mut BlockWriter) {
        let Some(record) = &self.record else {
            return;
        };
        let absolute = self.mode == ExtrusionMode::Absolute;
        let offset = self.offset;
        let retraction = self.retraction.filter(|_| absolute);

        out.insert(BEGIN_MARKER);
        if let Some(r) = retraction {
            out.insert(extruder_move(r.feedrate, r.from));
        }
        if absolute {
            if let Some(e) = record.initial_e {
                out.insert(set_extruder_position(e));
            }
        }

        match record.start.z {
            Some(z) => out.insert(replace_axis(&record.start.text, Axis::Z, z + offset)),
            None => {
                out.insert(travel_z(record.base_z + offset));
                out.insert(record.start.text.clone());
            }
        }
        for line in &record.lines {
            match line.z {
                Some(z) => out.insert(replace_axis(&line.text, Axis::Z, z + offset)),
                None => out.insert(line.text.clone()),
            }
        }

        if let (Some(r), Some(end_e)) = (retraction, record.end_e) {
            out.insert(extruder_move(r.feedrate, end_e - r.distance));
        }
        if let Some(travel) = &self.last_travel {
            out.insert(travel.clone());
        }
        if let Some(z) = self.current_z {
            out.insert(format!("G1 Z{}", format_coord(z)));
        }
        if absolute {
            if let Some(e) = self.extruder_position {
                out.insert(set_extruder_position(e));
            }
        }
        out.insert(END_MARKER);

        let step = record.base_z;
        debug!(layer, z = step + offset, "Replayed brim");
        self.offset += step;
        self.replays += 1;
    }

    fn track(&mut self, line: &Line<'_>) {
        let Some(m) = line.motion() else {
            return;
        };
        self.last_motion = Some(line.text.to_string());
        if m.x.is_some() {
            self.current_x = m.x;
        }
        if m.y.is_some() {
            self.current_y = m.y;
        }
        if m.rapid && m.x.is_some() && m.y.is_some() {
            self.last_travel = Some(line.text.to_string());
        }
        if let (Some(z), None) = (m.z, m.e) {
            self.current_z = Some(z);
        }
        let Some(e) = m.e else {
            return;
        };
        if self.mode == ExtrusionMode::Relative {
            return;
        }
        if let Some(f) = m.f {
            self.retract_feedrate = f;
        }
        self.retraction = match self.extruder_position {
            Some(prev) if prev - e > Tolerance::GCODE.linear => Some(Retraction {
                from: prev,
                distance: prev - e,
                feedrate: self.retract_feedrate,
            }),
            _ => None,
        };
        self.extruder_position = Some(e);
    }
}

impl BlockRewriter for DuplicateRewriter {
    fn rewrite_line(&mut self, line: &Line<'_>, out: &mut BlockWriter) -> Result<()> {
        if self.phase == Phase::Capturing
            && (line.is_section_change() || matches!(line.kind, LineKind::Layer(_)))
        {
            self.end_capture();
        }

        match line.kind {
            LineKind::ExtrusionMode(mode) => self.mode = mode,
            LineKind::Layer(n) => {
                self.phase = match (n, self.phase) {
                    (0, Phase::Idle) => Phase::AwaitingSkirt,
                    (_, Phase::AwaitingSkirt) => Phase::Idle,
                    (_, phase) => phase,
                };
                out.keep(line.text);
                if n >= 1 && n <= i64::from(self.settings.layers) {
                    self.replay(n, out);
                }
                return Ok(());
            }
            _ if self.phase == Phase::AwaitingSkirt && line.is_skirt() => {
                self.begin_capture()?;
            }
            _ => {}
        }

        if let Some(capture) = &mut self.capture {
            capture.push(line);
        }
        self.track(line);
        out.keep(line.text);
        Ok(())
    }

    fn finish(mut self) -> RewriteReport {
        self.end_capture();
        RewriteReport {
            replays: self.replays,
            ..Default::default()
        }
    }
}
