//! G-code line tokenizer.
//!
//! Every line is classified once into a [`LineKind`]; the rewriters switch on
//! the variant instead of probing the raw text repeatedly.

use std::fmt;

use tabplus_math::Point2;

use crate::error::{GcodeError, Result};

/// Coordinate letters understood by the rewriters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// X position.
    X,
    /// Y position.
    Y,
    /// Z position.
    Z,
    /// Extruder position.
    E,
    /// Feedrate.
    F,
}

impl Axis {
    /// The letter used for this axis in G-code.
    pub fn letter(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
            Axis::E => 'E',
            Axis::F => 'F',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c {
            'X' => Some(Axis::X),
            'Y' => Some(Axis::Y),
            'Z' => Some(Axis::Z),
            'E' => Some(Axis::E),
            'F' => Some(Axis::F),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Extruder addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtrusionMode {
    /// `M82`: E values are absolute positions.
    #[default]
    Absolute,
    /// `M83`: E values are deltas.
    Relative,
}

/// A `G0`/`G1` move and the axes it carries.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Motion {
    /// `G0` (travel) rather than `G1`.
    pub rapid: bool,
    /// X coordinate.
    pub x: Option<f64>,
    /// Y coordinate.
    pub y: Option<f64>,
    /// Z coordinate.
    pub z: Option<f64>,
    /// Extruder position.
    pub e: Option<f64>,
    /// Feedrate.
    pub f: Option<f64>,
}

impl Motion {
    /// Value of `axis`, if this move carries it.
    pub fn get(&self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            Axis::E => self.e,
            Axis::F => self.f,
        }
    }

    fn set(&mut self, axis: Axis, value: f64) {
        let slot = match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
            Axis::E => &mut self.e,
            Axis::F => &mut self.f,
        };
        *slot = Some(value);
    }

    /// Moves in the XY plane.
    pub fn has_xy(&self) -> bool {
        self.x.is_some() || self.y.is_some()
    }

    /// Pure Z move (no XY, no extrusion): a layer change or Z-hop.
    pub fn is_z_only(&self) -> bool {
        self.z.is_some() && !self.has_xy() && self.e.is_none()
    }
}

/// Classification of a G-code line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    /// `;LAYER:<n>`
    Layer(i64),
    /// `;LAYER_COUNT:<n>`
    LayerCount(usize),
    /// `;TYPE:<name>`
    Type(String),
    /// `;MESH:<name>`
    Mesh(String),
    /// Any other comment line.
    Comment,
    /// `G0` / `G1`
    Motion(Motion),
    /// `M82` / `M83`
    ExtrusionMode(ExtrusionMode),
    /// `T<n>`
    ToolChange(u32),
    /// Anything else, passed through untouched.
    Other,
}

/// A raw line together with its classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Line<'a> {
    /// The line exactly as it appears in the document.
    pub text: &'a str,
    /// What the line is.
    pub kind: LineKind,
}

impl<'a> Line<'a> {
    /// Classify a line.
    ///
    /// Fails only when a coordinate letter is present without a parseable
    /// number.
    pub fn parse(text: &'a str) -> Result<Self> {
        let trimmed = text.trim_end_matches('\r');
        let kind = if let Some(rest) = trimmed.strip_prefix(";LAYER:") {
            rest.trim()
                .parse()
                .map(LineKind::Layer)
                .unwrap_or(LineKind::Comment)
        } else if let Some(rest) = trimmed.strip_prefix(";LAYER_COUNT:") {
            rest.trim()
                .parse()
                .map(LineKind::LayerCount)
                .unwrap_or(LineKind::Comment)
        } else if let Some(rest) = trimmed.strip_prefix(";TYPE") {
            LineKind::Type(rest.strip_prefix(':').unwrap_or(rest).trim().to_string())
        } else if let Some(rest) = trimmed.strip_prefix(";MESH:") {
            LineKind::Mesh(rest.trim().to_string())
        } else if trimmed.starts_with(';') {
            LineKind::Comment
        } else {
            parse_command(trimmed, text)?
        };
        Ok(Self { text, kind })
    }

    /// The move carried by this line, if any.
    pub fn motion(&self) -> Option<&Motion> {
        match &self.kind {
            LineKind::Motion(m) => Some(m),
            _ => None,
        }
    }

    /// `;TYPE:SKIRT` marker (Cura labels both skirt and brim this way).
    pub fn is_skirt(&self) -> bool {
        matches!(&self.kind, LineKind::Type(name) if name.starts_with("SKIRT"))
    }

    /// A `;TYPE` or `;MESH:` marker, which ends the current print section.
    pub fn is_section_change(&self) -> bool {
        matches!(self.kind, LineKind::Type(_) | LineKind::Mesh(_))
    }

    /// Extract both X and Y, failing if either is absent.
    pub fn xy(&self) -> Result<Point2> {
        let motion = self.motion();
        let x = motion.and_then(|m| m.x).ok_or_else(|| GcodeError::MissingAxis {
            axis: Axis::X,
            text: self.text.to_string(),
        })?;
        let y = motion.and_then(|m| m.y).ok_or_else(|| GcodeError::MissingAxis {
            axis: Axis::Y,
            text: self.text.to_string(),
        })?;
        Ok(Point2::new(x, y))
    }

    /// The line text with `axis` rewritten to `value`; unchanged if absent.
    pub fn with_axis(&self, axis: Axis, value: f64) -> String {
        replace_axis(self.text, axis, value)
    }
}

fn parse_command(code_line: &str, text: &str) -> Result<LineKind> {
    let code = code_line.split(';').next().unwrap_or("");
    let mut words = code.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(LineKind::Other);
    };

    let kind = match command {
        "G0" | "G00" | "G1" | "G01" => {
            let mut motion = Motion {
                rapid: command.ends_with('0'),
                ..Default::default()
            };
            for word in words {
                let mut chars = word.chars();
                let Some(axis) = chars.next().and_then(Axis::from_letter) else {
                    continue;
                };
                let value = chars
                    .as_str()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| GcodeError::MalformedCoordinate {
                        axis,
                        text: text.to_string(),
                    })?;
                motion.set(axis, value);
            }
            LineKind::Motion(motion)
        }
        "M82" => LineKind::ExtrusionMode(ExtrusionMode::Absolute),
        "M83" => LineKind::ExtrusionMode(ExtrusionMode::Relative),
        t if t.starts_with('T') => t[1..]
            .parse()
            .map(LineKind::ToolChange)
            .unwrap_or(LineKind::Other),
        _ => LineKind::Other,
    };
    Ok(kind)
}

/// Rewrite the first `axis` word of a line, keeping spacing, comment and
/// a trailing `\r`.
pub fn replace_axis(text: &str, axis: Axis, value: f64) -> String {
    let (body, ending) = match text.strip_suffix('\r') {
        Some(body) => (body, "\r"),
        None => (text, ""),
    };
    let code_end = body.find(';').unwrap_or(body.len());
    let (code, comment) = body.split_at(code_end);
    let mut out = String::with_capacity(text.len() + 4);
    let mut replaced = false;
    for (i, piece) in code.split(' ').enumerate() {
        if i > 0 {
            out.push(' ');
        }
        if i > 0 && !replaced && piece.starts_with(axis.letter()) {
            out.push(axis.letter());
            out.push_str(&format_coord(value));
            replaced = true;
        } else {
            out.push_str(piece);
        }
    }
    out.push_str(comment);
    out.push_str(ending);
    out
}

/// Format a coordinate rounded to 5 decimals, trailing zeros trimmed,
/// keeping at least one fractional digit (`0.4`, `1.0`).
pub fn format_coord(value: f64) -> String {
    let mut s = format!("{value:.5}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.push('0');
    }
    if s == "-0.0" {
        s.remove(0);
    }
    s
}

/// Format a feedrate, dropping the fraction when it is integral.
pub fn format_feedrate(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format_coord(value)
    }
}

/// `G92 E<value>`: set the extruder's absolute position.
pub fn set_extruder_position(e: f64) -> String {
    format!("G92 E{}", format_coord(e))
}

/// `G1 F<feedrate> E<value>`: extruder-only move.
pub fn extruder_move(feedrate: f64, e: f64) -> String {
    format!("G1 F{} E{}", format_feedrate(feedrate), format_coord(e))
}

/// `G0 Z<value>`: travel to a height.
pub fn travel_z(z: f64) -> String {
    format!("G0 Z{}", format_coord(z))
}

/// `M221 S<percent>`: flow percentage.
pub fn flow_percent(percent: u32) -> String {
    format!("M221 S{percent}")
}

/// `M117 <text>`: printer display message.
pub fn display_message(text: &str) -> String {
    format!("M117 {text}")
}
