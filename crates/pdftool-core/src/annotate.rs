//! Draw overlay marks into page content streams
//!
//! Marks are flattened into the page: once applied they are ordinary drawing
//! operators appended after the original content, not annotation objects.
//! Page geometry is never touched.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object};
use serde::{Deserialize, Serialize};

use crate::document::Page;
use crate::error::PdfToolError;
use crate::fonts::{encode_win_ansi, helvetica_text_width, standard_font, HELVETICA_CAP_HEIGHT};

pub const WATERMARK_FONT_SIZE: f32 = 50.0;
pub const WATERMARK_COLOR: Color = Color::rgb(0.7, 0.7, 0.7);
pub const WATERMARK_ANGLE_DEGREES: f32 = 45.0;

/// Fill opacity of highlight marks
pub const HIGHLIGHT_OPACITY: f32 = 0.4;

const LINE_SPACING: f32 = 1.2;
const ARROW_HEAD_ANGLE: f32 = std::f32::consts::PI / 6.0;
/// Bézier control distance for a quarter circle
const KAPPA: f32 = 0.552_284_8;

/// RGB color with components in 0..=1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const YELLOW: Color = Color::rgb(1.0, 1.0, 0.0);
    pub const PURPLE: Color = Color::rgb(128.0 / 255.0, 0.0, 128.0 / 255.0);
    pub const ORANGE: Color = Color::rgb(1.0, 165.0 / 255.0, 0.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parse "#RRGGBB" (the leading '#' is optional)
    pub fn from_hex(color: &str) -> Option<Self> {
        let hex = color.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::rgb(
            channel(0)? as f32 / 255.0,
            channel(2)? as f32 / 255.0,
            channel(4)? as f32 / 255.0,
        ))
    }

    fn clamped(self) -> [f32; 3] {
        [self.r, self.g, self.b].map(|c| c.clamp(0.0, 1.0))
    }
}

/// A point in default user space (origin at the page's lower-left)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An overlay mark, drawn relative to the position it is applied at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Annotation {
    /// Text whose first baseline starts at the position; '\n' starts a new line
    Text {
        text: String,
        font_size: f32,
        color: Color,
        #[serde(default)]
        font: Option<String>,
    },
    /// Translucent filled box with its lower-left corner at the position
    Highlight { width: f32, height: f32, color: Color },
    /// Free-hand polyline; points are offsets from the position
    Draw {
        path: Vec<Point>,
        stroke_width: f32,
        color: Color,
    },
    Rectangle {
        width: f32,
        height: f32,
        stroke_width: f32,
        color: Color,
    },
    /// Circle centred on the position
    Circle {
        radius: f32,
        stroke_width: f32,
        color: Color,
    },
    /// Arrow from the position to the position offset by (dx, dy)
    Arrow {
        dx: f32,
        dy: f32,
        stroke_width: f32,
        color: Color,
    },
}

impl Annotation {
    pub fn color(&self) -> Color {
        match self {
            Annotation::Text { color, .. }
            | Annotation::Highlight { color, .. }
            | Annotation::Draw { color, .. }
            | Annotation::Rectangle { color, .. }
            | Annotation::Circle { color, .. }
            | Annotation::Arrow { color, .. } => *color,
        }
    }
}

/// Append `annotation`, drawn at `at`, to the page's content
pub fn apply_annotation(
    page: &mut Page,
    annotation: &Annotation,
    at: Point,
) -> Result<(), PdfToolError> {
    let mut ops = vec![op("q", vec![])];

    match annotation {
        Annotation::Text {
            text,
            font_size,
            color,
            font,
        } => {
            let base_font = standard_font(font.as_deref(), false, false);
            let font_name = register_font(page, base_font);
            ops.push(op("BT", vec![]));
            ops.push(op("Tf", vec![name(&font_name), real(*font_size)]));
            ops.push(fill_color(*color));
            ops.push(op("TL", vec![real(font_size * LINE_SPACING)]));
            ops.push(op("Td", vec![real(at.x), real(at.y)]));
            for (i, line) in text.split('\n').enumerate() {
                if i > 0 {
                    ops.push(op("T*", vec![]));
                }
                ops.push(op("Tj", vec![literal(line)]));
            }
            ops.push(op("ET", vec![]));
        }
        Annotation::Highlight {
            width,
            height,
            color,
        } => {
            let state = register_opacity(page, HIGHLIGHT_OPACITY);
            ops.push(op("gs", vec![name(&state)]));
            ops.push(fill_color(*color));
            ops.push(op(
                "re",
                vec![real(at.x), real(at.y), real(*width), real(*height)],
            ));
            ops.push(op("f", vec![]));
        }
        Annotation::Draw {
            path,
            stroke_width,
            color,
        } => {
            let Some((first, rest)) = path.split_first() else {
                return Ok(());
            };
            ops.extend(stroke_style(*stroke_width, *color));
            ops.push(op("J", vec![Object::Integer(1)]));
            ops.push(op("j", vec![Object::Integer(1)]));
            ops.push(op("m", coords(at.x + first.x, at.y + first.y)));
            if rest.is_empty() {
                // A single click still leaves a dot
                ops.push(op("l", coords(at.x + first.x, at.y + first.y)));
            }
            for point in rest {
                ops.push(op("l", coords(at.x + point.x, at.y + point.y)));
            }
            ops.push(op("S", vec![]));
        }
        Annotation::Rectangle {
            width,
            height,
            stroke_width,
            color,
        } => {
            ops.extend(stroke_style(*stroke_width, *color));
            ops.push(op(
                "re",
                vec![real(at.x), real(at.y), real(*width), real(*height)],
            ));
            ops.push(op("S", vec![]));
        }
        Annotation::Circle {
            radius,
            stroke_width,
            color,
        } => {
            ops.extend(stroke_style(*stroke_width, *color));
            ops.extend(circle_path(at, *radius));
            ops.push(op("S", vec![]));
        }
        Annotation::Arrow {
            dx,
            dy,
            stroke_width,
            color,
        } => {
            let tip = Point::new(at.x + dx, at.y + dy);
            ops.extend(stroke_style(*stroke_width, *color));
            ops.push(op("J", vec![Object::Integer(1)]));
            ops.push(op("m", coords(at.x, at.y)));
            ops.push(op("l", coords(tip.x, tip.y)));

            if *dx != 0.0 || *dy != 0.0 {
                let angle = dy.atan2(*dx);
                let head = (3.0 * stroke_width).max(10.0);
                for side in [-ARROW_HEAD_ANGLE, ARROW_HEAD_ANGLE] {
                    ops.push(op("m", coords(tip.x, tip.y)));
                    ops.push(op(
                        "l",
                        coords(
                            tip.x - head * (angle + side).cos(),
                            tip.y - head * (angle + side).sin(),
                        ),
                    ));
                }
            }
            ops.push(op("S", vec![]));
        }
    }

    ops.push(op("Q", vec![]));
    append_operations(page, ops)
}

/// Reject blank watermark text
pub fn check_watermark_text(text: &str) -> Result<(), PdfToolError> {
    if text.trim().is_empty() {
        return Err(PdfToolError::EmptyWatermark);
    }
    Ok(())
}

/// Stamp `text` diagonally across the centre of the page
pub fn watermark_page(page: &mut Page, text: &str) -> Result<(), PdfToolError> {
    check_watermark_text(text)?;

    let font_name = register_font(page, "Helvetica");
    let (cx, cy) = page.midpoint();
    let width = helvetica_text_width(text, WATERMARK_FONT_SIZE);
    let height = HELVETICA_CAP_HEIGHT * WATERMARK_FONT_SIZE / 1000.0;

    // Rotate about the text's own centre so that centre lands on the midpoint
    let (sin, cos) = WATERMARK_ANGLE_DEGREES.to_radians().sin_cos();
    let e = cx - (cos * width / 2.0 - sin * height / 2.0);
    let f = cy - (sin * width / 2.0 + cos * height / 2.0);

    let ops = vec![
        op("q", vec![]),
        op("BT", vec![]),
        op("Tf", vec![name(&font_name), real(WATERMARK_FONT_SIZE)]),
        fill_color(WATERMARK_COLOR),
        op(
            "Tm",
            vec![real(cos), real(sin), real(-sin), real(cos), real(e), real(f)],
        ),
        op("Tj", vec![literal(text)]),
        op("ET", vec![]),
        op("Q", vec![]),
    ];
    append_operations(page, ops)
}

fn append_operations(page: &mut Page, operations: Vec<Operation>) -> Result<(), PdfToolError> {
    let encoded = Content { operations }
        .encode()
        .map_err(|e| PdfToolError::SerializationFailure(e.to_string()))?;

    if !page.isolated {
        if !page.content.is_empty() {
            let mut wrapped = Vec::with_capacity(page.content.len() + 6);
            wrapped.extend_from_slice(b"q\n");
            wrapped.append(&mut page.content);
            wrapped.extend_from_slice(b"\nQ\n");
            page.content = wrapped;
        }
        page.isolated = true;
    }

    if !page.content.is_empty() && !page.content.ends_with(b"\n") {
        page.content.push(b'\n');
    }
    page.content.extend_from_slice(&encoded);
    Ok(())
}

/// Pull a resource category out as a direct dictionary the page owns
fn take_category(page: &mut Page, category: &[u8]) -> Dictionary {
    match page.resources.remove(category) {
        Some(Object::Dictionary(dict)) => dict,
        Some(Object::Reference(id)) => page
            .arena
            .get(id)
            .and_then(|obj| obj.as_dict().ok())
            .cloned()
            .unwrap_or_else(Dictionary::new),
        _ => Dictionary::new(),
    }
}

/// Add `value` under a fresh name, or reuse an entry `matches` accepts
fn register_resource(
    page: &mut Page,
    category: &[u8],
    prefix: &str,
    value: Object,
    matches: impl Fn(&Object) -> bool,
) -> String {
    let mut dict = take_category(page, category);

    let existing = dict
        .iter()
        .find(|(_, obj)| matches(obj))
        .map(|(key, _)| String::from_utf8_lossy(key).into_owned());

    let resource_name = match existing {
        Some(found) => found,
        None => {
            let fresh = (1..)
                .map(|n| format!("{}{}", prefix, n))
                .find(|candidate| !dict.has(candidate.as_bytes()))
                .unwrap_or_else(|| prefix.to_string());
            dict.set(fresh.as_bytes().to_vec(), value);
            fresh
        }
    };

    page.resources.set(category.to_vec(), Object::Dictionary(dict));
    resource_name
}

fn register_font(page: &mut Page, base_font: &'static str) -> String {
    // Symbol and ZapfDingbats only work with their built-in encoding
    let symbolic = matches!(base_font, "Symbol" | "ZapfDingbats");
    let mut font = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
    };
    if !symbolic {
        font.set("Encoding", "WinAnsiEncoding");
    }
    register_resource(page, b"Font", "PtF", Object::Dictionary(font), |obj| {
        obj.as_dict()
            .map(|d| {
                matches!(d.get(b"BaseFont"), Ok(Object::Name(b)) if b == base_font.as_bytes())
                    && d.has(b"Encoding") != symbolic
            })
            .unwrap_or(false)
    })
}

fn register_opacity(page: &mut Page, opacity: f32) -> String {
    let state = dictionary! {
        "Type" => "ExtGState",
        "ca" => Object::Real(opacity),
        "CA" => Object::Real(opacity),
    };
    register_resource(page, b"ExtGState", "PtGS", Object::Dictionary(state), |obj| {
        matches!(
            obj.as_dict().ok().and_then(|d| d.get(b"ca").ok()),
            Some(Object::Real(ca)) if (*ca - opacity).abs() < f32::EPSILON
        )
    })
}

fn circle_path(center: Point, radius: f32) -> Vec<Operation> {
    let (x, y, r) = (center.x, center.y, radius);
    let k = KAPPA * r;
    vec![
        op("m", coords(x + r, y)),
        op("c", curve([x + r, y + k, x + k, y + r, x, y + r])),
        op("c", curve([x - k, y + r, x - r, y + k, x - r, y])),
        op("c", curve([x - r, y - k, x - k, y - r, x, y - r])),
        op("c", curve([x + k, y - r, x + r, y - k, x + r, y])),
        op("h", vec![]),
    ]
}

fn stroke_style(width: f32, color: Color) -> [Operation; 2] {
    let [r, g, b] = color.clamped();
    [
        op("w", vec![real(width.max(0.0))]),
        op("RG", vec![real(r), real(g), real(b)]),
    ]
}

fn fill_color(color: Color) -> Operation {
    let [r, g, b] = color.clamped();
    op("rg", vec![real(r), real(g), real(b)])
}

fn op(operator: &str, operands: Vec<Object>) -> Operation {
    Operation::new(operator, operands)
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

fn literal(text: &str) -> Object {
    Object::String(encode_win_ansi(text), lopdf::StringFormat::Literal)
}

fn coords(x: f32, y: f32) -> Vec<Object> {
    vec![real(x), real(y)]
}

fn curve(values: [f32; 6]) -> Vec<Object> {
    values.into_iter().map(real).collect()
}
