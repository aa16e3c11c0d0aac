//! Standard 14 font selection and Helvetica metrics

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A..M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N..Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a..m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n..z
    334, 260, 334, 584, // {..~
];

const HELVETICA_DEFAULT_WIDTH: u16 = 556;

/// Helvetica cap height in 1/1000 em
pub const HELVETICA_CAP_HEIGHT: f32 = 718.0;

/// Width of `text` set in Helvetica at `size` points
pub fn helvetica_text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c as u32 {
            code @ 32..=126 => HELVETICA_WIDTHS[(code - 32) as usize] as u32,
            _ => HELVETICA_DEFAULT_WIDTH as u32,
        })
        .sum();
    units as f32 * size / 1000.0
}

/// Map a font family name (CSS generic or concrete) to a standard 14 font
pub fn standard_font(family: Option<&str>, bold: bool, italic: bool) -> &'static str {
    let base = family.map(font_family_base).unwrap_or("Helvetica");

    match base {
        "Times-Roman" => match (bold, italic) {
            (true, true) => "Times-BoldItalic",
            (true, false) => "Times-Bold",
            (false, true) => "Times-Italic",
            (false, false) => "Times-Roman",
        },
        "Courier" => match (bold, italic) {
            (true, true) => "Courier-BoldOblique",
            (true, false) => "Courier-Bold",
            (false, true) => "Courier-Oblique",
            (false, false) => "Courier",
        },
        "Helvetica" => match (bold, italic) {
            (true, true) => "Helvetica-BoldOblique",
            (true, false) => "Helvetica-Bold",
            (false, true) => "Helvetica-Oblique",
            (false, false) => "Helvetica",
        },
        other => other,
    }
}

fn font_family_base(name: &str) -> &'static str {
    let lower = name.to_lowercase();

    match lower.as_str() {
        "serif" => return "Times-Roman",
        "sans-serif" | "cursive" | "fantasy" => return "Helvetica",
        "monospace" => return "Courier",
        _ => {}
    }

    if lower.contains("symbol") {
        return "Symbol";
    }
    if lower.contains("zapf") || lower.contains("dingbat") {
        return "ZapfDingbats";
    }
    if lower.contains("times") || lower.contains("georgia") || lower.contains("garamond") {
        return "Times-Roman";
    }
    if ["courier", "mono", "consolas", "monaco"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        return "Courier";
    }

    "Helvetica"
}

/// Encode text for a WinAnsi-encoded simple font; unmappable characters become '?'
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ 0x20..=0x7E => code as u8,
            code @ 0xA0..=0xFF => code as u8,
            0x20AC => 0x80,
            0x2018 => 0x91,
            0x2019 => 0x92,
            0x201C => 0x93,
            0x201D => 0x94,
            0x2022 => 0x95,
            0x2013 => 0x96,
            0x2014 => 0x97,
            _ => b'?',
        })
        .collect()
}
