/// Marker color for records without a usable location name.
pub const DEFAULT_COLOR: &str = "#6B7280";

/// Ordered palette indexed by the location-name hash. Order is part of the
/// contract: reordering changes every assigned color.
pub const PALETTE: [&str; 24] = [
    "#DC2626", // red
    "#E86C2C", // orange
    "#F59E0B", // amber
    "#84CC16", // lime
    "#22C55E", // green
    "#059669", // emerald
    "#14B8A6", // teal
    "#0891B2", // cyan
    "#0EA5E9", // sky
    "#2563EB", // blue
    "#4F46E5", // indigo
    "#7C3AED", // violet
    "#9333EA", // purple
    "#C026D3", // fuchsia
    "#EC4899", // pink
    "#F43F5E", // rose
    "#BE185D", // deep pink
    "#CA8A04", // yellow
    "#65A30D", // light green
    "#0D9488", // dark teal
    "#1D4ED8", // dark blue
    "#6D28D9", // dark purple
    "#DB2777", // magenta
    "#EA580C", // deep orange
];

/// Trimmed, lowercased form used for every name-keyed lookup.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Rolling `hash * 31 + unit` over UTF-16 code units, wrapped to i32.
pub fn name_hash(normalized: &str) -> i32 {
    normalized
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Deterministic palette color for a location name. Collisions are expected.
pub fn palette_color(name: &str) -> &'static str {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return DEFAULT_COLOR;
    }
    let index = i64::from(name_hash(&normalized)).unsigned_abs() % PALETTE.len() as u64;
    PALETTE[index as usize]
}

pub fn parse_hex_color(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

/// Format RGBA as a CSS color string.
pub fn rgba_css(r: u8, g: u8, b: u8, a: f64) -> String {
    format!("rgba({r}, {g}, {b}, {a})")
}

/// Translucent fill derived from a hex color; unparsable input falls back to the default gray.
pub fn hex_to_rgba(hex: &str, alpha: f64) -> String {
    let (r, g, b) = parse_hex_color(hex)
        .or_else(|| parse_hex_color(DEFAULT_COLOR))
        .unwrap_or((107, 114, 128));
    rgba_css(r, g, b, alpha)
}
