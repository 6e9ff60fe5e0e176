use checkpoint_shared::colors::{DEFAULT_COLOR, normalize_name, palette_color};
use dashmap::DashMap;

/// Memoized name → color assignment. One instance per application; tests build their own.
#[derive(Debug, Default)]
pub struct LocationColors {
    memo: DashMap<String, &'static str>,
}

impl LocationColors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color_for(&self, name: Option<&str>) -> &'static str {
        let Some(key) = name.map(normalize_name).filter(|key| !key.is_empty()) else {
            return DEFAULT_COLOR;
        };
        if let Some(color) = self.memo.get(&key) {
            return *color;
        }
        let color = palette_color(&key);
        self.memo.insert(key, color);
        color
    }

    /// County color when known, else city color, else gray.
    pub fn checkpoint_color(&self, county: Option<&str>, city: Option<&str>) -> &'static str {
        match (non_blank(county), non_blank(city)) {
            (Some(county), _) => self.color_for(Some(county)),
            (None, Some(city)) => self.color_for(Some(city)),
            (None, None) => DEFAULT_COLOR,
        }
    }

    pub fn memoized(&self) -> usize {
        self.memo.len()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use checkpoint_shared::colors::{DEFAULT_COLOR, palette_color};

    use super::LocationColors;

    #[test]
    fn case_and_whitespace_variants_share_one_memo_entry() {
        let colors = LocationColors::new();
        let a = colors.color_for(Some("Fresno"));
        let b = colors.color_for(Some(" fresno "));
        let c = colors.color_for(Some("FRESNO"));
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(colors.memoized(), 1);
    }

    #[test]
    fn missing_names_are_gray_and_not_memoized() {
        let colors = LocationColors::new();
        assert_eq!(colors.color_for(None), DEFAULT_COLOR);
        assert_eq!(colors.color_for(Some("  ")), DEFAULT_COLOR);
        assert_eq!(colors.memoized(), 0);
    }

    #[test]
    fn checkpoint_color_prefers_county_then_city() {
        let colors = LocationColors::new();
        assert_eq!(
            colors.checkpoint_color(Some("Alameda"), Some("Pleasanton")),
            palette_color("Alameda")
        );
        assert_eq!(
            colors.checkpoint_color(Some(" "), Some("Pleasanton")),
            palette_color("Pleasanton")
        );
        assert_eq!(colors.checkpoint_color(None, None), DEFAULT_COLOR);
        assert_eq!(colors.checkpoint_color(Some(""), Some("\t")), DEFAULT_COLOR);
    }
}
