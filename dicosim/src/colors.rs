//! Similarity-to-color mapping for the web UI.
//!
//! Scores render on the matplotlib *cool* colormap (cyan at 0, magenta
//! at 1) at half opacity, scaled by 0.9 so a perfect match stays readable;
//! negative similarities clamp to the cold end.

/// Returns the CSS color for a similarity score.
#[must_use]
pub fn css_color_string(value: f32) -> String {
    let v = if value > 0.0 { (value * 0.9).min(1.0) } else { 0.0 };
    let red = v * 255.0;
    let green = (1.0 - v) * 255.0;
    let blue = 255.0f32;

    format!("rgba({red:.3}, {green:.3}, {blue:.3}, 0.5)")
}

/// The stylesheet snippet coloring the text-box selection like a perfect
/// match.
#[must_use]
pub fn selection_css() -> String {
    format!(
        "@charset \"UTF-8\";\n\n#textbox::selection {{color:#000000; background-color:{color};}}\n",
        color = css_color_string(1.0)
    )
}

/// The colorbar legend fragment: one labeled swatch per similarity step
/// from -1.0 and 0.0 to 1.0.
#[must_use]
pub fn colorbar_fragment() -> String {
    let mut out = String::new();
    for value in std::iter::once(-10i32).chain(0..=10) {
        let value = value as f32 / 10.0;
        out.push_str(&format!(
            "<span class=\"colorbar-element\" style=\"background-color: {color};\">{value:.1}</span>",
            color = css_color_string(value)
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_scores_clamp_to_the_cold_end() {
        assert_eq!(css_color_string(-0.4), css_color_string(0.0));
        assert_eq!(css_color_string(0.0), "rgba(0.000, 255.000, 255.000, 0.5)");
    }

    #[test]
    fn a_perfect_match_is_near_magenta() {
        assert_eq!(css_color_string(1.0), "rgba(229.500, 25.500, 255.000, 0.5)");
    }

    #[test]
    fn selection_css_colors_the_textbox() {
        let css = selection_css();

        assert!(css.starts_with("@charset \"UTF-8\";"));
        assert!(css.contains("#textbox::selection"));
        assert!(css.contains(&css_color_string(1.0)));
    }

    #[test]
    fn colorbar_has_twelve_swatches() {
        let fragment = colorbar_fragment();

        assert_eq!(fragment.matches("colorbar-element").count(), 12);
        assert!(fragment.contains(">-1.0</span>"));
        assert!(fragment.contains(">1.0</span>"));
    }
}
