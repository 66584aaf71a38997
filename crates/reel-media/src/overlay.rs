//! Text overlay rasterization.
//!
//! The overlay is a transparent portrait-sized PNG carrying the wrapped text
//! block: white glyphs over a black round-joined outline. Layout (wrapping
//! and vertical placement) is independent of the rasterizer and goes through
//! [`TextMeasure`], so it can be checked without any fonts installed.

use std::fmt::Write as _;
use std::io::Cursor;
use std::sync::Arc;

use resvg::tiny_skia;
use tracing::{debug, warn};
use usvg::fontdb;

use reel_models::{TextOverlayConfig, TextSize, TARGET_HEIGHT, TARGET_WIDTH};

use crate::error::{MediaError, MediaResult};

/// Fraction of the canvas width a wrapped line may occupy.
pub const MAX_LINE_WIDTH_RATIO: f32 = 0.8;

const FONT_FAMILY: &str = "sans-serif";

/// Measures the rendered width of a single line of text.
pub trait TextMeasure {
    fn measure(&self, text: &str, size: TextSize) -> f32;
}

/// Produces the overlay image for a text config.
pub trait OverlayRasterizer: Send + Sync {
    /// PNG bytes of the full-canvas overlay, or `None` when there is no text.
    fn render(&self, config: &TextOverlayConfig) -> MediaResult<Option<Vec<u8>>>;
}

/// Greedy word wrap.
///
/// Words are joined with single spaces; a line is closed as soon as the next
/// word would push it past `max_width`. A single word wider than the limit
/// stays whole on its own line.
pub fn wrap_lines<M: TextMeasure + ?Sized>(
    text: &str,
    size: TextSize,
    max_width: f32,
    measurer: &M,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }

        let candidate = format!("{} {}", current, word);
        if measurer.measure(&candidate, size) > max_width {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

/// One wrapped line and the y coordinate of its vertical center.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutLine {
    pub text: String,
    pub center_y: f32,
}

/// Positioned text block on the overlay canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLayout {
    pub lines: Vec<LayoutLine>,
    pub size: TextSize,
    pub line_height: f32,
    /// Y coordinate the block is centered on
    pub anchor_y: f32,
    /// Top edge of the block
    pub block_top: f32,
}

impl OverlayLayout {
    pub fn block_height(&self) -> f32 {
        self.lines.len() as f32 * self.line_height
    }

    /// Vertical center of the block, derived from its lines.
    pub fn block_center(&self) -> f32 {
        self.block_top + self.block_height() / 2.0
    }
}

/// Wrap and position the overlay text. Returns `None` when there is nothing to draw.
pub fn layout_overlay<M: TextMeasure + ?Sized>(
    config: &TextOverlayConfig,
    measurer: &M,
) -> Option<OverlayLayout> {
    if config.is_empty() {
        return None;
    }

    let max_width = TARGET_WIDTH as f32 * MAX_LINE_WIDTH_RATIO;
    let wrapped = wrap_lines(&config.content, config.size, max_width, measurer);
    if wrapped.is_empty() {
        return None;
    }

    let line_height = config.size.line_height();
    let anchor_y = config.position.anchor_y(TARGET_HEIGHT);
    let block_top = anchor_y - wrapped.len() as f32 * line_height / 2.0;

    let lines = wrapped
        .into_iter()
        .enumerate()
        .map(|(i, text)| LayoutLine {
            text,
            center_y: block_top + (i as f32 + 0.5) * line_height,
        })
        .collect();

    Some(OverlayLayout {
        lines,
        size: config.size,
        line_height,
        anchor_y,
        block_top,
    })
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn text_attributes(size: TextSize) -> String {
    format!(
        r#"font-family="{}" font-size="{}" font-weight="{}""#,
        FONT_FAMILY,
        size.font_px(),
        size.font_weight()
    )
}

/// SVG document for a laid-out overlay.
pub fn overlay_svg(layout: &OverlayLayout) -> String {
    let size = layout.size;
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = TARGET_WIDTH,
        h = TARGET_HEIGHT
    );

    for line in &layout.lines {
        // Stroke is painted first so the outline sits under the fill
        let _ = write!(
            svg,
            r##"<text x="{x}" y="{y:.2}" {attrs} text-anchor="middle" dominant-baseline="central" fill="#ffffff" stroke="#000000" stroke-width="{stroke}" stroke-linejoin="round" paint-order="stroke">{text}</text>"##,
            x = TARGET_WIDTH as f32 / 2.0,
            y = line.center_y,
            attrs = text_attributes(size),
            stroke = size.stroke_px(),
            text = escape_xml(&line.text),
        );
    }

    svg.push_str("</svg>");
    svg
}

/// Rasterizes overlay text with `resvg` using the system font database.
#[derive(Clone)]
pub struct OverlayRenderer {
    fontdb: Arc<fontdb::Database>,
    sans_family: Option<String>,
}

impl std::fmt::Debug for OverlayRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRenderer")
            .field("font_faces", &self.font_count())
            .field("sans_family", &self.sans_family)
            .finish()
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayRenderer {
    /// Renderer backed by the fonts installed on this system.
    pub fn new() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        debug!(faces = db.len(), "Loaded system fonts for overlay rendering");
        Self::with_fontdb(db)
    }

    /// Renderer backed by an explicit font database.
    ///
    /// The generic `sans-serif` family is pointed at an installed face when
    /// the database default (Arial) is missing.
    pub fn with_fontdb(mut db: fontdb::Database) -> Self {
        let sans_family = resolve_sans_serif(&mut db);
        match &sans_family {
            Some(family) => debug!(family = %family, "Overlay sans-serif family"),
            None if !db.is_empty() => warn!("No installed face resolves for sans-serif"),
            None => {}
        }
        Self {
            fontdb: Arc::new(db),
            sans_family,
        }
    }

    pub fn font_count(&self) -> usize {
        self.fontdb.len()
    }

    /// Family used for `sans-serif` text, if any face resolves.
    pub fn sans_family(&self) -> Option<&str> {
        self.sans_family.as_deref()
    }

    fn options(&self) -> usvg::Options<'static> {
        usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..Default::default()
        }
    }

    fn parse(&self, svg: &str) -> MediaResult<usvg::Tree> {
        usvg::Tree::from_str(svg, &self.options())
            .map_err(|e| MediaError::overlay_render(format!("invalid overlay svg: {}", e)))
    }

    /// Render the overlay as PNG bytes, or `None` when the text is empty.
    pub fn render_png(&self, config: &TextOverlayConfig) -> MediaResult<Option<Vec<u8>>> {
        if config.is_empty() {
            return Ok(None);
        }
        if self.font_count() == 0 {
            return Err(MediaError::overlay_render("no fonts available"));
        }
        if self.sans_family.is_none() {
            return Err(MediaError::overlay_render(
                "no installed font face resolves for sans-serif",
            ));
        }

        let Some(layout) = layout_overlay(config, self) else {
            return Ok(None);
        };

        debug!(
            lines = layout.lines.len(),
            size = %config.size,
            position = %config.position,
            "Rendering text overlay"
        );

        let tree = self.parse(&overlay_svg(&layout))?;
        // usvg drops text nodes it cannot shape
        if !tree.root().has_children() {
            return Err(MediaError::overlay_render("overlay text produced no glyphs"));
        }
        let png = rasterize_png(&tree)?;
        Ok(Some(png))
    }
}

impl OverlayRasterizer for OverlayRenderer {
    fn render(&self, config: &TextOverlayConfig) -> MediaResult<Option<Vec<u8>>> {
        self.render_png(config)
    }
}

impl TextMeasure for OverlayRenderer {
    fn measure(&self, text: &str, size: TextSize) -> f32 {
        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}"><text x="0" y="{y}" {attrs}>{text}</text></svg>"#,
            w = TARGET_WIDTH,
            h = TARGET_HEIGHT,
            y = size.font_px(),
            attrs = text_attributes(size),
            text = escape_xml(text),
        );

        match self.parse(&svg) {
            Ok(tree) if tree.root().has_children() => tree.root().abs_bounding_box().width(),
            Ok(_) => 0.0,
            Err(e) => {
                warn!(error = %e, "Failed to measure overlay text");
                0.0
            }
        }
    }
}

/// Common sans faces, tried in order when `sans-serif` does not resolve.
const SANS_CANDIDATES: &[&str] = &[
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "Helvetica",
    "FreeSans",
    "Cantarell",
    "Roboto",
];

fn resolves_sans_serif(db: &fontdb::Database) -> bool {
    db.query(&fontdb::Query {
        families: &[fontdb::Family::SansSerif],
        ..Default::default()
    })
    .is_some()
}

fn installed_family(db: &fontdb::Database, family: &str) -> bool {
    db.faces()
        .any(|face| face.families.iter().any(|(name, _)| name == family))
}

/// Map the generic sans-serif family to an installed face and return it.
fn resolve_sans_serif(db: &mut fontdb::Database) -> Option<String> {
    if resolves_sans_serif(db) {
        return Some(db.family_name(&fontdb::Family::SansSerif).to_string());
    }

    let installed: &fontdb::Database = db;
    let family = SANS_CANDIDATES
        .iter()
        .find(|name| installed_family(installed, name))
        .map(|name| name.to_string())
        .or_else(|| {
            installed
                .faces()
                .find_map(|face| face.families.first().map(|(name, _)| name.clone()))
        })?;

    db.set_sans_serif_family(family.clone());
    resolves_sans_serif(db).then_some(family)
}

fn rasterize_png(tree: &usvg::Tree) -> MediaResult<Vec<u8>> {
    let mut pixmap = tiny_skia::Pixmap::new(TARGET_WIDTH, TARGET_HEIGHT)
        .ok_or_else(|| MediaError::overlay_render("failed to allocate overlay pixmap"))?;
    resvg::render(tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha; PNG expects straight alpha
    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    let image = image::RgbaImage::from_raw(TARGET_WIDTH, TARGET_HEIGHT, rgba)
        .ok_or_else(|| MediaError::overlay_render("overlay buffer size mismatch"))?;

    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, image::ImageFormat::Png)?;
    Ok(png.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::TextPosition;

    /// Every character is half an em wide.
    struct FixedWidth;

    impl TextMeasure for FixedWidth {
        fn measure(&self, text: &str, size: TextSize) -> f32 {
            text.chars().count() as f32 * size.font_px() as f32 * 0.5
        }
    }

    const SIZES: [TextSize; 4] = [
        TextSize::Small,
        TextSize::Medium,
        TextSize::Large,
        TextSize::ExtraLarge,
    ];

    #[test]
    fn test_short_text_single_line() {
        let lines = wrap_lines("Hello World", TextSize::Large, 864.0, &FixedWidth);
        assert_eq!(lines, vec!["Hello World"]);
    }

    #[test]
    fn test_wrapped_lines_fit_width() {
        let text = "the quick brown fox jumps over the lazy dog while the encoder keeps \
                    running through every background clip in the batch";
        let max_width = TARGET_WIDTH as f32 * MAX_LINE_WIDTH_RATIO;

        for size in SIZES {
            let lines = wrap_lines(text, size, max_width, &FixedWidth);
            assert!(lines.len() > 1);
            for line in &lines {
                let fits = FixedWidth.measure(line, size) <= max_width;
                assert!(fits || !line.contains(' '), "line too wide: {line:?}");
            }
            assert_eq!(lines.join(" "), text.split_whitespace().collect::<Vec<_>>().join(" "));
        }
    }

    #[test]
    fn test_long_word_kept_whole() {
        let word = "supercalifragilisticexpialidocious-and-then-some";
        let lines = wrap_lines(&format!("a {} b", word), TextSize::ExtraLarge, 864.0, &FixedWidth);
        assert_eq!(lines, vec!["a", word, "b"]);
    }

    #[test]
    fn test_collapses_whitespace() {
        let lines = wrap_lines("  Hello \n  World  ", TextSize::Small, 864.0, &FixedWidth);
        assert_eq!(lines, vec!["Hello World"]);
    }

    #[test]
    fn test_anchor_invariant() {
        let positions = [
            (TextPosition::Top, 200.0),
            (TextPosition::Middle, 960.0),
            (TextPosition::Bottom, 1720.0),
        ];

        for (position, anchor) in positions {
            for size in SIZES {
                for n in 1..=6 {
                    // Each word fills most of a line, so n words give n lines
                    let word = "w".repeat((1500 / size.font_px()) as usize);
                    let content = vec![word; n].join(" ");
                    let config = TextOverlayConfig::new(content, position, size);

                    let layout = layout_overlay(&config, &FixedWidth).unwrap();
                    assert_eq!(layout.lines.len(), n);
                    assert!((layout.block_center() - anchor).abs() < 1e-3);

                    let first = layout.lines.first().unwrap().center_y;
                    let last = layout.lines.last().unwrap().center_y;
                    assert!(((first + last) / 2.0 - anchor).abs() < 1e-3);
                }
            }
        }
    }

    #[test]
    fn test_line_spacing() {
        let config = TextOverlayConfig::new(
            "one two three four five six seven eight nine ten eleven twelve",
            TextPosition::Middle,
            TextSize::ExtraLarge,
        );
        let layout = layout_overlay(&config, &FixedWidth).unwrap();
        for pair in layout.lines.windows(2) {
            assert!((pair[1].center_y - pair[0].center_y - 120.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_empty_text_has_no_layout() {
        let config = TextOverlayConfig::new("   ", TextPosition::Top, TextSize::Small);
        assert!(layout_overlay(&config, &FixedWidth).is_none());

        let renderer = OverlayRenderer::with_fontdb(fontdb::Database::new());
        assert!(renderer.render_png(&config).unwrap().is_none());
    }

    #[test]
    fn test_render_without_fonts_fails() {
        let config = TextOverlayConfig::new("Hello", TextPosition::Top, TextSize::Small);
        let renderer = OverlayRenderer::with_fontdb(fontdb::Database::new());
        assert!(matches!(renderer.render_png(&config), Err(MediaError::OverlayRender(_))));
    }

    #[test]
    fn test_svg_escapes_text() {
        let config = TextOverlayConfig::new("Tom & <Jerry>", TextPosition::Middle, TextSize::Medium);
        let layout = layout_overlay(&config, &FixedWidth).unwrap();
        let svg = overlay_svg(&layout);

        assert!(svg.contains("Tom &amp; &lt;Jerry&gt;"));
        assert!(svg.contains(r#"paint-order="stroke""#));
        assert!(svg.contains(r#"stroke-width="7""#));
        assert!(svg.contains(r#"font-size="56""#));
    }

    fn system_fonts() -> Option<fontdb::Database> {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        if db.is_empty() {
            eprintln!("skipping: no system fonts installed");
            return None;
        }
        Some(db)
    }

    #[test]
    fn test_render_png() {
        let Some(db) = system_fonts() else { return };
        let renderer = OverlayRenderer::with_fontdb(db);
        assert!(renderer.sans_family().is_some());

        let config = TextOverlayConfig::new("Hello World", TextPosition::Bottom, TextSize::Large);
        assert!(renderer.measure("Hello World", TextSize::Large) > 0.0);
        let png = renderer.render_png(&config).unwrap().unwrap();

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (TARGET_WIDTH, TARGET_HEIGHT));
        assert_eq!(decoded.get_pixel(0, 0).0[3], 0);

        // Glyphs land in the bottom text band, nothing at the top
        let band_opaque = (1650..1790)
            .flat_map(|y| (0..TARGET_WIDTH).map(move |x| (x, y)))
            .filter(|&(x, y)| decoded.get_pixel(x, y).0[3] > 0)
            .count();
        assert!(band_opaque > 1000, "only {band_opaque} opaque pixels");
        assert!((0..TARGET_WIDTH).all(|x| decoded.get_pixel(x, 100).0[3] == 0));
    }

    #[test]
    fn test_missing_sans_default_remapped() {
        let Some(mut db) = system_fonts() else { return };
        db.set_sans_serif_family("No Such Family");

        let renderer = OverlayRenderer::with_fontdb(db);
        let family = renderer.sans_family().unwrap();
        assert_ne!(family, "No Such Family");

        // Long text wraps at 80% of the canvas with a real font
        let config = TextOverlayConfig::new(
            "the quick brown fox jumps over the lazy dog again and again",
            TextPosition::Middle,
            TextSize::ExtraLarge,
        );
        let layout = layout_overlay(&config, &renderer).unwrap();
        assert!(layout.lines.len() > 1);
        let max_width = TARGET_WIDTH as f32 * MAX_LINE_WIDTH_RATIO;
        for line in &layout.lines {
            let width = renderer.measure(&line.text, TextSize::ExtraLarge);
            assert!(width > 0.0 && width <= max_width, "{line:?} is {width}px");
        }
    }
}
