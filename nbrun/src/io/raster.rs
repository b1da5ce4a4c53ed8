//! Writing figures to image files (`savefig`).

use std::fs;
use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::debug;

use crate::core::figure::{Figure, FigureSize};
use crate::core::svg::render_svg;

/// Rasterize an SVG document onto a white background.
fn rasterize(svg: &str) -> Result<tiny_skia::Pixmap> {
    let mut opts = usvg::Options::default();
    opts.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(svg, &opts).context("parse figure svg")?;

    let size = tree.size();
    let width = size.width().ceil() as u32;
    let height = size.height().ceil() as u32;
    let mut pixmap = tiny_skia::Pixmap::new(width, height).context("allocate pixmap")?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
    Ok(pixmap)
}

/// Rasterize an SVG document to PNG bytes on a white background.
pub fn svg_to_png(svg: &str) -> Result<Vec<u8>> {
    rasterize(svg)?.encode_png().context("encode png")
}

/// Rasterize an SVG document and encode it with `image`.
///
/// The background is opaque, so the premultiplied pixmap data is plain RGBA.
fn svg_to_encoded(svg: &str, format: ImageFormat) -> Result<Vec<u8>> {
    let pixmap = rasterize(svg)?;
    let rgba = RgbaImage::from_raw(pixmap.width(), pixmap.height(), pixmap.take())
        .ok_or_else(|| anyhow!("pixmap buffer does not match its size"))?;
    let mut bytes = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgba8(rgba)
            .to_rgb8()
            .write_to(&mut bytes, format),
        _ => rgba.write_to(&mut bytes, format),
    }
    .with_context(|| format!("encode {format:?}"))?;
    Ok(bytes.into_inner())
}

/// Write `figure` to `path`. The format follows the extension: `.svg`, `.png`,
/// `.jpg`/`.jpeg` or `.webp`.
pub fn write_figure(path: &Path, figure: &Figure, size: FigureSize) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let svg = render_svg(figure, size);
    let bytes = match ext.as_str() {
        "svg" => svg.into_bytes(),
        "png" => svg_to_png(&svg)?,
        "jpg" | "jpeg" => svg_to_encoded(&svg, ImageFormat::Jpeg)?,
        "webp" => svg_to_encoded(&svg, ImageFormat::WebP)?,
        "" => return Err(anyhow!("savefig path needs an extension (.png, .jpg, .webp or .svg)")),
        other => {
            return Err(anyhow!(
                "unsupported savefig format `.{other}` (use .png, .jpg, .jpeg, .webp or .svg)"
            ));
        }
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create figure dir {}", parent.display()))?;
    }
    fs::write(path, &bytes).with_context(|| format!("write figure {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), figure = figure.id, "figure saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::figure::{Series, SeriesKind};

    fn figure() -> Figure {
        let mut figure = Figure::new(1);
        figure.series.push(Series::new(
            SeriesKind::Line,
            vec![0.0, 1.0],
            vec![0.0, 1.0],
        ));
        figure
    }

    fn size() -> FigureSize {
        FigureSize {
            width: 320,
            height: 240,
        }
    }

    #[test]
    fn png_output_has_png_signature() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plot.PNG");
        write_figure(&path, &figure(), size()).expect("write");
        let bytes = fs::read(&path).expect("read");
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn svg_output_is_text() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plot.svg");
        write_figure(&path, &figure(), size()).expect("write");
        let text = fs::read_to_string(&path).expect("read");
        assert!(text.starts_with("<svg"));
    }

    #[test]
    fn jpeg_and_webp_outputs_have_their_signatures() {
        let temp = tempfile::tempdir().expect("tempdir");
        let jpg = temp.path().join("plot.jpg");
        let webp = temp.path().join("plot.WEBP");
        write_figure(&jpg, &figure(), size()).expect("jpg");
        write_figure(&webp, &figure(), size()).expect("webp");

        let bytes = fs::read(&jpg).expect("read jpg");
        assert_eq!(&bytes[..3], b"\xff\xd8\xff");
        let bytes = fs::read(&webp).expect("read webp");
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn unsupported_extension_errors_without_writing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plot.gif");
        let err = write_figure(&path, &figure(), size()).unwrap_err();
        assert!(err.to_string().contains("unsupported savefig format"));
        assert!(!path.exists());
    }
}
