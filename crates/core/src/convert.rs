use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageError, ImageFormat, ImageReader};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

const ICO_MAX_SIDE: u32 = 256;

/// Output format as picked by the user. `Jpg` and `Jpeg` only differ in the extension written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Png,
    Jpg,
    Jpeg,
    Webp,
    Bmp,
    Ico,
    Tiff,
}

impl TargetFormat {
    pub fn all() -> [TargetFormat; 7] {
        [
            TargetFormat::Png,
            TargetFormat::Jpg,
            TargetFormat::Jpeg,
            TargetFormat::Webp,
            TargetFormat::Bmp,
            TargetFormat::Ico,
            TargetFormat::Tiff,
        ]
    }

    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Png => "png",
            TargetFormat::Jpg => "jpg",
            TargetFormat::Jpeg => "jpeg",
            TargetFormat::Webp => "webp",
            TargetFormat::Bmp => "bmp",
            TargetFormat::Ico => "ico",
            TargetFormat::Tiff => "tiff",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        Self::all()
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(ext))
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            TargetFormat::Png => ImageFormat::Png,
            TargetFormat::Jpg | TargetFormat::Jpeg => ImageFormat::Jpeg,
            TargetFormat::Webp => ImageFormat::WebP,
            TargetFormat::Bmp => ImageFormat::Bmp,
            TargetFormat::Ico => ImageFormat::Ico,
            TargetFormat::Tiff => ImageFormat::Tiff,
        }
    }

    pub fn supports_alpha(self) -> bool {
        self.image_format() != ImageFormat::Jpeg
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertOptions {
    pub format: TargetFormat,
    pub keep_originals: bool,
    pub jpeg_quality: u8,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            format: TargetFormat::Png,
            keep_originals: true,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("ファイル操作に失敗しました: {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("画像を読み込めませんでした: {0}")]
    Decode(#[source] ImageError),
    #[error("画像を書き出せませんでした: {0}")]
    Encode(#[source] ImageError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertedFile {
    pub source: PathBuf,
    pub output: PathBuf,
    pub source_removed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertFailure {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertReport {
    pub converted: Vec<ConvertedFile>,
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<ConvertFailure>,
}

impl ConvertReport {
    pub fn success_count(&self) -> usize {
        self.converted.len()
    }
}

/// Converts every file in order. A file that cannot be decoded or encoded is logged and
/// recorded in the report; the batch always runs to the end.
pub fn convert_files(files: &[PathBuf], options: &ConvertOptions) -> ConvertReport {
    let mut report = ConvertReport::default();

    for source in files {
        if already_in_format(source, options.format) {
            warn!(
                "変換先と同じ形式のためスキップします: {}",
                source.display()
            );
            report.skipped.push(source.clone());
            continue;
        }

        match convert_file(source, options) {
            Ok(converted) => {
                debug!(
                    "converted {} -> {}",
                    converted.source.display(),
                    converted.output.display()
                );
                report.converted.push(converted);
            }
            Err(err) => {
                warn!("変換に失敗しました {}: {}", source.display(), err);
                report.failures.push(ConvertFailure {
                    path: source.clone(),
                    message: err.to_string(),
                });
            }
        }
    }

    info!(
        "convert finished: {} converted, {} skipped, {} failed",
        report.converted.len(),
        report.skipped.len(),
        report.failures.len()
    );
    report
}

pub fn convert_file(
    source: &Path,
    options: &ConvertOptions,
) -> Result<ConvertedFile, ConvertError> {
    let output = output_path_for(source, options.format);
    let image = ImageReader::open(source)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|err| io_error(source, err))?
        .decode()
        .map_err(ConvertError::Decode)?;

    let image = prepare_for(options.format, image);
    encode(&image, &output, options)?;

    let mut source_removed = false;
    if !options.keep_originals {
        match fs::remove_file(source) {
            Ok(()) => source_removed = true,
            Err(err) => warn!(
                "元ファイルを削除できませんでした {}: {}",
                source.display(),
                err
            ),
        }
    }

    Ok(ConvertedFile {
        source: source.to_path_buf(),
        output,
        source_removed,
    })
}

pub fn output_path_for(source: &Path, format: TargetFormat) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    let parent = source.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{}.{}", stem, format.extension()))
}

fn already_in_format(source: &Path, format: TargetFormat) -> bool {
    source
        .extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(format.extension()))
        .unwrap_or(false)
}

// Decoders expand palettes, so only the decoded color type matters here.
fn prepare_for(format: TargetFormat, image: DynamicImage) -> DynamicImage {
    let image = if format.image_format() == ImageFormat::Ico
        && (image.width() > ICO_MAX_SIDE || image.height() > ICO_MAX_SIDE)
    {
        image.thumbnail(ICO_MAX_SIDE, ICO_MAX_SIDE)
    } else {
        image
    };
    let color = image.color();
    if !format.supports_alpha() {
        return match color {
            ColorType::L8 | ColorType::Rgb8 => image,
            _ => DynamicImage::ImageRgb8(image.to_rgb8()),
        };
    }
    match format.image_format() {
        ImageFormat::Tiff => match color {
            ColorType::La8 => DynamicImage::ImageRgba8(image.to_rgba8()),
            ColorType::La16 => DynamicImage::ImageRgba16(image.to_rgba16()),
            _ => image,
        },
        ImageFormat::Png => match color {
            ColorType::Rgb32F => DynamicImage::ImageRgb16(image.to_rgb16()),
            ColorType::Rgba32F => DynamicImage::ImageRgba16(image.to_rgba16()),
            _ => image,
        },
        _ => match color {
            ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => image,
            other if other.has_alpha() => DynamicImage::ImageRgba8(image.to_rgba8()),
            _ => DynamicImage::ImageRgb8(image.to_rgb8()),
        },
    }
}

// A partial output is removed, but only once this call has created the file.
fn encode(
    image: &DynamicImage,
    output: &Path,
    options: &ConvertOptions,
) -> Result<(), ConvertError> {
    let file = File::create(output).map_err(|err| io_error(output, err))?;
    let written = write_image(image, BufWriter::new(file), output, options);
    if written.is_err() {
        let _ = fs::remove_file(output);
    }
    written
}

fn write_image(
    image: &DynamicImage,
    mut writer: BufWriter<File>,
    output: &Path,
    options: &ConvertOptions,
) -> Result<(), ConvertError> {
    match options.format.image_format() {
        ImageFormat::Jpeg => {
            let quality = options.jpeg_quality.clamp(1, 100);
            image
                .write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))
                .map_err(ConvertError::Encode)?;
        }
        other => image
            .write_to(&mut writer, other)
            .map_err(ConvertError::Encode)?,
    }
    writer.flush().map_err(|err| io_error(output, err))
}

fn io_error(path: &Path, source: io::Error) -> ConvertError {
    ConvertError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayAlphaImage, ImageBuffer, LumaA, Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::tempdir;

    fn write_rgba_png(path: &Path) {
        let image = RgbaImage::from_fn(8, 8, |x, y| {
            Rgba([(x * 30) as u8, (y * 30) as u8, 128, if x % 2 == 0 { 0 } else { 255 }])
        });
        image
            .save_with_format(path, ImageFormat::Png)
            .expect("write png fixture");
    }

    fn options(format: TargetFormat, keep_originals: bool) -> ConvertOptions {
        ConvertOptions {
            format,
            keep_originals,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    #[test]
    fn target_format_parses_extensions() {
        assert_eq!(TargetFormat::from_extension("JPG"), Some(TargetFormat::Jpg));
        assert_eq!(TargetFormat::from_extension(".tiff"), Some(TargetFormat::Tiff));
        assert_eq!(TargetFormat::from_extension("gif"), None);
        assert_eq!(TargetFormat::Jpeg.image_format(), ImageFormat::Jpeg);
        assert!(!TargetFormat::Jpg.supports_alpha());
        assert!(TargetFormat::Webp.supports_alpha());
    }

    #[test]
    fn output_path_swaps_extension_in_place() {
        let output = output_path_for(Path::new("/pics/cat.photo.PNG"), TargetFormat::Webp);
        assert_eq!(output, PathBuf::from("/pics/cat.photo.webp"));
    }

    #[test]
    fn rgba_png_converts_to_jpeg() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("logo.png");
        write_rgba_png(&source);

        let report = convert_files(&[source.clone()], &options(TargetFormat::Jpg, true));
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(report.success_count(), 1);

        let output = temp.path().join("logo.jpg");
        let decoded = image::open(&output).expect("jpeg output should decode");
        assert_eq!(decoded.color(), ColorType::Rgb8);
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
        assert!(source.exists(), "original is kept by default");
    }

    #[test]
    fn sixteen_bit_alpha_is_flattened_for_jpeg() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("deep.png");
        let image: ImageBuffer<Rgba<u16>, Vec<u16>> =
            ImageBuffer::from_pixel(4, 4, Rgba([65535, 0, 0, 30000]));
        DynamicImage::ImageRgba16(image)
            .save_with_format(&source, ImageFormat::Png)
            .expect("write png fixture");

        let report = convert_files(&[source], &options(TargetFormat::Jpeg, true));
        assert_eq!(report.success_count(), 1);
        assert!(temp.path().join("deep.jpeg").exists());
    }

    #[test]
    fn originals_are_deleted_when_requested() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("icon.png");
        write_rgba_png(&source);

        let report = convert_files(&[source.clone()], &options(TargetFormat::Bmp, false));
        assert_eq!(report.success_count(), 1);
        assert!(report.converted[0].source_removed);
        assert!(!source.exists());
        assert!(temp.path().join("icon.bmp").exists());
    }

    #[test]
    fn broken_file_is_skipped_and_batch_continues() {
        let temp = tempdir().expect("tempdir");
        let broken = temp.path().join("broken.png");
        let good = temp.path().join("good.png");
        fs::write(&broken, b"definitely not a png").expect("write broken");
        write_rgba_png(&good);

        let report = convert_files(&[broken.clone(), good], &options(TargetFormat::Jpg, false));
        assert_eq!(report.success_count(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, broken);
        assert!(broken.exists(), "failed source is never deleted");
        assert!(!temp.path().join("broken.jpg").exists());
        assert!(temp.path().join("good.jpg").exists());
    }

    #[test]
    fn same_format_is_skipped_untouched() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("already.PNG");
        write_rgba_png(&source);
        let before = fs::read(&source).expect("read source");

        let report = convert_files(&[source.clone()], &options(TargetFormat::Png, false));
        assert_eq!(report.success_count(), 0);
        assert_eq!(report.skipped, vec![source.clone()]);
        assert_eq!(fs::read(&source).expect("read source"), before);
    }

    #[test]
    fn format_is_detected_from_content() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("misnamed.bmp");
        write_rgba_png(&source);

        let report = convert_files(&[source], &options(TargetFormat::Tiff, true));
        assert_eq!(report.success_count(), 1, "{:?}", report.failures);
        assert!(temp.path().join("misnamed.tiff").exists());
    }

    #[test]
    fn large_image_is_shrunk_to_fit_ico() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("photo.png");
        RgbImage::from_pixel(640, 480, Rgb([10, 120, 200]))
            .save_with_format(&source, ImageFormat::Png)
            .expect("write png fixture");

        let report = convert_files(&[source], &options(TargetFormat::Ico, true));
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(report.success_count(), 1);

        let decoded = image::open(temp.path().join("photo.ico")).expect("ico output should decode");
        assert_eq!((decoded.width(), decoded.height()), (256, 192));
    }

    #[test]
    fn gray_alpha_converts_to_tiff() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("mask.png");
        GrayAlphaImage::from_fn(6, 6, |x, _| LumaA([(x * 40) as u8, 200]))
            .save_with_format(&source, ImageFormat::Png)
            .expect("write png fixture");

        let report = convert_files(&[source], &options(TargetFormat::Tiff, true));
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        let decoded = image::open(temp.path().join("mask.tiff")).expect("tiff output should decode");
        assert!(decoded.color().has_alpha());
    }

    #[cfg(unix)]
    #[test]
    fn output_that_cannot_be_opened_is_left_in_place() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("loop.png");
        let output = temp.path().join("loop.bmp");
        write_rgba_png(&source);
        std::os::unix::fs::symlink(&output, &output).expect("create looping symlink");

        let report = convert_files(&[source.clone()], &options(TargetFormat::Bmp, false));
        assert_eq!(report.success_count(), 0);
        assert_eq!(report.failures.len(), 1);
        assert!(fs::symlink_metadata(&output).is_ok(), "existing output is not removed");
        assert!(source.exists());
    }
}
