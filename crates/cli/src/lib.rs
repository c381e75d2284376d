use annotator_core::{ClickOutcome, Editor, EditorConfig, SelectedFile};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use doc_model::{Annotation, AnnotationId, FontSize, ScreenPoint, ScreenRect};
use image::Rgba;
use pdf_engine::RgbaImage;
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log filter variable, in `EnvFilter` syntax. Defaults to `warn`.
pub const LOG_ENV: &str = "PDF_ANNOTATOR_LOG";

const OUTLINE: Rgba<u8> = Rgba([90, 90, 90, 255]);

#[derive(Debug, Parser)]
#[command(name = "pdf-annotator")]
#[command(about = "Place free-text annotations on PDF pages and export them")]
pub struct Cli {
    #[command(flatten)]
    options: GlobalOptions,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct GlobalOptions {
    /// Annotation storage directory. Overrides PDF_ANNOTATOR_DATA_DIR.
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    /// Pixels per PDF point. Overrides PDF_ANNOTATOR_DISPLAY_SCALE.
    #[arg(long, global = true)]
    scale: Option<f32>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print page geometry and annotation count as JSON.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render a page with annotation boxes outlined to PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Click a point on a page: places a new annotation or selects the one there.
    Place {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        x: f32,
        #[arg(long)]
        y: f32,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        size: Option<FontSize>,
    },
    /// Change an annotation's text or size.
    Edit {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(value_name = "ID")]
        id: AnnotationId,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        size: Option<FontSize>,
    },
    /// Delete an annotation.
    Delete {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(value_name = "ID")]
        id: AnnotationId,
    },
    /// Print saved annotations as JSON.
    List {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        page: Option<usize>,
    },
    /// Write a copy of the PDF with annotations burned in.
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    document_key: String,
    page_count: usize,
    scale: f32,
    pages: Vec<PageOutput>,
    annotation_count: usize,
}

#[derive(Debug, Serialize)]
struct PageOutput {
    page: usize,
    pixel_width: u32,
    pixel_height: u32,
}

#[derive(Debug, Serialize)]
struct AnnotationOutput<'a> {
    id: AnnotationId,
    page: usize,
    x: f32,
    y: f32,
    text: &'a str,
    font_size: FontSize,
}

impl<'a> From<&'a Annotation> for AnnotationOutput<'a> {
    fn from(annotation: &'a Annotation) -> Self {
        Self {
            id: annotation.id,
            page: annotation.page + 1,
            x: annotation.x,
            y: annotation.y,
            text: &annotation.text,
            font_size: annotation.font_size,
        }
    }
}

#[derive(Debug, Serialize)]
struct PlaceOutput<'a> {
    outcome: &'static str,
    annotation: AnnotationOutput<'a>,
}

/// Installs a stderr subscriber filtered by [`LOG_ENV`].
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let options = &cli.options;

    match cli.command {
        Commands::Info { file } => run_info(options, &file),
        Commands::Render { file, page, output } => {
            run_render(options, &file, page, output.as_deref())
        }
        Commands::Place { file, page, x, y, text, size } => {
            run_place(options, &file, page, ScreenPoint::new(x, y), text, size)
        }
        Commands::Edit { file, id, text, size } => run_edit(options, &file, id, text, size),
        Commands::Delete { file, id } => run_delete(options, &file, id),
        Commands::List { file, page } => run_list(options, &file, page),
        Commands::Export { file, output } => run_export(options, &file, output.as_deref()),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_info(options: &GlobalOptions, file: &Path) -> Result<()> {
    let editor = open_editor(options, file)?;

    let pages = editor
        .pages()
        .iter()
        .map(|page| PageOutput {
            page: page.index + 1,
            pixel_width: page.geometry.pixel_width,
            pixel_height: page.geometry.pixel_height,
        })
        .collect();

    let payload = InfoOutput {
        path: file.display().to_string(),
        document_key: editor.document_key().map(ToString::to_string).unwrap_or_default(),
        page_count: editor.page_count(),
        scale: editor.pages().first().map_or(0.0, |page| page.geometry.scale),
        pages,
        annotation_count: editor.annotations().len(),
    };

    print_json(&payload)
}

fn run_render(options: &GlobalOptions, file: &Path, page: usize, output: Option<&Path>) -> Result<()> {
    let editor = open_editor(options, file)?;
    let index = page_index(page)?;

    let rendered = editor
        .pages()
        .get(index)
        .with_context(|| format!("page {page} out of range (page_count={})", editor.page_count()))?;

    let mut surface = rendered.surface.clone();
    for annotation in editor.annotations_for_page(index) {
        draw_outline(&mut surface, annotation.text_box(), OUTLINE);
    }

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file, page));
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    surface
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;
    tracing::info!(output = %output.display(), page, "wrote page image");

    println!("{}", output.display());
    Ok(())
}

fn run_place(
    options: &GlobalOptions,
    file: &Path,
    page: usize,
    point: ScreenPoint,
    text: Option<String>,
    size: Option<FontSize>,
) -> Result<()> {
    let mut editor = open_editor(options, file)?;

    let (outcome, id) = match editor.click(page_index(page)?, point)? {
        ClickOutcome::Placed(id) => ("placed", id),
        ClickOutcome::Selected(id) => ("selected", id),
        ClickOutcome::OffPage => {
            anyhow::bail!("point ({}, {}) is outside page {page}", point.x, point.y)
        }
    };

    apply_edits(&mut editor, id, text, size);

    let annotation = find(&editor, id)?;
    print_json(&PlaceOutput { outcome, annotation: annotation.into() })
}

fn run_edit(
    options: &GlobalOptions,
    file: &Path,
    id: AnnotationId,
    text: Option<String>,
    size: Option<FontSize>,
) -> Result<()> {
    let mut editor = open_editor(options, file)?;
    find(&editor, id)?;

    apply_edits(&mut editor, id, text, size);

    print_json(&AnnotationOutput::from(find(&editor, id)?))
}

fn run_delete(options: &GlobalOptions, file: &Path, id: AnnotationId) -> Result<()> {
    let mut editor = open_editor(options, file)?;

    let removed = editor.remove(id).with_context(|| format!("no annotation with id {id}"))?;
    println!("{}", removed.id);
    Ok(())
}

fn run_list(options: &GlobalOptions, file: &Path, page: Option<usize>) -> Result<()> {
    let editor = open_editor(options, file)?;

    let annotations: Vec<AnnotationOutput<'_>> = match page {
        Some(page) => editor.annotations_for_page(page_index(page)?).map(Into::into).collect(),
        None => editor.annotations().annotations().iter().map(Into::into).collect(),
    };

    print_json(&annotations)
}

fn run_export(options: &GlobalOptions, file: &Path, output: Option<&Path>) -> Result<()> {
    let mut editor = open_editor(options, file)?;
    let exported = editor.export().context("failed to export annotations")?;

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| file.with_file_name(exported.file_name));
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&output, &exported.bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!(output = %output.display(), size = exported.bytes.len(), "wrote export");

    println!("{}", output.display());
    Ok(())
}

fn open_editor(options: &GlobalOptions, file: &Path) -> Result<Editor> {
    ensure_file_exists(file)?;

    let mut config = EditorConfig::from_env().context("invalid configuration in environment")?;
    if let Some(dir) = &options.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(scale) = options.scale {
        config = config.with_display_scale(scale);
    }

    tracing::debug!(
        file = %file.display(),
        scale = config.display_scale,
        data_dir = ?config.data_dir,
        "opening editor"
    );
    let mut editor = Editor::new(&config)?;
    let selected =
        SelectedFile::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    editor.open(selected).context("failed to open PDF")?;

    Ok(editor)
}

fn apply_edits(editor: &mut Editor, id: AnnotationId, text: Option<String>, size: Option<FontSize>) {
    if let Some(text) = text {
        editor.update_text(id, text);
    }
    if let Some(size) = size {
        editor.update_font_size(id, size);
    }
}

fn find(editor: &Editor, id: AnnotationId) -> Result<&Annotation> {
    editor.annotations().get(id).with_context(|| format!("no annotation with id {id}"))
}

fn page_index(page: usize) -> Result<usize> {
    page.checked_sub(1).context("--page is 1-based and must be >= 1")
}

fn print_json<T: Serialize>(payload: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(payload)?;
    println!("{json}");
    Ok(())
}

fn draw_outline(surface: &mut RgbaImage, rect: ScreenRect, color: Rgba<u8>) {
    let left = rect.x.floor() as i64;
    let top = rect.y.floor() as i64;
    let right = (rect.x + rect.width).ceil() as i64 - 1;
    let bottom = (rect.y + rect.height).ceil() as i64 - 1;

    let (width, height) = surface.dimensions();
    let mut put = |x: i64, y: i64| {
        if (0..i64::from(width)).contains(&x) && (0..i64::from(height)).contains(&y) {
            surface.put_pixel(x as u32, y as u32, color);
        }
    };

    for x in left..=right {
        put(x, top);
        put(x, bottom);
    }
    for y in top..=bottom {
        put(left, y);
        put(right, y);
    }
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path, page: usize) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_is_clipped_to_surface() {
        let mut surface = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        draw_outline(&mut surface, ScreenRect { x: 6.0, y: 2.0, width: 8.0, height: 3.0 }, OUTLINE);

        assert_eq!(surface.get_pixel(6, 2), &OUTLINE);
        assert_eq!(surface.get_pixel(9, 4), &OUTLINE);
        assert_eq!(surface.get_pixel(7, 3), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn page_numbers_are_one_based() {
        assert_eq!(page_index(1).unwrap(), 0);
        assert!(page_index(0).is_err());
    }

    #[test]
    fn render_output_defaults_next_to_source() {
        let output = default_render_output(Path::new("/docs/report.pdf"), 3);
        assert_eq!(output, PathBuf::from("/docs/report-page-3.png"));
    }
}
