//! Render every page of a document to PNG, plus a continuous-scroll strip
//!
//! Usage: cargo run --example render_to_png [document_path] [output_dir]
//!
//! Without a document path a small sample document is generated.

use pdfsurface::{
    render_pages_into, ClipRect, Library, Matrix, PixelFormat, RasterTarget,
    ReferenceDocumentBuilder, ReferenceEngine, RenderConfig, RenderOptions, RenderedPage,
};
use std::env;
use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;

fn sample_document() -> Vec<u8> {
    ReferenceDocumentBuilder::new()
        .meta("Title", "Sample strip")
        .meta("Author", "pdfsurface")
        .page(300.0, 200.0)
        .text("first page")
        .fill(20.0, 20.0, 280.0, 180.0, 0xff2a6f97)
        .annot(200.0, 140.0, 280.0, 180.0, 0xfff4a261)
        .page(300.0, 200.0)
        .text("second page")
        .fill(0.0, 0.0, 150.0, 200.0, 0xffe76f51)
        .field(170.0, 20.0, 280.0, 60.0, 0xff2a9d8f)
        .build()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let output_dir = args
        .get(2)
        .map(|s| s.as_str())
        .unwrap_or("/tmp/pdfsurface-render");
    std::fs::create_dir_all(output_dir)?;

    let library = Library::new(Arc::new(ReferenceEngine::new()));

    // Keep the file open for as long as the document reads from it.
    let file;
    let doc = match args.get(1) {
        Some(path) => {
            file = File::open(path)?;
            library.open_file(file.as_raw_fd(), None)?
        }
        None => library.open_memory(&sample_document(), None)?,
    };

    println!("Opened document: {} pages", doc.page_count());
    if let Some(title) = doc.title() {
        println!("Title: {}", title);
    }
    if let Some(author) = doc.author() {
        println!("Author: {}", author);
    }

    if doc.page_count() == 0 {
        return Ok(());
    }

    let options = RenderOptions::new()
        .set_page_color(0xffffffff)
        .set_render_annotations(true);
    let config = RenderConfig::new()
        .set_target_dpi(144.0)
        .set_options(options);

    for rendered in doc.render_pages_parallel(0..doc.page_count(), &config)? {
        let path = format!("{}/page_{}.png", output_dir, rendered.page_index);
        rendered.save_as_png(&path)?;
        println!(
            "  Page {}: {}x{} -> {}",
            rendered.page_index, rendered.width, rendered.height, path
        );
    }

    // Stack all pages vertically, one pixel per point, with a grey gap.
    let pages = doc.load_pages(0, doc.page_count() - 1)?;
    let width = pages.iter().map(|p| p.width_pixels(72)).max().unwrap_or(0);
    let gap = 8.0f32;
    let mut matrices = Vec::new();
    let mut clips = Vec::new();
    let mut top = 0.0f32;
    for page in &pages {
        matrices.push(Matrix::translation(0.0, top));
        clips.push(ClipRect::new(0.0, top, page.width(), top + page.height()));
        top += page.height() + gap;
    }
    let height = (top - gap).max(0.0) as u32;

    let stride = width as usize * 4;
    let mut data = vec![0u8; stride * height as usize];
    {
        let mut target = RasterTarget::new(&mut data, width, height, stride, PixelFormat::Rgba8888)?;
        let refs: Vec<_> = pages.iter().map(Some).collect();
        render_pages_into(
            &mut target,
            &refs,
            &matrices,
            &clips,
            &options.set_canvas_color(0xff9e9e9e),
        )?;
    }

    let strip = RenderedPage {
        page_index: 0,
        width,
        height,
        stride,
        data,
        format: PixelFormat::Rgba8888,
    };
    let path = format!("{}/strip.png", output_dir);
    strip.save_as_png(&path)?;
    println!("  Strip: {}x{} -> {}", width, height, path);

    Ok(())
}
