//! Load a model through a headless viewer session and print what came out.
//!
//! ```bash
//! # GLB with embedded cameras
//! model_probe scene.glb
//!
//! # OBJ with its material archive, rendered for 10 frames at 800x600
//! model_probe chair.obj --archive chair.zip --frames 10 --size 800x600
//! ```

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::{Path, PathBuf};
    use std::rc::Rc;
    use std::time::Duration;

    use clap::Parser;
    use model_viewer::asset::{FileSystemSource, ProgressSink};
    use model_viewer::config::{ColorValue, LightKind, ModelFormat, ViewerConfig};
    use model_viewer::{AssetLoader, HeadlessBackend, HeadlessContainer, ViewerSession};

    #[derive(Debug, Clone, Copy, clap::ValueEnum)]
    enum CliFormat {
        Gltf,
        Glb,
        Obj,
    }

    impl From<CliFormat> for ModelFormat {
        fn from(format: CliFormat) -> Self {
            match format {
                CliFormat::Gltf => ModelFormat::Gltf,
                CliFormat::Glb => ModelFormat::Glb,
                CliFormat::Obj => ModelFormat::Obj,
            }
        }
    }

    /// Model viewer probe
    #[derive(Parser, Debug)]
    #[command(name = "model_probe", version, about = "Load a 3D model headlessly and summarize it")]
    struct Args {
        /// Model file (.gltf, .glb or .obj)
        model: PathBuf,

        /// Zip archive with the .mtl file and textures (OBJ only)
        #[arg(long)]
        archive: Option<PathBuf>,

        /// Override the format detected from the extension
        #[arg(long, value_enum)]
        format: Option<CliFormat>,

        /// Light to install instead of the default (e.g. DirectionalLight)
        #[arg(long)]
        light: Option<String>,

        /// Background color as #rrggbb
        #[arg(long)]
        background: Option<String>,

        /// Enable room environment lighting
        #[arg(long)]
        environment: bool,

        /// Do not add an ambient light to unlit models
        #[arg(long)]
        no_default_lights: bool,

        /// Viewport size as WIDTHxHEIGHT
        #[arg(long, default_value = "1280x720", value_parser = parse_size)]
        size: (u32, u32),

        /// Frames to render after loading
        #[arg(long, default_value_t = 1)]
        frames: u32,

        /// Load timeout in milliseconds, 0 disables it
        #[arg(long, default_value_t = 60_000)]
        timeout_ms: u64,
    }

    fn parse_size(text: &str) -> Result<(u32, u32), String> {
        let (w, h) = text
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{text}'"))?;
        let w = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
        let h = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
        Ok((w, h))
    }

    struct StderrProgress;

    impl ProgressSink for StderrProgress {
        fn report(&self, text: &str) {
            if !text.is_empty() {
                eprint!("\rLoading {text}   ");
            } else {
                eprintln!("\rLoaded        ");
            }
        }
    }

    fn url_of(path: &Path) -> Result<String, String> {
        std::fs::canonicalize(path)
            .map(|p| p.to_string_lossy().into_owned())
            .map_err(|err| format!("{}: {err}", path.display()))
    }

    fn build_config(args: &Args) -> Result<ViewerConfig, String> {
        let model_url = url_of(&args.model)?;
        let mut config = match args.format {
            Some(format) => ViewerConfig::new(model_url, format.into()),
            None => ViewerConfig::from_url(model_url),
        };
        if let Some(archive) = &args.archive {
            config = config.with_materials_archive(url_of(archive)?);
        }
        if let Some(name) = &args.light {
            let kind = LightKind::from_name(name).ok_or_else(|| format!("unknown light '{name}'"))?;
            config = config.with_light(kind);
        }
        if let Some(color) = &args.background {
            let color = ColorValue::Text(color.clone())
                .into_color()
                .map_err(|err| err.to_string())?;
            config = config.with_background(color);
        }
        let timeout = (args.timeout_ms > 0).then(|| Duration::from_millis(args.timeout_ms));
        Ok(config
            .with_environment_lighting(args.environment)
            .with_default_lights(!args.no_default_lights)
            .with_load_timeout(timeout))
    }

    pub fn main() -> Result<(), Box<dyn std::error::Error>> {
        model_viewer::init_logging();
        let args = Args::parse();
        let config = build_config(&args)?;

        let (width, height) = args.size;
        let container = HeadlessContainer::new(width, height);
        let mut session = ViewerSession::new(container, HeadlessBackend::default(), config)?;
        let loader = AssetLoader::new(FileSystemSource::new("/"));
        pollster::block_on(session.load(&loader, Rc::new(StderrProgress)))?;

        for _ in 0..args.frames {
            session.frame(1.0 / 60.0)?;
        }

        let scene = session.scene();
        println!("model:       {}", args.model.display());
        println!("format:      {:?}", session.config().model_format);
        println!("meshes:      {}", scene.mesh_count());
        println!("materials:   {}", scene.materials.len());
        println!("textures:    {}", scene.textures().len());
        println!("lights:      {}", scene.lights().len());
        if let Some(outcome) = session.normalize_outcome() {
            println!("normalized:  {outcome:?}");
        }
        let bounds = scene.bounds();
        println!("bounds:      {} .. {}", bounds.min, bounds.max);
        println!("camera:      {:?}", session.camera_source());
        println!("defaults:    {:?}", session.applied_defaults());
        if let Some(frame) = session.backend().last_frame() {
            println!(
                "last frame:  {}x{}, {} draw call(s), {} frame(s) total",
                frame.width,
                frame.height,
                frame.draw_calls,
                session.backend().frames().len()
            );
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    native::main()
}

#[cfg(target_arch = "wasm32")]
fn main() {}
