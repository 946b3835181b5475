use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use stereq::config::{BandList, Rebuilder, Session, default_bands};
use stereq::eq::composer;
use stereq::preset::{self, Manager};
use stereq::render::{self, Engine};
use stereq::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "stereq")]
#[command(version)]
#[command(about = "Stereo parametric EQ built as a signal graph.")]
struct Args {
    #[arg(long, env = "STEREQ_PRESET_DIR", help = "Directory holding preset files")]
    preset_dir: Option<String>,

    #[arg(long, global = true, help = "Preset name to use (defaults to the built-in bands)")]
    preset: Option<String>,

    #[arg(long, global = true, help = "Preset JSON file to use instead of a named preset")]
    preset_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a WAV file through the equalizer
    Render {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print the impulse response of the equalizer
    Impulse {
        #[arg(long, default_value_t = 32)]
        len: usize,
    },
    /// Print the signal graph the bands compile to
    Graph,
    /// List available presets
    Presets,
    /// Save the selected bands under a new preset name
    Save { name: String },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    info!("stereq v{}", env!("CARGO_PKG_VERSION"));
    info!("Args: {:?}", args);

    let settings = Settings::load().context("failed to load settings")?;
    settings.validate()?;
    debug!("Settings:\n{settings}");
    let preset_dir = args
        .preset_dir
        .clone()
        .unwrap_or_else(|| settings.preset_dir.clone());
    let mut presets = Manager::new(&preset_dir)
        .with_context(|| format!("failed to open preset directory '{preset_dir}'"))?;

    let bands = select_bands(&args, &settings, &presets)?;

    match args.command {
        Command::Render { input, output } => render_file(&input, &output, bands, &settings)?,
        Command::Impulse { len } => {
            let graph = composer::build_from_inputs(&bands);
            let (left, right) =
                render::impulse_response(&graph, settings.sample_rate as f32, len)?;
            for (i, (l, r)) in left.iter().zip(&right).enumerate() {
                println!("{i:>5} {l:>12.8} {r:>12.8}");
            }
        }
        Command::Graph => {
            let graph = composer::build_from_inputs(&bands);
            println!("L = {}", graph.left);
            println!("R = {}", graph.right);
        }
        Command::Presets => {
            for preset in presets.get_presets() {
                println!("{}", preset.summary());
            }
        }
        Command::Save { name } => {
            presets.save_preset(&preset::Preset::new(name.clone(), bands))?;
            info!("Saved preset '{name}' to {preset_dir}");
        }
    }

    Ok(())
}

fn select_bands(args: &Args, settings: &Settings, presets: &Manager) -> Result<BandList> {
    if let Some(path) = &args.preset_file {
        let preset = preset::manager::load_preset_file(path)
            .with_context(|| format!("failed to load '{}'", path.display()))?;
        return Ok(preset.bands);
    }

    match args.preset.as_ref().or(settings.selected_preset.as_ref()) {
        Some(name) => match presets.get_preset_by_name(name) {
            Some(preset) => Ok(preset.bands.clone()),
            None => bail!("no preset named '{name}'"),
        },
        None => Ok(default_bands()),
    }
}

fn render_file(input: &Path, output: &Path, bands: BandList, settings: &Settings) -> Result<()> {
    let mut reader = WavReader::open(input)
        .with_context(|| format!("failed to open '{}'", input.display()))?;
    let spec = reader.spec();
    if spec.channels == 0 || spec.channels > 2 {
        bail!("only mono or stereo input is supported, got {} channels", spec.channels);
    }
    if spec.sample_rate != settings.sample_rate {
        warn!(
            "Input sample rate {} differs from configured {}, rendering at the input rate",
            spec.sample_rate, settings.sample_rate
        );
    }

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    let (left, right): (Vec<f32>, Vec<f32>) = if spec.channels == 2 {
        samples.chunks_exact(2).map(|f| (f[0], f[1])).unzip()
    } else {
        samples.iter().map(|&s| (s, s)).unzip()
    };

    let block_size = settings.block_size;
    let (mut engine, handle) = Engine::new(spec.sample_rate as f32, block_size);
    let (session, rx_events) = Session::new(bands);
    let mut rebuilder = Rebuilder::new(session.reader(), rx_events, handle);
    rebuilder.rebuild_now()?;

    let mut out_left = vec![0.0; left.len()];
    let mut out_right = vec![0.0; right.len()];
    for (((in_l, in_r), out_l), out_r) in left
        .chunks(block_size)
        .zip(right.chunks(block_size))
        .zip(out_left.chunks_mut(block_size))
        .zip(out_right.chunks_mut(block_size))
    {
        if in_l.len() != engine.buffer_size() {
            engine.update_buffer_size(in_l.len());
        }
        engine.process(in_l, in_r, out_l, out_r)?;
    }

    let out_spec = WavSpec {
        channels: 2,
        sample_rate: spec.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(output, out_spec)
        .with_context(|| format!("failed to create '{}'", output.display()))?;
    for (l, r) in out_left.iter().zip(&out_right) {
        writer.write_sample(*l)?;
        writer.write_sample(*r)?;
    }
    writer.finalize().context("failed to finalize WAV file")?;

    info!(
        "Rendered {} frames to {}",
        out_left.len(),
        output.display()
    );
    Ok(())
}
