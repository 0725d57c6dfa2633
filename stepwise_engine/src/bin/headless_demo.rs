use clap::Parser;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use stepwise_engine::export::{ExportConfig, render_to_wav};
use stepwise_engine::{
    AudioEngine, EngineConfig, LiveNotePlayer, Sampler, Sequencer, Session, Transport,
};

/// Plays the demo session on the default output device, or bounces it to a WAV file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Engine settings (TOML). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 5.0)]
    seconds: f64,

    /// Mono WAV at the engine sample rate for the kick channel.
    #[arg(long)]
    kick: Option<PathBuf>,

    /// Render offline to this file instead of playing.
    #[arg(long)]
    export: Option<PathBuf>,
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let kick = match &args.kick {
        Some(path) => Some(Sampler::from_file_or_silent(path, config.sample_rate)?),
        None => None,
    };
    let session = Session::demo(kick)?;
    let total_samples = (args.seconds.max(0.0) * config.sample_rate as f64) as u64;

    if let Some(path) = &args.export {
        let (player, _input) = LiveNotePlayer::new();
        let transport = Transport::new(config.transport());
        let (mut sequencer, _handle) = Sequencer::new(session.into_handle(), transport, player);
        sequencer.play();
        let export = ExportConfig {
            sample_rate: config.sample_rate,
            chunk_size: config.chunk_size,
        };
        render_to_wav(&mut sequencer, total_samples, path, &export)?;
        return Ok(());
    }

    let engine = AudioEngine::new(config, session)?;
    tracing::info!("[Headless] Engine initialized, playing for {:.1}s", args.seconds);
    engine.play();
    thread::sleep(Duration::from_secs_f64(args.seconds.max(0.0)));

    engine.stop();
    thread::sleep(Duration::from_millis(200));
    tracing::info!(
        "[Headless] Done: {} samples played, {} underruns",
        engine.samples_processed(),
        engine.underruns()
    );
    Ok(())
}
