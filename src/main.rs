use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use slidebox::config::{load_settings, Settings};
use slidebox::console::TracingConsole;
use slidebox::display::{Display, HeadlessDisplay, TermDisplay};
use slidebox::input::{spawn_line_reader, Control, DummyInput, Input, KeyboardInput};
use slidebox::slideshow::Slideshow;
use slidebox::storage::DirStorage;
use slidebox::{Engine, Peripherals};

/// Picture frame with a text command engine.
#[derive(Debug, Parser)]
#[command(name = "slidebox", version)]
struct Cli {
    /// settings file (default: ./slidebox.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// log display operations instead of drawing the panel in the terminal
    #[arg(long)]
    headless: bool,

    /// file of commands to queue once at start-up
    #[arg(long)]
    commands: Option<PathBuf>,

    /// read commands from stdin, one per line (needs --headless)
    #[arg(long)]
    stdin: bool,

    /// stop after this many main loop iterations; 0 runs forever
    #[arg(long, default_value_t = 0)]
    cycles: u64,
}

fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if settings.headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    } else {
        // the panel owns the terminal, so logs go to a file
        let file = File::create(&settings.log_file).with_context(|| {
            format!("failed to create log file '{}'", settings.log_file.display())
        })?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    if cli.headless {
        settings.headless = true;
    }
    if cli.stdin && !settings.headless {
        bail!("--stdin needs --headless; the terminal panel reads the keyboard itself");
    }
    init_tracing(&settings)?;

    let mut storage = DirStorage::open(&settings.storage_root)
        .with_context(|| format!("failed to open storage at '{}'", settings.storage_root.display()))?;
    let mut console = TracingConsole::new();
    let mut engine = Engine::new(settings.queue_capacity);

    if let Some(path) = &cli.commands {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read commands from '{}'", path.display()))?;
        let report = engine.enqueue_batch(&text);
        info!(
            path = %path.display(),
            accepted = report.accepted,
            rejected = report.rejected.len(),
            "queued command file"
        );
    }
    if cli.stdin {
        // never joined: it lives until stdin closes or the process ends
        let _reader = spawn_line_reader(BufReader::new(io::stdin()), engine.producer());
    }

    let (mut display, mut input): (Box<dyn Display>, Box<dyn Input>) = if settings.headless {
        (Box::new(HeadlessDisplay::new()), Box::new(DummyInput::default()))
    } else {
        (Box::new(TermDisplay::new()?), Box::new(KeyboardInput::new()))
    };
    display.set_brightness(u8::MAX)?;

    let mut slideshow = Slideshow::new(
        settings.slides.clone(),
        settings.captions.clone(),
        settings.slide_ms,
    );
    info!(
        storage = %storage.root().display(),
        slides = settings.slides.len(),
        "slidebox started"
    );

    let mut cycle: u64 = 0;
    loop {
        match input.poll_control()? {
            Some(Control::Quit) => break,
            Some(Control::NextSlide) => slideshow.skip(),
            None => {}
        }

        if slideshow.is_empty() {
            spin_sleep::sleep(Duration::from_millis(settings.idle_ms));
        } else if let Err(e) = slideshow.show_next(display.as_mut(), &storage) {
            warn!("slide failed: {e}");
        }

        let mut io = Peripherals {
            display: display.as_mut(),
            storage: &mut storage,
            console: &mut console,
        };
        engine.run(&mut io);

        cycle += 1;
        if cli.cycles != 0 && cycle >= cli.cycles {
            break;
        }
    }

    info!(cycles = cycle, "slidebox stopped");
    Ok(())
}
