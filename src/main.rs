mod app;

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use config::Config;

use crate::app::comms::{list_ports, open_port, Link};
use crate::app::report::{DiskSink, ResultSink};

/// Host tool for tuning and calibrating a motorized fader controller.
#[derive(Parser, Debug)]
#[command(name = "fader-tuning", version)]
struct Cli {
    /// JSON configuration, fields left out keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port, autodetected when omitted
    #[arg(long)]
    port: Option<String>,

    #[arg(long)]
    baud: Option<u32>,

    /// Root for the data/ and results/ directories
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the PID gain sweep
    Tune {
        #[arg(long)]
        fader: Option<u8>,
        #[arg(long)]
        speed_div: Option<f32>,
        #[arg(long)]
        repeats: Option<usize>,
        #[arg(long)]
        keep: Option<usize>,
    },
    /// Segmented ADC calibration
    Calibrate {
        #[arg(long)]
        segments: Option<usize>,
        #[arg(long)]
        k: Option<f64>,
        #[arg(long)]
        margin: Option<f64>,
        #[arg(long)]
        hz: Option<f64>,
        #[arg(long)]
        meas_sec: Option<f64>,
        #[arg(long)]
        move_sec: Option<f64>,
        /// Where to write the firmware lookup table header
        #[arg(long)]
        header: Option<PathBuf>,
    },
    /// List serial ports
    Ports,
}

fn override_with<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::new(),
    };
    if cli.port.is_some() {
        config.link.port = cli.port.clone();
    }

    match cli.command {
        Cmd::Tune { fader, speed_div, repeats, keep } => {
            let t = &mut config.tuning;
            override_with(&mut t.baud_rate, cli.baud);
            override_with(&mut t.fader_index, fader);
            override_with(&mut t.speed_divisor, speed_div);
            override_with(&mut t.repeats, repeats);
            override_with(&mut t.keep_best, keep);
        }
        Cmd::Calibrate { segments, k, margin, hz, meas_sec, move_sec, .. } => {
            let c = &mut config.calibration;
            override_with(&mut c.baud_rate, cli.baud);
            override_with(&mut c.segments, segments);
            override_with(&mut c.k, k);
            override_with(&mut c.margin_pct, margin);
            override_with(&mut c.rate_hz, hz);
            override_with(&mut c.measure_secs, meas_sec);
            override_with(&mut c.move_secs, move_sec);
        }
        Cmd::Ports => {}
    }

    config.validate()?;
    Ok(config)
}

fn run_tag() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{}", secs)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    match &cli.command {
        Cmd::Ports => {
            for (name, vid) in list_ports()? {
                match vid {
                    Some(vid) => println!("{}\tvid={:04x}", name, vid),
                    None => println!("{}", name),
                }
            }
        }
        Cmd::Tune { .. } => {
            let tuning = &config.tuning;
            let mut sink = DiskSink::new(&cli.out_dir, &run_tag(), None)?;
            let mut link = Link::new(open_port(&config.link, tuning.baud_rate)?);

            let results = app::tuning::sweep(&mut link, tuning, sink.data_dir())
                .context("tuning sweep failed")?;
            if results.is_empty() {
                warn!("no gain set produced data");
            }
            for result in &results {
                sink.sweep(result)?;
            }
        }
        Cmd::Calibrate { header, .. } => {
            let cal = &config.calibration;
            let mut sink = DiskSink::new(&cli.out_dir, &run_tag(), header.clone())?;
            let mut link = Link::new(open_port(&config.link, cal.baud_rate)?);

            let profile = app::segments::calibrate(&mut link, cal, &mut sink)
                .context("segmented calibration failed")?;
            info!("centers {:?}", profile.centers);
            info!("deadzones {:?}", profile.deadzones);
        }
    }

    Ok(())
}
