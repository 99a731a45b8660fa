use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{bail, Context};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use stride_tracker_data_management::{
    log_store::JsonFileLogStore, preferences::Preferences, DataPaths, LogBook,
};
use stride_tracker_lib::{
    log_entry::LogEntry,
    pace::{self, format_duration, format_pace, parse_duration},
    training_plan::generate_plan,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod live;

#[derive(Parser)]
#[command(name = "stride")]
#[command(about = "Track runs, keep a run log and plan training", long_about = None)]
struct Cli {
    /// Directory holding the run log and preferences
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a run from `lat,lon[,epoch_ms]` lines on stdin (or a file). Ctrl-C stops and saves.
    /// With `--input`, stdin takes controls: `p` pauses or resumes, `away` auto-pauses, `s` stops
    Record {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Discard the run instead of saving it
        #[arg(long)]
        discard: bool,
    },
    /// Run a simulated loop around Milan, 5 s of run time per fix.
    /// Takes the same controls as record
    Demo {
        /// Run time to simulate
        #[arg(long, default_value_t = 30)]
        minutes: u64,
        /// Real time between fixes
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
    },
    /// List saved runs, newest first
    List,
    /// Show one run with its splits
    Show { id: String },
    Rename { id: String, title: String },
    Delete { id: String },
    /// Delete every saved run
    Clear,
    /// Log a run by hand, duration as mm:ss or h:mm:ss
    Manual { distance_km: f64, duration: String },
    ImportGpx { file: PathBuf },
    /// Write a run as GPX to stdout or a file
    ExportGpx {
        id: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replace the whole log with a JSON export
    ImportJson { file: PathBuf },
    ExportJson {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Pace for a distance and a duration
    Pace { distance_km: f64, duration: String },
    /// Predict a race time from a recent result (Riegel)
    Predict {
        distance_km: f64,
        duration: String,
        target_km: f64,
    },
    /// Weekly build towards a target volume
    Plan { weeks: u32, weekly_km: f64 },
    /// Interval workout timer, durations in minutes
    Intervals {
        #[arg(long, default_value_t = 10)]
        warmup: u64,
        #[arg(long, default_value_t = 3)]
        work: u64,
        #[arg(long, default_value_t = 2)]
        rest: u64,
        #[arg(long, default_value_t = 5)]
        reps: u32,
        #[arg(long, default_value_t = 5)]
        cooldown: u64,
    },
    /// Show or change preferences
    Prefs {
        #[arg(long)]
        voice: Option<bool>,
        #[arg(long)]
        haptics: Option<bool>,
        #[arg(long)]
        autopause: Option<bool>,
    },
}

fn default_filter() -> String {
    format!("{}=info,stride_tracker_data_management=info", env!("CARGO_CRATE_NAME"))
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Cannot open log file {:?}", path))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| default_filter().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    let paths = match &cli.data_dir {
        Some(dir) => DataPaths::in_dir(dir),
        None => DataPaths::default(),
    };
    tracing::debug!("Using data files {:?}", paths);

    let mut book = LogBook::new(JsonFileLogStore::open(&paths.log_file)?);
    let preferences = Preferences::load(&paths.preferences_file)?;

    match cli.command {
        Commands::Record { input, discard } => {
            let entry = live::record(book, preferences, input, !discard).await?;
            if let Some(entry) = entry {
                print_entry(&entry);
            }
        }
        Commands::Demo { minutes, interval_ms } => {
            let entry = live::demo(book, preferences, minutes, interval_ms).await?;
            if let Some(entry) = entry {
                print_entry(&entry);
            }
        }
        Commands::List => {
            for entry in book.entries()? {
                println!(
                    "{}\t{}\t{:.2} km\t{}\t{}\t{}",
                    entry.id,
                    entry.date.with_timezone(&Local).format("%d/%m/%Y %H:%M"),
                    entry.distance_km,
                    format_duration(entry.duration_seconds),
                    format_pace(entry.pace()),
                    entry.title
                );
            }
        }
        Commands::Show { id } => print_entry(&book.find(&id)?),
        Commands::Rename { id, title } => book.rename(&id, &title)?,
        Commands::Delete { id } => {
            if !book.delete(&id)? {
                bail!("No run with id {}", id);
            }
        }
        Commands::Clear => book.clear()?,
        Commands::Manual { distance_km, duration } => {
            match book.add_manual(distance_km, parse_duration(&duration), Utc::now())? {
                Some(entry) => println!("Added {}", entry.id),
                None => bail!("Enter a distance and a duration like 25:00"),
            }
        }
        Commands::ImportGpx { file } => {
            let text = read_input(&file)?;
            let entry = live::import_gpx(book, preferences, text).await?;
            print_entry(&entry);
        }
        Commands::ExportGpx { id, output } => {
            write_output(output.as_deref(), &book.export_gpx(&id)?)?
        }
        Commands::ImportJson { file } => {
            let text = read_input(&file)?;
            println!("Imported {} runs", book.import_json(&text)?);
        }
        Commands::ExportJson { output } => write_output(output.as_deref(), &book.export_json()?)?,
        Commands::Pace { distance_km, duration } => {
            let pace = parse_duration(&duration)
                .and_then(|seconds| pace::pace_calculator(distance_km, seconds));
            println!("{}", format_pace(pace));
        }
        Commands::Predict { distance_km, duration, target_km } => {
            let prediction = parse_duration(&duration)
                .and_then(|seconds| pace::riegel_prediction(distance_km, seconds, target_km));
            match prediction {
                Some(seconds) => println!(
                    "{}  ({})",
                    format_duration(seconds),
                    format_pace(pace::pace_calculator(target_km, seconds))
                ),
                None => println!("{}", pace::UNDEFINED),
            }
        }
        Commands::Plan { weeks, weekly_km } => match generate_plan(weeks, weekly_km) {
            Some(plan) => {
                println!("Week\tTarget\tEasy\tQuality\tLong\tRecovery");
                for week in plan {
                    println!(
                        "{}\t{:.1} km\t{} km\t{} km\t{} km\t{} km",
                        week.week,
                        week.target_km,
                        week.easy_km,
                        week.quality_km,
                        week.long_km,
                        week.recovery_km
                    );
                }
            }
            None => bail!("Enter at least one week and a weekly volume"),
        },
        Commands::Intervals { warmup, work, rest, reps, cooldown } => {
            live::intervals(preferences, warmup, work, rest, reps, cooldown).await?;
        }
        Commands::Prefs { voice, haptics, autopause } => {
            let mut preferences = preferences;
            if voice.is_some() || haptics.is_some() || autopause.is_some() {
                preferences.voice = voice.unwrap_or(preferences.voice);
                preferences.haptics = haptics.unwrap_or(preferences.haptics);
                preferences.autopause = autopause.unwrap_or(preferences.autopause);
                preferences.save(&paths.preferences_file)?;
            }
            println!(
                "voice: {}\nhaptics: {}\nautopause: {}",
                preferences.voice, preferences.haptics, preferences.autopause
            );
        }
    }

    Ok(())
}

fn print_entry(entry: &LogEntry) {
    println!("{}  {}", entry.title, entry.date.with_timezone(&Local).format("%d/%m/%Y %H:%M"));
    println!(
        "{:.2} km in {}, {}",
        entry.distance_km,
        format_duration(entry.duration_seconds),
        format_pace(entry.pace())
    );
    for split in &entry.splits {
        println!("  km {}\t{}", split.kilometer_index, format_duration(split.duration_seconds));
    }
    println!("id {}", entry.id);
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Cannot read {:?}", path))
}

fn write_output(output: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("Cannot write {:?}", path))?;
            tracing::info!("Wrote {:?}", path);
        }
        None => println!("{}", text),
    }
    Ok(())
}
