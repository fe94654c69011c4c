use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::SeedableRng;
use shizi::{
    collaborator::{
        CommandGenerator, CommandRecognizer, ContentGenerator, FileGenerator, Recognizer,
        TranscriptRecognizer,
    },
    config::{Config, ConfigStore, FileConfigStore},
    content::TargetScript,
    mastery::MasteryUpdater,
    round::{grade_round, prepare_round, RoundOutcome, RoundSettings},
    sampler::{CharacterSampler, UniformSampler, WeightedSampler},
    storage::{BackendKind, StoreBackend},
    weight::{days_since_last_seen, weight},
    DrillError,
};
use std::{error::Error, fs, path::PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// adaptive character practice sheets with mastery tracking
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Picks the characters a young reader most needs to practice, turns them into printable practice sheets, and folds graded sheets back into per-character mastery statistics."
)]
pub struct Cli {
    /// character table to use (.csv, or .db/.sqlite for SQLite)
    #[clap(long, global = true)]
    store: Option<PathBuf>,

    /// storage backend, inferred from the table extension when omitted
    #[clap(long, value_enum, global = true)]
    backend: Option<BackendKind>,

    /// configuration file to read instead of the per-user default
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// add the characters of a text to the table
    Init {
        /// text whose characters should be studied
        text: Option<String>,

        /// read the text from a file instead
        #[clap(long)]
        file: Option<PathBuf>,

        /// level tag for the added characters
        #[clap(long, default_value_t = 1)]
        level: i64,
    },

    /// prepare a practice sheet
    Generate {
        /// number of characters to sample
        #[clap(short = 'w', long)]
        number_of_chars: Option<usize>,

        /// number of words to ask the generator for
        #[clap(long)]
        phrases: Option<usize>,

        /// number of short sentences to ask the generator for
        #[clap(long)]
        sentences: Option<usize>,

        /// use pre-generated practice lines from this file instead of the configured generator
        #[clap(long)]
        content: Option<PathBuf>,

        /// write the sheet to this file instead of stdout
        #[clap(short = 'o', long)]
        output: Option<PathBuf>,

        /// seed for reproducible sampling
        #[clap(long)]
        seed: Option<u64>,

        /// sample uniformly instead of targeting weak and neglected characters
        #[clap(long)]
        random: bool,
    },

    /// fold graded sheets back into the table
    Grade {
        /// transcripts in char(code) notation, or photos with --recognize
        #[clap(required = true)]
        files: Vec<PathBuf>,

        /// pass files to the configured recognizer command
        #[clap(long)]
        recognize: bool,
    },

    /// list the characters most in need of practice
    Stats {
        /// number of characters to show
        #[clap(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shizi=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let mut cfg = config_store.load();
    if let Some(path) = &cli.store {
        cfg.store_path = Some(path.clone());
    }
    if let Some(backend) = cli.backend {
        cfg.backend = Some(backend);
    }

    let store_path = cfg.resolved_store_path();
    let kind = cfg.resolved_backend(&store_path);
    info!(path = %store_path.display(), backend = %kind, "using character table");
    let backend = kind.open(&store_path);

    let today = Local::now().date_naive();
    match cli.command {
        Commands::Init { text, file, level } => init(backend.as_ref(), text, file, level),
        Commands::Generate {
            number_of_chars,
            phrases,
            sentences,
            content,
            output,
            seed,
            random,
        } => {
            if let Some(n) = number_of_chars {
                cfg.sample_size = n;
            }
            if let Some(n) = phrases {
                cfg.num_phrases = n;
            }
            if let Some(n) = sentences {
                cfg.num_sentences = n;
            }
            generate(backend.as_ref(), &cfg, content, output, seed, random, today)
        }
        Commands::Grade { files, recognize } => {
            grade(backend.as_ref(), &cfg, &files, recognize, today)
        }
        Commands::Stats { limit } => stats(backend.as_ref(), limit, today),
    }
}

fn init(
    backend: &dyn StoreBackend,
    text: Option<String>,
    file: Option<PathBuf>,
    level: i64,
) -> Result<(), Box<dyn Error>> {
    let text = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => fs::read_to_string(path)?,
        (None, None) => return Err("provide a text or --file".into()),
    };

    let mut store = backend.load()?;
    let candidates = TargetScript::CJK.extract(&text);
    let added = store.register_new(candidates);
    for ch in &added {
        if let Some(record) = store.get_mut(*ch) {
            record.level = level;
        }
    }
    backend.save(&store)?;
    println!(
        "added {} characters ({} total): {}",
        added.len(),
        store.len(),
        added.iter().join("")
    );
    Ok(())
}

fn generate(
    backend: &dyn StoreBackend,
    cfg: &Config,
    content: Option<PathBuf>,
    output: Option<PathBuf>,
    seed: Option<u64>,
    random: bool,
    today: NaiveDate,
) -> Result<(), Box<dyn Error>> {
    let generator: Box<dyn ContentGenerator> = match (content, &cfg.generator) {
        (Some(path), _) => Box::new(FileGenerator::with_path(path)),
        (None, Some(spec)) => Box::new(CommandGenerator::new(spec.clone())),
        (None, None) => {
            return Err("no generator configured: pass --content or set `generator` in the config".into())
        }
    };
    let sampler: Box<dyn CharacterSampler> = if random {
        Box::new(UniformSampler)
    } else {
        Box::new(WeightedSampler)
    };
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut store = backend.load()?;
    let settings = RoundSettings::from(cfg);
    match prepare_round(
        &mut store,
        sampler.as_ref(),
        generator.as_ref(),
        &settings,
        today,
        &mut rng,
    )? {
        RoundOutcome::Sheet(sheet) => {
            backend.save(&store)?;
            if !sheet.new_characters.is_empty() {
                eprintln!(
                    "registered new characters: {}",
                    sheet.new_characters.iter().join("")
                );
            }
            let text = sheet.render();
            match output {
                Some(path) => {
                    fs::write(&path, format!("{text}\n"))?;
                    eprintln!("practice sheet written to {}", path.display());
                }
                None => println!("{text}"),
            }
        }
        RoundOutcome::NoContent { sample, reason } => {
            eprintln!(
                "no practice sheet produced for [{}]: {reason}",
                sample.iter().join("")
            );
        }
    }
    Ok(())
}

fn grade(
    backend: &dyn StoreBackend,
    cfg: &Config,
    files: &[PathBuf],
    recognize: bool,
    today: NaiveDate,
) -> Result<(), Box<dyn Error>> {
    let recognizer: Box<dyn Recognizer> = if recognize {
        let spec = cfg
            .recognizer
            .clone()
            .ok_or("no recognizer configured: set `recognizer` in the config")?;
        Box::new(CommandRecognizer::new(spec))
    } else {
        Box::new(TranscriptRecognizer)
    };
    let updater = MasteryUpdater::new(TargetScript::CJK, cfg.smoothing);

    let mut store = backend.load()?;
    let report = grade_round(&mut store, recognizer.as_ref(), files, &updater, today);
    backend.save(&store)?;

    for (path, err) in &report.failed_images {
        eprintln!("skipped {}: {err}", path.display());
    }
    for err in &report.rejected {
        if let DrillError::UnparsableObservation { line } = err {
            eprintln!("could not read line: {line}");
        }
    }
    println!(
        "updated {} characters from {} lines ({} unreadable marks)",
        report.update.updated.len(),
        report.lines_read,
        report.update.unreadable
    );
    if !report.update.unknown.is_empty() {
        println!(
            "not in the table: {}",
            report.update.unknown.iter().join("")
        );
    }
    Ok(())
}

fn stats(backend: &dyn StoreBackend, limit: usize, today: NaiveDate) -> Result<(), Box<dyn Error>> {
    let store = backend.load()?;
    if store.is_empty() {
        println!("the character table is empty");
        return Ok(());
    }

    println!(
        "{:<4} {:>5} {:>6} {:>7} {:>8} {:>5} {:>7}",
        "char", "level", "seen", "correct", "accuracy", "days", "weight"
    );
    for record in store
        .iter()
        .sorted_by(|a, b| weight(b, today).total_cmp(&weight(a, today)))
        .take(limit)
    {
        println!(
            "{:<4} {:>5} {:>6} {:>7} {:>8.3} {:>5} {:>7.3}",
            record.content,
            record.level,
            record.appearances,
            record.correct,
            record.accuracy,
            days_since_last_seen(record, today),
            weight(record, today)
        );
    }
    Ok(())
}
