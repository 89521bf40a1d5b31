use std::fmt;

use chrono::{DateTime, Utc};
use journey_core::model::{
    Journey, SessionId, SessionStatus, Step, StudentId, TherapySession, Trophy,
};
use journey_core::progress::apply_completions;
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    student: String,
    steps: u32,
    sessions_per_step: u32,
    completed: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_u32(args: &mut impl Iterator<Item = String>, flag: &'static str) -> Result<u32, ArgsError> {
    let value = require_value(args, flag)?;
    value
        .parse::<u32>()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw: value })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("JOURNEY_DB_URL").unwrap_or_else(|_| "sqlite:journeys.sqlite3?mode=rwc".into());
        let mut student = std::env::var("JOURNEY_SEED_STUDENT").unwrap_or_else(|_| "demo".into());
        let mut steps = 3;
        let mut sessions_per_step = 3;
        let mut completed = 4;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--student" => student = require_value(&mut args, "--student")?,
                "--steps" => steps = parse_u32(&mut args, "--steps")?,
                "--sessions-per-step" => {
                    sessions_per_step = parse_u32(&mut args, "--sessions-per-step")?;
                }
                "--completed" => completed = parse_u32(&mut args, "--completed")?,
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            student,
            steps,
            sessions_per_step,
            completed,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>          SQLite URL (default: sqlite:journeys.sqlite3?mode=rwc)");
    eprintln!("  --student <id>             Student to seed (default: demo)");
    eprintln!("  --steps <n>                Journey steps (default: 3)");
    eprintln!("  --sessions-per-step <n>    Sessions assigned per step (default: 3)");
    eprintln!("  --completed <n>            Sessions marked completed, in order (default: 4)");
    eprintln!("  --now <rfc3339>            Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                 Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  JOURNEY_DB_URL, JOURNEY_SEED_STUDENT");
}

/// Replace `student`'s journey with a demo one, recording its sessions
/// first. Returns the stored journey and the number of sessions written.
async fn seed(
    storage: &Storage,
    args: &Args,
    student: &StudentId,
    now: DateTime<Utc>,
) -> Result<(Journey, u32), Box<dyn std::error::Error>> {
    let mut steps = Vec::new();
    let mut seeded = 0_u32;
    for ordinal in 1..=args.steps {
        let mut ids = Vec::new();
        for n in 1..=args.sessions_per_step {
            let id = SessionId::new(format!("{}-s{ordinal}-{n}", student.as_str()))?;
            let status = if seeded < args.completed {
                SessionStatus::Completed
            } else {
                SessionStatus::Scheduled
            };
            seeded += 1;
            storage
                .sessions
                .upsert_session(&TherapySession::new(id.clone(), student.clone(), status, now))
                .await?;
            ids.push(id);
        }
        let required = args.sessions_per_step.max(1).div_ceil(2).max(1);
        let step = Step::new(ordinal, format!("Milestone {ordinal}"), ids, required)?
            .with_trophy(Some(Trophy::new(format!("Trophy {ordinal}"))?));
        steps.push(step);
    }

    storage.journeys.delete_journey_for_student(student).await?;
    let mut journey = Journey::new(
        student.clone(),
        "Demo journey",
        Some("Seeded for local development".into()),
        steps,
        None,
        now,
    )?;
    let completed = storage.sessions.completed_session_ids(student).await?;
    apply_completions(&mut journey, &completed, now);
    let stored = storage.journeys.insert_journey(&journey).await?;
    Ok((stored, seeded))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);
    let student = StudentId::new(args.student.clone())?;
    let (stored, seeded) = seed(&storage, &args, &student, now).await?;

    println!(
        "Seeded journey {} for student {} with {} steps and {} sessions ({} completed) into {}",
        stored.id().map_or(0, |id| id.value()),
        student,
        args.steps,
        seeded,
        args.completed.min(seeded),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
