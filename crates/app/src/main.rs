use std::fmt;
use std::time::Duration;

use chrono::FixedOffset;
use learn_core::model::{Lesson, LessonId, SlotDraft, UserId, weekday_name};
use services::{AppServices, Clock, SessionContext};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as log_fmt};

const DEFAULT_FEED_TICK_SECS: u64 = 60;
const DEFAULT_DB_URL: &str = "sqlite:dev.sqlite3";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { command: &'static str, flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidUserId { raw: String },
    InvalidLessonId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidOffset { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    InvalidAnswers { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { command, flag } => write!(f, "{command} requires {flag}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw:?}"),
            ArgsError::InvalidLessonId { raw } => write!(f, "invalid --lesson value: {raw:?}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidOffset { raw } => write!(f, "invalid UTC offset (minutes): {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidAnswers { raw } => {
                write!(f, "invalid --answers value: {raw} (expected e.g. 1,0,2)")
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- feed          [--show-all] [--watch]");
    eprintln!("  cargo run -p app -- leaderboard");
    eprintln!("  cargo run -p app -- schedule-add  --day <Monday> --start <HH:MM> --end <HH:MM> [--duration 5]");
    eprintln!("  cargo run -p app -- quiz          --lesson <id> --answers <1,0,...>");
    eprintln!();
    eprintln!("Common flags:");
    eprintln!("  --db <sqlite_url>       default {DEFAULT_DB_URL}");
    eprintln!("  --user <id>             default demo-learner-1");
    eprintln!("  --utc-offset <minutes>  default 0");
    eprintln!();
    eprintln!("Environment (a .env file is read if present):");
    eprintln!("  LEARN_DB_URL, LEARN_USER_ID, LEARN_UTC_OFFSET_MINUTES, LEARN_FEED_TICK_SECS");
    eprintln!("  RUST_LOG (default info)");
}

#[derive(Debug)]
enum Command {
    Feed { show_all: bool, watch: bool },
    Leaderboard,
    ScheduleAdd(SlotDraft),
    Quiz { lesson: LessonId, answers: Vec<usize> },
}

/// Flags as typed; turned into a `Command` once the whole line is read.
#[derive(Default)]
struct RawFlags {
    show_all: bool,
    watch: bool,
    day: Option<String>,
    start: Option<String>,
    end: Option<String>,
    duration: Option<u32>,
    lesson: Option<String>,
    answers: Option<String>,
}

struct Args {
    db_url: String,
    user_id: UserId,
    utc_offset: FixedOffset,
    feed_tick: Duration,
    command: Command,
}

impl Args {
    fn parse(argv: Vec<String>) -> Result<Self, ArgsError> {
        let mut args = argv.into_iter();
        let name = args
            .next()
            .ok_or_else(|| ArgsError::UnknownCommand(String::new()))?;

        let mut db_url = normalize_sqlite_url(
            std::env::var("LEARN_DB_URL").unwrap_or_else(|_| DEFAULT_DB_URL.into()),
        );
        let mut user = std::env::var("LEARN_USER_ID").unwrap_or_else(|_| "demo-learner-1".into());
        let mut offset = match std::env::var("LEARN_UTC_OFFSET_MINUTES") {
            Ok(raw) => parse_offset(&raw)?,
            Err(_) => FixedOffset::east_opt(0).ok_or(ArgsError::InvalidOffset { raw: "0".into() })?,
        };
        let tick_secs = match std::env::var("LEARN_FEED_TICK_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| ArgsError::InvalidNumber {
                flag: "LEARN_FEED_TICK_SECS",
                raw,
            })?,
            Err(_) => DEFAULT_FEED_TICK_SECS,
        };

        let mut flags = RawFlags::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => user = require_value(&mut args, "--user")?,
                "--utc-offset" => offset = parse_offset(&require_value(&mut args, "--utc-offset")?)?,
                "--show-all" => flags.show_all = true,
                "--watch" => flags.watch = true,
                "--day" => flags.day = Some(require_value(&mut args, "--day")?),
                "--start" => flags.start = Some(require_value(&mut args, "--start")?),
                "--end" => flags.end = Some(require_value(&mut args, "--end")?),
                "--duration" => {
                    let value = require_value(&mut args, "--duration")?;
                    let parsed = value.trim().parse().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--duration",
                        raw: value.clone(),
                    })?;
                    flags.duration = Some(parsed);
                }
                "--lesson" => flags.lesson = Some(require_value(&mut args, "--lesson")?),
                "--answers" => flags.answers = Some(require_value(&mut args, "--answers")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let user_id = UserId::new(user.trim()).map_err(|_| ArgsError::InvalidUserId { raw: user })?;
        let command = build_command(&name, flags)?;

        Ok(Self {
            db_url,
            user_id,
            utc_offset: offset,
            feed_tick: Duration::from_secs(tick_secs.max(1)),
            command,
        })
    }
}

fn build_command(name: &str, flags: RawFlags) -> Result<Command, ArgsError> {
    match name {
        "feed" => Ok(Command::Feed {
            show_all: flags.show_all,
            watch: flags.watch,
        }),
        "leaderboard" => Ok(Command::Leaderboard),
        "schedule-add" => {
            let missing = |flag| ArgsError::MissingFlag {
                command: "schedule-add",
                flag,
            };
            Ok(Command::ScheduleAdd(SlotDraft {
                day: flags.day.ok_or_else(|| missing("--day"))?,
                start: flags.start.ok_or_else(|| missing("--start"))?,
                end: flags.end.ok_or_else(|| missing("--end"))?,
                duration: flags.duration.unwrap_or(5),
            }))
        }
        "quiz" => {
            let raw_lesson = flags.lesson.ok_or(ArgsError::MissingFlag {
                command: "quiz",
                flag: "--lesson",
            })?;
            let lesson = LessonId::new(raw_lesson.trim())
                .map_err(|_| ArgsError::InvalidLessonId { raw: raw_lesson })?;
            let raw_answers = flags.answers.unwrap_or_default();
            Ok(Command::Quiz {
                lesson,
                answers: parse_answers(&raw_answers)?,
            })
        }
        other => Err(ArgsError::UnknownCommand(other.to_string())),
    }
}

fn parse_offset(raw: &str) -> Result<FixedOffset, ArgsError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .and_then(|minutes| minutes.checked_mul(60))
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ArgsError::InvalidOffset { raw: raw.to_string() })
}

fn parse_answers(raw: &str) -> Result<Vec<usize>, ArgsError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(|part| part.trim().parse::<usize>())
        .collect::<Result<_, _>>()
        .map_err(|_| ArgsError::InvalidAnswers { raw: raw.to_string() })
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn print_lessons(lessons: &[Lesson]) {
    if lessons.is_empty() {
        println!("No lessons right now. Check your preferences and schedule.");
        return;
    }
    for lesson in lessons {
        println!(
            "{:>4}  {:<12} {}",
            lesson.id().as_str(),
            lesson.category().as_str(),
            lesson.title()
        );
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if argv.is_empty() || matches!(argv[0].as_str(), "--help" | "-h") {
        print_usage();
        return Ok(());
    }

    let args = Args::parse(argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;
    let app = AppServices::new_sqlite(&args.db_url, Clock::default_clock()).await?;
    let ctx = SessionContext::new(args.user_id.clone()).with_utc_offset(args.utc_offset);

    match args.command {
        Command::Feed { show_all, watch } => {
            let ctx = ctx.with_show_all(show_all);
            if !watch {
                print_lessons(&app.feed().personalized_lessons(&ctx).await?);
                return Ok(());
            }

            let watcher = app.feed().watch(ctx, app.changes(), args.feed_tick).await?;
            let mut updates = watcher.updates();
            print_lessons(&updates.borrow_and_update().lessons);
            loop {
                tokio::select! {
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let update = updates.borrow_and_update().clone();
                        tracing::info!(trigger = ?update.trigger, "feed refreshed");
                        print_lessons(&update.lessons);
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            watcher.stop();
        }
        Command::Leaderboard => {
            let board = app.leaderboard().leaderboard(&args.user_id).await?;
            if board.entries.is_empty() {
                println!("No peers share your preferences yet.");
            }
            for (i, entry) in board.entries.iter().enumerate() {
                println!("{:>2}. {:<20} {}", i + 1, entry.name, entry.total_score);
            }
            match board.user_rank {
                Some(rank) => println!("Your rank: {rank}"),
                None => println!("You are not on the leaderboard."),
            }
        }
        Command::ScheduleAdd(draft) => {
            let schedule = app.schedule().add_slot(&args.user_id, &draft).await?;
            println!("Saved. {} slot(s):", schedule.slots().len());
            for slot in schedule.slots() {
                println!(
                    "  {:<9} {}-{}",
                    weekday_name(slot.day()),
                    slot.start(),
                    slot.end()
                );
            }
        }
        Command::Quiz { lesson, answers } => {
            let progress = app.progress();
            let mut run = progress.start_quiz(&args.user_id, &lesson).await?;
            for (index, option) in answers.into_iter().enumerate() {
                run.go_to(index)?;
                run.select(option)?;
            }
            let outcome = progress.finish(&args.user_id, run).await?;
            println!("Score: {}", outcome.score.value());
            println!("Progress: {}%", outcome.progress.lesson_progress(&lesson));
            for event in outcome.achievements {
                println!("Achievement unlocked: {}", event.title());
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(log_fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn parses_schedule_add() {
        let args = Args::parse(argv(&[
            "schedule-add",
            "--user",
            "u1",
            "--day",
            "Monday",
            "--start",
            "09:00",
            "--end",
            "09:05",
        ]))
        .unwrap();
        assert_eq!(args.user_id.as_str(), "u1");
        let Command::ScheduleAdd(draft) = args.command else {
            panic!("expected schedule-add");
        };
        assert_eq!(draft.duration, 5);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn quiz_requires_lesson() {
        let err = Args::parse(argv(&["quiz", "--answers", "1,0"])).err().unwrap();
        assert!(matches!(err, ArgsError::MissingFlag { flag: "--lesson", .. }));
    }

    #[test]
    fn answers_are_comma_separated_indexes() {
        assert_eq!(parse_answers("1, 0,2").unwrap(), vec![1, 0, 2]);
        assert!(parse_answers("1,x").is_err());
        assert!(parse_answers("").unwrap().is_empty());
    }

    #[test]
    fn offset_is_minutes_east() {
        assert_eq!(parse_offset("-300").unwrap().local_minus_utc(), -5 * 3600);
        assert!(parse_offset("abc").is_err());
    }

    #[test]
    fn relative_db_path_becomes_absolute() {
        let url = normalize_sqlite_url("sqlite:data/dev.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/dev.sqlite3"));
    }

    #[test]
    fn default_db_is_dev_sqlite3_in_working_dir() {
        let url = normalize_sqlite_url(DEFAULT_DB_URL.into());
        let expected = std::env::current_dir().unwrap().join("dev.sqlite3");
        assert_eq!(url, format!("sqlite://{}", expected.display()));
    }
}
