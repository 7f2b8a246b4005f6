use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use quiz_core::model::{
    InterruptionReason, Question, QuestionDraft, QuizSettings, SettingsError,
};
use services::{
    AnswerOutcome, QuestionBank, QuizSession, SessionError, SessionObserver, SessionProgress,
    SessionState,
};
use storage::repository::Storage;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    Settings(SettingsError),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::Settings(err) => write!(f, "invalid settings: {err}"),
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

fn parse_number<T: std::str::FromStr>(raw: String, flag: &'static str) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quiz play [--db <sqlite_url>] [--max-questions <n>] [--timeout-ms <ms>]");
    eprintln!("  quiz seed [--db <sqlite_url>]");
    eprintln!(
        "  quiz add  [--db <sqlite_url>] --text <question> --option <a> (x4) --correct <0-3>"
    );
    eprintln!("  quiz list [--db <sqlite_url>] [--limit <n>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:quiz.sqlite3");
    eprintln!("  --max-questions {}", QuizSettings::DEFAULT_MAX_QUESTIONS);
    eprintln!(
        "  --timeout-ms {}",
        QuizSettings::DEFAULT_STORAGE_TIMEOUT.as_millis()
    );
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_MAX_QUESTIONS, QUIZ_STORAGE_TIMEOUT_MS, RUST_LOG");
}

fn print_controls() {
    println!("Controls:");
    println!("  1-4   answer the current question");
    println!("  n     next question");
    println!("  call  simulate an incoming call");
    println!("  sms   simulate an incoming SMS");
    println!("  bg    send the app to the background");
    println!("  fg    bring the app back");
    println!("  s     show progress");
    println!("  r     restart");
    println!("  q     quit");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Seed,
    Add,
    List,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "seed" => Some(Self::Seed),
            "add" => Some(Self::Add),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    settings: QuizSettings,
    draft: QuestionDraft,
    limit: u32,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("sqlite:quiz.sqlite3".into()), normalize_sqlite_url);
        let mut max_questions = std::env::var("QUIZ_MAX_QUESTIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(QuizSettings::DEFAULT_MAX_QUESTIONS);
        let mut timeout = std::env::var("QUIZ_STORAGE_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or(QuizSettings::DEFAULT_STORAGE_TIMEOUT, Duration::from_millis);
        let mut draft = QuestionDraft::new("", Vec::<String>::new(), -1);
        let mut limit = 50;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--max-questions" => {
                    let value = require_value(args, "--max-questions")?;
                    max_questions = parse_number(value, "--max-questions")?;
                }
                "--timeout-ms" => {
                    let value = require_value(args, "--timeout-ms")?;
                    timeout = Duration::from_millis(parse_number(value, "--timeout-ms")?);
                }
                "--text" => draft.text = require_value(args, "--text")?,
                "--option" => draft.options.push(require_value(args, "--option")?),
                "--correct" => {
                    let value = require_value(args, "--correct")?;
                    draft.correct_index = parse_number(value, "--correct")?;
                }
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    limit = parse_number(value, "--limit")?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let settings = QuizSettings::new(max_questions, timeout).map_err(ArgsError::Settings)?;
        Ok(Self {
            db_url,
            settings,
            draft,
            limit,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
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

//
// ─── CONSOLE ───────────────────────────────────────────────────────────────────
//

struct ConsoleObserver {
    max_questions: u32,
}

fn print_question(question: &Question) {
    println!();
    println!("{}", question.text());
    for (index, option) in question.options().iter().enumerate() {
        println!("  {}. {option}", index + 1);
    }
}

impl SessionObserver for ConsoleObserver {
    fn on_question_changed(&self, question: &Question) {
        print_question(question);
    }

    fn on_score_changed(&self, score: u32) {
        println!("Score: {score}");
    }

    fn on_answered(&self, outcome: &AnswerOutcome) {
        if outcome.is_correct {
            println!("Correct!");
        } else {
            println!("Wrong. The answer was {}.", outcome.correct_index + 1);
        }
    }

    fn on_skipped(&self, reason: InterruptionReason) {
        println!("{}", reason.notice());
    }

    fn on_completed(&self, final_score: u32) {
        println!();
        println!("Quiz finished! Score: {final_score}/{}", self.max_questions);
        println!("Press r to play again or q to quit.");
    }

    fn on_load_failed(&self, message: &str) {
        eprintln!("Could not load a question: {message}");
        eprintln!("Press n to retry.");
    }
}

fn print_progress(progress: &SessionProgress) {
    println!(
        "{} | score {} | question {}/{} | {} left",
        progress.state,
        progress.score,
        progress.asked,
        progress.max_questions,
        progress.remaining()
    );
    if let Some(question) = &progress.current {
        print_question(question);
        if progress.state == SessionState::Answered {
            println!("(answered; press n for the next question)");
        }
    }
}

/// Print recoverable session errors; only a closed session ends the loop.
fn report<T>(result: Result<T, SessionError>) -> Result<Option<T>, SessionError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(SessionError::Closed) => Err(SessionError::Closed),
        Err(SessionError::Bank(_)) => Ok(None),
        Err(err) => {
            println!("{err}");
            Ok(None)
        }
    }
}

/// Next line of input; `None` at end of input or when reading fails.
async fn next_input<R: AsyncBufRead + Unpin>(lines: &mut Lines<R>) -> Option<String> {
    match lines.next_line().await {
        Ok(line) => line,
        Err(err) => {
            log::warn!("stopped reading input: {err}");
            None
        }
    }
}

async fn play(bank: Arc<QuestionBank>, settings: QuizSettings) -> Result<(), SessionError> {
    let observer = ConsoleObserver {
        max_questions: settings.max_questions(),
    };
    let session = QuizSession::spawn(bank, settings, Arc::new(observer));
    let interruptions = session.interruptions();

    print_controls();
    report(session.start().await)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = next_input(&mut lines).await {
        let input = line.trim();
        match input {
            "" => {}
            "q" | "quit" => break,
            "n" | "next" => {
                report(session.advance().await)?;
            }
            "call" | "sms" => interruptions.interrupt(InterruptionReason::from_tag(input))?,
            "bg" => session.on_background()?,
            "fg" => session.on_foreground()?,
            "s" | "status" => {
                if let Some(progress) = report(session.progress().await)? {
                    print_progress(&progress);
                }
            }
            "r" | "restart" => {
                if report(session.restart().await)?.is_some() {
                    report(session.start().await)?;
                }
            }
            "?" | "help" => print_controls(),
            other => match other.parse::<u8>() {
                Ok(choice @ 1..=4) => {
                    report(session.submit_answer(choice - 1).await)?;
                }
                _ => println!("Unknown input {other:?}; type ? for help."),
            },
        }
    }

    if let Some(progress) = report(session.progress().await)? {
        log::info!(
            "leaving with score {} after {} questions",
            progress.score,
            progress.asked
        );
    }
    Ok(())
}

async fn list(storage: &Storage, limit: u32) -> Result<(), Box<dyn std::error::Error>> {
    let questions = storage.questions.list_questions(limit).await?;
    if questions.is_empty() {
        println!("No questions stored.");
    }
    for question in &questions {
        println!("[{}] {}", question.id(), question.text());
        for (index, option) in question.options().iter().enumerate() {
            let marker = if index == usize::from(question.correct_index()) {
                '*'
            } else {
                ' '
            };
            println!("   {marker} {}. {option}", index + 1);
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Playing is the default when no subcommand is given.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Play,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Play,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    let bank = Arc::new(
        QuestionBank::new(Arc::clone(&storage.questions))
            .with_timeout(parsed.settings.storage_timeout()),
    );

    match cmd {
        Command::Play => {
            bank.ensure_seeded().await?;
            play(bank, parsed.settings).await?;
        }
        Command::Seed => {
            if bank.ensure_seeded().await? {
                println!("Seeded {} questions.", bank.count().await?);
            } else {
                println!("Bank already holds {} questions.", bank.count().await?);
            }
        }
        Command::Add => {
            let id = bank.add(parsed.draft).await?;
            println!("Added question {id}.");
        }
        Command::List => list(&storage, parsed.limit).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
