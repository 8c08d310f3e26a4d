use std::fmt;

use chrono::Utc;
use sprite_core::model::{
    Assistant, AssistantId, OptionId, Question, QuestionId, QuizId, QuizOption,
    SKILL_ASSESSMENT_TOPIC, SkillQuiz,
};
use storage::repository::{NewUserRecord, Storage};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    topic: String,
    demo_user: Option<String>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidTopic { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidTopic { raw } => write!(f, "invalid --topic value: {raw}"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("SPRITE_DB_URL").unwrap_or_else(|_| "sqlite:sprite.sqlite3".into());
        let mut topic = std::env::var("SPRITE_SKILL_QUIZ_TOPIC")
            .unwrap_or_else(|_| SKILL_ASSESSMENT_TOPIC.into());
        let mut demo_user = None;

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
                "--topic" => {
                    let value = require_value(&mut args, "--topic")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidTopic { raw: value });
                    }
                    topic = value;
                }
                "--demo-user" => {
                    demo_user = Some(require_value(&mut args, "--demo-user")?);
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
            topic,
            demo_user,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:sprite.sqlite3)");
    eprintln!("  --topic <label>           Topic of the skill quiz (default: skill-assessment)");
    eprintln!("  --demo-user <name>        Also create a user with fresh onboarding state");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  SPRITE_DB_URL, SPRITE_SKILL_QUIZ_TOPIC");
}

fn assistants() -> Result<Vec<Assistant>, Box<dyn std::error::Error>> {
    let roster = [
        (1, "Nova", "/avatars/nova.png", "Patient explanations, one step at a time."),
        (2, "Atlas", "/avatars/atlas.png", "Big-picture thinking with plenty of examples."),
        (3, "Pixel", "/avatars/pixel.png", "Short answers, lots of practice."),
    ];
    let mut out = Vec::with_capacity(roster.len());
    for (id, name, avatar, tagline) in roster {
        out.push(Assistant::new(
            AssistantId::new(id),
            name,
            Some(avatar.to_owned()),
            Some(tagline.to_owned()),
        )?);
    }
    Ok(out)
}

fn skill_quiz(topic: &str) -> Result<SkillQuiz, Box<dyn std::error::Error>> {
    // (prompt, options, index of the correct option)
    let content: [(&str, [&str; 4], usize); 5] = [
        (
            "What does `print(len([1, 2, 3]))` output?",
            ["2", "3", "[1, 2, 3]", "An error"],
            1,
        ),
        (
            "Which keyword defines a function in Python?",
            ["func", "function", "def", "lambda_def"],
            2,
        ),
        (
            "What is the type of `{'a': 1}`?",
            ["list", "set", "tuple", "dict"],
            3,
        ),
        (
            "What does `[x * 2 for x in range(3)]` evaluate to?",
            ["[0, 2, 4]", "[2, 4, 6]", "[0, 1, 2]", "[1, 2, 3]"],
            0,
        ),
        (
            "Average lookup cost of `key in some_dict`?",
            ["O(n)", "O(log n)", "O(1)", "O(n log n)"],
            2,
        ),
    ];

    let questions = content
        .iter()
        .enumerate()
        .map(|(q_idx, (prompt, labels, correct))| {
            let q = q_idx as u64 + 1;
            Question {
                id: QuestionId::new(q),
                prompt: (*prompt).to_owned(),
                options: labels
                    .iter()
                    .enumerate()
                    .map(|(o_idx, label)| QuizOption {
                        id: OptionId::new(q * 10 + o_idx as u64),
                        label: (*label).to_owned(),
                        is_correct: o_idx == *correct,
                    })
                    .collect(),
            }
        })
        .collect();

    Ok(SkillQuiz::new(
        QuizId::new(1),
        topic,
        "Python skill check",
        questions,
    )?)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;

    let roster = assistants()?;
    for assistant in &roster {
        storage.assistants.upsert_assistant(assistant).await?;
    }

    let quiz = skill_quiz(&args.topic)?;
    storage.quizzes.upsert_quiz(&quiz).await?;

    if let Some(name) = args.demo_user {
        let user_id = storage
            .users
            .insert_user(NewUserRecord {
                display_name: name,
                created_at: Utc::now(),
            })
            .await?;
        tracing::info!(%user_id, "created demo user");
    }

    tracing::info!(
        assistants = roster.len(),
        questions = quiz.questions().len(),
        topic = %args.topic,
        db = %args.db_url,
        "seed complete"
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "seed failed");
        std::process::exit(2);
    }
}
