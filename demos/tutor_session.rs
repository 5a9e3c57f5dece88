//! Tutor session walkthrough
//!
//! Runs a scripted learner through two Rhai exercises: one solved with
//! help (halved retention window), one solved unaided, and one wrong
//! answer along the way.
//!
//! Run with: `RUST_LOG=concept_trainer=debug cargo run --example tutor_session`

use std::sync::Arc;

use anyhow::Context;
use concept_trainer::catalog::StaticCatalog;
use concept_trainer::clock::SystemClock;
use concept_trainer::config::TrainerConfig;
use concept_trainer::kv::MemoryKvStore;
use concept_trainer::progress::{LearningEngine, ProgressStore};
use concept_trainer::sandbox::{ChannelState, ExecutionChannel};
use concept_trainer::session::{BufferEditor, CodeEditor, SessionController};

const CATALOG: &str = r#"[
    {
        "id": "arithmetic", "number": 1, "category": "Core Syntax", "difficulty": "beginner",
        "name": "1. Arithmetic", "description": "Integer math",
        "instruction": "Print the product of 6 and 7",
        "boilerplate": "// Your code here",
        "answer": "print(6 * 7);", "expectedOutput": "42",
        "explanation": "Rhai integers support the usual operators.",
        "example": "let x = 2 + 3 * 4;",
        "docsUrl": "https://rhai.rs/book/language/num-op.html"
    },
    {
        "id": "loops", "number": 2, "category": "Control Flow", "difficulty": "beginner",
        "name": "2. Loops", "description": "Repeat work with for",
        "instruction": "Print the sum of 1 through 10",
        "boilerplate": "let total = 0;\n// Your code here\nprint(total);",
        "answer": "let total = 0;\nfor i in 1..=10 { total += i; }\nprint(total);",
        "expectedOutput": "55",
        "testCases": [{"input": "1..=10", "expected": "55"}],
        "prerequisites": ["arithmetic"]
    }
]"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = TrainerConfig::builder().default_expiry_days(14).build()?;
    let store = ProgressStore::new(MemoryKvStore::new());
    let engine = Arc::new(LearningEngine::load(store, SystemClock, &config).await?);

    let channel = ExecutionChannel::rhai(*config.sandbox());
    if let ChannelState::Failed(reason) = channel.ready().await {
        anyhow::bail!("sandbox unavailable: {reason}");
    }

    let catalog = StaticCatalog::from_json(CATALOG).context("parsing demo catalog")?;
    let mut session =
        SessionController::new(&catalog, engine, channel, BufferEditor::default(), &config)
            .await?;
    let (_expired, _evictions) = session.start().await?;

    // Concept 1: stuck, peek at the answer, then solve
    let loaded = session.load_concept("arithmetic").await?;
    println!("== {} ==\n{}\n", loaded.name, loaded.instruction);

    session.editor_mut().set_text("print(6 + 7);");
    println!("{}\n", session.run().await?);

    let panel = session.open_teaching_panel().await?;
    println!("Help: {}\nDocs: {}\n", panel.explanation, panel.docs.url);
    if let Some(message) = session.reveal_answer().await? {
        println!("{message}\n");
    }
    println!("{}\n", session.run().await?);

    // Concept 2: solved without help
    let loaded = session
        .navigate(1)
        .await?
        .context("no concept after arithmetic")?;
    println!("== {} ==\n{}\n", loaded.name, loaded.instruction);
    if let Some(tests) = session.show_tests() {
        println!("{tests}");
    }
    session
        .editor_mut()
        .set_text("let total = 0;\nfor i in 1..=10 { total += i; }\nprint(total);");
    println!("{}\n", session.run().await?);

    println!("Learned:");
    for entry in session.learned_overview().await? {
        let help = if entry.assisted { " (with help)" } else { "" };
        println!("  {}{help}: {}", entry.name, entry.time_remaining);
    }
    println!("\nStill to learn:");
    for group in session.unlearned_view().await? {
        println!("  {group}");
    }

    Ok(())
}
