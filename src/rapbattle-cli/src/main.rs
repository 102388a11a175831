//! RapBattle CLI - AI Rap Battles
//!
//! Console client: starts a battle, streams the verses, plays the role of
//! the audio player by saving each clip and acking it.

use anyhow::{anyhow, Result};
use clap::Parser;
use colored::Colorize;
use rapbattle_core::{
    default_config, Config, DebateService, DisabledSpeech, HeadlineSource, HttpHeadlineClient,
    HttpSpeechClient, MemoryPersonaStore, OpenAiChatClient, Phase, PersonaStore,
    SpeechSynthesizer, VoiceTable,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "rapbattle",
    version,
    about = "AI Rap Battles - two personas, one topic, a judge",
    long_about = "Runs an AI rap debate: two personas trade verses FOR and AGAINST a topic, \
                  a judge model scores the transcript, and the leaderboard updates."
)]
struct Cli {
    /// The topic to battle over (defaults to the top news headline)
    #[arg(value_name = "TOPIC")]
    topic: Option<String>,

    /// Extra context shown to both rappers
    #[arg(long, value_name = "TEXT")]
    description: Option<String>,

    /// Persona arguing FOR the topic
    #[arg(long, value_name = "NAME")]
    pro: String,

    /// Persona arguing AGAINST the topic
    #[arg(long, value_name = "NAME")]
    con: String,

    /// Path to custom config.toml file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output directory for audio clips
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    output_dir: PathBuf,

    /// Disable audio synthesis (text-only battle)
    #[arg(long)]
    disable_audio: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else if PathBuf::from("config.toml").exists() {
        Config::load("config.toml")?
    } else {
        default_config()
    };
    config.apply_env();

    if config.llm.api_key.is_empty() {
        eprintln!(
            "{}",
            "Warning: no LLM API key configured. Completions may fail.".yellow()
        );
    }

    // Wire up the service
    let store = Arc::new(MemoryPersonaStore::new());
    store.seed_if_empty(&config.personas.seed).await?;

    let llm = Arc::new(OpenAiChatClient::from_config(&config.llm)?);
    let tts: Arc<dyn SpeechSynthesizer> = if cli.disable_audio {
        Arc::new(DisabledSpeech)
    } else {
        Arc::new(HttpSpeechClient::from_config(&config.tts)?)
    };
    let headlines: Arc<dyn HeadlineSource> = if config.news.api_key.is_empty() {
        Arc::new(rapbattle_core::NoHeadlines)
    } else {
        Arc::new(HttpHeadlineClient::from_config(&config.news)?)
    };

    let service = DebateService::new(
        llm,
        tts,
        store,
        headlines,
        VoiceTable::from_config(&config.voices),
        Duration::from_secs(300),
    );

    let topic = match cli.topic.clone() {
        Some(topic) => topic,
        None => service
            .top_headline()
            .await?
            .ok_or_else(|| anyhow!("no topic given and no headline available; pass TOPIC"))?,
    };

    if !cli.disable_audio {
        std::fs::create_dir_all(&cli.output_dir)?;
    }

    // Print header
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - battle of the bars", "RapBattle".bold())
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Topic:".bold(), topic.bright_white());
    println!(
        "  {} {}   {} {}",
        cli.pro.bright_cyan().bold(),
        "(FOR)".yellow(),
        cli.con.bright_magenta().bold(),
        "(AGAINST)".yellow()
    );
    println!();
    println!("{}", "─".repeat(70).dimmed());

    let (id, mut stream) = service
        .start_debate(&cli.pro, &cli.con, &topic, cli.description.clone())
        .await?;

    while let Some(snapshot) = stream.next().await {
        let speaker = if snapshot.is_pro_turn {
            snapshot.pro.clone()
        } else {
            snapshot.con.clone()
        };
        match snapshot.phase {
            Phase::GeneratingText => {
                println!();
                println!(
                    "{} {} {}",
                    "▶".bright_cyan(),
                    speaker.bright_cyan().bold(),
                    format!(
                        "(turn {}/{}, writing a verse...)",
                        snapshot.current_turn, snapshot.total_turns
                    )
                    .dimmed()
                );
            }
            Phase::AwaitingPlaybackAck | Phase::SynthesizingAudio
                if !snapshot.current_turn_text.is_empty() =>
            {
                for line in wrap(&snapshot.current_turn_text, 66).lines() {
                    println!("  {}", line);
                }
                if let Some(clip) = &snapshot.current_turn_audio {
                    let filename =
                        format!("turn-{:02}.{}", snapshot.current_turn, clip.file_extension());
                    let path = cli.output_dir.join(filename);
                    std::fs::write(&path, &clip.bytes)?;
                    println!("  {} {}", "♪ saved".bright_green(), path.display());
                    service.ack_audio(id).await?;
                }
            }
            Phase::Judging => {
                println!();
                println!("{}", "The judge is deliberating...".bright_yellow());
            }
            Phase::Finished => {
                println!();
                println!("{}", "═".repeat(70).bright_blue());
                match snapshot.winner.as_deref() {
                    Some("Draw") => {
                        println!("{}", "  It's a draw!".bright_yellow().bold());
                    }
                    Some(winner @ ("StatsError" | "ErrorParsing" | "ErrorJudging")) => {
                        println!("{} {}", "  No verdict:".red().bold(), winner.red());
                    }
                    Some(winner) => {
                        println!(
                            "{}",
                            format!("  Winner: {}", winner).bright_green().bold()
                        );
                    }
                    None => {}
                }
                if let Some(reasoning) = &snapshot.reasoning {
                    println!();
                    for line in wrap(reasoning, 66).lines() {
                        println!("  {}", line.dimmed());
                    }
                }
                if let Some(rubric) = &snapshot.rubric {
                    println!();
                    println!(
                        "  {:<12} {:>6} {:>9} {:>9} {:>8} {:>6}",
                        "", "logic", "sentiment", "adherence", "rebuttal", "total"
                    );
                    for (name, card) in [(&snapshot.pro, rubric.pro), (&snapshot.con, rubric.con)]
                    {
                        println!(
                            "  {:<12} {:>6} {:>9} {:>9} {:>8} {:>6}",
                            name,
                            card.logic,
                            card.sentiment,
                            card.adherence,
                            card.rebuttal,
                            card.total()
                        );
                    }
                }
                println!("{}", "═".repeat(70).bright_blue());
            }
            Phase::Cancelled => {
                println!("{}", "Battle cancelled.".yellow());
            }
            Phase::Failed => {
                println!(
                    "{} {}",
                    "Battle failed:".red().bold(),
                    snapshot.error_message.as_deref().unwrap_or("unknown error")
                );
            }
            _ => {}
        }
    }

    // Leaderboard
    let board = service.leaderboard().await?;
    if !board.is_empty() {
        println!();
        println!("{}", "Leaderboard".bold());
        for (i, entry) in board.iter().enumerate() {
            println!(
                "  {:>2}. {:<20} {:>3}W {:>3}L  {:>5.1}%",
                i + 1,
                entry.name,
                entry.wins,
                entry.losses,
                entry.win_pct
            );
        }
    }
    println!();

    Ok(())
}

/// Simple text wrapping for console output.
fn wrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}
