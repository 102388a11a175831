//! Prompt assembly for battle turns and judging.
//!
//! Everything in this module is pure and deterministic; the orchestrator
//! owns all I/O.

use serde::Serialize;

use crate::error::DebateError;
use crate::llm::ChatMessage;

/// Longest topic title accepted, measured after trimming.
pub const MAX_TOPIC_CHARS: usize = 150;

/// The subject a battle argues over. Ephemeral; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topic {
    pub title: String,
    pub description: Option<String>,
}

impl Topic {
    pub fn new(title: &str, description: Option<String>) -> Result<Self, DebateError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DebateError::InvalidArgument(
                "topic title cannot be empty".to_string(),
            ));
        }
        if title.chars().count() > MAX_TOPIC_CHARS {
            return Err(DebateError::InvalidArgument(format!(
                "topic title exceeds {} characters",
                MAX_TOPIC_CHARS
            )));
        }
        Ok(Self {
            title: title.to_string(),
            description: description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        })
    }
}

/// Round for a one-based turn number: turns 1-2 are round 1, 3-4 round 2,
/// 5-6 round 3.
pub fn round_for_turn(turn: u32) -> u32 {
    (turn + 1) / 2
}

fn round_tone(round: u32) -> &'static str {
    match round {
        1 => "focused and competitive, but respectful",
        2 => "escalated: aggressive and dismissive of your opponent",
        _ => "completely off the rails: irrational, insulting and absurd; profanity is permitted",
    }
}

/// System prompt for one battle turn.
pub fn turn_system_prompt(
    active: &str,
    opponent: &str,
    topic: &Topic,
    is_pro: bool,
    turn: u32,
    max_chars: usize,
) -> String {
    let stance = if is_pro { "FOR" } else { "AGAINST" };
    let round = round_for_turn(turn);
    let description = topic
        .description
        .as_deref()
        .map(|d| format!("\nTOPIC DETAILS: {}", d))
        .unwrap_or_default();

    format!(
        r#"You are {active}, a battle rapper in a head-to-head rap debate.

DEBATE TOPIC: {title}{description}

YOUR STANCE: You are arguing {stance} the topic.
YOUR OPPONENT: {opponent}

ROUND {round} OF 3. Your tone this round is {tone}.

RULES:
- Rap in character as {active}; never break character or mention being an AI
- Directly counter the LAST SENTENCE of your opponent's most recent verse
- Stay on topic and defend your stance with punchlines and wordplay
- Keep your verse under {max_chars} characters
- Output ONLY the spoken verse: no stage directions, no markdown, no headers"#,
        active = active,
        title = topic.title,
        description = description,
        stance = stance,
        opponent = opponent,
        round = round,
        tone = round_tone(round),
        max_chars = max_chars,
    )
}

/// Map debate history to chat roles from the active persona's seat.
///
/// Entry `i` belongs to the pro persona iff `i` is even. Lines by the active
/// persona become `assistant` messages, the opponent's become `user`, so the
/// sequence always ends on the opponent's latest verse.
pub fn history_messages(history: &[String], active_is_pro: bool) -> Vec<ChatMessage> {
    history
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let by_pro = i % 2 == 0;
            if by_pro == active_is_pro {
                ChatMessage::assistant(text.clone())
            } else {
                ChatMessage::user(text.clone())
            }
        })
        .collect()
}

/// System prompt instructing the judge and pinning its output format.
pub fn judge_system_prompt(pro: &str, con: &str, topic: &Topic) -> String {
    format!(
        r#"You are the judge of a rap debate on the topic "{title}".
Rapper1 is {pro}, who argued FOR the topic.
Rapper2 is {con}, who argued AGAINST the topic.

Score each rapper from 1 to 5 on logic, sentiment, adherence to the topic,
and rebuttal of the opponent. Respond with EXACTLY these lines and nothing
else:

Reasoning: <one short paragraph explaining your verdict>
Rapper1_Logic: <1-5>
Rapper2_Logic: <1-5>
Rapper1_Sentiment: <1-5>
Rapper2_Sentiment: <1-5>
Rapper1_Adherence: <1-5>
Rapper2_Adherence: <1-5>
Rapper1_Rebuttal: <1-5>
Rapper2_Rebuttal: <1-5>"#,
        title = topic.title,
        pro = pro,
        con = con,
    )
}

/// Full transcript as the single user message handed to the judge.
pub fn judge_transcript(pro: &str, con: &str, history: &[String]) -> String {
    let mut transcript = String::from("Here is the full battle transcript:\n");
    for (i, text) in history.iter().enumerate() {
        let speaker = if i % 2 == 0 { pro } else { con };
        transcript.push_str(&format!("Turn {} ({}): {}\n", i + 1, speaker, text));
    }
    transcript
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRole;

    fn topic() -> Topic {
        Topic::new("AI", None).unwrap()
    }

    #[test]
    fn test_topic_rejects_empty_title() {
        assert!(Topic::new("   ", None).is_err());
    }

    #[test]
    fn test_topic_rejects_oversized_title() {
        let long = "x".repeat(MAX_TOPIC_CHARS + 1);
        assert!(Topic::new(&long, None).is_err());
    }

    #[test]
    fn test_topic_trims_and_drops_blank_description() {
        let topic = Topic::new("  AI  ", Some("   ".to_string())).unwrap();
        assert_eq!(topic.title, "AI");
        assert!(topic.description.is_none());
    }

    #[test]
    fn test_round_for_turn_mapping() {
        assert_eq!(round_for_turn(1), 1);
        assert_eq!(round_for_turn(2), 1);
        assert_eq!(round_for_turn(3), 2);
        assert_eq!(round_for_turn(4), 2);
        assert_eq!(round_for_turn(5), 3);
        assert_eq!(round_for_turn(6), 3);
    }

    #[test]
    fn test_turn_prompt_round_one_is_respectful() {
        let prompt = turn_system_prompt("A", "B", &topic(), true, 1, 550);
        assert!(prompt.contains("ROUND 1 OF 3"));
        assert!(prompt.contains("respectful"));
        assert!(prompt.contains("arguing FOR"));
        assert!(prompt.contains("YOUR OPPONENT: B"));
    }

    #[test]
    fn test_turn_prompt_round_three_permits_profanity() {
        let prompt = turn_system_prompt("A", "B", &topic(), false, 6, 550);
        assert!(prompt.contains("ROUND 3 OF 3"));
        assert!(prompt.contains("profanity is permitted"));
        assert!(prompt.contains("arguing AGAINST"));
    }

    #[test]
    fn test_turn_prompt_includes_description_when_present() {
        let topic = Topic::new("AI", Some("Machines writing rhymes".to_string())).unwrap();
        let prompt = turn_system_prompt("A", "B", &topic, true, 1, 550);
        assert!(prompt.contains("TOPIC DETAILS: Machines writing rhymes"));
    }

    #[test]
    fn test_history_empty_before_first_turn() {
        assert!(history_messages(&[], true).is_empty());
    }

    #[test]
    fn test_history_roles_for_pro_turn() {
        let history = vec!["p1".to_string(), "c1".to_string()];
        let messages = history_messages(&history, true);
        assert_eq!(messages[0].role, ChatRole::Assistant);
        assert_eq!(messages[1].role, ChatRole::User);
        assert_eq!(messages.last().unwrap().role, ChatRole::User);
    }

    #[test]
    fn test_history_roles_for_con_turn() {
        let history = vec!["p1".to_string(), "c1".to_string(), "p2".to_string()];
        let messages = history_messages(&history, false);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[1].role, ChatRole::Assistant);
        assert_eq!(messages[2].role, ChatRole::User);
        assert_eq!(messages.last().unwrap().role, ChatRole::User);
    }

    #[test]
    fn test_history_always_ends_with_user_message() {
        for len in 1..=6usize {
            let history: Vec<String> = (0..len).map(|i| format!("t{}", i + 1)).collect();
            // Whoever speaks next is the opposite seat of the last entry.
            let last_was_pro = (len - 1) % 2 == 0;
            let messages = history_messages(&history, !last_was_pro);
            assert_eq!(
                messages.last().unwrap().role,
                ChatRole::User,
                "history of length {len} must end with the opponent's verse"
            );
        }
    }

    #[test]
    fn test_judge_prompt_names_both_rappers() {
        let prompt = judge_system_prompt("A", "B", &topic());
        assert!(prompt.contains("Rapper1 is A"));
        assert!(prompt.contains("Rapper2 is B"));
        assert!(prompt.contains("Rapper1_Rebuttal"));
    }

    #[test]
    fn test_judge_transcript_labels_turns() {
        let history = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let transcript = judge_transcript("A", "B", &history);
        assert!(transcript.contains("Turn 1 (A): one"));
        assert!(transcript.contains("Turn 2 (B): two"));
        assert!(transcript.contains("Turn 3 (A): three"));
    }
}
