//! Judge-response parsing and score tallying.
//!
//! The judge model is asked for a line-oriented response (see
//! [`crate::prompt::judge_system_prompt`]); this module turns that free-form
//! text into a typed rubric. It is pure and never calls the model.

use serde::Serialize;
use std::collections::HashMap;

const MIN_SCORE: i32 = 1;
const MAX_SCORE: i32 = 5;

const SCORE_KEYS: [&str; 8] = [
    "rapper1_logic",
    "rapper1_sentiment",
    "rapper1_adherence",
    "rapper1_rebuttal",
    "rapper2_logic",
    "rapper2_sentiment",
    "rapper2_adherence",
    "rapper2_rebuttal",
];

/// One persona's four judged dimensions, each in `[1, 5]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreCard {
    pub logic: i32,
    pub sentiment: i32,
    pub adherence: i32,
    pub rebuttal: i32,
}

impl ScoreCard {
    pub fn total(&self) -> i32 {
        self.logic + self.sentiment + self.adherence + self.rebuttal
    }
}

/// The full score grid for both personas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rubric {
    pub pro: ScoreCard,
    pub con: ScoreCard,
}

/// Outcome classification of a judged battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Winner {
    /// A real persona won on points.
    Persona(String),
    /// Totals were equal.
    Draw,
    /// The judge answered, but one or more scores were missing or unusable.
    StatsError,
    /// The judge response carried nothing recognizable at all.
    ErrorParsing,
    /// The judge call itself failed.
    ErrorJudging,
}

impl Winner {
    /// Display label: the persona name, or a sentinel.
    pub fn label(&self) -> &str {
        match self {
            Winner::Persona(name) => name,
            Winner::Draw => "Draw",
            Winner::StatsError => "StatsError",
            Winner::ErrorParsing => "ErrorParsing",
            Winner::ErrorJudging => "ErrorJudging",
        }
    }

    pub fn is_persona(&self) -> bool {
        matches!(self, Winner::Persona(_))
    }
}

/// Parsed verdict handed back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JudgeResult {
    pub winner: Winner,
    pub reasoning: String,
    pub rubric: Option<Rubric>,
}

impl JudgeResult {
    pub fn judging_failed() -> Self {
        Self {
            winner: Winner::ErrorJudging,
            reasoning: String::new(),
            rubric: None,
        }
    }
}

/// Parse the judge's raw response for the battle between `pro` and `con`.
///
/// Lines are matched case-insensitively as `Key: Value` pairs. Scores are
/// clamped to `[1, 5]`; a score that is absent or not an integer stays
/// unknown. All eight known scores produce a winner by total comparison,
/// anything less degrades to `StatsError` with whatever reasoning survived.
pub fn parse_judge_response(raw: &str, pro: &str, con: &str) -> JudgeResult {
    if raw.trim().is_empty() {
        return JudgeResult {
            winner: Winner::ErrorParsing,
            reasoning: String::new(),
            rubric: None,
        };
    }

    let mut scores: HashMap<&'static str, i32> = HashMap::new();
    let mut reasoning = String::new();
    let mut in_reasoning = false;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_ascii_lowercase();
            if key == "reasoning" {
                reasoning = value.trim().to_string();
                in_reasoning = true;
                continue;
            }
            if let Some(canonical) = SCORE_KEYS.iter().find(|k| **k == key) {
                if let Ok(score) = value.trim().parse::<i32>() {
                    scores.insert(canonical, score.clamp(MIN_SCORE, MAX_SCORE));
                }
                in_reasoning = false;
                continue;
            }
        }
        // Unlabeled line: reasoning often wraps across lines.
        if in_reasoning {
            reasoning.push(' ');
            reasoning.push_str(line);
        }
    }

    let rubric = build_rubric(&scores);
    match rubric {
        Some(rubric) => {
            let pro_total = rubric.pro.total();
            let con_total = rubric.con.total();
            let winner = if pro_total > con_total {
                Winner::Persona(pro.to_string())
            } else if con_total > pro_total {
                Winner::Persona(con.to_string())
            } else {
                Winner::Draw
            };
            JudgeResult {
                winner,
                reasoning,
                rubric: Some(rubric),
            }
        }
        None => JudgeResult {
            winner: Winner::StatsError,
            reasoning,
            rubric: None,
        },
    }
}

fn build_rubric(scores: &HashMap<&'static str, i32>) -> Option<Rubric> {
    Some(Rubric {
        pro: ScoreCard {
            logic: *scores.get("rapper1_logic")?,
            sentiment: *scores.get("rapper1_sentiment")?,
            adherence: *scores.get("rapper1_adherence")?,
            rebuttal: *scores.get("rapper1_rebuttal")?,
        },
        con: ScoreCard {
            logic: *scores.get("rapper2_logic")?,
            sentiment: *scores.get("rapper2_sentiment")?,
            adherence: *scores.get("rapper2_adherence")?,
            rebuttal: *scores.get("rapper2_rebuttal")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn well_formed(pro_scores: [i32; 4], con_scores: [i32; 4]) -> String {
        format!(
            "Reasoning: A close one.\n\
             Rapper1_Logic: {}\nRapper1_Sentiment: {}\n\
             Rapper1_Adherence: {}\nRapper1_Rebuttal: {}\n\
             Rapper2_Logic: {}\nRapper2_Sentiment: {}\n\
             Rapper2_Adherence: {}\nRapper2_Rebuttal: {}\n",
            pro_scores[0],
            pro_scores[1],
            pro_scores[2],
            pro_scores[3],
            con_scores[0],
            con_scores[1],
            con_scores[2],
            con_scores[3],
        )
    }

    fn canonical(rubric: &Rubric, reasoning: &str) -> String {
        format!(
            "Reasoning: {}\n\
             Rapper1_Logic: {}\nRapper1_Sentiment: {}\n\
             Rapper1_Adherence: {}\nRapper1_Rebuttal: {}\n\
             Rapper2_Logic: {}\nRapper2_Sentiment: {}\n\
             Rapper2_Adherence: {}\nRapper2_Rebuttal: {}\n",
            reasoning,
            rubric.pro.logic,
            rubric.pro.sentiment,
            rubric.pro.adherence,
            rubric.pro.rebuttal,
            rubric.con.logic,
            rubric.con.sentiment,
            rubric.con.adherence,
            rubric.con.rebuttal,
        )
    }

    #[test]
    fn test_parse_pro_win() {
        let result = parse_judge_response(&well_formed([5, 4, 5, 4], [3, 3, 3, 3]), "A", "B");
        assert_eq!(result.winner, Winner::Persona("A".to_string()));
        let rubric = result.rubric.unwrap();
        assert_eq!(rubric.pro.total(), 18);
        assert_eq!(rubric.con.total(), 12);
        assert_eq!(result.reasoning, "A close one.");
    }

    #[test]
    fn test_parse_con_win() {
        let result = parse_judge_response(&well_formed([2, 2, 2, 2], [4, 4, 4, 4]), "A", "B");
        assert_eq!(result.winner, Winner::Persona("B".to_string()));
    }

    #[test]
    fn test_parse_draw() {
        let result = parse_judge_response(&well_formed([3, 3, 3, 3], [3, 3, 3, 3]), "A", "B");
        assert_eq!(result.winner, Winner::Draw);
    }

    #[test]
    fn test_totals_sum_to_grand_total() {
        // Winner totals must partition the sum of all eight scores.
        for (pro_scores, con_scores) in [
            ([1, 2, 3, 4], [5, 4, 3, 2]),
            ([5, 5, 5, 5], [1, 1, 1, 1]),
            ([2, 3, 2, 3], [3, 2, 3, 2]),
        ] {
            let result =
                parse_judge_response(&well_formed(pro_scores, con_scores), "A", "B");
            let rubric = result.rubric.unwrap();
            let grand: i32 = pro_scores.iter().sum::<i32>() + con_scores.iter().sum::<i32>();
            assert_eq!(rubric.pro.total() + rubric.con.total(), grand);
            assert!(matches!(
                result.winner,
                Winner::Persona(_) | Winner::Draw
            ));
        }
    }

    #[test]
    fn test_scores_clamped_into_range() {
        let raw = "Reasoning: wild numbers\n\
                   Rapper1_Logic: 11\nRapper1_Sentiment: 0\n\
                   Rapper1_Adherence: 5\nRapper1_Rebuttal: -3\n\
                   Rapper2_Logic: 3\nRapper2_Sentiment: 3\n\
                   Rapper2_Adherence: 3\nRapper2_Rebuttal: 3\n";
        let rubric = parse_judge_response(raw, "A", "B").rubric.unwrap();
        assert_eq!(rubric.pro.logic, 5);
        assert_eq!(rubric.pro.sentiment, 1);
        assert_eq!(rubric.pro.rebuttal, 1);
    }

    #[test]
    fn test_keys_matched_case_insensitively() {
        let raw = well_formed([4, 4, 4, 4], [2, 2, 2, 2]).to_uppercase();
        let result = parse_judge_response(&raw, "A", "B");
        assert_eq!(result.winner, Winner::Persona("A".to_string()));
    }

    #[test]
    fn test_missing_score_degrades_to_stats_error() {
        let mut raw = well_formed([5, 4, 5, 4], [3, 3, 3, 3]);
        raw = raw.replace("Rapper2_Rebuttal: 3\n", "");
        let result = parse_judge_response(&raw, "A", "B");
        assert_eq!(result.winner, Winner::StatsError);
        assert!(result.rubric.is_none());
        assert_eq!(result.reasoning, "A close one.");
    }

    #[test]
    fn test_non_integer_score_degrades_to_stats_error() {
        let raw = well_formed([5, 4, 5, 4], [3, 3, 3, 3]).replace("Rapper1_Logic: 5", "Rapper1_Logic: five");
        let result = parse_judge_response(&raw, "A", "B");
        assert_eq!(result.winner, Winner::StatsError);
    }

    #[test]
    fn test_nonsense_is_stats_error_without_reasoning() {
        let result = parse_judge_response("nonsense", "A", "B");
        assert_eq!(result.winner, Winner::StatsError);
        assert!(result.reasoning.is_empty());
        assert!(result.rubric.is_none());
    }

    #[test]
    fn test_empty_response_is_parse_error() {
        let result = parse_judge_response("   \n  ", "A", "B");
        assert_eq!(result.winner, Winner::ErrorParsing);
    }

    #[test]
    fn test_multiline_reasoning_is_collected() {
        let raw = "Reasoning: first line\nthat wraps onward\nRapper1_Logic: 3\n";
        let result = parse_judge_response(raw, "A", "B");
        assert_eq!(result.reasoning, "first line that wraps onward");
    }

    #[test]
    fn test_canonical_round_trip_is_stable() {
        let first = parse_judge_response(&well_formed([5, 4, 5, 4], [3, 3, 3, 3]), "A", "B");
        let rubric = first.rubric.unwrap();
        let reformatted = canonical(&rubric, &first.reasoning);
        let second = parse_judge_response(&reformatted, "A", "B");
        assert_eq!(second.rubric, Some(rubric));
        assert_eq!(second.winner, first.winner);
        assert_eq!(second.reasoning, first.reasoning);
    }

    #[test]
    fn test_winner_labels() {
        assert_eq!(Winner::Persona("A".to_string()).label(), "A");
        assert_eq!(Winner::Draw.label(), "Draw");
        assert_eq!(Winner::StatsError.label(), "StatsError");
        assert_eq!(Winner::ErrorParsing.label(), "ErrorParsing");
        assert_eq!(Winner::ErrorJudging.label(), "ErrorJudging");
    }
}
