//! Prompt builders for question generation and answer scoring

use crate::interview::{Difficulty, QuestionResult};

/// Placeholder fed to scoring when the candidate said nothing
pub const NO_ANSWER_PLACEHOLDER: &str = "(candidate did not answer)";

/// Build the adaptive question prompt
///
/// Only questions and scores from `history` are embedded; transcripts and
/// feedback are left out to bound prompt size.
#[must_use]
pub fn question_prompt(
    skill: &str,
    question_number: usize,
    history: &[QuestionResult],
    difficulty: Difficulty,
    avg_score: f64,
) -> String {
    let history = if history.is_empty() {
        "None (first question)".to_string()
    } else {
        history
            .iter()
            .map(|r| format!("Q: {}\nScore: {}/10", r.question, r.score))
            .collect::<Vec<_>>()
            .join("\n---\n")
    };

    format!(
        "You are conducting an adaptive technical interview for the skill: {skill}.\n\n\
         Previous questions and scores:\n{history}\n\n\
         Assessed proficiency: {difficulty} (avg score: {avg_score:.1}/10). \
         Question number: {question_number}.\n\n\
         Generate ONE interview question at the appropriate difficulty level.\n\
         - advanced: architecture, design patterns, edge cases, trade-offs.\n\
         - intermediate: practical usage, common patterns, debugging.\n\
         - beginner: foundational concepts, definitions, simple examples.\n\
         Do NOT repeat any previous question. Sound natural and conversational.\n\n\
         Respond ONLY with this JSON: {{\"question\": \"<the question>\", \"difficulty\": \"{difficulty}\"}}"
    )
}

/// Build the answer scoring prompt
#[must_use]
pub fn scoring_prompt(question: &str, transcript: &str) -> String {
    let answer = if transcript.trim().is_empty() {
        NO_ANSWER_PLACEHOLDER
    } else {
        transcript
    };

    format!(
        "You are an expert technical interviewer evaluating a candidate.\n\n\
         Interview Question: {question}\n\n\
         Candidate's Answer: {answer}\n\n\
         Score 0-10 based on technical accuracy, completeness, and clarity.\n\
         Respond ONLY with: {{\"score\": <integer 0-10>, \"feedback\": \"<2-3 sentence feedback>\"}}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(question: &str, transcript: &str, score: u8) -> QuestionResult {
        QuestionResult {
            question: question.to_string(),
            transcript: transcript.to_string(),
            score,
            feedback: "secret feedback".to_string(),
            difficulty: Difficulty::Intermediate,
        }
    }

    #[test]
    fn first_question_has_no_history() {
        let prompt = question_prompt("Databases", 1, &[], Difficulty::Intermediate, 5.0);
        assert!(prompt.contains("skill: Databases"));
        assert!(prompt.contains("None (first question)"));
        assert!(prompt.contains("intermediate (avg score: 5.0/10)"));
        assert!(prompt.contains("Question number: 1."));
        assert!(prompt.contains("Do NOT repeat any previous question"));
    }

    #[test]
    fn history_embeds_questions_and_scores_only() {
        let history = vec![
            result("What is a B-tree?", "a balanced tree", 8),
            result("What is WAL?", "write ahead log", 5),
        ];
        let prompt = question_prompt("Databases", 3, &history, Difficulty::Intermediate, 6.5);

        assert!(prompt.contains("Q: What is a B-tree?\nScore: 8/10\n---\nQ: What is WAL?\nScore: 5/10"));
        assert!(prompt.contains("avg score: 6.5/10"));
        assert!(!prompt.contains("balanced tree"));
        assert!(!prompt.contains("secret feedback"));
    }

    #[test]
    fn scoring_uses_placeholder_for_silence() {
        let prompt = scoring_prompt("Explain joins", "   ");
        assert!(prompt.contains(&format!("Candidate's Answer: {NO_ANSWER_PLACEHOLDER}")));
    }

    #[test]
    fn scoring_embeds_transcript() {
        let prompt = scoring_prompt("Explain joins", "inner and outer joins");
        assert!(prompt.contains("Interview Question: Explain joins"));
        assert!(prompt.contains("Candidate's Answer: inner and outer joins"));
    }
}
