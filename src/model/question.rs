use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the four lettered options a question offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerLetter {
    /// First option.
    A,
    /// Second option.
    B,
    /// Third option.
    C,
    /// Fourth option.
    D,
}

impl AnswerLetter {
    /// All four letters in option order.
    pub const ALL: [AnswerLetter; 4] = [
        AnswerLetter::A,
        AnswerLetter::B,
        AnswerLetter::C,
        AnswerLetter::D,
    ];

    /// Parse a letter from user input, ignoring case and surrounding whitespace.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "a" | "A" => Some(AnswerLetter::A),
            "b" | "B" => Some(AnswerLetter::B),
            "c" | "C" => Some(AnswerLetter::C),
            "d" | "D" => Some(AnswerLetter::D),
            _ => None,
        }
    }

    /// Canonical uppercase form of the letter.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerLetter::A => "A",
            AnswerLetter::B => "B",
            AnswerLetter::C => "C",
            AnswerLetter::D => "D",
        }
    }
}

impl fmt::Display for AnswerLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable quiz item dealt to every player of a match.
///
/// Questions live in the question bank (or the built-in fallback pool) and are
/// referenced from player progress by index only; they are never embedded in
/// the synchronized match document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Stable identifier assigned by the bank.
    pub id: String,
    /// The question statement.
    pub text: String,
    /// Text for option A.
    pub option_a: String,
    /// Text for option B.
    pub option_b: String,
    /// Text for option C.
    pub option_c: String,
    /// Text for option D.
    pub option_d: String,
    /// The letter of the correct option.
    pub correct: AnswerLetter,
    /// Free-form difficulty label assigned by the author.
    #[serde(default)]
    pub difficulty: String,
    /// Subject area the question belongs to.
    #[serde(default)]
    pub topic: String,
    /// Authoring timestamp in unix milliseconds.
    #[serde(default)]
    pub created_at_ms: u64,
}

impl Question {
    /// A question is usable only when its statement and all four options are
    /// non-empty. Malformed bank entries are filtered out before dealing.
    pub fn is_valid(&self) -> bool {
        !self.text.trim().is_empty()
            && AnswerLetter::ALL
                .iter()
                .all(|letter| !self.option_text(*letter).trim().is_empty())
    }

    /// Case-insensitive check of a raw letter against the correct option.
    pub fn is_correct(&self, letter: &str) -> bool {
        AnswerLetter::parse(letter).is_some_and(|parsed| self.is_correct_letter(parsed))
    }

    /// Check an already-parsed letter against the correct option.
    pub fn is_correct_letter(&self, letter: AnswerLetter) -> bool {
        self.correct == letter
    }

    /// Option text for a given letter.
    pub fn option_text(&self, letter: AnswerLetter) -> &str {
        match letter {
            AnswerLetter::A => &self.option_a,
            AnswerLetter::B => &self.option_b,
            AnswerLetter::C => &self.option_c,
            AnswerLetter::D => &self.option_d,
        }
    }

    /// Text of the correct option, for result screens and feedback.
    pub fn correct_answer_text(&self) -> &str {
        self.option_text(self.correct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Question {
        Question {
            id: "q-1".into(),
            text: "What is 7 x 8?".into(),
            option_a: "54".into(),
            option_b: "56".into(),
            option_c: "58".into(),
            option_d: "64".into(),
            correct: AnswerLetter::B,
            difficulty: "easy".into(),
            topic: "arithmetic".into(),
            created_at_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn correct_letter_matches_case_insensitively() {
        let question = sample();
        assert!(question.is_correct("B"));
        assert!(question.is_correct("b"));
        assert!(question.is_correct(" b "));
    }

    #[test]
    fn every_other_letter_is_wrong() {
        let question = sample();
        for letter in ["A", "a", "C", "c", "D", "d"] {
            assert!(!question.is_correct(letter), "{letter} should be wrong");
        }
    }

    #[test]
    fn garbage_input_is_never_correct() {
        let question = sample();
        assert!(!question.is_correct("E"));
        assert!(!question.is_correct(""));
        assert!(!question.is_correct("BB"));
    }

    #[test]
    fn blank_option_invalidates_question() {
        let mut question = sample();
        assert!(question.is_valid());
        question.option_c = "   ".into();
        assert!(!question.is_valid());
    }

    #[test]
    fn blank_text_invalidates_question() {
        let mut question = sample();
        question.text = "".into();
        assert!(!question.is_valid());
    }

    #[test]
    fn correct_answer_text_follows_the_letter() {
        let question = sample();
        assert_eq!(question.correct_answer_text(), "56");
    }
}
