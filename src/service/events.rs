//! Builders for the human-readable lines appended to a match's event log.

use crate::model::{TeamSide, Winner};

/// Line logged when a match is created.
pub fn match_created(host_name: &str, team_a: &str, team_b: &str) -> String {
    format!("{host_name} opened the match: {team_a} vs {team_b}")
}

/// Line logged when a player joins a side.
pub fn player_joined(name: &str, side: TeamSide) -> String {
    format!("{name} joined team {side}")
}

/// Line logged when the host starts the game.
pub fn game_started(question_count: u32) -> String {
    format!("game started with {question_count} questions")
}

/// Line logged for every scored submission.
pub fn answer_submitted(name: &str, question_index: u32, correct: bool) -> String {
    let outcome = if correct { "correct" } else { "incorrect" };
    format!("{name} answered question {} ({outcome})", question_index + 1)
}

/// Line logged when a countdown expires without a submission.
pub fn player_timed_out(name: &str, question_index: u32) -> String {
    format!("{name} ran out of time on question {}", question_index + 1)
}

/// Line logged when a player completes the sequence.
pub fn player_finished(name: &str, score: i32) -> String {
    format!("{name} finished with {score} points")
}

/// Summary line logged at finalization.
pub fn match_finished(score_a: i32, score_b: i32) -> String {
    format!("match finished {score_a}-{score_b}")
}

/// Winner line logged at finalization.
pub fn winner_declared(winner: Winner) -> String {
    match winner {
        Winner::Draw => "the match ends in a draw".to_string(),
        side => format!("{side} wins"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_read_naturally() {
        assert_eq!(
            match_created("Ana", "Lions", "Hawks"),
            "Ana opened the match: Lions vs Hawks"
        );
        assert_eq!(player_joined("Beto", TeamSide::B), "Beto joined team B");
        assert_eq!(answer_submitted("Ana", 0, true), "Ana answered question 1 (correct)");
        assert_eq!(winner_declared(Winner::TeamA), "team A wins");
        assert_eq!(winner_declared(Winner::Draw), "the match ends in a draw");
    }
}
