use crate::model::{AnswerLetter, Question};

/// Authoring timestamp stamped on every built-in question.
const POOL_CREATED_AT_MS: u64 = 1_735_689_600_000;

fn entry(
    id: &str,
    text: &str,
    options: [&str; 4],
    correct: AnswerLetter,
    topic: &str,
    difficulty: &str,
) -> Question {
    Question {
        id: id.into(),
        text: text.into(),
        option_a: options[0].into(),
        option_b: options[1].into(),
        option_c: options[2].into(),
        option_d: options[3].into(),
        correct,
        difficulty: difficulty.into(),
        topic: topic.into(),
        created_at_ms: POOL_CREATED_AT_MS,
    }
}

/// The built-in general-knowledge pool, in deal order.
///
/// Large enough to fill a default-sized match on its own, so a match can
/// always start even with the bank unreachable.
pub fn pool() -> Vec<Question> {
    use AnswerLetter::{A, B, C, D};

    vec![
        entry(
            "fallback-001",
            "What is 12 x 12?",
            ["124", "132", "144", "156"],
            C,
            "arithmetic",
            "easy",
        ),
        entry(
            "fallback-002",
            "Which planet is closest to the Sun?",
            ["Venus", "Mercury", "Mars", "Earth"],
            B,
            "science",
            "easy",
        ),
        entry(
            "fallback-003",
            "What is the capital of Australia?",
            ["Sydney", "Melbourne", "Canberra", "Perth"],
            C,
            "geography",
            "medium",
        ),
        entry(
            "fallback-004",
            "Which gas do plants absorb during photosynthesis?",
            ["Oxygen", "Nitrogen", "Hydrogen", "Carbon dioxide"],
            D,
            "science",
            "easy",
        ),
        entry(
            "fallback-005",
            "In which year did the Second World War end?",
            ["1943", "1944", "1945", "1946"],
            C,
            "history",
            "easy",
        ),
        entry(
            "fallback-006",
            "What is the square root of 169?",
            ["11", "12", "13", "14"],
            C,
            "arithmetic",
            "easy",
        ),
        entry(
            "fallback-007",
            "Which organ pumps blood through the human body?",
            ["Liver", "Heart", "Lungs", "Kidneys"],
            B,
            "biology",
            "easy",
        ),
        entry(
            "fallback-008",
            "Which river is the longest in the world?",
            ["Amazon", "Nile", "Yangtze", "Mississippi"],
            B,
            "geography",
            "medium",
        ),
        entry(
            "fallback-009",
            "What is 15% of 200?",
            ["20", "25", "30", "35"],
            C,
            "arithmetic",
            "medium",
        ),
        entry(
            "fallback-010",
            "Who wrote 'Don Quixote'?",
            [
                "Gabriel Garcia Marquez",
                "Miguel de Cervantes",
                "Federico Garcia Lorca",
                "Jorge Luis Borges",
            ],
            B,
            "literature",
            "medium",
        ),
        entry(
            "fallback-011",
            "What is the chemical symbol for gold?",
            ["Go", "Gd", "Au", "Ag"],
            C,
            "chemistry",
            "easy",
        ),
        entry(
            "fallback-012",
            "How many sides does a hexagon have?",
            ["5", "6", "7", "8"],
            B,
            "geometry",
            "easy",
        ),
        entry(
            "fallback-013",
            "Which ocean lies between Africa and Australia?",
            ["Atlantic", "Pacific", "Indian", "Arctic"],
            C,
            "geography",
            "easy",
        ),
        entry(
            "fallback-014",
            "What is the value of pi rounded to two decimal places?",
            ["3.12", "3.14", "3.16", "3.18"],
            B,
            "geometry",
            "easy",
        ),
        entry(
            "fallback-015",
            "Which civilization built Machu Picchu?",
            ["Aztec", "Maya", "Inca", "Olmec"],
            C,
            "history",
            "medium",
        ),
        entry(
            "fallback-016",
            "What is the plural of 'analysis'?",
            ["analysises", "analyses", "analysis", "analysi"],
            B,
            "language",
            "medium",
        ),
        entry(
            "fallback-017",
            "At what temperature does water boil at sea level, in Celsius?",
            ["90", "95", "100", "110"],
            C,
            "science",
            "easy",
        ),
        entry(
            "fallback-018",
            "Which of these numbers is prime?",
            ["21", "27", "29", "33"],
            C,
            "arithmetic",
            "medium",
        ),
        entry(
            "fallback-019",
            "Who painted the Mona Lisa?",
            [
                "Michelangelo",
                "Leonardo da Vinci",
                "Raphael",
                "Caravaggio",
            ],
            B,
            "art",
            "easy",
        ),
        entry(
            "fallback-020",
            "What fraction is equivalent to 0.75?",
            ["2/3", "3/4", "4/5", "5/6"],
            B,
            "arithmetic",
            "easy",
        ),
        entry(
            "fallback-021",
            "Which continent has the most countries?",
            ["Asia", "Europe", "Africa", "South America"],
            C,
            "geography",
            "medium",
        ),
        entry(
            "fallback-022",
            "What force keeps planets in orbit around the Sun?",
            ["Magnetism", "Friction", "Gravity", "Inertia"],
            C,
            "science",
            "easy",
        ),
        entry(
            "fallback-023",
            "If a train travels 60 km in 45 minutes, what is its speed in km/h?",
            ["70", "75", "80", "85"],
            C,
            "arithmetic",
            "hard",
        ),
        entry(
            "fallback-024",
            "Which word is a synonym of 'concise'?",
            ["Verbose", "Succinct", "Rambling", "Detailed"],
            B,
            "language",
            "medium",
        ),
    ]
}
