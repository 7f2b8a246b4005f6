use crate::model::question::QuestionDraft;

/// Number of records in the built-in question set.
pub const DEFAULT_QUESTION_COUNT: usize = 10;

/// The built-in questions used to seed an empty bank.
#[must_use]
pub fn default_questions() -> Vec<QuestionDraft> {
    vec![
        QuestionDraft::new(
            "What is the capital of France?",
            ["London", "Paris", "Berlin", "Madrid"],
            1,
        ),
        QuestionDraft::new(
            "Which planet is known as the Red Planet?",
            ["Venus", "Mars", "Jupiter", "Saturn"],
            1,
        ),
        QuestionDraft::new(
            "What is the largest mammal on Earth?",
            ["Elephant", "Giraffe", "Blue Whale", "Hippopotamus"],
            2,
        ),
        QuestionDraft::new(
            "Who wrote 'Romeo and Juliet'?",
            ["Charles Dickens", "William Shakespeare", "Jane Austen", "Mark Twain"],
            1,
        ),
        QuestionDraft::new(
            "What is the chemical symbol for gold?",
            ["Go", "Gd", "Au", "Ag"],
            2,
        ),
        QuestionDraft::new(
            "What is the main component of the Earth's atmosphere?",
            ["Oxygen", "Carbon Dioxide", "Nitrogen", "Hydrogen"],
            2,
        ),
        QuestionDraft::new(
            "Which country is home to the kangaroo?",
            ["New Zealand", "South Africa", "Australia", "Brazil"],
            2,
        ),
        QuestionDraft::new("How many sides does a hexagon have?", ["5", "6", "7", "8"], 1),
        QuestionDraft::new(
            "What is the largest organ in the human body?",
            ["Brain", "Liver", "Heart", "Skin"],
            3,
        ),
        QuestionDraft::new(
            "Which is the longest river in the world?",
            ["Amazon", "Nile", "Mississippi", "Yangtze"],
            1,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_set_is_valid_and_distinct() {
        let drafts = default_questions();
        assert_eq!(drafts.len(), DEFAULT_QUESTION_COUNT);

        let mut texts = HashSet::new();
        for draft in drafts {
            let question = draft.validate().expect("default question should validate");
            assert!(texts.insert(question.text().to_owned()));
        }
    }
}
