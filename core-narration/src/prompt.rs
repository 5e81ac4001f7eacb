//! Lecture prompt template
//!
//! Every script follows the same nine-part teaching arc, filled in with the
//! topic's title and description.

use crate::traits::Topic;

/// Target length of a generated script, in words.
pub const MIN_WORDS: usize = 200;
pub const MAX_WORDS: usize = 250;

/// Ordered parts of the lecture: `(label, instruction)`.
pub const LECTURE_PARTS: [(&str, &str); 9] = [
    (
        "Hook",
        "Open with a vivid, surprising question or everyday moment that makes the listener curious.",
    ),
    (
        "Learning promise",
        "State plainly what the listener will be able to explain by the end.",
    ),
    (
        "Roadmap",
        "Preview the steps the explanation will take in one short sentence.",
    ),
    (
        "Negative definition",
        "Clear up the most common misconception by saying what the concept is not.",
    ),
    (
        "Mnemonic",
        "Offer a short memorable phrase or device that captures the core idea.",
    ),
    (
        "Analogy",
        "Explain the mechanism through a concrete analogy from daily life.",
    ),
    (
        "Practical use",
        "Describe a real-world technology or situation where the concept matters.",
    ),
    (
        "Mindset note",
        "Encourage the listener that confusion at first is normal and part of learning.",
    ),
    (
        "Assessment question",
        "Close with one question the listener can answer to check understanding.",
    ),
];

/// Build the script prompt for `topic`.
pub fn lecture_prompt(topic: &Topic) -> String {
    let mut prompt = format!(
        "You are a warm, engaging physics teacher recording a short audio mini-lecture.\n\
         Topic: {title}\n\
         Context: {description}\n\n\
         Write the narration as a single spoken script that follows these parts in order:\n",
        title = topic.title.trim(),
        description = topic.description.trim(),
    );

    for (index, (label, instruction)) in LECTURE_PARTS.iter().enumerate() {
        prompt.push_str(&format!("{}. {}: {}\n", index + 1, label, instruction));
    }

    prompt.push_str(&format!(
        "\nKeep it between {MIN_WORDS} and {MAX_WORDS} words. \
         Write plain prose meant to be read aloud: no headings, no part labels, \
         no bullet points, no markdown or other markup, no stage directions."
    ));

    prompt
}
