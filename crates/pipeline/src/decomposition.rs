//! Self-ask question decomposition
//!
//! The model may break the question into follow-up questions, answer each
//! from the context, and must end with a `FINAL ANSWER:` line. The loop
//! happens inside one completion; there is no local iteration.
//!
//! Extraction contract: the answer is the text after the **last**
//! `FINAL ANSWER:` marker, trimmed. Without a marker the completion is
//! returned unchanged.

use rag_eval_llm::{Message, PromptBuilder};

pub const FOLLOW_UP_QUESTION: &str = "FOLLOW UP QUESTION";
pub const INTERMEDIATE_ANSWER: &str = "INTERMEDIATE ANSWER";
pub const FINAL_ANSWER: &str = "FINAL ANSWER:";

const SYSTEM_PREAMBLE: &str = "When necessary, you should decompose the USER QUESTION to FOLLOW UP QUESTIONs and answer the FOLLOW UP QUESTIONs according to the context information below but not your prior knowledge";

const SELF_ASK_EXAMPLES: &str = "Now I'll provide some EXAMPLE QUESTIONs below, you should follow the anwering pattern
EXAMPLE QUESTION: Who lived longer, Muhammad Ali or Alan Turing?
Are FOLLOW UP QUESTIONs needed here: Yes.
FOLLOW UP QUESTION: How old was Muhammad Ali when he died?
INTERMEDIATE ANSWER: Muhammad Ali was 74 years old when he died.
FOLLOW UP QUESTION: How old was Alan Turing when he died?
INTERMEDIATE ANSWER: Alan Turing was 41 years old when he died.
FINAL ANSWER: Muhammad Ali

EXAMPLE QUESTION: What was the scoring total for boston celtics on 2023-05-29?
Are FOLLOW UP QUESTIONs needed here: No.
FINAL ANSWER: 84

EXAMPLE QUESTION: When was the founder of craigslist born?
Are FOLLOW UP QUESTIONs needed here: Yes.
FOLLOW UP QUESTION: Who was the founder of craigslist?
INTERMEDIATE ANSWER: Craigslist was founded by Craig Newmark.
FOLLOW UP QUESTION: When was Craig Newmark born?
INTERMEDIATE ANSWER: Craig Newmark was born on December 6, 1952.
FINAL ANSWER: December 6, 1952

EXAMPLE QUESTION: Who was the maternal grandfather of George Washington?
Are FOLLOW UP QUESTIONs needed here: Yes.
FOLLOW UP QUESTION: Who was the mother of George Washington?
INTERMEDIATE ANSWER: The mother of George Washington was Mary Ball Washington.
FOLLOW UP QUESTION: Who was the father of Mary Ball Washington?
INTERMEDIATE ANSWER: The father of Mary Ball Washington was Joseph Ball.
FINAL ANSWER: Joseph Ball

EXAMPLE QUESTION: Are both the directors of Jaws and Casino Royale from the same country?
Are FOLLOW UP QUESTIONs needed here: Yes.
FOLLOW UP QUESTION: Who is the director of Jaws?
INTERMEDIATE ANSWER: The director of Jaws is Steven Spielberg.
FOLLOW UP QUESTION: Where is Steven Spielberg from?
INTERMEDIATE ANSWER: The United States.
FOLLOW UP QUESTION: Who is the director of Casino Royale?
INTERMEDIATE ANSWER: The director of Casino Royale is Martin Campbell.
FOLLOW UP QUESTION: Where is Martin Campbell from?
INTERMEDIATE ANSWER: New Zealand.
FINAL ANSWER: No

EXAMPLE QUESTION: Who among patricia place and lana clarkson is younger?
Are FOLLOW UP QUESTIONs needed here: No.
FINAL ANSWER: Lana Clarkson

USER QUESTION: ";

/// Messages for a self-ask completion over `rendered_contexts`
pub fn self_ask_messages(rendered_contexts: &str, query: &str) -> Vec<Message> {
    PromptBuilder::new()
        .system(format!("{}\n{}", SYSTEM_PREAMBLE, rendered_contexts))
        .user(format!("{}{}", SELF_ASK_EXAMPLES, query))
        .build()
}

/// Text after the last `FINAL ANSWER:` marker, or `completion` unchanged
pub fn extract_final_answer(completion: &str) -> &str {
    match completion.rfind(FINAL_ANSWER) {
        Some(pos) => completion[pos + FINAL_ANSWER.len()..].trim(),
        None => completion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_eval_llm::Role;

    #[test]
    fn test_extracts_after_marker() {
        let completion =
            "Are FOLLOW UP QUESTIONs needed here: Yes.\nFOLLOW UP QUESTION: X\nINTERMEDIATE ANSWER: Y\nFINAL ANSWER: 42";
        assert_eq!(extract_final_answer(completion), "42");
    }

    #[test]
    fn test_no_marker_unchanged() {
        let completion = "  Just an answer.  ";
        assert_eq!(extract_final_answer(completion), completion);
    }

    #[test]
    fn test_last_marker_wins() {
        let completion = "FINAL ANSWER: draft\nFINAL ANSWER:  Joseph Ball \n";
        assert_eq!(extract_final_answer(completion), "Joseph Ball");
    }

    #[test]
    fn test_messages() {
        let messages = self_ask_messages("[\"ctx\"]", "Who won?");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.ends_with("prior knowledge\n[\"ctx\"]"));
        assert!(messages[1].content.ends_with("USER QUESTION: Who won?"));
        assert_eq!(messages[1].content.matches(FINAL_ANSWER).count(), 6);
    }
}
