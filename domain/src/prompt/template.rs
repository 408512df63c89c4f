//! Prompt templates for the three council stages.
//!
//! Pure functions: deterministic given their inputs, no I/O. Stage 1 and
//! stage 3 prepend conversation history; stage 2 always sees a single
//! user-role prompt over the anonymized opinions.

use crate::chat::entities::Message;
use crate::conversation::{ChatMessage, ChatRole};
use crate::council::aggregate::AggregatedRank;
use crate::council::opinion::ModelOpinion;

/// Templates for generating prompts at each stage
pub struct PromptTemplate;

impl PromptTemplate {
    /// System directive for the first-opinions stage.
    pub fn first_opinion_system() -> &'static str {
        r#"You are a member of a council of AI assistants. Answer the user's question directly and concisely.
Support your answer with reasoning where it genuinely helps. Focus on accuracy and clarity."#
    }

    /// Messages for one councilor's first-opinion call:
    /// system directive, prior history, then the new user message.
    pub fn first_opinion_messages(history: &[ChatMessage], question: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(Self::first_opinion_system()));
        messages.extend(history.iter().map(history_message));
        messages.push(Message::user(question));
        messages
    }

    /// The single user-role prompt for one reviewer.
    ///
    /// `anonymized` pairs each label with the opinion text it covers; the
    /// mapping is identical for every reviewer. When the reviewer's own
    /// opinion is among them, `own_label` names it so the model can skip
    /// it (the parser drops self-rankings regardless).
    pub fn review_messages(
        question: &str,
        anonymized: &[(char, &str)],
        own_label: Option<char>,
    ) -> Vec<Message> {
        let mut prompt = format!(
            r#"You are reviewing anonymized responses from several AI models to the following user query.

USER QUERY: {}

Responses to review:
"#,
            question
        );

        for (label, text) in anonymized {
            prompt.push_str(&format!("\n===== Response {} =====\n{}\n", label, text));
        }

        prompt.push_str(
            r#"
Rank the responses from best to worst, judging accuracy, completeness, clarity, and usefulness.
Output one line per response, in the exact form:

Rank N: <letter> — <short reasoning>

where Rank 1 is the best. Produce one line for every response"#,
        );

        match own_label {
            Some(label) => prompt.push_str(&format!(
                " except your own: Response {} is your own answer, omit it from the ranking.\n",
                label
            )),
            None => prompt.push_str(".\n"),
        }

        prompt.push_str("Be objective and critical. Do not add any other output.");

        vec![Message::user(prompt)]
    }

    /// System directive for the synthesis stage.
    pub fn synthesis_system() -> &'static str {
        r#"You are the chairman of a council of AI assistants. Several models have answered the user's question and ranked each other's answers.
Synthesize a single, authoritative answer that integrates the strongest points and resolves contradictions.
Answer the user's query directly. Do not mention the council process."#
    }

    /// Messages for the chairman's synthesis call: system directive,
    /// prior history, then one user message carrying the question, every
    /// opinion attributed by model id, and the aggregated ranking.
    pub fn synthesis_messages(
        history: &[ChatMessage],
        question: &str,
        opinions: &[ModelOpinion],
        aggregated: &[AggregatedRank],
    ) -> Vec<Message> {
        let mut content = format!(
            "Original user query: {}\n\n===== COUNCIL OPINIONS =====\n",
            question
        );

        for opinion in opinions.iter().filter(|o| o.is_success()) {
            content.push_str(&format!(
                "\n--- {} ---\n{}\n",
                opinion.model_id, opinion.text
            ));
        }

        content.push_str("\n===== AGGREGATED PEER RANKING =====\n");
        if aggregated.is_empty() {
            content.push_str("No usable peer rankings were produced.\n");
        } else {
            for (position, entry) in aggregated.iter().enumerate() {
                content.push_str(&format!(
                    "{}. {} — mean rank {:.2} across {} reviewer(s)\n",
                    position + 1,
                    entry.model_id,
                    entry.mean_rank,
                    entry.reviewer_count
                ));
            }
        }

        content.push_str(
            "\nProduce the final answer now, integrating the strongest points and resolving any contradictions.",
        );

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(Self::synthesis_system()));
        messages.extend(history.iter().map(history_message));
        messages.push(Message::user(content));
        messages
    }
}

fn history_message(message: &ChatMessage) -> Message {
    match message.role {
        ChatRole::User => Message::user(message.content.clone()),
        ChatRole::Assistant => Message::assistant(message.content.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::entities::Role;

    #[test]
    fn test_first_opinion_messages_order() {
        let history = vec![
            ChatMessage::user("earlier question"),
            ChatMessage::assistant("earlier answer"),
        ];
        let messages = PromptTemplate::first_opinion_messages(&history, "what is 2+2?");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "earlier question");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[3].content, "what is 2+2?");
    }

    #[test]
    fn test_review_messages_label_opinions_without_model_names() {
        let anonymized = vec![('A', "first answer"), ('B', "second answer")];
        let messages = PromptTemplate::review_messages("q?", &anonymized, Some('A'));
        assert_eq!(messages.len(), 1);
        let prompt = &messages[0].content;
        assert_eq!(messages[0].role, Role::User);
        assert!(prompt.contains("Response A"));
        assert!(prompt.contains("Response B"));
        assert!(prompt.contains("first answer"));
        assert!(prompt.contains("Rank N: <letter>"));
        assert!(prompt.contains("Response A is your own answer"));
    }

    #[test]
    fn test_review_messages_without_own_label() {
        let anonymized = vec![('A', "only answer")];
        let messages = PromptTemplate::review_messages("q?", &anonymized, None);
        assert!(!messages[0].content.contains("your own answer"));
    }

    #[test]
    fn test_synthesis_messages_attribute_opinions_by_model() {
        let opinions = vec![
            ModelOpinion::success("m1", "4"),
            ModelOpinion::failure("m2", "timeout"),
        ];
        let aggregated = vec![AggregatedRank {
            model_id: "m1".to_string(),
            mean_rank: 1.0,
            reviewer_count: 2,
        }];
        let messages = PromptTemplate::synthesis_messages(&[], "what is 2+2?", &opinions, &aggregated);
        assert_eq!(messages.len(), 2);
        let content = &messages[1].content;
        assert!(content.contains("--- m1 ---"));
        assert!(!content.contains("--- m2 ---"), "failed opinions are omitted");
        assert!(content.contains("mean rank 1.00 across 2 reviewer(s)"));
    }

    #[test]
    fn test_synthesis_messages_with_no_rankings() {
        let opinions = vec![ModelOpinion::success("m1", "4")];
        let messages = PromptTemplate::synthesis_messages(&[], "q", &opinions, &[]);
        assert!(messages[1].content.contains("No usable peer rankings"));
    }
}
