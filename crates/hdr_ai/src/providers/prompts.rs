use crate::model::{Chunk, ConversationTurn};

const LIST_RULES: &str = "- When giving lists or numbered steps, use HTML with <ul> and <li> tags.
- Example: <ul><li>First point</li><li>Second point</li></ul>
- If the answer is simple and needs no list, use plain text.";

fn history_block(history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let lines = history
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.text))
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n\nPrevious conversation:\n{lines}\n")
}

pub fn grounded_prompt(question: &str, context: &[Chunk], history: &[ConversationTurn]) -> String {
    let context_text = context
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let history_text = history_block(history);

    format!(
        r#"You are a friendly, professional help desk assistant.
Use the following document context to answer the user's question.
If the context is not enough, you may complement it with general knowledge to give a complete, useful answer.
Be natural, conversational and friendly.

IMPORTANT:
- This is an ongoing conversation. Do NOT include greetings such as "Hello!" or "Good morning" unless it is the first message.
- Answer the user's question directly and keep the conversation flowing.
{LIST_RULES}

Document context:
{context_text}{history_text}

Current user question: {question}

Answer (use HTML <ul> and <li> for lists, be natural and conversational, do NOT include unnecessary greetings):"#
    )
}

pub fn general_prompt(question: &str, history: &[ConversationTurn]) -> String {
    let first_message = history.is_empty();
    let history_text = history_block(history);

    let tone = if first_message {
        "If this is a greeting, reply warmly and offer help."
    } else {
        "This is an ongoing conversation. Do NOT include greetings such as \"Hello!\" or \"Good morning\" unless the user greets you explicitly."
    };
    let greeting_rule = if first_message {
        "You may greet the user if appropriate."
    } else {
        "Do NOT include unnecessary greetings. Answer the question directly."
    };
    let closing = if first_message {
        ""
    } else {
        ", do NOT include unnecessary greetings"
    };

    format!(
        r#"You are a friendly, professional and conversational help desk assistant.
Answer the user's question naturally and helpfully.
{tone}
If it is a general question, give useful, current information.
Be concise but friendly.

IMPORTANT:
- {greeting_rule}
{LIST_RULES}

{history_text}Current user question: {question}

Answer (use HTML <ul> and <li> for lists, be natural and conversational{closing}):"#
    )
}
