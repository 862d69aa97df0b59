//! Text handed to the engine: the per-message prompt and the system prompt.

use std::path::Path;

/// Build the prompt for one addressed message.
///
/// Conversation and sender names come from the registry and the transport;
/// `content` is the message with the trigger already stripped.
pub fn build_prompt(conversation_name: &str, sender_name: &str, content: &str) -> String {
    format!(
        "[Chat message from: {conversation_name}]\n\
         [Sender: {sender_name}]\n\
         \n\
         {content}\n\
         \n\
         Reply concisely. This will be sent to a chat."
    )
}

/// System prompt: the conversation's instruction document followed by a
/// working-directory notice so file tools use absolute paths.
pub fn build_system_prompt(document: &str, workdir: &Path) -> String {
    let cwd = workdir.display();
    format!(
        "{document}\n\n---\n\
         WORKING DIRECTORY: {cwd}\n\
         When writing files, use the full absolute path: {cwd}/filename.txt"
    )
}
