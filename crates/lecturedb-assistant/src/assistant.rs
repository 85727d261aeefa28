use std::sync::Arc;

use tracing::{debug, warn};

use lecturedb_core::traits::ChatModel;
use lecturedb_core::types::Turn;
use lecturedb_core::Result;

pub const GREETING: &str = "Hi! I am your AI assistant. How can I help you today?";

/// Conversational front end over a [`ChatModel`].
///
/// The whole history is rendered into every prompt, one `User:` or
/// `Assistant:` line per turn. Without `max_turns` the history grows for the
/// lifetime of the assistant.
pub struct Assistant {
    model: Arc<dyn ChatModel>,
    history: Vec<Turn>,
    max_turns: Option<usize>,
}

impl Assistant {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model, history: Vec::new(), max_turns: None }
    }

    /// Keeps only the newest `max_turns` turns after every exchange.
    pub fn with_history_limit(mut self, max_turns: Option<usize>) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn greet(&self) -> &'static str { GREETING }

    pub fn history(&self) -> &[Turn] { &self.history }

    pub fn render_prompt(turns: &[Turn]) -> String {
        turns.iter().map(Turn::render).collect::<Vec<_>>().join("\n")
    }

    /// Sends `input` with the conversation so far.
    ///
    /// On failure the pending user turn is dropped and the error is returned
    /// to the caller instead of being recorded as a reply, so the history is
    /// left as it was before the call.
    pub fn chat(&mut self, input: &str) -> Result<String> {
        self.history.push(Turn::user(input));
        let prompt = Self::render_prompt(&self.history);
        debug!(turns = self.history.len(), "sending conversation");
        match self.model.complete(&prompt) {
            Ok(reply) => {
                self.history.push(Turn::assistant(reply.clone()));
                self.enforce_limit();
                Ok(reply)
            }
            Err(e) => {
                warn!(error = %e, "chat completion failed");
                self.history.pop();
                Err(e)
            }
        }
    }

    fn enforce_limit(&mut self) {
        if let Some(max) = self.max_turns {
            if self.history.len() > max {
                let excess = self.history.len() - max;
                self.history.drain(..excess);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use lecturedb_core::types::Role;
    use lecturedb_core::Error;

    /// Records prompts and answers with a numbered reply, or fails when told.
    #[derive(Default)]
    struct Recorder {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    impl ChatModel for Recorder {
        fn complete(&self, prompt: &str) -> Result<String> {
            if self.fail {
                return Err(Error::ChatService("503 Service Unavailable".into()));
            }
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            Ok(format!("reply {}", prompts.len()))
        }
    }

    #[test]
    fn history_is_rendered_into_each_prompt() {
        let model = Arc::new(Recorder::default());
        let mut assistant = Assistant::new(model.clone());
        assert_eq!(assistant.chat("hello").unwrap(), "reply 1");
        assert_eq!(assistant.chat("what is mitosis?").unwrap(), "reply 2");

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts[0], "User: hello");
        assert_eq!(prompts[1], "User: hello\nAssistant: reply 1\nUser: what is mitosis?");
        assert_eq!(assistant.history().len(), 4);
        assert_eq!(assistant.history()[3].role, Role::Assistant);
    }

    #[test]
    fn failed_call_leaves_history_unchanged() {
        let mut assistant = Assistant::new(Arc::new(Recorder { fail: true, ..Recorder::default() }));
        assert!(matches!(assistant.chat("hello"), Err(Error::ChatService(_))));
        assert!(assistant.history().is_empty());
    }

    #[test]
    fn history_limit_drops_oldest_turns() {
        let mut assistant = Assistant::new(Arc::new(Recorder::default())).with_history_limit(Some(2));
        assistant.chat("one").unwrap();
        assistant.chat("two").unwrap();
        assert_eq!(assistant.history(), &[Turn::user("two"), Turn::assistant("reply 2")]);
    }

    #[test]
    fn greeting_is_fixed() {
        let assistant = Assistant::new(Arc::new(Recorder::default()));
        assert_eq!(assistant.greet(), GREETING);
    }
}
