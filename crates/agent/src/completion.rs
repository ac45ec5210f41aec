//! Completion detection on model output that proposed no commands.

/// Phrases that mark a task as finished when no config overrides them.
pub const DEFAULT_COMPLETION_PHRASES: &[&str] =
    &["tarefa concluída", "completed", "finalizado", "pronto", "done"];

/// Case-insensitive substring match against a fixed phrase set.
#[derive(Debug, Clone)]
pub struct CompletionDetector {
    phrases: Vec<String>,
}

impl CompletionDetector {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_complete(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.phrases.iter().any(|p| text.contains(p.as_str()))
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}

impl Default for CompletionDetector {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETION_PHRASES)
    }
}
