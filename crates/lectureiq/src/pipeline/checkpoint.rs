use std::fmt;

/// Progress checkpoints of a pipeline run, in the only order they may be
/// reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Checkpoint {
    Started,
    AudioReady,
    Transcribed,
    ConceptsExtracted,
    NotesSaved,
    FlashcardsSaved,
    McqsSaved,
    ResourcesLinked,
    Completed,
}

impl Checkpoint {
    pub const ALL: [Checkpoint; 9] = [
        Checkpoint::Started,
        Checkpoint::AudioReady,
        Checkpoint::Transcribed,
        Checkpoint::ConceptsExtracted,
        Checkpoint::NotesSaved,
        Checkpoint::FlashcardsSaved,
        Checkpoint::McqsSaved,
        Checkpoint::ResourcesLinked,
        Checkpoint::Completed,
    ];

    /// Percentage persisted on the lecture when this checkpoint commits.
    pub fn progress(self) -> u8 {
        match self {
            Checkpoint::Started => 5,
            Checkpoint::AudioReady => 10,
            Checkpoint::Transcribed => 40,
            Checkpoint::ConceptsExtracted => 50,
            Checkpoint::NotesSaved => 65,
            Checkpoint::FlashcardsSaved => 75,
            Checkpoint::McqsSaved => 85,
            Checkpoint::ResourcesLinked => 95,
            Checkpoint::Completed => 100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Checkpoint::Started => "started",
            Checkpoint::AudioReady => "audio_ready",
            Checkpoint::Transcribed => "transcribed",
            Checkpoint::ConceptsExtracted => "concepts_extracted",
            Checkpoint::NotesSaved => "notes_saved",
            Checkpoint::FlashcardsSaved => "flashcards_saved",
            Checkpoint::McqsSaved => "mcqs_saved",
            Checkpoint::ResourcesLinked => "resources_linked",
            Checkpoint::Completed => "completed",
        }
    }

    /// The checkpoint that must follow this one.
    pub fn next(self) -> Option<Checkpoint> {
        let index = Self::ALL.iter().position(|c| *c == self)?;
        Self::ALL.get(index + 1).copied()
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}%)", self.label(), self.progress())
    }
}
