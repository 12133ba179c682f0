use crate::command::{Pipeline, Stage};
use crate::lexer::TokenizedLine;
use thiserror::Error;

/// Token separating two stages of a pipeline.
pub const PIPE_MARKER: &str = "|";

/// Errors detected while grouping tokens into stages.
///
/// Any of these rejects the whole line before a single process is spawned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command line")]
    EmptyPipeline,
    /// A `|` at the start or end of the line, or two `|` in a row.
    #[error("syntax error: empty command at pipeline stage {position}")]
    EmptyStage { position: usize },
}

struct PipelineBuilder {
    stages: Vec<Stage>,
    current: Vec<String>,
}

impl PipelineBuilder {
    fn new() -> Self {
        PipelineBuilder {
            stages: Vec::new(),
            current: Vec::new(),
        }
    }

    fn push_word(&mut self, word: String) {
        self.current.push(word);
    }

    /// Closes the stage being collected. An empty run is an error.
    fn finish_stage(&mut self) -> Result<(), ParseError> {
        let position = self.stages.len();
        let words = std::mem::take(&mut self.current);
        let stage = Stage::new(words).ok_or(ParseError::EmptyStage { position })?;
        self.stages.push(stage);
        Ok(())
    }

    fn build(mut self, background: bool) -> Result<Pipeline, ParseError> {
        self.finish_stage()?;
        Ok(Pipeline::new(self.stages, background))
    }
}

/// Groups the words of a tokenized line into pipeline stages.
///
/// The words are split on tokens exactly equal to `|`; each run between
/// markers becomes one [`Stage`], in order. Redirection operators are left
/// inside their stage for the child to resolve.
///
/// # Returns
///
/// * `Result<Pipeline, ParseError>` - the stages and the background flag, or
///   the first empty stage found.
pub fn construct_pipeline(line: TokenizedLine) -> Result<Pipeline, ParseError> {
    if line.words.is_empty() {
        return Err(ParseError::EmptyPipeline);
    }

    let mut builder = PipelineBuilder::new();
    for word in line.words {
        if word == PIPE_MARKER {
            builder.finish_stage()?;
        } else {
            builder.push_word(word);
        }
    }
    let pipeline = builder.build(line.background)?;
    log::debug!(
        "parsed pipeline: {} stage(s), background={}",
        pipeline.stages().len(),
        pipeline.is_background()
    );
    Ok(pipeline)
}
