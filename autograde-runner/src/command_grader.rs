//! Grader that runs an arbitrary external program inside the submission.

use std::path::Path;

use async_trait::async_trait;

use autograde_core::{Score, ScoreSource};

use crate::error::GradeError;
use crate::grader::{Graded, Grader};
use crate::process::{self, ProcessOutput};

#[derive(Debug, Clone)]
pub struct CommandGrader {
    program: String,
    args: Vec<String>,
    source: ScoreSource,
    pass_score: f64,
}

impl CommandGrader {
    pub fn new(program: String, args: Vec<String>, source: ScoreSource, pass_score: f64) -> Self {
        Self {
            program,
            args,
            source,
            pass_score,
        }
    }

    fn score(&self, output: ProcessOutput) -> Result<Graded, GradeError> {
        match self.source {
            ScoreSource::LastLine => {
                if !output.success() {
                    return Err(output.into_error(&self.program));
                }
                let line = output
                    .stdout
                    .lines()
                    .rev()
                    .map(str::trim)
                    .find(|l| !l.is_empty())
                    .ok_or_else(|| GradeError::Score("no output".to_string()))?;
                let score = line.parse::<Score>().map_err(GradeError::Score)?;
                Ok(Graded {
                    score,
                    diagnostic: output.combined(),
                })
            }
            ScoreSource::ExitCode => {
                let score = if output.success() {
                    Score::new(self.pass_score)
                        .ok_or_else(|| GradeError::Score("pass_score is not finite".to_string()))?
                } else {
                    Score::ZERO
                };
                Ok(Graded {
                    score,
                    diagnostic: output.combined(),
                })
            }
        }
    }
}

#[async_trait]
impl Grader for CommandGrader {
    fn name(&self) -> &str {
        "command"
    }

    async fn run_grading(&self, repo: &Path) -> Result<Graded, GradeError> {
        let output = process::run(&self.program, &self.args, repo).await?;
        self.score(output)
    }
}
