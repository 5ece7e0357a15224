//! Line-oriented terminal prompts.

use std::io::{BufRead, ErrorKind, Write};

use crate::error::Result;

const POSITIVE_INT_HINT: &str = "Please enter a positive integer.";
const NUMBER_HINT: &str = "Please enter a valid number.";

/// Asks questions on `output` and reads answers from `input`, one line
/// each. Answers are trimmed.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print a line to the prompt's output.
    pub fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{message}")?;
        Ok(())
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn read_answer(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "input closed while waiting for an answer",
            )
            .into());
        }
        Ok(line.trim().to_string())
    }

    /// Free text; empty input yields `default`.
    pub fn ask_string(&mut self, question: &str, default: &str) -> Result<String> {
        let answer = self.read_answer(question)?;
        Ok(if answer.is_empty() {
            default.to_string()
        } else {
            answer
        })
    }

    /// Free text with no default; may be empty.
    pub fn ask_line(&mut self, question: &str) -> Result<String> {
        self.read_answer(question)
    }

    /// A positive integer, asking again until one is given.
    pub fn ask_positive_int(&mut self, question: &str) -> Result<usize> {
        loop {
            match self.read_answer(question)?.parse::<usize>() {
                Ok(n) if n >= 1 => return Ok(n),
                _ => self.say(POSITIVE_INT_HINT)?,
            }
        }
    }

    /// A positive integer, or `default` on empty input.
    pub fn ask_positive_int_or(
        &mut self,
        question: &str,
        default: usize,
    ) -> Result<usize> {
        loop {
            let answer = self.read_answer(question)?;
            if answer.is_empty() {
                return Ok(default);
            }
            match answer.parse::<usize>() {
                Ok(n) if n >= 1 => return Ok(n),
                _ => self.say(POSITIVE_INT_HINT)?,
            }
        }
    }

    /// Any finite number, or `default` on empty input.
    pub fn ask_number_or(&mut self, question: &str, default: f32) -> Result<f32> {
        loop {
            let answer = self.read_answer(question)?;
            if answer.is_empty() {
                return Ok(default);
            }
            match answer.parse::<f32>() {
                Ok(n) if n.is_finite() => return Ok(n),
                _ => self.say(NUMBER_HINT)?,
            }
        }
    }

    /// `true` only for `y` (any case).
    pub fn confirm(&mut self, question: &str) -> Result<bool> {
        Ok(self.read_answer(question)?.eq_ignore_ascii_case("y"))
    }
}
