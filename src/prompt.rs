use std::fmt;
use std::io::{self, BufRead, Write};

use console::style;

/// A yes/no question the deletion planner needs answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Removing `ancestor` also removes other images built from it.
    RemoveWithDependents {
        ancestor: String,
        affected: Vec<String>,
    },
    /// `ancestor` is a named image with no other dependents.
    RemoveParent { ancestor: String },
    /// Final go/no-go on the complete removal list.
    ConfirmPlan { entries: Vec<String> },
}

impl Prompt {
    /// Items listed above the question.
    pub fn details(&self) -> &[String] {
        match self {
            Prompt::RemoveWithDependents { affected, .. } => affected,
            Prompt::RemoveParent { .. } => &[],
            Prompt::ConfirmPlan { entries } => entries,
        }
    }

    fn heading(&self) -> Option<String> {
        match self {
            Prompt::RemoveWithDependents { ancestor, .. } => Some(format!(
                "Warning: removing {} will also remove the following images:",
                ancestor
            )),
            Prompt::RemoveParent { .. } => None,
            Prompt::ConfirmPlan { .. } => Some("The following images will be removed:".to_string()),
        }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prompt::RemoveWithDependents { ancestor, .. } => {
                write!(f, "Confirm removal of {} and all the above images?", ancestor)
            }
            Prompt::RemoveParent { ancestor } => write!(f, "Remove parent image {}?", ancestor),
            Prompt::ConfirmPlan { .. } => write!(f, "Confirm deletion?"),
        }
    }
}

/// Answers yes/no questions. Injected so planning never touches the terminal directly.
pub trait Confirm {
    /// Fails only when the answer cannot be read.
    fn confirm(&mut self, prompt: &Prompt) -> io::Result<bool>;
}

/// Asks on stdout and reads answers from stdin.
pub struct TerminalConfirm<R, W> {
    input: R,
    output: W,
}

impl TerminalConfirm<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for TerminalConfirm<R, W> {
    fn confirm(&mut self, prompt: &Prompt) -> io::Result<bool> {
        if let Some(heading) = prompt.heading() {
            writeln!(self.output, "{}", style(heading).yellow())?;
        }
        for item in prompt.details() {
            writeln!(self.output, "  - {}", item)?;
        }

        let question = format!(
            "{} {}{}{} ",
            prompt,
            style("[").bold().cyan(),
            style("y/n").bold(),
            style("]").bold().cyan(),
        );

        loop {
            write!(self.output, "{}", question)?;
            self.output.flush()?;

            let mut input = String::new();
            if self.input.read_line(&mut input)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "no answer on stdin",
                ));
            }
            match input.trim().to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "    {}", style("Please enter y or n").dim())?,
            }
        }
    }
}
