//! Interactive input. Everything the run asks of the user, and everything it
//! tells them, goes through [`Prompt`] so the flow can be scripted.

use std::collections::VecDeque;
use std::io;
use std::io::{BufRead, Write};

pub trait Prompt {
    /// Shows `question` and reads one line. `None` means input is closed.
    fn ask(&mut self, question: &str) -> io::Result<Option<String>>;
    fn say(&mut self, message: &str);
}

/// Reads from stdin, writes to stdout.
pub struct Terminal;

impl Prompt for Terminal {
    fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{question}")?;
        stdout.flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn say(&mut self, message: &str) {
        println!("{message}");
    }
}

/// Canned answers, with a record of what was asked and said.
#[derive(Debug, Default)]
pub struct Scripted {
    answers: VecDeque<String>,
    pub asked: Vec<String>,
    pub said: Vec<String>,
}

impl Scripted {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompt for Scripted {
    fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        self.asked.push(question.to_string());
        Ok(self.answers.pop_front())
    }

    fn say(&mut self, message: &str) {
        self.said.push(message.to_string());
    }
}
