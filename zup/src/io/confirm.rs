//! Interactive yes/no confirmation before a fix is applied.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use colored::Colorize;

use crate::core::answer::is_affirmative;

/// Asks the user to approve an action.
pub trait Confirmer {
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Confirmer reading one line per question from stdin. EOF declines.
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        ask_yes_no(io::stdin().lock(), io::stdout(), prompt)
    }
}

/// Write `<prompt> (y/n): ` to `output` and read one answer line from `input`.
pub fn ask_yes_no<R: BufRead, W: Write>(mut input: R, mut output: W, prompt: &str) -> Result<bool> {
    write!(output, "{} ", format!("{prompt} (y/n):").bright_magenta().bold())
        .context("write prompt")?;
    output.flush().context("flush prompt")?;

    let mut answer = String::new();
    let read = input.read_line(&mut answer).context("read answer")?;
    if read == 0 {
        return Ok(false);
    }
    Ok(is_affirmative(&answer))
}
