use std::io::{self, BufRead, Write};

use anyhow::bail;
use booking_engine::{CategorySelector, Command};
use contact_store::ContactData;

/// Line-based interaction with the user
pub trait Prompter {
    /// Shows `label` and returns the trimmed answer
    fn ask(&mut self, label: &str) -> anyhow::Result<String>;

    /// Shows a message
    fn say(&mut self, message: &str);
}

/// Prompts on stdout and reads answers from stdin
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&mut self, label: &str) -> anyhow::Result<String> {
        print!("{}: ", label);
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            bail!("input closed while waiting for '{}'", label);
        }
        Ok(line.trim().to_string())
    }

    fn say(&mut self, message: &str) {
        println!("{}", message);
    }
}

/// Asks for every field `command` needs that is still absent.
///
/// Invalid answers are reported and asked again. Returns whether anything
/// was entered.
pub fn collect_missing(
    prompter: &mut dyn Prompter,
    data: &mut ContactData,
    command: Command,
) -> anyhow::Result<bool> {
    let missing = data.missing_fields(command);
    if missing.is_empty() {
        return Ok(false);
    }

    prompter.say(&format!(
        "Please enter the missing contact data for '{}':",
        command
    ));

    for field in &missing {
        loop {
            let answer = prompter.ask(field.label())?;
            match data.set(*field, &answer) {
                Ok(()) => break,
                Err(e) => prompter.say(&format!("⚠️ {}", e)),
            }
        }
    }

    Ok(true)
}

/// Asks until one of the four category tags is entered
pub fn ask_category(prompter: &mut dyn Prompter) -> anyhow::Result<CategorySelector> {
    loop {
        let answer = prompter.ask("Category (L920, L921, L922, L923)")?;
        match answer.parse::<CategorySelector>() {
            Ok(category) => return Ok(category),
            Err(e) => prompter.say(&format!("⚠️ {}", e)),
        }
    }
}

#[cfg(test)]
pub use scripted::ScriptedPrompter;
