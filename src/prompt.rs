//! User interaction and repository validation seams.

use std::io::{BufRead, Write};

/// Asks the user questions
pub trait UserPrompt {
    /// Yes/no question; an empty answer returns `default`
    fn confirm(&self, question: &str, default: bool) -> std::io::Result<bool>;

    /// Free-form question; an empty answer returns `default` (or an empty string)
    fn ask(&self, question: &str, default: Option<&str>) -> std::io::Result<String>;
}

/// Prompt reading answers from stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    fn read_line(prompt: &str) -> std::io::Result<String> {
        print!("{} ", prompt);
        std::io::stdout().flush()?;

        let mut input = String::new();
        let read = std::io::stdin().lock().read_line(&mut input)?;
        if read == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stdin closed while waiting for an answer",
            ));
        }
        Ok(input.trim().to_string())
    }
}

impl UserPrompt for TerminalPrompt {
    fn confirm(&self, question: &str, default: bool) -> std::io::Result<bool> {
        let hint = if default { "yes" } else { "no" };
        let answer = Self::read_line(&format!("{} [{}]?", question, hint))?;
        Ok(parse_confirmation(&answer, default))
    }

    fn ask(&self, question: &str, default: Option<&str>) -> std::io::Result<String> {
        let prompt = match default {
            Some(d) if !d.is_empty() => format!("{} [{}]:", question, d),
            _ => format!("{}:", question),
        };
        let answer = Self::read_line(&prompt)?;
        if answer.is_empty() {
            Ok(default.unwrap_or_default().to_string())
        } else {
            Ok(answer)
        }
    }
}

/// Interpret a yes/no answer
pub fn parse_confirmation(answer: &str, default: bool) -> bool {
    match answer.trim().to_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    }
}

/// Decides whether a repository identifier may be built
pub trait RepositoryValidator {
    /// Return the (possibly normalized) identifier, or a rejection reason
    fn validate(&self, repository: &str) -> Result<String, String>;
}

/// Validator that accepts every identifier
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl RepositoryValidator for AcceptAll {
    fn validate(&self, repository: &str) -> Result<String, String> {
        Ok(repository.to_string())
    }
}

/// Validator restricted to a fixed list of names
#[derive(Debug, Clone)]
pub struct KnownRepositories {
    names: Vec<String>,
}

impl KnownRepositories {
    /// Accept only `names`
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

impl RepositoryValidator for KnownRepositories {
    fn validate(&self, repository: &str) -> Result<String, String> {
        if self.names.iter().any(|n| n == repository) {
            Ok(repository.to_string())
        } else {
            Err(format!("Repository \"{}\" was not found", repository))
        }
    }
}

/// Ask for a repository until the validator accepts one.
///
/// `report` receives each rejection message before the question is repeated.
pub fn select_repository(
    prompt: &dyn UserPrompt,
    validator: &dyn RepositoryValidator,
    default: Option<&str>,
    mut report: impl FnMut(&str),
) -> std::io::Result<String> {
    loop {
        let answer = prompt.ask("Which repo?", default)?;
        if answer.is_empty() {
            report("You must enter a repository name");
            continue;
        }
        match validator.validate(&answer) {
            Ok(repository) => return Ok(repository),
            Err(reason) => report(&reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct Scripted {
        answers: RefCell<VecDeque<String>>,
    }

    impl Scripted {
        fn new(answers: &[&str]) -> Self {
            Self {
                answers: RefCell::new(answers.iter().map(|s| s.to_string()).collect()),
            }
        }
    }

    impl UserPrompt for Scripted {
        fn confirm(&self, _question: &str, default: bool) -> std::io::Result<bool> {
            let answer = self.answers.borrow_mut().pop_front().unwrap_or_default();
            Ok(parse_confirmation(&answer, default))
        }

        fn ask(&self, _question: &str, default: Option<&str>) -> std::io::Result<String> {
            let answer = self.answers.borrow_mut().pop_front().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "no more answers")
            })?;
            if answer.is_empty() {
                Ok(default.unwrap_or_default().to_string())
            } else {
                Ok(answer)
            }
        }
    }

    #[test]
    fn confirmation_defaults_on_empty_answer() {
        assert!(parse_confirmation("", true));
        assert!(!parse_confirmation("", false));
        assert!(parse_confirmation("YES", false));
        assert!(!parse_confirmation("nope", true));
    }

    #[test]
    fn selection_retries_until_valid() {
        let prompt = Scripted::new(&["zz", "", "gr"]);
        let validator = KnownRepositories::new(vec!["kis".to_string(), "gr".to_string()]);
        let mut rejections = Vec::new();

        let chosen =
            select_repository(&prompt, &validator, None, |r| rejections.push(r.to_string()))
                .unwrap();

        assert_eq!(chosen, "gr");
        assert_eq!(rejections.len(), 2);
        assert!(rejections[0].contains("\"zz\" was not found"));
    }

    #[test]
    fn selection_uses_default_on_empty_answer() {
        let prompt = Scripted::new(&[""]);
        let chosen = select_repository(&prompt, &AcceptAll, Some("kis"), |_| {}).unwrap();
        assert_eq!(chosen, "kis");
    }

    #[test]
    fn selection_stops_when_input_ends() {
        let prompt = Scripted::new(&["zz"]);
        let validator = KnownRepositories::new(vec!["kis".to_string()]);
        assert!(select_repository(&prompt, &validator, None, |_| {}).is_err());
    }
}
