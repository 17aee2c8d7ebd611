//! Where passphrases and confirmations come from.
//!
//! The lifecycle talks to a [`Prompt`] so that it never touches the
//! terminal directly. [`TerminalPrompt`] is the normal path; [`BatchPrompt`]
//! exists for scripted, non-interactive use only.

use zeroize::Zeroizing;

use crate::error::KeyError;
use crate::secret::SecretBytes;
use crate::tty;

/// Environment variable read by [`BatchPrompt`].
pub const PASSPHRASE_ENV: &str = "PDPKEY_PASSPHRASE";

/// Source of passphrases and yes/no answers for the key lifecycle.
pub trait Prompt {
    /// Reads a passphrase after showing `prompt`.
    fn passphrase(&mut self, prompt: &str) -> Result<SecretBytes, KeyError>;

    /// Asks a yes/no question. Anything but an explicit yes is a no.
    fn confirm(&mut self, question: &str) -> Result<bool, KeyError>;

    /// Shows an informational message to the operator.
    fn notice(&mut self, message: &str);
}

/// Reads from the controlling terminal with echo disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn passphrase(&mut self, prompt: &str) -> Result<SecretBytes, KeyError> {
        tty::read_secret(prompt)
    }

    fn confirm(&mut self, question: &str) -> Result<bool, KeyError> {
        let answer = tty::read_line(&format!("{question} [y/N] "))?;
        Ok(is_yes(&answer))
    }

    fn notice(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

/// Non-interactive prompt fed from the environment.
///
/// Every passphrase request returns the same value, so the double-entry
/// check always passes. Confirmations are answered with `assume_yes`.
pub struct BatchPrompt {
    passphrase: Option<SecretBytes>,
    assume_yes: bool,
}

impl BatchPrompt {
    pub fn new(passphrase: Option<SecretBytes>, assume_yes: bool) -> Self {
        Self {
            passphrase,
            assume_yes,
        }
    }

    /// Takes the passphrase from `PDPKEY_PASSPHRASE`, if set and non-empty.
    pub fn from_env(assume_yes: bool) -> Self {
        let passphrase = std::env::var(PASSPHRASE_ENV)
            .ok()
            .filter(|pw| !pw.is_empty())
            .map(|pw| SecretBytes::from(Zeroizing::new(pw)));
        Self::new(passphrase, assume_yes)
    }
}

impl Prompt for BatchPrompt {
    fn passphrase(&mut self, _prompt: &str) -> Result<SecretBytes, KeyError> {
        self.passphrase
            .clone()
            .ok_or(KeyError::InvalidArgument(
                "batch mode requires PDPKEY_PASSPHRASE to be set",
            ))
    }

    fn confirm(&mut self, _question: &str) -> Result<bool, KeyError> {
        Ok(self.assume_yes)
    }

    fn notice(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

/// Asks for a new passphrase twice and returns it if both entries match.
///
/// # Errors
///
/// `EmptyPassphrase` if the first entry is empty, `PassphraseMismatch` if
/// the entries differ. Both entries are wiped either way.
pub fn read_new_passphrase_with_confirmation(
    prompt: &mut dyn Prompt,
) -> Result<SecretBytes, KeyError> {
    let first = prompt.passphrase("New PDP passphrase: ")?;
    if first.is_empty() {
        return Err(KeyError::EmptyPassphrase);
    }

    let second = prompt.passphrase("Confirm PDP passphrase: ")?;
    if !first.ct_eq(&second) {
        return Err(KeyError::PassphraseMismatch);
    }

    Ok(first)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim_start().chars().next(), Some('y' | 'Y'))
}

/// Prompt driven by a fixed script, for tests.
#[cfg(test)]
pub(crate) struct ScriptedPrompt {
    passphrases: std::collections::VecDeque<&'static str>,
    answers: std::collections::VecDeque<bool>,
    pub(crate) passphrases_asked: usize,
    pub(crate) questions_asked: usize,
    pub(crate) notices: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompt {
    pub(crate) fn new(passphrases: &[&'static str], answers: &[bool]) -> Self {
        Self {
            passphrases: passphrases.iter().copied().collect(),
            answers: answers.iter().copied().collect(),
            passphrases_asked: 0,
            questions_asked: 0,
            notices: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Prompt for ScriptedPrompt {
    fn passphrase(&mut self, _prompt: &str) -> Result<SecretBytes, KeyError> {
        self.passphrases_asked += 1;
        self.passphrases
            .pop_front()
            .map(|pw| SecretBytes::from(pw.to_string()))
            .ok_or(KeyError::Aborted)
    }

    fn confirm(&mut self, _question: &str) -> Result<bool, KeyError> {
        self.questions_asked += 1;
        self.answers.pop_front().ok_or(KeyError::Aborted)
    }

    fn notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_entries_are_accepted() {
        let mut prompt = ScriptedPrompt::new(&["hunter2", "hunter2"], &[]);
        let pw = read_new_passphrase_with_confirmation(&mut prompt).unwrap();
        assert_eq!(&*pw, b"hunter2");
        assert_eq!(prompt.passphrases_asked, 2);
    }

    #[test]
    fn mismatched_entries_are_rejected() {
        let mut prompt = ScriptedPrompt::new(&["hunter2", "hunter3"], &[]);
        assert!(matches!(
            read_new_passphrase_with_confirmation(&mut prompt),
            Err(KeyError::PassphraseMismatch)
        ));
    }

    #[test]
    fn empty_passphrase_is_rejected_before_confirmation() {
        let mut prompt = ScriptedPrompt::new(&["", ""], &[]);
        assert!(matches!(
            read_new_passphrase_with_confirmation(&mut prompt),
            Err(KeyError::EmptyPassphrase)
        ));
        assert_eq!(prompt.passphrases_asked, 1);
    }

    #[test]
    fn batch_prompt_repeats_passphrase() {
        let secret = SecretBytes::from(String::from("pw"));
        let mut prompt = BatchPrompt::new(Some(secret), false);

        let pw = read_new_passphrase_with_confirmation(&mut prompt).unwrap();
        assert_eq!(&*pw, b"pw");
        assert!(!prompt.confirm("overwrite?").unwrap());
    }

    #[test]
    fn batch_prompt_without_passphrase_fails() {
        let mut prompt = BatchPrompt::new(None, true);
        assert!(matches!(
            prompt.passphrase("Passphrase: "),
            Err(KeyError::InvalidArgument(_))
        ));
        assert!(prompt.confirm("overwrite?").unwrap());
    }

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_yes("y"));
        assert!(is_yes("Yes"));
        assert!(is_yes("  yes"));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("sure"));
    }
}
