//! Git hook checks.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Shown to the committer when the subject line is rejected.
pub const COMMIT_FORMAT_HINT: &str = "try: <type>(<scope>): <subject>";

#[derive(Debug, Error)]
pub enum CommitMsgError {
    #[error("commit message is not formatted correctly: '{subject}'\n{hint}", hint = COMMIT_FORMAT_HINT)]
    BadFormat { subject: String },

    #[error("failed to read commit message file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

static SUBJECT_RE: OnceLock<Regex> = OnceLock::new();

/// Validates the first line of a commit message against
/// `<type>(<scope>): <subject>` (scope optional) or a `revert: ` prefix.
pub fn check_commit_message(message: &str) -> Result<(), CommitMsgError> {
    let re = SUBJECT_RE.get_or_init(|| {
        Regex::new(r"^(.+?)(\(.+?\))?:(.+?)|revert: ").expect("commit subject regex")
    });
    let subject = message.lines().next().unwrap_or_default();
    debug!("checking commit subject: {}", subject);

    if re.is_match(subject) {
        Ok(())
    } else {
        Err(CommitMsgError::BadFormat {
            subject: subject.to_string(),
        })
    }
}

/// Reads the message file git passes to a `commit-msg` hook and validates it.
pub fn check_commit_message_file(path: &Path) -> Result<(), CommitMsgError> {
    let message = std::fs::read_to_string(path).map_err(|source| CommitMsgError::Read {
        path: path.display().to_string(),
        source,
    })?;
    check_commit_message(&message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_type_and_subject() {
        check_commit_message("fix: handle missing pyvenv.cfg").expect("should pass");
    }

    #[test]
    fn accepts_scoped_subject_with_body() {
        check_commit_message("feat(registry): suffix colliding names\n\nLonger body here.\n")
            .expect("should pass");
    }

    #[test]
    fn accepts_revert() {
        check_commit_message("revert: feat(registry): suffix colliding names").expect("should pass");
    }

    #[test]
    fn rejects_free_form_subject() {
        let err = check_commit_message("Updated some stuff").expect_err("must fail");
        assert!(matches!(err, CommitMsgError::BadFormat { .. }));
        assert!(err.to_string().contains(COMMIT_FORMAT_HINT));
    }

    #[test]
    fn only_first_line_is_checked() {
        let err = check_commit_message("wip\nfix: the real subject").expect_err("must fail");
        assert!(err.to_string().contains("'wip'"));
    }

    #[test]
    fn reads_message_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("COMMIT_EDITMSG");
        std::fs::write(&path, "docs: describe dedupe\n").unwrap();
        check_commit_message_file(&path).expect("should pass");

        let missing = check_commit_message_file(&dir.path().join("nope")).expect_err("must fail");
        assert!(matches!(missing, CommitMsgError::Read { .. }));
    }
}
