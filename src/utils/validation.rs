//! Parsing helpers for chat input.
//!
//! Chat commands and join-request comments are free text; these functions turn
//! them into QQ ids and passcodes.

use crate::error::{Result, TreePassError};
use std::num::IntErrorKind;

/// Split input on spaces and newlines, dropping empty pieces.
///
/// # Examples
///
/// ```
/// use treepass::utils::validation::split_arguments;
///
/// let args: Vec<_> = split_arguments("123  456\n789").collect();
/// assert_eq!(args, vec!["123", "456", "789"]);
/// ```
pub fn split_arguments(input: &str) -> impl Iterator<Item = &str> {
    input.split([' ', '\n', '\r', '\t']).filter(|s| !s.is_empty())
}

/// Parse a QQ id.
///
/// QQ ids are positive decimal numbers. Overflow gets its own message so the
/// auditor knows the number was too long rather than mistyped.
///
/// # Errors
///
/// Returns `InvalidInput` when the token is not a positive decimal number or
/// does not fit in `u64`.
///
/// # Examples
///
/// ```
/// use treepass::utils::validation::parse_qq_id;
///
/// assert_eq!(parse_qq_id("10001").unwrap(), 10001);
/// assert!(parse_qq_id("abc").is_err());
/// assert!(parse_qq_id("0").is_err());
/// ```
pub fn parse_qq_id(token: &str) -> Result<u64> {
    match token.trim().parse::<u64>() {
        Ok(0) => Err(TreePassError::InvalidInput("QQ ID cannot be 0".to_string())),
        Ok(id) => Ok(id),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Err(TreePassError::InvalidInput(format!(
            "QQ ID '{}' is too large (max {})",
            token,
            u64::MAX
        ))),
        Err(_) => Err(TreePassError::InvalidInput(format!(
            "'{}' is not a valid QQ ID",
            token
        ))),
    }
}

/// Pull the answer out of a join-request comment.
///
/// QQ sends the comment as `问题：<question>\n答案：<answer>` when the group
/// asks a question; otherwise the comment is the raw text the applicant typed.
///
/// # Examples
///
/// ```
/// use treepass::utils::validation::extract_passcode;
///
/// assert_eq!(extract_passcode("问题：验证码\n答案：0123456789"), "0123456789");
/// assert_eq!(extract_passcode("  0123456789 "), "0123456789");
/// ```
pub fn extract_passcode(comment: &str) -> &str {
    let answer = comment
        .rsplit_once("答案：")
        .or_else(|| comment.rsplit_once("答案:"))
        .map_or(comment, |(_, answer)| answer);
    answer.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_arguments() {
        assert_eq!(split_arguments("").count(), 0);
        assert_eq!(split_arguments("   \n ").count(), 0);
        assert_eq!(
            split_arguments(" .check\t123 ").collect::<Vec<_>>(),
            vec![".check", "123"]
        );
    }

    #[test]
    fn test_parse_qq_id() {
        assert_eq!(parse_qq_id("123456789").unwrap(), 123456789);
        assert_eq!(parse_qq_id(" 42 ").unwrap(), 42);

        match parse_qq_id("99999999999999999999999") {
            Err(TreePassError::InvalidInput(msg)) => assert!(msg.contains("too large")),
            other => panic!("Expected overflow error, got {:?}", other),
        }

        assert!(parse_qq_id("").is_err());
        assert!(parse_qq_id("-5").is_err());
        assert!(parse_qq_id("12a").is_err());
        assert!(parse_qq_id("0").is_err());
    }

    #[test]
    fn test_extract_passcode() {
        assert_eq!(extract_passcode("问题：请输入验证码\n答案：1234567890"), "1234567890");
        assert_eq!(extract_passcode("答案: 1234567890"), "1234567890");
        assert_eq!(extract_passcode("1234567890"), "1234567890");
        assert_eq!(extract_passcode(""), "");
    }
}
