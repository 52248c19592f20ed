//! Event signature hashing.
//!
//! The signature of an EVM event is the keccak256 hash of its canonical
//! declaration, e.g.:
//!   keccak256("Transfer(address,address,uint256)")
//!   → 0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef
//!
//! The same function builds the registry and derives the Transfer constant.

use alloy_primitives::B256;
use std::sync::OnceLock;
use tiny_keccak::{Hasher, Keccak};

/// Canonical declaration of the ERC-20 Transfer event.
pub const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";

/// Compute the keccak256 hash of a canonical event declaration.
pub fn event_signature_hash(declaration: &str) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(declaration.as_bytes());
    hasher.finalize(&mut output);
    B256::from(output)
}

/// topic[0] of every ERC-20 `Transfer` log.
pub fn transfer_signature() -> B256 {
    static TRANSFER: OnceLock<B256> = OnceLock::new();
    *TRANSFER.get_or_init(|| event_signature_hash(TRANSFER_EVENT))
}

/// Normalize one line of a declaration list.
///
/// Accepts the canonical form as well as Solidity source lines such as
/// `event Transfer(address indexed from, address indexed to, uint256 value);`:
/// the `event` keyword, a trailing `;`, `indexed` and parameter names are
/// dropped and only the parameter types are kept. Returns `None` when the line
/// is not shaped like `Name(params)`.
pub fn normalize_declaration(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let trimmed = trimmed
        .strip_prefix("event ")
        .or_else(|| trimmed.strip_prefix("event\t"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.trim().trim_end_matches(';').trim_end();

    let open = trimmed.find('(')?;
    let (name, params) = trimmed.split_at(open);
    let name = name.trim_end();
    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    if !params.ends_with(')') || !balanced(params) {
        return None;
    }
    let types = canonical_params(&params[1..params.len() - 1])?;
    Some(format!("{name}({types})"))
}

fn balanced(params: &str) -> bool {
    let mut depth = 0i32;
    for (i, c) in params.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                // the outer paren may only close at the very end
                if depth == 0 && i != params.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}

/// Comma-separated parameter list (without the outer parens) → type list.
fn canonical_params(inner: &str) -> Option<String> {
    if inner.trim().is_empty() {
        return Some(String::new());
    }
    let types = split_top_level(inner)
        .into_iter()
        .map(canonical_param)
        .collect::<Option<Vec<_>>>()?;
    Some(types.join(","))
}

fn split_top_level(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}

/// `<type> [indexed] [name]` → `<type>`. Tuple types are normalized recursively.
fn canonical_param(param: &str) -> Option<String> {
    let param = param.trim();
    let (ty, rest) = if param.starts_with('(') {
        let close = matching_close(param)?;
        let after = &param[close + 1..];
        let suffix_len = after.find(char::is_whitespace).unwrap_or(after.len());
        let (suffix, rest) = after.split_at(suffix_len);
        if !suffix.chars().all(|c| c.is_ascii_digit() || c == '[' || c == ']') {
            return None;
        }
        let tuple = canonical_params(&param[1..close])?;
        (format!("({tuple}){suffix}"), rest)
    } else {
        let ty_len = param.find(char::is_whitespace).unwrap_or(param.len());
        let (ty, rest) = param.split_at(ty_len);
        let mut chars = ty.chars();
        if !chars.next()?.is_ascii_alphabetic() {
            return None;
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '[' || c == ']') {
            return None;
        }
        (ty.to_string(), rest)
    };

    let mut tokens = rest.split_whitespace().peekable();
    if tokens.peek() == Some(&"indexed") {
        tokens.next();
    }
    if let Some(name) = tokens.next() {
        let mut chars = name.chars();
        let head = chars.next()?;
        if !(head.is_ascii_alphabetic() || head == '_' || head == '$')
            || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        {
            return None;
        }
    }
    if tokens.next().is_some() {
        return None;
    }
    Some(ty)
}

fn matching_close(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erc20_transfer_signature() {
        assert_eq!(
            format!("{:#x}", transfer_signature()),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn erc20_approval_signature() {
        let sig = event_signature_hash("Approval(address,address,uint256)");
        assert_eq!(
            format!("{sig:#x}"),
            "0x8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925"
        );
    }

    #[test]
    fn normalize_strips_whitespace_and_keyword() {
        assert_eq!(
            normalize_declaration("  event Transfer(address, address,uint256) ").as_deref(),
            Some(TRANSFER_EVENT)
        );
        assert_eq!(
            normalize_declaration("Swap(address,(uint256,uint256),bool)").as_deref(),
            Some("Swap(address,(uint256,uint256),bool)")
        );
    }

    #[test]
    fn normalize_rejects_malformed() {
        assert!(normalize_declaration("").is_none());
        assert!(normalize_declaration("Transfer").is_none());
        assert!(normalize_declaration("Transfer(address").is_none());
        assert!(normalize_declaration("1Bad(uint256)").is_none());
        assert!(normalize_declaration("Bad-Name(uint256)").is_none());
        assert!(normalize_declaration("A(uint256)B(uint256)").is_none());
    }

    #[test]
    fn normalize_keeps_only_parameter_types() {
        assert_eq!(
            normalize_declaration("event Transfer(address indexed from, address indexed to, uint256 value);")
                .as_deref(),
            Some(TRANSFER_EVENT)
        );
        assert_eq!(
            normalize_declaration("Swap((uint256 a, uint256 b)[] indexed legs, bool ok)").as_deref(),
            Some("Swap((uint256,uint256)[],bool)")
        );
        assert_eq!(normalize_declaration("Paused()").as_deref(), Some("Paused()"));
    }

    #[test]
    fn normalize_rejects_unparseable_parameters() {
        assert!(normalize_declaration("Transfer(address indexed from extra, uint256)").is_none());
        assert!(normalize_declaration("Transfer(address,,uint256)").is_none());
        assert!(normalize_declaration("Transfer(1address)").is_none());
    }
}
