//!
//! The command grammar: every mutation of the projected state is one of
//! these, encoded as a single line `"<mnemonic> <fields...>"` and replayed
//! in merged-log order. The final field absorbs remaining spaces, so
//! titles may contain spaces; newlines are impossible by record framing.

use std::collections::HashSet;
use std::fmt;

use crate::error::ParseError;
use crate::order::OrderGroup;

/// Sentinel standing in for the "front of sequence" anchor in encoded
/// order groups.
const ANCHOR_FRONT: &str = "-";

/// A typed command, one variant per mnemonic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `t <item_id> <title>`: create the item if unknown, set its title.
    SetTitle { item_id: String, title: String },
    /// `d <item_id>`: drop the item if present.
    DeleteItem { item_id: String },
    /// `T <item_id> <tag>`: file the item under a tag.
    SetTag { item_id: String, tag: String },
    /// `D <item_id>`: clear the item's tag.
    UnsetTag { item_id: String },
    /// `o <first> <second>`: move tag `second` right after `first`.
    OrderTag { first: String, second: String },
    /// `r <tag>`: drop an unused tag from the tag order.
    RemoveTag { tag: String },
    /// `O <group>...`: re-order items by anchored groups.
    OrderItems { groups: Vec<OrderGroup<String>> },
}

impl Command {
    /// Parse an encoded command line.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut chars = input.chars();
        let mnemonic = chars.next().ok_or(ParseError::Empty)?;
        let rest = match chars.next() {
            Some(' ') => chars.as_str(),
            _ => "",
        };

        match mnemonic {
            't' => {
                let (item_id, title) = two_fields(rest, 't')?;
                Ok(Command::SetTitle { item_id, title })
            }
            'd' => Ok(Command::DeleteItem {
                item_id: one_field(rest, 'd')?,
            }),
            'T' => {
                let (item_id, tag) = two_fields(rest, 'T')?;
                Ok(Command::SetTag { item_id, tag })
            }
            'D' => Ok(Command::UnsetTag {
                item_id: one_field(rest, 'D')?,
            }),
            'o' => {
                let (first, second) = two_fields(rest, 'o')?;
                Ok(Command::OrderTag { first, second })
            }
            'r' => Ok(Command::RemoveTag {
                tag: one_field(rest, 'r')?,
            }),
            'O' => parse_order_groups(rest),
            other => Err(ParseError::UnknownMnemonic(other)),
        }
    }
}

fn one_field(rest: &str, mnemonic: char) -> Result<String, ParseError> {
    if rest.is_empty() {
        return Err(ParseError::NotEnoughArguments(mnemonic));
    }
    Ok(rest.to_string())
}

fn two_fields(rest: &str, mnemonic: char) -> Result<(String, String), ParseError> {
    match rest.split_once(' ') {
        Some((first, second)) if !first.is_empty() && !second.is_empty() => {
            Ok((first.to_string(), second.to_string()))
        }
        _ => Err(ParseError::NotEnoughArguments(mnemonic)),
    }
}

fn parse_order_groups(rest: &str) -> Result<Command, ParseError> {
    if rest.is_empty() {
        return Err(ParseError::NotEnoughArguments('O'));
    }

    let mut groups = Vec::new();
    for token in rest.split(' ') {
        let mut members = token.split(',');
        let anchor = match members.next() {
            Some(ANCHOR_FRONT) => None,
            Some(id) if !id.is_empty() => Some(id.to_string()),
            _ => return Err(ParseError::NotEnoughArguments('O')),
        };
        let keys: Vec<String> = members.map(str::to_string).collect();
        if keys.is_empty() || keys.iter().any(String::is_empty) {
            return Err(ParseError::NotEnoughArguments('O'));
        }
        // rejected here so the fold never has to fail on a committed record
        let mut seen = HashSet::new();
        if !keys.iter().all(|key| seen.insert(key)) {
            return Err(ParseError::DuplicateKey);
        }
        groups.push(OrderGroup { anchor, keys });
    }

    Ok(Command::OrderItems { groups })
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetTitle { item_id, title } => write!(f, "t {} {}", item_id, title),
            Command::DeleteItem { item_id } => write!(f, "d {}", item_id),
            Command::SetTag { item_id, tag } => write!(f, "T {} {}", item_id, tag),
            Command::UnsetTag { item_id } => write!(f, "D {}", item_id),
            Command::OrderTag { first, second } => write!(f, "o {} {}", first, second),
            Command::RemoveTag { tag } => write!(f, "r {}", tag),
            Command::OrderItems { groups } => {
                f.write_str("O")?;
                for group in groups {
                    let anchor = group.anchor.as_deref().unwrap_or(ANCHOR_FRONT);
                    write!(f, " {}", anchor)?;
                    for key in &group.keys {
                        write!(f, ",{}", key)?;
                    }
                }
                Ok(())
            }
        }
    }
}
