//!
//! The projected state: an ordered tag list plus an insertion-ordered
//! item map, folded deterministically from the merged command log, and
//! the render consumed by user interfaces.
//!
//! Two special tags exist from the start and can be neither set directly
//! nor removed: `inbox`, where untagged items surface, and `tickler`,
//! where scheduled items wait until their date arrives.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dates::{is_scheduled, parse_scheduled};
use crate::error::ParseError;
use crate::order::patch_order;

use super::command::Command;

pub const TAG_INBOX: &str = "inbox";
pub const TAG_TICKLER: &str = "tickler";

/// Tags every fresh database starts with, in display order.
pub const DEFAULT_TAG_ORDER: [&str; 5] = ["inbox", "todo", "ref", "someday", "tickler"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub title: String,
    /// Raw tag string; empty means untagged, `$YYYY-MM-DD` means
    /// scheduled.
    pub tag: String,
}

/// The full projected state. Folding the same record sequence always
/// produces the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub tag_order: Vec<String>,
    pub items: IndexMap<String, Item>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            tag_order: DEFAULT_TAG_ORDER.iter().map(|tag| tag.to_string()).collect(),
            items: IndexMap::new(),
        }
    }
}

impl State {
    /// Fold one command into the state. Commands referring to unknown
    /// items or tags degrade to no-ops; nothing here can fail, so a
    /// half-applied command is impossible.
    pub fn apply(&mut self, command: &Command) {
        match command {
            Command::SetTitle { item_id, title } => {
                let item = self.items.entry(item_id.clone()).or_insert_with(|| Item {
                    title: String::new(),
                    tag: String::new(),
                });
                item.title = title.clone();
            }
            Command::DeleteItem { item_id } => {
                self.items.shift_remove(item_id);
            }
            Command::SetTag { item_id, tag } => {
                if tag == TAG_INBOX || tag == TAG_TICKLER {
                    return;
                }
                if let Some(item) = self.items.get_mut(item_id) {
                    item.tag = tag.clone();
                    if !is_scheduled(tag) && !self.tag_order.iter().any(|t| t == tag) {
                        self.tag_order.push(tag.clone());
                    }
                }
            }
            Command::UnsetTag { item_id } => {
                if let Some(item) = self.items.get_mut(item_id) {
                    item.tag.clear();
                }
            }
            Command::OrderTag { first, second } => {
                if first == second
                    || !self.tag_order.iter().any(|t| t == first)
                    || !self.tag_order.iter().any(|t| t == second)
                {
                    return;
                }
                self.tag_order.retain(|t| t != second);
                if let Some(at) = self.tag_order.iter().position(|t| t == first) {
                    self.tag_order.insert(at + 1, second.clone());
                }
            }
            Command::RemoveTag { tag } => {
                if tag == TAG_INBOX || tag == TAG_TICKLER {
                    return;
                }
                if !self.tag_order.iter().any(|t| t == tag) {
                    return;
                }
                if self.items.values().any(|item| &item.tag == tag) {
                    return;
                }
                self.tag_order.retain(|t| t != tag);
            }
            Command::OrderItems { groups } => {
                let keys: Vec<String> = self.items.keys().cloned().collect();
                if let Ok(order) = patch_order(&keys, groups) {
                    let mut items = IndexMap::with_capacity(self.items.len());
                    for key in order {
                        if let Some(item) = self.items.shift_remove(&key) {
                            items.insert(key, item);
                        }
                    }
                    self.items = items;
                }
            }
        }
    }
}

/// The tag an item files under for display: empty resolves to the inbox;
/// scheduled tags collapse to `tickler` until their date arrives, then to
/// `inbox`.
pub fn display_tag<'a>(tag: &'a str, today: NaiveDate) -> Result<&'a str, ParseError> {
    if tag.is_empty() {
        return Ok(TAG_INBOX);
    }
    if is_scheduled(tag) {
        let date = parse_scheduled(tag)?;
        return Ok(if date > today { TAG_TICKLER } else { TAG_INBOX });
    }
    Ok(tag)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSummary {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedItem {
    pub id: String,
    pub title: String,
    /// `YYYY-MM-DD` for scheduled items, absent otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled: Option<String>,
}

/// What a UI shows: every tag with its item count, the index of the
/// active tag, and the items filed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedState {
    pub tags: Vec<TagSummary>,
    pub active_tag: usize,
    pub items: Vec<RenderedItem>,
}

/// Render the state for one tag. Pure in `(state, active_tag, today)`;
/// callers re-render at least once per local day rollover.
pub fn render(state: &State, active_tag: &str, today: NaiveDate) -> Result<RenderedState, ParseError> {
    let mut counts: IndexMap<&str, usize> =
        state.tag_order.iter().map(|tag| (tag.as_str(), 0)).collect();
    let mut filed: Vec<(&String, &Item, &str)> = Vec::with_capacity(state.items.len());
    for (id, item) in &state.items {
        let tag = display_tag(&item.tag, today)?;
        if let Some(count) = counts.get_mut(tag) {
            *count += 1;
        }
        filed.push((id, item, tag));
    }

    let active_index = state
        .tag_order
        .iter()
        .position(|tag| tag == active_tag)
        .or_else(|| state.tag_order.iter().position(|tag| tag == TAG_INBOX))
        .unwrap_or(0);
    let active_name = state
        .tag_order
        .get(active_index)
        .map(String::as_str)
        .unwrap_or(TAG_INBOX);

    let items = filed
        .into_iter()
        .filter(|(_, _, tag)| *tag == active_name)
        .map(|(id, item, _)| RenderedItem {
            id: id.clone(),
            title: item.title.clone(),
            scheduled: item.tag.strip_prefix('$').map(str::to_string),
        })
        .collect();

    Ok(RenderedState {
        tags: counts
            .into_iter()
            .map(|(name, count)| TagSummary {
                name: name.to_string(),
                count,
            })
            .collect(),
        active_tag: active_index,
        items,
    })
}
