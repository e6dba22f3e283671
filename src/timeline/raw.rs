// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::Deserialize;

use super::{EntryLayout, ItemContent};

const ADD_ENTRIES: &str = "TimelineAddEntries";
const CURSOR_ENTRY: &str = "TimelineTimelineCursor";
const BOTTOM: &str = "Bottom";

#[derive(Debug, Deserialize)]
pub(crate) struct RawInstruction {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEntry {
    #[serde(default)]
    pub content: RawEntryContent,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawEntryContent {
    #[serde(rename = "entryType", default)]
    pub entry_type: String,
    #[serde(rename = "cursorType", default)]
    pub cursor_type: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(rename = "itemContent", default)]
    pub item_content: Option<ItemContent>,
    #[serde(default)]
    pub items: Vec<RawModuleItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawModuleItem {
    #[serde(default)]
    pub item: RawModuleItemContent,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawModuleItemContent {
    #[serde(rename = "itemContent", default)]
    pub item_content: Option<ItemContent>,
}

/// Picks the entries out of the single "add entries" instruction.
pub(crate) fn add_entries(instructions: Vec<RawInstruction>) -> Option<Vec<RawEntry>> {
    instructions
        .into_iter()
        .find(|inst| inst.kind == ADD_ENTRIES)
        .map(|inst| inst.entries)
}

/// Scans the entries from the end for the bottom cursor marker.
pub(crate) fn bottom_cursor(entries: &[RawEntry]) -> Option<String> {
    entries
        .iter()
        .rev()
        .find(|entry| {
            entry.content.entry_type == CURSOR_ENTRY
                && entry.content.cursor_type.as_deref() == Some(BOTTOM)
        })
        .and_then(|entry| entry.content.value.clone())
}

pub(crate) fn item_contents(entries: Vec<RawEntry>, layout: EntryLayout) -> Vec<ItemContent> {
    match layout {
        EntryLayout::Flat => entries
            .into_iter()
            .filter_map(|entry| entry.content.item_content)
            .collect(),
        EntryLayout::Grouped => entries
            .into_iter()
            .next()
            .map(|module| {
                module
                    .content
                    .items
                    .into_iter()
                    .filter_map(|item| item.item.item_content)
                    .collect()
            })
            .unwrap_or_default(),
    }
}
