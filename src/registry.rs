//! Page registry: device page slots and the active page
//!
//! Slot index == device page number. Removing a page leaves an empty slot
//! behind; indices are never handed out twice within one session.

use tracing::warn;

use crate::page::{Page, PageIndex};

#[derive(Debug, Default)]
pub struct PageRegistry {
    slots: Vec<Option<Page>>,
    active: Option<PageIndex>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a page in the next free slot and return its index
    pub fn insert(&mut self, page: Page) -> PageIndex {
        let index = self.slots.len() as PageIndex;
        self.slots.push(Some(page));
        index
    }

    /// Take a page out of its slot; the slot stays reserved
    pub fn remove(&mut self, index: PageIndex) -> Option<Page> {
        let page = self.slots.get_mut(index as usize)?.take();
        if page.is_some() && self.active == Some(index) {
            self.active = None;
        }
        page
    }

    pub fn get(&self, index: PageIndex) -> Option<&Page> {
        self.slots.get(index as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, index: PageIndex) -> Option<&mut Page> {
        self.slots.get_mut(index as usize)?.as_mut()
    }

    pub fn contains(&self, index: PageIndex) -> bool {
        self.get(index).is_some()
    }

    /// Page currently in the foreground, if any
    pub fn active(&self) -> Option<PageIndex> {
        self.active
    }

    pub fn is_active(&self, index: PageIndex) -> bool {
        self.active == Some(index)
    }

    /// Mark a live page as the foreground page
    ///
    /// Unknown or removed indices leave the active page unchanged and return
    /// `false`.
    pub fn set_active(&mut self, index: PageIndex) -> bool {
        if !self.contains(index) {
            warn!(page = index, "Ignoring activation of unknown page");
            return false;
        }
        self.active = Some(index);
        true
    }

    /// Indices of live pages, in order
    pub fn indices(&self) -> Vec<PageIndex> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| i as PageIndex)
            .collect()
    }

    /// Number of live pages
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every page and forget the active one
    pub fn clear(&mut self) {
        self.slots.clear();
        self.active = None;
    }
}
