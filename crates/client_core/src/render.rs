use std::{collections::VecDeque, sync::Mutex};

use crate::capabilities::RenderSink;

/// In-memory display list, newest first.
#[derive(Default)]
pub struct MessageList {
    items: Mutex<VecDeque<String>>,
    capacity: Option<usize>,
}

impl MessageList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `capacity` items, dropping the oldest.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: Some(capacity),
        }
    }

    /// Items top to bottom.
    pub fn snapshot(&self) -> Vec<String> {
        self.items
            .lock()
            .map(|items| items.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RenderSink for MessageList {
    fn prepend(&self, markup: &str) {
        let Ok(mut items) = self.items.lock() else {
            return;
        };
        items.push_front(markup.to_string());
        if let Some(capacity) = self.capacity {
            items.truncate(capacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_item_is_first() {
        let list = MessageList::new();
        list.prepend("<p>1</p>");
        list.prepend("<p>2</p>");
        assert_eq!(list.snapshot(), vec!["<p>2</p>", "<p>1</p>"]);
    }

    #[test]
    fn bounded_list_drops_oldest() {
        let list = MessageList::bounded(2);
        for markup in ["a", "b", "c"] {
            list.prepend(markup);
        }
        assert_eq!(list.snapshot(), vec!["c", "b"]);
    }
}
