//! Bounded conversation memory.
//!
//! Holds chat turns in a deque capped by a token budget (approximated as
//! characters / 4, matching the synthesizer's arithmetic). When the budget
//! is exceeded, the oldest turns go first; the newest turn always survives
//! even if it alone exceeds the budget.

use std::collections::VecDeque;

use crate::models::ChatTurn;
use crate::synthesizer::CHARS_PER_TOKEN;

const EMPTY_HISTORY: &str = "(no previous conversation)";

/// FIFO chat history bounded by an approximate token budget.
pub struct ChatMemory {
    turns: VecDeque<ChatTurn>,
    char_budget: usize,
}

impl ChatMemory {
    pub fn new(token_budget: usize) -> Self {
        Self { turns: VecDeque::new(), char_budget: token_budget * CHARS_PER_TOKEN }
    }

    /// Append a turn, evicting oldest turns until the budget holds again.
    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push_back(turn);
        while self.turns.len() > 1 && self.total_chars() > self.char_budget {
            self.turns.pop_front();
        }
    }

    fn total_chars(&self) -> usize {
        self.turns.iter().map(|t| t.content.len()).sum()
    }

    /// The retained turns, oldest first.
    pub fn turns(&self) -> impl Iterator<Item = &ChatTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Render the history as role-labeled lines for prompt inclusion, or a
    /// placeholder when empty.
    pub fn format_history(&self) -> String {
        if self.turns.is_empty() {
            return EMPTY_HISTORY.to_string();
        }
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.role.label(), t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_formats_as_placeholder() {
        let memory = ChatMemory::new(100);
        assert!(memory.is_empty());
        assert_eq!(memory.format_history(), "(no previous conversation)");
    }

    #[test]
    fn turns_format_with_role_labels_in_order() {
        let mut memory = ChatMemory::new(100);
        memory.push(ChatTurn::user("hello"));
        memory.push(ChatTurn::assistant("hi there"));
        assert_eq!(memory.format_history(), "User: hello\nAssistant: hi there");
    }

    #[test]
    fn oldest_turns_evicted_when_over_budget() {
        // 5-token budget = 20 chars; each turn is 10 chars.
        let mut memory = ChatMemory::new(5);
        memory.push(ChatTurn::user("a".repeat(10)));
        memory.push(ChatTurn::assistant("b".repeat(10)));
        memory.push(ChatTurn::user("c".repeat(10)));

        assert_eq!(memory.len(), 2);
        let contents: Vec<&str> = memory.turns().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["b".repeat(10), "c".repeat(10)]);
    }

    #[test]
    fn newest_turn_survives_even_when_oversized() {
        let mut memory = ChatMemory::new(1);
        memory.push(ChatTurn::user("short"));
        memory.push(ChatTurn::assistant("x".repeat(500)));

        assert_eq!(memory.len(), 1);
        assert_eq!(memory.turns().next().unwrap().content.len(), 500);
    }

    #[test]
    fn clear_empties_history() {
        let mut memory = ChatMemory::new(100);
        memory.push(ChatTurn::user("hello"));
        memory.clear();
        assert!(memory.is_empty());
        assert_eq!(memory.format_history(), "(no previous conversation)");
    }
}
