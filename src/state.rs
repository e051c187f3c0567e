use parking_lot::RwLock;

/// Process-wide transient state shared between screens. Nothing here is persisted.
#[derive(Debug, Default)]
pub struct AppState {
    unread_message_count: RwLock<u64>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unread_message_count(&self) -> u64 {
        *self.unread_message_count.read()
    }

    /// Negative counts clamp to zero.
    pub fn set_unread_message_count(&self, count: i64) {
        *self.unread_message_count.write() = count.max(0) as u64;
    }

    pub fn reset(&self) {
        *self.unread_message_count.write() = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unread_count_never_goes_negative() {
        let state = AppState::new();
        state.set_unread_message_count(4);
        assert_eq!(state.unread_message_count(), 4);
        state.set_unread_message_count(-2);
        assert_eq!(state.unread_message_count(), 0);
        state.set_unread_message_count(3);
        state.reset();
        assert_eq!(state.unread_message_count(), 0);
    }
}
