use crate::ports::approval::StatusSurface;
use std::sync::Mutex;
use tracing::info;

/// Records the command currently running and announces it in the log.
#[derive(Debug, Default)]
pub struct StatusBoard {
    current: Mutex<Option<String>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl StatusSurface for StatusBoard {
    fn show(&self, method: &str) {
        info!(%method, "running hardware wallet command");
        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(method.to_string());
    }

    fn clear(&self) {
        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shows_and_clears_method() {
        let board = StatusBoard::new();
        assert_eq!(board.current(), None);
        board.show("signtx");
        assert_eq!(board.current().as_deref(), Some("signtx"));
        board.clear();
        assert_eq!(board.current(), None);
    }
}
