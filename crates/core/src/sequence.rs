use std::sync::atomic::{AtomicU64, Ordering};

/// Tag carried by one fetch-then-aggregate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Last-write-wins bookkeeping: only the most recently issued token may
/// publish its result.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> RequestToken {
        RequestToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.latest.load(Ordering::SeqCst) == token.0
    }

    /// Hands `result` back only if no newer request was issued meanwhile.
    pub fn accept<T>(&self, token: RequestToken, result: T) -> Option<T> {
        self.is_current(token).then_some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_monotonic() {
        let seq = RequestSequencer::new();
        let a = seq.issue();
        let b = seq.issue();
        assert!(b > a);
        assert_eq!(a.id(), 1);
    }

    #[test]
    fn only_latest_token_is_accepted() {
        let seq = RequestSequencer::new();
        let first = seq.issue();
        assert_eq!(seq.accept(first, "first"), Some("first"));
        let second = seq.issue();
        assert_eq!(seq.accept(first, "stale"), None);
        assert_eq!(seq.accept(second, "fresh"), Some("fresh"));
    }
}
