use crate::poller::PollOutcome;

/// Route the badge activates into.
pub const MESSAGES_ROUTE: &str = "/messages";

/// Totals at or above this render as "99+".
pub const DISPLAY_CEILING: u64 = 100;

/// Render state for the unread badge. Owns the displayed total; the poller is
/// its only writer, via [`Badge::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Badge {
    total: u64,
}

impl Badge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one poll outcome. A failure leaves the displayed total as it
    /// was, so the badge degrades to stale rather than flickering to zero.
    pub fn apply(&mut self, outcome: &PollOutcome) {
        if let PollOutcome::Updated(total) = outcome {
            self.total = *total;
        }
    }

    /// The underlying count, uncapped.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Text to render, or `None` when the badge is hidden.
    pub fn label(&self) -> Option<String> {
        match self.total {
            0 => None,
            n if n < DISPLAY_CEILING => Some(n.to_string()),
            _ => Some("99+".to_string()),
        }
    }

    /// A single activation routes to the message view.
    pub fn activate(&self) -> &'static str {
        MESSAGES_ROUTE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_total_hides_badge() {
        let badge = Badge::new();
        assert_eq!(badge.label(), None);
    }

    #[test]
    fn test_small_totals_render_literally() {
        let mut badge = Badge::new();
        badge.apply(&PollOutcome::Updated(1));
        assert_eq!(badge.label().as_deref(), Some("1"));
        badge.apply(&PollOutcome::Updated(99));
        assert_eq!(badge.label().as_deref(), Some("99"));
    }

    #[test]
    fn test_ceiling_renders_capped() {
        let mut badge = Badge::new();
        badge.apply(&PollOutcome::Updated(100));
        assert_eq!(badge.label().as_deref(), Some("99+"));
        assert_eq!(badge.total(), 100);

        badge.apply(&PollOutcome::Updated(12345));
        assert_eq!(badge.label().as_deref(), Some("99+"));
        assert_eq!(badge.total(), 12345);
    }

    #[test]
    fn test_failure_keeps_previous_total() {
        let mut badge = Badge::new();
        badge.apply(&PollOutcome::Updated(7));
        badge.apply(&PollOutcome::Failed("unexpected status 500".to_string()));
        assert_eq!(badge.label().as_deref(), Some("7"));
        assert_eq!(badge.total(), 7);
    }

    #[test]
    fn test_returning_to_zero_hides_again() {
        let mut badge = Badge::new();
        badge.apply(&PollOutcome::Updated(3));
        badge.apply(&PollOutcome::Updated(0));
        assert_eq!(badge.label(), None);
    }

    #[test]
    fn test_activation_routes_to_messages() {
        let badge = Badge::new();
        assert_eq!(badge.activate(), MESSAGES_ROUTE);
    }
}
