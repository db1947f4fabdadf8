//! One view model per screen. Each owns its local request state (busy flags
//! and an inline error message) and talks to the ports directly.

pub mod dashboard;
pub mod editor;
pub mod login;
pub mod password_reset;
pub mod profile;
pub mod settings;

use serde::Serialize;

/// Three-state rendering of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Loading,
    Error,
    Ready,
}

impl Phase {
    pub fn of(loading: bool, error: Option<&str>) -> Self {
        if loading {
            Phase::Loading
        } else if error.is_some() {
            Phase::Error
        } else {
            Phase::Ready
        }
    }
}

/// `10000` -> `"10,000"`; `None` reads as unlimited.
pub fn format_allowance(limit: Option<u64>) -> String {
    let Some(value) = limit else {
        return "Unlimited".to_string();
    };
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowance_formatting() {
        assert_eq!(format_allowance(Some(10_000)), "10,000");
        assert_eq!(format_allowance(Some(500_000)), "500,000");
        assert_eq!(format_allowance(Some(999)), "999");
        assert_eq!(format_allowance(Some(1_234_567)), "1,234,567");
        assert_eq!(format_allowance(None), "Unlimited");
    }

    #[test]
    fn loading_wins_over_error() {
        assert_eq!(Phase::of(true, Some("boom")), Phase::Loading);
        assert_eq!(Phase::of(false, Some("boom")), Phase::Error);
        assert_eq!(Phase::of(false, None), Phase::Ready);
    }
}
