//! Order lifecycle and notification status enums.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors from parsing statuses or applying lifecycle transitions.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    /// The string is not part of the status vocabulary.
    #[error("unknown order status: {0}")]
    Unknown(String),
    /// The lifecycle does not allow moving between these states.
    #[error("cannot move order from {from} to {to}")]
    IllegalTransition {
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },
}

/// Order lifecycle state.
///
/// ```text
/// pending -> confirmed -> preparing -> shipped -> delivered
///    \           \            \           \
///     `-----------`------------`-----------`--> cancelled
/// ```
///
/// Orders only move forward (steps may be skipped, e.g. an admin marking a
/// pending order as shipped). `cancelled` is reachable from every
/// non-terminal state. `delivered` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Preparing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// The wire and storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Position along the forward path. `Cancelled` has none.
    const fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Preparing => Some(2),
            Self::Shipped => Some(3),
            Self::Delivered => Some(4),
            Self::Cancelled => None,
        }
    }

    /// Whether moving from `self` to `next` is a real, allowed change.
    ///
    /// Staying in the same state is not a transition and returns `false`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self == next || self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(current), Some(target)) => target > current,
            (None, Some(_)) => false,
        }
    }

    /// Validate a requested transition.
    ///
    /// Returns `Ok(true)` when the status changes, `Ok(false)` when `next`
    /// equals the current status.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::IllegalTransition`] when the lifecycle forbids
    /// the move.
    pub fn transition_to(self, next: Self) -> Result<bool, StatusError> {
        if self == next {
            return Ok(false);
        }
        if self.can_transition_to(next) {
            Ok(true)
        } else {
            Err(StatusError::IllegalTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Map a status word reported by the fulfillment bot.
    ///
    /// Matching ignores case and surrounding whitespace and accepts both the
    /// English vocabulary and the Spanish one used by older bot versions.
    /// Unrecognized words return `None`, which callers treat as "leave the
    /// status unchanged".
    #[must_use]
    pub fn from_external(word: &str) -> Option<Self> {
        match word.trim().to_lowercase().as_str() {
            "contacted" | "message_sent" | "contactado" | "mensaje_enviado" => Some(Self::Pending),
            "confirmed" | "customer_confirmed" | "confirmado" | "cliente_confirmo" => {
                Some(Self::Confirmed)
            }
            "rejected" | "cancelled" | "canceled" | "rechazado" | "cancelado" => {
                Some(Self::Cancelled)
            }
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StatusError::Unknown(s.to_owned()))
    }
}

/// Outcome of pushing an order to the fulfillment bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "notification_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    /// Not attempted yet.
    #[default]
    Pending,
    /// The bot accepted the payload.
    Sent,
    /// The last attempt failed; eligible for manual resend.
    Failed,
    /// No endpoint configured when the order was placed.
    Disabled,
}

impl NotificationStatus {
    /// The wire and storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use OrderStatus::{Cancelled, Confirmed, Delivered, Pending, Preparing, Shipped};

    #[test]
    fn test_forward_transitions() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Preparing));
        assert!(Preparing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Pending.can_transition_to(Shipped));
    }

    #[test]
    fn test_backward_transitions_rejected() {
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Shipped.can_transition_to(Preparing));
    }

    #[test]
    fn test_cancel_from_non_terminal() {
        for status in [Pending, Confirmed, Preparing, Shipped] {
            assert!(status.can_transition_to(Cancelled), "{status}");
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for next in OrderStatus::ALL {
            assert!(!Delivered.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
        assert!(Delivered.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Shipped.is_terminal());
    }

    #[test]
    fn test_transition_to_reports_noop_and_errors() {
        assert_eq!(Pending.transition_to(Pending), Ok(false));
        assert_eq!(Cancelled.transition_to(Cancelled), Ok(false));
        assert_eq!(Pending.transition_to(Confirmed), Ok(true));
        assert_eq!(
            Delivered.transition_to(Cancelled),
            Err(StatusError::IllegalTransition {
                from: Delivered,
                to: Cancelled
            })
        );
    }

    #[test]
    fn test_from_external_vocabulary() {
        assert_eq!(OrderStatus::from_external("contacted"), Some(Pending));
        assert_eq!(OrderStatus::from_external("Mensaje_Enviado"), Some(Pending));
        assert_eq!(OrderStatus::from_external(" CONFIRMED "), Some(Confirmed));
        assert_eq!(OrderStatus::from_external("cliente_confirmo"), Some(Confirmed));
        assert_eq!(OrderStatus::from_external("rejected"), Some(Cancelled));
        assert_eq!(OrderStatus::from_external("rechazado"), Some(Cancelled));
        assert_eq!(OrderStatus::from_external("typing"), None);
        assert_eq!(OrderStatus::from_external(""), None);
    }

    #[test]
    fn test_parse_and_display() {
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert_eq!(
            "pendiente".parse::<OrderStatus>(),
            Err(StatusError::Unknown("pendiente".to_owned()))
        );
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Shipped).unwrap(), "\"shipped\"");
        assert_eq!(
            serde_json::to_string(&NotificationStatus::Disabled).unwrap(),
            "\"disabled\""
        );
    }
}
