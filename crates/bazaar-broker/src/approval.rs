//! # Approval Gate
//!
//! The hook the authority uses to manually review trade requests.
//!
//! The coordinator only consults the gate when the `require_approval`
//! setting is on. A review suspends its own request and nothing else:
//! the gate is an async call made from that request's task, so other
//! requests and bus traffic keep flowing while a prompt is open.

use async_trait::async_trait;
use bazaar_core::RequestLine;

// =============================================================================
// Review Types
// =============================================================================

/// Direction of the trade under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeKind {
    Purchase,
    Sell,
}

/// Everything a reviewer needs to judge a request.
#[derive(Debug, Clone)]
pub struct TradeReview {
    pub kind: TradeKind,
    /// Requesting peer.
    pub peer_id: String,
    /// Vendor involved (purchases only).
    pub vendor_id: Option<String>,
    /// The lines that passed stock/holdings validation.
    pub lines: Vec<RequestLine>,
    /// Total value of those lines, in display units.
    pub total_display: f64,
}

/// A reviewer's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    /// Proceed, charging or paying out this percentage of the value.
    Approved { percentage: u8 },
    /// Reject the whole request.
    Declined,
}

// =============================================================================
// Approval Gate Trait
// =============================================================================

/// Asynchronous review of a trade request.
///
/// Implementations may prompt a human; the call may take arbitrarily
/// long. There is no timeout: an abandoned prompt simply never settles
/// its request.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn review(&self, review: TradeReview) -> ApprovalDecision;
}

// =============================================================================
// Built-in Gates
// =============================================================================

/// Approves everything at a fixed percentage.
pub struct AutoApprovalGate {
    percentage: u8,
}

impl AutoApprovalGate {
    /// Approves at full value.
    pub fn new() -> Self {
        AutoApprovalGate { percentage: 100 }
    }

    /// Approves at the given percentage of value.
    pub fn with_percentage(percentage: u8) -> Self {
        AutoApprovalGate {
            percentage: percentage.min(100),
        }
    }
}

impl Default for AutoApprovalGate {
    fn default() -> Self {
        AutoApprovalGate::new()
    }
}

#[async_trait]
impl ApprovalGate for AutoApprovalGate {
    async fn review(&self, _review: TradeReview) -> ApprovalDecision {
        ApprovalDecision::Approved {
            percentage: self.percentage,
        }
    }
}

/// Declines everything.
pub struct DecliningGate;

#[async_trait]
impl ApprovalGate for DecliningGate {
    async fn review(&self, _review: TradeReview) -> ApprovalDecision {
        ApprovalDecision::Declined
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn review() -> TradeReview {
        TradeReview {
            kind: TradeKind::Purchase,
            peer_id: "peer-1".to_string(),
            vendor_id: Some("v-1".to_string()),
            lines: Vec::new(),
            total_display: 12.0,
        }
    }

    #[tokio::test]
    async fn test_auto_gate_clamps_percentage() {
        let gate = AutoApprovalGate::with_percentage(150);
        assert_eq!(
            gate.review(review()).await,
            ApprovalDecision::Approved { percentage: 100 }
        );
    }

    #[tokio::test]
    async fn test_declining_gate() {
        let gate = DecliningGate;
        assert_eq!(gate.review(review()).await, ApprovalDecision::Declined);
    }
}
