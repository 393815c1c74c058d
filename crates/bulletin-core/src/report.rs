//! Caller-facing summary of a dispatch.

use serde::{Deserialize, Serialize};

use crate::delivery::DeliveryReport;

/// The engine's tallies plus a one-line description of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySummary {
  pub total:      usize,
  pub successful: usize,
  pub failed:     usize,
  pub cancelled:  bool,
  pub message:    String,
}

impl From<&DeliveryReport> for DeliverySummary {
  fn from(report: &DeliveryReport) -> Self {
    let noun = if report.total == 1 { "subscriber" } else { "subscribers" };
    let mut message = format!(
      "sent to {} of {} {noun}",
      report.successful, report.total
    );
    if report.failed > 0 {
      message.push_str(&format!("; {} failed", report.failed));
    }
    if report.cancelled {
      message.push_str(" (dispatch cancelled)");
    }

    Self {
      total: report.total,
      successful: report.successful,
      failed: report.failed,
      cancelled: report.cancelled,
      message,
    }
  }
}
