//! Whole-conversation step-order validation.

use simeval_core::Protocol;

/// Checks that the steps matched across a conversation appear in the
/// protocol's declared order.
#[derive(Debug, Clone)]
pub struct StepOrderValidator {
    reference: Vec<String>,
}

impl StepOrderValidator {
    pub fn new(protocol: &Protocol) -> Self {
        Self {
            reference: protocol
                .steps
                .iter()
                .map(|s| s.step_name.trim().to_lowercase())
                .collect(),
        }
    }

    /// Whether the matched step names form a subsequence of the protocol's
    /// step order. Nulls are dropped and repeated names collapsed to their
    /// first occurrence before the check.
    pub fn validate(&self, matched_steps: &[Option<String>]) -> bool {
        let mut collapsed: Vec<String> = Vec::new();
        for step in matched_steps.iter().flatten() {
            let name = step.trim().to_lowercase();
            if !name.is_empty() && !collapsed.contains(&name) {
                collapsed.push(name);
            }
        }

        // Greedy left-to-right scan over the reference.
        let mut ref_idx = 0usize;
        for name in &collapsed {
            while ref_idx < self.reference.len() && self.reference[ref_idx] != *name {
                ref_idx += 1;
            }
            if ref_idx == self.reference.len() {
                return false;
            }
            ref_idx += 1;
        }

        true
    }
}
