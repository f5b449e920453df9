//! Console-facing one-liners for run outcomes.

pub fn accuracy_line(dataset: &str, score: f64) -> String {
    format!("{dataset} Accuracy: {score:.1}%")
}

/// Line for a run that left items pending (failed generations); the job exits
/// without a score and a rerun resumes from the checkpoints.
pub fn pending_line(dataset: &str, missing: usize, total: usize) -> String {
    format!("{dataset}: {missing} of {total} item(s) still pending; rerun to resume")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_stable() {
        assert_eq!(
            accuracy_line("stackselect_4k", 84.549),
            "stackselect_4k Accuracy: 84.5%"
        );
        assert_eq!(
            pending_line("textsort_1k", 3, 200),
            "textsort_1k: 3 of 200 item(s) still pending; rerun to resume"
        );
    }
}
