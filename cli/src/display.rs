//! One-line stderr rendering of search progress events (`--verbose`).

use thicket::SearchEvent;

/// Truncates to at most `max` chars, appending "..." when cut. UTF-8 safe.
pub(crate) fn truncate_display(s: &str, max: usize) -> String {
    const SUFFIX: &str = "...";
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max <= SUFFIX.len() {
        return s.chars().take(max).collect();
    }
    let head: String = s.chars().take(max - SUFFIX.len()).collect();
    format!("{head}{SUFFIX}")
}

pub(crate) fn format_event(event: &SearchEvent, max: usize) -> String {
    match event {
        SearchEvent::IterationStarted { iteration } => format!("-- iteration {iteration}"),
        SearchEvent::LeafSelected { leaf, score } => format!("   expand {leaf} ({score:.3})"),
        SearchEvent::StopChecked { leaf, answerable } => {
            let verdict = if *answerable { "ready to answer" } else { "keep branching" };
            format!("   {leaf}: {verdict}")
        }
        SearchEvent::CandidateScored {
            parent,
            node,
            content,
            score,
            survived,
            violation,
        } => {
            let mark = if *survived { "+" } else { "x" };
            let mut line = format!(
                "   {mark} {parent} -> {node} [{score:.2}] {}",
                truncate_display(content, max)
            );
            if let Some(v) = violation {
                line.push_str(&format!(" (violates: {})", truncate_display(&v.statement, max)));
            }
            line
        }
        SearchEvent::AnswerRejected {
            node,
            answer,
            failures,
        } => format!(
            "   x {node} answer {:?} rejected by {}",
            truncate_display(answer, max),
            failures.join(", ")
        ),
        SearchEvent::AnswerAccepted { node, answer } => {
            format!("   * {node} answer {:?} accepted", truncate_display(answer, max))
        }
        SearchEvent::IterationAborted {
            iteration,
            stage,
            reason,
        } => format!("-- iteration {iteration} aborted during {stage}: {reason}"),
        SearchEvent::Finished {
            answered,
            iterations,
        } => {
            let how = if *answered { "answered" } else { "exhausted" };
            format!("-- {how} after {iterations} iteration(s)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thicket::NodeId;

    #[test]
    fn truncate_display_cuts_on_char_boundaries() {
        assert_eq!(truncate_display("short", 10), "short");
        assert_eq!(truncate_display("abcdefghij", 6), "abc...");
        assert_eq!(truncate_display("ééééé", 4), "é...");
        assert_eq!(truncate_display("abcdef", 2), "ab");
    }

    #[test]
    fn formats_scored_candidate() {
        let line = format_event(
            &SearchEvent::CandidateScored {
                parent: NodeId(0),
                node: NodeId(3),
                content: "4 * 6 = 24".into(),
                score: 5.0,
                survived: true,
                violation: None,
            },
            80,
        );
        assert_eq!(line, "   + #0 -> #3 [5.00] 4 * 6 = 24");
    }

    #[test]
    fn formats_finish() {
        let line = format_event(
            &SearchEvent::Finished {
                answered: false,
                iterations: 10,
            },
            80,
        );
        assert_eq!(line, "-- exhausted after 10 iteration(s)");
    }
}
