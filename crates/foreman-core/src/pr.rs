use crate::review::ReviewVerdict;
use crate::task::TaskRecord;
use crate::test_gate::TestGateOutcome;
use serde::Serialize;

/// Title, body and follow-up decision for one pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrPlan {
    pub title: String,
    pub body: String,
    /// Both gates passed: the upstream task can be closed.
    pub close_task: bool,
}

/// Title marker for each (review passed, tests passed) cell.
pub fn status_prefix(review_ok: bool, tests_ok: bool) -> Option<&'static str> {
    match (review_ok, tests_ok) {
        (true, true) => None,
        (true, false) => Some("[TESTS FAILED]"),
        (false, true) => Some("[REVIEW ISSUES]"),
        (false, false) => Some("[NEEDS REVIEW]"),
    }
}

fn status_paragraph(review_ok: bool, tests_ok: bool) -> &'static str {
    match (review_ok, tests_ok) {
        (true, true) => {
            "✅ Automated review passed and the test suite is green. Ready to merge after a final look."
        }
        (true, false) => {
            "⚠️ Automated review passed but the test gate blocked. Check the test output before merging."
        }
        (false, true) => {
            "⚠️ Tests pass but the automated review still reports blocking issues after the fix attempts."
        }
        (false, false) => {
            "❌ Neither the automated review nor the test gate passed. This change needs a human pass before merging."
        }
    }
}

pub fn compose_pr(
    title_prefix: &str,
    task: &TaskRecord,
    review: &ReviewVerdict,
    review_attempts: u32,
    tests: &TestGateOutcome,
) -> PrPlan {
    let review_ok = review.passed();
    let tests_ok = tests.passed();

    let base_title = if title_prefix.trim().is_empty() {
        task.title.clone()
    } else {
        format!("{}: {}", title_prefix.trim(), task.title)
    };
    let title = match status_prefix(review_ok, tests_ok) {
        Some(p) => format!("{p} {base_title}"),
        None => base_title,
    };

    let mut body = String::new();
    body.push_str(&format!("## Task\n\n**{}**: {}\n", task.key, task.title));
    if !task.description.trim().is_empty() {
        body.push_str(&format!("\n{}\n", task.description.trim()));
    }

    body.push_str(&format!("\n## Status\n\n{}\n", status_paragraph(review_ok, tests_ok)));

    body.push_str(&format!(
        "\n## Review\n\n- Verdict: **{}** after {} attempt(s)\n",
        review.label(),
        review_attempts
    ));
    let issues = review.issues();
    if !issues.is_empty() {
        body.push_str("- Blocking issues:\n");
        for issue in issues {
            body.push_str(&format!("  - {issue}\n"));
        }
    }
    if matches!(review, ReviewVerdict::Indeterminate) {
        body.push_str("- The reviewer output matched no verdict format.\n");
    }

    body.push_str(&format!(
        "\n## Tests\n\n- Decision: **{}**\n- Reason: {}\n",
        if tests_ok { "approve" } else { "block" },
        tests.reason
    ));
    if !tests_ok && !tests.output.is_empty() {
        body.push_str(&format!(
            "\n<details><summary>Test output (tail)</summary>\n\n```\n{}\n```\n</details>\n",
            tests.output
        ));
    }

    PrPlan {
        title,
        body,
        close_task: review_ok && tests_ok,
    }
}
