// milhouse-exec/src/schedule.rs
// ============================================================================
// Module: Issue Grouping and Scheduling
// Description: Partitions tasks by issue and orders the resulting groups.
// Purpose: Produce the worker submission order for the issue-parallel
//          executor.
// Dependencies: milhouse-core
// ============================================================================

//! ## Overview
//! [`partition_by_issue`] groups a flat task list by `issue_id`, dropping
//! (with a warning) tasks whose issue is missing from the run.
//! [`order_groups_by_severity`] then orders the groups for submission to the
//! worker pool: issue severity descending, ties broken by the group's
//! smallest `parallel_group`, then by issue id.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use milhouse_core::Issue;
use milhouse_core::IssueId;
use milhouse_core::Task;
use tracing::warn;

// ============================================================================
// SECTION: Issue Group
// ============================================================================

/// One issue's tasks, ready for a worker.
#[derive(Debug, Clone)]
pub struct IssueGroup {
    /// The issue this group's tasks belong to.
    pub issue: Issue,
    /// The issue's tasks, unordered; [`crate::worker`] applies the
    /// topological intra-issue order.
    pub tasks: Vec<Task>,
}

// ============================================================================
// SECTION: Partition
// ============================================================================

/// Partitions `tasks` by `issue_id`, matching each group against `issues`.
/// A task whose `issue_id` has no matching entry in `issues` is dropped with
/// a `tracing::warn!`.
#[must_use]
pub fn partition_by_issue(tasks: Vec<Task>, issues: Vec<Issue>) -> Vec<IssueGroup> {
    let issues_by_id: BTreeMap<IssueId, Issue> = issues.into_iter().map(|issue| (issue.id.clone(), issue)).collect();
    let mut tasks_by_issue: BTreeMap<IssueId, Vec<Task>> = BTreeMap::new();

    for task in tasks {
        if issues_by_id.contains_key(&task.issue_id) {
            tasks_by_issue.entry(task.issue_id.clone()).or_default().push(task);
        } else {
            warn!(task_id = %task.id, issue_id = %task.issue_id, "dropping task: referenced issue not found in run");
        }
    }

    tasks_by_issue
        .into_iter()
        .filter_map(|(issue_id, tasks)| issues_by_id.get(&issue_id).map(|issue| IssueGroup { issue: issue.clone(), tasks }))
        .collect()
}

// ============================================================================
// SECTION: Order
// ============================================================================

/// Orders `groups` for submission to the worker pool: severity descending,
/// then smallest `parallel_group` within the group ascending, then issue id
/// ascending.
#[must_use]
pub fn order_groups_by_severity(mut groups: Vec<IssueGroup>) -> Vec<IssueGroup> {
    groups.sort_by(|a, b| {
        b.issue
            .severity
            .cmp(&a.issue.severity)
            .then_with(|| min_parallel_group(a).cmp(&min_parallel_group(b)))
            .then_with(|| a.issue.id.cmp(&b.issue.id))
    });
    groups
}

fn min_parallel_group(group: &IssueGroup) -> u32 {
    group.tasks.iter().map(|task| task.parallel_group).min().unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use milhouse_core::IssueId;
    use milhouse_core::Severity;
    use milhouse_core::Task;
    use milhouse_core::TaskId;
    use milhouse_core::Timestamp;

    use super::order_groups_by_severity;
    use super::partition_by_issue;
    use super::IssueGroup;

    fn issue(id: &str, severity: Severity) -> milhouse_core::Issue {
        milhouse_core::Issue::new_unvalidated(IssueId::new(id), "symptom", "hypothesis", severity)
    }

    fn task(issue_id: &str, task_id: &str) -> Task {
        Task::new(TaskId::new(task_id), IssueId::new(issue_id), "title", "description", Timestamp::now())
    }

    #[test]
    fn orphaned_tasks_are_dropped() {
        let groups = partition_by_issue(vec![task("P-missing", "T-1")], vec![issue("P-known", Severity::Low)]);
        assert!(groups.is_empty());
    }

    #[test]
    fn higher_severity_sorts_first() {
        let groups = vec![
            IssueGroup { issue: issue("P-a", Severity::Low), tasks: vec![task("P-a", "T-a")] },
            IssueGroup { issue: issue("P-b", Severity::Critical), tasks: vec![task("P-b", "T-b")] },
        ];
        let ordered = order_groups_by_severity(groups);
        assert_eq!(ordered[0].issue.id.as_str(), "P-b");
    }
}
