//! Key naming policy.
//!
//! Existing producers and workers address lists by these exact strings:
//! `{prefix}:{type}` for live queues, `{prefix}:{type}:failed` for failures.

use crate::domain::TaskType;

/// failed キーの末尾
pub const FAILED_SUFFIX: &str = "failed";

/// live キー `{prefix}:{type}` を作成
pub fn queue_key(prefix: &str, task_type: &TaskType) -> String {
    format!("{prefix}:{task_type}")
}

/// failed キー `{prefix}:{type}:failed` を作成
pub fn failed_queue_key(prefix: &str, task_type: &TaskType) -> String {
    format!("{prefix}:{task_type}:{FAILED_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("myqueue", "something", "myqueue:something", "myqueue:something:failed")]
    #[case::default_prefix("taskqueue", "mail", "taskqueue:mail", "taskqueue:mail:failed")]
    #[case::empty_type("myqueue", "", "myqueue:", "myqueue::failed")]
    fn keys_follow_prefix_type_layout(
        #[case] prefix: &str,
        #[case] task_type: &str,
        #[case] live: &str,
        #[case] failed: &str,
    ) {
        let t = TaskType::new(task_type);
        assert_eq!(queue_key(prefix, &t), live);
        assert_eq!(failed_queue_key(prefix, &t), failed);
    }
}
