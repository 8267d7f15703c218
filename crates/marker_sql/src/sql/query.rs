// task
const INSERT_TASK: &str = include_str!("scripts/task/insert_task.sql");
const GET_TASK: &str = include_str!("scripts/task/get_task.sql");
const LIST_TASKS: &str = include_str!("scripts/task/list_tasks.sql");
const TRANSITION_TASK: &str = include_str!("scripts/task/transition_task.sql");
const CLAIM_PENDING_TASK: &str = include_str!("scripts/task/claim_pending_task.sql");
const INSERT_TASK_RESULT: &str = include_str!("scripts/task/insert_task_result.sql");
const GET_TASK_RESULT: &str = include_str!("scripts/task/get_task_result.sql");

// eval/run
const UPSERT_EVAL: &str = include_str!("scripts/eval/upsert_eval.sql");
const INSERT_RUN: &str = include_str!("scripts/eval/insert_run.sql");
const INSERT_SCORES_BATCH: &str = include_str!("scripts/eval/insert_scores_batch.sql");
const GET_RUN_SCORES: &str = include_str!("scripts/eval/get_run_scores.sql");

pub struct SqlQuery {
    pub sql: &'static str,
}

impl SqlQuery {
    fn new(sql: &'static str) -> Self {
        Self { sql }
    }
}

pub enum Queries {
    InsertTask,
    GetTask,
    ListTasks,
    TransitionTask,
    ClaimPendingTask,
    InsertTaskResult,
    GetTaskResult,
    UpsertEval,
    InsertRun,
    InsertScoresBatch,
    GetRunScores,
}

impl Queries {
    pub fn get_query(&self) -> SqlQuery {
        match self {
            Queries::InsertTask => SqlQuery::new(INSERT_TASK),
            Queries::GetTask => SqlQuery::new(GET_TASK),
            Queries::ListTasks => SqlQuery::new(LIST_TASKS),
            Queries::TransitionTask => SqlQuery::new(TRANSITION_TASK),
            Queries::ClaimPendingTask => SqlQuery::new(CLAIM_PENDING_TASK),
            Queries::InsertTaskResult => SqlQuery::new(INSERT_TASK_RESULT),
            Queries::GetTaskResult => SqlQuery::new(GET_TASK_RESULT),
            Queries::UpsertEval => SqlQuery::new(UPSERT_EVAL),
            Queries::InsertRun => SqlQuery::new(INSERT_RUN),
            Queries::InsertScoresBatch => SqlQuery::new(INSERT_SCORES_BATCH),
            Queries::GetRunScores => SqlQuery::new(GET_RUN_SCORES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_load() {
        for query in [
            Queries::InsertTask,
            Queries::GetTask,
            Queries::ListTasks,
            Queries::TransitionTask,
            Queries::ClaimPendingTask,
            Queries::InsertTaskResult,
            Queries::GetTaskResult,
            Queries::UpsertEval,
            Queries::InsertRun,
            Queries::InsertScoresBatch,
            Queries::GetRunScores,
        ] {
            assert!(!query.get_query().sql.trim().is_empty());
        }
    }

    #[test]
    fn test_claim_uses_skip_locked() {
        let sql = Queries::ClaimPendingTask.get_query().sql;
        assert!(sql.contains("FOR UPDATE SKIP LOCKED"));
        assert!(sql.contains("status = 'pending'"));
    }

    #[test]
    fn test_transition_is_compare_and_swap() {
        let sql = Queries::TransitionTask.get_query().sql;
        assert!(sql.contains("AND status = ANY($7)"));
        assert!(sql.contains("RETURNING"));
    }
}
