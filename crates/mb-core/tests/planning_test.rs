use mb_core::planning::*;

#[tokio::test]
async fn log_create_and_list_with_defaults() {
    let store = PlanningStore::new_in_memory().await.unwrap();
    let id = store
        .create_log(NewLog {
            message: "booted".into(),
            level: "INFO".into(),
            context: String::new(),
        })
        .await
        .unwrap();
    assert!(id > 0);

    let logs = store.list_logs().await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].id, id);
    assert_eq!(logs[0].message, "booted");
    assert_eq!(logs[0].level, "INFO");
    assert_eq!(logs[0].context, "");
}

#[tokio::test]
async fn new_inputs_fill_defaults_from_json() {
    let log: NewLog = serde_json::from_str(r#"{"message":"m"}"#).unwrap();
    assert_eq!(log.level, "INFO");
    assert_eq!(log.context, "");

    let task: NewTask = serde_json::from_str(r#"{"title":"t"}"#).unwrap();
    assert_eq!(task.status, "pending");

    assert!(serde_json::from_str::<NewPlan>(r#"{"steps":"1"}"#).is_err());
}

#[tokio::test]
async fn tasks_list_newest_first() {
    let store = PlanningStore::new_in_memory().await.unwrap();
    for title in ["first", "second", "third"] {
        store
            .create_task(NewTask {
                title: title.into(),
                status: "pending".into(),
                details: String::new(),
            })
            .await
            .unwrap();
    }

    let tasks = store.list_tasks().await.unwrap();
    let titles: Vec<_> = tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["third", "second", "first"]);
    assert_eq!(tasks[0].created_at, tasks[0].updated_at);
}

#[tokio::test]
async fn list_is_capped() {
    let store = PlanningStore::new_in_memory().await.unwrap();
    for i in 0..(LIST_LIMIT + 5) {
        store
            .create_snapshot(NewSnapshot {
                snapshot: format!("snap-{i}"),
            })
            .await
            .unwrap();
    }

    let snaps = store.list_snapshots().await.unwrap();
    assert_eq!(snaps.len(), LIST_LIMIT);
    assert_eq!(snaps[0].snapshot, format!("snap-{}", LIST_LIMIT + 4));
}

#[tokio::test]
async fn plans_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("planning.db");

    {
        let store = PlanningStore::new(&path).await.unwrap();
        store
            .create_plan(NewPlan {
                description: "ship it".into(),
                steps: "1. build\n2. test".into(),
            })
            .await
            .unwrap();
    }

    let store = PlanningStore::new(&path).await.unwrap();
    let plans = store.list_plans().await.unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].description, "ship it");
    assert!(plans[0].steps.contains("test"));
}
