//! End-to-end tests over a full in-memory engine: real store, real fan-out
//! worker, agents resolved through the directory.

use std::sync::Arc;

use taskhub::error::EngineError;
use taskhub::feed::{EventKind, FeedQuery, SYSTEM_ACTOR};
use taskhub::identity::{Agent, StaticDirectory};
use taskhub::projects::model::{CreateProject, MemberRole, Visibility};
use taskhub::tasks::model::{
    CreateSubtask, CreateTask, ListFilter, TaskPatch, TaskQuery, TaskStatus,
};
use taskhub::tier::Tier;
use taskhub::Engine;

/// Build an engine and authenticate the given agents in order.
async fn setup(agents: &[(&str, &str, Tier)]) -> (Engine, Vec<Agent>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = Arc::new(StaticDirectory::new());
    let mut tokens = Vec::new();
    for (id, name, tier) in agents {
        tokens.push(dir.register(id, name, *tier).await);
    }
    let engine = Engine::in_memory(dir);
    let mut resolved = Vec::new();
    for token in &tokens {
        resolved.push(engine.authenticate(token).await.unwrap());
    }
    (engine, resolved)
}

fn project(name: &str, visibility: Visibility) -> CreateProject {
    CreateProject {
        name: name.to_string(),
        description: String::new(),
        visibility,
        tags: vec![],
    }
}

fn task(title: &str, project: Option<&str>) -> CreateTask {
    CreateTask {
        title: title.to_string(),
        description: String::new(),
        project: project.map(String::from),
        assignee: None,
        depends_on: vec![],
        priority: None,
        tags: vec![],
        deadline: None,
        metadata: None,
    }
}

fn set_status(status: TaskStatus) -> TaskPatch {
    TaskPatch {
        status: Some(status),
        ..Default::default()
    }
}

// ─── Dependencies and unblocking ─────────────────────────────────────────────

#[tokio::test]
async fn task_with_open_dependency_starts_blocked() {
    let (engine, agents) = setup(&[("a_ada", "Ada", Tier::Free)]).await;
    let ada = &agents[0];

    let t1 = engine.tasks.create_task(ada, task("build", None)).await.unwrap();
    assert_eq!(t1.status, TaskStatus::Todo);

    let mut req = task("ship", None);
    req.depends_on = vec![t1.id.clone()];
    let t2 = engine.tasks.create_task(ada, req).await.unwrap();
    assert_eq!(t2.status, TaskStatus::Blocked);
}

#[tokio::test]
async fn completing_a_dependency_unblocks_dependents() {
    let (engine, agents) = setup(&[("a_ada", "Ada", Tier::Free)]).await;
    let ada = &agents[0];

    let t1 = engine.tasks.create_task(ada, task("build", None)).await.unwrap();
    let mut req = task("ship", None);
    req.depends_on = vec![t1.id.clone()];
    let t2 = engine.tasks.create_task(ada, req).await.unwrap();

    engine.tasks.update_task(ada, &t1.id, set_status(TaskStatus::Done)).await.unwrap();

    let t2 = engine.tasks.get_task(ada, &t2.id).await.unwrap();
    assert_eq!(t2.status, TaskStatus::Todo);

    // The unblock notification is attributed to the system, not to Ada.
    engine.feed.flush().await;
    let events = engine.feed.get_feed(ada, FeedQuery::default()).await.unwrap();
    let unblocked: Vec<_> = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::TaskUnblocked { .. }))
        .collect();
    assert_eq!(unblocked.len(), 1);
    assert_eq!(unblocked[0].actor, SYSTEM_ACTOR);
    assert_eq!(unblocked[0].task_id.as_deref(), Some(t2.id.as_str()));
}

#[tokio::test]
async fn unblocking_waits_for_every_dependency() {
    let (engine, agents) = setup(&[("a_ada", "Ada", Tier::Free)]).await;
    let ada = &agents[0];

    let t1 = engine.tasks.create_task(ada, task("one", None)).await.unwrap();
    let t2 = engine.tasks.create_task(ada, task("two", None)).await.unwrap();
    let mut req = task("both", None);
    req.depends_on = vec![t1.id.clone(), t2.id.clone()];
    let t3 = engine.tasks.create_task(ada, req).await.unwrap();

    engine.tasks.update_task(ada, &t1.id, set_status(TaskStatus::Done)).await.unwrap();
    let t3_mid = engine.tasks.get_task(ada, &t3.id).await.unwrap();
    assert_eq!(t3_mid.status, TaskStatus::Blocked, "one of two deps is not enough");

    engine.tasks.update_task(ada, &t2.id, set_status(TaskStatus::Done)).await.unwrap();
    let t3_done = engine.tasks.get_task(ada, &t3.id).await.unwrap();
    assert_eq!(t3_done.status, TaskStatus::Todo);
}

#[tokio::test]
async fn re_completing_a_dependency_is_a_no_op() {
    let (engine, agents) = setup(&[("a_ada", "Ada", Tier::Free)]).await;
    let ada = &agents[0];

    let t1 = engine.tasks.create_task(ada, task("build", None)).await.unwrap();
    let mut req = task("ship", None);
    req.depends_on = vec![t1.id.clone()];
    let t2 = engine.tasks.create_task(ada, req).await.unwrap();

    engine.tasks.update_task(ada, &t1.id, set_status(TaskStatus::Done)).await.unwrap();
    // The dependent has moved on since being unblocked.
    engine
        .tasks
        .update_task(ada, &t2.id, set_status(TaskStatus::InProgress))
        .await
        .unwrap();

    // Same-value status patch: no transition, no resolution pass.
    engine.tasks.update_task(ada, &t1.id, set_status(TaskStatus::Done)).await.unwrap();
    let t2 = engine.tasks.get_task(ada, &t2.id).await.unwrap();
    assert_eq!(t2.status, TaskStatus::InProgress, "re-done must not reset dependents");

    engine.feed.flush().await;
    let events = engine.feed.get_feed(ada, FeedQuery::default()).await.unwrap();
    let unblocked = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::TaskUnblocked { .. }))
        .count();
    assert_eq!(unblocked, 1, "exactly one unblock event");
}

#[tokio::test]
async fn dependency_cycles_and_unknown_ids_are_rejected() {
    let (engine, agents) = setup(&[("a_ada", "Ada", Tier::Free)]).await;
    let ada = &agents[0];

    let mut req = task("ship", None);
    req.depends_on = vec!["t_missing00000".to_string()];
    let err = engine.tasks.create_task(ada, req).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let t1 = engine.tasks.create_task(ada, task("one", None)).await.unwrap();
    let mut req = task("two", None);
    req.depends_on = vec![t1.id.clone()];
    let t2 = engine.tasks.create_task(ada, req).await.unwrap();

    let patch = TaskPatch {
        depends_on: Some(vec![t2.id.clone()]),
        ..Default::default()
    };
    let err = engine.tasks.update_task(ada, &t1.id, patch).await.unwrap_err();
    match err {
        EngineError::Validation(msg) => assert!(msg.contains("cycle"), "{msg}"),
        other => panic!("expected validation error, got {other}"),
    }
}

#[tokio::test]
async fn unverifiable_dependency_graphs_are_rejected() {
    let (engine, agents) = setup(&[("a_ada", "Ada", Tier::Pro)]).await;
    let ada = &agents[0];

    // A chain long enough that the cycle check cannot walk it end to end.
    let mut first = String::new();
    let mut prev: Option<String> = None;
    for i in 0..260 {
        let mut req = task(&format!("link {i}"), None);
        if let Some(p) = &prev {
            req.depends_on = vec![p.clone()];
        }
        let t = engine.tasks.create_task(ada, req).await.unwrap();
        if i == 0 {
            first = t.id.clone();
        }
        prev = Some(t.id);
    }

    // Closing the loop would be a cycle, but it sits beyond the visit cap;
    // the edit must fail rather than be accepted unchecked.
    let patch = TaskPatch {
        depends_on: Some(vec![prev.unwrap()]),
        ..Default::default()
    };
    let err = engine.tasks.update_task(ada, &first, patch).await.unwrap_err();
    match err {
        EngineError::Validation(msg) => assert!(msg.contains("too large"), "{msg}"),
        other => panic!("expected validation error, got {other}"),
    }
}

// ─── Access control ──────────────────────────────────────────────────────────

#[tokio::test]
async fn strangers_cannot_read_or_mutate_tasks() {
    let (engine, agents) =
        setup(&[("a_ada", "Ada", Tier::Free), ("a_eve", "Eve", Tier::Free)]).await;
    let (ada, eve) = (&agents[0], &agents[1]);

    engine
        .projects
        .create_project(ada, project("skunkworks", Visibility::Private))
        .await
        .unwrap();
    let t = engine
        .tasks
        .create_task(ada, task("secret", Some("skunkworks")))
        .await
        .unwrap();

    let err = engine.tasks.get_task(eve, &t.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = engine
        .tasks
        .update_task(eve, &t.id, set_status(TaskStatus::Done))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = engine.tasks.delete_task(eve, &t.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn strangers_cannot_touch_comments_or_subtasks() {
    let (engine, agents) =
        setup(&[("a_ada", "Ada", Tier::Free), ("a_eve", "Eve", Tier::Free)]).await;
    let (ada, eve) = (&agents[0], &agents[1]);

    engine
        .projects
        .create_project(ada, project("skunkworks", Visibility::Private))
        .await
        .unwrap();
    let t = engine
        .tasks
        .create_task(ada, task("secret", Some("skunkworks")))
        .await
        .unwrap();
    engine.comments.add_comment(ada, &t.id, "internal note").await.unwrap();

    let err = engine.comments.add_comment(eve, &t.id, "hi").await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    let err = engine.comments.list_comments(eve, &t.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let sub = CreateSubtask {
        title: "sneaky".to_string(),
        description: String::new(),
        assignee: None,
        priority: None,
        deadline: None,
    };
    let err = engine.tasks.create_subtask(eve, &t.id, sub).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    let err = engine.tasks.list_subtasks(eve, &t.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn project_owner_is_exclusive_and_irremovable() {
    let (engine, agents) =
        setup(&[("a_ada", "Ada", Tier::Free), ("a_bee", "Bee", Tier::Free)]).await;
    let (ada, bee) = (&agents[0], &agents[1]);

    engine
        .projects
        .create_project(ada, project("hub", Visibility::Private))
        .await
        .unwrap();

    // A second owner cannot be granted.
    let err = engine
        .projects
        .add_member(ada, "hub", "Bee", MemberRole::Owner)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    engine
        .projects
        .add_member(ada, "hub", "Bee", MemberRole::Member)
        .await
        .unwrap();

    // Plain members cannot administer the project.
    let err = engine
        .projects
        .add_member(bee, "hub", "Ada", MemberRole::Member)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    // The owner cannot be removed, even by themselves.
    let err = engine.projects.remove_member(ada, "hub", "Ada").await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn public_projects_are_readable_by_non_members() {
    let (engine, agents) =
        setup(&[("a_ada", "Ada", Tier::Free), ("a_eve", "Eve", Tier::Free)]).await;
    let (ada, eve) = (&agents[0], &agents[1]);

    engine
        .projects
        .create_project(ada, project("open-src", Visibility::Public))
        .await
        .unwrap();

    let view = engine.projects.get_project(eve, "open-src").await.unwrap();
    assert_eq!(view.role, None);

    let public = engine.projects.list_public().await.unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].name, "open-src");
}

// ─── Assignment ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn self_assignment_resolves_and_auto_watches() {
    let (engine, agents) = setup(&[("a_ada", "Ada", Tier::Free)]).await;
    let ada = &agents[0];

    let mut req = task("mine", None);
    req.assignee = Some("self".to_string());
    let t = engine.tasks.create_task(ada, req).await.unwrap();
    assert_eq!(t.assignee_id.as_ref(), Some(&ada.id));
    assert_eq!(t.assignee_name.as_deref(), Some("Ada"));

    let mine = engine.tasks.list_mine(ada, ListFilter::default()).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, t.id);

    // Creation fan-out reaches the auto-watching assignee.
    engine.feed.flush().await;
    let events = engine.feed.get_feed(ada, FeedQuery::default()).await.unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e.kind, EventKind::TaskCreated { .. })));
}

#[tokio::test]
async fn unassigned_pool_tracks_assignment_changes() {
    let (engine, agents) = setup(&[("a_ada", "Ada", Tier::Free)]).await;
    let ada = &agents[0];

    engine
        .projects
        .create_project(ada, project("hub", Visibility::Private))
        .await
        .unwrap();
    let t = engine.tasks.create_task(ada, task("grab me", Some("hub"))).await.unwrap();

    let pool = engine.tasks.list_unassigned(ada, "hub").await.unwrap();
    assert_eq!(pool.len(), 1);

    let patch = TaskPatch {
        assignee: Some(taskhub::tasks::model::AssigneeChange::Set("self".into())),
        ..Default::default()
    };
    engine.tasks.update_task(ada, &t.id, patch).await.unwrap();

    let pool = engine.tasks.list_unassigned(ada, "hub").await.unwrap();
    assert!(pool.is_empty());
}

// ─── Feeds and membership ────────────────────────────────────────────────────

#[tokio::test]
async fn project_watchers_receive_task_events() {
    let (engine, agents) =
        setup(&[("a_ada", "Ada", Tier::Free), ("a_bee", "Bee", Tier::Free)]).await;
    let (ada, bee) = (&agents[0], &agents[1]);

    engine
        .projects
        .create_project(ada, project("hub", Visibility::Private))
        .await
        .unwrap();
    let t1 = engine.tasks.create_task(ada, task("build", Some("hub"))).await.unwrap();
    let mut req = task("ship", Some("hub"));
    req.depends_on = vec![t1.id.clone()];
    engine.tasks.create_task(ada, req).await.unwrap();

    engine
        .projects
        .add_member(ada, "hub", "Bee", MemberRole::Member)
        .await
        .unwrap();

    engine.tasks.update_task(ada, &t1.id, set_status(TaskStatus::Done)).await.unwrap();
    engine.feed.flush().await;

    // Membership auto-watches the project, so Bee sees both the completion
    // and the resulting unblock.
    let events = engine.feed.get_feed(bee, FeedQuery::default()).await.unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e.kind, EventKind::StatusChanged { to: TaskStatus::Done, .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e.kind, EventKind::TaskUnblocked { .. })));
}

#[tokio::test]
async fn new_members_only_see_events_from_join_onward() {
    let (engine, agents) =
        setup(&[("a_ada", "Ada", Tier::Free), ("a_bee", "Bee", Tier::Free)]).await;
    let (ada, bee) = (&agents[0], &agents[1]);

    engine
        .projects
        .create_project(ada, project("hub", Visibility::Private))
        .await
        .unwrap();
    engine.tasks.create_task(ada, task("before", Some("hub"))).await.unwrap();
    engine.feed.flush().await;

    engine
        .projects
        .add_member(ada, "hub", "Bee", MemberRole::Member)
        .await
        .unwrap();
    engine.tasks.create_task(ada, task("after", Some("hub"))).await.unwrap();
    engine.feed.flush().await;

    let events = engine.feed.get_feed(bee, FeedQuery::default()).await.unwrap();
    let titles: Vec<_> = events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::TaskCreated { title } => Some(title.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(titles, vec!["after"]);
}

// ─── Tier limits ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn free_tier_member_cap_is_enforced() {
    let mut roster: Vec<(String, String)> = vec![("a_own".into(), "Owner0".into())];
    for i in 1..=10 {
        roster.push((format!("a_m{i}"), format!("M{i}")));
    }
    let specs: Vec<(&str, &str, Tier)> = roster
        .iter()
        .map(|(id, name)| (id.as_str(), name.as_str(), Tier::Free))
        .collect();
    let (engine, agents) = setup(&specs).await;
    let owner = &agents[0];

    engine
        .projects
        .create_project(owner, project("hub", Visibility::Private))
        .await
        .unwrap();

    // Owner plus nine members fills the free cap of ten.
    for i in 1..=9 {
        engine
            .projects
            .add_member(owner, "hub", &format!("M{i}"), MemberRole::Member)
            .await
            .unwrap();
    }
    let err = engine
        .projects
        .add_member(owner, "hub", "M10", MemberRole::Member)
        .await
        .unwrap_err();
    match err {
        EngineError::LimitExceeded { resource, limit, .. } => {
            assert_eq!(resource, "members");
            assert_eq!(limit, 10);
        }
        other => panic!("expected limit error, got {other}"),
    }
}

#[tokio::test]
async fn free_tier_project_cap_is_enforced() {
    let (engine, agents) = setup(&[("a_ada", "Ada", Tier::Free)]).await;
    let ada = &agents[0];

    for name in ["p-one", "p-two", "p-three"] {
        engine
            .projects
            .create_project(ada, project(name, Visibility::Private))
            .await
            .unwrap();
    }
    let err = engine
        .projects
        .create_project(ada, project("p-four", Visibility::Private))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::LimitExceeded { resource: "projects", .. }
    ));
}

// ─── Comments ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn comments_are_chronological_and_fanned_out() {
    let (engine, agents) = setup(&[("a_ada", "Ada", Tier::Free)]).await;
    let ada = &agents[0];

    let t = engine.tasks.create_task(ada, task("discuss", None)).await.unwrap();
    engine.comments.add_comment(ada, &t.id, "first").await.unwrap();
    engine.comments.add_comment(ada, &t.id, "second").await.unwrap();

    let listed = engine.comments.list_comments(ada, &t.id).await.unwrap();
    let texts: Vec<_> = listed.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);

    engine.feed.flush().await;
    let events = engine.feed.get_feed(ada, FeedQuery::default()).await.unwrap();
    let comment_events = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::CommentAdded { .. }))
        .count();
    assert_eq!(comment_events, 2);

    let err = engine
        .comments
        .add_comment(ada, &t.id, &"x".repeat(3000))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PayloadTooLarge { .. }));
}

// ─── Subtasks ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn subtasks_inherit_project_and_list_under_parent() {
    let (engine, agents) = setup(&[("a_ada", "Ada", Tier::Free)]).await;
    let ada = &agents[0];

    engine
        .projects
        .create_project(ada, project("hub", Visibility::Private))
        .await
        .unwrap();
    let parent = engine.tasks.create_task(ada, task("epic", Some("hub"))).await.unwrap();

    let sub = engine
        .tasks
        .create_subtask(
            ada,
            &parent.id,
            CreateSubtask {
                title: "step one".to_string(),
                description: String::new(),
                assignee: None,
                priority: None,
                deadline: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(sub.project.as_deref(), Some("hub"));
    assert_eq!(sub.parent_id.as_deref(), Some(parent.id.as_str()));

    let subs = engine.tasks.list_subtasks(ada, &parent.id).await.unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].id, sub.id);
}

// ─── Cascade delete and global counters ──────────────────────────────────────

#[tokio::test]
async fn deleting_a_project_purges_its_tasks_and_counters() {
    let (engine, agents) = setup(&[("a_ada", "Ada", Tier::Free)]).await;
    let ada = &agents[0];

    engine
        .projects
        .create_project(ada, project("doomed", Visibility::Private))
        .await
        .unwrap();
    let t1 = engine.tasks.create_task(ada, task("one", Some("doomed"))).await.unwrap();
    engine.tasks.create_task(ada, task("two", Some("doomed"))).await.unwrap();
    engine
        .tasks
        .create_subtask(
            ada,
            &t1.id,
            CreateSubtask {
                title: "one.a".to_string(),
                description: String::new(),
                assignee: None,
                priority: None,
                deadline: None,
            },
        )
        .await
        .unwrap();

    let before = engine.status().await.unwrap();
    assert_eq!(before.projects, 1);
    assert_eq!(before.tasks, 3);

    let deleted = engine.projects.delete_project(ada, "doomed").await.unwrap();
    assert_eq!(deleted, 3);

    let after = engine.status().await.unwrap();
    assert_eq!(after.projects, 0);
    assert_eq!(after.tasks, 0);

    let err = engine.tasks.get_task(ada, &t1.id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound("task")));
    assert!(engine.projects.list_mine(ada).await.unwrap().is_empty());
}

// ─── Repair ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn repair_restores_a_lost_index_entry() {
    let (engine, agents) = setup(&[("a_ada", "Ada", Tier::Free)]).await;
    let ada = &agents[0];

    let t = engine.tasks.create_task(ada, task("findme", None)).await.unwrap();

    // Simulate a lost index write.
    engine
        .store
        .delete(&taskhub::store::keys::task_by_status(TaskStatus::Todo, &t.id))
        .await
        .unwrap();
    let query = TaskQuery {
        status: Some(TaskStatus::Todo),
        ..Default::default()
    };
    let found = engine.tasks.list_filtered(ada, query.clone()).await.unwrap();
    assert!(found.is_empty());

    let report = engine.repair_indexes().await.unwrap();
    assert!(report.added >= 1);

    let found = engine.tasks.list_filtered(ada, query).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, t.id);
}

// ─── Authentication ──────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_tokens_are_rejected() {
    let (engine, _) = setup(&[("a_ada", "Ada", Tier::Free)]).await;
    let err = engine.authenticate("tok_bogus").await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthenticated));
}
