//! Event admission: debounce, suppression, feedback recording.

use forge_client::{ForgeState, MemoryForge, ProviderClient, RemoteCommit};
use scheduler::{
    Decision, EventType, Job, ProviderInfo, PullRequestInfo, QueueSet, RepoInfo, TriggerConfig,
    UserInfo, WebhookEvent, WebhookHandler,
};
use store::{RunStatus, Store};

fn event(event_type: EventType, action: &str) -> WebhookEvent {
    WebhookEvent {
        provider: ProviderInfo {
            kind: "github".into(),
            base_url: "https://api.github.com".into(),
        },
        event_type,
        action: action.into(),
        installation_id: Some("inst-1".into()),
        repo: RepoInfo {
            external_id: "100".into(),
            owner: "acme".into(),
            name: "widgets".into(),
            full_name: "acme/widgets".into(),
            default_branch: "main".into(),
        },
        pull_request: PullRequestInfo {
            external_id: "pr-1".into(),
            number: 7,
            title: "Fix null handling".into(),
            body: String::new(),
            state: "open".into(),
            base_ref: "main".into(),
            head_ref: "fix/null".into(),
            base_sha: "a".repeat(40),
            head_sha: "b".repeat(40),
            draft: false,
            labels: vec![],
        },
        comment: None,
        author: Some(UserInfo {
            external_id: "u1".into(),
            login: "alice".into(),
        }),
    }
}

struct Fixture {
    store: Store,
    queues: QueueSet,
    review_rx: tokio::sync::mpsc::UnboundedReceiver<scheduler::QueuedJob>,
    reply_rx: tokio::sync::mpsc::UnboundedReceiver<scheduler::QueuedJob>,
    triggers: TriggerConfig,
}

fn fixture() -> Fixture {
    let store = Store::in_memory().unwrap();
    let (queues, review_rx, reply_rx, _index_rx, _analytics_rx) = QueueSet::new();
    Fixture {
        store,
        queues,
        review_rx,
        reply_rx,
        triggers: TriggerConfig::default(),
    }
}

#[tokio::test]
async fn open_pull_request_enqueues_one_review() {
    let mut fx = fixture();
    let handler = WebhookHandler {
        store: &fx.store,
        queues: &fx.queues,
        triggers: &fx.triggers,
        bot_login: "grepiku",
        forge: None,
    };

    let decision = handler.handle(&event(EventType::PullRequest, "opened")).await.unwrap();
    assert_eq!(decision, Decision::Enqueued);

    let queued = fx.review_rx.try_recv().unwrap();
    match queued.job {
        Job::Review(job) => {
            assert_eq!(job.pr_number, 7);
            assert_eq!(job.head_sha, "b".repeat(40));
            assert!(!job.force);
        }
        other => panic!("unexpected job {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_head_is_debounced_unless_failed() {
    let mut fx = fixture();
    let handler = WebhookHandler {
        store: &fx.store,
        queues: &fx.queues,
        triggers: &fx.triggers,
        bot_login: "grepiku",
        forge: None,
    };

    let ev = event(EventType::PullRequest, "opened");
    assert_eq!(handler.handle(&ev).await.unwrap(), Decision::Enqueued);
    fx.review_rx.try_recv().unwrap();

    // Simulate the first run existing for that head.
    let pr = fx.store.find_pull_request(1, 7).unwrap().unwrap();
    let run = fx.store.create_run(pr.id, &"b".repeat(40), "webhook").unwrap();

    assert_eq!(
        handler.handle(&ev).await.unwrap(),
        Decision::SuppressedDuplicateHead
    );
    assert!(fx.review_rx.try_recv().is_err());

    // A failed run clears the debounce.
    fx.store.finish_run(run.id, RunStatus::Failed).unwrap();
    assert_eq!(handler.handle(&ev).await.unwrap(), Decision::Enqueued);
    assert!(fx.review_rx.try_recv().is_ok());
}

#[tokio::test]
async fn closed_and_draft_prs_are_suppressed() {
    let fx = fixture();
    let handler = WebhookHandler {
        store: &fx.store,
        queues: &fx.queues,
        triggers: &fx.triggers,
        bot_login: "grepiku",
        forge: None,
    };

    let mut closed = event(EventType::PullRequest, "closed");
    closed.pull_request.state = "closed".into();
    assert_eq!(
        handler.handle(&closed).await.unwrap(),
        Decision::SuppressedClosed
    );

    let mut draft = event(EventType::PullRequest, "opened");
    draft.pull_request.draft = true;
    assert_eq!(
        handler.handle(&draft).await.unwrap(),
        Decision::SuppressedByTriggers
    );
}

#[tokio::test]
async fn suggestion_commits_do_not_retrigger() {
    let fx = fixture();
    let forge = ProviderClient::Memory(MemoryForge::new(ForgeState {
        commits: vec![RemoteCommit {
            sha: "b".repeat(40),
            message: "Apply suggestion(s) from code review".into(),
        }],
        ..Default::default()
    }));
    let handler = WebhookHandler {
        store: &fx.store,
        queues: &fx.queues,
        triggers: &fx.triggers,
        bot_login: "grepiku",
        forge: Some(&forge),
    };

    let decision = handler
        .handle(&event(EventType::PullRequest, "synchronize"))
        .await
        .unwrap();
    assert_eq!(decision, Decision::SuppressedAutoCommit);
}

#[tokio::test]
async fn bot_comments_are_ignored_and_commands_force_review() {
    let mut fx = fixture();
    let handler = WebhookHandler {
        store: &fx.store,
        queues: &fx.queues,
        triggers: &fx.triggers,
        bot_login: "grepiku",
        forge: None,
    };

    // Our own comment never re-triggers.
    let mut own = event(EventType::Comment, "created");
    own.comment = Some(scheduler::CommentInfo {
        id: "c-9".into(),
        body: "thanks!".into(),
        author_login: "Grepiku[bot]".into(),
        in_reply_to: None,
        reaction: None,
    });
    assert_eq!(
        handler.handle(&own).await.unwrap(),
        Decision::SuppressedBotComment
    );

    // A /review command enqueues a reply job and a forced review.
    let mut cmd = event(EventType::Comment, "created");
    cmd.comment = Some(scheduler::CommentInfo {
        id: "c-10".into(),
        body: "/review".into(),
        author_login: "alice".into(),
        in_reply_to: None,
        reaction: None,
    });
    assert_eq!(handler.handle(&cmd).await.unwrap(), Decision::Enqueued);
    assert!(fx.reply_rx.try_recv().is_ok());
    match fx.review_rx.try_recv().unwrap().job {
        Job::Review(job) => {
            assert!(job.force);
            assert_eq!(job.trigger, "comment");
        }
        other => panic!("unexpected job {other:?}"),
    }
}

#[tokio::test]
async fn replies_and_reactions_record_feedback() {
    let fx = fixture();
    let handler = WebhookHandler {
        store: &fx.store,
        queues: &fx.queues,
        triggers: &fx.triggers,
        bot_login: "grepiku",
        forge: None,
    };

    // Seed a PR and a run so feedback can attach.
    handler.handle(&event(EventType::PullRequest, "opened")).await.unwrap();
    let pr = fx.store.find_pull_request(1, 7).unwrap().unwrap();
    fx.store.create_run(pr.id, &"b".repeat(40), "webhook").unwrap();

    let mut reply = event(EventType::Comment, "created");
    reply.comment = Some(scheduler::CommentInfo {
        id: "c-20".into(),
        body: "fixed, thanks".into(),
        author_login: "alice".into(),
        in_reply_to: None,
        reaction: None,
    });
    assert_eq!(handler.handle(&reply).await.unwrap(), Decision::FeedbackOnly);

    let mut reaction = event(EventType::Reaction, "created");
    reaction.comment = Some(scheduler::CommentInfo {
        id: "c-21".into(),
        body: String::new(),
        author_login: "alice".into(),
        in_reply_to: None,
        reaction: Some("+1".into()),
    });
    assert_eq!(
        handler.handle(&reaction).await.unwrap(),
        Decision::FeedbackOnly
    );
}
