//! Spam gating of creates and updates

use issuegate_core::{
    AntiAbuseSettings, ChallengeContext, CollaboratorError, GateConfig, IssueChanges, NewIssue,
    RequestMetadata, SpamVerdict,
};
use issuegate_store::SpamLogStore;
use issuegate_gate::{IssueEvent, MutationOutcome, StatusCategory, SPAM_REJECTION_MESSAGE};
use issuegate_test_utils::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn spam_env(settings: AntiAbuseSettings) -> TestEnv {
    let mut config = GateConfig::new();
    config.anti_abuse = settings;
    TestEnv::with(config, ScriptedClassifier::spam(), ScriptedVerifier::new())
}

fn metadata() -> RequestMetadata {
    RequestMetadata::new("192.0.2.10", "Mozilla/5.0")
}

#[tokio::test]
async fn author_update_flagged_then_applied_with_challenge() {
    let env = spam_env(AntiAbuseSettings::enabled());
    let issue = env.seed(confidential_issue("Login broken"));
    let author = env.viewer(AUTHOR).await;
    let changes = IssueChanges::new().with_title("Buy cheap watches");

    let rejected = env
        .service
        .update(
            &author,
            PROJECT,
            issue.id,
            &changes,
            &ChallengeContext::none(),
            &metadata(),
        )
        .await
        .unwrap();

    let spam_log_id = match &rejected {
        MutationOutcome::RejectedAsSpam {
            message,
            spam_log_id,
        } => {
            assert_eq!(message, SPAM_REJECTION_MESSAGE);
            *spam_log_id
        }
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(rejected.status(), StatusCategory::UnprocessableEntity);

    let logs = env.store.spam_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].id, spam_log_id);
    assert_eq!(logs[0].user, AUTHOR);
    assert_eq!(logs[0].title, "Buy cheap watches");
    assert_eq!(logs[0].metadata, metadata());
    assert!(!logs[0].recaptcha_verified);

    let unchanged = env.service.show(&author, PROJECT, issue.id).await.unwrap();
    assert_eq!(unchanged.issue().unwrap().title, "Login broken");
    assert!(env.notifier.events().is_empty());

    let applied = env
        .service
        .update(
            &author,
            PROJECT,
            issue.id,
            &changes,
            &ChallengeContext::answered(spam_log_id, PASSING_TOKEN),
            &metadata(),
        )
        .await
        .unwrap();

    assert_eq!(applied.status(), StatusCategory::Found);
    assert!(matches!(
        applied,
        MutationOutcome::Applied {
            via_challenge: true,
            ..
        }
    ));
    assert_eq!(applied.issue().unwrap().title, "Buy cheap watches");
    assert_eq!(env.store.spam_log_count(), 1);
    assert!(env
        .store
        .get_spam_log(spam_log_id)
        .await
        .unwrap()
        .unwrap()
        .recaptcha_verified);
    assert_eq!(
        env.notifier.take(),
        vec![IssueEvent::Updated {
            issue: issue.id,
            by: AUTHOR
        }]
    );
}

#[tokio::test]
async fn resubmitting_verified_log_neither_relogs_nor_reflips() {
    let env = spam_env(AntiAbuseSettings::enabled());
    let member = env.viewer(MEMBER).await;
    let new = NewIssue::new(PROJECT, "Cheap pills");

    let spam_log_id = env
        .service
        .create(&member, &new, &ChallengeContext::none(), &metadata())
        .await
        .unwrap()
        .spam_log_id()
        .unwrap();

    for _ in 0..2 {
        let outcome = env
            .service
            .create(
                &member,
                &new,
                &ChallengeContext::answered(spam_log_id, PASSING_TOKEN),
                &metadata(),
            )
            .await
            .unwrap();
        assert!(outcome.is_applied());
    }

    assert_eq!(env.store.spam_log_count(), 1);
    assert_eq!(env.store.issue_count(), 2);
    assert!(!env
        .store
        .mark_recaptcha_verified(spam_log_id, MEMBER)
        .await
        .unwrap());
}

#[tokio::test]
async fn spam_without_challenge_never_mutates() {
    let env = spam_env(AntiAbuseSettings::enabled());
    let developer = env.viewer(DEVELOPER).await;

    for attempt in 1..=3 {
        let outcome = env
            .service
            .create(
                &developer,
                &NewIssue::new(PROJECT, "Casino"),
                &ChallengeContext::none(),
                &metadata(),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, MutationOutcome::RejectedAsSpam { .. }));
        assert_eq!(env.store.spam_log_count(), attempt);
    }
    assert_eq!(env.store.issue_count(), 0);
    assert_eq!(env.verifier.calls(), 0);
}

#[tokio::test]
async fn foreign_spam_log_is_never_confirmed() {
    let env = spam_env(AntiAbuseSettings::enabled());
    let member = env.viewer(MEMBER).await;
    let developer = env.viewer(DEVELOPER).await;
    let new = NewIssue::new(PROJECT, "Casino");

    let members_log = env
        .service
        .create(&member, &new, &ChallengeContext::none(), &metadata())
        .await
        .unwrap()
        .spam_log_id()
        .unwrap();

    let outcome = env
        .service
        .create(
            &developer,
            &new,
            &ChallengeContext::answered(members_log, PASSING_TOKEN),
            &metadata(),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, MutationOutcome::RejectedAsSpam { .. }));
    assert_eq!(env.verifier.calls(), 0);
    assert!(!env
        .store
        .get_spam_log(members_log)
        .await
        .unwrap()
        .unwrap()
        .recaptcha_verified);
}

#[tokio::test]
async fn wrong_token_is_rejected_with_the_same_message() {
    let env = spam_env(AntiAbuseSettings::enabled());
    let member = env.viewer(MEMBER).await;
    let new = NewIssue::new(PROJECT, "Casino");
    let first = env
        .service
        .create(&member, &new, &ChallengeContext::none(), &metadata())
        .await
        .unwrap();

    let second = env
        .service
        .create(
            &member,
            &new,
            &ChallengeContext::answered(first.spam_log_id().unwrap(), "robot"),
            &metadata(),
        )
        .await
        .unwrap();

    match (first, second) {
        (
            MutationOutcome::RejectedAsSpam { message: a, .. },
            MutationOutcome::RejectedAsSpam { message: b, .. },
        ) => assert_eq!(a, b),
        other => panic!("unexpected outcomes: {other:?}"),
    }
    assert_eq!(env.verifier.calls(), 1);
}

#[tokio::test]
async fn recaptcha_disabled_blocks_spam_even_with_proof() {
    let env = spam_env(AntiAbuseSettings {
        spam_check_enabled: true,
        recaptcha_enabled: false,
    });
    let member = env.viewer(MEMBER).await;
    let new = NewIssue::new(PROJECT, "Casino");
    let spam_log_id = env
        .service
        .create(&member, &new, &ChallengeContext::none(), &metadata())
        .await
        .unwrap()
        .spam_log_id()
        .unwrap();

    let outcome = env
        .service
        .create(
            &member,
            &new,
            &ChallengeContext::answered(spam_log_id, PASSING_TOKEN),
            &metadata(),
        )
        .await
        .unwrap();

    match outcome {
        MutationOutcome::RejectedAsSpam { message, .. } => {
            assert_eq!(message, SPAM_REJECTION_MESSAGE);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(env.store.issue_count(), 0);
    assert_eq!(env.verifier.calls(), 0);
}

#[tokio::test]
async fn spam_check_disabled_skips_classifier() {
    let env = spam_env(AntiAbuseSettings::default());
    let member = env.viewer(MEMBER).await;
    let outcome = env
        .service
        .create(
            &member,
            &NewIssue::new(PROJECT, "Casino"),
            &ChallengeContext::none(),
            &metadata(),
        )
        .await
        .unwrap();

    assert!(outcome.is_applied());
    assert_eq!(env.classifier.calls(), 0);
    assert_eq!(env.store.spam_log_count(), 0);
}

#[tokio::test]
async fn validation_runs_before_classification() {
    let env = spam_env(AntiAbuseSettings::enabled());
    let member = env.viewer(MEMBER).await;
    let outcome = env
        .service
        .create(
            &member,
            &NewIssue::new(PROJECT, "x".repeat(256)),
            &ChallengeContext::none(),
            &metadata(),
        )
        .await
        .unwrap();

    match &outcome {
        MutationOutcome::ValidationFailed { errors } => {
            assert_eq!(
                errors.get("title"),
                ["is too long (maximum is 255 characters)".to_string()]
            );
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(outcome.status().http_status(), 422);
    assert_eq!(env.classifier.calls(), 0);
    assert_eq!(env.store.spam_log_count(), 0);
}

#[tokio::test]
async fn classifier_sees_proposed_text() {
    let env = TestEnv::new();
    let issue = env.seed(public_issue("Old"));
    let author = env.viewer(AUTHOR).await;

    env.service
        .update(
            &author,
            PROJECT,
            issue.id,
            &IssueChanges::new().with_description("New body"),
            &ChallengeContext::none(),
            &metadata(),
        )
        .await
        .unwrap();

    let requests = env.classifier.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].user, AUTHOR);
    assert_eq!(requests[0].title, "Old");
    assert_eq!(requests[0].description, "New body");
}

#[tokio::test]
async fn anonymous_create_is_not_found() {
    let env = TestEnv::new();
    let outcome = env
        .service
        .create(
            &issuegate_core::Viewer::anonymous(),
            &NewIssue::new(PROJECT, "Hello"),
            &ChallengeContext::none(),
            &metadata(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, MutationOutcome::NotFound);
    assert_eq!(env.classifier.calls(), 0);
}

#[tokio::test]
async fn collaborator_failures_propagate_unchanged() {
    let env = TestEnv::with(
        GateConfig::new().with_spam_check(true).with_recaptcha(true),
        ScriptedClassifier::failing("timeout"),
        ScriptedVerifier::new(),
    );
    let member = env.viewer(MEMBER).await;
    let err = env
        .service
        .create(
            &member,
            &NewIssue::new(PROJECT, "Hello"),
            &ChallengeContext::none(),
            &metadata(),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.collaborator(),
        Some(&CollaboratorError::Classifier("timeout".to_string()))
    );
    assert_eq!(env.store.issue_count(), 0);

    let env = TestEnv::with(
        GateConfig::new().with_spam_check(true).with_recaptcha(true),
        ScriptedClassifier::spam(),
        ScriptedVerifier::failing("unreachable"),
    );
    let member = env.viewer(MEMBER).await;
    let new = NewIssue::new(PROJECT, "Casino");
    let spam_log_id = env
        .service
        .create(&member, &new, &ChallengeContext::none(), &metadata())
        .await
        .unwrap()
        .spam_log_id()
        .unwrap();
    let err = env
        .service
        .create(
            &member,
            &new,
            &ChallengeContext::answered(spam_log_id, PASSING_TOKEN),
            &metadata(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.collaborator().map(|e| e.collaborator()), Some("challenge_verifier"));
    assert_eq!(env.store.issue_count(), 0);
}

#[tokio::test]
async fn verdict_can_change_between_attempts() {
    let env = spam_env(AntiAbuseSettings::enabled());
    let member = env.viewer(MEMBER).await;
    let new = NewIssue::new(PROJECT, "Maybe spam");

    let first = env
        .service
        .create(&member, &new, &ChallengeContext::none(), &metadata())
        .await
        .unwrap();
    assert!(first.spam_log_id().is_some());

    env.classifier.set_verdict(SpamVerdict::ham());
    let second = env
        .service
        .create(&member, &new, &ChallengeContext::none(), &metadata())
        .await
        .unwrap();
    assert!(matches!(
        second,
        MutationOutcome::Applied {
            via_challenge: false,
            ..
        }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resubmissions_share_one_spam_log() {
    let env = Arc::new(spam_env(AntiAbuseSettings::enabled()));
    let member = env.viewer(MEMBER).await;
    let new = NewIssue::new(PROJECT, "Casino");
    let spam_log_id = env
        .service
        .create(&member, &new, &ChallengeContext::none(), &metadata())
        .await
        .unwrap()
        .spam_log_id()
        .unwrap();

    let attempts = (0..16).map(|_| {
        let env = Arc::clone(&env);
        let new = new.clone();
        tokio::spawn(async move {
            env.service
                .create(
                    &member,
                    &new,
                    &ChallengeContext::answered(spam_log_id, PASSING_TOKEN),
                    &metadata(),
                )
                .await
        })
    });
    let mut applied = 0;
    for attempt in attempts.collect::<Vec<_>>() {
        if attempt.await.unwrap().unwrap().is_applied() {
            applied += 1;
        }
    }

    assert_eq!(applied, 16);
    assert_eq!(env.store.spam_log_count(), 1);
    assert!(env
        .store
        .get_spam_log(spam_log_id)
        .await
        .unwrap()
        .unwrap()
        .recaptcha_verified);
}
