use std::sync::Arc;

use services::{
    AppServices, HOME_ROUTE, OnboardingError, QuizError, RecordingInvalidator, Session,
    StepDecision, ViewInvalidator,
};
use sprite_core::model::{
    ActivityKind, Answer, Assistant, AssistantId, ONBOARDING_ROUTE, OnboardingStep, OptionId,
    Persona, Question, QuestionId, QuizId, QuizOption, QuizSubmission, SKILL_ASSESSMENT_TOPIC,
    SkillLevel, SkillQuiz,
};
use sprite_core::time::{fixed_clock, fixed_now};
use storage::repository::{NewUserRecord, Storage};

const QUESTIONS: u64 = 5;

/// Option `q * 10` is right, `q * 10 + 1` is wrong.
fn five_question_quiz() -> SkillQuiz {
    let questions = (1..=QUESTIONS)
        .map(|q| Question {
            id: QuestionId::new(q),
            prompt: format!("Question {q}"),
            options: vec![
                QuizOption {
                    id: OptionId::new(q * 10),
                    label: "right".into(),
                    is_correct: true,
                },
                QuizOption {
                    id: OptionId::new(q * 10 + 1),
                    label: "wrong".into(),
                    is_correct: false,
                },
            ],
        })
        .collect();
    SkillQuiz::new(QuizId::new(1), SKILL_ASSESSMENT_TOPIC, "Python skill check", questions)
        .unwrap()
}

fn answers_with_correct(correct: u64) -> QuizSubmission {
    QuizSubmission::new(
        (1..=QUESTIONS)
            .map(|q| Answer {
                question_id: QuestionId::new(q),
                selected_option_id: OptionId::new(if q <= correct { q * 10 } else { q * 10 + 1 }),
            })
            .collect(),
    )
}

struct Harness {
    app: AppServices,
    storage: Storage,
    views: Arc<RecordingInvalidator>,
}

impl Harness {
    async fn new(storage: Storage) -> Self {
        storage
            .assistants
            .upsert_assistant(&Assistant::new(AssistantId::new(1), "Nova", None, None).unwrap())
            .await
            .unwrap();
        storage.quizzes.upsert_quiz(&five_question_quiz()).await.unwrap();
        let views = Arc::new(RecordingInvalidator::new());
        let app = AppServices::from_storage(
            &storage,
            fixed_clock(),
            SKILL_ASSESSMENT_TOPIC,
            Arc::clone(&views) as Arc<dyn ViewInvalidator>,
        );
        Self {
            app,
            storage,
            views,
        }
    }

    async fn in_memory() -> Self {
        Self::new(Storage::in_memory()).await
    }

    async fn sqlite(name: &str) -> Self {
        let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
        Self::new(Storage::sqlite(&url).await.unwrap()).await
    }

    async fn user(&self) -> Session {
        let id = self
            .storage
            .users
            .insert_user(NewUserRecord {
                display_name: "Ada".into(),
                created_at: fixed_now(),
            })
            .await
            .unwrap();
        Session::new(id)
    }
}

async fn full_onboarding(h: Harness) {
    let onboarding = h.app.onboarding();
    let quiz = h.app.skill_quiz();
    let session = h.user().await;
    let s = Some(&session);

    assert_eq!(onboarding.resolve(s).await.unwrap(), OnboardingStep::Gender);
    assert_eq!(
        onboarding.guard(s, OnboardingStep::SkillQuiz).await.unwrap(),
        StepDecision::Redirect(OnboardingStep::Gender)
    );

    onboarding.select_assistant(s, AssistantId::new(1)).await.unwrap();
    assert_eq!(onboarding.resolve(s).await.unwrap(), OnboardingStep::SkillQuiz);
    assert_eq!(onboarding.resolve(s).await.unwrap(), OnboardingStep::SkillQuiz);
    assert_eq!(
        onboarding.guard_segment(s, "skill-quiz").await.unwrap(),
        StepDecision::Render(OnboardingStep::SkillQuiz)
    );

    let first = quiz.submit(s, &answers_with_correct(4)).await.unwrap();
    assert_eq!((first.score, first.total), (4, 5));
    assert_eq!(first.level, SkillLevel::Advanced);
    assert_eq!(first.suggested_course, "Data Structures & Algorithms in Python");
    assert_eq!(first.next, "/onboarding/persona");
    assert_eq!(first.attempt_number, 1);

    let second = quiz.submit(s, &answers_with_correct(1)).await.unwrap();
    assert_eq!(second.attempt_number, 2);
    assert_eq!(second.level, SkillLevel::Beginner);

    onboarding.select_persona(s, Persona::Calm).await.unwrap();
    assert_eq!(onboarding.resolve(s).await.unwrap(), OnboardingStep::GuidedIntro);

    let done = onboarding.complete_onboarding(s).await.unwrap();
    assert_eq!(done.onboarding_completed_at(), Some(fixed_now()));
    assert_eq!(done.onboarding_step(), None);
    assert_eq!(done.skill_level(), SkillLevel::Beginner);
    assert!(matches!(
        onboarding.guard(s, OnboardingStep::Welcome).await,
        Err(OnboardingError::AlreadyCompleted)
    ));

    // A retake after completion updates the level but not the checkpoint.
    let retake = quiz.submit(s, &answers_with_correct(3)).await.unwrap();
    assert_eq!(retake.next, HOME_ROUTE);
    assert_eq!(retake.attempt_number, 3);
    let state = onboarding.state(s).await.unwrap();
    assert_eq!(state.skill_level(), SkillLevel::Intermediate);
    assert_eq!(state.onboarding_step(), None);
    assert!(state.is_completed());

    let history = quiz.attempt_history(s).await.unwrap();
    let numbers: Vec<_> = history.iter().map(|a| a.attempt_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    // 40 + 10 + 30 for the three attempts, no perfect score.
    assert_eq!(quiz.total_points(s).await.unwrap(), 80);

    assert!(h.views.paths().iter().all(|p| p == ONBOARDING_ROUTE));
    assert_eq!(h.views.paths().len(), 6);
}

#[tokio::test]
async fn full_onboarding_in_memory() {
    full_onboarding(Harness::in_memory().await).await;
}

#[tokio::test]
async fn full_onboarding_sqlite() {
    full_onboarding(Harness::sqlite("memdb_flow_full").await).await;
}

async fn score_brackets(h: Harness) {
    let quiz = h.app.skill_quiz();
    let cases = [
        (0, SkillLevel::Beginner),
        (2, SkillLevel::Beginner),
        (3, SkillLevel::Intermediate),
        (4, SkillLevel::Advanced),
        (5, SkillLevel::Advanced),
    ];
    for (correct, level) in cases {
        let session = h.user().await;
        let outcome = quiz
            .submit(Some(&session), &answers_with_correct(correct))
            .await
            .unwrap();
        assert_eq!(u64::from(outcome.score), correct);
        assert_eq!(outcome.total, 5);
        assert_eq!(outcome.level, level, "{correct}/5");
        assert_eq!(outcome.attempt_number, 1);
        assert_eq!(outcome.level.suggested_course(), outcome.suggested_course);

        let events = h.storage.activity.events_for_user(session.user_id()).await.unwrap();
        let ledger: Vec<_> = events.iter().map(|e| (e.kind, e.points_delta)).collect();
        let score_points = i64::try_from(correct).unwrap() * 10;
        if correct == QUESTIONS {
            assert_eq!(
                ledger,
                vec![
                    (ActivityKind::QuizSubmitted, 50),
                    (ActivityKind::QuizPerfect, 20)
                ]
            );
            assert_eq!(outcome.points_awarded, 70);
        } else {
            assert_eq!(ledger, vec![(ActivityKind::QuizSubmitted, score_points)]);
            assert_eq!(outcome.points_awarded, score_points);
        }
    }
}

#[tokio::test]
async fn score_brackets_in_memory() {
    score_brackets(Harness::in_memory().await).await;
}

#[tokio::test]
async fn score_brackets_sqlite() {
    score_brackets(Harness::sqlite("memdb_flow_brackets").await).await;
}

#[tokio::test]
async fn malformed_submission_writes_nothing() {
    let h = Harness::sqlite("memdb_flow_malformed").await;
    let quiz = h.app.skill_quiz();
    let session = h.user().await;
    let s = Some(&session);

    let mut short = answers_with_correct(5);
    short.answers.pop();
    assert!(matches!(
        quiz.submit(s, &short).await,
        Err(QuizError::MalformedSubmission(_))
    ));

    let mut foreign = answers_with_correct(5);
    foreign.answers[0].selected_option_id = OptionId::new(20);
    assert!(matches!(
        quiz.submit(s, &foreign).await,
        Err(QuizError::MalformedSubmission(_))
    ));

    assert!(quiz.attempt_history(s).await.unwrap().is_empty());
    assert_eq!(quiz.total_points(s).await.unwrap(), 0);
    let state = h.app.onboarding().state(s).await.unwrap();
    assert_eq!(state.skill_level(), SkillLevel::Beginner);
    assert!(h.views.paths().is_empty());
}

#[tokio::test]
async fn quiz_calls_need_a_session_and_seeded_content() {
    let h = Harness::in_memory().await;
    let quiz = h.app.skill_quiz();
    assert!(matches!(
        quiz.submit(None, &answers_with_correct(5)).await,
        Err(QuizError::Unauthenticated)
    ));
    assert!(matches!(quiz.total_points(None).await, Err(QuizError::Unauthenticated)));

    let unseeded = AppServices::from_storage(
        &h.storage,
        fixed_clock(),
        "no-such-topic",
        Arc::new(RecordingInvalidator::new()),
    );
    let session = h.user().await;
    let err = unseeded
        .skill_quiz()
        .submit(Some(&session), &answers_with_correct(5))
        .await
        .unwrap_err();
    assert!(matches!(err, QuizError::QuizNotFound { ref topic } if topic == "no-such-topic"));
}

#[tokio::test]
async fn quiz_view_and_outcome_serialize_for_the_page() {
    let h = Harness::in_memory().await;
    let quiz = h.app.skill_quiz();

    let view = serde_json::to_value(quiz.load_quiz().await.unwrap()).unwrap();
    assert_eq!(view["questions"].as_array().unwrap().len(), 5);
    assert!(!view.to_string().contains("isCorrect"));

    let session = h.user().await;
    let outcome = quiz
        .submit(Some(&session), &answers_with_correct(2))
        .await
        .unwrap();
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["level"], "beginner");
    assert_eq!(json["suggestedCourse"], "Python Intro");
    assert_eq!(json["next"], "/onboarding/persona");
}

#[tokio::test]
async fn resolve_is_stable_without_mutation() {
    let h = Harness::in_memory().await;
    let onboarding = h.app.onboarding();
    let session = h.user().await;
    let s = Some(&session);
    onboarding.select_assistant(s, AssistantId::new(1)).await.unwrap();
    onboarding.select_persona(s, Persona::Direct).await.unwrap();
    let first = onboarding.resolve(s).await.unwrap();
    let second = onboarding.resolve(s).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, OnboardingStep::GuidedIntro);
}

async fn reselecting_an_assistant_keeps_progress(h: Harness) {
    h.storage
        .assistants
        .upsert_assistant(&Assistant::new(AssistantId::new(2), "Atlas", None, None).unwrap())
        .await
        .unwrap();
    let onboarding = h.app.onboarding();
    let session = h.user().await;
    let s = Some(&session);

    onboarding.select_assistant(s, AssistantId::new(1)).await.unwrap();
    onboarding.select_persona(s, Persona::Calm).await.unwrap();
    assert_eq!(
        onboarding.guard(s, OnboardingStep::Gender).await.unwrap(),
        StepDecision::Render(OnboardingStep::Gender)
    );

    let state = onboarding.select_assistant(s, AssistantId::new(2)).await.unwrap();
    assert_eq!(state.assistant_id(), Some(AssistantId::new(2)));
    assert_eq!(state.onboarding_step(), Some(OnboardingStep::GuidedIntro));

    let resolved = onboarding.resolve(s).await.unwrap();
    assert_eq!(resolved, OnboardingStep::GuidedIntro);
    assert_eq!(
        onboarding.guard(s, resolved).await.unwrap(),
        StepDecision::Render(resolved)
    );

    // Retaking the quiz from the intro does not pull the checkpoint back either.
    let outcome = h.app.skill_quiz().submit(s, &answers_with_correct(3)).await.unwrap();
    assert_eq!(outcome.next, "/onboarding/guided-intro");
    assert_eq!(
        onboarding.state(s).await.unwrap().onboarding_step(),
        Some(OnboardingStep::GuidedIntro)
    );
}

#[tokio::test]
async fn reselecting_an_assistant_keeps_progress_in_memory() {
    reselecting_an_assistant_keeps_progress(Harness::in_memory().await).await;
}

#[tokio::test]
async fn reselecting_an_assistant_keeps_progress_sqlite() {
    reselecting_an_assistant_keeps_progress(Harness::sqlite("memdb_flow_reselect").await).await;
}

#[tokio::test]
async fn quiz_before_assistant_does_not_unlock_persona() {
    let h = Harness::in_memory().await;
    let onboarding = h.app.onboarding();
    let session = h.user().await;
    let s = Some(&session);

    let outcome = h.app.skill_quiz().submit(s, &answers_with_correct(4)).await.unwrap();
    assert_eq!(outcome.level, SkillLevel::Advanced);
    assert_eq!(outcome.next, "/onboarding/gender");

    let state = onboarding.state(s).await.unwrap();
    assert_eq!(state.assistant_id(), None);
    assert_eq!(state.skill_level(), SkillLevel::Advanced);
    assert_eq!(state.onboarding_step(), None);
    assert_eq!(
        onboarding.guard(s, OnboardingStep::Persona).await.unwrap(),
        StepDecision::Redirect(OnboardingStep::Gender)
    );
}
