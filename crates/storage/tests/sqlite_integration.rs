use chrono::Duration;
use learn_core::model::{
    Attempt, Category, CompletedLessonRecord, FeedbackEntry, InProgressRecord, LessonId,
    Preferences, ProgressState, Rating, SavedQuizState, Schedule, Score, SlotDraft, UserId,
    UserProfile,
};
use learn_core::time::fixed_now;
use storage::repository::{
    FeedbackRepository, LessonCatalogRepository, ProfileRepository, ProgressPatch,
    ProgressRepository, ScheduleRepository, Storage, StorageError, StoreChange,
};
use storage::seed::{demo_catalog, seed_demo};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn uid(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn lid(id: &str) -> LessonId {
    LessonId::new(id).unwrap()
}

#[tokio::test]
async fn sqlite_roundtrips_catalog() {
    let repo = connect("memdb_catalog").await;
    for lesson in demo_catalog().unwrap() {
        repo.upsert_lesson(&lesson).await.unwrap();
    }

    let lessons = repo.list_lessons().await.unwrap();
    assert_eq!(lessons.len(), 12);

    let algebra = repo.get_lesson(&lid("9")).await.unwrap().expect("lesson 9");
    assert_eq!(algebra.category(), Category::Math);
    assert_eq!(algebra.quiz().questions()[0].correct, 1);
    assert!(algebra.quiz().questions()[0].hint.is_some());
    assert!(repo.get_lesson(&lid("404")).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_roundtrips_profile_with_preference_order() {
    let repo = connect("memdb_profile").await;
    let user = uid("u1");
    assert!(repo.get_profile(&user).await.unwrap().is_none());

    let profile = UserProfile {
        name: Some("Ada".into()),
        email: Some("ada@example.com".into()),
        date_of_birth: chrono::NaiveDate::from_ymd_opt(1990, 12, 10),
        preferences: Preferences::new([Category::Science, Category::Language]),
        notifications_enabled: true,
        achievements: vec!["First Quiz Completed".into()],
        hint_usage: 3,
        ..UserProfile::default()
    };
    repo.save_profile(&user, &profile).await.unwrap();

    let fetched = repo.get_profile(&user).await.unwrap().expect("profile");
    assert_eq!(fetched, profile);
    assert_eq!(
        fetched.preferences.categories(),
        &[Category::Science, Category::Language]
    );

    let all = repo.list_profiles().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].0, user);
}

#[tokio::test]
async fn sqlite_merge_progress_patches_fields() {
    let repo = connect("memdb_progress").await;
    let user = uid("u1");

    let state = ProgressState {
        completed: vec![CompletedLessonRecord::perfect(lid("2"))],
        in_progress: vec![InProgressRecord {
            lesson_id: lid("1"),
            progress: 60,
        }],
        attempts: vec![
            Attempt {
                lesson_id: lid("1"),
                score: Score::new(60).unwrap(),
                at: fixed_now(),
            },
            Attempt {
                lesson_id: lid("2"),
                score: Score::PERFECT,
                at: fixed_now() + Duration::minutes(5),
            },
        ],
        ..ProgressState::default()
    };
    repo.merge_progress(&user, ProgressPatch::replace_all(state.clone()))
        .await
        .unwrap();

    let mut saved = std::collections::BTreeMap::new();
    let mut snapshot = SavedQuizState {
        current_question: 1,
        remaining_secs: 200,
        ..SavedQuizState::default()
    };
    snapshot.answers.insert(0, 3);
    saved.insert(lid("4"), snapshot.clone());
    repo.merge_progress(&user, ProgressPatch::saved_quizzes(saved))
        .await
        .unwrap();

    let fetched = repo.get_progress(&user).await.unwrap().expect("progress");
    assert_eq!(fetched.completed, state.completed);
    assert_eq!(fetched.in_progress, state.in_progress);
    assert_eq!(fetched.attempts, state.attempts);
    assert_eq!(fetched.saved_quizzes.get(&lid("4")), Some(&snapshot));
}

#[tokio::test]
async fn sqlite_merge_rejects_completed_and_in_progress() {
    let repo = connect("memdb_progress_conflict").await;
    let patch = ProgressPatch {
        completed: Some(vec![CompletedLessonRecord::perfect(lid("1"))]),
        in_progress: Some(vec![InProgressRecord {
            lesson_id: lid("1"),
            progress: 10,
        }]),
        ..ProgressPatch::default()
    };
    let err = repo.merge_progress(&uid("u1"), patch).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
    assert!(repo.get_progress(&uid("u1")).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_schedule_roundtrip_publishes_change() {
    let repo = connect("memdb_schedule").await;
    let mut rx = repo.changes().subscribe();
    let user = uid("u1");

    let mut schedule = Schedule::default();
    for (day, start) in [("Tuesday", "10:00"), ("Friday", "15:00")] {
        schedule.push(
            SlotDraft::starting_at(day, start)
                .unwrap()
                .validate()
                .unwrap(),
        );
    }
    repo.save_schedule(&user, &schedule, fixed_now()).await.unwrap();

    assert_eq!(rx.recv().await.unwrap(), StoreChange::Schedule(user.clone()));
    let fetched = repo.get_schedule(&user).await.unwrap().expect("schedule");
    assert_eq!(fetched, schedule);
}

#[tokio::test]
async fn sqlite_feedback_upsert_replaces_per_pair() {
    let repo = connect("memdb_feedback").await;
    let user = uid("u1");

    let first = FeedbackEntry::new(
        user.clone(),
        lid("1"),
        Rating::new(4).unwrap(),
        "Great intro",
        fixed_now(),
    );
    let second = FeedbackEntry::new(
        user.clone(),
        lid("2"),
        Rating::new(3).unwrap(),
        "Tricky",
        fixed_now() + Duration::hours(1),
    );
    let replaced = FeedbackEntry::new(
        user.clone(),
        lid("1"),
        Rating::new(5).unwrap(),
        "Even better second time",
        fixed_now() + Duration::hours(2),
    );
    for entry in [&first, &second, &replaced] {
        repo.upsert_feedback(entry).await.unwrap();
    }

    let mine = repo.list_feedback_for_user(&user).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0], replaced);
    assert_eq!(mine[1], second);

    let for_lesson = repo.list_feedback_for_lesson(&lid("1")).await.unwrap();
    assert_eq!(for_lesson.len(), 1);
    assert_eq!(for_lesson[0].rating.value(), 5);
    assert_eq!(repo.list_feedback().await.unwrap().len(), 2);
}

#[tokio::test]
async fn sqlite_feedback_pairs_with_underscores_stay_distinct() {
    let repo = connect("memdb_feedback_pairs").await;
    let left = FeedbackEntry::new(uid("ann_1"), lid("2"), Rating::new(2).unwrap(), "", fixed_now());
    let right = FeedbackEntry::new(uid("ann"), lid("1_2"), Rating::new(5).unwrap(), "", fixed_now());
    repo.upsert_feedback(&left).await.unwrap();
    repo.upsert_feedback(&right).await.unwrap();

    assert_eq!(repo.list_feedback().await.unwrap().len(), 2);
    let ann = repo.list_feedback_for_user(&uid("ann")).await.unwrap();
    assert_eq!(ann.len(), 1);
    assert_eq!(ann[0].rating.value(), 5);
    assert_eq!(
        repo.list_feedback_for_user(&uid("ann_1")).await.unwrap()[0].rating.value(),
        2
    );
}

#[tokio::test]
async fn sqlite_storage_seeds_demo_data() {
    let storage = Storage::sqlite("sqlite:file:memdb_seed?mode=memory&cache=shared")
        .await
        .expect("storage");
    let report = seed_demo(&storage, true).await.unwrap();
    assert_eq!(report.lessons, 12);
    assert_eq!(report.users, 2);

    let schedule = storage
        .schedules
        .get_schedule(&uid("demo-learner-2"))
        .await
        .unwrap()
        .expect("schedule");
    assert_eq!(schedule.slots().len(), 2);
}
